//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/notedigest/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/notedigest/` (~/.config/notedigest/)
//! - Data (pipeline artifacts): `$XDG_DATA_HOME/notedigest/` (~/.local/share/notedigest/)
//! - State/Logs: `$XDG_STATE_HOME/notedigest/` (~/.local/state/notedigest/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Misskey server connection
    #[serde(default)]
    pub server: ServerConfig,

    /// Note collection behavior
    #[serde(default)]
    pub collector: CollectorConfig,

    /// AI completion endpoint
    #[serde(default)]
    pub ai: AiConfig,

    /// Digest posting behavior
    #[serde(default)]
    pub post: PostConfig,

    /// Artifact storage paths
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Misskey server connection configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server base URL (e.g., `https://misskey.example.com`)
    pub url: Option<String>,

    /// API token for the bot account
    pub token: Option<String>,

    /// The bot's own user ID, excluded from collection to prevent
    /// feedback loops
    pub exclude_user_id: Option<String>,

    /// HTTP request timeout in seconds for note fetch/create calls
    #[serde(default = "default_server_timeout")]
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            exclude_user_id: None,
            timeout_secs: default_server_timeout(),
        }
    }
}

impl ServerConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.url.is_none() {
            return Err(Error::Config("server.url is required".to_string()));
        }
        if self.token.is_none() {
            return Err(Error::Config("server.token is required".to_string()));
        }
        if self.exclude_user_id.is_none() {
            return Err(Error::Config(
                "server.exclude_user_id is required".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_server_timeout() -> u64 {
    30
}

/// Addressing mode for the collector
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CollectMode {
    /// Follow `sinceId` cursors from the persisted checkpoint
    Cursor,
    /// Collect a fixed lagged time window ending in the recent past
    Window,
}

/// Note-log rendering variant
///
/// The variant also fixes the accumulation mode: `rich` appends to the
/// note log across runs, `strict` overwrites it fresh each run.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogVariant {
    /// Delimited blocks with author, local time, reactions and media
    /// markers; keeps CW and empty-text notes
    Rich,
    /// Raw note texts joined by a plain separator; drops CW and
    /// empty-text notes
    Strict,
}

/// Note collection configuration
#[derive(Debug, Deserialize, Clone)]
pub struct CollectorConfig {
    /// Addressing mode
    #[serde(default = "default_collect_mode")]
    pub mode: CollectMode,

    /// Rendering/accumulation variant
    #[serde(default = "default_log_variant")]
    pub variant: LogVariant,

    /// Notes per page (max 100)
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Maximum pages per run (caps one run at page_size * max_pages notes)
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Max attempts per page fetch
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Fixed delay between retry attempts, in seconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    /// Window mode: minutes before now where the window starts
    #[serde(default = "default_window_lag_start")]
    pub window_lag_start_mins: i64,

    /// Window mode: minutes before now where the window ends. The lag
    /// leaves room for the source server's own propagation/edit delay.
    #[serde(default = "default_window_lag_end")]
    pub window_lag_end_mins: i64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            mode: default_collect_mode(),
            variant: default_log_variant(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay(),
            window_lag_start_mins: default_window_lag_start(),
            window_lag_end_mins: default_window_lag_end(),
        }
    }
}

impl CollectorConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 || self.page_size > 100 {
            return Err(Error::Config(
                "collector.page_size must be between 1 and 100".to_string(),
            ));
        }
        if self.max_pages == 0 {
            return Err(Error::Config(
                "collector.max_pages must be at least 1".to_string(),
            ));
        }
        if self.window_lag_start_mins <= self.window_lag_end_mins {
            return Err(Error::Config(
                "collector.window_lag_start_mins must exceed window_lag_end_mins".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_collect_mode() -> CollectMode {
    CollectMode::Cursor
}

fn default_log_variant() -> LogVariant {
    LogVariant::Rich
}

fn default_page_size() -> usize {
    100
}

fn default_max_pages() -> usize {
    5
}

fn default_max_retries() -> usize {
    3
}

fn default_retry_delay() -> u64 {
    5
}

fn default_window_lag_start() -> i64 {
    30
}

fn default_window_lag_end() -> i64 {
    15
}

/// AI completion endpoint configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AiConfig {
    /// Completion endpoint URL (POST `{text, prompt}` -> plain text)
    pub endpoint_url: Option<String>,

    /// Maximum characters per chunk in the map phase
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// HTTP request timeout in seconds. Long by default to accommodate
    /// large-model latency.
    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint_url: None,
            chunk_size: default_chunk_size(),
            timeout_secs: default_ai_timeout(),
        }
    }
}

impl AiConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.endpoint_url.is_none() {
            return Err(Error::Config("ai.endpoint_url is required".to_string()));
        }
        if self.chunk_size == 0 {
            return Err(Error::Config(
                "ai.chunk_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_chunk_size() -> usize {
    8000
}

fn default_ai_timeout() -> u64 {
    540
}

/// Digest posting configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PostConfig {
    /// Hard cap on total post length in characters. Over-length posts
    /// are rejected, never truncated.
    #[serde(default = "default_max_post_length")]
    pub max_length: usize,

    /// Content warning label to wrap the digest post in (optional)
    pub content_warning: Option<String>,

    /// Post visibility
    #[serde(default = "default_visibility")]
    pub visibility: String,
}

impl Default for PostConfig {
    fn default() -> Self {
        Self {
            max_length: default_max_post_length(),
            content_warning: None,
            visibility: default_visibility(),
        }
    }
}

fn default_max_post_length() -> usize {
    2900
}

fn default_visibility() -> String {
    "public".to_string()
}

/// Artifact storage configuration
///
/// Each pipeline artifact is a single UTF-8 flat file in the data
/// directory.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Override for the data directory (defaults to the XDG data dir)
    pub data_dir: Option<PathBuf>,

    /// Checkpoint (bookmark) file name
    #[serde(default = "default_checkpoint_file")]
    pub checkpoint_file: String,

    /// Accumulated note log file name
    #[serde(default = "default_note_log_file")]
    pub note_log_file: String,

    /// Final summary file name
    #[serde(default = "default_summary_file")]
    pub summary_file: String,

    /// Last-published-note-ID file name
    #[serde(default = "default_last_post_id_file")]
    pub last_post_id_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            checkpoint_file: default_checkpoint_file(),
            note_log_file: default_note_log_file(),
            summary_file: default_summary_file(),
            last_post_id_file: default_last_post_id_file(),
        }
    }
}

impl StorageConfig {
    /// Resolved data directory: the configured override or the XDG default
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(Config::data_dir)
    }
}

fn default_checkpoint_file() -> String {
    "last_note_id.txt".to_string()
}

fn default_note_log_file() -> String {
    "note_log.txt".to_string()
}

fn default_summary_file() -> String {
    "summary.txt".to_string()
}

fn default_last_post_id_file() -> String {
    "last_post_id.txt".to_string()
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/notedigest/config.toml` (~/.config/notedigest/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("notedigest").join("config.toml")
    }

    /// Returns the data directory path (for pipeline artifacts)
    ///
    /// `$XDG_DATA_HOME/notedigest/` (~/.local/share/notedigest/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("notedigest")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/notedigest/` (~/.local/state/notedigest/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("notedigest")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/notedigest/notedigest.log`
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("notedigest.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path
    /// behavior before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_DATA_HOME").is_err() {
            std::env::set_var("XDG_DATA_HOME", home.join(".local/share"));
        }

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}
