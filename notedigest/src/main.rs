//! notedigest - timeline digest bot for Misskey-compatible servers
//!
//! Each subcommand corresponds to one scheduled entry point of the
//! pipeline: `collect` runs on a short cadence, `summarize` and `post`
//! once a day, `renote` later the same day. `run` chains collect →
//! summarize → post in one invocation.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Artifacts: $XDG_DATA_HOME/notedigest/ (~/.local/share/notedigest/)
//! - Logs: $XDG_STATE_HOME/notedigest/notedigest.log
//! - Config: $XDG_CONFIG_HOME/notedigest/config.toml

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use notedigest_core::collector::{CollectOutcome, Collector};
use notedigest_core::misskey::MisskeyClient;
use notedigest_core::pipeline::{self, RunOutcome};
use notedigest_core::publish::Publisher;
use notedigest_core::summarize::HttpSummaryClient;
use notedigest_core::{Artifact, ArtifactStore, Config, FileStore};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "notedigest")]
#[command(about = "Timeline digest bot for Misskey-compatible servers")]
#[command(version)]
struct Args {
    /// Path to the config file (defaults to the XDG config path)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline: collect, summarize, post
    Run,

    /// Collect new notes since the checkpoint into the note log
    Collect,

    /// Summarize the accumulated note log (map-reduce)
    Summarize,

    /// Post the persisted summary as a digest note
    Post,

    /// Rebroadcast the previously posted digest
    Renote,

    /// Show resolved configuration and artifact state
    Status,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Ensure XDG environment variables are set before using core library
    Config::ensure_xdg_env();

    // Load configuration
    let config = match &args.config {
        Some(path) => Config::load_from(path).context("failed to load configuration")?,
        None => Config::load().context("failed to load configuration")?,
    };

    // Initialize logging
    let _log_guard =
        notedigest_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("notedigest starting");

    let store = FileStore::new(&config.storage).context("failed to open artifact store")?;

    match args.command {
        Command::Run => cmd_run(&config, &store),
        Command::Collect => cmd_collect(&config, &store),
        Command::Summarize => cmd_summarize(&config, &store),
        Command::Post => cmd_post(&config, &store),
        Command::Renote => cmd_renote(&config, &store),
        Command::Status => cmd_status(&config, &store),
    }
}

fn cmd_run(config: &Config, store: &FileStore) -> Result<()> {
    config.collector.validate().context("invalid collector configuration")?;
    let server = MisskeyClient::new(&config.server).context("failed to create server client")?;
    let ai = HttpSummaryClient::new(&config.ai).context("failed to create AI client")?;

    let outcome =
        pipeline::run_full(config, store, &server, &ai).context("pipeline run failed")?;

    match outcome {
        RunOutcome::Bootstrapped => {
            println!("First run: checkpoint primed, collection starts next run.");
        }
        RunOutcome::NothingToSummarize => {
            println!("No accumulated notes to summarize.");
        }
        RunOutcome::Published { note_id } => {
            println!("Digest published as note {}.", note_id);
        }
    }
    Ok(())
}

fn cmd_collect(config: &Config, store: &FileStore) -> Result<()> {
    config.collector.validate().context("invalid collector configuration")?;
    let server = MisskeyClient::new(&config.server).context("failed to create server client")?;

    let exclude_user_id = config
        .server
        .exclude_user_id
        .as_deref()
        .context("server.exclude_user_id is required")?;

    let collector = Collector::new(&server, &config.collector, exclude_user_id);
    let outcome = collector.collect(store).context("collection failed")?;

    match outcome {
        CollectOutcome::Bootstrapped { checkpoint } => {
            println!(
                "First run: stored checkpoint {}, collection starts next run.",
                checkpoint
            );
        }
        CollectOutcome::Empty => {
            println!("No new notes.");
        }
        CollectOutcome::Collected {
            fetched,
            kept,
            checkpoint,
        } => {
            println!(
                "Collected {} note(s), kept {} after filtering. Checkpoint is now {}.",
                fetched, kept, checkpoint
            );
        }
    }
    Ok(())
}

fn cmd_summarize(config: &Config, store: &FileStore) -> Result<()> {
    let ai = HttpSummaryClient::new(&config.ai).context("failed to create AI client")?;

    pipeline::run_summarize(store, &ai, config.ai.chunk_size).context("summarization failed")?;

    println!("Summary written; note log archived.");
    Ok(())
}

fn cmd_post(config: &Config, store: &FileStore) -> Result<()> {
    let server = MisskeyClient::new(&config.server).context("failed to create server client")?;

    let publisher = Publisher::new(&server, &config.post);
    let note_id = publisher.publish(store).context("publishing failed")?;

    println!("Digest published as note {}.", note_id);
    Ok(())
}

fn cmd_renote(config: &Config, store: &FileStore) -> Result<()> {
    let server = MisskeyClient::new(&config.server).context("failed to create server client")?;

    let note_id = pipeline::run_rebroadcast(store, &server).context("rebroadcast failed")?;

    println!("Renoted digest {}.", note_id);
    Ok(())
}

fn cmd_status(config: &Config, store: &FileStore) -> Result<()> {
    println!("notedigest configuration");
    println!("========================");
    println!();
    println!("Config file:     {}", Config::config_path().display());
    println!(
        "Data directory:  {}",
        config.storage.resolved_data_dir().display()
    );
    println!("Log file:        {}", Config::log_path().display());
    println!(
        "Server:          {}",
        config.server.url.as_deref().unwrap_or("(not configured)")
    );
    println!(
        "AI endpoint:     {}",
        config.ai.endpoint_url.as_deref().unwrap_or("(not configured)")
    );
    println!("Collector mode:  {:?}", config.collector.mode);
    println!("Log variant:     {:?}", config.collector.variant);
    println!();

    println!("Artifacts");
    println!("---------");
    for artifact in [
        Artifact::Checkpoint,
        Artifact::NoteLog,
        Artifact::Summary,
        Artifact::LastPostId,
    ] {
        let state = match store.read(artifact)? {
            Some(contents) => format!("present ({} chars)", contents.chars().count()),
            None => "absent".to_string(),
        };
        println!("{:<14} {}", artifact.as_str(), state);
    }

    Ok(())
}
