//! HTTP client for the Misskey API
//!
//! Misskey endpoints are all POST with the auth token carried as `i` in
//! the JSON body. The client exposes synchronous methods backed by an
//! owned current-thread tokio runtime; the pipeline is strictly
//! sequential, so nothing is gained by surfacing async here.

use std::time::Duration;

use serde_json::json;

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::types::{decode_notes, Note};

/// One page request against the timeline endpoint
#[derive(Debug, Clone, Default)]
pub struct PageRequest {
    /// Page size (server max 100)
    pub limit: usize,
    /// Return notes strictly newer than this ID
    pub since_id: Option<String>,
    /// Return notes strictly older than this ID
    pub until_id: Option<String>,
    /// Lower time bound, epoch milliseconds
    pub since_date: Option<i64>,
    /// Upper time bound, epoch milliseconds
    pub until_date: Option<i64>,
}

/// Draft of a new note
#[derive(Debug, Clone)]
pub struct NoteDraft<'a> {
    pub text: &'a str,
    pub visibility: &'a str,
    pub content_warning: Option<&'a str>,
}

/// Source of timeline pages (seam for tests)
pub trait NoteSource {
    /// Fetch one page of notes. Order is as returned by the server;
    /// callers must not assume a direction.
    fn fetch_page(&self, request: &PageRequest) -> Result<Vec<Note>>;
}

/// Note creation and rebroadcast (seam for tests)
pub trait NotePoster {
    /// Create a note, returning the created note's ID
    fn create_note(&self, draft: &NoteDraft) -> Result<String>;

    /// Renote an existing note by ID
    fn renote(&self, note_id: &str) -> Result<()>;
}

/// HTTP client for a Misskey-compatible server
pub struct MisskeyClient {
    base_url: String,
    token: String,
    http: reqwest::Client,
    runtime: tokio::runtime::Runtime,
}

impl MisskeyClient {
    /// Create a new client from configuration
    ///
    /// Returns an error if the configuration is invalid or missing
    /// required fields.
    pub fn new(config: &ServerConfig) -> Result<Self> {
        config.validate()?;

        let base_url = config
            .url
            .clone()
            .ok_or_else(|| Error::Config("server.url is required".to_string()))?
            .trim_end_matches('/')
            .to_string();
        let token = config
            .token
            .clone()
            .ok_or_else(|| Error::Config("server.token is required".to_string()))?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Config(format!("failed to build tokio runtime: {}", e)))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            token,
            http,
            runtime,
        })
    }

    /// POST a Misskey API endpoint with the token injected into the body
    fn post_api(&self, path: &str, mut body: serde_json::Value) -> Result<serde_json::Value> {
        let url = format!("{}/api/{}", self.base_url, path);
        body["i"] = json!(self.token);

        self.runtime.block_on(async {
            let response = self
                .http
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| Error::Api(format!("request failed: {}", e)))?;

            let status = response.status();

            if status.is_success() {
                // Some endpoints (renote without body capture) return 204
                if status == reqwest::StatusCode::NO_CONTENT {
                    return Ok(serde_json::Value::Null);
                }
                response
                    .json::<serde_json::Value>()
                    .await
                    .map_err(|e| Error::Api(format!("failed to parse response: {}", e)))
            } else {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown".to_string());
                Err(Error::Api(format!(
                    "response ({}): {}",
                    status.as_u16(),
                    error_text
                )))
            }
        })
    }
}

impl NoteSource for MisskeyClient {
    fn fetch_page(&self, request: &PageRequest) -> Result<Vec<Note>> {
        let mut body = json!({ "limit": request.limit });
        if let Some(since_id) = &request.since_id {
            body["sinceId"] = json!(since_id);
        }
        if let Some(until_id) = &request.until_id {
            body["untilId"] = json!(until_id);
        }
        if let Some(since_date) = request.since_date {
            body["sinceDate"] = json!(since_date);
        }
        if let Some(until_date) = request.until_date {
            body["untilDate"] = json!(until_date);
        }

        let value = self.post_api("notes/local-timeline", body)?;
        let values: Vec<serde_json::Value> = serde_json::from_value(value)
            .map_err(|e| Error::Api(format!("timeline response is not an array: {}", e)))?;

        Ok(decode_notes(values))
    }
}

impl NotePoster for MisskeyClient {
    fn create_note(&self, draft: &NoteDraft) -> Result<String> {
        let mut body = json!({
            "text": draft.text,
            "visibility": draft.visibility,
        });
        if let Some(cw) = draft.content_warning {
            body["cw"] = json!(cw);
        }

        let value = self.post_api("notes/create", body)?;
        value
            .pointer("/createdNote/id")
            .and_then(|v| v.as_str())
            .map(ToString::to_string)
            .ok_or_else(|| Error::Api("create response missing createdNote.id".to_string()))
    }

    fn renote(&self, note_id: &str) -> Result<()> {
        let body = json!({ "renoteId": note_id });
        self.post_api("notes/create", body)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_requires_valid_config() {
        let config = ServerConfig::default();
        assert!(MisskeyClient::new(&config).is_err());
    }

    #[test]
    fn test_client_with_valid_config() {
        let config = ServerConfig {
            url: Some("https://misskey.example.com/".to_string()),
            token: Some("secret".to_string()),
            exclude_user_id: Some("bot-self-id".to_string()),
            ..Default::default()
        };
        let client = MisskeyClient::new(&config).unwrap();
        assert_eq!(client.base_url, "https://misskey.example.com");
    }
}
