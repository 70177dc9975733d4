//! Map-reduce summarization engine
//!
//! The note log is split into bounded chunks, each chunk is summarized
//! independently (map), and the surviving partial summaries are merged
//! by one final AI call (reduce). A failed chunk is skipped, not
//! retried; a failed reduce fails the whole run, because a set of
//! disjoint partial summaries is not an acceptable deliverable.
//!
//! The engine is pure of storage: it takes text in and returns the
//! final summary. Persisting the summary and archiving the consumed
//! note log is the pipeline's job, driven by this function's outcome.

use std::time::Duration;

use serde_json::json;

use crate::chunk::split_chunks;
use crate::config::AiConfig;
use crate::error::{Error, Result};

/// Instruction for the map phase: each chunk is an explicit fragment.
pub const CHUNK_PROMPT: &str = "You are an analyst of a community timeline. \
The text below is one fragment of a day's posts. Extract the notable topics \
and conversations as concise bullet points. Keep in mind that your output \
will later be merged with summaries of the other fragments.";

/// Instruction for the reduce phase: merge fragment summaries into one
/// report, formatted with MFM (Misskey Flavored Markdown).
pub const MERGE_PROMPT: &str = "You are an analyst of a community timeline. \
Below are several fragment summaries that together cover one day of a \
community's posts. Merge them into a single cohesive report of the day. \
Format it for easy reading with MFM (Misskey Flavored Markdown): headings \
like $[x2 Heading], **bold** for emphasis, and > for quotes.";

/// Divider between partial summaries in the reduce input
const PARTIAL_DIVIDER: &str = "\n\n--- (next fragment summary) ---\n\n";

/// Text completion interface for summarization (seam for tests)
pub trait SummaryClient {
    /// Send `{text, prompt}` and return the generated text. The result
    /// is opaque; implementations only guarantee non-emptiness.
    fn complete(&self, text: &str, prompt: &str) -> Result<String>;
}

/// Summarize `text` with the map-reduce strategy.
///
/// Fails if the input is blank, if every chunk-level call fails, or if
/// the final merge call fails. On success, returns the reduce call's
/// output verbatim.
pub fn map_reduce(client: &dyn SummaryClient, text: &str, chunk_limit: usize) -> Result<String> {
    if text.trim().is_empty() {
        return Err(Error::Pipeline(
            "nothing to summarize, note log is blank".to_string(),
        ));
    }

    // Map: summarize each fragment independently. A failed chunk is
    // dropped and the run continues with fewer partial summaries.
    let chunks = split_chunks(text, chunk_limit);
    tracing::info!(
        chars = text.chars().count(),
        chunks = chunks.len(),
        "Starting map phase"
    );

    let mut partials = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        match client.complete(chunk, CHUNK_PROMPT) {
            Ok(partial) => {
                tracing::debug!(chunk = i + 1, total = chunks.len(), "Chunk summarized");
                partials.push(partial);
            }
            Err(e) => {
                tracing::warn!(
                    chunk = i + 1,
                    total = chunks.len(),
                    error = %e,
                    "Chunk summarization failed, skipping"
                );
            }
        }
    }

    if partials.is_empty() {
        return Err(Error::Ai(
            "every chunk summarization failed, cannot reduce".to_string(),
        ));
    }

    // Reduce: merge the partial summaries, in original chunk order,
    // with one final call.
    tracing::info!(partials = partials.len(), "Starting reduce phase");
    let combined = partials.join(PARTIAL_DIVIDER);
    let final_summary = client
        .complete(&combined, MERGE_PROMPT)
        .map_err(|e| Error::Ai(format!("final merge failed: {}", e)))?;

    Ok(final_summary)
}

/// HTTP-backed summary client
///
/// POSTs JSON `{text, prompt}` to the configured endpoint and returns
/// the plain-text response body. The timeout is long (nine minutes by
/// default) to accommodate large-model latency; a timeout or non-2xx
/// status is a failure.
pub struct HttpSummaryClient {
    endpoint: String,
    http: reqwest::Client,
    runtime: tokio::runtime::Runtime,
}

impl HttpSummaryClient {
    /// Create a new client from configuration
    pub fn new(config: &AiConfig) -> Result<Self> {
        config.validate()?;

        let endpoint = config
            .endpoint_url
            .clone()
            .ok_or_else(|| Error::Config("ai.endpoint_url is required".to_string()))?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Config(format!("failed to build tokio runtime: {}", e)))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            endpoint,
            http,
            runtime,
        })
    }
}

impl SummaryClient for HttpSummaryClient {
    fn complete(&self, text: &str, prompt: &str) -> Result<String> {
        tracing::debug!(chars = text.chars().count(), "Sending completion request");

        self.runtime.block_on(async {
            let response = self
                .http
                .post(&self.endpoint)
                .json(&json!({ "text": text, "prompt": prompt }))
                .send()
                .await
                .map_err(|e| Error::Ai(format!("request failed: {}", e)))?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| Error::Ai(format!("failed to read response body: {}", e)))?;

            if !status.is_success() {
                return Err(Error::Ai(format!(
                    "response ({}): {}",
                    status.as_u16(),
                    body
                )));
            }

            if body.trim().is_empty() {
                return Err(Error::Ai("endpoint returned an empty summary".to_string()));
            }

            Ok(body)
        })
    }
}
