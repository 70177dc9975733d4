//! Incremental note collection
//!
//! The collector fetches new notes since the persisted checkpoint (or
//! within a lagged time window), filters them, renders them into the
//! note log, and advances the checkpoint. The checkpoint is written
//! from the *unfiltered* batch, before any rendering, so a crash after
//! the checkpoint write never causes duplicate re-processing — at the
//! cost of losing the batch if a later step fails.

use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, Utc};
use std::time::Duration;

use crate::config::{CollectMode, CollectorConfig, LogVariant};
use crate::error::Result;
use crate::misskey::{NoteSource, PageRequest};
use crate::retry::RetryPolicy;
use crate::store::{Artifact, ArtifactStore};
use crate::types::Note;

/// Rendered timestamps use UTC+9
const LOCAL_OFFSET_SECS: i32 = 9 * 3600;

/// Separator between raw texts in the strict variant
const STRICT_SEPARATOR: &str = "\n\n---\n\n";

/// Placeholder body for kept notes without text (rich variant)
const EMPTY_TEXT_PLACEHOLDER: &str = "(no text)";

/// Sentinel rendered when a timestamp cannot be parsed
const UNKNOWN_TIME: &str = "unknown time";

/// Tagged outcome of one collection run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectOutcome {
    /// First-ever run: the newest note ID was stored as the checkpoint
    /// and nothing was collected, to avoid summarizing unbounded backlog
    Bootstrapped { checkpoint: String },
    /// No new notes since the checkpoint
    Empty,
    /// Notes were fetched; `kept` of them survived filtering and were
    /// rendered into the note log
    Collected {
        fetched: usize,
        kept: usize,
        checkpoint: String,
    },
}

/// Collects notes from a [`NoteSource`] into the note log
pub struct Collector<'a> {
    source: &'a dyn NoteSource,
    config: &'a CollectorConfig,
    exclude_user_id: &'a str,
    retry: RetryPolicy,
}

impl<'a> Collector<'a> {
    pub fn new(
        source: &'a dyn NoteSource,
        config: &'a CollectorConfig,
        exclude_user_id: &'a str,
    ) -> Self {
        let retry = RetryPolicy::new(
            config.max_retries,
            Duration::from_secs(config.retry_delay_secs),
        );
        Self {
            source,
            config,
            exclude_user_id,
            retry,
        }
    }

    /// Run one collection cycle against the store
    pub fn collect(&self, store: &dyn ArtifactStore) -> Result<CollectOutcome> {
        match self.config.mode {
            CollectMode::Cursor => self.collect_cursor(store),
            CollectMode::Window => self.collect_window(store),
        }
    }

    /// Cursor mode: follow `sinceId` pages from the checkpoint
    fn collect_cursor(&self, store: &dyn ArtifactStore) -> Result<CollectOutcome> {
        let checkpoint = store
            .read(Artifact::Checkpoint)?
            .filter(|s| !s.is_empty());

        let Some(checkpoint) = checkpoint else {
            return self.bootstrap(store);
        };

        tracing::info!(checkpoint = %checkpoint, "Collecting notes since checkpoint");

        let mut batch: Vec<Note> = Vec::new();
        let mut cursor = checkpoint.clone();

        for page_no in 1..=self.config.max_pages {
            let request = PageRequest {
                limit: self.config.page_size,
                since_id: Some(cursor.clone()),
                ..Default::default()
            };

            let page = match self
                .retry
                .run("timeline page", || self.source.fetch_page(&request))
            {
                Ok(page) => page,
                Err(e) => {
                    // Partial results are still used, not discarded
                    tracing::warn!(
                        page = page_no,
                        error = %e,
                        "Page fetch failed after retries, terminating pagination early"
                    );
                    break;
                }
            };

            if page.is_empty() {
                break;
            }

            if let Some(max_id) = page.iter().map(|n| n.id.as_str()).max() {
                cursor = max_id.to_string();
            }
            batch.extend(page);
        }

        self.finish(store, Some(checkpoint), batch)
    }

    /// First-ever run: store the newest note ID and collect nothing
    fn bootstrap(&self, store: &dyn ArtifactStore) -> Result<CollectOutcome> {
        tracing::info!("No checkpoint found, bootstrapping from the newest note");

        let request = PageRequest {
            limit: 1,
            ..Default::default()
        };
        let page = self
            .retry
            .run("bootstrap fetch", || self.source.fetch_page(&request))?;

        let Some(newest) = page.iter().map(|n| n.id.as_str()).max() else {
            tracing::info!("Timeline is empty, nothing to bootstrap from");
            return Ok(CollectOutcome::Empty);
        };

        store.write(Artifact::Checkpoint, newest)?;
        tracing::info!(checkpoint = newest, "Stored initial checkpoint");

        Ok(CollectOutcome::Bootstrapped {
            checkpoint: newest.to_string(),
        })
    }

    /// Window mode: collect `[now - lag_start, now - lag_end)` with
    /// `untilId` pagination inside the fixed window. The lag leaves
    /// room for the source server's propagation/edit delay.
    fn collect_window(&self, store: &dyn ArtifactStore) -> Result<CollectOutcome> {
        let now = Utc::now();
        let start = now - ChronoDuration::minutes(self.config.window_lag_start_mins);
        let end = now - ChronoDuration::minutes(self.config.window_lag_end_mins);

        tracing::info!(
            start = %start.to_rfc3339(),
            end = %end.to_rfc3339(),
            "Collecting notes in lagged window"
        );

        let checkpoint = store
            .read(Artifact::Checkpoint)?
            .filter(|s| !s.is_empty());

        let mut batch: Vec<Note> = Vec::new();
        let mut until_id: Option<String> = None;

        for page_no in 1..=self.config.max_pages {
            let request = PageRequest {
                limit: self.config.page_size,
                since_date: Some(start.timestamp_millis()),
                // The first page is bounded by time; later pages walk
                // backwards from the oldest note seen so far
                until_date: until_id.is_none().then(|| end.timestamp_millis()),
                until_id: until_id.clone(),
                ..Default::default()
            };

            let page = match self
                .retry
                .run("timeline page", || self.source.fetch_page(&request))
            {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!(
                        page = page_no,
                        error = %e,
                        "Page fetch failed after retries, terminating pagination early"
                    );
                    break;
                }
            };

            if page.is_empty() {
                break;
            }

            until_id = page.iter().map(|n| n.id.clone()).min();
            batch.extend(page);
        }

        self.finish(store, checkpoint, batch)
    }

    /// Shared tail of both modes: normalize, advance the checkpoint,
    /// filter, render, persist.
    fn finish(
        &self,
        store: &dyn ArtifactStore,
        prior_checkpoint: Option<String>,
        mut batch: Vec<Note>,
    ) -> Result<CollectOutcome> {
        if batch.is_empty() {
            tracing::info!("No new notes");
            return Ok(CollectOutcome::Empty);
        }

        // Normalize to oldest-first and drop duplicate/already-seen IDs.
        // Note IDs are monotonic, so sorting on them is order-correct
        // for both cursor (oldest-first) and window (newest-first) pages.
        batch.sort_by(|a, b| a.id.cmp(&b.id));
        batch.dedup_by(|a, b| a.id == b.id);
        if let Some(prior) = &prior_checkpoint {
            batch.retain(|n| n.id.as_str() > prior.as_str());
        }

        if batch.is_empty() {
            tracing::info!("No new notes beyond the checkpoint");
            return Ok(CollectOutcome::Empty);
        }

        let fetched = batch.len();

        // Advance the checkpoint from the unfiltered batch, before any
        // rendering, and never move it backwards.
        let newest = batch[batch.len() - 1].id.clone();
        let checkpoint = match prior_checkpoint {
            Some(prior) if prior.as_str() >= newest.as_str() => prior,
            _ => newest,
        };
        store.write(Artifact::Checkpoint, &checkpoint)?;
        tracing::info!(fetched, checkpoint = %checkpoint, "Advanced checkpoint");

        let kept: Vec<&Note> = batch.iter().filter(|n| self.keep(n)).collect();
        if kept.is_empty() {
            tracing::info!("All fetched notes were filtered out");
            return Ok(CollectOutcome::Collected {
                fetched,
                kept: 0,
                checkpoint,
            });
        }

        match self.config.variant {
            LogVariant::Rich => {
                let blocks: Vec<String> = kept.iter().map(|n| render_block(n)).collect();
                let rendered = blocks.join("\n\n");

                // Separate from previous runs with a blank line only if
                // the log already has content
                let log_has_content = store
                    .read(Artifact::NoteLog)?
                    .map_or(false, |s| !s.is_empty());
                if log_has_content {
                    store.append(Artifact::NoteLog, "\n\n")?;
                }
                store.append(Artifact::NoteLog, &rendered)?;
            }
            LogVariant::Strict => {
                // Single-run snapshot: the log is rewritten fresh
                let texts: Vec<&str> = kept
                    .iter()
                    .filter_map(|n| n.text.as_deref())
                    .map(str::trim)
                    .collect();
                store.write(Artifact::NoteLog, &texts.join(STRICT_SEPARATOR))?;
            }
        }

        tracing::info!(fetched, kept = kept.len(), "Collection cycle complete");
        Ok(CollectOutcome::Collected {
            fetched,
            kept: kept.len(),
            checkpoint,
        })
    }

    /// Filtering policy. The bot's own notes and renotes are always
    /// dropped; the strict variant additionally drops CW and empty-text
    /// notes.
    fn keep(&self, note: &Note) -> bool {
        if note.user.id == self.exclude_user_id {
            return false;
        }
        if note.is_renote() {
            return false;
        }
        if self.config.variant == LogVariant::Strict {
            if note.cw.is_some() {
                return false;
            }
            if note.text.as_deref().map_or(true, |t| t.trim().is_empty()) {
                return false;
            }
        }
        true
    }
}

/// Render one note as a delimited block (rich variant)
fn render_block(note: &Note) -> String {
    let text = note
        .text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(EMPTY_TEXT_PLACEHOLDER);

    let mut block = format!(
        "=========\n[{}]\n[{}]\n[{}]\n[{} reactions]",
        note.display_name(),
        local_time_string(&note.created_at),
        text,
        note.reaction_total()
    );
    if note.has_media() {
        block.push_str("\n[media attached]");
    }
    block.push_str("\n=========");
    block
}

/// Convert an ISO-8601 UTC timestamp to `YYYY/MM/DD HH:MM:SS` in UTC+9.
/// A malformed timestamp renders as a sentinel instead of aborting the
/// run.
fn local_time_string(created_at: &str) -> String {
    let Some(offset) = FixedOffset::east_opt(LOCAL_OFFSET_SECS) else {
        return UNKNOWN_TIME.to_string();
    };
    match DateTime::parse_from_rfc3339(created_at) {
        Ok(dt) => dt
            .with_timezone(&offset)
            .format("%Y/%m/%d %H:%M:%S")
            .to_string(),
        Err(e) => {
            tracing::warn!(created_at, error = %e, "Unparseable timestamp");
            UNKNOWN_TIME.to_string()
        }
    }
}
