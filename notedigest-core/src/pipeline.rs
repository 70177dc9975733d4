//! Pipeline stage sequencing
//!
//! The full run is a strict sequential dependency chain
//! Collector → Summarizer → Publisher, short-circuiting on the first
//! failure. Archiving and deletion of artifacts is driven by each
//! stage's tagged outcome: the note log is archived only after the
//! summary is persisted, and the summary is deleted only after the
//! digest is posted. A failed stage leaves its inputs untouched for
//! diagnosis and retry.

use crate::collector::{CollectOutcome, Collector};
use crate::error::{Error, Result};
use crate::misskey::{NotePoster, NoteSource};
use crate::publish::{Publisher, Rebroadcaster};
use crate::store::{backup_date_suffix, Artifact, ArtifactStore};
use crate::summarize::{map_reduce, SummaryClient};
use crate::Config;

/// What a full pipeline run accomplished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// First run: the checkpoint was primed; nothing to summarize yet
    Bootstrapped,
    /// The summarize stage had no note log to consume
    NothingToSummarize,
    /// The digest was published
    Published { note_id: String },
}

/// Run the summarize stage: consume the note log, persist the final
/// summary, and archive the consumed log. On failure nothing is
/// persisted and the log is left in place.
pub fn run_summarize(
    store: &dyn ArtifactStore,
    client: &dyn SummaryClient,
    chunk_limit: usize,
) -> Result<()> {
    let note_log = store
        .read(Artifact::NoteLog)?
        .ok_or_else(|| Error::Pipeline("note log artifact is missing".to_string()))?;

    let summary = map_reduce(client, &note_log, chunk_limit)?;

    store.write(Artifact::Summary, &summary)?;
    // Archive, never delete: past logs stay around for audit/debugging
    store.archive(Artifact::NoteLog, &backup_date_suffix())?;

    tracing::info!(
        chars = summary.chars().count(),
        "Summary persisted, note log archived"
    );
    Ok(())
}

/// Run the full pipeline: collect, summarize, publish.
pub fn run_full<S>(
    config: &Config,
    store: &dyn ArtifactStore,
    server: &S,
    ai: &dyn SummaryClient,
) -> Result<RunOutcome>
where
    S: NoteSource + NotePoster,
{
    let exclude_user_id = config
        .server
        .exclude_user_id
        .as_deref()
        .ok_or_else(|| Error::Config("server.exclude_user_id is required".to_string()))?;

    let collector = Collector::new(server, &config.collector, exclude_user_id);
    let outcome = collector.collect(store)?;
    tracing::info!(?outcome, "Collect stage finished");

    if let CollectOutcome::Bootstrapped { .. } = outcome {
        // Nothing accumulated yet; collection proper starts next run
        return Ok(RunOutcome::Bootstrapped);
    }

    // Even an Empty collection may leave earlier runs' notes in the log
    // (rich variant accumulates across runs), so the summarize stage
    // decides for itself whether there is anything to consume.
    if !store.exists(Artifact::NoteLog)? {
        tracing::info!("No note log to summarize");
        return Ok(RunOutcome::NothingToSummarize);
    }

    run_summarize(store, ai, config.ai.chunk_size)?;

    let publisher = Publisher::new(server, &config.post);
    let note_id = publisher.publish(store)?;

    Ok(RunOutcome::Published { note_id })
}

/// Run the rebroadcast stage.
pub fn run_rebroadcast<P: NotePoster>(store: &dyn ArtifactStore, poster: &P) -> Result<String> {
    Rebroadcaster::new(poster).rebroadcast(store)
}
