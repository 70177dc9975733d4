//! Digest publication and rebroadcast
//!
//! The publisher reads the persisted summary, composes the post with a
//! date-stamped preamble, and refuses to publish anything over the
//! length cap — truncation would post cut-off content, so over-length
//! is a hard failure before any network call. The rebroadcaster later
//! renotes the published digest by its persisted ID.

use chrono::{Duration, Local};

use crate::config::PostConfig;
use crate::error::{Error, Result};
use crate::misskey::{NoteDraft, NotePoster};
use crate::store::{Artifact, ArtifactStore};

/// Posts the final summary as a digest note
pub struct Publisher<'a> {
    poster: &'a dyn NotePoster,
    config: &'a PostConfig,
}

impl<'a> Publisher<'a> {
    pub fn new(poster: &'a dyn NotePoster, config: &'a PostConfig) -> Self {
        Self { poster, config }
    }

    /// Publish the persisted summary. On success the created note's ID
    /// is persisted for the rebroadcast run and the summary artifact is
    /// deleted; on failure all artifacts are left intact for manual
    /// inspection.
    pub fn publish(&self, store: &dyn ArtifactStore) -> Result<String> {
        let summary = store
            .read(Artifact::Summary)?
            .ok_or_else(|| Error::Pipeline("summary artifact is missing".to_string()))?;

        if summary.trim().is_empty() {
            return Err(Error::Pipeline("summary artifact is blank".to_string()));
        }

        let body = compose_post(&summary);
        let length = body.chars().count();
        if length > self.config.max_length {
            return Err(Error::Pipeline(format!(
                "composed post is too long ({} chars, cap {}), refusing to publish",
                length, self.config.max_length
            )));
        }

        tracing::info!(length, "Publishing digest");
        let draft = NoteDraft {
            text: &body,
            visibility: &self.config.visibility,
            content_warning: self.config.content_warning.as_deref(),
        };
        let note_id = self.poster.create_note(&draft)?;

        store.write(Artifact::LastPostId, &note_id)?;
        if let Err(e) = store.delete(Artifact::Summary) {
            // Best-effort cleanup; never mask a successful publish
            tracing::warn!(error = %e, "Failed to delete consumed summary artifact");
        }

        tracing::info!(note_id = %note_id, "Digest published");
        Ok(note_id)
    }
}

/// Re-shares the previously published digest
pub struct Rebroadcaster<'a> {
    poster: &'a dyn NotePoster,
}

impl<'a> Rebroadcaster<'a> {
    pub fn new(poster: &'a dyn NotePoster) -> Self {
        Self { poster }
    }

    /// Renote the persisted digest note. On success the ID artifact is
    /// deleted; on failure it is left in place so the next scheduled
    /// run retries the same renote.
    pub fn rebroadcast(&self, store: &dyn ArtifactStore) -> Result<String> {
        let note_id = store
            .read(Artifact::LastPostId)?
            .ok_or_else(|| Error::Pipeline("last-post-ID artifact is missing".to_string()))?;

        if note_id.is_empty() {
            return Err(Error::Pipeline("last-post-ID artifact is blank".to_string()));
        }

        self.poster.renote(&note_id)?;

        if let Err(e) = store.delete(Artifact::LastPostId) {
            tracing::warn!(error = %e, "Failed to delete consumed last-post-ID artifact");
        }

        tracing::info!(note_id = %note_id, "Digest rebroadcast");
        Ok(note_id)
    }
}

/// Compose the post body: a date-stamped preamble (yesterday's date,
/// since the digest covers the previous day) followed by the summary.
fn compose_post(summary: &str) -> String {
    let yesterday = Local::now() - Duration::days(1);
    format!(
        "Timeline digest for {}.\n\n{}",
        yesterday.format("%Y/%m/%d"),
        summary
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingPoster {
        created: RefCell<Vec<(String, String, Option<String>)>>,
        renoted: RefCell<Vec<String>>,
        fail_renote: bool,
    }

    impl NotePoster for RecordingPoster {
        fn create_note(&self, draft: &NoteDraft) -> Result<String> {
            self.created.borrow_mut().push((
                draft.text.to_string(),
                draft.visibility.to_string(),
                draft.content_warning.map(str::to_string),
            ));
            Ok("posted-note-id".to_string())
        }

        fn renote(&self, note_id: &str) -> Result<()> {
            if self.fail_renote {
                return Err(Error::Api("response (500): boom".to_string()));
            }
            self.renoted.borrow_mut().push(note_id.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_missing_summary_fails_without_network_calls() {
        let poster = RecordingPoster::default();
        let config = PostConfig::default();
        let store = MemoryStore::new();

        assert!(Publisher::new(&poster, &config).publish(&store).is_err());
        assert!(poster.created.borrow().is_empty());
    }

    #[test]
    fn test_blank_summary_fails() {
        let poster = RecordingPoster::default();
        let config = PostConfig::default();
        let store = MemoryStore::new();
        store.write(Artifact::Summary, "  \n ").unwrap();

        assert!(Publisher::new(&poster, &config).publish(&store).is_err());
        assert!(poster.created.borrow().is_empty());
        // Artifact left intact for inspection
        assert!(store.exists(Artifact::Summary).unwrap());
    }

    #[test]
    fn test_over_length_post_is_rejected_not_truncated() {
        let poster = RecordingPoster::default();
        let config = PostConfig::default();
        let store = MemoryStore::new();
        store.write(Artifact::Summary, &"x".repeat(3000)).unwrap();

        assert!(Publisher::new(&poster, &config).publish(&store).is_err());
        assert!(poster.created.borrow().is_empty());
        assert!(store.exists(Artifact::Summary).unwrap());
    }

    #[test]
    fn test_publish_success_persists_id_and_deletes_summary() {
        let poster = RecordingPoster::default();
        let config = PostConfig {
            content_warning: Some("daily digest".to_string()),
            ..Default::default()
        };
        let store = MemoryStore::new();
        store.write(Artifact::Summary, "a fine summary").unwrap();

        let id = Publisher::new(&poster, &config).publish(&store).unwrap();
        assert_eq!(id, "posted-note-id");
        assert_eq!(
            store.read(Artifact::LastPostId).unwrap().as_deref(),
            Some("posted-note-id")
        );
        assert!(!store.exists(Artifact::Summary).unwrap());

        let created = poster.created.borrow();
        assert_eq!(created.len(), 1);
        let (body, visibility, cw) = &created[0];
        assert!(body.starts_with("Timeline digest for "));
        assert!(body.ends_with("a fine summary"));
        assert_eq!(visibility, "public");
        assert_eq!(cw.as_deref(), Some("daily digest"));
    }

    #[test]
    fn test_rebroadcast_consumes_id() {
        let poster = RecordingPoster::default();
        let store = MemoryStore::new();
        store.write(Artifact::LastPostId, "posted-note-id\n").unwrap();

        let id = Rebroadcaster::new(&poster).rebroadcast(&store).unwrap();
        assert_eq!(id, "posted-note-id");
        assert_eq!(poster.renoted.borrow().as_slice(), ["posted-note-id"]);
        assert!(!store.exists(Artifact::LastPostId).unwrap());
    }

    #[test]
    fn test_rebroadcast_failure_leaves_id_for_retry() {
        let poster = RecordingPoster {
            fail_renote: true,
            ..Default::default()
        };
        let store = MemoryStore::new();
        store.write(Artifact::LastPostId, "posted-note-id").unwrap();

        assert!(Rebroadcaster::new(&poster).rebroadcast(&store).is_err());
        assert!(store.exists(Artifact::LastPostId).unwrap());
    }

    #[test]
    fn test_rebroadcast_missing_id_fails() {
        let poster = RecordingPoster::default();
        let store = MemoryStore::new();
        assert!(Rebroadcaster::new(&poster).rebroadcast(&store).is_err());
        assert!(poster.renoted.borrow().is_empty());
    }
}
