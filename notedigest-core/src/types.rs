//! Core domain types for notedigest
//!
//! These types mirror the subset of the Misskey note shape the pipeline
//! consumes. Notes are immutable once fetched; the note ID is an opaque
//! token that sorts lexicographically in creation order, which makes it
//! usable both as a pagination cursor and as the persisted checkpoint.

use serde::Deserialize;
use std::collections::HashMap;

/// Author of a note
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NoteAuthor {
    /// Opaque user ID
    pub id: String,
    /// Account name (always present)
    pub username: String,
    /// Display name (optional, falls back to username)
    #[serde(default)]
    pub name: Option<String>,
    /// Whether the account is flagged as a bot
    #[serde(default)]
    pub is_bot: bool,
}

/// A single note fetched from the timeline
///
/// `created_at` is kept as the raw ISO-8601 string so that a malformed
/// timestamp degrades to a sentinel at render time instead of failing
/// the whole batch.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Opaque ordered note ID
    pub id: String,
    /// Creation time, ISO-8601 UTC
    pub created_at: String,
    /// Note body (absent for pure renotes)
    #[serde(default)]
    pub text: Option<String>,
    /// Content warning label, if any
    #[serde(default)]
    pub cw: Option<String>,
    /// ID of the renoted note, if this note is a renote
    #[serde(default)]
    pub renote_id: Option<String>,
    /// Author
    pub user: NoteAuthor,
    /// Attached drive files (only presence matters to the pipeline)
    #[serde(default)]
    pub files: Vec<serde_json::Value>,
    /// Per-emoji reaction counts
    #[serde(default)]
    pub reactions: HashMap<String, u32>,
}

impl Note {
    /// Whether this note is a renote (share), including quote-renotes
    pub fn is_renote(&self) -> bool {
        self.renote_id.is_some()
    }

    /// Whether the note has one or more attachments
    pub fn has_media(&self) -> bool {
        !self.files.is_empty()
    }

    /// Total reaction count across all emoji
    pub fn reaction_total(&self) -> u64 {
        self.reactions.values().map(|&n| u64::from(n)).sum()
    }

    /// Display name, falling back to the account name
    pub fn display_name(&self) -> &str {
        self.user.name.as_deref().unwrap_or(&self.user.username)
    }
}

/// Decode a page of notes leniently.
///
/// A note that fails to deserialize is logged and skipped rather than
/// aborting the page; the rest of the batch is still processed.
pub fn decode_notes(values: Vec<serde_json::Value>) -> Vec<Note> {
    let mut notes = Vec::with_capacity(values.len());
    for value in values {
        match serde_json::from_value::<Note>(value) {
            Ok(note) => notes.push(note),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed note in page");
            }
        }
    }
    notes
}
