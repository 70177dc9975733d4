//! Integration tests for the notedigest pipeline
//!
//! These tests drive the pipeline stages end to end against scripted
//! fakes for the timeline source, the note poster and the AI endpoint,
//! with both the in-memory and the flat-file artifact stores.

use notedigest_core::collector::{CollectOutcome, Collector};
use notedigest_core::config::{CollectorConfig, PostConfig, StorageConfig};
use notedigest_core::error::{Error, Result};
use notedigest_core::misskey::{NoteDraft, NotePoster, NoteSource, PageRequest};
use notedigest_core::pipeline::run_summarize;
use notedigest_core::publish::Publisher;
use notedigest_core::summarize::{CHUNK_PROMPT, MERGE_PROMPT};
use notedigest_core::types::{Note, NoteAuthor};
use notedigest_core::{Artifact, ArtifactStore, FileStore, MemoryStore};
use std::cell::RefCell;
use std::collections::HashMap;
use tempfile::TempDir;

const SELF_ID: &str = "bot-self-id";

fn note(id: &str, user_id: &str, text: Option<&str>) -> Note {
    Note {
        id: id.to_string(),
        created_at: "2025-11-02T01:23:45.000Z".to_string(),
        text: text.map(str::to_string),
        cw: None,
        renote_id: None,
        user: NoteAuthor {
            id: user_id.to_string(),
            username: format!("user-{}", user_id),
            name: None,
            is_bot: user_id == SELF_ID,
        },
        files: Vec::new(),
        reactions: HashMap::new(),
    }
}

/// Scripted timeline source: one canned page per fetch
struct ScriptedSource {
    pages: RefCell<Vec<Vec<Note>>>,
}

impl ScriptedSource {
    fn new(pages: Vec<Vec<Note>>) -> Self {
        Self {
            pages: RefCell::new(pages),
        }
    }
}

impl NoteSource for ScriptedSource {
    fn fetch_page(&self, _request: &PageRequest) -> Result<Vec<Note>> {
        let mut pages = self.pages.borrow_mut();
        if pages.is_empty() {
            Ok(Vec::new())
        } else {
            Ok(pages.remove(0))
        }
    }
}

/// AI fake that counts calls and echoes a fixed reduce output
struct CountingAi {
    calls: RefCell<Vec<String>>,
}

impl CountingAi {
    fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl notedigest_core::summarize::SummaryClient for CountingAi {
    fn complete(&self, _text: &str, prompt: &str) -> Result<String> {
        self.calls.borrow_mut().push(prompt.to_string());
        if prompt == CHUNK_PROMPT {
            Ok("partial summary".to_string())
        } else {
            Ok("the merged digest".to_string())
        }
    }
}

#[derive(Default)]
struct RecordingPoster {
    created: RefCell<usize>,
}

impl NotePoster for RecordingPoster {
    fn create_note(&self, _draft: &NoteDraft) -> Result<String> {
        *self.created.borrow_mut() += 1;
        Ok("posted-id".to_string())
    }

    fn renote(&self, _note_id: &str) -> Result<()> {
        Ok(())
    }
}

fn collector_config() -> CollectorConfig {
    CollectorConfig {
        retry_delay_secs: 0,
        ..Default::default()
    }
}

// ============================================
// Scenario A: bootstrap
// ============================================

#[test]
fn scenario_a_first_run_bootstraps_checkpoint() {
    let source = ScriptedSource::new(vec![vec![note("n42", "u1", Some("latest"))]]);
    let config = collector_config();
    let collector = Collector::new(&source, &config, SELF_ID);
    let store = MemoryStore::new();

    let outcome = collector.collect(&store).unwrap();

    assert_eq!(
        outcome,
        CollectOutcome::Bootstrapped {
            checkpoint: "n42".to_string()
        }
    );
    assert_eq!(
        store.read(Artifact::Checkpoint).unwrap().as_deref(),
        Some("n42")
    );
    // Zero notes emitted
    assert!(!store.exists(Artifact::NoteLog).unwrap());
}

// ============================================
// Scenario B: filtering down to one block
// ============================================

#[test]
fn scenario_b_filtering_keeps_exactly_one_block() {
    let mut renote = note("n03", "u2", None);
    renote.renote_id = Some("n00".to_string());

    let source = ScriptedSource::new(vec![vec![
        note("n02", SELF_ID, Some("self note")),
        renote,
        note("n04", "u3", Some("hello world")),
    ]]);
    let config = collector_config();
    let collector = Collector::new(&source, &config, SELF_ID);
    let store = MemoryStore::new();
    store.write(Artifact::Checkpoint, "n01").unwrap();

    let outcome = collector.collect(&store).unwrap();
    assert_eq!(
        outcome,
        CollectOutcome::Collected {
            fetched: 3,
            kept: 1,
            checkpoint: "n04".to_string()
        }
    );

    let log = store.read(Artifact::NoteLog).unwrap().unwrap();
    // Exactly one delimited block, containing the surviving text
    assert_eq!(log.matches("=========").count(), 2);
    assert!(log.contains("hello world"));
}

// ============================================
// Scenario C: 2500 chars / limit 1000 = 3 map + 1 reduce
// ============================================

#[test]
fn scenario_c_map_reduce_call_count_and_verbatim_output() {
    let store = MemoryStore::new();
    store
        .write(Artifact::NoteLog, &"x".repeat(2500))
        .unwrap();
    let ai = CountingAi::new();

    run_summarize(&store, &ai, 1000).unwrap();

    let calls = ai.calls.borrow();
    assert_eq!(calls.len(), 4);
    assert!(calls[..3].iter().all(|p| p == CHUNK_PROMPT));
    assert_eq!(calls[3], MERGE_PROMPT);

    // The reduce output is persisted verbatim
    assert_eq!(
        store.read(Artifact::Summary).unwrap().as_deref(),
        Some("the merged digest")
    );
    // The consumed log is archived, not deleted
    assert!(!store.exists(Artifact::NoteLog).unwrap());
    assert_eq!(store.archived().len(), 1);
}

// ============================================
// Scenario D: missing summary, publisher makes no calls
// ============================================

#[test]
fn scenario_d_missing_summary_fails_before_network() {
    let poster = RecordingPoster::default();
    let config = PostConfig::default();
    let store = MemoryStore::new();

    let result = Publisher::new(&poster, &config).publish(&store);
    assert!(result.is_err());
    assert_eq!(*poster.created.borrow(), 0);
}

// ============================================
// Cross-run behavior on the flat-file store
// ============================================

#[test]
fn repeated_cycles_never_decrease_checkpoint_on_file_store() {
    let dir = TempDir::new().unwrap();
    let storage = StorageConfig {
        data_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    let store = FileStore::new(&storage).unwrap();
    let config = collector_config();

    // Run 1: bootstrap
    let source = ScriptedSource::new(vec![vec![note("n10", "u1", Some("a"))]]);
    Collector::new(&source, &config, SELF_ID)
        .collect(&store)
        .unwrap();
    assert_eq!(
        store.read(Artifact::Checkpoint).unwrap().as_deref(),
        Some("n10")
    );

    // Run 2: new notes advance the checkpoint
    let source = ScriptedSource::new(vec![vec![
        note("n11", "u1", Some("first")),
        note("n12", "u2", Some("second")),
    ]]);
    Collector::new(&source, &config, SELF_ID)
        .collect(&store)
        .unwrap();
    assert_eq!(
        store.read(Artifact::Checkpoint).unwrap().as_deref(),
        Some("n12")
    );

    // Run 3: the source replays old notes; nothing is re-emitted and
    // the checkpoint stays put
    let source = ScriptedSource::new(vec![vec![
        note("n11", "u1", Some("first")),
        note("n12", "u2", Some("second")),
    ]]);
    let outcome = Collector::new(&source, &config, SELF_ID)
        .collect(&store)
        .unwrap();
    assert_eq!(outcome, CollectOutcome::Empty);
    assert_eq!(
        store.read(Artifact::Checkpoint).unwrap().as_deref(),
        Some("n12")
    );

    let log = store.read(Artifact::NoteLog).unwrap().unwrap();
    assert_eq!(log.matches("first").count(), 1);
    assert_eq!(log.matches("second").count(), 1);
}

#[test]
fn full_cycle_collect_summarize_publish_on_file_store() {
    let dir = TempDir::new().unwrap();
    let storage = StorageConfig {
        data_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    let store = FileStore::new(&storage).unwrap();
    let config = collector_config();

    store.write(Artifact::Checkpoint, "n01").unwrap();
    let source = ScriptedSource::new(vec![vec![
        note("n02", "u1", Some("morning chatter")),
        note("n03", "u2", Some("afternoon news")),
    ]]);
    let outcome = Collector::new(&source, &config, SELF_ID)
        .collect(&store)
        .unwrap();
    assert_eq!(
        outcome,
        CollectOutcome::Collected {
            fetched: 2,
            kept: 2,
            checkpoint: "n03".to_string()
        }
    );

    let ai = CountingAi::new();
    run_summarize(&store, &ai, 1000).unwrap();
    assert!(store.exists(Artifact::Summary).unwrap());
    assert!(!store.exists(Artifact::NoteLog).unwrap());

    let poster = RecordingPoster::default();
    let post_config = PostConfig::default();
    let note_id = Publisher::new(&poster, &post_config).publish(&store).unwrap();
    assert_eq!(note_id, "posted-id");
    assert_eq!(
        store.read(Artifact::LastPostId).unwrap().as_deref(),
        Some("posted-id")
    );
    assert!(!store.exists(Artifact::Summary).unwrap());
}

// ============================================
// Map-reduce failure modes leave no artifacts
// ============================================

struct AllFailAi;

impl notedigest_core::summarize::SummaryClient for AllFailAi {
    fn complete(&self, _text: &str, _prompt: &str) -> Result<String> {
        Err(Error::Ai("response (500): model unavailable".to_string()))
    }
}

#[test]
fn all_map_failures_write_no_summary_artifact() {
    let store = MemoryStore::new();
    store.write(Artifact::NoteLog, "note text").unwrap();

    assert!(run_summarize(&store, &AllFailAi, 100).is_err());
    assert!(!store.exists(Artifact::Summary).unwrap());
    // The note log is preserved for retry
    assert!(store.exists(Artifact::NoteLog).unwrap());
}

struct ReduceFailAi;

impl notedigest_core::summarize::SummaryClient for ReduceFailAi {
    fn complete(&self, _text: &str, prompt: &str) -> Result<String> {
        if prompt == CHUNK_PROMPT {
            Ok("partial".to_string())
        } else {
            Err(Error::Ai("response (500): model unavailable".to_string()))
        }
    }
}

#[test]
fn reduce_failure_writes_no_summary_artifact() {
    let store = MemoryStore::new();
    store.write(Artifact::NoteLog, "note text").unwrap();

    assert!(run_summarize(&store, &ReduceFailAi, 100).is_err());
    assert!(!store.exists(Artifact::Summary).unwrap());
    assert!(store.exists(Artifact::NoteLog).unwrap());
}
