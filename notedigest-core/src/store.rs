//! Artifact storage for pipeline state
//!
//! The pipeline's inter-run state (checkpoint, note log, summary,
//! last-post-ID) lives behind the [`ArtifactStore`] trait so the stages
//! can be tested against an in-memory fake without touching real
//! storage. The production implementation is [`FileStore`]: one UTF-8
//! flat file per artifact, single value or blob per file, no framing.

use crate::config::StorageConfig;
use crate::error::Result;
use chrono::{Duration, Local};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;

/// The four persisted pipeline artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    /// Highest note ID already processed (the bookmark)
    Checkpoint,
    /// Accumulated formatted note text awaiting summarization
    NoteLog,
    /// Final summary awaiting publication
    Summary,
    /// ID of the published digest note awaiting rebroadcast
    LastPostId,
}

impl Artifact {
    /// Stable key name, used by the in-memory store and in log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Artifact::Checkpoint => "checkpoint",
            Artifact::NoteLog => "note_log",
            Artifact::Summary => "summary",
            Artifact::LastPostId => "last_post_id",
        }
    }
}

/// Blob store interface for pipeline artifacts
pub trait ArtifactStore {
    /// Read an artifact's full contents, or None if absent
    fn read(&self, artifact: Artifact) -> Result<Option<String>>;

    /// Write (create or overwrite) an artifact
    fn write(&self, artifact: Artifact, contents: &str) -> Result<()>;

    /// Append to an artifact, creating it if absent
    fn append(&self, artifact: Artifact, contents: &str) -> Result<()>;

    /// Delete an artifact. Deleting an absent artifact is not an error.
    fn delete(&self, artifact: Artifact) -> Result<()>;

    /// Whether the artifact exists
    fn exists(&self, artifact: Artifact) -> Result<bool>;

    /// Archive an artifact by renaming it with a suffix, preserving the
    /// contents for audit/debugging. Archiving an absent artifact is a
    /// no-op.
    fn archive(&self, artifact: Artifact, suffix: &str) -> Result<()>;
}

/// Returns the archive suffix for the run that just completed:
/// `bak_YYYYMMDD` with yesterday's date.
pub fn backup_date_suffix() -> String {
    let yesterday = Local::now() - Duration::days(1);
    format!("bak_{}", yesterday.format("%Y%m%d"))
}

/// Flat-file artifact store
///
/// Files live in the configured data directory under the names from
/// [`StorageConfig`]. Values are trimmed on read so a trailing newline
/// in a hand-edited checkpoint file does not break cursor comparisons.
pub struct FileStore {
    dir: PathBuf,
    names: HashMap<Artifact, String>,
}

impl FileStore {
    /// Create a file store rooted at the storage config's data dir,
    /// creating the directory if needed.
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let dir = config.resolved_data_dir();
        std::fs::create_dir_all(&dir)?;

        let mut names = HashMap::new();
        names.insert(Artifact::Checkpoint, config.checkpoint_file.clone());
        names.insert(Artifact::NoteLog, config.note_log_file.clone());
        names.insert(Artifact::Summary, config.summary_file.clone());
        names.insert(Artifact::LastPostId, config.last_post_id_file.clone());

        Ok(Self { dir, names })
    }

    /// Path for an artifact's file
    pub fn path(&self, artifact: Artifact) -> PathBuf {
        self.dir.join(&self.names[&artifact])
    }
}

impl ArtifactStore for FileStore {
    fn read(&self, artifact: Artifact) -> Result<Option<String>> {
        let path = self.path(artifact);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)?;
        match artifact {
            // Single-token artifacts are trimmed; blobs are kept verbatim
            Artifact::Checkpoint | Artifact::LastPostId => Ok(Some(contents.trim().to_string())),
            Artifact::NoteLog | Artifact::Summary => Ok(Some(contents)),
        }
    }

    fn write(&self, artifact: Artifact, contents: &str) -> Result<()> {
        std::fs::write(self.path(artifact), contents)?;
        Ok(())
    }

    fn append(&self, artifact: Artifact, contents: &str) -> Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(artifact))?;
        file.write_all(contents.as_bytes())?;
        Ok(())
    }

    fn delete(&self, artifact: Artifact) -> Result<()> {
        let path = self.path(artifact);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn exists(&self, artifact: Artifact) -> Result<bool> {
        Ok(self.path(artifact).exists())
    }

    fn archive(&self, artifact: Artifact, suffix: &str) -> Result<()> {
        let path = self.path(artifact);
        if !path.exists() {
            tracing::warn!(
                artifact = artifact.as_str(),
                "Nothing to archive, artifact is absent"
            );
            return Ok(());
        }
        let mut backup = path.clone().into_os_string();
        backup.push(format!(".{}", suffix));
        std::fs::rename(&path, &backup)?;
        tracing::info!(
            artifact = artifact.as_str(),
            backup = %PathBuf::from(&backup).display(),
            "Archived artifact"
        );
        Ok(())
    }
}

/// In-memory artifact store, used by tests and dry runs
#[derive(Default)]
pub struct MemoryStore {
    live: RefCell<HashMap<Artifact, String>>,
    archived: RefCell<Vec<(String, String)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Archived entries as (name, contents) pairs, oldest first
    pub fn archived(&self) -> Vec<(String, String)> {
        self.archived.borrow().clone()
    }
}

impl ArtifactStore for MemoryStore {
    fn read(&self, artifact: Artifact) -> Result<Option<String>> {
        Ok(self.live.borrow().get(&artifact).map(|s| match artifact {
            Artifact::Checkpoint | Artifact::LastPostId => s.trim().to_string(),
            Artifact::NoteLog | Artifact::Summary => s.clone(),
        }))
    }

    fn write(&self, artifact: Artifact, contents: &str) -> Result<()> {
        self.live.borrow_mut().insert(artifact, contents.to_string());
        Ok(())
    }

    fn append(&self, artifact: Artifact, contents: &str) -> Result<()> {
        self.live
            .borrow_mut()
            .entry(artifact)
            .or_default()
            .push_str(contents);
        Ok(())
    }

    fn delete(&self, artifact: Artifact) -> Result<()> {
        self.live.borrow_mut().remove(&artifact);
        Ok(())
    }

    fn exists(&self, artifact: Artifact) -> Result<bool> {
        Ok(self.live.borrow().contains_key(&artifact))
    }

    fn archive(&self, artifact: Artifact, suffix: &str) -> Result<()> {
        if let Some(contents) = self.live.borrow_mut().remove(&artifact) {
            self.archived
                .borrow_mut()
                .push((format!("{}.{}", artifact.as_str(), suffix), contents));
        }
        Ok(())
    }
}
