//! # notedigest-core
//!
//! Core library for notedigest - a scheduled timeline digest bot for
//! Misskey-compatible servers.
//!
//! This library provides:
//! - An incremental note collector with a persisted checkpoint
//! - A map-reduce summarization engine backed by a remote AI endpoint
//! - Digest publication and self-rebroadcast
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! One scheduled run flows through a strict sequential chain:
//!
//! ```text
//! ┌───────────┐    ┌────────────────┐    ┌───────────┐
//! │ Collector │ ─► │   Summarizer   │ ─► │ Publisher │
//! │ (notes)   │    │ (map-reduce AI)│    │ (digest)  │
//! └───────────┘    └────────────────┘    └───────────┘
//!        persisted artifacts (checkpoint, note log,
//!        summary, last-post-ID) live in an ArtifactStore
//! ```
//!
//! A later scheduled run rebroadcasts the published digest by its
//! persisted note ID.

// Re-export commonly used items at the crate root
pub use config::Config;
pub use error::{Error, Result};
pub use store::{Artifact, ArtifactStore, FileStore, MemoryStore};

// Public modules
pub mod chunk;
pub mod collector;
pub mod config;
pub mod error;
pub mod logging;
pub mod misskey;
pub mod pipeline;
pub mod publish;
pub mod retry;
pub mod store;
pub mod summarize;
pub mod types;
