//! Storage backends.
//!
//! Two implementations sit behind one trait: an append-only JSON-lines
//! file and a SQLite table with a versioned, migrate-in-place schema.
//! The engine selects one per call from the current configuration
//! snapshot, so the backends stay interchangeable at runtime.
//!
//! Cost models differ by design: the file backend can only scan, so
//! filtered reads load the whole file; the table backend pushes count
//! and purge predicates into SQL. Operations a backend cannot express
//! return the distinct `StoreError::Unsupported` signal instead of
//! silently no-op'ing.

pub mod database;
pub mod file;

use crate::engine::entry::{Level, RawRecord, StructuredData};
use crate::error::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use database::DatabaseStore;
pub use file::FileStore;

/// Which backend persists entries. Read fresh from configuration at the
/// start of every operation; never cached across a read/write cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    File,
    Database,
}

impl StorageMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageMode::File => "file",
            StorageMode::Database => "database",
        }
    }
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully prepared entry handed to a backend for persistence: the
/// human-readable string form plus the structured enrichment fields.
#[derive(Debug, Clone)]
pub struct WriteRecord {
    pub timestamp: String,
    pub level: Level,
    pub message: String,
    /// Serialized context, empty when the context map was empty.
    pub context: String,
    pub structured: StructuredData,
}

/// Predicates a backend may be able to push into its own query layer
/// (count and purge on the database backend).
#[derive(Debug, Clone, Default)]
pub struct StoreFilter {
    pub level: Option<Level>,
    pub plugin: Option<String>,
    pub search: Option<String>,
}

impl StoreFilter {
    pub fn is_empty(&self) -> bool {
        self.level.is_none() && self.plugin.is_none() && self.search.is_none()
    }
}

/// The write/read/delete contract both backends satisfy.
#[async_trait]
pub trait LogStore: Send + Sync {
    fn mode(&self) -> StorageMode;

    /// Persist one record. Returns the generated id when the backend has
    /// stable identities.
    async fn append(&self, record: &WriteRecord) -> Result<Option<i64>, StoreError>;

    /// Fetch raw records most-recent-first. `limit: None` means the
    /// entire store; `offset` is only meaningful for backends with
    /// stable ordering (the table backend).
    async fn fetch(&self, limit: Option<usize>, offset: usize)
        -> Result<Vec<RawRecord>, StoreError>;

    /// Count records matching pushed-down predicates. Unsupported on the
    /// file backend — the engine full-scans there instead.
    async fn count(&self, filter: &StoreFilter) -> Result<u64, StoreError>;

    /// Unconditionally empty the store.
    async fn clear(&self) -> Result<(), StoreError>;

    /// Delete records matching the predicates, returning the number
    /// removed. Unsupported on the file backend.
    async fn purge(&self, filter: &StoreFilter) -> Result<u64, StoreError>;
}
