use crate::storage::StorageMode;
use thiserror::Error;

/// Errors surfaced by the log engine and its storage backends.
///
/// `log()` itself never returns one of these — write failures are reported
/// through the fallback tracing channel and swallowed. Read, count, clear,
/// purge and insights operations propagate them to the caller.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The active backend cannot perform the requested operation.
    ///
    /// Returned for `purge` and `insights` when the file backend is active.
    /// This is a distinct signal, never a silent no-op.
    #[error("operation '{operation}' is not supported by the {backend} backend")]
    Unsupported {
        backend: StorageMode,
        operation: &'static str,
    },

    #[error("log file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("database operation failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("context serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl StoreError {
    pub fn unsupported(backend: StorageMode, operation: &'static str) -> Self {
        Self::Unsupported { backend, operation }
    }

    /// True when the error is the unsupported-operation signal.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}
