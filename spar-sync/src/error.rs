//! Error types for spar-sync.
//!
//! Fatal errors ([`SyncError`]) stop a run before any mutation. Errors that
//! happen while mutating the bucket are collected per key ([`UploadError`],
//! [`DeleteError`]) in the publish report instead of being raised.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use spar_classifier::ClassifierError;
use spar_core::ObjectKey;

/// Failure talking to the storage or CDN collaborator.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("object not found: {key}")]
    NotFound { key: ObjectKey },

    #[error("invalid object key '{key}': {reason}")]
    InvalidKey { key: String, reason: &'static str },

    #[error("{op} timed out after {}s", .after.as_secs_f64())]
    Timeout { op: &'static str, after: Duration },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("listing of '{prefix}' repeated continuation token '{token}'")]
    PaginationLoop { prefix: String, token: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("metadata JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BackendError {
    /// Transient failures worth another attempt for idempotent calls.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BackendError::Timeout { .. } | BackendError::Transport(_) | BackendError::Io { .. }
        )
    }
}

/// All fatal errors of a deploy run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Local build output unreadable. Raised before any remote call.
    #[error("cannot scan {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Remote listing incomplete; deletion decisions would be unsafe.
    #[error("listing remote objects under '{prefix}' failed: {source}")]
    Listing {
        prefix: String,
        #[source]
        source: BackendError,
    },

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("classifier error: {0}")]
    Classifier(#[from] ClassifierError),
}

/// A single key that could not be written. Recorded, never fatal.
#[derive(Debug, Error)]
#[error("upload of {key} failed: {source}")]
pub struct UploadError {
    pub key: ObjectKey,
    #[source]
    pub source: BackendError,
}

/// A single orphan that could not be deleted. Left for the next run.
#[derive(Debug, Error)]
#[error("delete of {key} failed: {source}")]
pub struct DeleteError {
    pub key: ObjectKey,
    #[source]
    pub source: BackendError,
}

/// The CDN batch was rejected. Reported as a warning only.
#[derive(Debug, Error)]
#[error("invalidation of {paths} path(s) failed: {source}")]
pub struct InvalidationError {
    pub paths: usize,
    #[source]
    pub source: BackendError,
}

/// Convenience constructor for [`SyncError::Scan`].
pub(crate) fn scan_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Scan {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`BackendError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> BackendError {
    BackendError::Io {
        path: path.into(),
        source,
    }
}
