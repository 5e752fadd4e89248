//! Error types for spar-classifier.

use thiserror::Error;

/// Errors raised while building a MIME registry.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("invalid MIME type '{mime}' for extension '.{extension}'")]
    InvalidMimeType { extension: String, mime: String },

    #[error("invalid file extension '{0}'")]
    InvalidExtension(String),
}
