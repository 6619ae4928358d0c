//! Error types shared by the upload drivers

use thiserror::Error;

/// Errors surfaced by uploads
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UploadError {
    /// Invalid constructor options, reported before any I/O
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Connection-level failure reported by the transport.
    /// HTTP error statuses are not transport errors; they resolve normally.
    #[error("transport error: {0}")]
    Transport(String),

    /// Failure while encoding or reading a form body
    #[error("body error: {0}")]
    Body(String),
}

pub type UploadResult<T> = Result<T, UploadError>;

impl UploadError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
