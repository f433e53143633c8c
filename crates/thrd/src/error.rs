//! Crate error types.

use thiserror::Error;

/// Result type for thread operations.
pub type ThreadResult<T> = Result<T, ThreadError>;

/// Errors that can occur while working with threads.
#[derive(Debug, Error)]
pub enum ThreadError {
    /// A role with this name is already mapped on the thread.
    #[error("role already exists: {0}")]
    RoleExists(String),

    /// No role with this name is mapped on the thread.
    #[error("role does not exist: {0}")]
    RoleMissing(String),

    /// Inline `<image>` placeholders do not match the attached images.
    #[error("message has {placeholders} <image> placeholder(s) but {images} image(s)")]
    ImageCount { placeholders: usize, images: usize },

    /// The input could not be recognized as an image.
    #[error("unknown image type: {0}")]
    UnknownImage(String),

    /// Missing or invalid configuration (e.g. bearer credential).
    #[error("configuration error: {0}")]
    Config(String),

    /// No thread matched the lookup.
    #[error("thread not found: {0}")]
    NotFound(String),

    /// HTTP transport failure.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote peer returned a non-success status.
    #[error("remote peer returned {status}: {body}")]
    Api { status: u16, body: String },

    /// Database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
