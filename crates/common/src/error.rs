//! Error types shared across imagerow crates.
//!
//! Two failure classes matter to the pipeline:
//! - [`DecodeError`]: an image could not be measured. Fatal for its batch.
//! - [`ExportError`]: compositing or saving failed. The batch stays usable.

use std::path::PathBuf;

/// A source image could not be decoded far enough to learn its width.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Failed to decode {descriptor}: {reason}")]
pub struct DecodeError {
    /// Identity of the offending descriptor (preview URL or file name).
    pub descriptor: String,

    /// Human-readable cause.
    pub reason: String,
}

impl DecodeError {
    pub fn new(descriptor: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            descriptor: descriptor.into(),
            reason: reason.into(),
        }
    }

    /// The descriptor no longer resolves to any bytes.
    pub fn revoked(descriptor: impl Into<String>) -> Self {
        Self::new(descriptor, "preview handle has been revoked")
    }
}

/// Compositing or saving the composite failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExportError {
    #[error("Placement {descriptor} could not be read: {reason}")]
    UnreadablePlacement { descriptor: String, reason: String },

    #[error("Canvas has zero width")]
    EmptyCanvas,

    #[error("Canvas height {height} is shorter than the tallest image ({tallest})")]
    CanvasTooShort { height: u32, tallest: u32 },

    #[error("Encode error: {message}")]
    Encode { message: String },

    #[error("Save error: {message}")]
    Save { message: String },
}

impl ExportError {
    pub fn unreadable(descriptor: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnreadablePlacement {
            descriptor: descriptor.into(),
            reason: reason.into(),
        }
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode {
            message: msg.into(),
        }
    }

    pub fn save(msg: impl Into<String>) -> Self {
        Self::Save {
            message: msg.into(),
        }
    }
}

/// Top-level error type for imagerow operations.
#[derive(Debug, thiserror::Error)]
pub enum ImagerowError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ImagerowError.
pub type ImagerowResult<T> = Result<T, ImagerowError>;

impl ImagerowError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }
}
