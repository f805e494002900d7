//! Error types for sampleflow-media.

use thiserror::Error;

/// Result type for sampleflow-media operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type returned by parser subscribers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type for sampleflow-media operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid MP4 file structure.
    #[error("Invalid MP4: {0}")]
    InvalidMp4(String),

    /// Missing required atom in MP4 file.
    #[error("Missing required atom: {0}")]
    MissingAtom(&'static str),

    /// The stream ended before a required box was complete.
    #[error("Truncated input: need {needed} bytes, have {available}")]
    Truncated { needed: u64, available: u64 },

    /// The stream ended before every sample of the extracted track arrived.
    #[error("Stream ended after {delivered} of {declared} samples of track {track_id}")]
    IncompleteSamples {
        track_id: u32,
        delivered: u64,
        declared: u64,
    },

    /// A chunk was appended at an offset other than the current end of data.
    #[error("Non-contiguous append: expected offset {expected}, got {got}")]
    NonContiguousAppend { expected: u64, got: u64 },

    /// The parser was used after `flush`.
    #[error("Parser already flushed")]
    Flushed,

    /// Unsupported feature or codec.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// A subscribed handler rejected an event.
    #[error("Handler failed: {0}")]
    Handler(#[source] BoxError),
}

impl Error {
    /// Create an invalid MP4 error.
    pub fn invalid_mp4(msg: impl Into<String>) -> Self {
        Self::InvalidMp4(msg.into())
    }

    /// Create an unsupported error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }
}
