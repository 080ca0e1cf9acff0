//! Error types for flvpush-media.

use std::io;
use thiserror::Error;

/// Result type for flvpush-media operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for flvpush-media operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The source ended before a fixed-width field was complete.
    #[error("Truncated input: need {needed} bytes, have {available}")]
    TruncatedInput { needed: usize, available: usize },

    /// A tag body was shorter than its header declared.
    #[error("Tag body mismatch: declared {declared} bytes, read {read}")]
    BodyMismatch { declared: usize, read: usize },

    /// A tag body does not fit into the packet buffer.
    #[error("Tag body of {declared} bytes exceeds buffer capacity of {capacity} bytes")]
    CapacityExceeded { declared: usize, capacity: usize },

    /// Invalid FLV file header.
    #[error("Invalid FLV header: {0}")]
    InvalidHeader(String),

    /// Packet error surfaced from the shared types.
    #[error(transparent)]
    Packet(#[from] flvpush_common::Error),
}

impl Error {
    /// Create an invalid header error.
    pub fn invalid_header(msg: impl Into<String>) -> Self {
        Self::InvalidHeader(msg.into())
    }

    /// Whether this error is the normal end-of-file signal.
    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::TruncatedInput { .. })
    }
}
