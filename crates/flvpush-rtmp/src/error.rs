//! Error types for flvpush-rtmp.

use std::io;
use thiserror::Error;

/// Result type for flvpush-rtmp operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for flvpush-rtmp operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The address is not a usable rtmp:// URL.
    #[error("Invalid RTMP URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The TCP connection could not be established.
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The handshake did not complete.
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// The peer sent something that violates the protocol.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server refused a command.
    #[error("Server rejected {command}: {description}")]
    Rejected { command: String, description: String },

    /// No response arrived within the configured timeout.
    #[error("Timed out waiting for {0}")]
    Timeout(String),

    /// The connection is closed.
    #[error("Connection closed")]
    Disconnected,

    /// I/O error on an established connection.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// AMF0 payload could not be decoded.
    #[error(transparent)]
    Amf(#[from] flvpush_common::Error),
}

impl Error {
    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn handshake(msg: impl Into<String>) -> Self {
        Self::Handshake(msg.into())
    }
}
