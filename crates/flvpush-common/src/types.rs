//! Core type definitions for tags and chunk headers.
//!
//! FLV tag type bytes and RTMP message type ids share the same numbering for
//! audio, video and script data, so a single enum serves both the demuxer and
//! the publisher. All enums serialize in lowercase.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of FLV tag / RTMP media message.
///
/// Unknown discriminators are preserved in [`TagType::Other`] and forwarded
/// unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagType {
    /// Audio data (0x08).
    Audio,
    /// Video data (0x09).
    Video,
    /// Script data such as `onMetaData` (0x12).
    Script,
    /// Any other discriminator, carried opaquely.
    Other(u8),
}

impl TagType {
    pub const AUDIO: u8 = 0x08;
    pub const VIDEO: u8 = 0x09;
    pub const SCRIPT: u8 = 0x12;

    /// Map a raw tag type byte.
    pub fn from_u8(value: u8) -> Self {
        match value {
            Self::AUDIO => Self::Audio,
            Self::VIDEO => Self::Video,
            Self::SCRIPT => Self::Script,
            other => Self::Other(other),
        }
    }

    /// The raw byte written on the wire.
    pub fn as_u8(&self) -> u8 {
        match self {
            Self::Audio => Self::AUDIO,
            Self::Video => Self::VIDEO,
            Self::Script => Self::SCRIPT,
            Self::Other(v) => *v,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<u8> for TagType {
    fn from(value: u8) -> Self {
        Self::from_u8(value)
    }
}

impl fmt::Display for TagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
            Self::Script => write!(f, "script"),
            Self::Other(v) => write!(f, "other(0x{:02x})", v),
        }
    }
}

/// RTMP chunk message header format.
///
/// `Large` carries the full message header; the smaller classes reuse fields
/// from the previous chunk on the same chunk stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderClass {
    /// Type 0: timestamp, length, type id and stream id (11 bytes).
    Large,
    /// Type 1: timestamp delta, length and type id (7 bytes).
    Medium,
    /// Type 2: timestamp delta only (3 bytes).
    Small,
    /// Type 3: no message header.
    Minimum,
}

impl HeaderClass {
    /// The two-bit `fmt` value of the basic header.
    pub fn fmt_bits(&self) -> u8 {
        match self {
            Self::Large => 0,
            Self::Medium => 1,
            Self::Small => 2,
            Self::Minimum => 3,
        }
    }

    pub fn from_fmt_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::Large,
            1 => Self::Medium,
            2 => Self::Small,
            _ => Self::Minimum,
        }
    }

    /// Size of the message header that follows the basic header.
    pub fn message_header_len(&self) -> usize {
        match self {
            Self::Large => 11,
            Self::Medium => 7,
            Self::Small => 3,
            Self::Minimum => 0,
        }
    }
}
