//! FLV container parsing.
//!
//! This module provides the pieces needed to walk an FLV file tag by tag
//! and hand each tag to a publisher.

mod decoder;
mod reader;
mod summary;

pub use decoder::{TagDecoder, TagHeader};
pub use reader::ByteReader;
pub use summary::FlvSummary;

use crate::{Error, Result};

/// Size of the FLV file header.
pub const FLV_HEADER_SIZE: usize = 9;

/// Size of each previous-tag-size footer.
pub const PREVIOUS_TAG_SIZE_LEN: usize = 4;

/// Bytes skipped before the first tag: file header plus the first footer.
pub const PREAMBLE_SIZE: usize = FLV_HEADER_SIZE + PREVIOUS_TAG_SIZE_LEN;

/// Size of a tag header.
pub const TAG_HEADER_SIZE: usize = 11;

const FLV_SIGNATURE: &[u8; 3] = b"FLV";
const FLAG_AUDIO: u8 = 0x04;
const FLAG_VIDEO: u8 = 0x01;

/// Parsed FLV file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct FlvHeader {
    /// File version, 1 for every file in the wild.
    pub version: u8,
    /// Whether the file announces audio tags.
    pub has_audio: bool,
    /// Whether the file announces video tags.
    pub has_video: bool,
    /// Offset of the first footer, normally 9.
    pub data_offset: u32,
}

impl FlvHeader {
    /// Parse the 9-byte file header.
    pub fn parse(bytes: &[u8; FLV_HEADER_SIZE]) -> Result<Self> {
        if &bytes[..3] != FLV_SIGNATURE {
            return Err(Error::invalid_header(format!(
                "bad signature {:02x} {:02x} {:02x}",
                bytes[0], bytes[1], bytes[2]
            )));
        }

        let flags = bytes[4];
        let data_offset = u32::from_be_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]);

        Ok(Self {
            version: bytes[3],
            has_audio: flags & FLAG_AUDIO != 0,
            has_video: flags & FLAG_VIDEO != 0,
            data_offset,
        })
    }

    /// Serialize back to the 9-byte layout.
    pub fn to_bytes(&self) -> [u8; FLV_HEADER_SIZE] {
        let mut flags = 0u8;
        if self.has_audio {
            flags |= FLAG_AUDIO;
        }
        if self.has_video {
            flags |= FLAG_VIDEO;
        }
        let offset = self.data_offset.to_be_bytes();
        [
            b'F', b'L', b'V', self.version, flags, offset[0], offset[1], offset[2], offset[3],
        ]
    }
}

impl Default for FlvHeader {
    fn default() -> Self {
        Self {
            version: 1,
            has_audio: true,
            has_video: true,
            data_offset: FLV_HEADER_SIZE as u32,
        }
    }
}
