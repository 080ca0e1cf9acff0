//! Tag-by-tag FLV decoder.

use super::{ByteReader, FlvHeader, FLV_HEADER_SIZE, PREAMBLE_SIZE, TAG_HEADER_SIZE};
use crate::{Error, Result};
use flvpush_common::{TagType, TransmissionPacket};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Header fields of the most recently decoded tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagHeader {
    pub tag_type: TagType,
    /// Body size in bytes.
    pub body_size: u32,
    /// Reassembled 32-bit timestamp in milliseconds.
    pub timestamp: u32,
    /// Stream id field. Always zero in practice.
    pub stream_id: u32,
    /// File offset of the tag header.
    pub offset: u64,
}

/// Sequential FLV tag decoder.
///
/// Each call to [`decode_next`](Self::decode_next) consumes one tag and its
/// trailing previous-tag-size footer, writing the body into the packet.
pub struct TagDecoder<R> {
    reader: ByteReader<R>,
    exhausted: bool,
    tags_decoded: u64,
}

impl TagDecoder<BufReader<File>> {
    /// Open an FLV file for decoding.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> TagDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: ByteReader::new(reader),
            exhausted: false,
            tags_decoded: 0,
        }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.reader.position()
    }

    /// Number of tags decoded successfully.
    pub fn tags_decoded(&self) -> u64 {
        self.tags_decoded
    }

    /// Advance past the file header and the first footer.
    ///
    /// The skip is unconditional. When the file header is present it is
    /// parsed and returned; a malformed one is logged and ignored.
    pub fn skip_preamble(&mut self) -> Result<Option<FlvHeader>> {
        let mut header = [0u8; FLV_HEADER_SIZE];
        let read = self.reader.read_into(&mut header)?;
        let rest = (PREAMBLE_SIZE - FLV_HEADER_SIZE) as u64;
        self.reader.skip(rest)?;

        if read < FLV_HEADER_SIZE {
            tracing::warn!(read, "file shorter than the FLV header");
            return Ok(None);
        }

        match FlvHeader::parse(&header) {
            Ok(parsed) => {
                tracing::debug!(
                    version = parsed.version,
                    audio = parsed.has_audio,
                    video = parsed.has_video,
                    "FLV header"
                );
                Ok(Some(parsed))
            }
            Err(e) => {
                tracing::warn!("{}; continuing at offset {}", e, PREAMBLE_SIZE);
                Ok(None)
            }
        }
    }

    /// Decode the next tag into `packet`.
    ///
    /// Returns [`Error::TruncatedInput`] when the source ends inside (or
    /// before) a tag header, [`Error::CapacityExceeded`] when the body does
    /// not fit the packet, and [`Error::BodyMismatch`] when the body is
    /// shorter than declared.
    pub fn decode_next(&mut self, packet: &mut TransmissionPacket) -> Result<TagHeader> {
        packet.reset();

        let offset = self.reader.position();
        if self.exhausted {
            return Err(Error::TruncatedInput {
                needed: TAG_HEADER_SIZE,
                available: 0,
            });
        }

        let header = match self.read_tag_header(offset) {
            Ok(header) => header,
            Err(e) => {
                if e.is_truncated() {
                    self.exhausted = true;
                }
                return Err(e);
            }
        };

        let size = header.body_size as usize;
        if size > packet.capacity() {
            return Err(Error::CapacityExceeded {
                declared: size,
                capacity: packet.capacity(),
            });
        }

        let body = packet.body_buffer(size)?;
        let read = self.reader.read_into(body)?;
        if read != size {
            self.exhausted = true;
            return Err(Error::BodyMismatch {
                declared: size,
                read,
            });
        }

        match self.reader.read_u32() {
            Ok(previous_size) => {
                let expected = (TAG_HEADER_SIZE + size) as u32;
                if previous_size != expected {
                    tracing::warn!(
                        offset,
                        previous_size,
                        expected,
                        "previous tag size footer does not match tag"
                    );
                }
            }
            Err(Error::TruncatedInput { available, .. }) => {
                tracing::debug!(offset, available, "stream ends without a tag footer");
                self.exhausted = true;
            }
            Err(e) => return Err(e),
        }

        packet.commit(header.tag_type, header.timestamp, size)?;
        self.tags_decoded += 1;

        tracing::trace!(
            offset,
            tag_type = %header.tag_type,
            timestamp = header.timestamp,
            size,
            "decoded tag"
        );

        Ok(header)
    }

    fn read_tag_header(&mut self, offset: u64) -> Result<TagHeader> {
        match self.read_tag_fields(offset) {
            Err(Error::TruncatedInput { .. }) => Err(Error::TruncatedInput {
                needed: TAG_HEADER_SIZE,
                available: (self.reader.position() - offset) as usize,
            }),
            other => other,
        }
    }

    fn read_tag_fields(&mut self, offset: u64) -> Result<TagHeader> {
        let tag_type = TagType::from_u8(self.reader.read_u8()?);
        let body_size = self.reader.read_u24()?;
        let timestamp = self.reader.read_extended_timestamp()?;
        let stream_id = self.reader.read_u24()?;

        Ok(TagHeader {
            tag_type,
            body_size,
            timestamp,
            stream_id,
            offset,
        })
    }
}
