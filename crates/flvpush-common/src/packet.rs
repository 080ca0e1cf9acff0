//! The reusable transmission packet.
//!
//! One packet is allocated per publishing session. The demuxer reads each tag
//! body straight into its buffer and the publisher writes it out; between
//! tags the packet is reset, never reallocated.

use crate::{Error, HeaderClass, Result, TagType};

/// Default body capacity (64 KiB).
pub const DEFAULT_BODY_CAPACITY: usize = 64 * 1024;

/// Chunk stream id used for media messages.
pub const MEDIA_CHANNEL: u32 = 0x04;

/// A single outbound media message with a fixed-capacity body buffer.
#[derive(Debug, Clone)]
pub struct TransmissionPacket {
    /// Chunk stream id the message is written on.
    pub channel: u32,
    /// Chunk header format. Always `Large` for media.
    pub header_class: HeaderClass,
    /// Message timestamp in milliseconds.
    pub timestamp: u32,
    /// Message type, copied from the tag type.
    pub packet_type: TagType,
    /// Message stream id assigned by the remote endpoint.
    pub stream_id: u32,
    /// Whether the timestamp is absolute. Always false for media.
    pub absolute_timestamp: bool,
    body_size: usize,
    body: Box<[u8]>,
}

impl TransmissionPacket {
    /// Allocate a packet whose body can hold `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channel: MEDIA_CHANNEL,
            header_class: HeaderClass::Large,
            timestamp: 0,
            packet_type: TagType::Other(0),
            stream_id: 0,
            absolute_timestamp: false,
            body_size: 0,
            body: vec![0u8; capacity].into_boxed_slice(),
        }
    }

    /// Maximum body size this packet can carry.
    pub fn capacity(&self) -> usize {
        self.body.len()
    }

    /// Size of the current body.
    pub fn body_size(&self) -> usize {
        self.body_size
    }

    /// The current body. Bytes past `body_size` are never exposed.
    pub fn body(&self) -> &[u8] {
        &self.body[..self.body_size]
    }

    /// Clear per-message metadata. Channel, stream id and the buffer survive.
    pub fn reset(&mut self) {
        self.header_class = HeaderClass::Large;
        self.timestamp = 0;
        self.packet_type = TagType::Other(0);
        self.absolute_timestamp = false;
        self.body_size = 0;
    }

    /// Borrow the first `len` bytes of the buffer for filling.
    ///
    /// Fails without touching the buffer when `len` exceeds the capacity.
    pub fn body_buffer(&mut self, len: usize) -> Result<&mut [u8]> {
        self.check_capacity(len)?;
        Ok(&mut self.body[..len])
    }

    /// Record the metadata of a body that has already been written with
    /// [`body_buffer`](Self::body_buffer).
    pub fn commit(&mut self, packet_type: TagType, timestamp: u32, body_size: usize) -> Result<()> {
        self.check_capacity(body_size)?;
        self.header_class = HeaderClass::Large;
        self.absolute_timestamp = false;
        self.packet_type = packet_type;
        self.timestamp = timestamp;
        self.body_size = body_size;
        Ok(())
    }

    /// Copy `data` into the packet and commit it in one step.
    pub fn load(&mut self, packet_type: TagType, timestamp: u32, data: &[u8]) -> Result<()> {
        self.body_buffer(data.len())?.copy_from_slice(data);
        self.commit(packet_type, timestamp, data.len())
    }

    fn check_capacity(&self, len: usize) -> Result<()> {
        if len > self.body.len() {
            return Err(Error::CapacityExceeded {
                declared: len,
                capacity: self.body.len(),
            });
        }
        Ok(())
    }
}

impl Default for TransmissionPacket {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_BODY_CAPACITY)
    }
}
