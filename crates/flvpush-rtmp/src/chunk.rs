//! RTMP chunk stream codec.
//!
//! Messages are split into chunks of at most `chunk_size` payload bytes.
//! Every chunk starts with a basic header (format + chunk stream id); the
//! message header that follows depends on the format. Timestamps at or above
//! `0xFFFFFF` move to a 4-byte extended field that is repeated on every
//! continuation chunk.

use bytes::{BufMut, Bytes, BytesMut};
use flvpush_common::HeaderClass;
use std::collections::HashMap;
use std::io::{self, Read};

use crate::message::Message;
use crate::{Error, Result};

/// Chunk size both sides start with.
pub const DEFAULT_CHUNK_SIZE: u32 = 128;

/// Largest chunk size the protocol allows.
pub const MAX_CHUNK_SIZE: u32 = 0x7FFF_FFFF;

const EXTENDED_TIMESTAMP: u32 = 0x00FF_FFFF;

/// Largest message this reader accepts, to bound allocation on bad input.
const MAX_MESSAGE_SIZE: u32 = 16 * 1024 * 1024;

/// Serializes messages into chunks.
#[derive(Debug)]
pub struct ChunkWriter {
    chunk_size: u32,
}

impl ChunkWriter {
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Change the outgoing chunk size. Announce it to the peer first.
    pub fn set_chunk_size(&mut self, size: u32) {
        self.chunk_size = size.clamp(1, MAX_CHUNK_SIZE);
    }

    /// Append `msg` to `buf` using the given header class for the first
    /// chunk and type 3 headers for the rest.
    ///
    /// For classes other than `Large` the timestamp field carries the delta
    /// from the previous message on the same chunk stream.
    pub fn encode(&self, msg: &Message, class: HeaderClass, buf: &mut BytesMut) {
        let extended = msg.timestamp >= EXTENDED_TIMESTAMP;
        let ts_field = if extended {
            EXTENDED_TIMESTAMP
        } else {
            msg.timestamp
        };
        let length = msg.payload.len() as u32;

        write_basic_header(buf, class, msg.channel);
        match class {
            HeaderClass::Large => {
                put_u24(buf, ts_field);
                put_u24(buf, length);
                buf.put_u8(msg.type_id);
                buf.put_u32_le(msg.stream_id);
            }
            HeaderClass::Medium => {
                put_u24(buf, ts_field);
                put_u24(buf, length);
                buf.put_u8(msg.type_id);
            }
            HeaderClass::Small => put_u24(buf, ts_field),
            HeaderClass::Minimum => {}
        }
        if extended && class != HeaderClass::Minimum {
            buf.put_u32(msg.timestamp);
        }

        let mut chunks = msg.payload.chunks(self.chunk_size as usize);
        if let Some(first) = chunks.next() {
            buf.put_slice(first);
        }
        for chunk in chunks {
            write_basic_header(buf, HeaderClass::Minimum, msg.channel);
            if extended {
                buf.put_u32(msg.timestamp);
            }
            buf.put_slice(chunk);
        }
    }
}

impl Default for ChunkWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default)]
struct ChunkStreamState {
    timestamp: u32,
    delta: u32,
    length: u32,
    type_id: u8,
    stream_id: u32,
    extended: bool,
    payload: BytesMut,
}

/// Reassembles chunks read from a byte stream into messages.
#[derive(Debug, Clone)]
pub struct ChunkReader {
    chunk_size: u32,
    streams: HashMap<u32, ChunkStreamState>,
    bytes_read: u64,
}

impl ChunkReader {
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            streams: HashMap::new(),
            bytes_read: 0,
        }
    }

    /// Apply a chunk size announced by the peer.
    pub fn set_chunk_size(&mut self, size: u32) -> Result<()> {
        if size == 0 || size > MAX_CHUNK_SIZE {
            return Err(Error::protocol(format!("invalid chunk size {}", size)));
        }
        self.chunk_size = size;
        Ok(())
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Total bytes consumed from the peer, for acknowledgements.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Drop a partially received message (Abort message).
    pub fn abort(&mut self, channel: u32) {
        if let Some(state) = self.streams.get_mut(&channel) {
            state.payload.clear();
        }
    }

    /// Read chunks until one message is complete.
    pub fn read_message<R: Read>(&mut self, src: &mut R) -> Result<Message> {
        loop {
            if let Some(msg) = self.read_chunk(src)? {
                return Ok(msg);
            }
        }
    }

    /// Decode one message from the front of `buf`.
    ///
    /// Returns `None` and leaves the reader untouched when `buf` ends before
    /// the message does. Otherwise returns the message and the number of
    /// bytes it used.
    pub fn decode_buffered(&mut self, buf: &[u8]) -> Result<Option<(Message, usize)>> {
        let mut attempt = self.clone();
        let mut src = buf;
        match attempt.read_message(&mut src) {
            Ok(msg) => {
                *self = attempt;
                Ok(Some((msg, buf.len() - src.len())))
            }
            Err(Error::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn read_chunk<R: Read>(&mut self, src: &mut R) -> Result<Option<Message>> {
        let b0 = self.read_u8(src)?;
        let class = HeaderClass::from_fmt_bits(b0 >> 6);
        let channel = match b0 & 0x3F {
            0 => 64 + self.read_u8(src)? as u32,
            1 => {
                let lo = self.read_u8(src)? as u32;
                let hi = self.read_u8(src)? as u32;
                64 + lo + (hi << 8)
            }
            id => id as u32,
        };

        let mut header = [0u8; 11];
        let header = &mut header[..class.message_header_len()];
        self.read_exact(src, header)?;

        let (extended, starting) = {
            let state = self.streams.entry(channel).or_default();
            let starting = state.payload.is_empty();
            match class {
                HeaderClass::Large => {
                    let ts = be24(&header[0..3]);
                    state.length = be24(&header[3..6]);
                    state.type_id = header[6];
                    state.stream_id =
                        u32::from_le_bytes([header[7], header[8], header[9], header[10]]);
                    state.extended = ts == EXTENDED_TIMESTAMP;
                    state.timestamp = ts;
                    state.delta = 0;
                }
                HeaderClass::Medium => {
                    let delta = be24(&header[0..3]);
                    state.length = be24(&header[3..6]);
                    state.type_id = header[6];
                    state.extended = delta == EXTENDED_TIMESTAMP;
                    state.delta = delta;
                }
                HeaderClass::Small => {
                    let delta = be24(&header[0..3]);
                    state.extended = delta == EXTENDED_TIMESTAMP;
                    state.delta = delta;
                }
                HeaderClass::Minimum => {}
            }
            if state.length > MAX_MESSAGE_SIZE {
                return Err(Error::protocol(format!(
                    "message of {} bytes on chunk stream {} exceeds limit",
                    state.length, channel
                )));
            }
            (state.extended, starting)
        };

        if extended {
            let mut ext = [0u8; 4];
            self.read_exact(src, &mut ext)?;
            let value = u32::from_be_bytes(ext);
            let state = self.streams.entry(channel).or_default();
            match class {
                HeaderClass::Large => state.timestamp = value,
                HeaderClass::Medium | HeaderClass::Small => state.delta = value,
                HeaderClass::Minimum => {}
            }
        }

        let chunk_size = self.chunk_size;
        let (want, length) = {
            let state = self.streams.entry(channel).or_default();
            if starting && class != HeaderClass::Large {
                state.timestamp = state.timestamp.wrapping_add(state.delta);
            }
            let remaining = (state.length as usize).saturating_sub(state.payload.len());
            (remaining.min(chunk_size as usize), state.length)
        };

        let mut data = vec![0u8; want];
        self.read_exact(src, &mut data)?;

        let state = self.streams.entry(channel).or_default();
        state.payload.extend_from_slice(&data);
        if state.payload.len() < length as usize {
            return Ok(None);
        }

        let payload: Bytes = state.payload.split().freeze();
        Ok(Some(Message {
            channel,
            timestamp: state.timestamp,
            type_id: state.type_id,
            stream_id: state.stream_id,
            payload,
        }))
    }

    fn read_u8<R: Read>(&mut self, src: &mut R) -> Result<u8> {
        let mut b = [0u8; 1];
        self.read_exact(src, &mut b)?;
        Ok(b[0])
    }

    fn read_exact<R: Read>(&mut self, src: &mut R, buf: &mut [u8]) -> Result<()> {
        src.read_exact(buf)?;
        self.bytes_read += buf.len() as u64;
        Ok(())
    }
}

impl Default for ChunkReader {
    fn default() -> Self {
        Self::new()
    }
}

fn write_basic_header(buf: &mut BytesMut, class: HeaderClass, channel: u32) {
    let fmt = class.fmt_bits() << 6;
    match channel {
        2..=63 => buf.put_u8(fmt | channel as u8),
        64..=319 => {
            buf.put_u8(fmt);
            buf.put_u8((channel - 64) as u8);
        }
        _ => {
            let id = channel.saturating_sub(64);
            buf.put_u8(fmt | 1);
            buf.put_u8((id & 0xFF) as u8);
            buf.put_u8(((id >> 8) & 0xFF) as u8);
        }
    }
}

fn put_u24(buf: &mut BytesMut, value: u32) {
    buf.put_slice(&value.to_be_bytes()[1..]);
}

fn be24(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]])
}
