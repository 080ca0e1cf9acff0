//! Shared helpers for integration tests.
//!
//! Provides [`FlvBuilder`] for synthesising FLV files and
//! [`MockConnection`] / [`RecordingSleeper`] for driving the pump without a
//! network. [`rtmp_server`] accepts real publish sessions on loopback.

#![allow(dead_code)]

pub mod rtmp_server;

use flvpush_common::{HeaderClass, TagType, TransmissionPacket};
use flvpush_rtmp::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const AUDIO: u8 = 0x08;
pub const VIDEO: u8 = 0x09;
pub const SCRIPT: u8 = 0x12;

/// Builds FLV byte streams tag by tag.
pub struct FlvBuilder {
    bytes: Vec<u8>,
}

impl FlvBuilder {
    /// Start with a file header announcing audio and video, and the first footer.
    pub fn new() -> Self {
        Self {
            bytes: vec![b'F', b'L', b'V', 1, 0x05, 0, 0, 0, 9, 0, 0, 0, 0],
        }
    }

    /// Append a complete tag with its footer.
    pub fn tag(mut self, tag_type: u8, timestamp: u32, body: &[u8]) -> Self {
        self.push_header(tag_type, body.len() as u32, timestamp);
        self.bytes.extend_from_slice(body);
        self.bytes
            .extend_from_slice(&(11 + body.len() as u32).to_be_bytes());
        self
    }

    /// Append a tag header that declares `declared` body bytes but only
    /// carries `body`.
    pub fn short_tag(mut self, tag_type: u8, timestamp: u32, declared: u32, body: &[u8]) -> Self {
        self.push_header(tag_type, declared, timestamp);
        self.bytes.extend_from_slice(body);
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }

    pub fn write_to(self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, self.bytes).unwrap();
        path
    }

    fn push_header(&mut self, tag_type: u8, size: u32, timestamp: u32) {
        let ts = timestamp.to_be_bytes();
        self.bytes.push(tag_type);
        self.bytes.extend_from_slice(&size.to_be_bytes()[1..]);
        self.bytes.extend_from_slice(&[ts[1], ts[2], ts[3], ts[0]]);
        self.bytes.extend_from_slice(&[0, 0, 0]);
    }
}

/// A packet as the connection saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct SentPacket {
    pub packet_type: TagType,
    pub timestamp: u32,
    pub body: Vec<u8>,
    pub channel: u32,
    pub stream_id: u32,
    pub header_class: HeaderClass,
    pub absolute_timestamp: bool,
}

/// In-memory [`Connection`] that records what it is given.
pub struct MockConnection {
    pub live: bool,
    /// Report not live once this many packets were sent.
    pub disconnect_after: Option<usize>,
    /// Refuse every send while staying live.
    pub refuse_sends: bool,
    /// Go dead on the first send and refuse it.
    pub drop_on_send: bool,
    pub stream_id: u32,
    pub sent: Vec<SentPacket>,
    pub liveness_checks: usize,
}

impl MockConnection {
    pub fn new() -> Self {
        Self {
            live: true,
            disconnect_after: None,
            refuse_sends: false,
            drop_on_send: false,
            stream_id: 1,
            sent: Vec::new(),
            liveness_checks: 0,
        }
    }
}

impl Connection for MockConnection {
    fn is_connected(&mut self) -> bool {
        self.liveness_checks += 1;
        self.live && self.disconnect_after.map_or(true, |n| self.sent.len() < n)
    }

    fn send(&mut self, packet: &TransmissionPacket) -> flvpush_rtmp::Result<()> {
        if self.drop_on_send {
            self.live = false;
            return Err(flvpush_rtmp::Error::Disconnected);
        }
        if self.refuse_sends {
            return Err(flvpush_rtmp::Error::protocol("send refused"));
        }
        self.sent.push(SentPacket {
            packet_type: packet.packet_type,
            timestamp: packet.timestamp,
            body: packet.body().to_vec(),
            channel: packet.channel,
            stream_id: packet.stream_id,
            header_class: packet.header_class,
            absolute_timestamp: packet.absolute_timestamp,
        });
        Ok(())
    }

    fn stream_id(&self) -> u32 {
        self.stream_id
    }
}

/// Sleeper that records requested delays instead of blocking.
#[derive(Default)]
pub struct RecordingSleeper {
    pub delays: Vec<Duration>,
}

impl flvpush::pump::Sleeper for RecordingSleeper {
    fn sleep(&mut self, duration: Duration) {
        self.delays.push(duration);
    }
}

pub fn millis(delays: &[Duration]) -> Vec<u64> {
    delays.iter().map(|d| d.as_millis() as u64).collect()
}
