//! Flvpush-RTMP: A small blocking RTMP publish client.
//!
//! Only the client side of publishing is implemented: handshake, connect,
//! createStream, publish, then media messages until the caller is done.
//!
//! # Session
//!
//! ```text
//! TCP connect ─► handshake ─► SetChunkSize ─► connect ─► _result
//!   ─► releaseStream / FCPublish ─► createStream ─► _result(stream id)
//!   ─► publish ─► onStatus(NetStream.Publish.Start) ─► media ...
//! ```
//!
//! # Examples
//!
//! ```no_run
//! use flvpush_common::{TagType, TransmissionPacket};
//! use flvpush_rtmp::{ConnectOptions, Connection, RtmpConnection};
//!
//! let mut conn = RtmpConnection::connect("rtmp://localhost/live/room", &ConnectOptions::default())?;
//!
//! let mut packet = TransmissionPacket::default();
//! packet.stream_id = conn.stream_id();
//! packet.load(TagType::Video, 0, &[0x17, 0x00, 0x00, 0x00, 0x00])?;
//! conn.send(&packet)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod address;
pub mod chunk;
pub mod connection;
pub mod error;
pub mod handshake;
pub mod message;

pub use address::{RtmpUrl, DEFAULT_PORT};
pub use connection::{ConnectOptions, Connection, RtmpConnection};
pub use error::{Error, Result};
