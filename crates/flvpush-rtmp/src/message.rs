//! RTMP messages: type ids, protocol control payloads and AMF0 commands.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use flvpush_common::amf::{self, AmfValue};

use crate::{Error, Result};

pub const SET_CHUNK_SIZE: u8 = 1;
pub const ABORT: u8 = 2;
pub const ACKNOWLEDGEMENT: u8 = 3;
pub const USER_CONTROL: u8 = 4;
pub const WINDOW_ACK_SIZE: u8 = 5;
pub const SET_PEER_BANDWIDTH: u8 = 6;
pub const AUDIO: u8 = 8;
pub const VIDEO: u8 = 9;
pub const DATA_AMF0: u8 = 18;
pub const COMMAND_AMF0: u8 = 20;

/// Chunk stream for protocol control messages.
pub const CONTROL_CHANNEL: u32 = 2;
/// Chunk stream for commands.
pub const COMMAND_CHANNEL: u32 = 3;

/// User control event: stream begin.
pub const EVENT_STREAM_BEGIN: u16 = 0;
/// User control event: ping request from the server.
pub const EVENT_PING_REQUEST: u16 = 6;
/// User control event: ping response.
pub const EVENT_PING_RESPONSE: u16 = 7;

/// A complete, reassembled RTMP message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Chunk stream the message arrived on (or is written to).
    pub channel: u32,
    pub timestamp: u32,
    pub type_id: u8,
    pub stream_id: u32,
    pub payload: Bytes,
}

impl Message {
    pub fn new(channel: u32, type_id: u8, stream_id: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            channel,
            timestamp: 0,
            type_id,
            stream_id,
            payload: payload.into(),
        }
    }

    pub fn set_chunk_size(size: u32) -> Self {
        Self::control(SET_CHUNK_SIZE, size & 0x7FFF_FFFF)
    }

    pub fn acknowledgement(sequence: u32) -> Self {
        Self::control(ACKNOWLEDGEMENT, sequence)
    }

    pub fn window_ack_size(size: u32) -> Self {
        Self::control(WINDOW_ACK_SIZE, size)
    }

    pub fn ping_response(timestamp: u32) -> Self {
        let mut buf = BytesMut::with_capacity(6);
        buf.put_u16(EVENT_PING_RESPONSE);
        buf.put_u32(timestamp);
        Self::new(CONTROL_CHANNEL, USER_CONTROL, 0, buf.freeze())
    }

    fn control(type_id: u8, value: u32) -> Self {
        let mut buf = BytesMut::with_capacity(4);
        buf.put_u32(value);
        Self::new(CONTROL_CHANNEL, type_id, 0, buf.freeze())
    }

    /// First four payload bytes as a big-endian value, used by the
    /// single-field control messages.
    pub fn control_value(&self) -> Result<u32> {
        let mut payload = &self.payload[..];
        if payload.remaining() < 4 {
            return Err(Error::protocol(format!(
                "control message type {} too short ({} bytes)",
                self.type_id,
                payload.len()
            )));
        }
        Ok(payload.get_u32())
    }

    /// Decode a user control message into its event type and first value.
    pub fn user_control(&self) -> Result<(u16, u32)> {
        let mut payload = &self.payload[..];
        if payload.remaining() < 6 {
            return Err(Error::protocol("user control message too short"));
        }
        Ok((payload.get_u16(), payload.get_u32()))
    }
}

/// An AMF0 command message (`connect`, `_result`, `onStatus`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub name: String,
    pub transaction_id: f64,
    /// Remaining values: the command object followed by any arguments.
    pub args: Vec<AmfValue>,
}

impl Command {
    pub fn new(name: impl Into<String>, transaction_id: f64, args: Vec<AmfValue>) -> Self {
        Self {
            name: name.into(),
            transaction_id,
            args,
        }
    }

    pub fn parse(payload: &[u8]) -> Result<Self> {
        let mut values = amf::decode_all(payload)?.into_iter();
        let name = match values.next() {
            Some(AmfValue::String(name)) => name,
            other => {
                return Err(Error::protocol(format!(
                    "command without a name: {:?}",
                    other
                )))
            }
        };
        let transaction_id = values.next().and_then(|v| v.as_number()).unwrap_or(0.0);
        Ok(Self {
            name,
            transaction_id,
            args: values.collect(),
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(128);
        AmfValue::String(self.name.clone()).encode(&mut buf);
        AmfValue::Number(self.transaction_id).encode(&mut buf);
        for arg in &self.args {
            arg.encode(&mut buf);
        }
        buf.freeze()
    }

    pub fn into_message(self, stream_id: u32) -> Message {
        Message::new(COMMAND_CHANNEL, COMMAND_AMF0, stream_id, self.encode())
    }

    /// The `info` object of an `onStatus` or `_error` command.
    pub fn info(&self) -> Option<&AmfValue> {
        self.args
            .iter()
            .find(|v| matches!(v, AmfValue::Object(_) | AmfValue::EcmaArray(_)) && v.get("code").is_some())
    }

    /// `info.code`, e.g. `NetStream.Publish.Start`.
    pub fn status_code(&self) -> Option<&str> {
        self.info()?.get("code")?.as_str()
    }

    /// `info.level`: `status`, `warning` or `error`.
    pub fn status_level(&self) -> Option<&str> {
        self.info()?.get("level")?.as_str()
    }

    /// `info.description` or the code when there is none.
    pub fn status_description(&self) -> String {
        self.info()
            .and_then(|info| info.get("description").or_else(|| info.get("code")))
            .and_then(AmfValue::as_str)
            .unwrap_or("no description")
            .to_string()
    }
}
