//! AMF0 value encoding.
//!
//! Only the subset seen in FLV script tags and RTMP command messages is
//! supported: numbers, booleans, strings, objects, null/undefined, ECMA and
//! strict arrays, dates and long strings.

use bytes::{Buf, BufMut, BytesMut};

use crate::{Error, Result};

const MARKER_NUMBER: u8 = 0x00;
const MARKER_BOOLEAN: u8 = 0x01;
const MARKER_STRING: u8 = 0x02;
const MARKER_OBJECT: u8 = 0x03;
const MARKER_NULL: u8 = 0x05;
const MARKER_UNDEFINED: u8 = 0x06;
const MARKER_ECMA_ARRAY: u8 = 0x08;
const MARKER_OBJECT_END: u8 = 0x09;
const MARKER_STRICT_ARRAY: u8 = 0x0A;
const MARKER_DATE: u8 = 0x0B;
const MARKER_LONG_STRING: u8 = 0x0C;

/// Deepest nesting of objects and arrays accepted by [`AmfValue::decode`].
pub const MAX_DEPTH: usize = 64;

/// A decoded AMF0 value.
#[derive(Debug, Clone, PartialEq)]
pub enum AmfValue {
    Number(f64),
    Boolean(bool),
    String(String),
    Object(Vec<(String, AmfValue)>),
    Null,
    Undefined,
    EcmaArray(Vec<(String, AmfValue)>),
    StrictArray(Vec<AmfValue>),
    Date(f64),
}

impl AmfValue {
    /// Build an object from string keys.
    pub fn object<K: Into<String>>(props: impl IntoIterator<Item = (K, AmfValue)>) -> Self {
        Self::Object(props.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Look up a property of an object or ECMA array.
    pub fn get(&self, key: &str) -> Option<&AmfValue> {
        match self {
            Self::Object(props) | Self::EcmaArray(props) => {
                props.iter().find(|(k, _)| k == key).map(|(_, v)| v)
            }
            _ => None,
        }
    }

    /// Append the encoded value to `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            Self::Number(n) => {
                buf.put_u8(MARKER_NUMBER);
                buf.put_f64(*n);
            }
            Self::Boolean(b) => {
                buf.put_u8(MARKER_BOOLEAN);
                buf.put_u8(u8::from(*b));
            }
            Self::String(s) => {
                if s.len() > u16::MAX as usize {
                    buf.put_u8(MARKER_LONG_STRING);
                    buf.put_u32(s.len() as u32);
                } else {
                    buf.put_u8(MARKER_STRING);
                    buf.put_u16(s.len() as u16);
                }
                buf.put_slice(s.as_bytes());
            }
            Self::Object(props) => {
                buf.put_u8(MARKER_OBJECT);
                encode_properties(props, buf);
            }
            Self::Null => buf.put_u8(MARKER_NULL),
            Self::Undefined => buf.put_u8(MARKER_UNDEFINED),
            Self::EcmaArray(props) => {
                buf.put_u8(MARKER_ECMA_ARRAY);
                buf.put_u32(props.len() as u32);
                encode_properties(props, buf);
            }
            Self::StrictArray(items) => {
                buf.put_u8(MARKER_STRICT_ARRAY);
                buf.put_u32(items.len() as u32);
                for item in items {
                    item.encode(buf);
                }
            }
            Self::Date(ms) => {
                buf.put_u8(MARKER_DATE);
                buf.put_f64(*ms);
                buf.put_i16(0);
            }
        }
    }

    /// Decode one value from the front of `buf`. Values nested deeper than
    /// [`MAX_DEPTH`] are rejected.
    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self> {
        Self::decode_nested(buf, 0)
    }

    fn decode_nested<B: Buf>(buf: &mut B, depth: usize) -> Result<Self> {
        let marker = take_u8(buf)?;
        let nests = matches!(
            marker,
            MARKER_OBJECT | MARKER_ECMA_ARRAY | MARKER_STRICT_ARRAY
        );
        if nests && depth >= MAX_DEPTH {
            return Err(Error::amf(format!(
                "values nested deeper than {} levels",
                MAX_DEPTH
            )));
        }
        match marker {
            MARKER_NUMBER => Ok(Self::Number(take_f64(buf)?)),
            MARKER_BOOLEAN => Ok(Self::Boolean(take_u8(buf)? != 0)),
            MARKER_STRING => Ok(Self::String(take_short_string(buf)?)),
            MARKER_OBJECT => Ok(Self::Object(decode_properties(buf, depth + 1)?)),
            MARKER_NULL => Ok(Self::Null),
            MARKER_UNDEFINED => Ok(Self::Undefined),
            MARKER_ECMA_ARRAY => {
                // The count is a hint only; the end marker terminates the list.
                need(buf, 4)?;
                buf.advance(4);
                Ok(Self::EcmaArray(decode_properties(buf, depth + 1)?))
            }
            MARKER_STRICT_ARRAY => {
                need(buf, 4)?;
                let count = buf.get_u32();
                let mut items = Vec::new();
                for _ in 0..count {
                    items.push(Self::decode_nested(buf, depth + 1)?);
                }
                Ok(Self::StrictArray(items))
            }
            MARKER_DATE => {
                let ms = take_f64(buf)?;
                need(buf, 2)?;
                buf.advance(2);
                Ok(Self::Date(ms))
            }
            MARKER_LONG_STRING => {
                need(buf, 4)?;
                let len = buf.get_u32() as usize;
                Ok(Self::String(take_utf8(buf, len)?))
            }
            other => Err(Error::amf(format!("unsupported marker 0x{:02x}", other))),
        }
    }
}

/// Decode every value in `data`.
pub fn decode_all(mut data: &[u8]) -> Result<Vec<AmfValue>> {
    let mut values = Vec::new();
    while data.has_remaining() {
        values.push(AmfValue::decode(&mut data)?);
    }
    Ok(values)
}

/// Encode a sequence of values back to back.
pub fn encode_all(values: &[AmfValue]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(128);
    for value in values {
        value.encode(&mut buf);
    }
    buf
}

fn encode_properties(props: &[(String, AmfValue)], buf: &mut BytesMut) {
    for (key, value) in props {
        buf.put_u16(key.len() as u16);
        buf.put_slice(key.as_bytes());
        value.encode(buf);
    }
    buf.put_u16(0);
    buf.put_u8(MARKER_OBJECT_END);
}

fn decode_properties<B: Buf>(buf: &mut B, depth: usize) -> Result<Vec<(String, AmfValue)>> {
    let mut props = Vec::new();
    loop {
        let key = take_short_string(buf)?;
        if key.is_empty() {
            if buf.has_remaining() && buf.chunk()[0] == MARKER_OBJECT_END {
                buf.advance(1);
                return Ok(props);
            }
            // Some muxers omit the end marker at the very end of a tag.
            if !buf.has_remaining() {
                return Ok(props);
            }
        }
        let value = AmfValue::decode_nested(buf, depth)?;
        props.push((key, value));
    }
}

fn need<B: Buf>(buf: &B, n: usize) -> Result<()> {
    if buf.remaining() < n {
        return Err(Error::amf(format!(
            "truncated value: need {} bytes, have {}",
            n,
            buf.remaining()
        )));
    }
    Ok(())
}

fn take_u8<B: Buf>(buf: &mut B) -> Result<u8> {
    need(buf, 1)?;
    Ok(buf.get_u8())
}

fn take_f64<B: Buf>(buf: &mut B) -> Result<f64> {
    need(buf, 8)?;
    Ok(buf.get_f64())
}

fn take_short_string<B: Buf>(buf: &mut B) -> Result<String> {
    need(buf, 2)?;
    let len = buf.get_u16() as usize;
    take_utf8(buf, len)
}

fn take_utf8<B: Buf>(buf: &mut B, len: usize) -> Result<String> {
    need(buf, len)?;
    let mut bytes = vec![0u8; len];
    buf.copy_to_slice(&mut bytes);
    String::from_utf8(bytes).map_err(|e| Error::amf(format!("invalid utf-8 string: {}", e)))
}
