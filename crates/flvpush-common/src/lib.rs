//! Flvpush-Common: Shared wire types used by the demuxer and the publisher.
//!
//! This crate provides the pieces both sides of the pump agree on:
//!
//! - **Tag types**: FLV tag discriminators, which double as RTMP message type ids
//! - **Header classes**: RTMP chunk message header formats
//! - **Transmission packet**: the single reusable buffer that carries one tag
//! - **AMF0**: the value encoding used by script tags and RTMP commands
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use flvpush_common::{TagType, TransmissionPacket};
//!
//! let mut packet = TransmissionPacket::with_capacity(64 * 1024);
//! packet.load(TagType::Video, 40, &[0x17, 0x01]).unwrap();
//!
//! assert_eq!(packet.timestamp, 40);
//! assert_eq!(packet.body(), &[0x17, 0x01]);
//! ```

pub mod amf;
pub mod error;
pub mod packet;
pub mod types;

pub use amf::AmfValue;
pub use error::{Error, Result};
pub use packet::{TransmissionPacket, DEFAULT_BODY_CAPACITY, MEDIA_CHANNEL};
pub use types::*;
