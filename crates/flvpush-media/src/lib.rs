//! Flvpush-Media: sequential FLV demuxing.
//!
//! This crate reads FLV files front to back without an index. It is built for
//! a publisher that sends each tag as soon as it is decoded, so decoding writes
//! straight into a caller-owned [`TransmissionPacket`](flvpush_common::TransmissionPacket)
//! instead of allocating per tag.
//!
//! # Modules
//!
//! - `flv` - byte reader, tag decoder, file header and container summary
//!
//! # Layout
//!
//! ```text
//! | FLV header (9) | prev size (4) | tag header (11) | body (n) | prev size (4) | ...
//! ```
//!
//! The tag header holds the tag type, a 24-bit body size, a 24-bit timestamp
//! followed by its 8-bit extension, and a 24-bit stream id.

pub mod error;
pub mod flv;

pub use error::{Error, Result};
pub use flv::{ByteReader, FlvHeader, FlvSummary, TagDecoder, TagHeader};
