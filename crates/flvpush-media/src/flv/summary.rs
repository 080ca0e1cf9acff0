//! Whole-file scan used by the `probe` command.

use super::{FlvHeader, TagDecoder};
use crate::{Error, Result};
use flvpush_common::amf::{self, AmfValue};
use flvpush_common::{TagType, TransmissionPacket};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

/// Statistics gathered by decoding every tag in a file.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct FlvSummary {
    pub header: Option<FlvHeader>,
    pub audio_tags: u64,
    pub video_tags: u64,
    pub script_tags: u64,
    pub other_tags: u64,
    pub payload_bytes: u64,
    pub max_payload: usize,
    pub first_timestamp: Option<u32>,
    pub last_timestamp: u32,
    /// Tags whose timestamp went backwards relative to the previous tag.
    pub non_monotonic: u64,
    /// Scalar entries of the first `onMetaData` script tag.
    pub metadata: BTreeMap<String, String>,
}

impl FlvSummary {
    /// Scan an FLV file.
    pub fn scan<P: AsRef<Path>>(path: P, capacity: usize) -> Result<Self> {
        let decoder = TagDecoder::open(path)?;
        Self::scan_decoder(decoder, capacity)
    }

    /// Scan FLV data from any reader.
    pub fn scan_reader<R: Read>(reader: R, capacity: usize) -> Result<Self> {
        Self::scan_decoder(TagDecoder::new(reader), capacity)
    }

    fn scan_decoder<R: Read>(mut decoder: TagDecoder<R>, capacity: usize) -> Result<Self> {
        let mut summary = Self {
            header: decoder.skip_preamble()?,
            ..Self::default()
        };
        let mut packet = TransmissionPacket::with_capacity(capacity);
        let mut previous: Option<u32> = None;

        loop {
            let header = match decoder.decode_next(&mut packet) {
                Ok(header) => header,
                Err(Error::TruncatedInput { available, .. }) => {
                    if available > 0 {
                        tracing::warn!(available, "ignoring trailing partial tag header");
                    }
                    break;
                }
                Err(e) => return Err(e),
            };

            match header.tag_type {
                TagType::Audio => summary.audio_tags += 1,
                TagType::Video => summary.video_tags += 1,
                TagType::Script => {
                    summary.script_tags += 1;
                    if summary.metadata.is_empty() {
                        summary.metadata = parse_metadata(packet.body());
                    }
                }
                TagType::Other(_) => summary.other_tags += 1,
            }

            summary.payload_bytes += header.body_size as u64;
            summary.max_payload = summary.max_payload.max(header.body_size as usize);
            if previous.is_some_and(|p| header.timestamp < p) {
                summary.non_monotonic += 1;
            }
            summary.first_timestamp.get_or_insert(header.timestamp);
            summary.last_timestamp = header.timestamp;
            previous = Some(header.timestamp);
        }

        Ok(summary)
    }

    pub fn tag_count(&self) -> u64 {
        self.audio_tags + self.video_tags + self.script_tags + self.other_tags
    }

    /// Span between the first and last tag timestamps.
    pub fn duration_ms(&self) -> u32 {
        self.first_timestamp
            .map(|first| self.last_timestamp.saturating_sub(first))
            .unwrap_or(0)
    }
}

fn parse_metadata(body: &[u8]) -> BTreeMap<String, String> {
    let values = match amf::decode_all(body) {
        Ok(values) => values,
        Err(e) => {
            tracing::warn!("unreadable script tag: {}", e);
            return BTreeMap::new();
        }
    };

    let mut metadata = BTreeMap::new();
    if values.first().and_then(AmfValue::as_str) != Some("onMetaData") {
        return metadata;
    }

    if let Some(AmfValue::EcmaArray(props) | AmfValue::Object(props)) = values.get(1) {
        for (key, value) in props {
            let rendered = match value {
                AmfValue::Number(n) => n.to_string(),
                AmfValue::Boolean(b) => b.to_string(),
                AmfValue::String(s) => s.clone(),
                _ => continue,
            };
            metadata.insert(key.clone(), rendered);
        }
    }

    metadata
}
