//! The demux-and-pace loop.
//!
//! [`StreamPump`] reads one tag at a time into a single reusable
//! [`TransmissionPacket`], waits out the timestamp delta since the previous
//! transmission, and hands the packet to a [`Connection`].
//!
//! ```text
//! Idle ──► Opened ──► Streaming ──► Finished
//!                         │    └──► Disconnected
//!                         └───────► Failed
//! ```

pub mod pacing;

pub use pacing::{delay_for, PacingClock, Sleeper, ThreadSleeper};

use flvpush_common::{TagType, TransmissionPacket, DEFAULT_BODY_CAPACITY, MEDIA_CHANNEL};
use flvpush_media::{FlvHeader, TagDecoder, TagHeader};
use flvpush_rtmp::Connection;
use std::io::Read;
use std::time::Duration;
use thiserror::Error;

/// Pump lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    Idle,
    /// Preamble skipped, nothing decoded yet.
    Opened,
    Streaming,
    Finished,
    Disconnected,
    Failed,
}

impl PumpState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Disconnected | Self::Failed)
    }
}

/// How a session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The container ended.
    Finished,
    /// The remote side went away.
    Disconnected,
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Finished => write!(f, "finished"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Fatal pump errors.
#[derive(Debug, Error)]
pub enum PumpError {
    /// A tag could not be decoded.
    #[error("Failed to decode tag: {0}")]
    Decode(#[source] flvpush_media::Error),

    /// The connection refused a packet while still reporting itself live.
    #[error("Failed to send tag: {0}")]
    Send(#[source] flvpush_rtmp::Error),

    /// Reading the container failed.
    #[error("I/O error reading container: {0}")]
    Io(#[from] std::io::Error),
}

impl From<flvpush_media::Error> for PumpError {
    fn from(err: flvpush_media::Error) -> Self {
        match err {
            flvpush_media::Error::Io(e) => Self::Io(e),
            other => Self::Decode(other),
        }
    }
}

/// Pump settings.
#[derive(Debug, Clone)]
pub struct PumpOptions {
    /// Pacing speed multiplier, see [`PacingClock::new`].
    pub speed: f64,
    /// Packet body capacity.
    pub buffer_capacity: usize,
    /// Chunk stream id media is written on.
    pub channel: u32,
}

impl Default for PumpOptions {
    fn default() -> Self {
        Self {
            speed: 1.0,
            buffer_capacity: DEFAULT_BODY_CAPACITY,
            channel: MEDIA_CHANNEL,
        }
    }
}

/// Counters for transmitted tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PumpStats {
    pub tags_sent: u64,
    pub bytes_sent: u64,
    pub audio_tags: u64,
    pub video_tags: u64,
    pub script_tags: u64,
    pub other_tags: u64,
    /// Timestamp of the last transmitted tag.
    pub last_timestamp: Option<u32>,
    /// Total time spent pacing.
    pub paced: Duration,
}

impl PumpStats {
    fn record(&mut self, header: &TagHeader, delay: Duration) {
        self.tags_sent += 1;
        self.bytes_sent += header.body_size as u64;
        match header.tag_type {
            TagType::Audio => self.audio_tags += 1,
            TagType::Video => self.video_tags += 1,
            TagType::Script => self.script_tags += 1,
            TagType::Other(_) => self.other_tags += 1,
        }
        self.last_timestamp = Some(header.timestamp);
        self.paced += delay;
    }
}

/// Drives tags from a decoder to a connection at their recorded cadence.
pub struct StreamPump<R, C, S = ThreadSleeper> {
    decoder: TagDecoder<R>,
    connection: C,
    packet: TransmissionPacket,
    clock: PacingClock,
    sleeper: S,
    state: PumpState,
    header: Option<FlvHeader>,
    stats: PumpStats,
}

impl<R: Read, C: Connection> StreamPump<R, C> {
    /// A real-time pump with default options.
    pub fn new(decoder: TagDecoder<R>, connection: C) -> Self {
        Self::with_sleeper(decoder, connection, &PumpOptions::default(), ThreadSleeper)
    }
}

impl<R: Read, C: Connection, S: Sleeper> StreamPump<R, C, S> {
    pub fn with_sleeper(
        decoder: TagDecoder<R>,
        connection: C,
        options: &PumpOptions,
        sleeper: S,
    ) -> Self {
        let mut packet = TransmissionPacket::with_capacity(options.buffer_capacity);
        packet.channel = options.channel;
        packet.stream_id = connection.stream_id();

        Self {
            decoder,
            connection,
            packet,
            clock: PacingClock::new(options.speed),
            sleeper,
            state: PumpState::Idle,
            header: None,
            stats: PumpStats::default(),
        }
    }

    pub fn state(&self) -> PumpState {
        self.state
    }

    pub fn stats(&self) -> &PumpStats {
        &self.stats
    }

    /// The session packet.
    pub fn packet(&self) -> &TransmissionPacket {
        &self.packet
    }

    /// File header found while opening, if it was well formed.
    pub fn header(&self) -> Option<&FlvHeader> {
        self.header.as_ref()
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    pub fn into_connection(self) -> C {
        self.connection
    }

    /// Skip the container preamble. Called by [`run`](Self::run) when needed.
    pub fn open(&mut self) -> Result<(), PumpError> {
        if self.state != PumpState::Idle {
            return Ok(());
        }
        match self.decoder.skip_preamble() {
            Ok(header) => {
                self.header = header;
                self.state = PumpState::Opened;
                tracing::debug!(offset = self.decoder.position(), "container opened");
                Ok(())
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Pump until the container ends, the peer disconnects or a tag cannot
    /// be handled.
    pub fn run(&mut self) -> Result<Termination, PumpError> {
        self.open()?;

        loop {
            if let Some(termination) = self.step()? {
                tracing::info!(
                    tags = self.stats.tags_sent,
                    bytes = self.stats.bytes_sent,
                    last_timestamp = ?self.stats.last_timestamp,
                    "pump {}",
                    termination
                );
                return Ok(termination);
            }
        }
    }

    fn step(&mut self) -> Result<Option<Termination>, PumpError> {
        match self.state {
            PumpState::Finished => return Ok(Some(Termination::Finished)),
            PumpState::Disconnected => return Ok(Some(Termination::Disconnected)),
            _ => {}
        }

        let header = match self.decoder.decode_next(&mut self.packet) {
            Ok(header) => header,
            Err(flvpush_media::Error::TruncatedInput { available, .. }) => {
                if available > 0 {
                    tracing::warn!(
                        available,
                        offset = self.decoder.position(),
                        "discarding partial tag header at end of container"
                    );
                }
                self.state = PumpState::Finished;
                return Ok(Some(Termination::Finished));
            }
            Err(e) => return Err(self.fail(e.into())),
        };

        if self.state == PumpState::Opened {
            self.state = PumpState::Streaming;
        }

        if !self.connection.is_connected() {
            tracing::info!(
                timestamp = header.timestamp,
                "connection lost before send"
            );
            self.state = PumpState::Disconnected;
            return Ok(Some(Termination::Disconnected));
        }

        let delay = self.clock.next_delay(header.timestamp);
        self.sleeper.sleep(delay);

        if let Err(e) = self.connection.send(&self.packet) {
            if !self.connection.is_connected() {
                tracing::info!("connection lost during send: {}", e);
                self.state = PumpState::Disconnected;
                return Ok(Some(Termination::Disconnected));
            }
            return Err(self.fail(PumpError::Send(e)));
        }

        self.clock.record(header.timestamp);
        self.stats.record(&header, delay);
        tracing::debug!(
            tag_type = %header.tag_type,
            timestamp = header.timestamp,
            size = header.body_size,
            delay_ms = delay.as_millis() as u64,
            "sent tag"
        );

        Ok(None)
    }

    fn fail(&mut self, err: PumpError) -> PumpError {
        tracing::error!(offset = self.decoder.position(), "pump failed: {}", err);
        self.state = PumpState::Failed;
        err
    }
}
