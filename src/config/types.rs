use flvpush_common::{DEFAULT_BODY_CAPACITY, MEDIA_CHANNEL};
use flvpush_rtmp::ConnectOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::pump::PumpOptions;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub publish: PublishConfig,

    #[serde(default)]
    pub rtmp: RtmpConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PublishConfig {
    /// Playback speed multiplier. 1.0 is real time, 0 disables pacing.
    #[serde(default = "default_speed")]
    pub speed: f64,

    /// Largest tag body the publisher accepts, in bytes.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Chunk stream id media is written on.
    #[serde(default = "default_channel")]
    pub channel: u32,
}

fn default_speed() -> f64 {
    1.0
}
fn default_buffer_capacity() -> usize {
    DEFAULT_BODY_CAPACITY
}
fn default_channel() -> u32 {
    MEDIA_CHANNEL
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            speed: default_speed(),
            buffer_capacity: default_buffer_capacity(),
            channel: default_channel(),
        }
    }
}

impl PublishConfig {
    pub fn pump_options(&self) -> PumpOptions {
        PumpOptions {
            speed: self.speed,
            buffer_capacity: self.buffer_capacity,
            channel: self.channel,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RtmpConfig {
    /// Timeout for the TCP connect and every blocking read or write.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Outgoing chunk size announced after the handshake.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,

    /// Overrides the `flashVer` sent in the connect command.
    #[serde(default)]
    pub flash_ver: Option<String>,
}

fn default_connect_timeout() -> u64 {
    10
}
fn default_chunk_size() -> u32 {
    4096
}

impl Default for RtmpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            chunk_size: default_chunk_size(),
            flash_ver: None,
        }
    }
}

impl RtmpConfig {
    pub fn connect_options(&self) -> ConnectOptions {
        let defaults = ConnectOptions::default();
        ConnectOptions {
            timeout: Duration::from_secs(self.connect_timeout_secs),
            chunk_size: self.chunk_size,
            flash_ver: self.flash_ver.clone().unwrap_or(defaults.flash_ver),
            ..defaults
        }
    }
}
