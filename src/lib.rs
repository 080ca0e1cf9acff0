//! Flvpush - replay FLV files to an RTMP endpoint
//!
//! This library crate exposes the pump and session entry points for the
//! binary and for integration testing.

pub mod config;
pub mod probe;
pub mod publish;
pub mod pump;

pub use publish::{publish, publish_with, PublishError, PublishReport};
pub use pump::{PumpError, PumpOptions, PumpState, PumpStats, StreamPump, Termination};
