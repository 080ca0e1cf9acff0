//! Session entry points: open the container, connect, pump, release.

use flvpush_media::TagDecoder;
use flvpush_rtmp::RtmpConnection;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::Config;
use crate::pump::{PumpError, PumpStats, StreamPump, Termination, ThreadSleeper};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Container not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: flvpush_media::Error,
    },

    #[error("Failed to connect: {0}")]
    Connect(#[from] flvpush_rtmp::Error),

    #[error(transparent)]
    Pump(#[from] PumpError),
}

/// Outcome of a completed session.
#[derive(Debug, Clone)]
pub struct PublishReport {
    pub termination: Termination,
    pub stats: PumpStats,
}

/// Publish `path` to `address` with default settings.
pub fn publish(path: impl AsRef<Path>, address: &str) -> Result<Termination, PublishError> {
    publish_with(&Config::default(), path, address).map(|report| report.termination)
}

/// Publish `path` to `address`.
///
/// The container is opened before connecting so a missing file never
/// touches the network.
pub fn publish_with(
    config: &Config,
    path: impl AsRef<Path>,
    address: &str,
) -> Result<PublishReport, PublishError> {
    let path = path.as_ref();
    let decoder = TagDecoder::open(path).map_err(|e| match e {
        flvpush_media::Error::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
            PublishError::NotFound(path.to_path_buf())
        }
        other => PublishError::Open {
            path: path.to_path_buf(),
            source: other,
        },
    })?;

    tracing::info!("Publishing {:?} to {}", path, address);
    let connection = RtmpConnection::connect(address, &config.rtmp.connect_options())?;

    let mut pump = StreamPump::with_sleeper(
        decoder,
        connection,
        &config.publish.pump_options(),
        ThreadSleeper,
    );
    let termination = pump.run()?;
    let stats = pump.stats().clone();

    let mut connection = pump.into_connection();
    connection.close();

    Ok(PublishReport { termination, stats })
}
