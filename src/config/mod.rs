mod types;

pub use types::*;

use anyhow::{Context, Result};
use flvpush_rtmp::chunk::{DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};
use std::path::Path;

/// Slowest non-zero pacing speed accepted.
pub const MIN_SPEED: f64 = 0.001;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./flvpush.toml",
        "~/.config/flvpush/config.toml",
        "/etc/flvpush/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    let publish = &config.publish;
    if !publish.speed.is_finite() || publish.speed < 0.0 {
        anyhow::bail!(
            "publish.speed must be a finite number >= 0, got {}",
            publish.speed
        );
    }
    if publish.speed > 0.0 && publish.speed < MIN_SPEED {
        anyhow::bail!(
            "publish.speed must be 0 or at least {}, got {}",
            MIN_SPEED,
            publish.speed
        );
    }
    if publish.buffer_capacity == 0 {
        anyhow::bail!("publish.buffer_capacity cannot be 0");
    }
    if !(2..=65599).contains(&publish.channel) {
        anyhow::bail!(
            "publish.channel must be a chunk stream id between 2 and 65599, got {}",
            publish.channel
        );
    }
    if publish.channel < 4 {
        tracing::warn!(
            "publish.channel {} shares a chunk stream with control traffic",
            publish.channel
        );
    }

    let rtmp = &config.rtmp;
    if rtmp.connect_timeout_secs == 0 {
        anyhow::bail!("rtmp.connect_timeout_secs cannot be 0");
    }
    if !(DEFAULT_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&rtmp.chunk_size) {
        anyhow::bail!(
            "rtmp.chunk_size must be between {} and {}, got {}",
            DEFAULT_CHUNK_SIZE,
            MAX_CHUNK_SIZE,
            rtmp.chunk_size
        );
    }

    Ok(())
}
