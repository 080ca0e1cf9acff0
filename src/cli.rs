use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "flvpush")]
#[command(author, version, about = "Replay FLV files to an RTMP endpoint in real time")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Publish an FLV file to an RTMP URL
    Publish {
        /// FLV file to publish
        #[arg(required = true)]
        file: PathBuf,

        /// Destination, e.g. rtmp://host/app/stream
        #[arg(required = true)]
        url: String,

        /// Playback speed multiplier (0 sends as fast as possible)
        #[arg(long)]
        speed: Option<f64>,
    },

    /// Decode an FLV file and display tag statistics
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
