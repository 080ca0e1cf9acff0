mod cli;

use flvpush::{config, probe, publish, Termination};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "flvpush=trace,flvpush_media=trace,flvpush_rtmp=trace,flvpush_common=debug".to_string()
        } else {
            "flvpush=info,flvpush_media=info,flvpush_rtmp=info".to_string()
        }
    });

    // Logs go to stderr so `probe --json` output stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Publish { file, url, speed } => {
            publish_file(&file, &url, speed, cli.config.as_deref())
        }
        Commands::Probe { file, json } => probe_file(&file, json, cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("flvpush {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn publish_file(
    file: &Path,
    url: &str,
    speed: Option<f64>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    if let Some(speed) = speed {
        config.publish.speed = speed;
        config::validate_config(&config)?;
    }

    let report = publish::publish_with(&config, file, url)?;
    let stats = &report.stats;

    match report.termination {
        Termination::Finished => println!("Finished publishing {}", file.display()),
        Termination::Disconnected => println!("Remote endpoint closed the connection"),
    }
    println!(
        "Sent {} tags ({} audio, {} video, {} script), {} bytes",
        stats.tags_sent, stats.audio_tags, stats.video_tags, stats.script_tags, stats.bytes_sent
    );
    if let Some(ts) = stats.last_timestamp {
        println!("Last timestamp: {} ms", ts);
    }

    Ok(())
}

fn probe_file(file: &Path, json: bool, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let summary = probe::probe_file(file, config.publish.buffer_capacity)?;

    if json {
        let json_str = serde_json::to_string_pretty(&summary)?;
        println!("{}", json_str);
    } else {
        print!("{}", probe::format_summary(file, &summary));
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            print_config(&config);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            print_config(&config);
        }
    }

    Ok(())
}

fn print_config(config: &config::Config) {
    println!("  Speed: {}", config.publish.speed);
    println!("  Buffer capacity: {} bytes", config.publish.buffer_capacity);
    println!("  Channel: {}", config.publish.channel);
    println!("  Connect timeout: {}s", config.rtmp.connect_timeout_secs);
    println!("  Chunk size: {}", config.rtmp.chunk_size);
}
