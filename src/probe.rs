//! Container inspection for the `probe` command.

use anyhow::{Context, Result};
use flvpush_media::FlvSummary;
use std::fmt::Write;
use std::path::Path;

/// Decode every tag of `path` and collect statistics.
pub fn probe_file(path: &Path, capacity: usize) -> Result<FlvSummary> {
    if !path.exists() {
        anyhow::bail!("File does not exist: {:?}", path);
    }

    FlvSummary::scan(path, capacity).with_context(|| format!("Failed to scan {:?}", path))
}

/// Human readable report.
pub fn format_summary(path: &Path, summary: &FlvSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "File: {}", path.display());

    match &summary.header {
        Some(header) => {
            let _ = writeln!(
                out,
                "FLV version {} (audio: {}, video: {})",
                header.version,
                if header.has_audio { "yes" } else { "no" },
                if header.has_video { "yes" } else { "no" },
            );
        }
        None => {
            let _ = writeln!(out, "FLV header: missing or invalid");
        }
    }

    let secs = summary.duration_ms() / 1000;
    let _ = writeln!(
        out,
        "Duration: {:02}:{:02}:{:02}.{:03}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        summary.duration_ms() % 1000
    );

    let _ = writeln!(out, "\nTags: {}", summary.tag_count());
    let _ = writeln!(out, "  audio:  {}", summary.audio_tags);
    let _ = writeln!(out, "  video:  {}", summary.video_tags);
    let _ = writeln!(out, "  script: {}", summary.script_tags);
    if summary.other_tags > 0 {
        let _ = writeln!(out, "  other:  {}", summary.other_tags);
    }
    let _ = writeln!(out, "Payload: {} bytes", summary.payload_bytes);
    let _ = writeln!(out, "Largest tag: {} bytes", summary.max_payload);
    if summary.non_monotonic > 0 {
        let _ = writeln!(
            out,
            "Timestamps going backwards: {}",
            summary.non_monotonic
        );
    }

    if !summary.metadata.is_empty() {
        let _ = writeln!(out, "\nMetadata:");
        for (key, value) in &summary.metadata {
            let _ = writeln!(out, "  {}: {}", key, value);
        }
    }

    out
}
