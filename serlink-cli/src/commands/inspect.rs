use crate::sink::CaptureSink;
use anyhow::{bail, Context, Result};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use serlink_core::{dispatch, PacketKind, Reassembler, ReassemblerConfig, ReassemblyStats};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

/// Options for replaying a captured byte stream
#[derive(Debug, Clone)]
pub struct InspectOptions {
    /// Capture file holding raw link bytes
    pub input: String,
    /// Bytes handed to the reassembler per call
    pub chunk_size: usize,
    /// Reassembler configuration
    pub config: ReassemblerConfig,
    /// Directory receiving `frame_NNNNN.jpg` for each video packet
    pub frames_dir: Option<PathBuf>,
    /// JSON report destination
    pub output: Option<String>,
    /// Print statistics only
    pub stats_only: bool,
    /// Show a progress bar while replaying
    pub progress: bool,
}

/// One packet as listed in the report
#[derive(Debug, Serialize, Deserialize)]
pub struct PacketSummary {
    /// Position in the order packets were emitted
    pub index: usize,
    /// Packet kind
    pub kind: PacketKind,
    /// Payload length in bytes
    pub len: usize,
}

/// Result of replaying a capture
#[derive(Debug, Serialize, Deserialize)]
pub struct InspectReport {
    /// Size of the capture
    pub bytes: usize,
    /// Reassembler counters after the replay
    pub stats: ReassemblyStats,
    /// Packets in emission order
    pub packets: Vec<PacketSummary>,
    /// Device log lines
    pub logs: Vec<String>,
    /// Frame errors as they were reported
    pub errors: Vec<String>,
}

/// Replay a capture through a reassembler in fixed-size chunks
pub fn execute(options: &InspectOptions) -> Result<InspectReport> {
    info!("Inspecting capture: {}", options.input);

    if options.chunk_size == 0 {
        bail!("Chunk size must be non-zero");
    }

    let data = fs::read(&options.input)
        .with_context(|| format!("Failed to read input file: {}", options.input))?;

    info!("File size: {} bytes", data.len());

    let reassembler =
        Reassembler::with_config(options.config).context("Invalid reassembler config")?;
    let mut sink = CaptureSink::new(options.frames_dir.clone())
        .context("Failed to create frames directory")?;

    let progress = if options.progress {
        let bar = ProgressBar::new(data.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{bar:40} {bytes}/{total_bytes} {msg}")
                .context("Invalid progress template")?,
        );
        bar
    } else {
        ProgressBar::hidden()
    };

    let mut packets = Vec::new();
    let mut errors = Vec::new();

    for chunk in data.chunks(options.chunk_size) {
        let mut input = chunk;
        // Each call yields at most one packet; keep draining what is buffered
        loop {
            match reassembler.try_process_chunk(input) {
                Ok(Some(packet)) => {
                    packets.push(PacketSummary {
                        index: packets.len(),
                        kind: packet.kind,
                        len: packet.len(),
                    });
                    dispatch(packet, &mut sink);
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Frame error: {}", e);
                    errors.push(e.to_string());
                }
            }
            input = &[];
        }
        progress.inc(chunk.len() as u64);
        progress.set_message(format!("{} packets", packets.len()));
    }
    progress.finish_and_clear();

    if let Some(e) = sink.take_write_error() {
        return Err(e).context("Failed to save video frame");
    }

    let stats = reassembler.stats();
    print_stats(&stats, &sink, data.len());

    let report = InspectReport {
        bytes: data.len(),
        stats,
        packets,
        logs: std::mem::take(&mut sink.logs),
        errors,
    };

    if options.stats_only {
        return Ok(report);
    }

    if let Some(output_path) = &options.output {
        let json = serde_json::to_string_pretty(&report)
            .with_context(|| "Failed to serialize report")?;

        fs::write(output_path, json)
            .with_context(|| format!("Failed to write output file: {}", output_path))?;

        info!("Report written to: {}", output_path);
    } else {
        println!("=== Packets ===");
        for summary in &report.packets {
            println!("#{:<6} {:<8} {} bytes", summary.index, summary.kind.name(), summary.len);
        }
    }

    Ok(report)
}

fn print_stats(stats: &ReassemblyStats, sink: &CaptureSink, bytes: usize) {
    println!("\n=== Replay Results ===");
    println!("Bytes replayed:    {} bytes", bytes);
    println!("Chunks:            {}", stats.chunks_received);
    println!("Frames extracted:  {}", stats.frames_extracted);
    println!("Packets emitted:   {}", stats.packets_emitted.to_string().green());
    if stats.malformed_frames > 0 {
        println!("Malformed frames:  {}", stats.malformed_frames.to_string().red());
    } else {
        println!("Malformed frames:  {}", stats.malformed_frames);
    }
    if stats.overflows > 0 {
        println!(
            "Overflows:         {} ({} bytes discarded)",
            stats.overflows.to_string().yellow(),
            stats.bytes_discarded
        );
    }

    println!("\n=== By Kind ===");
    for kind in PacketKind::ALL {
        println!(
            "{:<8} {:>6} packets {:>10} bytes",
            kind.name(),
            sink.count(kind),
            sink.counts.bytes[kind.as_u8() as usize]
        );
    }
    if sink.frames_saved > 0 {
        println!("Video frames saved: {}", sink.frames_saved);
    }
    println!();
}
