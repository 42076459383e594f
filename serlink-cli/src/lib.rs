//! Library entry for serlink-cli used by integration tests and embedding.

pub mod commands;
pub mod sink;

// Re-export commands for convenience
pub use commands::*;

use anyhow::{Context, Result};
use serlink_core::{PacketKind, ReassemblerConfig};
use std::fs;

/// Packet kind as accepted on the command line
#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum KindArg {
    /// Human-readable device log text
    Log,
    /// One complete JPEG image
    Video,
    /// Audio samples
    Sound,
    /// Network traffic
    Network,
    /// Key state
    Input,
}

impl From<KindArg> for PacketKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Log => PacketKind::Log,
            KindArg::Video => PacketKind::Video,
            KindArg::Sound => PacketKind::Sound,
            KindArg::Network => PacketKind::Network,
            KindArg::Input => PacketKind::Input,
        }
    }
}

/// Load a reassembler configuration from a JSON file
///
/// Missing fields take their defaults; without a path the default
/// configuration is returned.
pub fn load_config(path: Option<&str>) -> Result<ReassemblerConfig> {
    let Some(path) = path else {
        return Ok(ReassemblerConfig::default());
    };

    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read config file: {}", path))?;
    let config: ReassemblerConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path))?;
    config
        .validate()
        .with_context(|| format!("Invalid config file: {}", path))?;

    Ok(config)
}
