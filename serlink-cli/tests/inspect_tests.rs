use serlink_cli::commands::inspect::{self, InspectOptions, InspectReport};
use serlink_cli::load_config;
use serlink_core::constants::OverflowPolicy;
use serlink_core::{build_packet, cobs, PacketKind, ReassemblerConfig};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

/// Helper: a capture with one packet of every kind
fn create_capture() -> Vec<u8> {
    let mut stream = Vec::new();
    stream.extend_from_slice(&build_packet(PacketKind::Log, b"boot ok"));
    stream.extend_from_slice(&build_packet(PacketKind::Video, &[0xFF, 0xD8, 0x00, 0x10, 0xFF, 0xD9]));
    stream.extend_from_slice(&build_packet(PacketKind::Sound, &[0u8; 300]));
    stream.extend_from_slice(&build_packet(PacketKind::Network, b"\x45\x00\x00\x54"));
    stream.extend_from_slice(&build_packet(PacketKind::Input, &[0x80 | b'w']));
    stream
}

fn options(input: &Path, chunk_size: usize) -> InspectOptions {
    InspectOptions {
        input: input.to_str().unwrap().to_owned(),
        chunk_size,
        config: ReassemblerConfig::default(),
        frames_dir: None,
        output: None,
        stats_only: true,
        progress: false,
    }
}

#[test]
fn test_inspect_finds_every_packet() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("capture.bin");
    fs::write(&input, create_capture()).unwrap();

    for chunk_size in [1, 7, 64, 4096] {
        let report = inspect::execute(&options(&input, chunk_size)).unwrap();
        let kinds: Vec<_> = report.packets.iter().map(|p| p.kind).collect();
        assert_eq!(kinds, PacketKind::ALL, "chunk size {}", chunk_size);
        assert_eq!(report.logs, ["boot ok"]);
        assert!(report.errors.is_empty());
        assert_eq!(report.stats.packets_emitted, 5);
    }
}

#[test]
fn test_inspect_reports_malformed_frames() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("capture.bin");

    let mut stream = build_packet(PacketKind::Log, b"one").to_vec();
    let mut unknown = cobs::encode(&[5, 1, 2, 3]);
    unknown.push(0);
    stream.extend_from_slice(&unknown);
    stream.push(0x00);
    stream.extend_from_slice(&build_packet(PacketKind::Log, b"two"));
    fs::write(&input, &stream).unwrap();

    let report = inspect::execute(&options(&input, 1024)).unwrap();
    assert_eq!(report.logs, ["one", "two"]);
    assert_eq!(report.errors.len(), 2);
    assert_eq!(report.stats.malformed_frames, 2);
}

#[test]
fn test_inspect_writes_report_and_frames() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("capture.bin");
    let output = dir.path().join("report.json");
    let frames = dir.path().join("frames");
    fs::write(&input, create_capture()).unwrap();

    let mut opts = options(&input, 16);
    opts.stats_only = false;
    opts.output = Some(output.to_str().unwrap().to_owned());
    opts.frames_dir = Some(frames.clone());
    inspect::execute(&opts).unwrap();

    let report: InspectReport =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(report.packets.len(), 5);
    assert_eq!(report.packets[2].len, 300);

    let jpeg = fs::read(frames.join("frame_00000.jpg")).unwrap();
    assert_eq!(jpeg, [0xFF, 0xD8, 0x00, 0x10, 0xFF, 0xD9]);
}

#[test]
fn test_inspect_with_config_file() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("capture.bin");
    let config_path = dir.path().join("config.json");

    let mut stream = build_packet(PacketKind::Video, &[0x33; 500]).to_vec();
    stream.extend_from_slice(&build_packet(PacketKind::Log, b"small"));
    fs::write(&input, &stream).unwrap();
    fs::write(&config_path, r#"{ "capacity": 128, "overflow": "discard_and_resync" }"#).unwrap();

    let config = load_config(config_path.to_str()).unwrap();
    assert_eq!(config.capacity, 128);
    assert_eq!(config.overflow, OverflowPolicy::DiscardAndResync);

    let mut opts = options(&input, 64);
    opts.config = config;
    let report = inspect::execute(&opts).unwrap();

    assert_eq!(report.logs, ["small"]);
    assert!(report.stats.overflows >= 1);
    assert!(!report.errors.is_empty());
}

#[test]
fn test_invalid_config_rejected() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.json");
    fs::write(&config_path, r#"{ "capacity": 2 }"#).unwrap();
    assert!(load_config(config_path.to_str()).is_err());

    fs::write(&config_path, "not json").unwrap();
    assert!(load_config(config_path.to_str()).is_err());

    assert_eq!(load_config(None).unwrap(), ReassemblerConfig::default());
}

#[test]
fn test_inspect_zero_chunk_size() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("capture.bin");
    fs::write(&input, create_capture()).unwrap();
    assert!(inspect::execute(&options(&input, 0)).is_err());
}
