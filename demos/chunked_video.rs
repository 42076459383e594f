//! Reassemble video frames delivered in serial-sized chunks

use serlink_core::{builder::build_packet, PacketHandler, PacketKind, Reassembler};
use bytes::Bytes;

struct Display {
    frames: usize,
    bytes: usize,
}

impl PacketHandler for Display {
    fn on_log(&mut self, text: &str) {
        println!("device: {}", text);
    }

    fn on_video(&mut self, frame: Bytes) {
        self.frames += 1;
        self.bytes += frame.len();
        println!("Frame {}: {} bytes", self.frames, frame.len());
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Serlink Chunked Video Example\n");

    // Build a capture: a boot log, then five fake JPEG frames
    let mut stream = build_packet(PacketKind::Log, b"camera ready").to_vec();
    for i in 0..5u8 {
        let mut jpeg = vec![0xFF, 0xD8];
        jpeg.extend((0..13_500u32).map(|j| (j as u8).wrapping_mul(i + 1)));
        jpeg.extend_from_slice(&[0xFF, 0xD9]);
        stream.extend_from_slice(&build_packet(PacketKind::Video, &jpeg));
    }

    std::fs::write("example_capture.bin", &stream)?;

    // Serial reads arrive 700 bytes at a time
    let reassembler = Reassembler::new();
    let mut display = Display { frames: 0, bytes: 0 };
    for chunk in stream.chunks(700) {
        reassembler.process_chunk_with(chunk, &mut display);
    }
    while reassembler.process_chunk_with(&[], &mut display) {}

    let stats = reassembler.stats();
    println!(
        "\n{} chunks, {} packets, {} video bytes",
        stats.chunks_received, stats.packets_emitted, display.bytes
    );
    println!("Wrote {} bytes to example_capture.bin", stream.len());
    println!("Use 'serlink inspect --input example_capture.bin' to replay it");

    Ok(())
}
