//! Packet consumer shared by the replay and monitor commands

use bytes::Bytes;
use serlink_core::builder::decode_key_state;
use serlink_core::dispatch::{CountingHandler, PacketHandler};
use serlink_core::PacketKind;
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Counts packets, echoes device logs and optionally stores video frames
#[derive(Debug, Default)]
pub struct CaptureSink {
    /// Per-kind packet and byte counters
    pub counts: CountingHandler,
    /// Log lines received from the device
    pub logs: Vec<String>,
    /// Video frames written to `frames_dir`
    pub frames_saved: u64,
    frames_dir: Option<PathBuf>,
    write_error: Option<io::Error>,
    window_frames: u64,
    window_bytes: u64,
}

impl CaptureSink {
    /// Create a sink; video frames are saved only when `frames_dir` is set
    pub fn new(frames_dir: Option<PathBuf>) -> io::Result<Self> {
        if let Some(dir) = &frames_dir {
            fs::create_dir_all(dir)?;
        }
        Ok(Self {
            frames_dir,
            ..Self::default()
        })
    }

    /// Total packets seen
    pub fn total_packets(&self) -> u64 {
        self.counts.packets.iter().sum()
    }

    /// Packets seen of one kind
    pub fn count(&self, kind: PacketKind) -> u64 {
        self.counts.count(kind)
    }

    /// First error hit while saving a video frame, if any
    pub fn take_write_error(&mut self) -> Option<io::Error> {
        self.write_error.take()
    }

    /// Video frames and encoded video bytes since the last call
    pub fn take_window(&mut self) -> (u64, u64) {
        let window = (self.window_frames, self.window_bytes);
        self.window_frames = 0;
        self.window_bytes = 0;
        window
    }

    fn save_frame(&mut self, frame: &[u8]) {
        let Some(dir) = &self.frames_dir else {
            return;
        };
        let path = dir.join(format!("frame_{:05}.jpg", self.frames_saved));
        match fs::write(&path, frame) {
            Ok(()) => {
                debug!("Saved {} ({} bytes)", path.display(), frame.len());
                self.frames_saved += 1;
            }
            Err(e) => {
                warn!("Failed to save {}: {}", path.display(), e);
                self.write_error.get_or_insert(e);
            }
        }
    }
}

impl PacketHandler for CaptureSink {
    fn on_log(&mut self, text: &str) {
        self.counts.on_log(text);
        info!("device: {}", text);
        self.logs.push(text.to_owned());
    }

    fn on_video(&mut self, frame: Bytes) {
        self.window_frames += 1;
        self.window_bytes += frame.len() as u64;
        self.save_frame(&frame);
        self.counts.on_video(frame);
    }

    fn on_sound(&mut self, data: Bytes) {
        self.counts.on_sound(data);
    }

    fn on_network(&mut self, data: Bytes) {
        self.counts.on_network(data);
    }

    fn on_input(&mut self, data: Bytes) {
        let keys = decode_key_state(&data);
        debug!("Key state: {} keys", keys.len());
        self.counts.on_input(data);
    }
}
