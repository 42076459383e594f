use crate::sink::CaptureSink;
use anyhow::{anyhow, Context, Result};
use bytes::Bytes;
use serlink_core::builder::{build_key_packet, KeyState};
use serlink_core::stream::{PacketReader, PacketWriter};
use serlink_core::{dispatch, FrameError, Packet, ReassemblerConfig, ReassemblyStats};
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::io::Write;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Options for monitoring a live link
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    /// Serial device node or any readable byte source
    pub device: String,
    /// Reassembler configuration
    pub config: ReassemblerConfig,
    /// Bytes requested from the device per read
    pub chunk_size: usize,
    /// Directory receiving `frame_NNNNN.jpg` for each video packet
    pub frames_dir: Option<PathBuf>,
    /// Stop after this many packets
    pub limit: Option<u64>,
    /// Key state sent to the device once the link is open
    pub keys: Option<KeyState>,
    /// Where outbound frames go; the device itself when unset
    pub outbound: Option<String>,
    /// Interval between throughput reports
    pub report_interval: Duration,
}

/// What a monitoring session saw
#[derive(Debug, Default)]
pub struct MonitorSummary {
    /// Packets dispatched
    pub packets: u64,
    /// Frame errors reported by the reader
    pub errors: u64,
    /// Log lines received from the device
    pub logs: Vec<String>,
    /// Frames written to the outbound link
    pub frames_sent: u64,
    /// Reassembler counters, when the stream ended on its own
    pub stats: Option<ReassemblyStats>,
}

/// Writer thread fed with encoded frames through a channel
///
/// Frames are written in the order they are sent. The thread runs until
/// every sender is gone.
pub struct OutboundLink {
    tx: Sender<Bytes>,
    handle: thread::JoinHandle<Result<u64, FrameError>>,
}

impl OutboundLink {
    /// Spawn the writer thread over `sink`
    pub fn spawn<W: Write + Send + 'static>(sink: W) -> Self {
        let (tx, rx) = mpsc::channel::<Bytes>();
        let handle = thread::spawn(move || {
            let mut writer = PacketWriter::new(sink);
            for frame in rx {
                writer.write_frame(&frame)?;
                writer.flush()?;
                debug!("Sent {} byte frame", frame.len());
            }
            Ok(writer.frames_written())
        });
        Self { tx, handle }
    }

    /// Open `path` for appending and spawn the writer thread over it
    pub fn open(path: &str) -> Result<Self> {
        let sink = OpenOptions::new()
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open device for writing: {}", path))?;
        Ok(Self::spawn(sink))
    }

    /// Queue a frame; fails once the writer thread has stopped
    pub fn send(&self, frame: Bytes) -> Result<()> {
        self.tx
            .send(frame)
            .map_err(|_| anyhow!("Outbound writer has stopped"))
    }

    /// Close the channel and wait for queued frames to be written
    pub fn finish(self) -> Result<u64> {
        drop(self.tx);
        self.handle
            .join()
            .map_err(|_| anyhow!("Outbound writer thread panicked"))?
            .context("Failed to write outbound frame")
    }
}

/// Read packets from a device until it closes or `limit` is reached
///
/// Bytes are read and reassembled on a dedicated thread; this thread
/// dispatches packets and reports video throughput once per interval.
/// Key state, if given, is queued to a writer thread that owns the outbound
/// side of the link.
pub fn execute(options: MonitorOptions) -> Result<MonitorSummary> {
    info!("Monitoring {}", options.device);

    let source = File::open(&options.device)
        .with_context(|| format!("Failed to open device: {}", options.device))?;
    let mut reader = PacketReader::with_config(source, options.config, options.chunk_size)
        .context("Invalid reassembler config")?;
    let mut sink = CaptureSink::new(options.frames_dir.clone())
        .context("Failed to create frames directory")?;

    let outbound = match &options.keys {
        Some(keys) => {
            let frame = build_key_packet(keys).context("Failed to encode key state")?;
            let path = options.outbound.as_deref().unwrap_or(&options.device);
            let link = OutboundLink::open(path)?;
            link.send(frame)?;
            Some(link)
        }
        None => None,
    };

    let (tx, rx) = mpsc::channel::<Result<Packet, FrameError>>();
    let reader_thread = thread::spawn(move || {
        for item in reader.by_ref() {
            if tx.send(item).is_err() {
                break;
            }
        }
        reader.reassembler().stats()
    });

    let mut summary = MonitorSummary::default();
    let mut next_report = Instant::now() + options.report_interval;
    let mut disconnected = false;

    loop {
        let timeout = next_report.saturating_duration_since(Instant::now());
        match rx.recv_timeout(timeout) {
            Ok(Ok(packet)) => {
                dispatch(packet, &mut sink);
                summary.packets += 1;
            }
            Ok(Err(e)) => {
                warn!("Frame error: {}", e);
                summary.errors += 1;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                disconnected = true;
                break;
            }
        }

        if Instant::now() >= next_report {
            let (frames, bytes) = sink.take_window();
            let secs = options.report_interval.as_secs_f64();
            info!(
                "{:.1} fps, {:.0} bits/s, {} packets total",
                frames as f64 / secs,
                (bytes * 8) as f64 / secs,
                summary.packets
            );
            next_report = Instant::now() + options.report_interval;
        }

        if options.limit.is_some_and(|limit| summary.packets >= limit) {
            debug!("Packet limit reached");
            break;
        }
    }

    if let Some(link) = outbound {
        match link.finish() {
            Ok(frames) => summary.frames_sent = frames,
            Err(e) => warn!("Failed to send key state: {:?}", e),
        }
    }

    if let Some(e) = sink.take_write_error() {
        return Err(e).context("Failed to save video frame");
    }

    // A reader still blocked on the device is left behind
    if disconnected {
        let stats = reader_thread
            .join()
            .map_err(|_| anyhow!("Reader thread panicked"))?;
        summary.stats = Some(stats);
    }

    summary.logs = std::mem::take(&mut sink.logs);
    info!(
        "Monitor finished: {} packets, {} errors",
        summary.packets, summary.errors
    );

    Ok(summary)
}
