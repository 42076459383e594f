//! Incremental frame reassembly from an unframed byte stream
//!
//! Chunks arrive with no relation to frame boundaries. The reassembler keeps
//! the bytes of the frame in progress in a fixed-capacity buffer, scans each
//! byte for the delimiter exactly once, and when a frame completes moves the
//! bytes that follow it to the start of the buffer before decoding.
//!
//! At most one packet is produced per call. If the bytes left over after a
//! frame already contain the next complete frame, it is returned by the next
//! call, which may pass an empty chunk.
//!
//! The capacity bounds the frame in progress, not the chunk. When a chunk
//! carries more complete frames than the buffer holds, they wait in a backlog
//! and come out one per call, ahead of anything still buffered. Overflow
//! reports join the same backlog, so an overflow caused by the bytes behind a
//! returned packet is reported by the following call.
//!
//! # Single flight
//!
//! A reassembler is driven by one reader. Calls do not block on each other:
//! a call that arrives while another is in progress on the same instance
//! (for example from a [`PacketHandler`] invoked by
//! [`Reassembler::process_chunk_with`]) drops its chunk and reports
//! [`FrameError::Busy`]. Losing a slice of live telemetry is preferred over
//! interleaving two writers in the buffer.

use crate::cobs;
use crate::constants::{
    Integrity, OverflowPolicy, CRC32C_SIZE, DEFAULT_REASSEMBLY_CAPACITY, FRAME_DELIMITER,
    MIN_REASSEMBLY_CAPACITY,
};
use crate::dispatch::{dispatch, PacketHandler};
use crate::error::{CobsError, FrameError};
use crate::types::Packet;
use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::vec;
use alloc::vec::Vec;
use bytes::Bytes;
use core::cell::{Cell, RefCell, RefMut};
use memchr::{memchr, memrchr};
use serde::{Deserialize, Serialize};

#[cfg(feature = "logging")]
use tracing::{debug, warn};

/// Reassembler settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReassemblerConfig {
    /// Size of the reassembly buffer in bytes
    pub capacity: usize,

    /// Behaviour when a frame outgrows the buffer
    pub overflow: OverflowPolicy,

    /// Integrity trailer expected on every frame
    pub integrity: Integrity,
}

impl Default for ReassemblerConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_REASSEMBLY_CAPACITY,
            overflow: OverflowPolicy::default(),
            integrity: Integrity::default(),
        }
    }
}

impl ReassemblerConfig {
    /// Set the buffer capacity
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the overflow policy
    pub fn overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    /// Set the expected integrity trailer
    pub fn integrity(mut self, integrity: Integrity) -> Self {
        self.integrity = integrity;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), FrameError> {
        if self.capacity < MIN_REASSEMBLY_CAPACITY {
            return Err(FrameError::InvalidConfig("capacity below minimum"));
        }
        Ok(())
    }
}

/// Counters describing what a reassembler has seen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassemblyStats {
    /// Chunks accepted for processing
    pub chunks_received: u64,

    /// Bytes in accepted chunks
    pub bytes_received: u64,

    /// Chunks dropped because a call was already in progress
    pub dropped_chunks: u64,

    /// Delimited frames taken out of the buffer
    pub frames_extracted: u64,

    /// Frames that became packets
    pub packets_emitted: u64,

    /// Frames dropped as malformed (bad COBS, checksum, kind, empty)
    pub malformed_frames: u64,

    /// Times the buffer capacity was exceeded
    pub overflows: u64,

    /// Bytes thrown away by overflow handling
    pub bytes_discarded: u64,
}

/// Position of the cursors inside the reassembly buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferState {
    /// Bytes currently buffered
    pub write_offset: usize,

    /// Index where the next delimiter search starts
    pub scan_cursor: usize,

    /// Whether bytes are being skipped up to the next delimiter
    pub resyncing: bool,

    /// Complete frames and overflow reports waiting to be returned
    pub queued: usize,
}

struct ReassemblyState {
    buffer: Box<[u8]>,
    write_offset: usize,
    scan_cursor: usize,
    resyncing: bool,
    // Complete frames that did not fit the buffer, and overflows not yet
    // reported, in stream order. Everything here precedes the buffer.
    backlog: VecDeque<Result<Vec<u8>, FrameError>>,
}

impl ReassemblyState {
    fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0u8; capacity].into_boxed_slice(),
            write_offset: 0,
            scan_cursor: 0,
            resyncing: false,
            backlog: VecDeque::new(),
        }
    }

    fn capacity(&self) -> usize {
        self.buffer.len()
    }

    fn clear(&mut self) {
        self.write_offset = 0;
        self.scan_cursor = 0;
        self.resyncing = false;
        self.backlog.clear();
    }

    fn snapshot(&self) -> BufferState {
        BufferState {
            write_offset: self.write_offset,
            scan_cursor: self.scan_cursor,
            resyncing: self.resyncing,
            queued: self.backlog.len(),
        }
    }

    fn ingest(
        &mut self,
        chunk: &[u8],
        config: &ReassemblerConfig,
        stats: &mut ReassemblyStats,
    ) -> Result<Option<Packet>, FrameError> {
        stats.chunks_received += 1;
        stats.bytes_received += chunk.len() as u64;

        let mut chunk = chunk;
        if self.resyncing {
            let Some(pos) = memchr(FRAME_DELIMITER, chunk) else {
                stats.bytes_discarded += chunk.len() as u64;
                return self.next_frame(config, stats);
            };
            stats.bytes_discarded += (pos + 1) as u64;
            self.resyncing = false;
            chunk = &chunk[pos + 1..];

            #[cfg(feature = "logging")]
            debug!("Resynchronised at delimiter, {} bytes skipped", pos + 1);
        }

        self.stash(chunk, config, stats);
        self.next_frame(config, stats)
    }

    /// Take the oldest complete frame, backlog first, then the buffer
    fn next_frame(
        &mut self,
        config: &ReassemblerConfig,
        stats: &mut ReassemblyStats,
    ) -> Result<Option<Packet>, FrameError> {
        if let Some(queued) = self.backlog.pop_front() {
            let frame = queued?;
            let decoded = cobs::decode(&frame);
            return finish_frame(frame.len(), decoded, config, stats);
        }

        // Only bytes appended since the last search are scanned
        let Some(pos) = memchr(
            FRAME_DELIMITER,
            &self.buffer[self.scan_cursor..self.write_offset],
        ) else {
            self.scan_cursor = self.write_offset;
            return Ok(None);
        };

        let end = self.scan_cursor + pos;
        let decoded = cobs::decode(&self.buffer[..end]);
        self.buffer.copy_within(end + 1..self.write_offset, 0);
        self.write_offset -= end + 1;
        self.scan_cursor = 0;

        finish_frame(end, decoded, config, stats)
    }

    /// Append bytes after the buffered ones
    ///
    /// When they do not fit, complete frames move to the backlog and only the
    /// undelimited tail is held to the capacity.
    fn stash(&mut self, bytes: &[u8], config: &ReassemblerConfig, stats: &mut ReassemblyStats) {
        let needed = self.write_offset + bytes.len();
        if needed <= self.capacity() {
            self.buffer[self.write_offset..needed].copy_from_slice(bytes);
            self.write_offset = needed;
            return;
        }

        let tail = match memrchr(FRAME_DELIMITER, bytes) {
            Some(last) => {
                let mut delimited = Vec::with_capacity(self.write_offset + last + 1);
                delimited.extend_from_slice(&self.buffer[..self.write_offset]);
                delimited.extend_from_slice(&bytes[..=last]);
                self.write_offset = 0;
                self.queue_frames(&delimited, stats);
                &bytes[last + 1..]
            }
            None => {
                if let Some(last) = memrchr(FRAME_DELIMITER, &self.buffer[..self.write_offset]) {
                    let delimited = self.buffer[..=last].to_vec();
                    self.buffer.copy_within(last + 1..self.write_offset, 0);
                    self.write_offset -= last + 1;
                    self.queue_frames(&delimited, stats);
                }
                bytes
            }
        };
        self.scan_cursor = 0;

        let needed = self.write_offset + tail.len();
        if needed <= self.capacity() {
            self.buffer[self.write_offset..needed].copy_from_slice(tail);
            self.write_offset = needed;
            // No delimiter is left in the buffer
            self.scan_cursor = needed;
            return;
        }

        let capacity = self.capacity();
        stats.overflows += 1;
        stats.bytes_discarded += needed as u64;
        self.write_offset = 0;

        #[cfg(feature = "logging")]
        warn!(
            "Reassembly buffer overflow: {} bytes needed, capacity {}",
            needed, capacity
        );

        // The rest of the frame in progress is still to come
        self.resyncing = config.overflow == OverflowPolicy::DiscardAndResync;
        self.backlog
            .push_back(Err(FrameError::BufferOverflow { needed, capacity }));
    }

    /// Queue every frame of `delimited`, which ends with a delimiter
    fn queue_frames(&mut self, delimited: &[u8], stats: &mut ReassemblyStats) {
        let capacity = self.capacity();
        let body = &delimited[..delimited.len() - 1];
        for frame in body.split(|&byte| byte == FRAME_DELIMITER) {
            if frame.len() > capacity {
                stats.overflows += 1;
                stats.bytes_discarded += (frame.len() + 1) as u64;

                #[cfg(feature = "logging")]
                warn!(
                    "Dropping {} byte frame, larger than buffer capacity {}",
                    frame.len(),
                    capacity
                );

                self.backlog.push_back(Err(FrameError::BufferOverflow {
                    needed: frame.len(),
                    capacity,
                }));
            } else {
                self.backlog.push_back(Ok(frame.to_vec()));
            }
        }
    }
}

fn finish_frame(
    frame_len: usize,
    decoded: Result<Vec<u8>, CobsError>,
    config: &ReassemblerConfig,
    stats: &mut ReassemblyStats,
) -> Result<Option<Packet>, FrameError> {
    stats.frames_extracted += 1;

    let packet = decoded
        .map_err(FrameError::from)
        .and_then(|decoded| strip_trailer(decoded, config.integrity))
        .and_then(|decoded| Packet::from_decoded(Bytes::from(decoded)));

    match packet {
        Ok(packet) => {
            stats.packets_emitted += 1;

            #[cfg(feature = "logging")]
            debug!(
                "Extracted {} packet: {} encoded bytes, {} payload bytes",
                packet.kind,
                frame_len,
                packet.len()
            );
            #[cfg(not(feature = "logging"))]
            let _ = frame_len;

            Ok(Some(packet))
        }
        Err(err) => {
            stats.malformed_frames += 1;
            Err(err)
        }
    }
}

fn strip_trailer(mut decoded: Vec<u8>, integrity: Integrity) -> Result<Vec<u8>, FrameError> {
    match integrity {
        Integrity::None => Ok(decoded),
        Integrity::Crc32c => {
            if decoded.is_empty() {
                return Err(FrameError::EmptyFrame);
            }
            if decoded.len() < 1 + CRC32C_SIZE {
                return Err(FrameError::MissingChecksum(decoded.len()));
            }
            let body_len = decoded.len() - CRC32C_SIZE;
            let trailer = &decoded[body_len..];
            let expected = u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
            let actual = crc32c::crc32c(&decoded[..body_len]);
            if actual != expected {
                return Err(FrameError::ChecksumMismatch { expected, actual });
            }
            decoded.truncate(body_len);
            Ok(decoded)
        }
    }
}

/// Turns raw chunks from one connection into packets
///
/// Create one instance per connection and drop it when the connection goes
/// away. The instance is `Send` but not `Sync`.
pub struct Reassembler {
    config: ReassemblerConfig,
    state: RefCell<ReassemblyState>,
    stats: Cell<ReassemblyStats>,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reassembler {
    /// Create a reassembler with the default configuration
    pub fn new() -> Self {
        Self::build(ReassemblerConfig::default())
    }

    /// Create a reassembler with a validated configuration
    pub fn with_config(config: ReassemblerConfig) -> Result<Self, FrameError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: ReassemblerConfig) -> Self {
        Self {
            state: RefCell::new(ReassemblyState::new(config.capacity)),
            stats: Cell::new(ReassemblyStats::default()),
            config,
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &ReassemblerConfig {
        &self.config
    }

    /// Counters accumulated since creation
    pub fn stats(&self) -> ReassemblyStats {
        self.stats.get()
    }

    /// Whether a call is in progress on this instance
    pub fn is_busy(&self) -> bool {
        self.state.try_borrow_mut().is_err()
    }

    /// Buffer cursors, or `None` while a call is in progress
    pub fn buffer_state(&self) -> Option<BufferState> {
        self.state.try_borrow().ok().map(|state| state.snapshot())
    }

    /// Forget all buffered bytes
    pub fn reset(&self) -> Result<(), FrameError> {
        let mut state = self.state.try_borrow_mut().map_err(|_| FrameError::Busy)?;
        state.clear();
        Ok(())
    }

    fn acquire(&self, chunk_len: usize) -> Option<RefMut<'_, ReassemblyState>> {
        match self.state.try_borrow_mut() {
            Ok(state) => Some(state),
            Err(_) => {
                let mut stats = self.stats.get();
                stats.dropped_chunks += 1;
                self.stats.set(stats);

                #[cfg(feature = "logging")]
                warn!("Reassembler busy, dropping {} byte chunk", chunk_len);
                #[cfg(not(feature = "logging"))]
                let _ = chunk_len;

                None
            }
        }
    }

    fn ingest(
        &self,
        state: &mut ReassemblyState,
        chunk: &[u8],
    ) -> Result<Option<Packet>, FrameError> {
        let mut stats = self.stats.get();
        let result = state.ingest(chunk, &self.config, &mut stats);
        self.stats.set(stats);
        result
    }

    /// Feed one chunk, reporting why no packet was produced
    ///
    /// Frame-local errors ([`FrameError::is_frame_local`]) leave the stream
    /// usable; the caller just continues with the next chunk.
    pub fn try_process_chunk(&self, chunk: &[u8]) -> Result<Option<Packet>, FrameError> {
        let Some(mut state) = self.acquire(chunk.len()) else {
            return Err(FrameError::Busy);
        };
        self.ingest(&mut state, chunk)
    }

    /// Feed one chunk, returning the packet it completed, if any
    ///
    /// Dropped chunks and malformed frames are logged and counted in
    /// [`Reassembler::stats`].
    pub fn process_chunk(&self, chunk: &[u8]) -> Option<Packet> {
        match self.try_process_chunk(chunk) {
            Ok(packet) => packet,
            Err(FrameError::Busy) => None,
            Err(_err) => {
                #[cfg(feature = "logging")]
                warn!("Dropping frame: {:?}", _err);
                None
            }
        }
    }

    /// Feed one chunk and hand a completed packet to `handler`
    ///
    /// The handler runs before this call returns and while the instance is
    /// still busy, so chunks it feeds back into this reassembler are dropped.
    /// Returns whether a packet was dispatched.
    pub fn process_chunk_with<H: PacketHandler + ?Sized>(
        &self,
        chunk: &[u8],
        handler: &mut H,
    ) -> bool {
        let Some(mut state) = self.acquire(chunk.len()) else {
            return false;
        };
        match self.ingest(&mut state, chunk) {
            Ok(Some(packet)) => {
                dispatch(packet, handler);
                drop(state);
                true
            }
            Ok(None) => false,
            Err(_err) => {
                #[cfg(feature = "logging")]
                warn!("Dropping frame: {:?}", _err);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{build_packet, PacketBuilder};
    use crate::types::PacketKind;

    fn small(capacity: usize, overflow: OverflowPolicy) -> Reassembler {
        Reassembler::with_config(
            ReassemblerConfig::default()
                .capacity(capacity)
                .overflow(overflow),
        )
        .unwrap()
    }

    #[test]
    fn test_single_frame() {
        let reassembler = Reassembler::new();
        let packet = reassembler
            .process_chunk(&build_packet(PacketKind::Log, b"hello"))
            .unwrap();

        assert_eq!(packet.kind, PacketKind::Log);
        assert_eq!(packet.log_text(), "hello");
        assert_eq!(reassembler.buffer_state(), Some(BufferState::default()));
    }

    #[test]
    fn test_every_split_point() {
        let frame = build_packet(PacketKind::Video, &[0xFF, 0xD8, 0x00, 0x10, 0x00]);

        for split in 0..=frame.len() {
            let reassembler = Reassembler::new();
            let first = reassembler.process_chunk(&frame[..split]);
            let second = reassembler.process_chunk(&frame[split..]);
            let packet = first.or(second).unwrap();

            assert_eq!(packet.kind, PacketKind::Video);
            assert_eq!(packet.payload.as_ref(), &[0xFF, 0xD8, 0x00, 0x10, 0x00]);
        }
    }

    #[test]
    fn test_partial_chunk_is_scanned_once() {
        let reassembler = Reassembler::new();
        assert!(reassembler.process_chunk(&[0x05, 0x01, 0x02]).is_none());

        let state = reassembler.buffer_state().unwrap();
        assert_eq!(state.write_offset, 3);
        assert_eq!(state.scan_cursor, 3);
    }

    #[test]
    fn test_one_packet_per_call() {
        let mut stream = build_packet(PacketKind::Log, b"one").to_vec();
        stream.extend_from_slice(&build_packet(PacketKind::Log, b"two"));
        stream.extend_from_slice(&[0x02, 0x07]);

        let reassembler = Reassembler::new();
        assert_eq!(reassembler.process_chunk(&stream).unwrap().log_text(), "one");

        let state = reassembler.buffer_state().unwrap();
        assert_eq!(state.scan_cursor, 0);
        assert_eq!(state.write_offset, 6 + 2);

        assert_eq!(reassembler.process_chunk(&[]).unwrap().log_text(), "two");
        assert!(reassembler.process_chunk(&[]).is_none());
        assert_eq!(reassembler.buffer_state().unwrap().write_offset, 2);
    }

    #[test]
    fn test_buffered_frame_before_new_chunk() {
        let mut stream = build_packet(PacketKind::Sound, &[1]).to_vec();
        stream.extend_from_slice(&build_packet(PacketKind::Sound, &[2]));

        let reassembler = Reassembler::new();
        assert_eq!(reassembler.process_chunk(&stream).unwrap().payload.as_ref(), &[1]);

        // The buffered frame comes out first; the new chunk waits behind it
        let third = build_packet(PacketKind::Sound, &[3]);
        assert_eq!(reassembler.process_chunk(&third).unwrap().payload.as_ref(), &[2]);
        assert_eq!(reassembler.process_chunk(&[]).unwrap().payload.as_ref(), &[3]);
    }

    #[test]
    fn test_unknown_kind_keeps_stream() {
        let mut stream = cobs::encode(&[0x05, 1, 2, 3]);
        stream.push(0x00);
        stream.extend_from_slice(&build_packet(PacketKind::Input, &[0x8D]));

        let reassembler = Reassembler::new();
        assert_eq!(
            reassembler.try_process_chunk(&stream),
            Err(FrameError::UnknownKind(5))
        );
        let packet = reassembler.process_chunk(&[]).unwrap();
        assert_eq!(packet.kind, PacketKind::Input);

        let stats = reassembler.stats();
        assert_eq!(stats.frames_extracted, 2);
        assert_eq!(stats.malformed_frames, 1);
        assert_eq!(stats.packets_emitted, 1);
    }

    #[test]
    fn test_literal_chunks_do_not_panic() {
        let reassembler = Reassembler::new();
        let packet = reassembler.process_chunk(&[0x01, 0x02, 0x03, 0x00]).unwrap();
        assert_eq!(packet.kind, PacketKind::Log);
        assert_eq!(packet.payload.as_ref(), &[0x03]);

        let packet = reassembler
            .process_chunk(&[0x04, 0x01, 0x02, 0x03, 0x00])
            .unwrap();
        assert_eq!(packet.kind, PacketKind::Video);
        assert_eq!(packet.payload.as_ref(), &[0x02, 0x03]);
    }

    #[test]
    fn test_empty_frame() {
        let reassembler = Reassembler::new();
        assert_eq!(reassembler.try_process_chunk(&[0x00]), Err(FrameError::EmptyFrame));
        assert_eq!(reassembler.stats().malformed_frames, 1);
    }

    #[test]
    fn test_truncated_run_is_malformed() {
        let reassembler = Reassembler::new();
        assert_eq!(
            reassembler.try_process_chunk(&[0x05, 0x11, 0x00]),
            Err(FrameError::Cobs(CobsError::TruncatedRun {
                expected: 5,
                actual: 2
            }))
        );
        assert!(reassembler.process_chunk(&build_packet(PacketKind::Log, b"x")).is_some());
    }

    #[test]
    fn test_crc32c_integrity() {
        let config = ReassemblerConfig::default().integrity(Integrity::Crc32c);
        let reassembler = Reassembler::with_config(config).unwrap();

        let frame = PacketBuilder::new(PacketKind::Video)
            .payload(Bytes::from_static(b"jpegdata"))
            .with_crc32c()
            .build();
        let packet = reassembler.process_chunk(&frame).unwrap();
        assert_eq!(packet.payload.as_ref(), b"jpegdata");

        let mut corrupted = frame.to_vec();
        corrupted[3] ^= 0x01;
        assert!(matches!(
            reassembler.try_process_chunk(&corrupted),
            Err(FrameError::ChecksumMismatch { .. })
        ));

        let short = build_packet(PacketKind::Video, &[1, 2]);
        assert_eq!(
            reassembler.try_process_chunk(&short),
            Err(FrameError::MissingChecksum(3))
        );
    }

    #[test]
    fn test_overflow_discard_and_resync() {
        let reassembler = small(16, OverflowPolicy::DiscardAndResync);

        assert_eq!(
            reassembler.try_process_chunk(&[0xAA; 20]),
            Err(FrameError::BufferOverflow {
                needed: 20,
                capacity: 16
            })
        );
        assert!(reassembler.buffer_state().unwrap().resyncing);

        // Still inside the oversized frame
        assert_eq!(reassembler.try_process_chunk(&[0xAA; 8]), Ok(None));

        let mut chunk = vec![0xAA, 0xAA, 0x00];
        chunk.extend_from_slice(&build_packet(PacketKind::Log, b"ok"));
        let packet = reassembler.process_chunk(&chunk).unwrap();
        assert_eq!(packet.log_text(), "ok");

        let stats = reassembler.stats();
        assert_eq!(stats.overflows, 1);
        assert_eq!(stats.bytes_discarded, 20 + 8 + 3);
        assert!(!reassembler.buffer_state().unwrap().resyncing);
    }

    #[test]
    fn test_overflow_across_chunks() {
        let reassembler = small(16, OverflowPolicy::DiscardAndResync);
        assert_eq!(reassembler.try_process_chunk(&[0xAA; 10]), Ok(None));

        let mut chunk = vec![0xAA; 10];
        chunk.push(0x00);
        chunk.extend_from_slice(&build_packet(PacketKind::Log, b"ok"));

        assert_eq!(
            reassembler.try_process_chunk(&chunk),
            Err(FrameError::BufferOverflow {
                needed: 20,
                capacity: 16
            })
        );
        assert_eq!(reassembler.process_chunk(&[]).unwrap().log_text(), "ok");
    }

    #[test]
    fn test_overflow_reset() {
        let reassembler = small(16, OverflowPolicy::Reset);
        assert!(matches!(
            reassembler.try_process_chunk(&[0xAA; 20]),
            Err(FrameError::BufferOverflow { .. })
        ));
        assert_eq!(reassembler.buffer_state(), Some(BufferState::default()));

        let packet = reassembler
            .process_chunk(&build_packet(PacketKind::Log, b"ok"))
            .unwrap();
        assert_eq!(packet.log_text(), "ok");
    }

    fn log_frames(count: usize) -> Vec<u8> {
        let mut stream = Vec::new();
        for i in 0..count {
            let text = format!("f{}x", i);
            stream.extend_from_slice(&build_packet(PacketKind::Log, text.as_bytes()));
        }
        stream
    }

    fn drain(reassembler: &Reassembler) -> (Vec<Packet>, Vec<FrameError>) {
        let mut packets = Vec::new();
        let mut errors = Vec::new();
        loop {
            match reassembler.try_process_chunk(&[]) {
                Ok(Some(packet)) => packets.push(packet),
                Ok(None) => break,
                Err(err) => errors.push(err),
            }
        }
        (packets, errors)
    }

    #[test]
    fn test_chunk_of_frames_larger_than_capacity() {
        for policy in [OverflowPolicy::DiscardAndResync, OverflowPolicy::Reset] {
            let reassembler = small(16, policy);
            let stream = log_frames(5);
            assert_eq!(stream.len(), 30);

            let first = reassembler.process_chunk(&stream).unwrap();
            assert_eq!(first.log_text(), "f0x");
            assert_eq!(reassembler.buffer_state().unwrap().queued, 4);

            let (rest, errors) = drain(&reassembler);
            let texts: Vec<_> = rest.iter().map(|p| p.log_text().into_owned()).collect();
            assert_eq!(texts, ["f1x", "f2x", "f3x", "f4x"], "{:?}", policy);
            assert!(errors.is_empty());

            let stats = reassembler.stats();
            assert_eq!(stats.packets_emitted, 5);
            assert_eq!(stats.overflows, 0);
            assert_eq!(stats.bytes_discarded, 0);
        }
    }

    #[test]
    fn test_buffered_frames_survive_overflowing_chunk() {
        let reassembler = small(16, OverflowPolicy::DiscardAndResync);
        let stream = log_frames(2);
        assert!(reassembler.process_chunk(&stream[..3]).is_none());

        // Completes both frames, then starts one that cannot fit
        let mut chunk = stream[3..].to_vec();
        chunk.extend_from_slice(&[0xAA; 20]);
        assert_eq!(reassembler.process_chunk(&chunk).unwrap().log_text(), "f0x");

        let (rest, errors) = drain(&reassembler);
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].log_text(), "f1x");
        assert_eq!(
            errors,
            [FrameError::BufferOverflow {
                needed: 20,
                capacity: 16
            }]
        );
        assert!(reassembler.buffer_state().unwrap().resyncing);

        let mut chunk = vec![0xAA, 0x00];
        chunk.extend_from_slice(&build_packet(PacketKind::Log, b"after"));
        assert_eq!(reassembler.process_chunk(&chunk).unwrap().log_text(), "after");
    }

    #[test]
    fn test_overflow_behind_packet_is_reported_next() {
        let reassembler = small(16, OverflowPolicy::Reset);
        let mut chunk = log_frames(1);
        chunk.extend_from_slice(&[0xAA; 20]);

        assert_eq!(reassembler.process_chunk(&chunk).unwrap().log_text(), "f0x");
        assert_eq!(
            reassembler.try_process_chunk(&[]),
            Err(FrameError::BufferOverflow {
                needed: 20,
                capacity: 16
            })
        );
        assert_eq!(reassembler.buffer_state(), Some(BufferState::default()));
        assert_eq!(reassembler.stats().overflows, 1);
    }

    #[test]
    fn test_oversized_frame_between_valid_frames() {
        let reassembler = small(16, OverflowPolicy::DiscardAndResync);
        let mut stream = build_packet(PacketKind::Log, b"a").to_vec();
        stream.extend_from_slice(&[0x11; 25]);
        stream.push(0x00);
        stream.extend_from_slice(&build_packet(PacketKind::Log, b"b"));

        assert_eq!(reassembler.process_chunk(&stream).unwrap().log_text(), "a");
        assert_eq!(
            reassembler.try_process_chunk(&[]),
            Err(FrameError::BufferOverflow {
                needed: 25,
                capacity: 16
            })
        );
        assert_eq!(reassembler.process_chunk(&[]).unwrap().log_text(), "b");
        assert!(reassembler.process_chunk(&[]).is_none());
        assert_eq!(reassembler.stats().bytes_discarded, 26);
    }

    #[test]
    fn test_capacity_is_validated() {
        assert!(Reassembler::with_config(ReassemblerConfig::default().capacity(4)).is_err());
    }

    struct Reentrant<'a> {
        reassembler: &'a Reassembler,
        inner: Option<Result<Option<Packet>, FrameError>>,
        state_seen: Option<BufferState>,
    }

    impl PacketHandler for Reentrant<'_> {
        fn on_video(&mut self, _frame: Bytes) {
            self.state_seen = self.reassembler.buffer_state();
            self.inner = Some(
                self.reassembler
                    .try_process_chunk(&build_packet(PacketKind::Log, b"late")),
            );
        }
    }

    #[test]
    fn test_reentrant_call_is_dropped() {
        let reassembler = Reassembler::new();
        let mut stream = build_packet(PacketKind::Video, &[9, 9]).to_vec();
        stream.extend_from_slice(&[0x03, 0x01]);

        let mut handler = Reentrant {
            reassembler: &reassembler,
            inner: None,
            state_seen: None,
        };
        assert!(reassembler.process_chunk_with(&stream, &mut handler));

        assert_eq!(handler.inner, Some(Err(FrameError::Busy)));
        assert_eq!(handler.state_seen, None);

        let state = reassembler.buffer_state().unwrap();
        assert_eq!(state.write_offset, 2);
        assert_eq!(state.scan_cursor, 0);

        let stats = reassembler.stats();
        assert_eq!(stats.dropped_chunks, 1);
        assert_eq!(stats.chunks_received, 1);
        assert!(!reassembler.is_busy());
    }

    #[test]
    fn test_reset() {
        let reassembler = Reassembler::new();
        reassembler.process_chunk(&[0x05, 0x01]);
        reassembler.reset().unwrap();
        assert_eq!(reassembler.buffer_state(), Some(BufferState::default()));
    }
}
