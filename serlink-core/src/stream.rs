//! Blocking adapters between `std::io` byte streams and packets
//!
//! [`PacketReader`] pulls chunks from any [`Read`] (a serial device node, a
//! capture file, a pipe) through a [`Reassembler`]. [`PacketWriter`] puts
//! built frames on any [`Write`]. The two are independent so a link can be
//! read and written from separate threads.

use crate::builder::{encode_key_state, KeyState, PacketBuilder};
use crate::constants::Integrity;
use crate::error::FrameError;
use crate::reassembler::{Reassembler, ReassemblerConfig};
use crate::types::{Packet, PacketKind};
use bytes::Bytes;
use std::io::{ErrorKind, Read, Write};

#[cfg(feature = "logging")]
use tracing::debug;

/// Bytes requested from the reader per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Reads packets from a byte stream
pub struct PacketReader<R> {
    reader: R,
    reassembler: Reassembler,
    chunk: Vec<u8>,
    // The previous call produced a frame, so more may already be buffered
    drain: bool,
    done: bool,
}

impl<R: Read> PacketReader<R> {
    /// Create a reader with the default configuration and chunk size
    pub fn new(reader: R) -> Self {
        Self::from_parts(reader, Reassembler::new(), DEFAULT_CHUNK_SIZE)
    }

    /// Create a reader with a custom configuration and chunk size
    pub fn with_config(
        reader: R,
        config: ReassemblerConfig,
        chunk_size: usize,
    ) -> Result<Self, FrameError> {
        if chunk_size == 0 {
            return Err(FrameError::InvalidConfig("chunk size must be non-zero"));
        }
        let reassembler = Reassembler::with_config(config)?;
        Ok(Self::from_parts(reader, reassembler, chunk_size))
    }

    fn from_parts(reader: R, reassembler: Reassembler, chunk_size: usize) -> Self {
        Self {
            reader,
            reassembler,
            chunk: vec![0u8; chunk_size],
            drain: false,
            done: false,
        }
    }

    /// The reassembler driven by this reader
    pub fn reassembler(&self) -> &Reassembler {
        &self.reassembler
    }

    /// Consume the reader, returning the underlying stream
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Read until the next packet completes
    ///
    /// Returns `Ok(None)` at end of stream. Frame-local errors and buffer
    /// overflows are returned as they happen; reading may continue after
    /// them.
    pub fn read_packet(&mut self) -> Result<Option<Packet>, FrameError> {
        loop {
            let len = if self.drain {
                self.drain = false;
                0
            } else {
                match self.reader.read(&mut self.chunk) {
                    Ok(0) => {
                        #[cfg(feature = "logging")]
                        debug!("End of stream");
                        self.done = true;
                        return Ok(None);
                    }
                    Ok(n) => n,
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => {
                        self.done = true;
                        return Err(e.into());
                    }
                }
            };

            match self.reassembler.try_process_chunk(&self.chunk[..len]) {
                Ok(Some(packet)) => {
                    self.drain = true;
                    return Ok(Some(packet));
                }
                Ok(None) => {}
                Err(err) => {
                    self.drain = true;
                    return Err(err);
                }
            }
        }
    }
}

impl<R: Read> Iterator for PacketReader<R> {
    type Item = Result<Packet, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        self.read_packet().transpose()
    }
}

/// Writes packets to a byte stream
pub struct PacketWriter<W> {
    writer: W,
    integrity: Integrity,
    frames_written: u64,
    bytes_written: u64,
}

impl<W: Write> PacketWriter<W> {
    /// Create a writer producing bare frames
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            integrity: Integrity::None,
            frames_written: 0,
            bytes_written: 0,
        }
    }

    /// Set the integrity trailer for written packets
    pub fn with_integrity(mut self, integrity: Integrity) -> Self {
        self.integrity = integrity;
        self
    }

    /// Write an already-encoded frame
    pub fn write_frame(&mut self, frame: &[u8]) -> Result<(), FrameError> {
        self.writer.write_all(frame)?;
        self.frames_written += 1;
        self.bytes_written += frame.len() as u64;
        Ok(())
    }

    /// Build and write one packet, returning the encoded size
    pub fn write_packet(&mut self, kind: PacketKind, payload: Bytes) -> Result<usize, FrameError> {
        let frame = PacketBuilder::new(kind)
            .payload(payload)
            .integrity(self.integrity)
            .build();
        self.write_frame(&frame)?;
        Ok(frame.len())
    }

    /// Write key state as an `Input` packet
    pub fn write_key_state(&mut self, state: &KeyState) -> Result<usize, FrameError> {
        let payload = encode_key_state(state)?;
        self.write_packet(PacketKind::Input, payload)
    }

    /// Flush the underlying stream
    pub fn flush(&mut self) -> Result<(), FrameError> {
        self.writer.flush()?;
        Ok(())
    }

    /// Frames written so far
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Encoded bytes written so far
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Consume the writer, returning the underlying stream
    pub fn into_inner(self) -> W {
        self.writer
    }
}
