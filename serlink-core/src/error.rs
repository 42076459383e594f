//! Error types for serlink operations

/// Structural errors detected while COBS-decoding a frame
#[cfg_attr(feature = "std", derive(thiserror::Error))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CobsError {
    /// A zero byte appeared inside a run instead of at a run boundary
    #[cfg_attr(feature = "std", error("Unexpected zero byte at offset {offset}"))]
    UnexpectedZero {
        /// Offset of the zero byte in the encoded input.
        offset: usize,
    },

    /// The last run claims more bytes than the input holds
    #[cfg_attr(
        feature = "std",
        error("Truncated run: link expects {expected} bytes, only {actual} present")
    )]
    TruncatedRun {
        /// Offset one past the end of the run, as announced by its link byte.
        expected: usize,
        /// Length of the encoded input.
        actual: usize,
    },
}

/// Errors that can occur while building or reassembling packets
#[cfg_attr(feature = "std", derive(thiserror::Error))]
#[derive(Debug, Clone, PartialEq)]
pub enum FrameError {
    /// Another call is already working on this reassembler; the chunk was dropped
    #[cfg_attr(feature = "std", error("Reassembler busy, chunk dropped"))]
    Busy,

    /// Decoded discriminant does not name a packet kind
    #[cfg_attr(feature = "std", error("Unknown packet kind: {0:#04x}"))]
    UnknownKind(u8),

    /// Frame decoded to zero bytes, so there is no discriminant
    #[cfg_attr(feature = "std", error("Empty frame"))]
    EmptyFrame,

    /// Frame bytes are not valid COBS
    #[cfg_attr(feature = "std", error("COBS decode failed: {0}"))]
    Cobs(CobsError),

    /// CRC32C trailer does not match the frame contents
    #[cfg_attr(feature = "std", error("Checksum mismatch: expected {expected:x}, got {actual:x}"))]
    ChecksumMismatch {
        /// The checksum carried in the trailer.
        expected: u32,
        /// The checksum computed over the frame.
        actual: u32,
    },

    /// Frame too short to carry the CRC32C trailer
    #[cfg_attr(feature = "std", error("Frame of {0} bytes too short for checksum trailer"))]
    MissingChecksum(usize),

    /// Undelimited bytes exceeded the reassembly buffer
    #[cfg_attr(
        feature = "std",
        error("Reassembly buffer overflow: {needed} bytes needed, capacity {capacity}")
    )]
    BufferOverflow {
        /// Bytes that would have had to be buffered.
        needed: usize,
        /// Capacity of the reassembly buffer.
        capacity: usize,
    },

    /// Key code does not fit in the 7 bits of a key event byte
    #[cfg_attr(feature = "std", error("Key code {0} out of range (max 127)"))]
    KeyCodeOutOfRange(u16),

    /// Configuration rejected by validation
    #[cfg_attr(feature = "std", error("Invalid configuration: {0}"))]
    InvalidConfig(&'static str),

    /// IO error during read/write
    #[cfg_attr(feature = "std", error("IO error: {0}"))]
    Io(alloc::string::String),
}

impl From<CobsError> for FrameError {
    fn from(err: CobsError) -> Self {
        FrameError::Cobs(err)
    }
}

#[cfg(feature = "std")]
impl From<std::io::Error> for FrameError {
    fn from(err: std::io::Error) -> Self {
        FrameError::Io(err.to_string())
    }
}

impl FrameError {
    /// Whether the error concerns one frame only, leaving the stream usable
    pub fn is_frame_local(&self) -> bool {
        matches!(
            self,
            FrameError::UnknownKind(_)
                | FrameError::EmptyFrame
                | FrameError::Cobs(_)
                | FrameError::ChecksumMismatch { .. }
                | FrameError::MissingChecksum(_)
        )
    }
}
