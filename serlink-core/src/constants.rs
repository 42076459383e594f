//! Constants and limits for the serlink wire format

use serde::{Deserialize, Serialize};

/// Byte terminating every frame on the wire
pub const FRAME_DELIMITER: u8 = 0x00;

/// Largest number of non-zero bytes a single COBS run can carry
pub const MAX_RUN: usize = 254;

/// Link value marking a full run with no implicit zero after it
pub const FULL_RUN_LINK: u8 = 0xFF;

/// Default reassembly buffer capacity (1000 KB)
///
/// Average video frames are about 13.5 KB encoded, so this leaves room for
/// many frames of backlog before overflow handling kicks in.
pub const DEFAULT_REASSEMBLY_CAPACITY: usize = 1024 * 1000;

/// Smallest capacity accepted by [`crate::reassembler::ReassemblerConfig::validate`]
pub const MIN_REASSEMBLY_CAPACITY: usize = 16;

/// Size of the optional CRC32C trailer in bytes
pub const CRC32C_SIZE: usize = 4;

/// Flag bit set in a key event byte when the key is held down
pub const KEY_PRESSED_BIT: u8 = 0x80;

/// Mask selecting the key code from a key event byte
pub const KEY_CODE_MASK: u8 = 0x7F;

/// Integrity protection carried inside each frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Integrity {
    /// Bare `kind ++ payload`, as sent by the device firmware
    #[default]
    None,
    /// `kind ++ payload ++ crc32c(kind ++ payload)` (big-endian)
    Crc32c,
}

impl Integrity {
    /// Returns the size of the trailer in bytes
    pub const fn trailer_size(&self) -> usize {
        match self {
            Integrity::None => 0,
            Integrity::Crc32c => CRC32C_SIZE,
        }
    }
}

/// What the reassembler does when undelimited bytes outgrow its buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Drop the oversized frame and resume after the next delimiter
    #[default]
    DiscardAndResync,
    /// Drop the buffered bytes and restart framing at the next byte; the
    /// caller resets the link
    Reset,
}
