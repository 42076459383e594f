//! Outbound frame construction
//!
//! The link is symmetric: frames built here use exactly the wire format that
//! [`crate::reassembler::Reassembler`] consumes.
//!
//! Layout of one frame:
//! 1. COBS encoding of
//!    - Kind discriminant (1 byte)
//!    - Payload (variable length)
//!    - CRC32C of discriminant + payload (4 bytes, big-endian, optional)
//! 2. Delimiter `0x00`

use crate::cobs::{encode_into, max_encoded_len};
use crate::constants::{Integrity, FRAME_DELIMITER, KEY_CODE_MASK, KEY_PRESSED_BIT};
use crate::error::FrameError;
use crate::types::PacketKind;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use bytes::{BufMut, Bytes, BytesMut};

/// Build a complete wire frame for `kind` carrying `payload`
pub fn build_packet(kind: PacketKind, payload: &[u8]) -> Bytes {
    encode_frame(kind, payload, Integrity::None)
}

fn encode_frame(kind: PacketKind, payload: &[u8], integrity: Integrity) -> Bytes {
    let body_len = 1 + payload.len() + integrity.trailer_size();

    let mut body = Vec::with_capacity(body_len);
    body.push(kind.as_u8());
    body.extend_from_slice(payload);
    if integrity == Integrity::Crc32c {
        let checksum = crc32c::crc32c(&body);
        body.extend_from_slice(&checksum.to_be_bytes());
    }

    let mut buf = BytesMut::with_capacity(max_encoded_len(body_len) + 1);
    encode_into(&body, &mut buf);
    buf.put_u8(FRAME_DELIMITER);
    buf.freeze()
}

/// Builder for outbound frames with optional integrity trailer
#[derive(Debug, Clone)]
pub struct PacketBuilder {
    kind: PacketKind,
    payload: Bytes,
    integrity: Integrity,
}

impl PacketBuilder {
    /// Create a new builder for a packet of `kind`
    pub fn new(kind: PacketKind) -> Self {
        Self {
            kind,
            payload: Bytes::new(),
            integrity: Integrity::None,
        }
    }

    /// Set the payload
    pub fn payload(mut self, payload: Bytes) -> Self {
        self.payload = payload;
        self
    }

    /// Append a CRC32C trailer
    pub fn with_crc32c(mut self) -> Self {
        self.integrity = Integrity::Crc32c;
        self
    }

    /// Set the integrity mode explicitly
    pub fn integrity(mut self, integrity: Integrity) -> Self {
        self.integrity = integrity;
        self
    }

    /// Build and encode the frame, delimiter included
    pub fn build(self) -> Bytes {
        encode_frame(self.kind, &self.payload, self.integrity)
    }
}

/// Pressed/released state of keyboard keys, keyed by key code
///
/// Upper-case ASCII letter codes are folded onto their lower-case codes, so
/// `A` and `a` name the same key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyState {
    keys: BTreeMap<u16, bool>,
}

impl KeyState {
    /// Empty key state
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a key going down (`pressed = true`) or up
    pub fn set(&mut self, code: u16, pressed: bool) {
        self.keys.insert(fold_key_code(code), pressed);
    }

    /// Current state of a key, if it was ever reported
    pub fn get(&self, code: u16) -> Option<bool> {
        self.keys.get(&fold_key_code(code)).copied()
    }

    /// Number of keys tracked
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no key was reported yet
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys in ascending code order
    pub fn iter(&self) -> impl Iterator<Item = (u16, bool)> + '_ {
        self.keys.iter().map(|(&code, &pressed)| (code, pressed))
    }
}

fn fold_key_code(code: u16) -> u16 {
    if (u16::from(b'A')..=u16::from(b'Z')).contains(&code) {
        code + 32
    } else {
        code
    }
}

/// Encode key state as one byte per key, high bit set while pressed
pub fn encode_key_state(state: &KeyState) -> Result<Bytes, FrameError> {
    let mut buf = BytesMut::with_capacity(state.len());
    for (code, pressed) in state.iter() {
        if code > u16::from(KEY_CODE_MASK) {
            return Err(FrameError::KeyCodeOutOfRange(code));
        }
        let mut byte = code as u8;
        if pressed {
            byte |= KEY_PRESSED_BIT;
        }
        buf.put_u8(byte);
    }
    Ok(buf.freeze())
}

/// Decode an input payload produced by [`encode_key_state`]
pub fn decode_key_state(payload: &[u8]) -> KeyState {
    let mut state = KeyState::new();
    for &byte in payload {
        state.set(
            u16::from(byte & KEY_CODE_MASK),
            byte & KEY_PRESSED_BIT != 0,
        );
    }
    state
}

/// Build an `Input` frame carrying `state`
pub fn build_key_packet(state: &KeyState) -> Result<Bytes, FrameError> {
    let payload = encode_key_state(state)?;
    Ok(build_packet(PacketKind::Input, &payload))
}
