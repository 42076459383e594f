//! Core types for serlink packets

use crate::error::FrameError;
use alloc::borrow::Cow;
use alloc::string::String;
use bytes::Bytes;
use core::fmt;
use serde::{Deserialize, Serialize};

/// Kind of message carried by a packet
///
/// The discriminant is the first byte of every decoded frame, in both
/// directions of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum PacketKind {
    /// UTF-8 log text from the device
    Log = 0,
    /// One compressed (JPEG) video frame
    Video = 1,
    /// Audio samples
    Sound = 2,
    /// Network traffic tunnelled over the link
    Network = 3,
    /// Key state, see [`crate::builder::KeyState`]
    Input = 4,
}

impl PacketKind {
    /// All kinds in discriminant order
    pub const ALL: [PacketKind; 5] = [
        PacketKind::Log,
        PacketKind::Video,
        PacketKind::Sound,
        PacketKind::Network,
        PacketKind::Input,
    ];

    /// Wire discriminant
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Lower-case name, as used on the command line
    pub const fn name(self) -> &'static str {
        match self {
            PacketKind::Log => "log",
            PacketKind::Video => "video",
            PacketKind::Sound => "sound",
            PacketKind::Network => "network",
            PacketKind::Input => "input",
        }
    }
}

impl TryFrom<u8> for PacketKind {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PacketKind::Log),
            1 => Ok(PacketKind::Video),
            2 => Ok(PacketKind::Sound),
            3 => Ok(PacketKind::Network),
            4 => Ok(PacketKind::Input),
            other => Err(FrameError::UnknownKind(other)),
        }
    }
}

impl From<PacketKind> for u8 {
    fn from(kind: PacketKind) -> Self {
        kind.as_u8()
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl core::str::FromStr for PacketKind {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PacketKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or(FrameError::InvalidConfig("unknown packet kind name"))
    }
}

/// A decoded, typed message extracted from one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// What the payload contains
    pub kind: PacketKind,

    /// Opaque payload bytes (everything after the discriminant)
    pub payload: Bytes,
}

impl Packet {
    /// Create a new packet
    pub fn new(kind: PacketKind, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// Split a decoded message into discriminant and payload
    ///
    /// The payload is sliced out of `decoded` without copying.
    pub fn from_decoded(decoded: Bytes) -> Result<Self, FrameError> {
        let Some(&discriminant) = decoded.first() else {
            return Err(FrameError::EmptyFrame);
        };
        let kind = PacketKind::try_from(discriminant)?;
        Ok(Self {
            kind,
            payload: decoded.slice(1..),
        })
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Log payload as text, replacing invalid UTF-8 sequences
    pub fn log_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}
