//! # Serlink Core
//!
//! Zero-delimited COBS framing for telemetry streamed over a serial byte link.
//!
//! ## Modules
//!
//! - `constants`: Wire format constants, integrity and overflow options
//! - `types`: Core types (PacketKind, Packet)
//! - `cobs`: Consistent Overhead Byte Stuffing codec
//! - `reassembler`: Incremental frame extraction from arbitrary chunks
//! - `builder`: Outbound frame and key-state encoding
//! - `dispatch`: Routing packets to per-kind handlers
//! - `stream`: `std::io` reader/writer adapters (requires `std`)

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

pub mod builder;
pub mod cobs;
pub mod constants;
pub mod dispatch;
pub mod error;
pub mod reassembler;
#[cfg(feature = "std")]
pub mod stream;
pub mod types;

// Re-export commonly used types
pub use builder::{build_packet, KeyState, PacketBuilder};
pub use dispatch::{dispatch, PacketHandler};
pub use error::{CobsError, FrameError};
pub use reassembler::{Reassembler, ReassemblerConfig, ReassemblyStats};
pub use types::{Packet, PacketKind};

/// Result type alias for serlink operations
pub type Result<T> = core::result::Result<T, FrameError>;
