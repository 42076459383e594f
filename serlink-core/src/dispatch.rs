//! Routing of packets to their consumers

use crate::types::{Packet, PacketKind};
use bytes::Bytes;

/// Consumer of reassembled packets, one method per packet kind
///
/// Every method defaults to ignoring the packet, so implementors only
/// override the kinds they care about.
pub trait PacketHandler {
    /// Log text from the device
    fn on_log(&mut self, _text: &str) {}

    /// One compressed video frame, forwarded unopened
    fn on_video(&mut self, _frame: Bytes) {}

    /// Sound payload
    fn on_sound(&mut self, _data: Bytes) {}

    /// Network payload
    fn on_network(&mut self, _data: Bytes) {}

    /// Input payload
    fn on_input(&mut self, _data: Bytes) {}
}

/// Hand `packet` to the matching method of `handler`
pub fn dispatch<H: PacketHandler + ?Sized>(packet: Packet, handler: &mut H) {
    match packet.kind {
        PacketKind::Log => handler.on_log(&packet.log_text()),
        PacketKind::Video => handler.on_video(packet.payload),
        PacketKind::Sound => handler.on_sound(packet.payload),
        PacketKind::Network => handler.on_network(packet.payload),
        PacketKind::Input => handler.on_input(packet.payload),
    }
}

/// Handler that only counts what it sees, per kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountingHandler {
    /// Packets seen, indexed by discriminant
    pub packets: [u64; 5],
    /// Payload bytes seen, indexed by discriminant
    pub bytes: [u64; 5],
}

impl CountingHandler {
    /// Packets seen of one kind
    pub fn count(&self, kind: PacketKind) -> u64 {
        self.packets[kind.as_u8() as usize]
    }

    fn record(&mut self, kind: PacketKind, len: usize) {
        self.packets[kind.as_u8() as usize] += 1;
        self.bytes[kind.as_u8() as usize] += len as u64;
    }
}

impl PacketHandler for CountingHandler {
    fn on_log(&mut self, text: &str) {
        self.record(PacketKind::Log, text.len());
    }

    fn on_video(&mut self, frame: Bytes) {
        self.record(PacketKind::Video, frame.len());
    }

    fn on_sound(&mut self, data: Bytes) {
        self.record(PacketKind::Sound, data.len());
    }

    fn on_network(&mut self, data: Bytes) {
        self.record(PacketKind::Network, data.len());
    }

    fn on_input(&mut self, data: Bytes) {
        self.record(PacketKind::Input, data.len());
    }
}
