//! Build key-state input frames and read them back

use serlink_core::{
    builder::{build_key_packet, decode_key_state},
    KeyState, Reassembler,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Serlink Key State Example\n");

    let mut keys = KeyState::new();
    for (code, pressed) in [(u16::from(b'W'), true), (u16::from(b'A'), true), (32, false)] {
        keys.set(code, pressed);

        let frame = build_key_packet(&keys)?;
        println!("{} keys -> frame {}", keys.len(), hex::encode(&frame));
    }

    let reassembler = Reassembler::new();
    let frame = build_key_packet(&keys)?;
    if let Some(packet) = reassembler.process_chunk(&frame) {
        for (code, pressed) in decode_key_state(&packet.payload).iter() {
            println!("key {:3} {}", code, if pressed { "down" } else { "up" });
        }
    }

    Ok(())
}

