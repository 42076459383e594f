//! Fuzzing entry points for serlink-core
//!
//! To use with cargo-fuzz:
//! 1. Install cargo-fuzz: cargo install cargo-fuzz
//! 2. Run fuzzer: cargo fuzz run fuzz_reassemble

use serlink_core::{cobs, Reassembler, ReassemblerConfig};

pub fn fuzz_decode(data: &[u8]) {
    // Try to decode - should never panic
    let _ = cobs::decode(data);
}

pub fn fuzz_round_trip(data: &[u8]) {
    let encoded = cobs::encode(data);
    assert!(!encoded.contains(&0));
    assert_eq!(cobs::decode(&encoded).as_deref(), Ok(data));
}

/// Feed `data` to a small reassembler, using the first byte to pick chunk sizes
pub fn fuzz_reassemble(data: &[u8]) {
    let Some((&seed, rest)) = data.split_first() else {
        return;
    };
    let config = ReassemblerConfig::default().capacity(256);
    let Ok(reassembler) = Reassembler::with_config(config) else {
        return;
    };

    let step = usize::from(seed % 64) + 1;
    for chunk in rest.chunks(step) {
        let _ = reassembler.try_process_chunk(chunk);
    }
    // Frame errors do not end the drain; buffered frames behind them still run
    loop {
        match reassembler.try_process_chunk(&[]) {
            Ok(None) => break,
            Ok(Some(_)) | Err(_) => {}
        }
    }
}
