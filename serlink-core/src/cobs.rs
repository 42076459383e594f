//! Consistent Overhead Byte Stuffing
//!
//! COBS rewrites a byte sequence so that it contains no `0x00`, which lets a
//! single zero byte mark the end of every frame on the wire. The encoded form
//! is a chain of runs: each run starts with a link byte giving the distance to
//! the next link, followed by the non-zero bytes of the run. Every link except
//! one equal to [`FULL_RUN_LINK`] stands for a zero that was removed.
//!
//! The functions here never append the frame delimiter themselves; see
//! [`crate::builder`] for complete wire frames.

use crate::constants::{FRAME_DELIMITER, FULL_RUN_LINK};
use crate::error::CobsError;
use alloc::vec;
use alloc::vec::Vec;
use bytes::BytesMut;

/// Largest possible encoded size for `len` input bytes
///
/// One leading link byte plus one extra link for every 254 input bytes.
pub const fn max_encoded_len(len: usize) -> usize {
    1 + (len * 255 + 253) / 254
}

/// Encode `data` into `dst`, returning the number of bytes written
///
/// # Panics
///
/// Panics if `dst` is shorter than [`max_encoded_len`]`(data.len())`.
pub fn encode_to_slice(data: &[u8], dst: &mut [u8]) -> usize {
    let mut out = 1;
    let mut link = 0;
    // Value the current link would take if the run closed here
    let mut run: u8 = 1;
    let mut pos = 0;

    while pos < data.len() {
        if run == FULL_RUN_LINK {
            // 254 literal bytes written: close without consuming input
            dst[link] = run;
            link = out;
            run = 1;
            out += 1;
        } else if data[pos] == 0 {
            dst[link] = run;
            link = out;
            run = 1;
            out += 1;
            pos += 1;
        } else {
            dst[out] = data[pos];
            out += 1;
            run += 1;
            pos += 1;
        }
    }

    dst[link] = run;
    out
}

/// Encode `data`, returning a buffer with no zero bytes
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut buf = vec![0u8; max_encoded_len(data.len())];
    let written = encode_to_slice(data, &mut buf);
    buf.truncate(written);
    buf
}

/// Encode `data` and append the result to `buf`
pub fn encode_into(data: &[u8], buf: &mut BytesMut) {
    let start = buf.len();
    buf.resize(start + max_encoded_len(data.len()), 0);
    let written = encode_to_slice(data, &mut buf[start..]);
    buf.truncate(start + written);
}

/// Decode one COBS-encoded frame
///
/// `data` may or may not include the trailing delimiter: decoding stops as
/// soon as a run boundary lands on a `0x00`, or when the input runs out.
/// A zero anywhere other than a run boundary, or a final run that points past
/// the end of the input, is reported as an error instead of being copied
/// through.
pub fn decode(data: &[u8]) -> Result<Vec<u8>, CobsError> {
    let mut out = Vec::with_capacity(data.len());

    let Some(&first) = data.first() else {
        return Ok(out);
    };
    if first == FRAME_DELIMITER {
        return Ok(out);
    }

    let mut link = first;
    let mut boundary = first as usize;

    for (offset, &byte) in data.iter().enumerate().skip(1) {
        if offset == boundary {
            if byte == FRAME_DELIMITER {
                return Ok(out);
            }
            if link != FULL_RUN_LINK {
                out.push(0);
            }
            link = byte;
            boundary = offset + byte as usize;
        } else if byte == FRAME_DELIMITER {
            return Err(CobsError::UnexpectedZero { offset });
        } else {
            out.push(byte);
        }
    }

    if boundary > data.len() {
        return Err(CobsError::TruncatedRun {
            expected: boundary,
            actual: data.len(),
        });
    }

    Ok(out)
}
