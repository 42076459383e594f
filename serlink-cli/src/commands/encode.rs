use anyhow::{Context, Result};
use bytes::Bytes;
use serlink_core::{PacketBuilder, PacketKind};
use std::fs::{self, OpenOptions};
use std::io::{self, Read, Write};
use tracing::info;

/// Wrap the contents of `input` in one frame of `kind`
///
/// `input` may be `-` for stdin. The frame is written to `output`
/// (appended when `append` is set) and printed as hex when `print_hex`
/// is set. Returns the encoded frame.
pub fn execute(
    input: &str,
    output: Option<&str>,
    kind: PacketKind,
    crc32c: bool,
    append: bool,
    print_hex: bool,
) -> Result<Bytes> {
    info!("Encoding {} as a {} packet", input, kind);

    let payload = if input == "-" {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf)?;
        buf
    } else {
        fs::read(input).with_context(|| format!("Failed to read input file: {}", input))?
    };

    let mut builder = PacketBuilder::new(kind).payload(Bytes::from(payload));
    if crc32c {
        builder = builder.with_crc32c();
    }
    let frame = builder.build();

    if let Some(output_path) = output {
        write_frame(output_path, &frame, append)?;
        info!("Wrote {} byte frame to {}", frame.len(), output_path);
    }

    if print_hex || output.is_none() {
        println!("{}", hex::encode(&frame));
    }

    Ok(frame)
}

pub(crate) fn write_frame(path: &str, frame: &[u8], append: bool) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)
        .with_context(|| format!("Failed to open output file: {}", path))?;
    file.write_all(frame)
        .with_context(|| format!("Failed to write output file: {}", path))?;
    Ok(())
}
