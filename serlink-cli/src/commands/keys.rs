use super::encode::write_frame;
use anyhow::{Context, Result};
use bytes::Bytes;
use serlink_core::builder::{build_key_packet, KeyState};
use tracing::info;

/// Build an `Input` packet from pressed and released key codes
///
/// Letters are folded to lower case. Codes above 127 are rejected.
pub fn execute(
    pressed: &[u16],
    released: &[u16],
    output: Option<&str>,
    append: bool,
    print_hex: bool,
) -> Result<Bytes> {
    let mut state = KeyState::new();
    for &code in released {
        state.set(code, false);
    }
    for &code in pressed {
        state.set(code, true);
    }

    info!(
        "Encoding key state: {} pressed, {} released",
        state.iter().filter(|(_, down)| *down).count(),
        state.iter().filter(|(_, down)| !*down).count()
    );

    let frame = build_key_packet(&state).context("Failed to encode key state")?;

    if let Some(output_path) = output {
        write_frame(output_path, &frame, append)?;
        info!("Wrote {} byte frame to {}", frame.len(), output_path);
    }

    if print_hex || output.is_none() {
        println!("{}", hex::encode(&frame));
    }

    Ok(frame)
}
