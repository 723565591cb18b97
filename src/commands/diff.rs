//! Single-key calibration: compare an idle report with a pressed one.

use anyhow::anyhow;
use kb16_matrix::{changed_bits, BitChange};
use kb16_tools::capture::parse_hex_bytes;

use super::CommandResult;

/// Bits that differ between two hex reports
pub fn diff_reports(base: &str, pressed: &str) -> anyhow::Result<Vec<BitChange>> {
    let base = parse_hex_bytes(base).map_err(|e| anyhow!("Base report: {e}"))?;
    let pressed = parse_hex_bytes(pressed).map_err(|e| anyhow!("Pressed report: {e}"))?;
    if base.len() != pressed.len() {
        eprintln!(
            "Note: reports differ in length ({} vs {}); comparing the first {} bytes",
            base.len(),
            pressed.len(),
            base.len().min(pressed.len())
        );
    }
    Ok(changed_bits(&base, &pressed).collect())
}

pub fn run(base: &str, pressed: &str) -> CommandResult {
    let changes = diff_reports(base, pressed)?;
    if changes.is_empty() {
        println!("No bits changed.");
        return Ok(());
    }

    println!("{} bit(s) changed:", changes.len());
    for change in &changes {
        println!(
            "  {:<14} mask 0x{:02X}  {}",
            change.coord.to_string(),
            change.coord.mask(),
            if change.set { "0 -> 1" } else { "1 -> 0" }
        );
    }
    if let [single] = changes.as_slice() {
        println!(
            "\nadjust with: --byte {} --bit {}",
            single.coord.byte, single.coord.bit
        );
    }
    Ok(())
}
