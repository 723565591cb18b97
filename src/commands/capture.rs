//! Report capture command.

use std::path::Path;

use kb16_matrix::hex_string;
use kb16_tools::capture::{CaptureDevice, CaptureRecorder};
use kb16_tools::Config;
use tracing::info;

use super::{open_reader, shutdown_reader, stream_reports, CommandResult, StreamEnd};
use crate::cli::DeviceArgs;

/// Record reports until Ctrl+C or the deadline, then save them
pub async fn run(
    config: &Config,
    device: &DeviceArgs,
    duration: Option<f64>,
    output: &Path,
    quiet: bool,
) -> CommandResult {
    let (reader, mut rx, info) = open_reader(config, device)?;
    println!("Capturing from {}", info.label());
    match duration {
        Some(secs) => println!("Recording for {secs}s. Press keys and turn knobs."),
        None => println!("Recording. Press keys and turn knobs, Ctrl+C to stop."),
    }

    let mut recorder = CaptureRecorder::new(Some(CaptureDevice::from(&info)));
    let end = stream_reports(&mut rx, duration, |report| {
        if !quiet {
            println!("{:10.3}  {}", report.elapsed, hex_string(&report.report));
        }
        recorder.record(report);
        Ok(())
    })
    .await;
    shutdown_reader(reader, rx);
    let end = end?;

    if end == StreamEnd::DeviceClosed {
        eprintln!("Device closed the stream; saving what was captured.");
    }

    let capture = recorder.finish();
    info!(reports = capture.len(), ?end, "Capture finished");
    capture.save(output)?;
    println!("\nSaved {} reports to {}", capture.len(), output.display());
    if capture.is_empty() {
        eprintln!("Warning: no reports were received.");
    }
    Ok(())
}
