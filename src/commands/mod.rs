//! Command handlers for the CLI application.
//!
//! - `utility`: device listing (list)
//! - `capture`: raw report recording (capture)
//! - `analyze`: offline matrix inference (analyze, generate)
//! - `monitor`: live decoding (monitor)
//! - `diff`: single-key calibration (diff)
//! - `adjust`: mapping file edits (adjust)

pub mod adjust;
pub mod analyze;
pub mod capture;
pub mod diff;
pub mod generate;
pub mod monitor;
pub mod utility;

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use kb16_matrix::MatrixShape;
use kb16_tools::Config;
use kb16_transport::{
    DeviceFilter, HidDeviceInfo, HidDiscovery, ReaderExit, ReportReader, TimestampedReport,
};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::cli::{DeviceArgs, GridArgs};

/// Result type for command handlers
pub type CommandResult = anyhow::Result<()>;

/// Grid from flags, falling back to the config
pub fn resolve_shape(config: &Config, grid: GridArgs) -> anyhow::Result<MatrixShape> {
    let rows = grid.rows.unwrap_or(config.matrix.rows);
    let cols = grid.cols.unwrap_or(config.matrix.cols);
    Ok(MatrixShape::new(rows, cols)?)
}

/// Device filter from flags, falling back to the config
pub fn resolve_filter(config: &Config, device: &DeviceArgs) -> DeviceFilter {
    let mut filter = config.device_filter();
    if let Some(vid) = device.vid {
        filter.vendor_id = Some(vid);
    }
    if let Some(pid) = device.pid {
        filter.product_id = Some(pid);
    }
    if device.interface.is_some() {
        filter.interface = device.interface;
    }
    filter
}

/// Open the keypad and start its reader thread
pub fn open_reader(
    config: &Config,
    device: &DeviceArgs,
) -> anyhow::Result<(
    ReportReader,
    mpsc::Receiver<TimestampedReport>,
    HidDeviceInfo,
)> {
    let discovery = HidDiscovery::new().context("Failed to initialise HID")?;
    let filter = resolve_filter(config, device);
    let (hid, info) = discovery
        .open(&filter)
        .context("No KB16 found (try `kb16 list`)")?;
    let (reader, rx) = ReportReader::spawn(hid, config.reader_config())?;
    Ok((reader, rx, info))
}

/// Why a report stream ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    Interrupted,
    Deadline,
    DeviceClosed,
}

/// Feed reports to `on_report` until Ctrl+C, the deadline or the device
/// going away
pub async fn stream_reports<F>(
    rx: &mut mpsc::Receiver<TimestampedReport>,
    duration: Option<f64>,
    mut on_report: F,
) -> anyhow::Result<StreamEnd>
where
    F: FnMut(&TimestampedReport) -> anyhow::Result<()>,
{
    let deadline = match duration {
        Some(secs) if secs.is_finite() && secs > 0.0 => Some(Duration::from_secs_f64(secs)),
        Some(secs) => bail!("Invalid duration: {secs}"),
        None => None,
    };

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let timeout = async {
        match deadline {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(timeout);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => return Ok(StreamEnd::Interrupted),
            _ = &mut timeout => return Ok(StreamEnd::Deadline),
            report = rx.recv() => match report {
                Some(report) => on_report(&report)?,
                None => return Ok(StreamEnd::DeviceClosed),
            },
        }
    }
}

/// Close the channel and wait for the reader thread
pub fn shutdown_reader(reader: ReportReader, rx: mpsc::Receiver<TimestampedReport>) {
    drop(rx);
    match reader.stop() {
        Ok(ReaderExit::DeviceError) => warn!("Device stopped responding"),
        Ok(exit) => debug!(?exit, "Reader stopped"),
        Err(e) => warn!("Reader shutdown failed: {}", e),
    }
}

/// File name for headers and logs
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
