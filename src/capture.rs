//! Capture files
//!
//! Two on-disk shapes are accepted:
//!
//! - JSON: `{ "reports": [ { "data": [..], "timestamp": .., .. } ], .. }`.
//!   Only `data` is required per report; unknown fields are ignored so files
//!   written by older tooling still load.
//! - CSV: a header row, then one report per row with the space-separated hex
//!   bytes in the third column.

use std::path::Path;

use chrono::{DateTime, Local};
use kb16_matrix::{hex_string, ReportArena};
use kb16_transport::{HidDeviceInfo, TimestampedReport};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::FormatError;

const CSV_HEADER: &str = "Timestamp,Delta (s),Raw Data (Hex)";

/// Device a capture was recorded from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureDevice {
    pub vendor_id: u16,
    pub product_id: u16,
    #[serde(default)]
    pub interface: Option<i32>,
    #[serde(default)]
    pub product_name: Option<String>,
}

impl From<&HidDeviceInfo> for CaptureDevice {
    fn from(info: &HidDeviceInfo) -> Self {
        Self {
            vendor_id: info.vid,
            product_id: info.pid,
            interface: Some(info.interface_number),
            product_name: info.product_name.clone(),
        }
    }
}

/// One captured report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedReport {
    pub data: Vec<u8>,
    /// RFC 3339 arrival time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Seconds since the previous report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hex: Option<String>,
}

impl CapturedReport {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            timestamp: None,
            delta_seconds: None,
            hex: None,
        }
    }
}

/// A capture session as stored on disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<CaptureDevice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_count: Option<usize>,
    pub reports: Vec<CapturedReport>,
}

impl CaptureFile {
    /// Parse the JSON capture format
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Parse the CSV capture format
    pub fn from_csv_str(text: &str) -> Result<Self, FormatError> {
        let mut reports = Vec::new();

        // Line 1 is the header
        for (index, row) in text.lines().enumerate().skip(1) {
            let line = index + 1;
            if row.trim().is_empty() {
                continue;
            }
            let fields = split_csv_row(row);
            let Some(hex) = fields.get(2) else {
                continue;
            };
            let data = parse_hex_bytes(hex).map_err(|message| FormatError::Csv { line, message })?;

            let mut report = CapturedReport::new(data);
            report.timestamp = fields
                .first()
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string());
            report.delta_seconds = fields.get(1).and_then(|s| s.parse().ok());
            reports.push(report);
        }

        Ok(Self {
            report_count: Some(reports.len()),
            reports,
            ..Default::default()
        })
    }

    /// Render the CSV capture format
    pub fn to_csv_string(&self) -> String {
        let mut out = String::from(CSV_HEADER);
        out.push('\n');
        for report in &self.reports {
            let delta = report
                .delta_seconds
                .map(|d| format!("{d:.6}"))
                .unwrap_or_default();
            out.push_str(&format!(
                "{},{},{}\n",
                report.timestamp.as_deref().unwrap_or(""),
                delta,
                hex_string(&report.data)
            ));
        }
        out
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Copy the report bytes into an arena, rejecting oversized reports
    pub fn to_arena(&self) -> Result<ReportArena, FormatError> {
        let report_len = self.reports.first().map_or(0, |r| r.data.len());
        let mut arena = ReportArena::with_capacity(self.reports.len(), report_len);
        for (index, report) in self.reports.iter().enumerate() {
            arena
                .push(&report.data)
                .map_err(|source| FormatError::InvalidReport { index, source })?;
        }
        Ok(arena)
    }

    /// Load a capture, choosing the format by file extension
    pub fn load(path: &Path) -> Result<Self, FormatError> {
        let text = std::fs::read_to_string(path).map_err(|e| FormatError::io(path, e))?;
        let capture = if is_csv(path) {
            Self::from_csv_str(&text)?
        } else {
            Self::from_json_str(&text).map_err(|e| FormatError::json(path, e))?
        };
        debug!(
            path = %path.display(),
            reports = capture.reports.len(),
            "Loaded capture"
        );
        Ok(capture)
    }

    /// Save a capture, choosing the format by file extension
    pub fn save(&self, path: &Path) -> Result<(), FormatError> {
        let content = if is_csv(path) {
            self.to_csv_string()
        } else {
            serde_json::to_string_pretty(self).map_err(|e| FormatError::json(path, e))?
        };
        std::fs::write(path, content).map_err(|e| FormatError::io(path, e))?;
        info!(path = %path.display(), reports = self.reports.len(), "Saved capture");
        Ok(())
    }
}

/// Load a capture and pack its reports into an arena.
///
/// A capture without any reports is an error here.
pub fn load_reports(path: &Path) -> Result<ReportArena, FormatError> {
    let capture = CaptureFile::load(path)?;
    if capture.is_empty() {
        return Err(FormatError::EmptyCapture(path.to_path_buf()));
    }
    capture.to_arena()
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
}

/// Split one CSV row, honouring double-quoted fields
fn split_csv_row(row: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = row.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if quoted && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut field)),
            _ => field.push(ch),
        }
    }
    fields.push(field);
    fields.iter_mut().for_each(|f| *f = f.trim().to_string());
    fields
}

/// Parse space-separated hex bytes (`"00 1F a0"`)
pub fn parse_hex_bytes(text: &str) -> Result<Vec<u8>, String> {
    text.split_whitespace()
        .map(|token| {
            let token = token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .unwrap_or(token);
            u8::from_str_radix(token, 16).map_err(|_| format!("invalid hex byte \"{token}\""))
        })
        .collect()
}

/// Accumulates reports from a live reader into a [`CaptureFile`]
pub struct CaptureRecorder {
    started: DateTime<Local>,
    device: Option<CaptureDevice>,
    reports: Vec<CapturedReport>,
    last_elapsed: Option<f64>,
}

impl CaptureRecorder {
    pub fn new(device: Option<CaptureDevice>) -> Self {
        Self {
            started: Local::now(),
            device,
            reports: Vec::new(),
            last_elapsed: None,
        }
    }

    /// Append a report; its wall-clock time is derived from the reader's
    /// elapsed seconds
    pub fn record(&mut self, report: &TimestampedReport) {
        let at = self.started + chrono::Duration::microseconds((report.elapsed * 1e6) as i64);
        let delta = self.last_elapsed.map_or(0.0, |last| report.elapsed - last);
        self.last_elapsed = Some(report.elapsed);

        self.reports.push(CapturedReport {
            data: report.report.to_vec(),
            timestamp: Some(at.to_rfc3339()),
            delta_seconds: Some(delta),
            hex: Some(hex_string(&report.report)),
        });
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Close the session
    pub fn finish(self) -> CaptureFile {
        CaptureFile {
            device: self.device,
            start_time: Some(self.started.to_rfc3339()),
            end_time: Some(Local::now().to_rfc3339()),
            report_count: Some(self.reports.len()),
            reports: self.reports,
        }
    }
}
