//! Common types for the transport layer

use kb16_matrix::Report;
use serde::Serialize;

/// One HID interface as reported by the OS
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HidDeviceInfo {
    /// USB Vendor ID
    pub vid: u16,
    /// USB Product ID
    pub pid: u16,
    /// USB interface number (-1 if the backend does not know)
    pub interface_number: i32,
    pub usage_page: u16,
    pub usage: u16,
    /// Platform device path
    pub path: String,
    pub manufacturer: Option<String>,
    pub product_name: Option<String>,
    pub serial: Option<String>,
    /// Registry name when this is a recognised KB16 identity
    pub known_as: Option<&'static str>,
}

impl HidDeviceInfo {
    /// Whether this interface belongs to a recognised KB16
    pub fn is_kb16(&self) -> bool {
        self.known_as.is_some()
    }

    /// Human-readable one-line description
    pub fn label(&self) -> String {
        let name = self
            .product_name
            .as_deref()
            .or(self.known_as)
            .unwrap_or("Unknown device");
        format!(
            "{:04X}:{:04X} if={} {}",
            self.vid, self.pid, self.interface_number, name
        )
    }
}

/// A report stamped with its arrival time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimestampedReport {
    /// Seconds since the reader started
    pub elapsed: f64,
    pub report: Report,
}

impl TimestampedReport {
    pub fn new(elapsed: f64, report: Report) -> Self {
        Self { elapsed, report }
    }
}
