//! HID transport for the DOIO KB16
//!
//! Finds the keypad among the system's HID interfaces, opens it and streams
//! its input reports to an async consumer:
//!
//! - [`HidDiscovery`] enumerates and opens devices through `hidapi`
//! - [`ReportReader`] owns a reader thread feeding a bounded channel
//!
//! Errors stay in [`TransportError`]; nothing here interprets report
//! contents.

pub mod device_registry;
pub mod error;
pub mod reader;
pub mod types;

mod discovery;

pub use discovery::{select_interface, DeviceFilter, HidDiscovery};
pub use error::TransportError;
pub use reader::{run_report_reader_loop, ReaderConfig, ReaderExit, ReportReader, ReportSource};
pub use types::{HidDeviceInfo, TimestampedReport};
