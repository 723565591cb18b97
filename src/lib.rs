// DOIO KB16 HID tools - Shared Library
// Capture and mapping file formats, configuration, offline analysis

pub mod analyzer;
pub mod capture;
pub mod config;
pub mod error;
pub mod mapping;
pub mod panel;

pub use analyzer::{AnalysisReport, AnalysisSession, OutputFormat, Printer};
pub use capture::{load_reports, CaptureFile, CaptureRecorder, CapturedReport};
pub use config::Config;
pub use error::{ConfigError, FormatError};
pub use mapping::MappingFile;
pub use panel::PanelMapping;
