//! Error types for file formats and configuration

use std::path::PathBuf;

use kb16_matrix::MatrixError;
use thiserror::Error;

/// Errors while reading or writing capture and mapping files
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("CSV parse error on line {line}: {message}")]
    Csv { line: usize, message: String },

    #[error("No reports found in {0}")]
    EmptyCapture(PathBuf),

    #[error("Report {index} is invalid: {source}")]
    InvalidReport {
        index: usize,
        #[source]
        source: MatrixError,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] MatrixError),
}

impl FormatError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FormatError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        FormatError::Json {
            path: path.into(),
            source,
        }
    }
}

/// Errors while loading or saving the TOML configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
