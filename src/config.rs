//! TOML configuration
//!
//! Every field has a default, so a missing file or a partial one both
//! yield a usable configuration. Command-line flags override these values.

use std::path::{Path, PathBuf};

use kb16_matrix::emitter::{validate_identifier, DEFAULT_ARRAY_NAME};
use kb16_matrix::{DecodeTarget, EmitterConfig, MatrixShape, PhysicalLayout, ReportHandler};
use kb16_transport::device_registry::{PRODUCT_ID, VENDOR_ID};
use kb16_transport::{DeviceFilter, ReaderConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceSection,
    #[serde(default)]
    pub matrix: MatrixSection,
    #[serde(default)]
    pub emitter: EmitterSection,
}

/// Which device to open and how to read it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSection {
    #[serde(default = "default_vendor_id")]
    pub vendor_id: u16,
    #[serde(default = "default_product_id")]
    pub product_id: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<i32>,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: i32,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_vendor_id() -> u16 {
    VENDOR_ID
}
fn default_product_id() -> u16 {
    PRODUCT_ID
}
fn default_read_timeout() -> i32 {
    ReaderConfig::default().read_timeout_ms
}
fn default_queue_capacity() -> usize {
    ReaderConfig::default().queue_capacity
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            vendor_id: default_vendor_id(),
            product_id: default_product_id(),
            interface: None,
            read_timeout_ms: default_read_timeout(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Grid geometry and inference threshold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixSection {
    #[serde(default = "default_rows")]
    pub rows: u8,
    #[serde(default = "default_cols")]
    pub cols: u8,
    #[serde(default = "default_min_transitions")]
    pub min_transitions: u64,
    /// Physical key labels by row; the stock KB16 labels when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<Vec<String>>>,
}

fn default_rows() -> u8 {
    MatrixShape::KB16.rows
}
fn default_cols() -> u8 {
    MatrixShape::KB16.cols
}
fn default_min_transitions() -> u64 {
    1
}

impl Default for MatrixSection {
    fn default() -> Self {
        Self {
            rows: default_rows(),
            cols: default_cols(),
            min_transitions: default_min_transitions(),
            labels: None,
        }
    }
}

/// Generated source settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmitterSection {
    #[serde(default = "default_array_name")]
    pub array_name: String,
    #[serde(default)]
    pub decode: DecodeTarget,
    #[serde(default)]
    pub report_handler: bool,
}

fn default_array_name() -> String {
    DEFAULT_ARRAY_NAME.to_string()
}

impl Default for EmitterSection {
    fn default() -> Self {
        Self {
            array_name: default_array_name(),
            decode: DecodeTarget::default(),
            report_handler: false,
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kb16")
            .join("config.toml")
    }

    /// Load config from a file, or return default if not found
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(io_err)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shape()?;
        if self.device.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "device.queue_capacity must be at least 1".to_string(),
            ));
        }
        if let Some(labels) = &self.matrix.labels {
            if PhysicalLayout::from_labels(labels.clone()).is_none() {
                return Err(ConfigError::Invalid(
                    "matrix.labels does not form a valid grid".to_string(),
                ));
            }
        }
        validate_identifier(&self.emitter.array_name)
            .map_err(|e| ConfigError::Invalid(format!("emitter.array_name: {e}")))?;
        Ok(())
    }

    pub fn shape(&self) -> Result<MatrixShape, ConfigError> {
        MatrixShape::new(self.matrix.rows, self.matrix.cols)
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn device_filter(&self) -> DeviceFilter {
        let filter = DeviceFilter::new()
            .with_vendor_id(self.device.vendor_id)
            .with_product_id(self.device.product_id);
        match self.device.interface {
            Some(interface) => filter.with_interface(interface),
            None => filter,
        }
    }

    pub fn reader_config(&self) -> ReaderConfig {
        ReaderConfig {
            read_timeout_ms: self.device.read_timeout_ms,
            queue_capacity: self.device.queue_capacity,
            ..Default::default()
        }
    }

    /// Configured labels, or the stock KB16 layout
    pub fn physical_layout(&self) -> PhysicalLayout {
        self.matrix
            .labels
            .clone()
            .and_then(PhysicalLayout::from_labels)
            .unwrap_or_default()
    }

    pub fn emitter_config(&self, shape: MatrixShape) -> EmitterConfig {
        let config = EmitterConfig::new(shape)
            .with_array_name(self.emitter.array_name.clone())
            .with_decode(self.emitter.decode);
        if self.emitter.report_handler {
            config.with_handler(ReportHandler {
                vendor_id: self.device.vendor_id,
                product_id: self.device.product_id,
            })
        } else {
            config
        }
    }
}
