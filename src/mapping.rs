//! Mapping files
//!
//! The persisted result of an inference or a calibration session:
//!
//! ```json
//! {
//!   "timestamp": "2025-03-01T10:00:00+01:00",
//!   "physical_layout": [["1", "2", "3", "4"], ...],
//!   "key_mappings": [
//!     { "byte_idx": 5, "bit_mask": "0x20", "row": 0, "col": 0, "key_name": "1" }
//!   ]
//! }
//! ```
//!
//! `bit_mask` and `hid_keycode` may be numbers or hex strings on input and
//! are always written back as numbers.

use std::path::Path;

use kb16_matrix::{KeyMap, LookupEntry, MatrixShape, PhysicalLayout};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::FormatError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Key labels by row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_layout: Option<Vec<Vec<String>>>,
    pub key_mappings: Vec<LookupEntry>,
}

impl MappingFile {
    /// Snapshot a key map, stamped with the current local time
    pub fn from_key_map(map: &KeyMap, layout: Option<&PhysicalLayout>) -> Self {
        Self {
            timestamp: Some(chrono::Local::now().to_rfc3339()),
            physical_layout: layout.map(|l| l.labels().to_vec()),
            key_mappings: map.entries().to_vec(),
        }
    }

    /// Validate the entries against `shape` and wrap them in a [`KeyMap`]
    pub fn to_key_map(&self, shape: MatrixShape) -> Result<KeyMap, FormatError> {
        let map = KeyMap::from_entries(shape, self.key_mappings.clone());
        map.validate()?;
        Ok(map)
    }

    /// Physical layout stored in the file, if it is rectangular
    pub fn layout(&self) -> Option<PhysicalLayout> {
        self.physical_layout
            .clone()
            .and_then(PhysicalLayout::from_labels)
    }

    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn load(path: &Path) -> Result<Self, FormatError> {
        let text = std::fs::read_to_string(path).map_err(|e| FormatError::io(path, e))?;
        let mapping = Self::from_json_str(&text).map_err(|e| FormatError::json(path, e))?;
        debug!(
            path = %path.display(),
            entries = mapping.key_mappings.len(),
            "Loaded mapping"
        );
        Ok(mapping)
    }

    pub fn save(&self, path: &Path) -> Result<(), FormatError> {
        let content = serde_json::to_string_pretty(self).map_err(|e| FormatError::json(path, e))?;
        std::fs::write(path, content).map_err(|e| FormatError::io(path, e))?;
        info!(path = %path.display(), entries = self.key_mappings.len(), "Saved mapping");
        Ok(())
    }
}

/// True if the JSON text looks like a mapping file rather than a capture
pub fn is_mapping_json(text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(text)
        .map(|v| v.get("key_mappings").is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kb16_matrix::{BitCoordinate, MatrixError, MatrixPosition};

    #[test]
    fn test_hex_strings_accepted() {
        let json = r#"{
            "key_mappings": [
                {"byte_idx": 5, "bit_mask": "0x20", "row": 0, "col": 0, "hid_keycode": "0x1E"},
                {"byte_idx": 5, "bit_mask": 64, "row": 0, "col": 1}
            ]
        }"#;
        let mapping = MappingFile::from_json_str(json).unwrap();
        assert_eq!(mapping.key_mappings[0].bit_mask, 0x20);
        assert_eq!(mapping.key_mappings[0].hid_keycode, Some(0x1E));
        assert_eq!(mapping.key_mappings[1].bit_mask, 0x40);

        let written = serde_json::to_string(&mapping).unwrap();
        assert!(written.contains("\"bit_mask\":32"));
        assert!(written.contains("\"hid_keycode\":30"));
    }

    #[test]
    fn test_to_key_map_validates() {
        let mapping = MappingFile {
            key_mappings: vec![LookupEntry::new(
                BitCoordinate::new(0, 0).unwrap(),
                MatrixPosition::new(4, 0),
            )],
            ..Default::default()
        };
        match mapping.to_key_map(MatrixShape::KB16) {
            Err(FormatError::Validation(MatrixError::PositionOutOfBounds { row, .. })) => {
                assert_eq!(row, 4)
            }
            other => panic!("expected bounds error, got {other:?}"),
        }
    }

    #[test]
    fn test_layout_roundtrip() {
        let layout = PhysicalLayout::kb16();
        let mapping = MappingFile::from_key_map(&KeyMap::new(MatrixShape::KB16), Some(&layout));
        assert!(mapping.timestamp.is_some());
        assert_eq!(mapping.layout(), Some(layout));
    }

    #[test]
    fn test_is_mapping_json() {
        assert!(is_mapping_json(r#"{"key_mappings": []}"#));
        assert!(!is_mapping_json(r#"{"reports": []}"#));
        assert!(!is_mapping_json("not json"));
    }
}
