//! Panel mapping: renumbers physical key and knob ids for display
//!
//! ```json
//! { "key_mapping": { "1": 4, "2": 3, ... }, "knob_mapping": { "1": 1, ... } }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use kb16_matrix::decoder::{KB16_ENCODER_COUNT, KB16_KEY_COUNT};
use kb16_matrix::KeyEvent;
use serde::{Deserialize, Serialize};

use crate::error::FormatError;

/// Physical id (as a string key) to logical id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelMapping {
    #[serde(default = "identity_keys")]
    pub key_mapping: BTreeMap<String, u8>,
    #[serde(default = "identity_knobs")]
    pub knob_mapping: BTreeMap<String, u8>,
}

fn identity(count: u8) -> BTreeMap<String, u8> {
    (1..=count).map(|id| (id.to_string(), id)).collect()
}

fn identity_keys() -> BTreeMap<String, u8> {
    identity(KB16_KEY_COUNT)
}

fn identity_knobs() -> BTreeMap<String, u8> {
    identity(KB16_ENCODER_COUNT)
}

impl Default for PanelMapping {
    fn default() -> Self {
        Self {
            key_mapping: identity_keys(),
            knob_mapping: identity_knobs(),
        }
    }
}

impl PanelMapping {
    pub fn load(path: &Path) -> Result<Self, FormatError> {
        let text = std::fs::read_to_string(path).map_err(|e| FormatError::io(path, e))?;
        serde_json::from_str(&text).map_err(|e| FormatError::json(path, e))
    }

    pub fn save(&self, path: &Path) -> Result<(), FormatError> {
        let content = serde_json::to_string_pretty(self).map_err(|e| FormatError::json(path, e))?;
        std::fs::write(path, content).map_err(|e| FormatError::io(path, e))
    }

    /// Logical id for a physical key; unmapped keys keep their id
    pub fn key(&self, physical: u8) -> u8 {
        self.key_mapping
            .get(&physical.to_string())
            .copied()
            .unwrap_or(physical)
    }

    /// Logical id for a physical knob; unmapped knobs keep their id
    pub fn knob(&self, physical: u8) -> u8 {
        self.knob_mapping
            .get(&physical.to_string())
            .copied()
            .unwrap_or(physical)
    }

    /// Rewrite the ids carried by an event
    pub fn remap(&self, event: KeyEvent) -> KeyEvent {
        match event {
            KeyEvent::KeyPressed { key } => KeyEvent::KeyPressed { key: self.key(key) },
            KeyEvent::KeyReleased { key } => KeyEvent::KeyReleased { key: self.key(key) },
            KeyEvent::EncoderRotated {
                encoder,
                raw,
                percent,
            } => KeyEvent::EncoderRotated {
                encoder: self.knob(encoder),
                raw,
                percent,
            },
            KeyEvent::EncoderButtonPressed { encoder } => KeyEvent::EncoderButtonPressed {
                encoder: self.knob(encoder),
            },
            KeyEvent::EncoderButtonReleased { encoder } => KeyEvent::EncoderButtonReleased {
                encoder: self.knob(encoder),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_identity() {
        let panel = PanelMapping::default();
        assert_eq!(panel.key_mapping.len(), 16);
        assert_eq!(panel.knob_mapping.len(), 3);
        assert_eq!(panel.key(7), 7);
        assert_eq!(panel.knob(3), 3);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let panel: PanelMapping = serde_json::from_str(r#"{"key_mapping": {"1": 4}}"#).unwrap();
        assert_eq!(panel.key(1), 4);
        assert_eq!(panel.key(2), 2);
        assert_eq!(panel.knob_mapping.len(), 3);
    }

    #[test]
    fn test_remap_events() {
        let panel: PanelMapping =
            serde_json::from_str(r#"{"key_mapping": {"1": 16}, "knob_mapping": {"2": 1}}"#)
                .unwrap();
        assert_eq!(
            panel.remap(KeyEvent::KeyPressed { key: 1 }),
            KeyEvent::KeyPressed { key: 16 }
        );
        assert_eq!(
            panel.remap(KeyEvent::EncoderRotated {
                encoder: 2,
                raw: 255,
                percent: 100
            }),
            KeyEvent::EncoderRotated {
                encoder: 1,
                raw: 255,
                percent: 100
            }
        );
    }
}
