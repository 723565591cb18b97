//! Mapping file editing command.

use std::path::Path;

use anyhow::{bail, Context};
use kb16_matrix::{BitCoordinate, KeyMap, MatrixPosition};
use kb16_tools::{Config, MappingFile};
use tracing::info;

use super::{resolve_shape, CommandResult};
use crate::cli::GridArgs;

/// One change to a mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Set {
        byte: Option<u8>,
        bit: Option<u8>,
        label: Option<String>,
    },
    Remove,
}

/// Apply an edit, returning a description of what changed
pub fn apply_edit(
    key_map: &mut KeyMap,
    position: MatrixPosition,
    edit: Edit,
) -> anyhow::Result<String> {
    match edit {
        Edit::Remove => match key_map.remove(position) {
            Some(entry) => Ok(format!("Removed {} at {}", entry.display_name(), position)),
            None => bail!("No entry at {}", position),
        },
        Edit::Set { byte, bit, label } => {
            let (Some(byte), Some(bit)) = (byte, bit) else {
                bail!("--byte and --bit are required");
            };
            let coord = BitCoordinate::new(byte, bit)?;
            let displaced = key_map.set(position, coord, label)?;
            let mut message = format!("{} -> {}", position, coord);
            if let Some(from) = displaced {
                message.push_str(&format!(" (moved from {from})"));
            }
            Ok(message)
        }
    }
}

pub fn run(
    config: &Config,
    mapping_path: &Path,
    position: MatrixPosition,
    edit: Edit,
    grid: GridArgs,
    output: Option<&Path>,
) -> CommandResult {
    let shape = resolve_shape(config, grid)?;
    let mut mapping = MappingFile::load(mapping_path)?;
    let mut key_map = mapping
        .to_key_map(shape)
        .with_context(|| format!("Invalid mapping in {}", mapping_path.display()))?;

    let message = apply_edit(&mut key_map, position, edit)?;
    key_map.validate()?;

    mapping.key_mappings = key_map.sorted_by_position().into_entries();
    mapping.timestamp = Some(chrono::Local::now().to_rfc3339());
    let target = output.unwrap_or(mapping_path);
    mapping.save(target)?;

    info!(path = %target.display(), "Mapping updated");
    println!("{message}");
    println!("Saved {} mappings to {}", mapping.key_mappings.len(), target.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kb16_matrix::{LookupEntry, MatrixShape};

    fn map() -> KeyMap {
        KeyMap::from_entries(
            MatrixShape::KB16,
            vec![
                LookupEntry::new(BitCoordinate::new(5, 5).unwrap(), MatrixPosition::new(0, 0)),
                LookupEntry::new(BitCoordinate::new(5, 6).unwrap(), MatrixPosition::new(0, 1)),
            ],
        )
    }

    #[test]
    fn test_set_moves_bit() {
        let mut key_map = map();
        let message = apply_edit(
            &mut key_map,
            MatrixPosition::new(1, 0),
            Edit::Set {
                byte: Some(5),
                bit: Some(6),
                label: Some("5".into()),
            },
        )
        .unwrap();
        assert!(message.contains("moved from (0,1)"));
        assert_eq!(key_map.len(), 2);
        assert!(key_map.get(MatrixPosition::new(0, 1)).is_none());
    }

    #[test]
    fn test_remove_missing_fails() {
        let mut key_map = map();
        assert!(apply_edit(&mut key_map, MatrixPosition::new(3, 3), Edit::Remove).is_err());
        assert!(apply_edit(&mut key_map, MatrixPosition::new(0, 0), Edit::Remove).is_ok());
        assert_eq!(key_map.len(), 1);
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let mut key_map = map();
        let edit = Edit::Set {
            byte: Some(0),
            bit: Some(0),
            label: None,
        };
        assert!(apply_edit(&mut key_map, MatrixPosition::new(4, 0), edit).is_err());
    }
}
