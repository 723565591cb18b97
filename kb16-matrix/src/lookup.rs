//! Lookup entries and editable key maps
//!
//! A [`LookupEntry`] is the persisted form of one assigned bit: where to
//! find it in the report and which matrix cell it drives. A [`KeyMap`] is an
//! ordered list of entries for one matrix shape, with the editing operations
//! used when correcting an inferred assignment by hand.

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};

use crate::assigner::{KeyAssignment, MatrixPosition, MatrixShape};
use crate::bits::BitCoordinate;
use crate::detector::ChangeFrequencyTable;
use crate::error::MatrixError;
use crate::keycodes::PhysicalLayout;

/// One row of the generated lookup table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupEntry {
    /// Byte index within the report
    pub byte_idx: u8,
    /// Single-bit mask within that byte
    #[serde(deserialize_with = "deserialize_byte")]
    pub bit_mask: u8,
    pub row: u8,
    pub col: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_opt_byte"
    )]
    pub hid_keycode: Option<u8>,
    /// Transition count observed during inference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transitions: Option<u64>,
}

impl LookupEntry {
    pub fn new(coord: BitCoordinate, pos: MatrixPosition) -> Self {
        Self {
            byte_idx: coord.byte,
            bit_mask: coord.mask(),
            row: pos.row,
            col: pos.col,
            key_name: None,
            hid_keycode: None,
            transitions: None,
        }
    }

    pub fn with_key_name(mut self, name: impl Into<String>) -> Self {
        self.key_name = Some(name.into());
        self
    }

    pub fn with_hid_keycode(mut self, keycode: u8) -> Self {
        self.hid_keycode = Some(keycode);
        self
    }

    pub fn with_transitions(mut self, count: u64) -> Self {
        self.transitions = Some(count);
        self
    }

    /// Report bit this entry reads; fails if the mask is not a single bit
    pub fn coordinate(&self) -> Result<BitCoordinate, MatrixError> {
        BitCoordinate::from_mask(self.byte_idx, self.bit_mask)
    }

    pub fn position(&self) -> MatrixPosition {
        MatrixPosition::new(self.row, self.col)
    }

    /// Key name if set, else the `byteN_bitM` identifier
    pub fn display_name(&self) -> String {
        match (&self.key_name, self.coordinate()) {
            (Some(name), _) => name.clone(),
            (None, Ok(coord)) => coord.to_string(),
            (None, Err(_)) => format!("byte{}_mask0x{:02X}", self.byte_idx, self.bit_mask),
        }
    }
}

/// Accepts `32`, `"32"` or `"0x20"`
fn parse_byte<E: serde::de::Error>(repr: ByteRepr) -> Result<u8, E> {
    match repr {
        ByteRepr::Number(n) => {
            u8::try_from(n).map_err(|_| E::custom(format!("value {n} does not fit in a byte")))
        }
        ByteRepr::Text(s) => {
            let trimmed = s.trim();
            let parsed = match trimmed
                .strip_prefix("0x")
                .or_else(|| trimmed.strip_prefix("0X"))
            {
                Some(hex) => u8::from_str_radix(hex, 16),
                None => trimmed.parse::<u8>(),
            };
            parsed.map_err(|_| E::custom(format!("invalid byte value: \"{s}\"")))
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ByteRepr {
    Number(u64),
    Text(String),
}

fn deserialize_byte<'de, D: Deserializer<'de>>(d: D) -> Result<u8, D::Error> {
    parse_byte(ByteRepr::deserialize(d)?)
}

fn deserialize_opt_byte<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u8>, D::Error> {
    match Option::<ByteRepr>::deserialize(d)? {
        Some(repr) => parse_byte(repr).map(Some),
        None => Ok(None),
    }
}

/// Check entries against a shape: positions in bounds, masks single-bit,
/// positions and bits unique
pub fn validate_entries(shape: MatrixShape, entries: &[LookupEntry]) -> Result<(), MatrixError> {
    let mut used = vec![false; shape.cells()];
    let mut bits = HashSet::with_capacity(entries.len());
    for entry in entries {
        let pos = entry.position();
        shape.check(pos)?;
        let coord = entry.coordinate()?;
        if !bits.insert(coord) {
            return Err(MatrixError::DuplicateBit(coord.to_string()));
        }
        let index = pos.row as usize * shape.cols as usize + pos.col as usize;
        if used[index] {
            return Err(MatrixError::DuplicatePosition {
                row: pos.row,
                col: pos.col,
            });
        }
        used[index] = true;
    }
    Ok(())
}

/// Lookup entries for an assignment, in row-major position order.
///
/// Transition counts are filled in when a table is given.
pub fn entries_from_assignment(
    assignment: &KeyAssignment,
    table: Option<&ChangeFrequencyTable>,
) -> Vec<LookupEntry> {
    assignment
        .iter()
        .map(|(coord, pos)| {
            let entry = LookupEntry::new(coord, pos);
            match table {
                Some(table) => entry.with_transitions(table.get(coord)),
                None => entry,
            }
        })
        .collect()
}

/// Ordered lookup entries for one matrix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMap {
    shape: MatrixShape,
    entries: Vec<LookupEntry>,
}

impl KeyMap {
    pub fn new(shape: MatrixShape) -> Self {
        Self {
            shape,
            entries: Vec::new(),
        }
    }

    /// Wrap existing entries; nothing is validated until [`KeyMap::validate`]
    pub fn from_entries(shape: MatrixShape, entries: Vec<LookupEntry>) -> Self {
        Self { shape, entries }
    }

    pub fn from_assignment(
        assignment: &KeyAssignment,
        table: Option<&ChangeFrequencyTable>,
    ) -> Self {
        Self {
            shape: assignment.shape(),
            entries: entries_from_assignment(assignment, table),
        }
    }

    pub fn shape(&self) -> MatrixShape {
        self.shape
    }

    pub fn entries(&self) -> &[LookupEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<LookupEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at a position
    pub fn get(&self, pos: MatrixPosition) -> Option<&LookupEntry> {
        self.entries.iter().find(|e| e.position() == pos)
    }

    /// Point a position at a report bit.
    ///
    /// Replaces the entry for `pos` in place, or appends one. Any other
    /// entry reading the same bit is removed and its position returned, so
    /// a bit never drives two cells.
    pub fn set(
        &mut self,
        pos: MatrixPosition,
        coord: BitCoordinate,
        label: Option<String>,
    ) -> Result<Option<MatrixPosition>, MatrixError> {
        self.shape.check(pos)?;

        let displaced = self
            .entries
            .iter()
            .position(|e| e.position() != pos && e.coordinate().ok() == Some(coord));
        let displaced = displaced.map(|index| self.entries.remove(index).position());

        match self.entries.iter_mut().find(|e| e.position() == pos) {
            Some(entry) => {
                let same_bit = entry.coordinate().ok() == Some(coord);
                entry.byte_idx = coord.byte;
                entry.bit_mask = coord.mask();
                if !same_bit {
                    entry.transitions = None;
                }
                if label.is_some() {
                    entry.key_name = label;
                }
            }
            None => {
                let mut entry = LookupEntry::new(coord, pos);
                entry.key_name = label;
                self.entries.push(entry);
            }
        }

        Ok(displaced)
    }

    /// Remove the entry at a position
    pub fn remove(&mut self, pos: MatrixPosition) -> Option<LookupEntry> {
        let index = self.entries.iter().position(|e| e.position() == pos)?;
        Some(self.entries.remove(index))
    }

    /// Copy with entries in row-major position order
    pub fn sorted_by_position(&self) -> KeyMap {
        let mut entries = self.entries.clone();
        entries.sort_by_key(LookupEntry::position);
        Self {
            shape: self.shape,
            entries,
        }
    }

    pub fn validate(&self) -> Result<(), MatrixError> {
        validate_entries(self.shape, &self.entries)
    }

    /// Fill missing key names and keycodes from a physical layout
    pub fn apply_layout(&mut self, layout: &PhysicalLayout) {
        for entry in &mut self.entries {
            let pos = entry.position();
            if entry.key_name.is_none() {
                entry.key_name = layout.label(pos).map(str::to_string);
            }
            if entry.hid_keycode.is_none() {
                entry.hid_keycode = match &entry.key_name {
                    Some(name) => crate::keycodes::keycode_for_name(name),
                    None => layout.keycode(pos),
                };
            }
        }
    }

    /// Convert back to an assignment, validating along the way
    pub fn to_assignment(&self) -> Result<KeyAssignment, MatrixError> {
        let pairs = self
            .entries
            .iter()
            .map(|e| e.coordinate().map(|coord| (coord, e.position())))
            .collect::<Result<Vec<_>, _>>()?;
        KeyAssignment::from_positions(self.shape, pairs)
    }
}
