//! Matrix engine error types

use thiserror::Error;

/// Errors raised when data handed to the engine fails validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatrixError {
    /// Matrix dimensions must both be non-zero
    #[error("Invalid matrix shape {rows}x{cols}: rows and cols must be non-zero")]
    InvalidShape { rows: u8, cols: u8 },

    /// Bit index outside 0..=7
    #[error("Invalid bit index {0}: must be 0-7")]
    InvalidBitIndex(u8),

    /// Bit mask is not a single set bit
    #[error("Invalid bit mask 0x{0:02X}: exactly one bit must be set")]
    InvalidBitMask(u8),

    /// Matrix position outside the configured grid
    #[error("Position ({row},{col}) is outside the {rows}x{cols} matrix")]
    PositionOutOfBounds { row: u8, col: u8, rows: u8, cols: u8 },

    /// Two entries claim the same matrix position
    #[error("Position ({row},{col}) is assigned more than once")]
    DuplicatePosition { row: u8, col: u8 },

    /// Two positions claim the same report bit
    #[error("Bit {0} is assigned to more than one position")]
    DuplicateBit(String),

    /// Report exceeds the maximum HID report size
    #[error("Report of {len} bytes exceeds the {max}-byte limit")]
    ReportTooLong { len: usize, max: usize },

    /// Generated array name is not a C++ identifier
    #[error("Invalid identifier {0:?}: use letters, digits and '_', not starting with a digit")]
    InvalidIdentifier(String),
}
