//! Bit addressing within HID reports
//!
//! A [`BitCoordinate`] names one binary flag inside a report as a
//! `(byte, bit)` pair. Coordinates order by byte first, then bit, which is
//! the tie-break order used when ranking bits.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::MatrixError;

/// One binary flag inside a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BitCoordinate {
    /// Byte index within the report
    pub byte: u8,
    /// Bit index within the byte (0 = LSB)
    pub bit: u8,
}

impl BitCoordinate {
    /// Create a coordinate, rejecting bit indices above 7
    pub fn new(byte: u8, bit: u8) -> Result<Self, MatrixError> {
        if bit > 7 {
            return Err(MatrixError::InvalidBitIndex(bit));
        }
        Ok(Self { byte, bit })
    }

    /// Build a coordinate from a byte index and a single-bit mask
    pub fn from_mask(byte: u8, mask: u8) -> Result<Self, MatrixError> {
        if mask.count_ones() != 1 {
            return Err(MatrixError::InvalidBitMask(mask));
        }
        Ok(Self {
            byte,
            bit: mask.trailing_zeros() as u8,
        })
    }

    /// Mask selecting this bit within its byte
    #[inline]
    pub fn mask(&self) -> u8 {
        1 << self.bit
    }

    /// Read this bit from a report; `None` if the report is too short
    #[inline]
    pub fn read(&self, report: &[u8]) -> Option<bool> {
        report
            .get(self.byte as usize)
            .map(|b| b & self.mask() != 0)
    }
}

impl fmt::Display for BitCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "byte{}_bit{}", self.byte, self.bit)
    }
}

/// Number of report bytes a [`BitCoordinate`] can address
pub const ADDRESSABLE_BYTES: usize = u8::MAX as usize + 1;

/// A bit that differs between two reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitChange {
    pub coord: BitCoordinate,
    /// Value of the bit in the newer report
    pub set: bool,
}

/// Iterate over every bit that differs between `base` and `other`.
///
/// Only byte indices present in both reports are compared. Bytes past the
/// shorter report's end are never examined, nor are bytes past index 255
/// (not addressable by a `u8` byte index).
pub fn changed_bits<'a>(base: &'a [u8], other: &'a [u8]) -> impl Iterator<Item = BitChange> + 'a {
    base.iter()
        .zip(other.iter())
        .take(ADDRESSABLE_BYTES)
        .enumerate()
        .filter(|(_, (a, b))| a != b)
        .flat_map(|(index, (&a, &b))| {
            let diff = a ^ b;
            (0..8u8)
                .filter(move |&bit| diff & (1 << bit) != 0)
                .map(move |bit| BitChange {
                    coord: BitCoordinate {
                        byte: index as u8,
                        bit,
                    },
                    set: b & (1 << bit) != 0,
                })
        })
}
