//! Frequency-ranked assignment of report bits to matrix cells

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bits::BitCoordinate;
use crate::detector::ChangeFrequencyTable;
use crate::error::MatrixError;

/// Grid dimensions of a key matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatrixShape {
    pub rows: u8,
    pub cols: u8,
}

impl MatrixShape {
    /// The KB16 key grid
    pub const KB16: MatrixShape = MatrixShape { rows: 4, cols: 4 };

    /// Create a shape, rejecting zero rows or zero columns
    pub fn new(rows: u8, cols: u8) -> Result<Self, MatrixError> {
        if rows == 0 || cols == 0 {
            return Err(MatrixError::InvalidShape { rows, cols });
        }
        Ok(Self { rows, cols })
    }

    /// Total number of cells
    pub fn cells(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    /// Whether a position lies inside the grid
    pub fn contains(&self, pos: MatrixPosition) -> bool {
        pos.row < self.rows && pos.col < self.cols
    }

    /// Position of the `index`-th cell in row-major order
    pub fn position(&self, index: usize) -> Option<MatrixPosition> {
        if index >= self.cells() {
            return None;
        }
        Some(MatrixPosition {
            row: (index / self.cols as usize) as u8,
            col: (index % self.cols as usize) as u8,
        })
    }

    /// Row-major index of a position (`row * cols + col`)
    pub fn index_of(&self, pos: MatrixPosition) -> Option<usize> {
        self.contains(pos)
            .then(|| pos.row as usize * self.cols as usize + pos.col as usize)
    }

    pub(crate) fn check(&self, pos: MatrixPosition) -> Result<(), MatrixError> {
        if self.contains(pos) {
            Ok(())
        } else {
            Err(MatrixError::PositionOutOfBounds {
                row: pos.row,
                col: pos.col,
                rows: self.rows,
                cols: self.cols,
            })
        }
    }
}

impl Default for MatrixShape {
    fn default() -> Self {
        Self::KB16
    }
}

impl fmt::Display for MatrixShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

/// A cell in the key matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MatrixPosition {
    pub row: u8,
    pub col: u8,
}

impl MatrixPosition {
    pub fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for MatrixPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.row, self.col)
    }
}

/// Injective mapping from report bits to matrix cells
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAssignment {
    shape: MatrixShape,
    positions: BTreeMap<BitCoordinate, MatrixPosition>,
}

impl KeyAssignment {
    /// An assignment with no entries
    pub fn empty(shape: MatrixShape) -> Self {
        Self {
            shape,
            positions: BTreeMap::new(),
        }
    }

    /// Build an assignment from explicit pairs.
    ///
    /// Fails if a position is outside the shape or a position or bit is
    /// used twice.
    pub fn from_positions<I>(shape: MatrixShape, pairs: I) -> Result<Self, MatrixError>
    where
        I: IntoIterator<Item = (BitCoordinate, MatrixPosition)>,
    {
        let mut positions = BTreeMap::new();
        let mut used = vec![false; shape.cells()];

        for (coord, pos) in pairs {
            shape.check(pos)?;
            let index = pos.row as usize * shape.cols as usize + pos.col as usize;
            if used[index] {
                return Err(MatrixError::DuplicatePosition {
                    row: pos.row,
                    col: pos.col,
                });
            }
            if positions.insert(coord, pos).is_some() {
                return Err(MatrixError::DuplicateBit(coord.to_string()));
            }
            used[index] = true;
        }

        Ok(Self { shape, positions })
    }

    pub fn shape(&self) -> MatrixShape {
        self.shape
    }

    /// Position assigned to a bit
    pub fn get(&self, coord: BitCoordinate) -> Option<MatrixPosition> {
        self.positions.get(&coord).copied()
    }

    /// Bit assigned to a position
    pub fn bit_at(&self, pos: MatrixPosition) -> Option<BitCoordinate> {
        self.positions
            .iter()
            .find(|(_, p)| **p == pos)
            .map(|(coord, _)| *coord)
    }

    /// Iterate `(coordinate, position)` pairs in row-major position order
    pub fn iter(&self) -> impl Iterator<Item = (BitCoordinate, MatrixPosition)> {
        let mut pairs: Vec<_> = self.positions.iter().map(|(c, p)| (*c, *p)).collect();
        pairs.sort_by_key(|(_, pos)| *pos);
        pairs.into_iter()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Row-major grid, `None` for unassigned cells
    pub fn to_grid(&self) -> Vec<Vec<Option<BitCoordinate>>> {
        let mut grid = vec![vec![None; self.shape.cols as usize]; self.shape.rows as usize];
        for (coord, pos) in &self.positions {
            grid[pos.row as usize][pos.col as usize] = Some(*coord);
        }
        grid
    }
}

/// Assigns the most frequently changing bits to matrix cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatrixAssigner {
    shape: MatrixShape,
    min_transitions: u64,
}

impl MatrixAssigner {
    pub fn new(shape: MatrixShape) -> Self {
        Self {
            shape,
            min_transitions: 1,
        }
    }

    /// Ignore bits that changed fewer than `min` times
    pub fn with_min_transitions(mut self, min: u64) -> Self {
        self.min_transitions = min.max(1);
        self
    }

    pub fn shape(&self) -> MatrixShape {
        self.shape
    }

    pub fn min_transitions(&self) -> u64 {
        self.min_transitions
    }

    /// Rank the table and fill cells in row-major order.
    ///
    /// Ranking is by descending count, then ascending coordinate, so the
    /// result depends only on the table contents.
    pub fn assign(&self, table: &ChangeFrequencyTable) -> KeyAssignment {
        let positions: BTreeMap<_, _> = table
            .ranked()
            .into_iter()
            .filter(|(_, count)| *count >= self.min_transitions)
            .take(self.shape.cells())
            .enumerate()
            .filter_map(|(index, (coord, _))| self.shape.position(index).map(|pos| (coord, pos)))
            .collect();

        debug!(
            candidates = table.len(),
            assigned = positions.len(),
            shape = %self.shape,
            "Matrix assignment complete"
        );

        KeyAssignment {
            shape: self.shape,
            positions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(byte: u8, bit: u8) -> BitCoordinate {
        BitCoordinate { byte, bit }
    }

    #[test]
    fn test_shape_rejects_zero() {
        assert_eq!(
            MatrixShape::new(0, 4),
            Err(MatrixError::InvalidShape { rows: 0, cols: 4 })
        );
        assert!(MatrixShape::new(4, 0).is_err());
        assert_eq!(MatrixShape::new(2, 3).unwrap().cells(), 6);
    }

    #[test]
    fn test_shape_position_row_major() {
        let shape = MatrixShape::new(2, 3).unwrap();
        assert_eq!(shape.position(0), Some(MatrixPosition::new(0, 0)));
        assert_eq!(shape.position(4), Some(MatrixPosition::new(1, 1)));
        assert_eq!(shape.position(6), None);
        assert_eq!(shape.index_of(MatrixPosition::new(1, 2)), Some(5));
        assert_eq!(shape.index_of(MatrixPosition::new(2, 0)), None);
    }

    #[test]
    fn test_assign_highest_first() {
        let table: ChangeFrequencyTable = [(coord(0, 0), 2), (coord(3, 1), 10), (coord(1, 4), 5)]
            .into_iter()
            .collect();
        let assignment = MatrixAssigner::new(MatrixShape::new(1, 2).unwrap()).assign(&table);

        assert_eq!(assignment.len(), 2);
        assert_eq!(assignment.get(coord(3, 1)), Some(MatrixPosition::new(0, 0)));
        assert_eq!(assignment.get(coord(1, 4)), Some(MatrixPosition::new(0, 1)));
        assert_eq!(assignment.get(coord(0, 0)), None);
    }

    #[test]
    fn test_assign_min_transitions() {
        let table: ChangeFrequencyTable = [(coord(0, 0), 1), (coord(0, 1), 2)]
            .into_iter()
            .collect();
        let assignment = MatrixAssigner::new(MatrixShape::KB16)
            .with_min_transitions(2)
            .assign(&table);

        assert_eq!(assignment.len(), 1);
        assert_eq!(assignment.bit_at(MatrixPosition::new(0, 0)), Some(coord(0, 1)));
    }

    #[test]
    fn test_assign_empty_table() {
        let assignment = MatrixAssigner::new(MatrixShape::KB16).assign(&ChangeFrequencyTable::new());
        assert!(assignment.is_empty());
        assert_eq!(assignment.shape(), MatrixShape::KB16);
    }

    #[test]
    fn test_to_grid_leaves_gaps() {
        let table: ChangeFrequencyTable = [(coord(0, 0), 3)].into_iter().collect();
        let grid = MatrixAssigner::new(MatrixShape::new(2, 2).unwrap())
            .assign(&table)
            .to_grid();
        assert_eq!(grid, vec![vec![Some(coord(0, 0)), None], vec![None, None]]);
    }

    #[test]
    fn test_from_positions_rejects_duplicates() {
        let shape = MatrixShape::new(2, 2).unwrap();
        let err = KeyAssignment::from_positions(
            shape,
            [
                (coord(0, 0), MatrixPosition::new(0, 0)),
                (coord(0, 1), MatrixPosition::new(0, 0)),
            ],
        )
        .unwrap_err();
        assert_eq!(err, MatrixError::DuplicatePosition { row: 0, col: 0 });

        let err = KeyAssignment::from_positions(
            shape,
            [
                (coord(0, 0), MatrixPosition::new(0, 0)),
                (coord(0, 0), MatrixPosition::new(0, 1)),
            ],
        )
        .unwrap_err();
        assert_eq!(err, MatrixError::DuplicateBit("byte0_bit0".to_string()));

        let err =
            KeyAssignment::from_positions(shape, [(coord(0, 0), MatrixPosition::new(2, 0))])
                .unwrap_err();
        assert!(matches!(err, MatrixError::PositionOutOfBounds { .. }));
    }

    #[test]
    fn test_iter_in_position_order() {
        let shape = MatrixShape::new(1, 3).unwrap();
        let assignment = KeyAssignment::from_positions(
            shape,
            [
                (coord(0, 0), MatrixPosition::new(0, 2)),
                (coord(5, 5), MatrixPosition::new(0, 0)),
                (coord(1, 0), MatrixPosition::new(0, 1)),
            ],
        )
        .unwrap();
        let coords: Vec<_> = assignment.iter().map(|(c, _)| c).collect();
        assert_eq!(coords, vec![coord(5, 5), coord(1, 0), coord(0, 0)]);
    }
}
