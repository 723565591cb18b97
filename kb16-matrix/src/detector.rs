//! Change detection over a report stream
//!
//! The detector compares each report against its predecessor and counts, per
//! bit, how many times that bit flipped. Bits that belong to physical keys
//! flip every press and release, so after a calibration session in which the
//! user presses each key a few times they stand out from static or noisy bits.

use std::collections::BTreeMap;

use tracing::debug;

use crate::bits::{changed_bits, BitCoordinate};
use crate::error::MatrixError;
use crate::report::MAX_REPORT_LEN;

/// Transition count per bit coordinate.
///
/// Counts only ever grow while a detector is observing. Iteration is in
/// coordinate order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeFrequencyTable {
    counts: BTreeMap<BitCoordinate, u64>,
}

impl ChangeFrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transition count for a coordinate (0 if never seen)
    pub fn get(&self, coord: BitCoordinate) -> u64 {
        self.counts.get(&coord).copied().unwrap_or(0)
    }

    /// Iterate `(coordinate, count)` in coordinate order
    pub fn iter(&self) -> impl Iterator<Item = (BitCoordinate, u64)> + '_ {
        self.counts.iter().map(|(coord, count)| (*coord, *count))
    }

    /// Number of distinct coordinates that changed at least once
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all transition counts
    pub fn total_transitions(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Entries ordered by descending count, ties broken by ascending coordinate
    pub fn ranked(&self) -> Vec<(BitCoordinate, u64)> {
        let mut ranked: Vec<_> = self.iter().collect();
        ranked.sort_by(|(a_coord, a_count), (b_coord, b_count)| {
            b_count.cmp(a_count).then(a_coord.cmp(b_coord))
        });
        ranked
    }

    fn bump(&mut self, coord: BitCoordinate) {
        *self.counts.entry(coord).or_insert(0) += 1;
    }
}

impl FromIterator<(BitCoordinate, u64)> for ChangeFrequencyTable {
    fn from_iter<I: IntoIterator<Item = (BitCoordinate, u64)>>(iter: I) -> Self {
        Self {
            counts: iter.into_iter().filter(|(_, count)| *count > 0).collect(),
        }
    }
}

/// Accumulates a [`ChangeFrequencyTable`] from consecutive reports
#[derive(Debug, Clone, Default)]
pub struct ChangeDetector {
    previous: Vec<u8>,
    has_baseline: bool,
    reports_observed: u64,
    table: ChangeFrequencyTable,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next report.
    ///
    /// The first report only establishes the baseline. Every later report is
    /// XORed against its predecessor over the shorter of the two lengths.
    /// Reports longer than [`MAX_REPORT_LEN`] are rejected without touching
    /// the baseline or the counts.
    pub fn observe(&mut self, report: &[u8]) -> Result<(), MatrixError> {
        if report.len() > MAX_REPORT_LEN {
            return Err(MatrixError::ReportTooLong {
                len: report.len(),
                max: MAX_REPORT_LEN,
            });
        }
        self.reports_observed += 1;

        if self.has_baseline {
            let mut flips = 0usize;
            for change in changed_bits(&self.previous, report) {
                self.table.bump(change.coord);
                flips += 1;
            }
            if flips > 0 {
                debug!(
                    report = self.reports_observed,
                    flips, "Bit transitions observed"
                );
            }
        }

        self.previous.clear();
        self.previous.extend_from_slice(report);
        self.has_baseline = true;
        Ok(())
    }

    /// Feed a sequence of reports in order, stopping at the first rejected one
    pub fn observe_all<I, R>(&mut self, reports: I) -> Result<(), MatrixError>
    where
        I: IntoIterator<Item = R>,
        R: AsRef<[u8]>,
    {
        for report in reports {
            self.observe(report.as_ref())?;
        }
        Ok(())
    }

    /// Borrow the current table
    pub fn table(&self) -> &ChangeFrequencyTable {
        &self.table
    }

    /// Independent copy of the current table
    pub fn snapshot(&self) -> ChangeFrequencyTable {
        self.table.clone()
    }

    /// Number of reports fed so far, including the baseline
    pub fn reports_observed(&self) -> u64 {
        self.reports_observed
    }

    /// Consume the detector, returning the table
    pub fn into_table(self) -> ChangeFrequencyTable {
        self.table
    }

    /// Drop the baseline and all counts
    pub fn reset(&mut self) {
        self.previous.clear();
        self.has_baseline = false;
        self.reports_observed = 0;
        self.table = ChangeFrequencyTable::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(byte: u8, bit: u8) -> BitCoordinate {
        BitCoordinate { byte, bit }
    }

    #[test]
    fn test_first_report_is_baseline_only() {
        let mut detector = ChangeDetector::new();
        detector.observe(&[0xFF]).unwrap();
        assert!(detector.table().is_empty());
        assert_eq!(detector.reports_observed(), 1);
    }

    #[test]
    fn test_press_and_release_count_twice() {
        let mut detector = ChangeDetector::new();
        detector.observe_all([[0x00u8, 0x00], [0x01, 0x00], [0x01, 0x00], [0x00, 0x00]]).unwrap();

        let table = detector.snapshot();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(coord(0, 0)), 2);
        assert_eq!(table.total_transitions(), 2);
    }

    #[test]
    fn test_empty_report_compares_nothing() {
        let mut detector = ChangeDetector::new();
        detector.observe(&[0x01]).unwrap();
        detector.observe(&[]).unwrap();
        // Baseline is now the empty report, so nothing is compared here either
        detector.observe(&[0x00]).unwrap();
        assert!(detector.table().is_empty());
    }

    #[test]
    fn test_oversized_report_rejected() {
        let mut detector = ChangeDetector::new();
        let idle = [0u8; 300];
        let mut pressed = idle;
        pressed[280] = 0x01;

        let expected = Err(MatrixError::ReportTooLong { len: 300, max: MAX_REPORT_LEN });
        assert_eq!(detector.observe(&idle), expected);
        assert_eq!(detector.observe_all([idle, pressed]), expected);
        assert!(detector.table().is_empty());
        assert_eq!(detector.reports_observed(), 0);

        // a rejected report does not replace the baseline
        detector.observe(&[0x00]).unwrap();
        detector.observe(&pressed).unwrap_err();
        detector.observe(&[0x01]).unwrap();
        assert_eq!(detector.table().get(coord(0, 0)), 1);
    }

    #[test]
    fn test_last_byte_of_full_report_counted() {
        let mut detector = ChangeDetector::new();
        let idle = [0u8; MAX_REPORT_LEN];
        let mut pressed = idle;
        pressed[MAX_REPORT_LEN - 1] = 0x80;

        detector.observe_all([idle, pressed, idle]).unwrap();
        assert_eq!(detector.table().get(coord(63, 7)), 2);
    }

    #[test]
    fn test_snapshot_is_independent() {
        let mut detector = ChangeDetector::new();
        detector.observe_all([[0x00u8], [0x01]]).unwrap();
        let before = detector.snapshot();
        detector.observe(&[0x00]).unwrap();

        assert_eq!(before.get(coord(0, 0)), 1);
        assert_eq!(detector.table().get(coord(0, 0)), 2);
    }

    #[test]
    fn test_reset_clears_baseline() {
        let mut detector = ChangeDetector::new();
        detector.observe_all([[0x00u8], [0x01]]).unwrap();
        detector.reset();
        detector.observe(&[0x00]).unwrap();

        assert!(detector.table().is_empty());
        assert_eq!(detector.reports_observed(), 1);
    }

    #[test]
    fn test_ranked_ties_by_coordinate() {
        let table: ChangeFrequencyTable = [
            (coord(2, 0), 4),
            (coord(0, 5), 4),
            (coord(1, 1), 9),
            (coord(0, 1), 1),
        ]
        .into_iter()
        .collect();

        let order: Vec<_> = table.ranked().into_iter().map(|(c, _)| c).collect();
        assert_eq!(
            order,
            vec![coord(1, 1), coord(0, 5), coord(2, 0), coord(0, 1)]
        );
    }

    #[test]
    fn test_from_iter_drops_zero_counts() {
        let table: ChangeFrequencyTable = [(coord(0, 0), 0), (coord(0, 1), 3)]
            .into_iter()
            .collect();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(coord(0, 0)), 0);
    }
}
