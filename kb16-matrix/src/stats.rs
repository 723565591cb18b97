//! Report sequence statistics

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

/// A distinct report and how often it occurred
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternCount {
    pub data: Vec<u8>,
    pub count: usize,
    /// Share of all reports, 0-100
    pub percentage: f64,
}

/// Summary of a report sequence
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportStats {
    pub total_reports: usize,
    /// Report length -> number of reports with that length
    pub length_distribution: BTreeMap<usize, usize>,
    /// Number of distinct report contents
    pub unique_patterns: usize,
    /// Most frequent reports, most common first
    pub top_patterns: Vec<PatternCount>,
}

impl ReportStats {
    /// Compute statistics, keeping the `top` most frequent patterns.
    ///
    /// Patterns with equal counts are ordered by their bytes so the result
    /// is stable.
    pub fn compute<I, R>(reports: I, top: usize) -> Self
    where
        I: IntoIterator<Item = R>,
        R: AsRef<[u8]>,
    {
        let mut total_reports = 0usize;
        let mut length_distribution = BTreeMap::new();
        let mut patterns: HashMap<Vec<u8>, usize> = HashMap::new();

        for report in reports {
            let report = report.as_ref();
            total_reports += 1;
            *length_distribution.entry(report.len()).or_insert(0) += 1;
            match patterns.get_mut(report) {
                Some(count) => *count += 1,
                None => {
                    patterns.insert(report.to_vec(), 1);
                }
            }
        }

        let unique_patterns = patterns.len();
        let mut ranked: Vec<_> = patterns.into_iter().collect();
        ranked.sort_by(|(a_data, a_count), (b_data, b_count)| {
            b_count.cmp(a_count).then_with(|| a_data.cmp(b_data))
        });

        let top_patterns = ranked
            .into_iter()
            .take(top)
            .map(|(data, count)| PatternCount {
                percentage: count as f64 * 100.0 / total_reports as f64,
                data,
                count,
            })
            .collect();

        Self {
            total_reports,
            length_distribution,
            unique_patterns,
            top_patterns,
        }
    }

    /// Most common report length, if any reports were seen
    pub fn dominant_length(&self) -> Option<usize> {
        self.length_distribution
            .iter()
            .max_by(|(a_len, a), (b_len, b)| a.cmp(b).then(b_len.cmp(a_len)))
            .map(|(len, _)| *len)
    }
}
