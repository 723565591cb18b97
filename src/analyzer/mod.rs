//! Offline analysis of captured KB16 reports
//!
//! Runs the full inference pipeline over a capture: report statistics,
//! change detection, matrix assignment and lookup entries ready for the
//! emitter.
//!
//! # Example
//!
//! ```ignore
//! use kb16_tools::analyzer::{AnalysisSession, OutputFormat, Printer};
//!
//! let reports = kb16_tools::capture::load_reports(path)?;
//! let report = AnalysisSession::new(MatrixShape::KB16).analyze(&reports)?;
//! Printer::new(OutputFormat::Text).print_analysis(&report);
//! ```

mod printer;

pub use printer::{AnalysisSummary, OutputFormat, Printer};

use kb16_matrix::{
    ChangeDetector, ChangeFrequencyTable, KeyAssignment, KeyMap, MatrixAssigner, MatrixError,
    MatrixShape, PhysicalLayout, ReportArena, ReportStats,
};
use tracing::{info, warn};

/// Default number of frequent patterns kept in the statistics
pub const DEFAULT_TOP_PATTERNS: usize = 10;

/// Settings for one analysis run
#[derive(Debug, Clone)]
pub struct AnalysisSession {
    assigner: MatrixAssigner,
    top_patterns: usize,
    layout: Option<PhysicalLayout>,
}

impl AnalysisSession {
    pub fn new(shape: MatrixShape) -> Self {
        Self {
            assigner: MatrixAssigner::new(shape),
            top_patterns: DEFAULT_TOP_PATTERNS,
            layout: None,
        }
    }

    /// Ignore bits with fewer transitions than `min`
    pub fn with_min_transitions(mut self, min: u64) -> Self {
        self.assigner = self.assigner.with_min_transitions(min);
        self
    }

    pub fn with_top_patterns(mut self, top: usize) -> Self {
        self.top_patterns = top;
        self
    }

    /// Label the resulting entries from a physical layout
    pub fn with_layout(mut self, layout: PhysicalLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn shape(&self) -> MatrixShape {
        self.assigner.shape()
    }

    /// Run the pipeline over every report in capture order
    pub fn analyze(&self, reports: &ReportArena) -> Result<AnalysisReport, MatrixError> {
        let stats = ReportStats::compute(reports.iter(), self.top_patterns);

        let mut detector = ChangeDetector::new();
        detector.observe_all(reports.iter())?;
        let table = detector.into_table();

        let assignment = self.assigner.assign(&table);
        let mut key_map = KeyMap::from_assignment(&assignment, Some(&table));
        if let Some(layout) = &self.layout {
            key_map.apply_layout(layout);
        }

        let report = AnalysisReport {
            stats,
            table,
            assignment,
            key_map,
        };

        if report.is_degenerate() {
            warn!(
                reports = reports.len(),
                "No bit transitions found; the capture needs key presses"
            );
        } else {
            info!(
                reports = reports.len(),
                changing_bits = report.table.len(),
                assigned = report.assignment.len(),
                unassigned = report.unassigned_cells(),
                "Analysis complete"
            );
        }
        Ok(report)
    }
}

/// Everything an analysis run produced
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub stats: ReportStats,
    pub table: ChangeFrequencyTable,
    pub assignment: KeyAssignment,
    /// Lookup entries in row-major order, with transition counts
    pub key_map: KeyMap,
}

impl AnalysisReport {
    /// No bit ever changed, so nothing could be assigned
    pub fn is_degenerate(&self) -> bool {
        self.table.is_empty()
    }

    /// Matrix cells left without a bit
    pub fn unassigned_cells(&self) -> usize {
        self.assignment.shape().cells() - self.assignment.len()
    }
}
