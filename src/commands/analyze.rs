//! Offline analysis command.

use std::path::Path;

use anyhow::Context;
use kb16_matrix::MatrixShape;
use kb16_tools::analyzer::{AnalysisReport, AnalysisSession, OutputFormat, Printer};
use kb16_tools::{load_reports, Config, MappingFile};

use super::{resolve_shape, CommandResult};
use crate::cli::GridArgs;

/// Run the inference pipeline over a capture file
pub fn analyze_capture(
    config: &Config,
    file: &Path,
    shape: MatrixShape,
    min_transitions: Option<u64>,
    top: usize,
) -> anyhow::Result<AnalysisReport> {
    let reports =
        load_reports(file).with_context(|| format!("Failed to load {}", file.display()))?;
    let mut session = AnalysisSession::new(shape)
        .with_min_transitions(min_transitions.unwrap_or(config.matrix.min_transitions))
        .with_top_patterns(top);
    let layout = config.physical_layout();
    if layout.shape() == shape {
        session = session.with_layout(layout);
    }
    session
        .analyze(&reports)
        .with_context(|| format!("Failed to analyze {}", file.display()))
}

pub fn run(
    config: &Config,
    file: &Path,
    grid: GridArgs,
    min_transitions: Option<u64>,
    top: usize,
    format: OutputFormat,
    output: Option<&Path>,
) -> CommandResult {
    let shape = resolve_shape(config, grid)?;
    let report = analyze_capture(config, file, shape, min_transitions, top)?;
    Printer::new(format).print_analysis(&report)?;

    if let Some(path) = output {
        let layout = config.physical_layout();
        let mapping = MappingFile::from_key_map(&report.key_map, Some(&layout));
        mapping.save(path)?;
        eprintln!(
            "Saved {} mappings to {}",
            mapping.key_mappings.len(),
            path.display()
        );
    }
    Ok(())
}
