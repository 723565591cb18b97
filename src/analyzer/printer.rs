//! Output formatting for analysis results and live events

use std::fmt::Write as _;
use std::str::FromStr;

use kb16_matrix::{hex_string, KeyEvent, LookupEntry, ReportStats};
use serde::Serialize;

use super::AnalysisReport;

/// Output format for the analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" | "" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text, json", s)),
        }
    }
}

/// One changing bit in the JSON output
#[derive(Debug, Serialize)]
struct BitCount {
    byte: u8,
    bit: u8,
    transitions: u64,
}

/// Serializable form of an [`AnalysisReport`]
#[derive(Debug, Serialize)]
pub struct AnalysisSummary<'a> {
    stats: &'a ReportStats,
    degenerate: bool,
    rows: u8,
    cols: u8,
    changing_bits: Vec<BitCount>,
    key_mappings: &'a [LookupEntry],
}

impl<'a> From<&'a AnalysisReport> for AnalysisSummary<'a> {
    fn from(report: &'a AnalysisReport) -> Self {
        let shape = report.assignment.shape();
        Self {
            stats: &report.stats,
            degenerate: report.is_degenerate(),
            rows: shape.rows,
            cols: shape.cols,
            changing_bits: report
                .table
                .ranked()
                .into_iter()
                .map(|(coord, transitions)| BitCount {
                    byte: coord.byte,
                    bit: coord.bit,
                    transitions,
                })
                .collect(),
            key_mappings: report.key_map.entries(),
        }
    }
}

/// Output printer
pub struct Printer {
    format: OutputFormat,
}

impl Printer {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Render an analysis result
    pub fn render_analysis(&self, report: &AnalysisReport) -> Result<String, serde_json::Error> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&AnalysisSummary::from(report)),
            OutputFormat::Text => Ok(render_analysis_text(report)),
        }
    }

    pub fn print_analysis(&self, report: &AnalysisReport) -> Result<(), serde_json::Error> {
        println!("{}", self.render_analysis(report)?);
        Ok(())
    }

    /// Render the events decoded from one report; `None` for an empty batch
    pub fn render_events(
        &self,
        elapsed: f64,
        events: &[KeyEvent],
    ) -> Result<Option<String>, serde_json::Error> {
        if events.is_empty() {
            return Ok(None);
        }
        let text = match self.format {
            OutputFormat::Json => {
                #[derive(Serialize)]
                struct Batch<'a> {
                    timestamp: f64,
                    events: &'a [KeyEvent],
                }
                serde_json::to_string(&Batch {
                    timestamp: elapsed,
                    events,
                })?
            }
            OutputFormat::Text => events
                .iter()
                .map(|event| format!("{elapsed:10.3}  {}", describe_event(event)))
                .collect::<Vec<_>>()
                .join("\n"),
        };
        Ok(Some(text))
    }

    pub fn print_events(&self, elapsed: f64, events: &[KeyEvent]) -> Result<(), serde_json::Error> {
        if let Some(text) = self.render_events(elapsed, events)? {
            println!("{text}");
        }
        Ok(())
    }
}

fn describe_event(event: &KeyEvent) -> String {
    match event {
        KeyEvent::KeyPressed { key } => format!("key {key:>2} pressed"),
        KeyEvent::KeyReleased { key } => format!("key {key:>2} released"),
        KeyEvent::EncoderRotated {
            encoder,
            raw,
            percent,
        } => format!("knob {encoder} -> {percent:>3}% (raw {raw})"),
        KeyEvent::EncoderButtonPressed { encoder } => format!("knob {encoder} button pressed"),
        KeyEvent::EncoderButtonReleased { encoder } => format!("knob {encoder} button released"),
    }
}

fn render_analysis_text(report: &AnalysisReport) -> String {
    let mut out = String::new();
    let stats = &report.stats;

    // Writing into a String never fails
    let _ = writeln!(
        out,
        "Reports: {} ({} unique)",
        stats.total_reports, stats.unique_patterns
    );
    let lengths: Vec<String> = stats
        .length_distribution
        .iter()
        .map(|(len, count)| format!("{len} bytes x{count}"))
        .collect();
    let _ = writeln!(out, "Lengths: {}", lengths.join(", "));

    if !stats.top_patterns.is_empty() {
        let _ = writeln!(out, "\nMost frequent reports:");
        for pattern in &stats.top_patterns {
            let _ = writeln!(
                out,
                "  {:5.1}% {:>6}  {}",
                pattern.percentage,
                pattern.count,
                hex_string(&pattern.data)
            );
        }
    }

    if report.is_degenerate() {
        let _ = writeln!(
            out,
            "\nNo bit changes detected. Press each key a few times while capturing."
        );
        return out;
    }

    let _ = writeln!(out, "\nChanging bits ({}):", report.table.len());
    for (coord, count) in report.table.ranked() {
        let placed = report
            .assignment
            .get(coord)
            .map(|pos| pos.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(out, "  {:<14} {:>6}  {}", coord.to_string(), count, placed);
    }

    let shape = report.assignment.shape();
    let _ = writeln!(out, "\nMatrix ({shape}):");
    for (row, cells) in report.assignment.to_grid().iter().enumerate() {
        let cells: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(col, cell)| {
                let pos = kb16_matrix::MatrixPosition::new(row as u8, col as u8);
                let name = report
                    .key_map
                    .get(pos)
                    .and_then(|e| e.key_name.clone())
                    .map(|n| format!("{n}="))
                    .unwrap_or_default();
                match cell {
                    Some(coord) => format!("{name}{coord}"),
                    None => "--".to_string(),
                }
            })
            .map(|cell| format!("{cell:<18}"))
            .collect();
        let _ = writeln!(out, "  {}", cells.join("").trim_end());
    }

    if report.unassigned_cells() > 0 {
        let _ = writeln!(
            out,
            "\n{} cell(s) left unassigned",
            report.unassigned_cells()
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::AnalysisSession;
    use kb16_matrix::{MatrixShape, ReportArena};

    fn sample_report() -> AnalysisReport {
        let mut arena = ReportArena::new();
        for data in [[0u8, 0x00], [0, 0x20], [0, 0x00], [0, 0x40], [0, 0x00]] {
            arena.push(&data).unwrap();
        }
        AnalysisSession::new(MatrixShape::new(1, 2).unwrap())
            .analyze(&arena)
            .unwrap()
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("text".parse::<OutputFormat>(), Ok(OutputFormat::Text));
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_text_output() {
        let text = Printer::new(OutputFormat::Text)
            .render_analysis(&sample_report())
            .unwrap();
        assert!(text.contains("Reports: 5 (3 unique)"));
        assert!(text.contains("Changing bits (2):"));
        assert!(text.contains("byte1_bit5"));
        assert!(text.contains("Matrix (1x2):"));
        assert!(!text.contains("unassigned"));
    }

    #[test]
    fn test_json_output() {
        let json = Printer::new(OutputFormat::Json)
            .render_analysis(&sample_report())
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["degenerate"], false);
        assert_eq!(value["changing_bits"][0]["byte"], 1);
        assert_eq!(value["changing_bits"][0]["bit"], 5);
        assert_eq!(value["key_mappings"][1]["bit_mask"], 0x40);
        assert_eq!(value["stats"]["total_reports"], 5);
    }

    #[test]
    fn test_events() {
        let printer = Printer::new(OutputFormat::Json);
        assert_eq!(printer.render_events(0.0, &[]).unwrap(), None);
        let line = printer
            .render_events(1.5, &[KeyEvent::KeyPressed { key: 3 }])
            .unwrap()
            .unwrap();
        assert!(line.contains("\"event\":\"key_pressed\""));
        assert!(line.contains("\"key\":3"));

        let text = Printer::new(OutputFormat::Text)
            .render_events(
                2.0,
                &[KeyEvent::EncoderRotated {
                    encoder: 1,
                    raw: 255,
                    percent: 100,
                }],
            )
            .unwrap()
            .unwrap();
        assert!(text.ends_with("knob 1 -> 100% (raw 255)"));
    }
}
