//! End-to-end tests: capture file → analysis → mapping file → generated
//! table and live decoding, without a device.

use std::fs;

use kb16_matrix::{
    emitter, DecoderLayout, EmitterConfig, KeyEvent, LiveDecoder, MatrixPosition, MatrixShape,
    PhysicalLayout,
};
use kb16_tools::analyzer::{AnalysisSession, OutputFormat, Printer};
use kb16_tools::{load_reports, CaptureFile, CapturedReport, MappingFile};
use tempfile::TempDir;

/// Eight-byte reports where key 1 is byte 5 bit 5 and key 2 byte 5 bit 6
fn calibration_capture() -> CaptureFile {
    let idle = [0u8; 8];
    let mut key1 = idle;
    key1[5] = 0x20;
    let mut key2 = idle;
    key2[5] = 0x40;

    let sequence = [idle, key1, idle, key1, idle, key2, idle];
    CaptureFile {
        reports: sequence
            .iter()
            .map(|r| CapturedReport::new(r.to_vec()))
            .collect(),
        ..Default::default()
    }
}

// ── Analysis ──

#[test]
fn capture_file_to_generated_table() {
    let dir = TempDir::new().unwrap();
    let capture_path = dir.path().join("kb16.json");
    calibration_capture().save(&capture_path).unwrap();

    let reports = load_reports(&capture_path).unwrap();
    let report = AnalysisSession::new(MatrixShape::KB16)
        .with_layout(PhysicalLayout::kb16())
        .analyze(&reports)
        .unwrap();
    assert!(!report.is_degenerate());
    assert_eq!(report.assignment.len(), 2);
    assert_eq!(report.unassigned_cells(), 14);

    let code = emitter::render(
        report.key_map.entries(),
        &EmitterConfig::new(MatrixShape::KB16).with_source("kb16.json"),
    )
    .unwrap();
    assert!(code.contains("// Source: kb16.json"));
    assert!(code.contains("    { 5, 0x20, 0, 0 },  // 1, transitions: 4\n"));
    assert!(code.contains("    { 5, 0x40, 0, 1 },  // 2, transitions: 2\n"));
    assert!(code.contains("        case 0: return 0x1E;  // 1\n"));
    assert!(code.contains("        case 1: return 0x1F;  // 2\n"));
}

#[test]
fn csv_and_json_captures_agree() {
    let dir = TempDir::new().unwrap();
    let json = dir.path().join("kb16.json");
    let csv = dir.path().join("kb16.csv");
    calibration_capture().save(&json).unwrap();
    calibration_capture().save(&csv).unwrap();

    let session = AnalysisSession::new(MatrixShape::KB16);
    let from_json = session.analyze(&load_reports(&json).unwrap()).unwrap();
    let from_csv = session.analyze(&load_reports(&csv).unwrap()).unwrap();
    assert_eq!(from_json.table, from_csv.table);
    assert_eq!(from_json.key_map, from_csv.key_map);
}

#[test]
fn idle_capture_is_degenerate() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("idle.json");
    let capture = CaptureFile {
        reports: vec![CapturedReport::new(vec![0; 8]); 5],
        ..Default::default()
    };
    capture.save(&path).unwrap();

    let report = AnalysisSession::new(MatrixShape::KB16)
        .analyze(&load_reports(&path).unwrap())
        .unwrap();
    assert!(report.is_degenerate());

    let text = Printer::new(OutputFormat::Text)
        .render_analysis(&report)
        .unwrap();
    assert!(text.contains("No bit changes detected"));
}

// ── Mapping files ──

#[test]
fn saved_mapping_drives_decoder() {
    let dir = TempDir::new().unwrap();
    let capture_path = dir.path().join("kb16.json");
    let mapping_path = dir.path().join("mapping.json");
    calibration_capture().save(&capture_path).unwrap();

    let report = AnalysisSession::new(MatrixShape::KB16)
        .with_layout(PhysicalLayout::kb16())
        .analyze(&load_reports(&capture_path).unwrap())
        .unwrap();
    MappingFile::from_key_map(&report.key_map, Some(&PhysicalLayout::kb16()))
        .save(&mapping_path)
        .unwrap();

    let text = fs::read_to_string(&mapping_path).unwrap();
    assert!(text.contains("\"bit_mask\": 32"));

    let mapping = MappingFile::load(&mapping_path).unwrap();
    let key_map = mapping.to_key_map(MatrixShape::KB16).unwrap();
    assert_eq!(key_map, report.key_map);

    let layout = DecoderLayout::from_entries(MatrixShape::KB16, key_map.entries()).unwrap();
    let mut decoder = LiveDecoder::new(layout);
    let mut pressed = [0u8; 8];
    pressed[5] = 0x40;
    assert_eq!(
        decoder.decode(&pressed),
        vec![KeyEvent::KeyPressed { key: 2 }]
    );
    assert_eq!(decoder.snapshot().pressed_keys(), vec![2]);
}

#[test]
fn adjusted_mapping_renders_new_position() {
    let dir = TempDir::new().unwrap();
    let capture_path = dir.path().join("kb16.json");
    calibration_capture().save(&capture_path).unwrap();

    let report = AnalysisSession::new(MatrixShape::KB16)
        .analyze(&load_reports(&capture_path).unwrap())
        .unwrap();
    let mut key_map = report.key_map.clone();

    // key 2's bit really belongs to the Esc cell
    let esc = MatrixPosition::new(2, 3);
    let displaced = key_map
        .set(esc, kb16_matrix::BitCoordinate::new(5, 6).unwrap(), Some("Esc".into()))
        .unwrap();
    assert_eq!(displaced, Some(MatrixPosition::new(0, 1)));
    key_map.apply_layout(&PhysicalLayout::kb16());

    let code = emitter::render(
        key_map.sorted_by_position().entries(),
        &EmitterConfig::new(MatrixShape::KB16),
    )
    .unwrap();
    assert!(code.contains("    { 5, 0x40, 2, 3 },  // Esc\n"));
    assert!(code.contains("        case 11: return 0x29;  // Esc\n"));
}
