//! Live decoding command.

use std::path::Path;

use anyhow::Context;
use kb16_matrix::{DecoderLayout, KeyEvent, LiveDecoder};
use kb16_tools::analyzer::{OutputFormat, Printer};
use kb16_tools::{Config, MappingFile, PanelMapping};
use tracing::info;

use super::{open_reader, shutdown_reader, stream_reports, CommandResult};
use crate::cli::DeviceArgs;

/// Decoder layout from a mapping file, keeping the stock encoder bindings
fn load_layout(config: &Config, path: &Path) -> anyhow::Result<DecoderLayout> {
    let shape = config.shape()?;
    let mapping = MappingFile::load(path)?;
    let stock = DecoderLayout::kb16_default();
    let layout = DecoderLayout::from_entries(shape, &mapping.key_mappings)
        .with_context(|| format!("Invalid mapping in {}", path.display()))?;
    Ok(stock
        .encoders()
        .iter()
        .fold(layout, |layout, binding| layout.with_encoder(*binding)))
}

pub async fn run(
    config: &Config,
    device: &DeviceArgs,
    layout: Option<&Path>,
    panel: Option<&Path>,
    format: OutputFormat,
    duration: Option<f64>,
) -> CommandResult {
    let layout = match layout {
        Some(path) => load_layout(config, path)?,
        None => DecoderLayout::kb16_default(),
    };
    let panel = match panel {
        Some(path) => PanelMapping::load(path)?,
        None => PanelMapping::default(),
    };
    info!(
        keys = layout.keys().len(),
        encoders = layout.encoders().len(),
        "Decoder layout ready"
    );

    let (reader, mut rx, info) = open_reader(config, device)?;
    eprintln!("Monitoring {}. Press Ctrl+C to stop.", info.label());

    let printer = Printer::new(format);
    let mut decoder = LiveDecoder::new(layout);
    let end = stream_reports(&mut rx, duration, |report| {
        let mut batch: Vec<KeyEvent> = Vec::new();
        decoder.process(&report.report, &mut batch);
        let remapped: Vec<KeyEvent> = batch.into_iter().map(|e| panel.remap(e)).collect();
        printer.print_events(report.elapsed, &remapped)?;
        Ok(())
    })
    .await;
    shutdown_reader(reader, rx);
    let end = end?;

    let pressed = decoder.snapshot().pressed_keys();
    info!(?end, ?pressed, "Monitor stopped");
    Ok(())
}
