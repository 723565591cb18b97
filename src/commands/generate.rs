//! Lookup table generation command.

use std::path::Path;

use anyhow::Context;
use kb16_matrix::{emitter, DecodeTarget, KeyMap, ReportHandler};
use kb16_tools::mapping::is_mapping_json;
use kb16_tools::{Config, MappingFile};
use tracing::info;

use super::analyze::analyze_capture;
use super::{display_name, resolve_shape, CommandResult};
use crate::cli::GridArgs;

#[allow(clippy::too_many_arguments)]
pub fn run(
    config: &Config,
    file: &Path,
    output: Option<&Path>,
    grid: GridArgs,
    min_transitions: Option<u64>,
    array_name: Option<String>,
    decode: Option<DecodeTarget>,
    handler: bool,
) -> CommandResult {
    let shape = resolve_shape(config, grid)?;
    let layout = config.physical_layout();

    let key_map = if is_mapping_file(file)? {
        let mapping = MappingFile::load(file)?;
        let mut key_map: KeyMap = mapping
            .to_key_map(shape)
            .with_context(|| format!("Invalid mapping in {}", file.display()))?;
        match mapping.layout() {
            Some(own) if own.shape() == shape => key_map.apply_layout(&own),
            _ if layout.shape() == shape => key_map.apply_layout(&layout),
            _ => {}
        }
        key_map
    } else {
        let report = analyze_capture(config, file, shape, min_transitions, 0)?;
        if report.is_degenerate() {
            eprintln!("Warning: no bit changes in capture; the table will be empty.");
        }
        report.key_map
    };

    let mut emitter_config = config
        .emitter_config(shape)
        .with_source(display_name(file))
        .with_generated_at(chrono::Local::now().to_rfc3339());
    if let Some(name) = array_name {
        emitter_config = emitter_config.with_array_name(name);
    }
    if let Some(decode) = decode {
        emitter_config = emitter_config.with_decode(decode);
    }
    if handler {
        emitter_config = emitter_config.with_handler(ReportHandler {
            vendor_id: config.device.vendor_id,
            product_id: config.device.product_id,
        });
    }

    let source = emitter::render(key_map.entries(), &emitter_config)?;
    match output {
        Some(path) => {
            std::fs::write(path, &source)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(entries = key_map.len(), path = %path.display(), "Generated lookup table");
            eprintln!("Wrote {} entries to {}", key_map.len(), path.display());
        }
        None => print!("{source}"),
    }
    Ok(())
}

/// A JSON file with `key_mappings` is a mapping; anything else a capture
fn is_mapping_file(path: &Path) -> anyhow::Result<bool> {
    if path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
    {
        return Ok(false);
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(is_mapping_json(&text))
}
