// CLI definitions using clap

use clap::{Parser, Subcommand};
use kb16_matrix::{DecodeTarget, MatrixPosition};
use kb16_tools::OutputFormat;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kb16")]
#[command(author, version, about = "DOIO KB16 HID report capture and matrix inference")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Log level (error, warn, info, debug, trace); RUST_LOG overrides
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Config file path (default: ~/.config/kb16/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Device selection shared by commands that open the keypad
#[derive(clap::Args, Debug, Clone, Default)]
pub struct DeviceArgs {
    /// Vendor ID in hex (default from config: D010)
    #[arg(long, value_parser = parse_hex_u16)]
    pub vid: Option<u16>,

    /// Product ID in hex (default from config: 1601)
    #[arg(long, value_parser = parse_hex_u16)]
    pub pid: Option<u16>,

    /// HID interface number (default: vendor usage page, then lowest)
    #[arg(long)]
    pub interface: Option<i32>,
}

/// Grid dimensions, overriding the config
#[derive(clap::Args, Debug, Clone, Copy, Default)]
pub struct GridArgs {
    /// Matrix rows
    #[arg(long)]
    pub rows: Option<u8>,

    /// Matrix columns
    #[arg(long)]
    pub cols: Option<u8>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List HID devices, marking known KB16 identities
    #[command(visible_aliases = ["ls", "l"])]
    List {
        /// Show every HID interface, not only KB16 ones
        #[arg(short, long)]
        all: bool,
    },

    /// Record raw input reports to a JSON or CSV file
    #[command(visible_aliases = ["cap", "c"])]
    Capture {
        #[command(flatten)]
        device: DeviceArgs,

        /// Stop after this many seconds (default: until Ctrl+C)
        #[arg(short, long)]
        duration: Option<f64>,

        /// Output file; `.csv` selects CSV, anything else JSON
        #[arg(short, long)]
        output: PathBuf,

        /// Do not echo reports while recording
        #[arg(short, long)]
        quiet: bool,
    },

    /// Infer the key matrix from a capture
    #[command(visible_aliases = ["an", "a"])]
    Analyze {
        /// Capture file (JSON or CSV)
        file: PathBuf,

        #[command(flatten)]
        grid: GridArgs,

        /// Ignore bits with fewer transitions
        #[arg(long)]
        min_transitions: Option<u64>,

        /// Number of frequent report patterns to show
        #[arg(long, default_value = "10")]
        top: usize,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// Also save the inferred mapping to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate the C++ lookup table from a capture or mapping file
    #[command(visible_aliases = ["gen", "g"])]
    Generate {
        /// Capture file, or a mapping file with `key_mappings`
        file: PathBuf,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        grid: GridArgs,

        /// Ignore bits with fewer transitions (captures only)
        #[arg(long)]
        min_transitions: Option<u64>,

        /// Name of the generated array
        #[arg(long)]
        array_name: Option<String>,

        /// Decode function to emit (keycode, label)
        #[arg(long)]
        decode: Option<DecodeTarget>,

        /// Append an onKeyboard report handler
        #[arg(long)]
        handler: bool,
    },

    /// Decode live reports into key and knob events
    #[command(visible_aliases = ["mon", "m"])]
    Monitor {
        #[command(flatten)]
        device: DeviceArgs,

        /// Mapping file to decode keys with (default: built-in KB16 layout)
        #[arg(long)]
        layout: Option<PathBuf>,

        /// Panel mapping file renumbering keys and knobs
        #[arg(long)]
        panel: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// Stop after this many seconds (default: until Ctrl+C)
        #[arg(short, long)]
        duration: Option<f64>,
    },

    /// Show which bits differ between an idle and a pressed report
    #[command(visible_alias = "d")]
    Diff {
        /// Idle report, hex bytes (e.g. "00 00 20")
        base: String,

        /// Report with one key held
        pressed: String,
    },

    /// Edit one cell of a mapping file
    #[command(visible_alias = "adj")]
    Adjust {
        /// Mapping file to edit
        mapping: PathBuf,

        /// Matrix cell as ROW,COL
        #[arg(long, value_parser = parse_position)]
        position: MatrixPosition,

        /// Report byte index
        #[arg(long, required_unless_present = "remove")]
        byte: Option<u8>,

        /// Bit index within the byte (0-7)
        #[arg(long, required_unless_present = "remove", value_parser = clap::value_parser!(u8).range(0..8))]
        bit: Option<u8>,

        /// Key label for the cell
        #[arg(long)]
        label: Option<String>,

        /// Remove the cell's entry instead of setting it
        #[arg(long, conflicts_with_all = ["byte", "bit", "label"])]
        remove: bool,

        #[command(flatten)]
        grid: GridArgs,

        /// Write here instead of editing in place
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Parse a hex ID, with or without `0x`
pub fn parse_hex_u16(s: &str) -> Result<u16, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u16::from_str_radix(digits, 16).map_err(|e| format!("Invalid hex ID '{}': {}", s, e))
}

/// Parse `ROW,COL`
pub fn parse_position(s: &str) -> Result<MatrixPosition, String> {
    let (row, col) = s
        .split_once(',')
        .ok_or_else(|| format!("Expected ROW,COL, got '{s}'"))?;
    let row = row
        .trim()
        .parse::<u8>()
        .map_err(|e| format!("Invalid row '{row}': {e}"))?;
    let col = col
        .trim()
        .parse::<u8>()
        .map_err(|e| format!("Invalid column '{col}': {e}"))?;
    Ok(MatrixPosition::new(row, col))
}
