//! Bit-change matrix inference for DOIO KB16 HID reports
//!
//! The KB16 reports key state as a vendor-specific bitmap rather than a
//! boot-protocol keyboard report. This crate recovers the bitmap layout from
//! a capture and turns it into firmware lookup tables:
//!
//! - [`ChangeDetector`] counts per-bit transitions between adjacent reports
//! - [`MatrixAssigner`] ranks those bits and places them on the key grid
//! - [`emitter::render`] writes the result as a C++ `KeyMapping` table
//! - [`LiveDecoder`] turns reports into key and encoder events once the
//!   layout is known
//!
//! No I/O happens here; device access lives in `kb16-transport`.

pub mod assigner;
pub mod bits;
pub mod decoder;
pub mod detector;
pub mod emitter;
pub mod error;
pub mod keycodes;
pub mod lookup;
pub mod report;
pub mod stats;

pub use assigner::{KeyAssignment, MatrixAssigner, MatrixPosition, MatrixShape};
pub use bits::{changed_bits, BitChange, BitCoordinate};
pub use decoder::{
    normalize_encoder, DecoderLayout, EncoderBinding, EventSink, KeyEvent, KeyStateSnapshot,
    LiveDecoder,
};
pub use detector::{ChangeDetector, ChangeFrequencyTable};
pub use emitter::{DecodeTarget, EmitterConfig, ReportHandler};
pub use error::MatrixError;
pub use keycodes::{keycode_for_name, PhysicalLayout};
pub use lookup::{entries_from_assignment, validate_entries, KeyMap, LookupEntry};
pub use report::{hex_string, Report, ReportArena, ReportId, MAX_REPORT_LEN};
pub use stats::{PatternCount, ReportStats};
