//! C++ lookup table generation
//!
//! Renders lookup entries as a `KeyMapping` array for USB-host firmware,
//! followed by a `(row, col)` decode function. The struct layout is fixed
//! by the firmware side:
//!
//! ```text
//! struct KeyMapping { uint8_t byte_idx; uint8_t bit_mask; uint8_t row; uint8_t col; };
//! ```
//!
//! Output is deterministic for a given entry list and config, except for
//! the optional `Generated:` header line.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::assigner::MatrixShape;
use crate::error::MatrixError;
use crate::lookup::{validate_entries, LookupEntry};

/// Default name of the generated array
pub const DEFAULT_ARRAY_NAME: &str = "kb16_key_map";

/// What the generated decode function returns for a matrix cell
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeTarget {
    /// `uint8_t getHidKeyCode(row, col)` returning HID usages
    #[default]
    Keycode,
    /// `const char* getKeyLabel(row, col)` returning key names
    Label,
}

impl std::str::FromStr for DecodeTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keycode" | "hid" => Ok(DecodeTarget::Keycode),
            "label" | "name" => Ok(DecodeTarget::Label),
            _ => Err(format!("Unknown decode target: {s}. Use: keycode, label")),
        }
    }
}

/// Device identity matched by the generated report handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportHandler {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl Default for ReportHandler {
    fn default() -> Self {
        Self {
            vendor_id: 0xD010,
            product_id: 0x1601,
        }
    }
}

/// Emitter settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitterConfig {
    pub array_name: String,
    pub shape: MatrixShape,
    pub decode: DecodeTarget,
    /// Source file named in the header
    pub source: Option<String>,
    /// Generation time for the header; excluded from determinism
    pub generated_at: Option<String>,
    /// Append an `onKeyboard` handler walking the table
    pub handler: Option<ReportHandler>,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            array_name: DEFAULT_ARRAY_NAME.to_string(),
            shape: MatrixShape::KB16,
            decode: DecodeTarget::Keycode,
            source: None,
            generated_at: None,
            handler: None,
        }
    }
}

impl EmitterConfig {
    pub fn new(shape: MatrixShape) -> Self {
        Self {
            shape,
            ..Default::default()
        }
    }

    pub fn with_array_name(mut self, name: impl Into<String>) -> Self {
        self.array_name = name.into();
        self
    }

    pub fn with_decode(mut self, decode: DecodeTarget) -> Self {
        self.decode = decode;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_generated_at(mut self, timestamp: impl Into<String>) -> Self {
        self.generated_at = Some(timestamp.into());
        self
    }

    pub fn with_handler(mut self, handler: ReportHandler) -> Self {
        self.handler = Some(handler);
        self
    }
}

/// Render entries as C++ source.
///
/// Entries appear in the array in the order given. The array name and every
/// entry are validated first; nothing is rendered if any check fails.
pub fn render(entries: &[LookupEntry], config: &EmitterConfig) -> Result<String, MatrixError> {
    validate_identifier(&config.array_name)?;
    validate_entries(config.shape, entries)?;

    let mut out = String::new();
    render_header(&mut out, config);
    render_struct(&mut out);
    render_array(&mut out, entries, &config.array_name);
    match config.decode {
        DecodeTarget::Keycode => render_keycode_fn(&mut out, entries, config.shape),
        DecodeTarget::Label => render_label_fn(&mut out, entries, config.shape),
    }
    if let Some(handler) = config.handler {
        render_handler(&mut out, &config.array_name, handler);
    }

    debug!(
        entries = entries.len(),
        bytes = out.len(),
        array = %config.array_name,
        "Rendered lookup table"
    );
    Ok(out)
}

/// Check that `name` can be used as a C++ identifier
pub fn validate_identifier(name: &str) -> Result<(), MatrixError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(MatrixError::InvalidIdentifier(name.to_string()))
    }
}

fn line(out: &mut String, text: &str) {
    out.push_str(text);
    out.push('\n');
}

fn render_header(out: &mut String, config: &EmitterConfig) {
    line(out, "// DOIO KB16 key matrix mapping (generated)");
    if let Some(ts) = &config.generated_at {
        line(out, &format!("// Generated: {}", comment_text(ts)));
    }
    if let Some(source) = &config.source {
        line(out, &format!("// Source: {}", comment_text(source)));
    }
    line(out, "");
}

fn render_struct(out: &mut String) {
    line(out, "struct KeyMapping {");
    line(out, "    uint8_t byte_idx;  // byte index within the report");
    line(out, "    uint8_t bit_mask;  // bit mask (1 << bit)");
    line(out, "    uint8_t row;       // matrix row");
    line(out, "    uint8_t col;       // matrix column");
    line(out, "};");
    line(out, "");
}

/// Text safe to place after `//`; control characters would end the comment
fn comment_text(text: &str) -> String {
    text.chars()
        .map(|ch| if ch.is_control() { ' ' } else { ch })
        .collect()
}

fn entry_comment(entry: &LookupEntry) -> String {
    let name = comment_text(&entry.display_name());
    match entry.transitions {
        Some(count) => format!("{name}, transitions: {count}"),
        None => name,
    }
}

fn render_array(out: &mut String, entries: &[LookupEntry], array_name: &str) {
    line(out, &format!("const KeyMapping {array_name}[] = {{"));
    for entry in entries {
        line(
            out,
            &format!(
                "    {{ {}, 0x{:02X}, {}, {} }},  // {}",
                entry.byte_idx,
                entry.bit_mask,
                entry.row,
                entry.col,
                entry_comment(entry)
            ),
        );
    }
    line(out, "};");
    line(out, "");
}

/// Entries keyed by their switch case index, in ascending case order
fn cases(entries: &[LookupEntry], shape: MatrixShape) -> Vec<(usize, &LookupEntry)> {
    let mut cases: Vec<_> = entries
        .iter()
        .filter_map(|e| shape.index_of(e.position()).map(|index| (index, e)))
        .collect();
    cases.sort_by_key(|(index, _)| *index);
    cases
}

fn render_keycode_fn(out: &mut String, entries: &[LookupEntry], shape: MatrixShape) {
    line(out, "uint8_t getHidKeyCode(uint8_t row, uint8_t col) {");
    line(
        out,
        &format!(
            "    if (row >= {} || col >= {}) return 0;",
            shape.rows, shape.cols
        ),
    );
    line(out, "");
    line(out, &format!("    switch (row * {} + col) {{", shape.cols));
    for (index, entry) in cases(entries, shape) {
        if let Some(keycode) = entry.hid_keycode {
            line(
                out,
                &format!(
                    "        case {index}: return 0x{keycode:02X};  // {}",
                    comment_text(&entry.display_name())
                ),
            );
        }
    }
    line(out, "        default: return 0;");
    line(out, "    }");
    line(out, "}");
}

fn c_string_literal(text: &str) -> String {
    let mut literal = String::with_capacity(text.len() + 2);
    literal.push('"');
    for ch in text.chars() {
        match ch {
            '"' => literal.push_str("\\\""),
            '\\' => literal.push_str("\\\\"),
            '\n' => literal.push_str("\\n"),
            '\r' => literal.push_str("\\r"),
            '\t' => literal.push_str("\\t"),
            // octal stops after three digits, unlike \x
            c if c.is_control() => {
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).bytes() {
                    literal.push_str(&format!("\\{byte:03o}"));
                }
            }
            _ => literal.push(ch),
        }
    }
    literal.push('"');
    literal
}

fn render_label_fn(out: &mut String, entries: &[LookupEntry], shape: MatrixShape) {
    line(out, "const char* getKeyLabel(uint8_t row, uint8_t col) {");
    line(
        out,
        &format!(
            "    if (row >= {} || col >= {}) return nullptr;",
            shape.rows, shape.cols
        ),
    );
    line(out, "");
    line(out, &format!("    switch (row * {} + col) {{", shape.cols));
    for (index, entry) in cases(entries, shape) {
        line(
            out,
            &format!(
                "        case {index}: return {};",
                c_string_literal(&entry.display_name())
            ),
        );
    }
    line(out, "        default: return nullptr;");
    line(out, "    }");
    line(out, "}");
}

fn render_handler(out: &mut String, array_name: &str, handler: ReportHandler) {
    let text = format!(
        r#"
// Report handler for EspUsbHost::onKeyboard
void onKeyboard(hid_keyboard_report_t report, hid_keyboard_report_t last_report) {{
    if (device_vendor_id != 0x{vid:04X} || device_product_id != 0x{pid:04X}) return;

    const uint8_t* data = (const uint8_t*)&report;
    const uint8_t* last_data = (const uint8_t*)&last_report;

    for (size_t i = 0; i < sizeof({array}) / sizeof(KeyMapping); i++) {{
        const KeyMapping& mapping = {array}[i];
        if (mapping.byte_idx >= sizeof(report)) continue;

        bool current_state = data[mapping.byte_idx] & mapping.bit_mask;
        bool last_state = last_data[mapping.byte_idx] & mapping.bit_mask;
        if (current_state != last_state) {{
            ESP_LOGI("KB16", "key (%d,%d) %s", mapping.row, mapping.col,
                     current_state ? "pressed" : "released");
        }}
    }}
}}
"#,
        vid = handler.vendor_id,
        pid = handler.product_id,
        array = array_name,
    );
    out.push_str(&text);
}
