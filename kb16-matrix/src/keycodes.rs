//! HID keyboard usage codes and the default KB16 labelling

use crate::assigner::{MatrixPosition, MatrixShape};

/// Labels printed on the KB16 keycaps, row-major
pub const KB16_LABELS: [[&str; 4]; 4] = [
    ["1", "2", "3", "4"],
    ["5", "6", "7", "8"],
    ["9", "0", "Enter", "Esc"],
    ["Backspace", "Tab", "Space", "Alt"],
];

/// Convert a character to HID keycode
/// Returns (keycode, needs_shift) or None if unsupported
pub fn char_to_hid(ch: char) -> Option<(u8, bool)> {
    match ch {
        'a'..='z' => Some((0x04 + (ch as u8 - b'a'), false)),
        'A'..='Z' => Some((0x04 + (ch as u8 - b'A'), true)),
        '1'..='9' => Some((0x1E + (ch as u8 - b'1'), false)),
        '0' => Some((0x27, false)),
        ' ' => Some((0x2C, false)),
        '-' => Some((0x2D, false)),
        '=' => Some((0x2E, false)),
        '[' => Some((0x2F, false)),
        ']' => Some((0x30, false)),
        '\\' => Some((0x31, false)),
        ';' => Some((0x33, false)),
        '\'' => Some((0x34, false)),
        '`' => Some((0x35, false)),
        ',' => Some((0x36, false)),
        '.' => Some((0x37, false)),
        '/' => Some((0x38, false)),
        '\n' => Some((0x28, false)),
        '\t' => Some((0x2B, false)),
        _ => None,
    }
}

/// Look up the HID usage for a key name.
///
/// Accepts single characters (`"a"`, `"7"`) and names such as `"Enter"`,
/// `"Esc"`, `"F5"` or `"LeftCtrl"`, case-insensitively. `"Alt"` resolves to
/// Right Alt, which is what the stock KB16 sends.
pub fn keycode_for_name(name: &str) -> Option<u8> {
    let mut chars = name.chars();
    if let (Some(ch), None) = (chars.next(), chars.next()) {
        if let Some((code, _)) = char_to_hid(ch.to_ascii_lowercase()) {
            return Some(code);
        }
    }

    let lower = name.to_ascii_lowercase();
    if let Some(n) = lower.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
        return match n {
            1..=12 => Some(0x3A + n - 1),
            13..=24 => Some(0x68 + n - 13),
            _ => None,
        };
    }

    let code = match lower.as_str() {
        "enter" | "return" => 0x28,
        "esc" | "escape" => 0x29,
        "backspace" | "bksp" => 0x2A,
        "tab" => 0x2B,
        "space" => 0x2C,
        "capslock" => 0x39,
        "printscreen" => 0x46,
        "scrolllock" => 0x47,
        "pause" => 0x48,
        "insert" | "ins" => 0x49,
        "home" => 0x4A,
        "pageup" | "pgup" => 0x4B,
        "delete" | "del" => 0x4C,
        "end" => 0x4D,
        "pagedown" | "pgdn" => 0x4E,
        "right" => 0x4F,
        "left" => 0x50,
        "down" => 0x51,
        "up" => 0x52,
        "numlock" => 0x53,
        "menu" | "app" => 0x65,
        "leftctrl" | "lctrl" | "ctrl" => 0xE0,
        "leftshift" | "lshift" | "shift" => 0xE1,
        "leftalt" | "lalt" => 0xE2,
        "leftgui" | "lgui" | "gui" | "win" => 0xE3,
        "rightctrl" | "rctrl" => 0xE4,
        "rightshift" | "rshift" => 0xE5,
        "rightalt" | "ralt" | "alt" => 0xE6,
        "rightgui" | "rgui" => 0xE7,
        _ => return None,
    };
    Some(code)
}

/// Physical key labels for a matrix, with HID usages derived from them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalLayout {
    shape: MatrixShape,
    labels: Vec<Vec<String>>,
}

impl PhysicalLayout {
    /// The stock KB16 keycap labels
    pub fn kb16() -> Self {
        Self {
            shape: MatrixShape::KB16,
            labels: KB16_LABELS
                .iter()
                .map(|row| row.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    /// Build a layout from row-major labels. Ragged rows are allowed;
    /// the shape is taken from the row count and the longest row.
    pub fn from_labels(labels: Vec<Vec<String>>) -> Option<Self> {
        let rows = u8::try_from(labels.len()).ok()?;
        let cols = u8::try_from(labels.iter().map(Vec::len).max().unwrap_or(0)).ok()?;
        let shape = MatrixShape::new(rows, cols).ok()?;
        Some(Self { shape, labels })
    }

    pub fn shape(&self) -> MatrixShape {
        self.shape
    }

    /// Label at a position
    pub fn label(&self, pos: MatrixPosition) -> Option<&str> {
        self.labels
            .get(pos.row as usize)
            .and_then(|row| row.get(pos.col as usize))
            .map(String::as_str)
    }

    /// HID usage for the key at a position
    pub fn keycode(&self, pos: MatrixPosition) -> Option<u8> {
        self.label(pos).and_then(keycode_for_name)
    }

    /// Row-major labels
    pub fn labels(&self) -> &[Vec<String>] {
        &self.labels
    }
}

impl Default for PhysicalLayout {
    fn default() -> Self {
        Self::kb16()
    }
}
