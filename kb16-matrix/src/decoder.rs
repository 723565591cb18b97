//! Live key-state decoding
//!
//! Turns a stream of reports into press/release and encoder events using a
//! fixed [`DecoderLayout`]. The decoder keeps the last known state of every
//! binding and emits only differences, one batch per report.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::trace;

use crate::assigner::{KeyAssignment, MatrixShape};
use crate::bits::BitCoordinate;
use crate::error::MatrixError;
use crate::lookup::{validate_entries, LookupEntry};

/// Number of keys on the KB16
pub const KB16_KEY_COUNT: u8 = 16;
/// Number of rotary encoders on the KB16
pub const KB16_ENCODER_COUNT: u8 = 3;

/// A rotary encoder: one value byte plus an optional push button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderBinding {
    pub id: u8,
    pub value_byte: u8,
    pub button: Option<BitCoordinate>,
}

/// Which report bits and bytes the decoder watches
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecoderLayout {
    keys: Vec<(u8, BitCoordinate)>,
    encoders: Vec<EncoderBinding>,
    min_report_len: usize,
}

impl DecoderLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stock KB16 report layout.
    ///
    /// Key `n` (1-16) is byte `(n-1)/8`, bit `(n-1)%8`. Encoders 1-3 report
    /// their position in bytes 8-10 and their buttons in byte 11, bits 0-2.
    pub fn kb16_default() -> Self {
        let keys = (1..=KB16_KEY_COUNT)
            .map(|id| {
                let index = id - 1;
                (
                    id,
                    BitCoordinate {
                        byte: index / 8,
                        bit: index % 8,
                    },
                )
            })
            .collect();
        let encoders = (1..=KB16_ENCODER_COUNT)
            .map(|id| EncoderBinding {
                id,
                value_byte: 7 + id,
                button: Some(BitCoordinate {
                    byte: 11,
                    bit: id - 1,
                }),
            })
            .collect();
        Self {
            keys,
            encoders,
            min_report_len: 8,
        }
    }

    /// Key bindings from an inferred assignment; key id is `row * cols + col + 1`
    pub fn from_assignment(assignment: &KeyAssignment) -> Self {
        let shape = assignment.shape();
        let keys = assignment
            .iter()
            .filter_map(|(coord, pos)| key_id(shape, pos.row, pos.col).map(|id| (id, coord)))
            .collect();
        Self {
            keys,
            ..Default::default()
        }
    }

    /// Key bindings from lookup entries, validated against `shape`
    pub fn from_entries(shape: MatrixShape, entries: &[LookupEntry]) -> Result<Self, MatrixError> {
        validate_entries(shape, entries)?;
        let mut keys = Vec::with_capacity(entries.len());
        for entry in entries {
            if let Some(id) = key_id(shape, entry.row, entry.col) {
                keys.push((id, entry.coordinate()?));
            }
        }
        keys.sort_by_key(|(id, _)| *id);
        Ok(Self {
            keys,
            ..Default::default()
        })
    }

    pub fn with_key(mut self, id: u8, coord: BitCoordinate) -> Self {
        self.keys.push((id, coord));
        self
    }

    pub fn with_encoder(mut self, binding: EncoderBinding) -> Self {
        self.encoders.push(binding);
        self
    }

    /// Reports shorter than this are ignored entirely
    pub fn with_min_report_len(mut self, len: usize) -> Self {
        self.min_report_len = len;
        self
    }

    pub fn keys(&self) -> &[(u8, BitCoordinate)] {
        &self.keys
    }

    pub fn encoders(&self) -> &[EncoderBinding] {
        &self.encoders
    }

    pub fn min_report_len(&self) -> usize {
        self.min_report_len
    }
}

fn key_id(shape: MatrixShape, row: u8, col: u8) -> Option<u8> {
    let index = row as usize * shape.cols as usize + col as usize;
    u8::try_from(index + 1).ok()
}

/// Scale a raw encoder byte to 0-100
#[inline]
pub fn normalize_encoder(raw: u8) -> u8 {
    (raw as u16 * 100 / 255).min(100) as u8
}

/// A state change detected in one report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum KeyEvent {
    KeyPressed { key: u8 },
    KeyReleased { key: u8 },
    EncoderRotated { encoder: u8, raw: u8, percent: u8 },
    EncoderButtonPressed { encoder: u8 },
    EncoderButtonReleased { encoder: u8 },
}

/// Receives the event batch for each decoded report
pub trait EventSink {
    fn on_events(&mut self, events: &[KeyEvent]);
}

impl<F: FnMut(&[KeyEvent])> EventSink for F {
    fn on_events(&mut self, events: &[KeyEvent]) {
        self(events)
    }
}

impl EventSink for Vec<KeyEvent> {
    fn on_events(&mut self, events: &[KeyEvent]) {
        self.extend_from_slice(events);
    }
}

/// Point-in-time copy of the decoder state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KeyStateSnapshot {
    pub keys: BTreeMap<u8, bool>,
    /// Last raw value per encoder; absent until the first report
    pub encoders: BTreeMap<u8, u8>,
    pub buttons: BTreeMap<u8, bool>,
}

impl KeyStateSnapshot {
    /// Ids of keys currently held down
    pub fn pressed_keys(&self) -> Vec<u8> {
        self.keys
            .iter()
            .filter(|(_, pressed)| **pressed)
            .map(|(id, _)| *id)
            .collect()
    }
}

/// Decodes reports against a fixed layout
#[derive(Debug, Clone)]
pub struct LiveDecoder {
    layout: DecoderLayout,
    keys: Vec<bool>,
    encoder_values: Vec<Option<u8>>,
    buttons: Vec<bool>,
}

impl LiveDecoder {
    /// Start with every key and button released and encoders unknown
    pub fn new(layout: DecoderLayout) -> Self {
        let keys = vec![false; layout.keys.len()];
        let encoder_values = vec![None; layout.encoders.len()];
        let buttons = vec![false; layout.encoders.len()];
        Self {
            layout,
            keys,
            encoder_values,
            buttons,
        }
    }

    pub fn layout(&self) -> &DecoderLayout {
        &self.layout
    }

    /// Update state from a report and return the changes it caused.
    ///
    /// Reports shorter than the layout minimum produce no events and leave
    /// the state untouched. Bindings past the end of a report are skipped.
    pub fn decode(&mut self, report: &[u8]) -> Vec<KeyEvent> {
        let mut events = Vec::new();
        if report.len() < self.layout.min_report_len {
            trace!(len = report.len(), "Report below minimum length, ignored");
            return events;
        }

        for ((id, coord), pressed) in self.layout.keys.iter().zip(self.keys.iter_mut()) {
            let Some(now) = coord.read(report) else {
                continue;
            };
            if now != *pressed {
                *pressed = now;
                events.push(if now {
                    KeyEvent::KeyPressed { key: *id }
                } else {
                    KeyEvent::KeyReleased { key: *id }
                });
            }
        }

        for ((binding, value), button) in self
            .layout
            .encoders
            .iter()
            .zip(self.encoder_values.iter_mut())
            .zip(self.buttons.iter_mut())
        {
            if let Some(&raw) = report.get(binding.value_byte as usize) {
                if *value != Some(raw) {
                    *value = Some(raw);
                    events.push(KeyEvent::EncoderRotated {
                        encoder: binding.id,
                        raw,
                        percent: normalize_encoder(raw),
                    });
                }
            }

            if let Some(now) = binding.button.and_then(|coord| coord.read(report)) {
                if now != *button {
                    *button = now;
                    events.push(if now {
                        KeyEvent::EncoderButtonPressed {
                            encoder: binding.id,
                        }
                    } else {
                        KeyEvent::EncoderButtonReleased {
                            encoder: binding.id,
                        }
                    });
                }
            }
        }

        events
    }

    /// Decode a report and hand the batch to `sink`.
    ///
    /// The sink is called once per accepted report, even when the batch is
    /// empty.
    pub fn process<S: EventSink + ?Sized>(&mut self, report: &[u8], sink: &mut S) {
        if report.len() < self.layout.min_report_len {
            return;
        }
        let events = self.decode(report);
        sink.on_events(&events);
    }

    pub fn snapshot(&self) -> KeyStateSnapshot {
        KeyStateSnapshot {
            keys: self
                .layout
                .keys
                .iter()
                .zip(&self.keys)
                .map(|((id, _), pressed)| (*id, *pressed))
                .collect(),
            encoders: self
                .layout
                .encoders
                .iter()
                .zip(&self.encoder_values)
                .filter_map(|(binding, value)| value.map(|v| (binding.id, v)))
                .collect(),
            buttons: self
                .layout
                .encoders
                .iter()
                .zip(&self.buttons)
                .filter(|(binding, _)| binding.button.is_some())
                .map(|(binding, pressed)| (binding.id, *pressed))
                .collect(),
        }
    }

    /// Forget all state, as if freshly created
    pub fn reset(&mut self) {
        self.keys.fill(false);
        self.encoder_values.fill(None);
        self.buttons.fill(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assigner::{MatrixAssigner, MatrixPosition};
    use crate::detector::ChangeFrequencyTable;

    fn single_key_layout() -> DecoderLayout {
        DecoderLayout::new().with_key(1, BitCoordinate { byte: 0, bit: 3 })
    }

    #[test]
    fn test_normalize_encoder() {
        assert_eq!(normalize_encoder(0), 0);
        assert_eq!(normalize_encoder(128), 50);
        assert_eq!(normalize_encoder(255), 100);
    }

    #[test]
    fn test_press_hold_release() {
        let mut decoder = LiveDecoder::new(single_key_layout());
        assert!(decoder.decode(&[0x00]).is_empty());
        assert_eq!(decoder.decode(&[0x08]), vec![KeyEvent::KeyPressed { key: 1 }]);
        assert!(decoder.decode(&[0x08]).is_empty());
        assert_eq!(decoder.decode(&[0x00]), vec![KeyEvent::KeyReleased { key: 1 }]);
    }

    #[test]
    fn test_short_report_is_noop() {
        let mut decoder = LiveDecoder::new(DecoderLayout::kb16_default());
        assert!(decoder.decode(&[0xFF; 7]).is_empty());
        assert!(decoder.snapshot().pressed_keys().is_empty());
    }

    #[test]
    fn test_kb16_default_layout() {
        let layout = DecoderLayout::kb16_default();
        assert_eq!(layout.keys().len(), 16);
        assert_eq!(layout.keys()[0], (1, BitCoordinate { byte: 0, bit: 0 }));
        assert_eq!(layout.keys()[8], (9, BitCoordinate { byte: 1, bit: 0 }));
        assert_eq!(layout.encoders()[2].value_byte, 10);
        assert_eq!(
            layout.encoders()[2].button,
            Some(BitCoordinate { byte: 11, bit: 2 })
        );
        assert_eq!(layout.min_report_len(), 8);
    }

    #[test]
    fn test_encoder_events() {
        let mut decoder = LiveDecoder::new(DecoderLayout::kb16_default());
        let mut report = [0u8; 12];
        report[8] = 0x80;

        let events = decoder.decode(&report);
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[0],
            KeyEvent::EncoderRotated {
                encoder: 1,
                raw: 0x80,
                percent: 50
            }
        );

        report[11] = 0b010;
        let events = decoder.decode(&report);
        assert_eq!(events, vec![KeyEvent::EncoderButtonPressed { encoder: 2 }]);

        report[11] = 0;
        let events = decoder.decode(&report);
        assert_eq!(events, vec![KeyEvent::EncoderButtonReleased { encoder: 2 }]);
    }

    #[test]
    fn test_encoder_byte_past_report_end() {
        let mut decoder = LiveDecoder::new(DecoderLayout::kb16_default());
        let mut report = [0u8; 9];
        report[0] = 0x01;
        let events = decoder.decode(&report);
        assert_eq!(
            events,
            vec![
                KeyEvent::KeyPressed { key: 1 },
                KeyEvent::EncoderRotated {
                    encoder: 1,
                    raw: 0,
                    percent: 0
                }
            ]
        );
        let snapshot = decoder.snapshot();
        assert_eq!(snapshot.encoders.len(), 1);
        assert_eq!(snapshot.buttons.len(), 3);
    }

    #[test]
    fn test_process_delivers_empty_batches() {
        let mut decoder = LiveDecoder::new(single_key_layout());
        let mut batches = Vec::new();
        let mut sink = |events: &[KeyEvent]| batches.push(events.to_vec());

        decoder.process(&[0x00], &mut sink);
        decoder.process(&[0x08], &mut sink);

        assert_eq!(batches, vec![vec![], vec![KeyEvent::KeyPressed { key: 1 }]]);
    }

    #[test]
    fn test_vec_sink() {
        let mut decoder = LiveDecoder::new(single_key_layout());
        let mut events: Vec<KeyEvent> = Vec::new();
        decoder.process(&[0x08], &mut events);
        decoder.process(&[0x00], &mut events);
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_from_assignment_key_ids() {
        let table: ChangeFrequencyTable = [
            (BitCoordinate { byte: 2, bit: 0 }, 5),
            (BitCoordinate { byte: 2, bit: 1 }, 3),
        ]
        .into_iter()
        .collect();
        let assignment = MatrixAssigner::new(MatrixShape::new(1, 2).unwrap()).assign(&table);
        let layout = DecoderLayout::from_assignment(&assignment);

        assert_eq!(
            layout.keys(),
            &[
                (1, BitCoordinate { byte: 2, bit: 0 }),
                (2, BitCoordinate { byte: 2, bit: 1 })
            ]
        );
    }

    #[test]
    fn test_from_entries_validates() {
        let entries = vec![LookupEntry::new(
            BitCoordinate { byte: 0, bit: 0 },
            MatrixPosition::new(5, 0),
        )];
        assert!(DecoderLayout::from_entries(MatrixShape::KB16, &entries).is_err());
    }

    #[test]
    fn test_reset() {
        let mut decoder = LiveDecoder::new(single_key_layout());
        decoder.decode(&[0x08]);
        decoder.reset();
        assert_eq!(decoder.snapshot().pressed_keys(), Vec::<u8>::new());
        assert_eq!(decoder.decode(&[0x08]), vec![KeyEvent::KeyPressed { key: 1 }]);
    }
}
