//! Report storage
//!
//! Two shapes of the same data:
//!
//! - [`Report`]: a single bounded report stored inline (no heap), cheap to
//!   copy across a channel from the reader thread.
//! - [`ReportArena`]: many reports packed into one contiguous buffer and
//!   addressed by [`ReportId`], used when a whole capture is held in memory.

use std::fmt;
use std::ops::Deref;

use crate::error::MatrixError;

/// Maximum HID report size on a full-speed interrupt endpoint
pub const MAX_REPORT_LEN: usize = 64;

/// A single HID input report, stored inline
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Report {
    len: u8,
    bytes: [u8; MAX_REPORT_LEN],
}

impl Report {
    /// Copy a report out of a byte slice
    pub fn new(data: &[u8]) -> Result<Self, MatrixError> {
        if data.len() > MAX_REPORT_LEN {
            return Err(MatrixError::ReportTooLong {
                len: data.len(),
                max: MAX_REPORT_LEN,
            });
        }
        let mut bytes = [0u8; MAX_REPORT_LEN];
        bytes[..data.len()].copy_from_slice(data);
        Ok(Self {
            len: data.len() as u8,
            bytes,
        })
    }

    /// Report contents
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }
}

impl Default for Report {
    fn default() -> Self {
        Self {
            len: 0,
            bytes: [0u8; MAX_REPORT_LEN],
        }
    }
}

impl Deref for Report {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsRef<[u8]> for Report {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl TryFrom<&[u8]> for Report {
    type Error = MatrixError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        Self::new(data)
    }
}

impl fmt::Debug for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Report({:02X?})", self.as_bytes())
    }
}

/// Format a report as space-separated uppercase hex (`"00 1F A0"`)
pub fn hex_string(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Index of a report inside a [`ReportArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReportId(u32);

impl ReportId {
    /// Position of the report in arrival order
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy)]
struct Span {
    offset: u32,
    len: u8,
}

/// Append-only store of reports in one contiguous buffer
#[derive(Debug, Clone, Default)]
pub struct ReportArena {
    data: Vec<u8>,
    spans: Vec<Span>,
}

impl ReportArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-size for `reports` reports of `report_len` bytes
    pub fn with_capacity(reports: usize, report_len: usize) -> Self {
        Self {
            data: Vec::with_capacity(reports * report_len.min(MAX_REPORT_LEN)),
            spans: Vec::with_capacity(reports),
        }
    }

    /// Append a report, returning its id
    pub fn push(&mut self, report: &[u8]) -> Result<ReportId, MatrixError> {
        if report.len() > MAX_REPORT_LEN {
            return Err(MatrixError::ReportTooLong {
                len: report.len(),
                max: MAX_REPORT_LEN,
            });
        }
        let id = ReportId(self.spans.len() as u32);
        self.spans.push(Span {
            offset: self.data.len() as u32,
            len: report.len() as u8,
        });
        self.data.extend_from_slice(report);
        Ok(id)
    }

    /// Look up a report by id
    pub fn get(&self, id: ReportId) -> Option<&[u8]> {
        self.spans.get(id.index()).map(|span| self.slice(*span))
    }

    /// Number of stored reports
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Iterate reports in arrival order
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &[u8]> + '_ {
        self.spans.iter().map(move |span| self.slice(*span))
    }

    fn slice(&self, span: Span) -> &[u8] {
        let start = span.offset as usize;
        &self.data[start..start + span.len as usize]
    }
}
