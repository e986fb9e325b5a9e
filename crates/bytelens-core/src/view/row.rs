//! Construction of individual hex rows.

use std::fmt;

/// Number of bytes shown on every row.
pub const BYTES_PER_ROW: usize = 16;

/// One materialized row of the hex view.
///
/// Rows are derived on demand from the buffer and never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualRow {
    /// Offset of the first byte in the row
    pub offset: usize,
    /// Two uppercase hex digits per byte
    pub hex: Vec<String>,
    /// One character per byte; non-printable bytes become `.`
    pub ascii: String,
}

impl VirtualRow {
    /// Builds a row from the bytes starting at `offset`.
    pub fn from_slice(offset: usize, chunk: &[u8]) -> Self {
        Self {
            offset,
            hex: chunk.iter().map(|byte| format!("{byte:02X}")).collect(),
            ascii: chunk.iter().map(|&byte| printable(byte)).collect(),
        }
    }

    /// Number of bytes in this row (less than [`BYTES_PER_ROW`] only for the last row).
    pub fn len(&self) -> usize {
        self.hex.len()
    }

    /// Returns true if the row holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.hex.is_empty()
    }

    /// Returns true if `offset` falls on this row.
    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.offset && offset - self.offset < self.len()
    }
}

impl fmt::Display for VirtualRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}  ", offset_label(self.offset))?;
        for column in 0..BYTES_PER_ROW {
            match self.hex.get(column) {
                Some(hex) => write!(f, "{hex} ")?,
                None => f.write_str("   ")?,
            }
        }
        write!(f, " {}", self.ascii)
    }
}

/// Maps a byte to its ASCII character if printable (0x20..=0x7E), else `.`.
pub fn printable(byte: u8) -> char {
    if (0x20..=0x7E).contains(&byte) {
        byte as char
    } else {
        '.'
    }
}

/// Formats an offset as eight uppercase hex digits.
pub fn offset_label(offset: usize) -> String {
    format!("{offset:08X}")
}

/// Number of rows needed to show `len` bytes.
pub fn row_count(len: usize) -> usize {
    len.div_ceil(BYTES_PER_ROW)
}

/// Builds row `index` of `buffer`, clipping the final row at the buffer end.
pub fn build_row(buffer: &[u8], index: usize) -> Option<VirtualRow> {
    let start = index.checked_mul(BYTES_PER_ROW)?;
    if start >= buffer.len() {
        return None;
    }
    let end = buffer.len().min(start + BYTES_PER_ROW);
    Some(VirtualRow::from_slice(start, &buffer[start..end]))
}

/// Formats bytes as `OFFSET: HH HH ...` lines, one per row.
///
/// This is the compact dump handed to content analyzers.
pub fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .chunks(BYTES_PER_ROW)
        .enumerate()
        .map(|(i, chunk)| {
            let hex = chunk
                .iter()
                .map(|byte| format!("{byte:02X}"))
                .collect::<Vec<_>>()
                .join(" ");
            format!("{}: {}", offset_label(i * BYTES_PER_ROW), hex)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
