//! LEB128 variable-length integer decoding.
//!
//! Each byte contributes its low 7 bits, least significant group first; the
//! high bit marks a continuation. Values are accumulated in 128 bits so the
//! tenth group (bits 63..70) never overflows.

use std::fmt;

use crate::error::FieldError;

/// Largest shift accepted after a continuation byte.
pub const MAX_LEB128_SHIFT: u32 = 63;

/// Diagnostic for a buffer that ends before the terminating byte.
pub(crate) const INCOMPLETE: &str = "Incomplete LEB128 sequence";

/// Diagnostic for a sequence with too many continuation bytes.
pub(crate) const TOO_LONG: &str = "LEB128 sequence too long";

/// A decoded LEB128 value and the number of bytes it occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Leb128 {
    /// The decoded value; unsigned decodes are always non-negative.
    pub value: i128,
    /// Number of bytes consumed, including the terminating byte.
    pub length: usize,
}

impl fmt::Display for Leb128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.value, self.length)
    }
}

/// Decodes a LEB128 value starting at `offset`.
///
/// Returns [`FieldError::OutOfBounds`] when `offset` is past the end, and a
/// malformed marker for truncated or over-long sequences.
pub fn decode_leb128(buffer: &[u8], offset: usize, signed: bool) -> Result<Leb128, FieldError> {
    if offset >= buffer.len() {
        return Err(FieldError::OutOfBounds);
    }

    let mut result: u128 = 0;
    let mut shift: u32 = 0;
    let mut position = offset;

    let last = loop {
        let Some(&byte) = buffer.get(position) else {
            return Err(FieldError::malformed(INCOMPLETE));
        };
        position += 1;

        result |= u128::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            break byte;
        }

        shift += 7;
        if shift > MAX_LEB128_SHIFT {
            return Err(FieldError::malformed(TOO_LONG));
        }
    };

    let width = shift + 7;
    let value = if signed && last & 0x40 != 0 {
        // Set every bit above the consumed width; width is at most 70.
        (result | (u128::MAX << width)) as i128
    } else {
        result as i128
    };

    Ok(Leb128 {
        value,
        length: position - offset,
    })
}
