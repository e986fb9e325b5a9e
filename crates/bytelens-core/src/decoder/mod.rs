//! Multi-format decoding of the bytes at a cursor offset.
//!
//! [`decode`] projects a borrowed buffer, an offset and an [`Endianness`]
//! onto a fixed-shape [`Interpretation`]. Each field is computed on its own:
//! running out of bytes, malformed content or an unsupported format only
//! ever affects the field in question.
//!
//! ## Field widths
//!
//! | Group    | Fields                                   | Bytes        |
//! |----------|------------------------------------------|--------------|
//! | integers | u8/i8, u16/i16, u24/i24, u32/i32, u64/i64 | 1, 2, 3, 4, 8 |
//! | floats   | f16 (unsupported), f32, f64              | 2, 4, 8      |
//! | leb128   | unsigned, signed                         | variable     |
//! | dates    | MS-DOS, Unix32, Mac HFS, OLE             | 4, 4, 4, 8   |
//! | text     | UTF-8 first line                         | 1..=64       |
//! | binary   | bits of the cursor byte                  | 1            |

mod dates;
mod leb128;
mod text;

use crate::endianness::Endianness;
use crate::error::FieldError;
use tracing::trace;

pub use leb128::{decode_leb128, Leb128, MAX_LEB128_SHIFT};
pub use text::{first_line_printable, TEXT_WINDOW};

/// The outcome of a single interpretation: a display string or a marker.
pub type Field = std::result::Result<String, FieldError>;

/// Fixed-width integer interpretations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Integers {
    pub u8: Field,
    pub i8: Field,
    pub u16: Field,
    pub i16: Field,
    pub u24: Field,
    pub i24: Field,
    pub u32: Field,
    pub i32: Field,
    pub u64: Field,
    pub i64: Field,
}

/// IEEE-754 interpretations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Floats {
    /// Half precision is not decoded and always carries [`FieldError::Unsupported`].
    pub f16: Field,
    pub f32: Field,
    pub f64: Field,
}

/// Variable-length integer interpretations, formatted as `"<value> (<n> bytes)"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leb128Fields {
    pub unsigned: Field,
    pub signed: Field,
}

/// Legacy timestamp interpretations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dates {
    pub ms_dos: Field,
    pub ole: Field,
    pub unix32: Field,
    /// Always read big-endian regardless of the requested byte order.
    pub mac_hfs: Field,
}

/// Text interpretations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text {
    pub utf8: Field,
}

/// Every supported interpretation of the bytes at one offset.
///
/// Created fresh by each [`decode`] call and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpretation {
    pub integers: Integers,
    pub floats: Floats,
    pub leb128: Leb128Fields,
    pub dates: Dates,
    pub text: Text,
    /// The cursor byte as eight binary digits, most significant bit first.
    pub binary: Field,
}

impl Interpretation {
    /// Returns `(label, display string)` pairs in presentation order.
    ///
    /// Failed fields render as their marker text.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let fields: [(&'static str, &Field); 21] = [
            ("UTF-8 Char", &self.text.utf8),
            ("Binary", &self.binary),
            ("8-bit Unsigned", &self.integers.u8),
            ("8-bit Signed", &self.integers.i8),
            ("16-bit Unsigned", &self.integers.u16),
            ("16-bit Signed", &self.integers.i16),
            ("24-bit Unsigned", &self.integers.u24),
            ("24-bit Signed", &self.integers.i24),
            ("32-bit Unsigned", &self.integers.u32),
            ("32-bit Signed", &self.integers.i32),
            ("64-bit Unsigned", &self.integers.u64),
            ("64-bit Signed", &self.integers.i64),
            ("Float (16-bit)", &self.floats.f16),
            ("Float (32-bit)", &self.floats.f32),
            ("Double (64-bit)", &self.floats.f64),
            ("LEB128 Unsigned", &self.leb128.unsigned),
            ("LEB128 Signed", &self.leb128.signed),
            ("MS-DOS DateTime", &self.dates.ms_dos),
            ("OLE DateTime", &self.dates.ole),
            ("Unix 32-bit Time", &self.dates.unix32),
            ("macOS HFS Time", &self.dates.mac_hfs),
        ];

        fields
            .iter()
            .map(|(label, field)| (*label, display(field)))
            .collect()
    }
}

/// Renders a field as its value or its marker.
pub fn display(field: &Field) -> String {
    match field {
        Ok(value) => value.clone(),
        Err(err) => err.to_string(),
    }
}

/// Interprets the bytes at `offset` under every supported encoding.
///
/// Never fails as a whole: an offset at or past the end of `buffer` simply
/// produces "Out of Bounds" markers.
pub fn decode(buffer: &[u8], offset: usize, endianness: Endianness) -> Interpretation {
    trace!(
        "Decoding offset {} of {} bytes ({})",
        offset,
        buffer.len(),
        endianness
    );

    Interpretation {
        integers: Integers {
            u8: read::<1>(buffer, offset, |[b]| Ok(b.to_string())),
            i8: read::<1>(buffer, offset, |[b]| Ok((b as i8).to_string())),
            u16: read::<2>(buffer, offset, |b| Ok(endianness.u16_from_bytes()(b).to_string())),
            i16: read::<2>(buffer, offset, |b| Ok(endianness.i16_from_bytes()(b).to_string())),
            u24: read::<3>(buffer, offset, |b| Ok(u24(b, endianness).to_string())),
            i24: read::<3>(buffer, offset, |b| Ok(i24(b, endianness).to_string())),
            u32: read::<4>(buffer, offset, |b| Ok(endianness.u32_from_bytes()(b).to_string())),
            i32: read::<4>(buffer, offset, |b| Ok(endianness.i32_from_bytes()(b).to_string())),
            u64: read::<8>(buffer, offset, |b| Ok(endianness.u64_from_bytes()(b).to_string())),
            i64: read::<8>(buffer, offset, |b| Ok(endianness.i64_from_bytes()(b).to_string())),
        },
        floats: Floats {
            f16: Err(FieldError::Unsupported),
            f32: read::<4>(buffer, offset, |b| {
                Ok(format_float(endianness.f32_from_bytes()(b).into()))
            }),
            f64: read::<8>(buffer, offset, |b| Ok(format_float(endianness.f64_from_bytes()(b)))),
        },
        leb128: Leb128Fields {
            unsigned: decode_leb128(buffer, offset, false).map(|leb| leb.to_string()),
            signed: decode_leb128(buffer, offset, true).map(|leb| leb.to_string()),
        },
        dates: Dates {
            ms_dos: read::<4>(buffer, offset, |b| dates::ms_dos(b, endianness)),
            ole: read::<8>(buffer, offset, |b| dates::ole(b, endianness)),
            unix32: read::<4>(buffer, offset, |b| dates::unix32(b, endianness)),
            mac_hfs: read::<4>(buffer, offset, dates::mac_hfs),
        },
        text: Text {
            utf8: text::utf8(buffer, offset),
        },
        binary: read::<1>(buffer, offset, |[b]| Ok(format!("{b:08b}"))),
    }
}

/// Copies `N` bytes starting at `offset`, or reports the field as out of bounds.
pub(crate) fn take<const N: usize>(
    buffer: &[u8],
    offset: usize,
) -> std::result::Result<[u8; N], FieldError> {
    let end = offset.checked_add(N).ok_or(FieldError::OutOfBounds)?;
    let slice = buffer.get(offset..end).ok_or(FieldError::OutOfBounds)?;
    slice.try_into().map_err(FieldError::unexpected)
}

/// Bounds-checks a fixed-width field before handing its bytes to `interpret`.
fn read<const N: usize>(
    buffer: &[u8],
    offset: usize,
    interpret: impl FnOnce([u8; N]) -> Field,
) -> Field {
    interpret(take::<N>(buffer, offset)?)
}

/// Assembles a 24-bit unsigned value in the requested byte order.
fn u24([b0, b1, b2]: [u8; 3], endianness: Endianness) -> u32 {
    let (b0, b1, b2) = (u32::from(b0), u32::from(b1), u32::from(b2));
    match endianness {
        Endianness::Little => b0 | (b1 << 8) | (b2 << 16),
        Endianness::Big => (b0 << 16) | (b1 << 8) | b2,
    }
}

/// Sign-extends a 24-bit value using bit 23.
fn i24(bytes: [u8; 3], endianness: Endianness) -> i32 {
    let value = u24(bytes, endianness) as i32;
    if value & 0x80_0000 != 0 {
        value - 0x100_0000
    } else {
        value
    }
}

/// Formats a float the way it is shown to users: no negative zero, and
/// infinities spelled out.
fn format_float(value: f64) -> String {
    if value == 0.0 {
        "0".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else {
        value.to_string()
    }
}
