//! Byte order selection for multi-byte interpretations.

use std::fmt;

/// Determines the byte-order of multi-byte values.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Endianness {
    /// The least significant byte is stored at the lowest address.
    #[default]
    Little,
    /// The most significant byte is stored at the lowest address.
    Big,
}

impl Endianness {
    /// Returns the name used in labels and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            Endianness::Little => "little",
            Endianness::Big => "big",
        }
    }
}

impl fmt::Display for Endianness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! endianness_from_bytes {
    ($(($name:ident: $num:ident),)*) => {
        impl Endianness {
            $(
                #[doc = concat!("Returns the function used to parse a `", stringify!($num), "` from bytes of this endianness.")]
                pub fn $name(self) -> fn([u8; std::mem::size_of::<$num>()]) -> $num {
                    match self {
                        Endianness::Little => $num::from_le_bytes,
                        Endianness::Big => $num::from_be_bytes,
                    }
                }
            )*
        }
    };
}

endianness_from_bytes! {
    (u16_from_bytes: u16),
    (u32_from_bytes: u32),
    (u64_from_bytes: u64),
    (i16_from_bytes: i16),
    (i32_from_bytes: i32),
    (i64_from_bytes: i64),
    (f32_from_bytes: f32),
    (f64_from_bytes: f64),
}
