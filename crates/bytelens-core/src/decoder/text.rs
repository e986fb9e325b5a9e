//! UTF-8 text snippet at the cursor.

use unicode_general_category::{get_general_category, GeneralCategory};

use super::Field;
use crate::error::FieldError;

/// Maximum number of bytes considered for the text snippet.
pub const TEXT_WINDOW: usize = 64;

const INVALID_UTF8: &str = "Invalid UTF-8 sequence";

/// Decodes up to [`TEXT_WINDOW`] bytes at `offset` as strict UTF-8 and keeps
/// the first line with unprintable characters replaced by `.`.
pub(crate) fn utf8(buffer: &[u8], offset: usize) -> Field {
    if offset >= buffer.len() {
        return Err(FieldError::OutOfBounds);
    }

    let end = buffer.len().min(offset.saturating_add(TEXT_WINDOW));
    let text = std::str::from_utf8(&buffer[offset..end])
        .map_err(|_| FieldError::malformed(INVALID_UTF8))?;

    Ok(first_line_printable(text))
}

/// Returns the text up to the first `\n`, replacing every character of
/// the Unicode "Other" categories (control, format, surrogate, private use,
/// unassigned) with `.`.
pub fn first_line_printable(text: &str) -> String {
    text.split('\n')
        .next()
        .unwrap_or_default()
        .chars()
        .map(|c| if is_other(c) { '.' } else { c })
        .collect()
}

fn is_other(c: char) -> bool {
    matches!(
        get_general_category(c),
        GeneralCategory::Control
            | GeneralCategory::Format
            | GeneralCategory::Surrogate
            | GeneralCategory::PrivateUse
            | GeneralCategory::Unassigned
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_first_line_only() {
        assert_eq!(utf8(b"hello\nworld", 0), Ok("hello".to_string()));
        assert_eq!(utf8(b"hello\nworld", 6), Ok("world".to_string()));
    }

    #[test]
    fn test_control_characters_replaced() {
        assert_eq!(utf8(b"a\tb\x00c\r", 0), Ok("a.b.c.".to_string()));
        assert_eq!(first_line_printable("x\u{200B}y\u{FEFF}"), "x.y.");
    }

    #[test]
    fn test_private_and_unassigned_replaced() {
        assert_eq!(utf8("x\u{0378}y".as_bytes(), 0), Ok("x.y".to_string()));
        assert_eq!(first_line_printable("\u{E000}\u{FFFF}z"), "..z");
    }

    #[test]
    fn test_multibyte_text() {
        let text = "héllo wörld";
        assert_eq!(utf8(text.as_bytes(), 0), Ok(text.to_string()));
    }

    #[test]
    fn test_invalid_utf8() {
        assert_eq!(
            utf8(&[0x41, 0xFF, 0x42], 0),
            Err(FieldError::malformed(INVALID_UTF8))
        );
        // A truncated character at the end of the buffer is invalid
        assert_eq!(
            utf8(&[0x41, 0xE2, 0x82], 0),
            Err(FieldError::malformed(INVALID_UTF8))
        );
    }

    #[test]
    fn test_window_is_64_bytes() {
        let data = vec![b'a'; 100];
        assert_eq!(utf8(&data, 0).unwrap().len(), TEXT_WINDOW);
        assert_eq!(utf8(&data, 90).unwrap().len(), 10);
    }

    #[test]
    fn test_character_split_by_window_edge() {
        let mut data = vec![b'a'; 63];
        data.extend_from_slice("€".as_bytes());
        data.extend_from_slice(b"tail");
        assert_eq!(utf8(&data, 0), Err(FieldError::malformed(INVALID_UTF8)));
        // Starting one character later the window ends cleanly
        assert!(utf8(&data, 1).is_err());
        assert_eq!(utf8(&data, 3).unwrap().chars().nth(60), Some('€'));
    }

    #[test]
    fn test_out_of_bounds() {
        assert_eq!(utf8(b"abc", 3), Err(FieldError::OutOfBounds));
    }
}
