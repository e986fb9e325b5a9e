//! Legacy timestamp interpretations.

use chrono::{DateTime, NaiveDate, Utc};

use super::Field;
use crate::endianness::Endianness;
use crate::error::FieldError;

/// Diagnostic for bytes that do not describe a representable instant.
pub(crate) const INVALID_DATE: &str = "Invalid date";

/// RFC 1123 style, matching what HTTP dates and mail headers use.
const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Seconds from the HFS epoch (1904-01-01) to the Unix epoch.
const HFS_EPOCH_OFFSET: i64 = -2_082_844_800;

/// Milliseconds from the OLE epoch (1899-12-30) to the Unix epoch.
const OLE_EPOCH_OFFSET_MS: i64 = -2_209_161_600_000;

const MS_PER_DAY: f64 = 86_400_000.0;

fn format(datetime: DateTime<Utc>) -> String {
    datetime.format(DATE_FORMAT).to_string()
}

fn invalid() -> FieldError {
    FieldError::malformed(INVALID_DATE)
}

/// MS-DOS packed date/time: a 16-bit time word followed by a 16-bit date word.
///
/// date = `[year-1980:7][month:4][day:5]`, time = `[hour:5][minute:6][second/2:5]`.
pub(crate) fn ms_dos(bytes: [u8; 4], endianness: Endianness) -> Field {
    let from_bytes = endianness.u16_from_bytes();
    let time = from_bytes([bytes[0], bytes[1]]);
    let date = from_bytes([bytes[2], bytes[3]]);

    let year = i32::from((date >> 9) & 0x7F) + 1980;
    let month = u32::from((date >> 5) & 0x0F);
    let day = u32::from(date & 0x1F);
    let hour = u32::from((time >> 11) & 0x1F);
    let minute = u32::from((time >> 5) & 0x3F);
    let second = u32::from(time & 0x1F) * 2;

    if month == 0 || day == 0 {
        return Err(invalid());
    }

    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .map(|datetime| format(datetime.and_utc()))
        .ok_or_else(invalid)
}

/// OLE Automation date: an f64 count of days since 1899-12-30T00:00:00Z.
pub(crate) fn ole(bytes: [u8; 8], endianness: Endianness) -> Field {
    let days = endianness.f64_from_bytes()(bytes);
    if !days.is_finite() {
        return Err(invalid());
    }

    let offset_ms = (days * MS_PER_DAY).trunc();
    // Anything this far out is beyond chrono's range anyway.
    if offset_ms.abs() > 1e17 {
        return Err(invalid());
    }

    (offset_ms as i64)
        .checked_add(OLE_EPOCH_OFFSET_MS)
        .and_then(DateTime::from_timestamp_millis)
        .map(format)
        .ok_or_else(invalid)
}

/// Unix time: an unsigned 32-bit count of seconds since 1970-01-01T00:00:00Z.
pub(crate) fn unix32(bytes: [u8; 4], endianness: Endianness) -> Field {
    let seconds = endianness.u32_from_bytes()(bytes);
    from_seconds(i64::from(seconds))
}

/// Mac HFS time: an unsigned 32-bit count of seconds since 1904-01-01T00:00:00Z.
///
/// HFS stores timestamps big-endian on disk, so the requested byte order
/// does not apply here.
pub(crate) fn mac_hfs(bytes: [u8; 4]) -> Field {
    let seconds = u32::from_be_bytes(bytes);
    from_seconds(i64::from(seconds) + HFS_EPOCH_OFFSET)
}

fn from_seconds(seconds: i64) -> Field {
    DateTime::from_timestamp(seconds, 0)
        .map(format)
        .ok_or_else(invalid)
}
