//! The authoritative cursor and its debounced feed into the decoder.
//!
//! The hex view reads [`CursorCoordinator::offset`] synchronously for
//! highlighting. Decoding only happens once the offset has settled: every
//! new selection replaces (and so cancels) the pending one, and
//! [`CursorCoordinator::poll`] releases a [`DecodeRequest`] after the delay.
//! Time is passed in by the caller, which keeps all of this plain data.

use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::debug;

use crate::decoder::{decode, Interpretation};
use crate::endianness::Endianness;
use crate::error::{Error, Result};

/// Default delay before a selected offset is decoded.
pub const DEBOUNCE_DELAY: Duration = Duration::from_millis(100);

/// Parses a user supplied offset, either decimal or `0x`-prefixed hex.
pub fn parse_offset(input: &str) -> Result<usize> {
    let trimmed = input.trim().replace('_', "");
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => trimmed.parse(),
    };
    parsed.map_err(|_| Error::invalid_offset(input))
}

/// Holds at most one pending value and releases it after a quiet period.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    /// Creates a debouncer with the given quiet period
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Schedules `value`, cancelling whatever was pending.
    pub fn schedule(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now + self.delay));
    }

    /// Drops the pending value, if any.
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Returns true if a value is waiting.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Releases the pending value once its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((_, deadline)) if now >= *deadline => self.pending.take().map(|(value, _)| value),
            _ => None,
        }
    }

    /// Deadline of the pending value.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, deadline)| *deadline)
    }
}

/// An immutable snapshot handed to the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeRequest {
    /// Settled cursor offset
    pub offset: usize,
    /// Byte order to decode with
    pub endianness: Endianness,
}

/// Single writer of the cursor offset and the byte order.
#[derive(Debug, Clone)]
pub struct CursorCoordinator {
    offset: usize,
    endianness: Endianness,
    settled: Option<DecodeRequest>,
    debouncer: Debouncer<usize>,
    /// Set when a decode must happen on the next poll regardless of debouncing
    force: bool,
}

impl Default for CursorCoordinator {
    fn default() -> Self {
        Self::new(DEBOUNCE_DELAY)
    }
}

impl CursorCoordinator {
    /// Creates a coordinator at offset 0 with the given debounce delay.
    ///
    /// The initial offset is decoded on the first poll.
    pub fn new(delay: Duration) -> Self {
        Self {
            offset: 0,
            endianness: Endianness::default(),
            settled: None,
            debouncer: Debouncer::new(delay),
            force: true,
        }
    }

    /// The offset as of the latest selection (not debounced).
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The current byte order.
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// The last request released to the decoder.
    pub fn settled(&self) -> Option<DecodeRequest> {
        self.settled
    }

    /// Moves the cursor; the decoder sees it once it stops moving.
    pub fn select(&mut self, offset: usize, now: Instant) {
        self.offset = offset;
        self.debouncer.schedule(offset, now);
    }

    /// Changes the byte order; the next poll decodes immediately.
    pub fn set_endianness(&mut self, endianness: Endianness) {
        if self.endianness != endianness {
            self.endianness = endianness;
            self.force = true;
        }
    }

    /// Returns to offset 0, e.g. after switching to another file.
    pub fn reset(&mut self) {
        self.offset = 0;
        self.settled = None;
        self.debouncer.cancel();
        self.force = true;
    }

    /// Makes the next poll decode again even if nothing moved.
    pub fn invalidate(&mut self) {
        self.force = true;
    }

    /// Yields a request when there is something new to decode.
    pub fn poll(&mut self, now: Instant) -> Option<DecodeRequest> {
        let offset = match self.debouncer.poll(now) {
            Some(offset) => offset,
            None if self.force => self.settled.map_or(self.offset, |r| r.offset),
            None => return None,
        };

        let request = DecodeRequest {
            offset,
            endianness: self.endianness,
        };
        let forced = std::mem::take(&mut self.force);
        if !forced && self.settled == Some(request) {
            return None;
        }
        self.settled = Some(request);
        Some(request)
    }
}

/// Configuration for the [`Inspector`]
#[derive(Debug, Clone)]
pub struct InspectorConfig {
    /// Quiet period before a selection is decoded
    pub debounce: Duration,
    /// Initial byte order
    pub endianness: Endianness,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            debounce: DEBOUNCE_DELAY,
            endianness: Endianness::default(),
        }
    }
}

impl InspectorConfig {
    /// Creates a new inspector config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the debounce delay
    pub fn debounce(mut self, delay: Duration) -> Self {
        self.debounce = delay;
        self
    }

    /// Sets the initial byte order
    pub fn endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness;
        self
    }
}

/// Keeps the latest interpretation of the active buffer up to date.
#[derive(Debug, Default)]
pub struct Inspector {
    cursor: CursorCoordinator,
    current: Option<Interpretation>,
}

impl Inspector {
    /// Creates an inspector with the given debounce delay
    pub fn new(delay: Duration) -> Self {
        Self::with_config(InspectorConfig::new().debounce(delay))
    }

    /// Creates an inspector from a config
    pub fn with_config(config: InspectorConfig) -> Self {
        let mut cursor = CursorCoordinator::new(config.debounce);
        cursor.set_endianness(config.endianness);
        Self {
            cursor,
            current: None,
        }
    }

    /// The coordinator that owns the cursor.
    pub fn cursor(&self) -> &CursorCoordinator {
        &self.cursor
    }

    /// Mutable access to the coordinator.
    pub fn cursor_mut(&mut self) -> &mut CursorCoordinator {
        &mut self.cursor
    }

    /// The most recent interpretation, if any.
    pub fn interpretation(&self) -> Option<&Interpretation> {
        self.current.as_ref()
    }

    /// Clears the interpretation and moves the cursor back to the start.
    pub fn reset(&mut self) {
        self.cursor.reset();
        self.current = None;
    }

    /// Decodes `buffer` if the cursor has settled on something new.
    ///
    /// Returns true when the interpretation was replaced. Without a buffer
    /// there is nothing to show and the interpretation is cleared.
    pub fn refresh(&mut self, buffer: Option<&Bytes>, now: Instant) -> bool {
        let Some(buffer) = buffer else {
            self.current = None;
            self.cursor.invalidate();
            return false;
        };
        let Some(request) = self.cursor.poll(now) else {
            return false;
        };

        debug!(
            "Decoding offset {} ({} endian)",
            request.offset, request.endianness
        );
        self.current = Some(decode(buffer, request.offset, request.endianness));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_parse_offset() {
        assert_eq!(parse_offset("1024").unwrap(), 1024);
        assert_eq!(parse_offset("0x1F").unwrap(), 31);
        assert_eq!(parse_offset(" 0X00_10 ").unwrap(), 16);
        assert!(matches!(
            parse_offset("0x"),
            Err(Error::InvalidOffset { .. })
        ));
        assert!(parse_offset("-1").is_err());
        assert!(parse_offset("12ab").is_err());
    }

    #[test]
    fn test_debouncer_releases_after_delay() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(ms(100));
        debouncer.schedule(1, start);
        assert_eq!(debouncer.poll(start + ms(99)), None);
        assert_eq!(debouncer.poll(start + ms(100)), Some(1));
        assert_eq!(debouncer.poll(start + ms(200)), None);
    }

    #[test]
    fn test_debouncer_keeps_only_last_value() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(ms(100));
        for (i, value) in [10, 20, 30].into_iter().enumerate() {
            debouncer.schedule(value, start + ms(40 * i as u64));
        }
        // Deadline moved with every reschedule: 80 + 100
        assert_eq!(debouncer.poll(start + ms(150)), None);
        assert_eq!(debouncer.poll(start + ms(180)), Some(30));
    }

    #[test]
    fn test_debouncer_cancel() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(ms(10));
        debouncer.schedule("x", start);
        debouncer.cancel();
        assert!(!debouncer.is_pending());
        assert_eq!(debouncer.poll(start + ms(50)), None);
    }

    #[test]
    fn test_coordinator_initial_decode() {
        let now = Instant::now();
        let mut cursor = CursorCoordinator::new(ms(100));
        assert_eq!(
            cursor.poll(now),
            Some(DecodeRequest {
                offset: 0,
                endianness: Endianness::Little
            })
        );
        assert_eq!(cursor.poll(now), None);
    }

    #[test]
    fn test_coordinator_scrubbing_decodes_once() {
        let start = Instant::now();
        let mut cursor = CursorCoordinator::new(ms(100));
        cursor.poll(start);

        for offset in 1..=50 {
            cursor.select(offset, start + ms(offset as u64));
            // The highlight follows immediately
            assert_eq!(cursor.offset(), offset);
            assert_eq!(cursor.poll(start + ms(offset as u64)), None);
        }

        let request = cursor.poll(start + ms(150)).unwrap();
        assert_eq!(request.offset, 50);
        assert_eq!(cursor.poll(start + ms(500)), None);
    }

    #[test]
    fn test_coordinator_endianness_change_is_immediate() {
        let start = Instant::now();
        let mut cursor = CursorCoordinator::new(ms(100));
        cursor.poll(start);
        cursor.select(8, start);
        cursor.poll(start + ms(100));

        cursor.set_endianness(Endianness::Big);
        assert_eq!(
            cursor.poll(start + ms(101)),
            Some(DecodeRequest {
                offset: 8,
                endianness: Endianness::Big
            })
        );
        // Same value again is not a change
        cursor.set_endianness(Endianness::Big);
        assert_eq!(cursor.poll(start + ms(102)), None);
    }

    #[test]
    fn test_coordinator_reset() {
        let start = Instant::now();
        let mut cursor = CursorCoordinator::new(ms(100));
        cursor.select(40, start);
        cursor.poll(start + ms(100));

        cursor.select(99, start + ms(110));
        cursor.reset();
        assert_eq!(cursor.offset(), 0);
        assert_eq!(cursor.poll(start + ms(500)).map(|r| r.offset), Some(0));
    }

    #[test]
    fn test_inspector_refresh() {
        let start = Instant::now();
        let buffer = Bytes::from_static(&[0x01, 0x00, 0x00, 0x00]);
        let mut inspector = Inspector::new(ms(100));

        assert!(inspector.refresh(Some(&buffer), start));
        let result = inspector.interpretation().unwrap();
        assert_eq!(result.integers.u32, Ok("1".to_string()));

        inspector.cursor_mut().set_endianness(Endianness::Big);
        assert!(inspector.refresh(Some(&buffer), start));
        assert_eq!(
            inspector.interpretation().unwrap().integers.u32,
            Ok("16777216".to_string())
        );

        assert!(!inspector.refresh(None, start));
        assert!(inspector.interpretation().is_none());

        // A buffer showing up again is decoded without waiting for a new selection
        assert!(inspector.refresh(Some(&buffer), start));
        assert!(inspector.interpretation().is_some());
    }

    #[test]
    fn test_inspector_config() {
        let start = Instant::now();
        let buffer = Bytes::from_static(&[0x00, 0x00, 0x00, 0x01]);
        let config = InspectorConfig::new()
            .debounce(ms(10))
            .endianness(Endianness::Big);
        let mut inspector = Inspector::with_config(config);

        assert!(inspector.refresh(Some(&buffer), start));
        assert_eq!(
            inspector.interpretation().unwrap().integers.u32,
            Ok("1".to_string())
        );

        inspector.cursor_mut().select(1, start);
        assert!(!inspector.refresh(Some(&buffer), start + ms(5)));
        assert!(inspector.refresh(Some(&buffer), start + ms(10)));
        assert_eq!(
            inspector.interpretation().unwrap().integers.u32,
            Err(crate::error::FieldError::OutOfBounds)
        );
    }
}
