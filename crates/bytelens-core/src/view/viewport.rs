//! Viewport arithmetic for the windowed hex view.
//!
//! All values are in pixels. Given a scroll position `s`, a viewport height
//! `H`, a row height `h` and an overscan of `m` rows, the rows to build are
//!
//! ```text
//! [max(0, floor(s / h) - m), min(row_count, ceil((s + H) / h) + m))
//! ```

use std::ops::Range;

/// A snapshot of the scroll container used to pick rows to materialize.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportWindow {
    /// Distance scrolled from the top of the content
    pub scroll_top: f64,
    /// Height of the visible area
    pub viewport_height: f64,
    /// Fixed height of one row; must be positive
    pub row_height: f64,
    /// Extra rows built above and below the visible area
    pub overscan: usize,
}

impl ViewportWindow {
    /// Index range of the rows to build, overscan included.
    pub fn visible_rows(&self, row_count: usize) -> Range<usize> {
        if !(self.row_height > 0.0) {
            return 0..0;
        }

        let scroll = self.scroll_top.max(0.0);
        let first = (scroll / self.row_height).floor() as usize;
        let last = ((scroll + self.viewport_height.max(0.0)) / self.row_height).ceil() as usize;

        let end = last.saturating_add(self.overscan).min(row_count);
        let start = first.saturating_sub(self.overscan).min(end);
        start..end
    }

    /// Pixel position of the top edge of row `index`.
    pub fn row_top(&self, index: usize) -> f64 {
        index as f64 * self.row_height
    }

    /// Total content height for `row_count` rows.
    pub fn content_height(&self, row_count: usize) -> f64 {
        self.row_top(row_count)
    }

    /// Largest meaningful scroll position for `row_count` rows.
    pub fn max_scroll(&self, row_count: usize) -> f64 {
        (self.content_height(row_count) - self.viewport_height).max(0.0)
    }

    /// Returns true if row `index` lies entirely inside the viewport (no overscan).
    pub fn fully_shows(&self, index: usize) -> bool {
        let top = self.row_top(index);
        let bottom = top + self.row_height;
        top >= self.scroll_top && bottom <= self.scroll_top + self.viewport_height
    }

    /// The scroll position closest to the current one that fully shows row
    /// `index`, or `None` if it is already fully shown.
    pub fn scroll_to_reveal(&self, index: usize, row_count: usize) -> Option<f64> {
        if self.fully_shows(index) {
            return None;
        }

        let top = self.row_top(index);
        let bottom = top + self.row_height;
        let target = if top < self.scroll_top || self.viewport_height < self.row_height {
            top
        } else {
            bottom - self.viewport_height
        };

        Some(target.clamp(0.0, self.max_scroll(row_count)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn window(scroll_top: f64, viewport_height: f64) -> ViewportWindow {
        ViewportWindow {
            scroll_top,
            viewport_height,
            row_height: 24.0,
            overscan: 5,
        }
    }

    #[test]
    fn test_large_buffer_window() {
        // 1,000,000 bytes = 62,500 rows
        let rows = crate::view::row_count(1_000_000);
        assert_eq!(rows, 62_500);
        assert_eq!(window(2400.0, 480.0).visible_rows(rows), 95..125);
    }

    #[test]
    fn test_top_of_buffer() {
        assert_eq!(window(0.0, 480.0).visible_rows(1000), 0..25);
        assert_eq!(window(48.0, 480.0).visible_rows(1000), 0..27);
    }

    #[test]
    fn test_clipped_at_row_count() {
        assert_eq!(window(0.0, 480.0).visible_rows(3), 0..3);
        assert_eq!(window(0.0, 480.0).visible_rows(0), 0..0);
    }

    #[test]
    fn test_fractional_scroll() {
        // floor(10/24) = 0, ceil(490/24) = 21
        assert_eq!(window(10.0, 480.0).visible_rows(1000), 0..26);
    }

    #[test]
    fn test_scrolled_past_content() {
        let range = window(1_000_000.0, 480.0).visible_rows(10);
        assert!(range.is_empty());
    }

    #[test]
    fn test_degenerate_row_height() {
        let mut w = window(0.0, 480.0);
        w.row_height = 0.0;
        assert_eq!(w.visible_rows(100), 0..0);
    }

    #[test]
    fn test_scroll_to_reveal() {
        let w = window(240.0, 480.0); // rows 10..30 fully visible
        assert_eq!(w.scroll_to_reveal(10, 1000), None);
        assert_eq!(w.scroll_to_reveal(29, 1000), None);
        // Above: align row top with viewport top
        assert_eq!(w.scroll_to_reveal(4, 1000), Some(96.0));
        // Below: align row bottom with viewport bottom
        assert_eq!(w.scroll_to_reveal(30, 1000), Some(264.0));
        assert_eq!(w.scroll_to_reveal(100, 1000), Some(2424.0 - 480.0));
    }

    #[test]
    fn test_scroll_to_reveal_partially_visible_row() {
        let w = window(250.0, 480.0);
        // Row 10 spans 240..264, cut off by 10px at the top
        assert_eq!(w.scroll_to_reveal(10, 1000), Some(240.0));
    }

    #[test]
    fn test_scroll_to_reveal_clamped() {
        let w = window(0.0, 480.0);
        // Only 21 rows exist, so max scroll is 24px
        assert_eq!(w.scroll_to_reveal(20, 21), Some(24.0));
    }
}
