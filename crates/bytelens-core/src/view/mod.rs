//! Windowed rendering of large byte buffers.
//!
//! The view never walks the whole buffer. Every [`HexView::render`] call
//! computes the visible row range from the current scroll position and builds
//! just those rows (plus a small overscan), so the cost is proportional to
//! the viewport rather than the buffer.
//!
//! ## Selection
//!
//! - A click on a byte ([`HexView::click`]) selects it immediately and raises
//!   [`ViewEvent::OffsetChanged`].
//! - A programmatic jump ([`HexView::select`]) scrolls only if the target row
//!   is not already fully visible, and then by the smallest possible amount.

mod row;
mod viewport;

use std::ops::Range;
use tracing::trace;

pub use row::{build_row, hex_dump, offset_label, printable, row_count, VirtualRow, BYTES_PER_ROW};
pub use viewport::ViewportWindow;

/// Default pixel height of one row.
pub const ROW_HEIGHT: f64 = 24.0;

/// Default number of rows built beyond each edge of the viewport.
pub const OVERSCAN_ROWS: usize = 5;

/// Configuration for the hex view
#[derive(Debug, Clone)]
pub struct ViewConfig {
    /// Pixel height of a row, used both for placement and viewport math
    pub row_height: f64,
    /// Rows built above and below the visible area
    pub overscan: usize,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            row_height: ROW_HEIGHT,
            overscan: OVERSCAN_ROWS,
        }
    }
}

impl ViewConfig {
    /// Creates a new view config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the row height; non-positive values are ignored
    pub fn row_height(mut self, height: f64) -> Self {
        if height > 0.0 {
            self.row_height = height;
        }
        self
    }

    /// Sets the overscan margin in rows
    pub fn overscan(mut self, rows: usize) -> Self {
        self.overscan = rows;
        self
    }
}

/// Notifications raised by the view for its owner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewEvent {
    /// The selected byte changed through a click
    OffsetChanged(usize),
    /// The view wants its scroll container moved to this position
    ScrollTo(f64),
}

/// A row together with its vertical placement.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedRow {
    /// Pixel offset of the row's top edge within the content
    pub top: f64,
    /// The row contents
    pub row: VirtualRow,
}

/// The rows to draw for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RowWindow {
    /// Rows in ascending order
    pub rows: Vec<PlacedRow>,
    /// Row indices covered by `rows`
    pub range: Range<usize>,
    /// Height of the full content, for sizing the scroll container
    pub total_height: f64,
    /// Selected byte, if it lies inside the buffer
    pub selected: Option<usize>,
}

impl RowWindow {
    /// Returns the row and column of the selected byte if it was materialized.
    pub fn selected_cell(&self) -> Option<(usize, usize)> {
        let selected = self.selected?;
        self.rows
            .iter()
            .position(|placed| placed.row.contains(selected))
            .map(|i| (i, selected - self.rows[i].row.offset))
    }
}

/// What the view shows for a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// There is no buffer to show
    Empty,
    /// A window of rows
    Rows(RowWindow),
}

/// Scroll and selection state of a hex view.
#[derive(Debug, Clone)]
pub struct HexView {
    config: ViewConfig,
    scroll_top: f64,
    viewport_height: f64,
    selected: usize,
}

impl Default for HexView {
    fn default() -> Self {
        Self::new()
    }
}

impl HexView {
    /// Creates a view with default configuration and a zero-height viewport
    pub fn new() -> Self {
        Self::with_config(ViewConfig::default())
    }

    /// Creates a view with custom configuration
    pub fn with_config(config: ViewConfig) -> Self {
        Self {
            config,
            scroll_top: 0.0,
            viewport_height: 0.0,
            selected: 0,
        }
    }

    /// The current viewport geometry.
    pub fn viewport(&self) -> ViewportWindow {
        ViewportWindow {
            scroll_top: self.scroll_top,
            viewport_height: self.viewport_height,
            row_height: self.config.row_height,
            overscan: self.config.overscan,
        }
    }

    /// Current scroll position in pixels.
    pub fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    /// Currently selected offset.
    pub fn selected(&self) -> usize {
        self.selected
    }

    /// Records a scroll performed by the user.
    pub fn scroll(&mut self, scroll_top: f64) {
        self.scroll_top = if scroll_top.is_finite() {
            scroll_top.max(0.0)
        } else {
            0.0
        };
    }

    /// Records a change of the visible area's height.
    pub fn resize(&mut self, viewport_height: f64) {
        self.viewport_height = if viewport_height.is_finite() {
            viewport_height.max(0.0)
        } else {
            0.0
        };
    }

    /// Handles a click on the byte at `offset`.
    ///
    /// The selection changes immediately; clicks past the end are ignored.
    pub fn click(&mut self, offset: usize, buffer_len: usize) -> Option<ViewEvent> {
        if offset >= buffer_len {
            return None;
        }
        self.selected = offset;
        Some(ViewEvent::OffsetChanged(offset))
    }

    /// Moves the selection programmatically (e.g. "jump to offset").
    ///
    /// Returns [`ViewEvent::ScrollTo`] when the target row was not fully
    /// visible; the view's own scroll position is updated to match. An offset
    /// past the end of the buffer is kept as the selection but never scrolled
    /// to.
    pub fn select(&mut self, offset: usize, buffer_len: usize) -> Option<ViewEvent> {
        self.selected = offset;
        if offset >= buffer_len {
            return None;
        }

        let index = offset / BYTES_PER_ROW;
        let target = self
            .viewport()
            .scroll_to_reveal(index, row_count(buffer_len))?;

        trace!("Scrolling to {} to reveal row {}", target, index);
        self.scroll_top = target;
        Some(ViewEvent::ScrollTo(target))
    }

    /// Builds the rows visible for the current scroll position.
    pub fn render(&self, buffer: Option<&[u8]>) -> Frame {
        let Some(buffer) = buffer else {
            return Frame::Empty;
        };

        let viewport = self.viewport();
        let rows_total = row_count(buffer.len());
        let range = viewport.visible_rows(rows_total);

        trace!(
            "Rendering rows {}..{} of {}",
            range.start,
            range.end,
            rows_total
        );

        let rows = range
            .clone()
            .filter_map(|index| {
                build_row(buffer, index).map(|row| PlacedRow {
                    top: viewport.row_top(index),
                    row,
                })
            })
            .collect();

        Frame::Rows(RowWindow {
            rows,
            range,
            total_height: viewport.content_height(rows_total),
            selected: (self.selected < buffer.len()).then_some(self.selected),
        })
    }
}
