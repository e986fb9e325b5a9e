//! # bytelens-core
//!
//! A library for inspecting binary files byte by byte.
//!
//! This crate provides the core functionality for:
//! - Decoding the bytes at an offset as integers, floats, LEB128, dates and text
//! - Rendering only the visible rows of an arbitrarily large hex view
//! - Debouncing cursor movement into decode requests
//! - Loading files and tracking a multi-file session, including content analysis
//!
//! ## Architecture
//!
//! - [`decoder`]: Pure, total decoding of a buffer at an offset
//! - [`view`]: Row construction and viewport arithmetic
//! - [`cursor`]: The authoritative cursor and its debounced feed into the decoder
//! - [`session`]: Reducer over loaded files and analysis progress
//! - [`loader`]: Reading files subject to size limits
//! - [`analysis`]: Analyzer capability, provider registry and request dispatch
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```
//! use bytelens_core::{decode, Endianness, HexView, Frame};
//!
//! let data = [0x78, 0x56, 0x34, 0x12, 0x00, 0x00, 0x00, 0x00];
//!
//! let interpretation = decode(&data, 0, Endianness::Little);
//! assert_eq!(interpretation.integers.u32.as_deref(), Ok("305419896"));
//!
//! let mut view = HexView::new();
//! view.resize(480.0);
//! match view.render(Some(&data[..])) {
//!     Frame::Rows(window) => assert_eq!(window.rows.len(), 1),
//!     Frame::Empty => unreachable!(),
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod analysis;
pub mod cursor;
pub mod decoder;
pub mod endianness;
pub mod error;
pub mod loader;
pub mod session;
pub mod view;

// Re-export primary types for convenience
pub use analysis::{AnalysisDispatcher, Analyzer, AnalyzerRegistry, Provider};
pub use cursor::{parse_offset, CursorCoordinator, Inspector, InspectorConfig};
pub use decoder::{decode, Interpretation};
pub use endianness::Endianness;
pub use error::{Error, FieldError, Result};
pub use loader::{FileId, LoadedFile, Loader, LoaderConfig};
pub use session::{reduce, Action, Session, SessionState};
pub use view::{Frame, HexView, ViewConfig, ViewEvent};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
