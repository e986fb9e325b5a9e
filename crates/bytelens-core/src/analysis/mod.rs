//! Content analysis boundary.
//!
//! Analysis itself (e.g. a hosted language model summarising a file) lives
//! outside this crate. What lives here is the seam:
//!
//! - [`Analyzer`], the capability every provider implements,
//! - [`AnalyzerRegistry`], which picks the implementation for the configured
//!   [`Provider`] instead of branching on the provider at call sites,
//! - [`AnalysisDispatcher`], which runs requests off-thread and guarantees at
//!   most one in-flight request per file.
//!
//! ## Example
//!
//! ```
//! use bytelens_core::analysis::{
//!     AnalysisResult, Analyzer, AnalyzerRegistry, CancelToken, CrossFileResult, FileSummary,
//!     Provider,
//! };
//! use bytelens_core::Result;
//!
//! struct Offline;
//!
//! impl Analyzer for Offline {
//!     fn analyze(&self, sample: &str, _cancel: &CancelToken) -> Result<AnalysisResult> {
//!         Ok(AnalysisResult {
//!             file_type: "unknown".into(),
//!             summary: format!("{} sample lines", sample.lines().count()),
//!             findings: vec![],
//!         })
//!     }
//!
//!     fn relate(&self, _files: &[FileSummary]) -> Result<CrossFileResult> {
//!         Ok(CrossFileResult::default())
//!     }
//! }
//!
//! let mut registry = AnalyzerRegistry::new();
//! registry.register(Provider::Gemini, Offline);
//! assert!(registry.get(Provider::Gemini).is_ok());
//! assert!(registry.get(Provider::OpenAi).is_err());
//! ```

mod dispatch;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::view::hex_dump;

pub use dispatch::{AnalysisDispatcher, CancelToken, RequestTracker, Ticket};

/// Number of leading bytes of a file handed to an analyzer.
pub const SAMPLE_SIZE: usize = 512;

/// Which analysis backend to use.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    /// Google Gemini
    #[default]
    Gemini,
    /// OpenAI
    OpenAi,
    /// No provider selected
    Unconfigured,
}

impl Provider {
    /// Returns the configuration name of the provider
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::OpenAi => "openai",
            Provider::Unconfigured => "unconfigured",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gemini" => Ok(Provider::Gemini),
            "openai" => Ok(Provider::OpenAi),
            "unconfigured" | "none" => Ok(Provider::Unconfigured),
            other => Err(Error::internal(format!("unknown analysis provider: {other}"))),
        }
    }
}

/// What an analyzer reports about a single file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisResult {
    /// Likely file type, e.g. "PNG image"
    pub file_type: String,
    /// Short description of the content
    pub summary: String,
    /// Notable details (at most a handful)
    pub findings: Vec<String>,
}

/// What an analyzer reports about a set of files taken together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrossFileResult {
    /// Whether the files appear to belong together
    pub related: bool,
    /// Short description of the relationship
    pub relationship: String,
    /// Why the analyzer thinks so
    pub reasoning: String,
}

/// Input to cross-file analysis: one entry per analyzed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSummary {
    /// Name of the file
    pub file_name: String,
    /// Type reported by the single-file analysis
    pub file_type: String,
    /// Summary reported by the single-file analysis
    pub summary: String,
}

/// Outcome of a single-file analysis as stored in the session.
pub type AnalysisOutcome = std::result::Result<AnalysisResult, String>;

/// Outcome of a cross-file analysis as stored in the session.
pub type CrossOutcome = std::result::Result<CrossFileResult, String>;

/// Per-file analysis state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisStatus {
    /// A request is in flight
    Loading,
    /// The last request succeeded
    Done(AnalysisResult),
    /// The last request failed with this message
    Failed(String),
}

impl AnalysisStatus {
    /// The result, if the analysis succeeded.
    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            AnalysisStatus::Done(result) => Some(result),
            _ => None,
        }
    }

    /// Returns true while a request is in flight.
    pub fn is_loading(&self) -> bool {
        matches!(self, AnalysisStatus::Loading)
    }
}

impl From<AnalysisOutcome> for AnalysisStatus {
    fn from(outcome: AnalysisOutcome) -> Self {
        match outcome {
            Ok(result) => AnalysisStatus::Done(result),
            Err(message) => AnalysisStatus::Failed(message),
        }
    }
}

/// A content analysis backend.
///
/// Implementations should check `cancel` between expensive steps and return
/// [`Error::Cancelled`] once it is set; a result that arrives after
/// cancellation is discarded either way.
pub trait Analyzer: Send + Sync {
    /// Analyzes a hex dump sample of a single file.
    fn analyze(&self, sample: &str, cancel: &CancelToken) -> Result<AnalysisResult>;

    /// Judges whether the summarised files are related.
    fn relate(&self, files: &[FileSummary]) -> Result<CrossFileResult>;
}

/// Formats the leading [`SAMPLE_SIZE`] bytes as the hex dump analyzers receive.
pub fn sample(bytes: &[u8]) -> String {
    hex_dump(&bytes[..bytes.len().min(SAMPLE_SIZE)])
}

/// Maps providers to their analyzer implementations.
#[derive(Default, Clone)]
pub struct AnalyzerRegistry {
    analyzers: HashMap<Provider, Arc<dyn Analyzer>>,
}

impl fmt::Debug for AnalyzerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyzerRegistry")
            .field("providers", &self.analyzers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl AnalyzerRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `analyzer` for `provider`, replacing any previous one
    pub fn register(&mut self, provider: Provider, analyzer: impl Analyzer + 'static) {
        self.analyzers.insert(provider, Arc::new(analyzer));
    }

    /// Returns the analyzer for `provider`
    pub fn get(&self, provider: Provider) -> Result<Arc<dyn Analyzer>> {
        self.analyzers
            .get(&provider)
            .cloned()
            .ok_or(Error::ProviderNotConfigured { provider })
    }
}
