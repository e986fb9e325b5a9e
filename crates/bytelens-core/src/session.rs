//! Session state: the loaded files, the active one, and analysis progress.
//!
//! All changes go through [`reduce`], a pure function from the old state and
//! an [`Action`] to the new state. [`Session`] is a thin owner that applies
//! actions in place.

use tracing::trace;

use crate::analysis::{
    AnalysisOutcome, AnalysisStatus, CrossFileResult, CrossOutcome, FileSummary, Provider,
};
use crate::loader::{FileId, LoadedFile};

/// Progress of the cross-file analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrossAnalysis {
    /// Last successful result
    pub result: Option<CrossFileResult>,
    /// A cross-file run is in progress
    pub loading: bool,
    /// Last failure message
    pub error: Option<String>,
}

/// Everything the session knows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    /// Loaded files in display order
    pub files: Vec<LoadedFile>,
    /// File shown in the viewer
    pub active: Option<FileId>,
    /// A batch is being read
    pub reading: bool,
    /// Diagnostic from the last batch
    pub file_error: Option<String>,
    /// Cross-file analysis progress
    pub cross: CrossAnalysis,
    /// Selected analysis backend
    pub provider: Provider,
}

impl SessionState {
    /// Looks up a file by id.
    pub fn file(&self, id: &FileId) -> Option<&LoadedFile> {
        self.files.iter().find(|file| &file.id == id)
    }

    /// The file currently shown, if any.
    pub fn active_file(&self) -> Option<&LoadedFile> {
        self.active.as_ref().and_then(|id| self.file(id))
    }

    /// Files without a successful analysis.
    pub fn needing_analysis(&self) -> impl Iterator<Item = &LoadedFile> {
        self.files.iter().filter(|file| {
            !matches!(file.analysis, Some(AnalysisStatus::Done(_)))
        })
    }

    /// Summaries of every file, or `None` if any file lacks a successful result.
    pub fn summaries(&self) -> Option<Vec<FileSummary>> {
        self.files
            .iter()
            .map(|file| {
                let result = file.analysis.as_ref()?.result()?;
                Some(FileSummary {
                    file_name: file.name.clone(),
                    file_type: if result.file_type.is_empty() {
                        "Unknown".to_string()
                    } else {
                        result.file_type.clone()
                    },
                    summary: result.summary.clone(),
                })
            })
            .collect()
    }
}

/// A state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// A batch is being read
    StartReading,
    /// Replace all files and activate the first
    SetFiles {
        /// New files
        files: Vec<LoadedFile>,
        /// Batch diagnostic
        error: Option<String>,
    },
    /// Add files after the existing ones
    AppendFiles {
        /// Files to add; ids already present are skipped
        files: Vec<LoadedFile>,
        /// Batch diagnostic
        error: Option<String>,
    },
    /// Change the shown file
    SetActiveFile(Option<FileId>),
    /// Drop a file
    RemoveFile(FileId),
    /// Back to the initial state
    Reset,
    /// Choose the analysis backend
    SetProvider(Provider),
    /// A single-file analysis was dispatched
    AnalysisStarted(FileId),
    /// A single-file analysis completed
    AnalysisFinished {
        /// File the result belongs to
        id: FileId,
        /// Result or error message
        outcome: AnalysisOutcome,
    },
    /// Cross-file analysis began
    CrossAnalysisStarted,
    /// Cross-file analysis completed
    CrossAnalysisFinished(CrossOutcome),
    /// Forget any cross-file result and stop loading
    ResetCrossAnalysis,
}

/// Applies `action` to `state`.
pub fn reduce(mut state: SessionState, action: Action) -> SessionState {
    match action {
        Action::StartReading => {
            state.reading = true;
            state.file_error = None;
        }
        Action::SetFiles { files, error } => {
            state.reading = false;
            state.active = files.first().map(|file| file.id.clone());
            state.files = files;
            state.file_error = error;
        }
        Action::AppendFiles { files, error } => {
            state.reading = false;
            for file in files {
                if state.file(&file.id).is_none() {
                    state.files.push(file);
                }
            }
            state.file_error = error;
        }
        Action::SetActiveFile(id) => state.active = id,
        Action::RemoveFile(id) => {
            let Some(index) = state.files.iter().position(|file| file.id == id) else {
                return state;
            };
            state.files.remove(index);

            if state.active.as_ref() == Some(&id) {
                let next = index.saturating_sub(1).min(state.files.len().saturating_sub(1));
                state.active = state.files.get(next).map(|file| file.id.clone());
            }
            if state.files.len() <= 1 {
                state.cross = CrossAnalysis::default();
            }
        }
        Action::Reset => return SessionState::default(),
        Action::SetProvider(provider) => state.provider = provider,
        Action::AnalysisStarted(id) => {
            if let Some(file) = state.files.iter_mut().find(|file| file.id == id) {
                file.analysis = Some(AnalysisStatus::Loading);
            }
        }
        Action::AnalysisFinished { id, outcome } => {
            if let Some(file) = state.files.iter_mut().find(|file| file.id == id) {
                file.analysis = Some(outcome.into());
            }
        }
        Action::CrossAnalysisStarted => {
            state.cross = CrossAnalysis {
                loading: true,
                ..CrossAnalysis::default()
            };
        }
        Action::CrossAnalysisFinished(outcome) => {
            state.cross = match outcome {
                Ok(result) => CrossAnalysis {
                    result: Some(result),
                    ..CrossAnalysis::default()
                },
                Err(error) => CrossAnalysis {
                    error: Some(error),
                    ..CrossAnalysis::default()
                },
            };
        }
        Action::ResetCrossAnalysis => state.cross = CrossAnalysis::default(),
    }
    state
}

/// Owns a [`SessionState`] and applies actions to it.
#[derive(Debug, Default)]
pub struct Session {
    state: SessionState,
}

impl Session {
    /// Creates a session in the initial state
    pub fn new() -> Self {
        Self::default()
    }

    /// The current state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Applies one action.
    pub fn dispatch(&mut self, action: Action) {
        trace!("Dispatching {:?}", ActionName(&action));
        self.state = reduce(std::mem::take(&mut self.state), action);
    }

    /// Applies actions in order.
    pub fn dispatch_all(&mut self, actions: impl IntoIterator<Item = Action>) {
        for action in actions {
            self.dispatch(action);
        }
    }
}

/// Debug view of an action without its payload (files can be large).
struct ActionName<'a>(&'a Action);

impl std::fmt::Debug for ActionName<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self.0 {
            Action::StartReading => "StartReading",
            Action::SetFiles { .. } => "SetFiles",
            Action::AppendFiles { .. } => "AppendFiles",
            Action::SetActiveFile(_) => "SetActiveFile",
            Action::RemoveFile(_) => "RemoveFile",
            Action::Reset => "Reset",
            Action::SetProvider(_) => "SetProvider",
            Action::AnalysisStarted(_) => "AnalysisStarted",
            Action::AnalysisFinished { .. } => "AnalysisFinished",
            Action::CrossAnalysisStarted => "CrossAnalysisStarted",
            Action::CrossAnalysisFinished(_) => "CrossAnalysisFinished",
            Action::ResetCrossAnalysis => "ResetCrossAnalysis",
        };
        f.write_str(name)
    }
}
