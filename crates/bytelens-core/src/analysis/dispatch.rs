//! Off-thread execution of analysis requests.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::{sample, AnalysisResult, AnalyzerRegistry, CrossOutcome};
use crate::error::{Error, Result};
use crate::loader::{FileId, LoadedFile};
use crate::session::{Action, SessionState};

/// Shared cancellation flag handed to an analyzer.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Handle for one in-flight request.
#[derive(Debug, Clone)]
pub struct Ticket {
    key: FileId,
    generation: u64,
    token: CancelToken,
}

impl Ticket {
    /// The file this request is for.
    pub fn key(&self) -> &FileId {
        &self.key
    }

    /// The request's cancellation token.
    pub fn token(&self) -> &CancelToken {
        &self.token
    }
}

/// Tracks the current request per file.
///
/// Starting a new request for a file cancels the previous one, and only the
/// current, uncancelled ticket is accepted on completion.
#[derive(Debug, Default)]
pub struct RequestTracker {
    current: HashMap<FileId, Ticket>,
    next_generation: u64,
}

impl RequestTracker {
    /// Creates an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a request for `key`, cancelling any request already running.
    pub fn begin(&mut self, key: FileId) -> Ticket {
        self.next_generation += 1;
        let ticket = Ticket {
            key: key.clone(),
            generation: self.next_generation,
            token: CancelToken::new(),
        };
        if let Some(previous) = self.current.insert(key, ticket.clone()) {
            debug!("Superseding analysis request for {}", previous.key);
            previous.token.cancel();
        }
        ticket
    }

    /// Completes `ticket`; returns true if its result should be applied.
    pub fn finish(&mut self, ticket: &Ticket) -> bool {
        match self.current.get(&ticket.key) {
            Some(current) if current.generation == ticket.generation => {
                self.current.remove(&ticket.key);
                !ticket.token.is_cancelled()
            }
            _ => false,
        }
    }

    /// Cancels the request for `key`, if one is running.
    pub fn cancel(&mut self, key: &FileId) {
        if let Some(ticket) = self.current.remove(key) {
            ticket.token.cancel();
        }
    }

    /// Cancels every running request.
    pub fn cancel_all(&mut self) {
        for (_, ticket) in self.current.drain() {
            ticket.token.cancel();
        }
    }

    /// Returns true if a request for `key` is running.
    pub fn is_in_flight(&self, key: &FileId) -> bool {
        self.current.contains_key(key)
    }

    /// Number of running requests.
    pub fn in_flight(&self) -> usize {
        self.current.len()
    }
}

type Completion = (Ticket, Result<AnalysisResult>);

/// Runs single-file analyses on worker threads and cross-file analysis on
/// demand, producing session [`Action`]s.
#[derive(Debug)]
pub struct AnalysisDispatcher {
    registry: AnalyzerRegistry,
    tracker: RequestTracker,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
}

impl AnalysisDispatcher {
    /// Creates a dispatcher over the given analyzers
    pub fn new(registry: AnalyzerRegistry) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            registry,
            tracker: RequestTracker::new(),
            tx,
            rx,
        }
    }

    /// The request tracker.
    pub fn tracker(&self) -> &RequestTracker {
        &self.tracker
    }

    /// Starts analysing `file` with the session's provider.
    ///
    /// Returns the [`Action::AnalysisStarted`] to apply. Fails without
    /// spawning anything if the provider has no analyzer.
    pub fn start(&mut self, file: &LoadedFile, state: &SessionState) -> Result<Action> {
        let analyzer = self.registry.get(state.provider)?;
        let ticket = self.tracker.begin(file.id.clone());
        let sample = sample(&file.bytes);
        let tx = self.tx.clone();

        debug!("Analysing {} ({}) with {}", file.name, file.id, state.provider);
        thread::spawn(move || {
            let result = if ticket.token.is_cancelled() {
                Err(Error::Cancelled)
            } else {
                // A panicking analyzer still has to clear its ticket
                panic::catch_unwind(AssertUnwindSafe(|| {
                    analyzer.analyze(&sample, &ticket.token)
                }))
                .unwrap_or_else(|_| Err(Error::internal("analyzer panicked")))
            };
            // The receiver is gone only when the dispatcher was dropped
            let _ = tx.send((ticket, result));
        });

        Ok(Action::AnalysisStarted(file.id.clone()))
    }

    /// Starts analysis for every file lacking a successful result.
    ///
    /// The returned actions reset any cross-file result, mark the cross-file
    /// run as loading and mark each dispatched file as loading.
    pub fn start_all(&mut self, state: &SessionState) -> Result<Vec<Action>> {
        self.registry.get(state.provider)?;

        let mut actions = vec![Action::ResetCrossAnalysis, Action::CrossAnalysisStarted];
        for file in state.needing_analysis() {
            actions.push(self.start(file, state)?);
        }
        Ok(actions)
    }

    /// Drains finished requests without blocking.
    pub fn poll(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        while let Ok(completion) = self.rx.try_recv() {
            actions.extend(self.accept(completion));
        }
        actions
    }

    /// Blocks until every running request finished or `timeout` elapsed.
    pub fn wait(&mut self, timeout: Duration) -> Vec<Action> {
        let deadline = Instant::now() + timeout;
        let mut actions = Vec::new();
        while self.tracker.in_flight() > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(completion) => actions.extend(self.accept(completion)),
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        "Timed out with {} analyses still running",
                        self.tracker.in_flight()
                    );
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        actions
    }

    /// Cancels all running requests; their results will be discarded.
    pub fn cancel_all(&mut self) {
        self.tracker.cancel_all();
    }

    fn accept(&mut self, (ticket, result): Completion) -> Option<Action> {
        if !self.tracker.finish(&ticket) {
            debug!("Discarding stale analysis result for {}", ticket.key);
            return None;
        }
        let outcome = result.map_err(|e| match e {
            Error::AnalysisFailed(msg) => msg,
            other => other.to_string(),
        });
        if let Err(msg) = &outcome {
            warn!("Analysis of {} failed: {}", ticket.key, msg);
        }
        Some(Action::AnalysisFinished {
            id: ticket.key,
            outcome,
        })
    }

    /// Runs cross-file analysis once every file has been analysed.
    ///
    /// Returns the outcome to apply with [`Action::CrossAnalysisFinished`].
    pub fn run_cross_analysis(&self, state: &SessionState) -> CrossOutcome {
        let Some(summaries) = state.summaries() else {
            return Err("One or more files have not been analyzed successfully.".to_string());
        };
        let analyzer = self.registry.get(state.provider).map_err(|e| e.to_string())?;
        analyzer
            .relate(&summaries)
            .map_err(|e| format!("Analysis Failed: {e}"))
    }

    /// Closes a run started with [`start_all`](Self::start_all) once the
    /// single-file results have been applied to `state`.
    ///
    /// With several files this relates them; with one there is nothing to
    /// relate and the cross-file state is just cleared.
    pub fn finish_all(&self, state: &SessionState) -> Action {
        if state.files.len() <= 1 {
            return Action::ResetCrossAnalysis;
        }
        if state.summaries().is_none() {
            return Action::CrossAnalysisFinished(Err(
                "Could not analyze relationships because one or more files failed analysis."
                    .to_string(),
            ));
        }
        Action::CrossAnalysisFinished(self.run_cross_analysis(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Analyzer, CrossFileResult, FileSummary, Provider};
    use crate::session::{reduce, Session};
    use pretty_assertions::assert_eq;
    use std::sync::mpsc::SyncSender;
    use std::sync::Mutex;

    const WAIT: Duration = Duration::from_secs(5);

    /// Reports the number of sample lines; fails on samples starting with 00.
    struct LineCounter;

    impl Analyzer for LineCounter {
        fn analyze(&self, sample: &str, _cancel: &CancelToken) -> Result<AnalysisResult> {
            if sample.starts_with("00000000: 00") {
                return Err(Error::analysis_failed("empty header"));
            }
            Ok(AnalysisResult {
                file_type: "data".into(),
                summary: format!("{} lines", sample.lines().count()),
                findings: vec![],
            })
        }

        fn relate(&self, files: &[FileSummary]) -> Result<CrossFileResult> {
            Ok(CrossFileResult {
                related: true,
                relationship: format!("{} files", files.len()),
                reasoning: String::new(),
            })
        }
    }

    /// Blocks in `analyze` until released through the channel.
    struct Gate(Mutex<mpsc::Receiver<()>>);

    impl Analyzer for Gate {
        fn analyze(&self, _sample: &str, cancel: &CancelToken) -> Result<AnalysisResult> {
            self.0
                .lock()
                .unwrap()
                .recv_timeout(WAIT)
                .map_err(|e| Error::internal(e.to_string()))?;
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            Ok(AnalysisResult::default())
        }

        fn relate(&self, _files: &[FileSummary]) -> Result<CrossFileResult> {
            Ok(CrossFileResult::default())
        }
    }

    struct Panicking;

    impl Analyzer for Panicking {
        fn analyze(&self, _sample: &str, _cancel: &CancelToken) -> Result<AnalysisResult> {
            panic!("analyzer bug");
        }

        fn relate(&self, _files: &[FileSummary]) -> Result<CrossFileResult> {
            Ok(CrossFileResult::default())
        }
    }

    fn gated() -> (AnalysisDispatcher, SyncSender<()>) {
        let (tx, rx) = mpsc::sync_channel(8);
        let mut registry = AnalyzerRegistry::new();
        registry.register(Provider::Gemini, Gate(Mutex::new(rx)));
        (AnalysisDispatcher::new(registry), tx)
    }

    fn dispatcher() -> AnalysisDispatcher {
        let mut registry = AnalyzerRegistry::new();
        registry.register(Provider::Gemini, LineCounter);
        AnalysisDispatcher::new(registry)
    }

    fn session(files: Vec<LoadedFile>) -> Session {
        let mut session = Session::new();
        session.dispatch(Action::SetFiles { files, error: None });
        session
    }

    #[test]
    fn test_tracker_rejects_superseded_ticket() {
        let key = FileId::for_content("a", b"a");
        let mut tracker = RequestTracker::new();

        let first = tracker.begin(key.clone());
        let second = tracker.begin(key.clone());
        assert!(first.token().is_cancelled());
        assert_eq!(tracker.in_flight(), 1);

        assert!(!tracker.finish(&first));
        assert!(tracker.is_in_flight(&key));
        assert!(tracker.finish(&second));
        assert!(!tracker.is_in_flight(&key));
        // Finishing twice is not accepted
        assert!(!tracker.finish(&second));
    }

    #[test]
    fn test_tracker_cancel() {
        let key = FileId::for_content("a", b"a");
        let mut tracker = RequestTracker::new();
        let ticket = tracker.begin(key.clone());
        tracker.cancel(&key);
        assert!(ticket.token().is_cancelled());
        assert!(!tracker.finish(&ticket));
    }

    #[test]
    fn test_analyse_all_then_relate() {
        let mut session = session(vec![
            LoadedFile::new("a.txt", b"hello".to_vec()),
            LoadedFile::new("b.txt", vec![b'x'; 40]),
        ]);
        let mut dispatcher = dispatcher();

        let started = dispatcher.start_all(session.state()).unwrap();
        assert_eq!(started.len(), 4);
        session.dispatch_all(started);
        assert!(session.state().cross.loading);
        assert!(session.state().files.iter().all(|f| f
            .analysis
            .as_ref()
            .is_some_and(|s| s.is_loading())));

        let finished = dispatcher.wait(WAIT);
        assert_eq!(finished.len(), 2);
        session.dispatch_all(finished);

        let b = session.state().files[1].clone();
        assert_eq!(
            b.analysis.unwrap().result().unwrap().summary,
            "3 lines"
        );

        let action = dispatcher.finish_all(session.state());
        session.dispatch(action);
        let cross = &session.state().cross;
        assert!(!cross.loading);
        assert_eq!(cross.result.as_ref().unwrap().relationship, "2 files");
    }

    #[test]
    fn test_failed_file_blocks_relationships() {
        let mut session = session(vec![
            LoadedFile::new("zero.bin", vec![0u8; 4]),
            LoadedFile::new("text.txt", b"text".to_vec()),
        ]);
        let mut dispatcher = dispatcher();
        let started = dispatcher.start_all(session.state()).unwrap();
        session.dispatch_all(started);
        session.dispatch_all(dispatcher.wait(WAIT));

        let zero = &session.state().files[0];
        assert_eq!(
            zero.analysis.as_ref().unwrap(),
            &crate::analysis::AnalysisStatus::Failed("empty header".into())
        );

        assert_eq!(
            dispatcher.run_cross_analysis(session.state()),
            Err("One or more files have not been analyzed successfully.".to_string())
        );
        session.dispatch(dispatcher.finish_all(session.state()));
        assert!(session
            .state()
            .cross
            .error
            .as_deref()
            .unwrap()
            .starts_with("Could not analyze relationships"));
    }

    #[test]
    fn test_single_file_clears_cross_loading() {
        let mut session = session(vec![LoadedFile::new("a", b"a".to_vec())]);
        let mut dispatcher = dispatcher();
        session.dispatch_all(dispatcher.start_all(session.state()).unwrap());
        session.dispatch_all(dispatcher.wait(WAIT));
        session.dispatch(dispatcher.finish_all(session.state()));
        assert!(!session.state().cross.loading);
        assert!(session.state().cross.result.is_none());
    }

    #[test]
    fn test_unconfigured_provider() {
        let session = session(vec![LoadedFile::new("a", b"a".to_vec())]);
        let state = reduce(session.state().clone(), Action::SetProvider(Provider::OpenAi));
        let mut dispatcher = dispatcher();

        let err = dispatcher.start_all(&state).unwrap_err();
        assert!(matches!(err, Error::ProviderNotConfigured { .. }));
        assert_eq!(dispatcher.tracker().in_flight(), 0);
    }

    #[test]
    fn test_panicking_analyzer_reports_failure() {
        let file = LoadedFile::new("a", b"abc".to_vec());
        let mut session = session(vec![file.clone()]);
        let mut registry = AnalyzerRegistry::new();
        registry.register(Provider::Gemini, Panicking);
        let mut dispatcher = AnalysisDispatcher::new(registry);

        session.dispatch(dispatcher.start(&file, session.state()).unwrap());
        session.dispatch_all(dispatcher.wait(WAIT));

        assert_eq!(dispatcher.tracker().in_flight(), 0);
        assert_eq!(
            session.state().files[0].analysis,
            Some(crate::analysis::AnalysisStatus::Failed(
                "internal error: analyzer panicked".to_string()
            ))
        );
    }

    #[test]
    fn test_restart_discards_stale_result() {
        let file = LoadedFile::new("a", b"abc".to_vec());
        let session = session(vec![file.clone()]);
        let (mut dispatcher, release) = gated();

        dispatcher.start(&file, session.state()).unwrap();
        dispatcher.start(&file, session.state()).unwrap();
        assert_eq!(dispatcher.tracker().in_flight(), 1);

        release.send(()).unwrap();
        release.send(()).unwrap();
        let actions = dispatcher.wait(WAIT);

        assert_eq!(
            actions,
            vec![Action::AnalysisFinished {
                id: file.id.clone(),
                outcome: Ok(AnalysisResult::default()),
            }]
        );
    }

    #[test]
    fn test_cancel_all_discards_results() {
        let file = LoadedFile::new("a", b"abc".to_vec());
        let session = session(vec![file.clone()]);
        let (mut dispatcher, release) = gated();

        dispatcher.start(&file, session.state()).unwrap();
        dispatcher.cancel_all();
        release.send(()).unwrap();

        // Nothing is in flight any more, so wait returns immediately
        assert!(dispatcher.wait(WAIT).is_empty());
        thread::sleep(Duration::from_millis(50));
        assert!(dispatcher.poll().is_empty());
    }
}
