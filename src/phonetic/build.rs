use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::index::IndexStats;
use super::model::HomophoneError;

/// Progress and completion notifications of an index build.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildEvent {
    /// Percentage of dictionary words indexed so far, `0..=100`.
    Progress(u8),
    /// The index is built and searches are accepted.
    Ready(IndexStats),
    /// The build stopped; the engine is back to `Unbuilt`.
    Failed(HomophoneError),
}

impl BuildEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BuildEvent::Progress(_))
    }
}

struct BuildState {
    progress: u8,
    outcome: Option<Result<IndexStats, HomophoneError>>,
    subscribers: Vec<Sender<BuildEvent>>,
}

/// Shared view of one index build.
///
/// Every clone observes the same build. Progress only ever increases, and the
/// outcome is set exactly once.
#[derive(Clone)]
pub struct BuildHandle {
    shared: Arc<Mutex<BuildState>>,
}

impl BuildHandle {
    pub(crate) fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(BuildState {
                progress: 0,
                outcome: None,
                subscribers: Vec::new(),
            })),
        }
    }

    /// A handle for a build that has already completed.
    pub(crate) fn finished(outcome: Result<IndexStats, HomophoneError>) -> Self {
        let handle = Self::new();
        handle.finish(outcome);
        handle
    }

    fn lock(&self) -> MutexGuard<'_, BuildState> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn report_progress(&self, percent: u8) {
        let mut state = self.lock();
        let percent = percent.min(100);
        if state.outcome.is_some() || percent <= state.progress {
            return;
        }
        state.progress = percent;
        state
            .subscribers
            .retain(|tx| tx.send(BuildEvent::Progress(percent)).is_ok());
    }

    pub(crate) fn finish(&self, outcome: Result<IndexStats, HomophoneError>) {
        let mut state = self.lock();
        if state.outcome.is_some() {
            return;
        }
        if outcome.is_ok() && state.progress < 100 {
            state.progress = 100;
            for tx in &state.subscribers {
                let _ = tx.send(BuildEvent::Progress(100));
            }
        }

        let event = terminal_event(&outcome);
        for tx in state.subscribers.drain(..) {
            let _ = tx.send(event.clone());
        }
        state.outcome = Some(outcome);
    }

    /// Latest reported percentage.
    pub fn progress(&self) -> u8 {
        self.lock().progress
    }

    pub fn is_finished(&self) -> bool {
        self.lock().outcome.is_some()
    }

    /// Stream of build events, starting with the latest progress.
    ///
    /// The stream ends after the terminal `Ready` or `Failed` event, so it can
    /// be drained with a plain `for` loop.
    pub fn subscribe(&self) -> Receiver<BuildEvent> {
        let (tx, rx) = unbounded();
        let mut state = self.lock();
        let _ = tx.send(BuildEvent::Progress(state.progress));
        match state.outcome.as_ref().map(terminal_event) {
            Some(event) => {
                let _ = tx.send(event);
            }
            None => state.subscribers.push(tx),
        }
        rx
    }

    /// Block until the build finishes.
    pub fn wait(&self) -> Result<IndexStats, HomophoneError> {
        for event in self.subscribe() {
            match event {
                BuildEvent::Progress(_) => continue,
                BuildEvent::Ready(stats) => return Ok(stats),
                BuildEvent::Failed(err) => return Err(err),
            }
        }
        Err(HomophoneError::Worker(
            "index build ended without a result".to_string(),
        ))
    }
}

fn terminal_event(outcome: &Result<IndexStats, HomophoneError>) -> BuildEvent {
    match outcome {
        Ok(stats) => BuildEvent::Ready(*stats),
        Err(err) => BuildEvent::Failed(err.clone()),
    }
}
