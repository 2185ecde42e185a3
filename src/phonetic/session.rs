use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::SearchOutcome;

use super::engine::SearchRequest;
use super::index::NormalizedSequence;
use super::matcher::find_matches;
use super::model::{Corpus, HomophoneError};
use super::ranker::rank;

/// Cooperative cancellation for one search.
///
/// A token fires when [`cancel`](Self::cancel) is called on any clone, or,
/// for tokens handed out by the engine, once a newer search has been issued.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    superseded: Option<(Arc<AtomicU64>, u64)>,
}

impl CancelToken {
    /// A token that only fires when cancelled explicitly.
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that also fires once `latest` moves past `generation`.
    pub(crate) fn with_generation(latest: Arc<AtomicU64>, generation: u64) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            superseded: Some((latest, generation)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
            || self
                .superseded
                .as_ref()
                .is_some_and(|(latest, generation)| latest.load(Ordering::Relaxed) != *generation)
    }
}

/// One search request run against a built corpus.
pub struct SearchSession {
    corpus: Arc<Corpus>,
    request: SearchRequest,
    cancel: CancelToken,
}

impl SearchSession {
    pub fn new(corpus: Arc<Corpus>, request: SearchRequest, cancel: CancelToken) -> Self {
        Self {
            corpus,
            request,
            cancel,
        }
    }

    pub fn request(&self) -> &SearchRequest {
        &self.request
    }

    /// Look up the query's pronunciations, match them against the index and
    /// rank the words found.
    pub fn execute(&self) -> Result<SearchOutcome, HomophoneError> {
        self.request.validate()?;
        let start = Instant::now();
        let word = self.request.normalized_word();

        let queries = self.query_sequences(&word);
        if queries.is_empty() {
            log::debug!("{word:?} has no pronunciation entry");
            return Ok(SearchOutcome::UnknownWord);
        }

        let matches = find_matches(
            self.corpus.index(),
            &queries,
            self.request.threshold,
            self.request.metric,
            &self.cancel,
        )?;
        let words = rank(
            self.corpus.index(),
            &matches,
            &self.request,
            self.corpus.store().oracle(),
        );

        log::debug!(
            "Search for {word:?}: {} sequences, {} words in {:.2?}",
            matches.len(),
            words.len(),
            start.elapsed()
        );

        if self.cancel.is_cancelled() {
            return Err(HomophoneError::Cancelled);
        }
        if words.is_empty() {
            Ok(SearchOutcome::NoMatch)
        } else {
            Ok(SearchOutcome::Found(words))
        }
    }

    /// Distinct normalized sequences of the query word, in dictionary order.
    fn query_sequences(&self, word: &str) -> Vec<NormalizedSequence> {
        let mut sequences: Vec<NormalizedSequence> = Vec::new();
        for pron in self.corpus.store().pronunciations_of(word) {
            let sequence = NormalizedSequence::from_pronunciation(pron);
            if !sequence.symbols().is_empty() && !sequences.contains(&sequence) {
                sequences.push(sequence);
            }
        }
        sequences
    }
}
