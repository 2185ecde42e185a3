use std::sync::Arc;

use super::index::{IndexStats, PhonemeIndex};
use super::store::PronunciationStore;

/// Progress granularity used when none is configured.
pub const DEFAULT_PROGRESS_STEP: u8 = 1;

/// Lowest similarity threshold a search may ask for.
pub const MIN_THRESHOLD: u8 = 50;

/// Highest similarity threshold (exact phonetic match).
pub const MAX_THRESHOLD: u8 = 100;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum HomophoneError {
    #[error("Pronunciation data unavailable: {0}")]
    DataUnavailable(String),
    #[error("Phoneme index not ready. Call build_index() and wait for it to finish first.")]
    IndexNotReady,
    #[error("Invalid search request: {0}")]
    InvalidRequest(String),
    #[error("Search was cancelled before it finished")]
    Cancelled,
    #[error("Invalid engine config: {0}")]
    Config(String),
    #[error("Failed to start worker: {0}")]
    Worker(String),
}

/// Everything a search reads: the pronunciation store and the index built
/// from it.
///
/// Shared behind an `Arc` by every search session once the build is done.
/// Nothing mutates a `Corpus` after construction.
pub struct Corpus {
    store: Arc<PronunciationStore>,
    index: PhonemeIndex,
    stats: IndexStats,
}

impl Corpus {
    pub fn new(store: Arc<PronunciationStore>, index: PhonemeIndex) -> Self {
        let stats = index.stats();
        Self {
            store,
            index,
            stats,
        }
    }

    pub fn store(&self) -> &PronunciationStore {
        &self.store
    }

    pub fn index(&self) -> &PhonemeIndex {
        &self.index
    }

    pub fn stats(&self) -> IndexStats {
        self.stats
    }
}
