//! # homophone-rs
//!
//! A Rust library for finding homophones: words that sound the same as, or
//! close to, a given word.
//!
//! ## Features
//!
//! - **Phonetic index**: Groups a pronunciation dictionary (CMUdict format) by
//!   stress-free phoneme sequence, built once on a background thread with
//!   progress reporting
//! - **Fuzzy matching**: Scores phoneme sequences with an edit-distance ratio
//!   so near-homophones are found as well as exact ones
//! - **Frequency-aware ranking**: Filters and orders candidates by usage
//!   frequency (e.g. Zipf scores)
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! homophone-rs = "2026.10"
//! ```
//!
//! ```ignore
//! use homophone_rs::{phonetic::HomophoneEngine, HomophoneFinder};
//!
//! let engine = HomophoneEngine::from_files("data/cmudict.dict", "data/zipf.tsv")?;
//! engine.build_index().wait()?;
//!
//! let outcome = engine.find("night")?;
//! println!("{}", outcome.summary());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod phonetic;

use phonetic::{HomophoneError, IndexPhase, SearchRequest};

/// The outcome of a single homophone search.
///
/// An unknown query word and a known word without homophones both carry no
/// words, but are reported separately so callers can message them differently.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// Homophones ordered by descending frequency, then alphabetically.
    Found(Vec<String>),
    /// The word is in the dictionary but nothing met the thresholds.
    NoMatch,
    /// The word has no entry in the pronunciation dictionary.
    UnknownWord,
}

impl SearchOutcome {
    /// The matched words, empty for `NoMatch` and `UnknownWord`.
    pub fn words(&self) -> &[String] {
        match self {
            SearchOutcome::Found(words) => words,
            SearchOutcome::NoMatch | SearchOutcome::UnknownWord => &[],
        }
    }

    /// A one-line, human-readable description of the outcome.
    pub fn summary(&self) -> String {
        match self {
            SearchOutcome::Found(words) if words.len() == 1 => "Found 1 homophone".to_string(),
            SearchOutcome::Found(words) => format!("Found {} homophones", words.len()),
            SearchOutcome::NoMatch => "No homophones found".to_string(),
            SearchOutcome::UnknownWord => "Word not found in the pronunciation dictionary".to_string(),
        }
    }
}

/// Common interface for homophone search engines.
///
/// Implementors own a phonetic index whose lifecycle is reported through
/// [`IndexPhase`]; searches are only accepted once the index is ready.
pub trait HomophoneFinder {
    /// Current phase of the index lifecycle.
    fn phase(&self) -> IndexPhase;

    /// Run one search, blocking the caller until its result is ready.
    fn execute(&self, request: &SearchRequest) -> Result<SearchOutcome, HomophoneError>;

    /// Search for homophones of `word` using the default request settings.
    ///
    /// Default implementation builds a [`SearchRequest`] for `word` and calls `execute()`.
    fn find(&self, word: &str) -> Result<SearchOutcome, HomophoneError> {
        self.execute(&SearchRequest::for_word(word))
    }
}
