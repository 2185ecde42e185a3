//! Phonetic homophone search.
//!
//! This module builds an index of a pronunciation dictionary keyed by
//! stress-free phoneme sequence and answers fuzzy "what sounds like this
//! word?" queries against it.
//!
//! # Data Files
//!
//! ```text
//! data/
//! ├── cmudict.dict   # Pronunciation dictionary (CMUdict text, .json or .zip)
//! └── zipf.tsv       # Word frequencies, one "word score" pair per line (or .json)
//! ```
//!
//! Download links:
//! - Dictionary: <https://github.com/cmusphinx/cmudict>
//! - Frequencies: any Zipf-scale word list, e.g. exported from `wordfreq`
//!
//! # Dictionary Format
//!
//! ```text
//! ;;; comment lines are ignored
//! night N AY1 T
//! knight N AY1 T
//! read R EH1 D
//! read(2) R IY1 D
//! ```
//!
//! Stress digits are stripped when indexing, so `AY1` and `AY0` index alike.
//!
//! # Lifecycle
//!
//! | Phase | `build_index()` | `search()` / `execute()` |
//! |---|---|---|
//! | `Unbuilt` | starts a build | `IndexNotReady` |
//! | `Building` | returns the in-flight handle | `IndexNotReady` |
//! | `Ready` | returns a finished handle | runs the search |
//!
//! A failed build goes back to `Unbuilt` so the caller can retry.
//!
//! # Examples
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use homophone_rs::{HomophoneFinder, phonetic::HomophoneEngine};
//!
//! let engine = HomophoneEngine::from_files("data/cmudict.dict", "data/zipf.tsv")?;
//! engine.build_index().wait()?;
//!
//! let outcome = engine.find("night")?;
//! println!("{:?}", outcome.words());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## With Custom Tolerance
//!
//! ```rust,no_run
//! use homophone_rs::phonetic::{HomophoneEngine, SearchRequestBuilder};
//!
//! let engine = HomophoneEngine::from_files("data/cmudict.dict", "data/zipf.tsv")?;
//! let build = engine.build_index();
//! for event in build.subscribe() {
//!     println!("{event:?}");
//! }
//!
//! let request = SearchRequestBuilder::default()
//!     .word("there")
//!     .threshold(75u8)
//!     .result_cap(20usize)
//!     .build()?;
//! let outcome = engine.search(request)?.wait()?;
//! println!("{}", outcome.summary());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod build;
pub mod engine;
pub mod frequency;
pub mod index;
pub mod matcher;
pub mod model;
pub mod ranker;
pub mod session;
pub mod store;

pub use build::{BuildEvent, BuildHandle};
pub use engine::{
    EngineParams, HomophoneEngine, IndexPhase, SearchRequest, SearchRequestBuilder,
    SearchRequestBuilderError, SearchTask,
};
pub use frequency::{FrequencyOracle, FrequencyTable};
pub use index::{IndexStats, NormalizedSequence, PhonemeIndex};
pub use matcher::{MatchSet, SimilarityMetric};
pub use model::{Corpus, HomophoneError};
pub use session::{CancelToken, SearchSession};
pub use store::{Pronunciation, PronunciationStore};
