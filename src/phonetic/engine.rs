use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::{HomophoneFinder, SearchOutcome};

use super::build::BuildHandle;
use super::index::build_index;
use super::matcher::SimilarityMetric;
use super::model::{Corpus, HomophoneError, DEFAULT_PROGRESS_STEP, MAX_THRESHOLD, MIN_THRESHOLD};
use super::session::{CancelToken, SearchSession};
use super::store::PronunciationStore;

/// Parameters for configuring the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineParams {
    /// Pronunciation dictionary (CMUdict text, `.json` or `.zip`).
    pub dictionary_path: Option<PathBuf>,
    /// Word frequency table (`word score` lines or `.json`).
    pub frequency_path: Option<PathBuf>,
    /// Number of search worker threads.
    /// `None` uses the rayon default (typically all available cores).
    pub num_threads: Option<usize>,
    /// Minimum percentage advance between two build progress reports. Range: 1–100.
    pub progress_step: u8,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            dictionary_path: None,
            frequency_path: None,
            num_threads: None,
            progress_step: DEFAULT_PROGRESS_STEP,
        }
    }
}

impl EngineParams {
    /// Read parameters from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, HomophoneError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| HomophoneError::Config(format!("{}: {e}", path.display())))?;
        let params: Self = serde_json::from_str(&content)
            .map_err(|e| HomophoneError::Config(format!("Failed to parse JSON: {e}")))?;

        if !(1..=100).contains(&params.progress_step) {
            return Err(HomophoneError::Config(format!(
                "progress_step must be within 1..=100, got {}",
                params.progress_step
            )));
        }
        Ok(params)
    }
}

/// Parameters for one homophone search.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(default, setter(into), build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct SearchRequest {
    /// Word to find homophones for. Trimmed and lowercased before lookup.
    pub word: String,
    /// Minimum similarity score. Range: 50–100, where 100 is an exact phonetic match.
    pub threshold: u8,
    /// Lowest frequency a result may have when `use_freq_filter` is set.
    #[builder(setter(into, strip_option))]
    pub min_frequency: Option<f64>,
    /// Maximum number of results, 0 for no limit.
    pub result_cap: usize,
    /// Drop words below `min_frequency` and words of unknown frequency.
    pub use_freq_filter: bool,
    pub metric: SimilarityMetric,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            word: String::new(),
            threshold: 90,
            min_frequency: Some(2.0),
            result_cap: 10,
            use_freq_filter: true,
            metric: SimilarityMetric::default(),
        }
    }
}

impl SearchRequest {
    /// Default settings for `word`.
    pub fn for_word(word: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            ..Self::default()
        }
    }

    /// Every homophone of `word`, without frequency filter or result cap.
    pub fn unlimited(word: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            result_cap: 0,
            use_freq_filter: false,
            ..Self::default()
        }
    }

    pub fn normalized_word(&self) -> String {
        self.word.trim().to_lowercase()
    }

    pub fn validate(&self) -> Result<(), HomophoneError> {
        check_request(&self.word, self.threshold).map_err(HomophoneError::InvalidRequest)
    }
}

impl SearchRequestBuilder {
    fn validate(&self) -> Result<(), String> {
        let defaults = SearchRequest::default();
        check_request(
            self.word.as_deref().unwrap_or_default(),
            self.threshold.unwrap_or(defaults.threshold),
        )
    }
}

impl From<SearchRequestBuilderError> for HomophoneError {
    fn from(err: SearchRequestBuilderError) -> Self {
        HomophoneError::InvalidRequest(err.to_string())
    }
}

fn check_request(word: &str, threshold: u8) -> Result<(), String> {
    if word.trim().is_empty() {
        return Err("word must not be empty".to_string());
    }
    if !(MIN_THRESHOLD..=MAX_THRESHOLD).contains(&threshold) {
        return Err(format!(
            "threshold must be within {MIN_THRESHOLD}..={MAX_THRESHOLD}, got {threshold}"
        ));
    }
    Ok(())
}

/// Lifecycle of the phonetic index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPhase {
    Unbuilt,
    Building,
    Ready,
}

enum IndexState {
    Unbuilt,
    Building(BuildHandle),
    Ready(Arc<Corpus>),
}

#[derive(Clone)]
enum CorpusSource {
    Files {
        dictionary: PathBuf,
        frequencies: PathBuf,
    },
    Store(Arc<PronunciationStore>),
}

/// Homophone search engine.
///
/// Owns the index lifecycle (`Unbuilt → Building → Ready`) and a worker pool
/// for searches. The built corpus is shared read-only by every search.
///
/// # Quick Start
///
/// ```rust,no_run
/// use homophone_rs::{HomophoneFinder, phonetic::HomophoneEngine};
///
/// let engine = HomophoneEngine::from_files("data/cmudict.dict", "data/zipf.tsv")?;
/// engine.build_index().wait()?;
/// let outcome = engine.find("night")?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
///
/// # Background Searches
///
/// ```rust,no_run
/// use homophone_rs::phonetic::{HomophoneEngine, SearchRequest};
///
/// let engine = HomophoneEngine::from_files("data/cmudict.dict", "data/zipf.tsv")?;
/// engine.build_index().wait()?;
///
/// let stale = engine.search(SearchRequest::for_word("their"))?;
/// // Supersedes `stale`, which resolves to `Cancelled` if still running.
/// let fresh = engine.search(SearchRequest::for_word("there"))?;
/// println!("{:?}", fresh.wait()?.words());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct HomophoneEngine {
    source: CorpusSource,
    progress_step: u8,
    state: Arc<Mutex<IndexState>>,
    latest_search: Arc<AtomicU64>,
    pool: Arc<rayon::ThreadPool>,
}

impl HomophoneEngine {
    /// Create an engine that loads its data from the files named in `params`.
    pub fn new(params: EngineParams) -> Result<Self, HomophoneError> {
        let (Some(dictionary), Some(frequencies)) =
            (params.dictionary_path.clone(), params.frequency_path.clone())
        else {
            return Err(HomophoneError::Config(
                "dictionary_path and frequency_path are required".to_string(),
            ));
        };
        Self::with_source(
            CorpusSource::Files {
                dictionary,
                frequencies,
            },
            &params,
        )
    }

    /// Create an engine for a dictionary and frequency table on disk, with
    /// default parameters.
    pub fn from_files(
        dictionary: impl AsRef<Path>,
        frequencies: impl AsRef<Path>,
    ) -> Result<Self, HomophoneError> {
        Self::new(EngineParams {
            dictionary_path: Some(dictionary.as_ref().to_path_buf()),
            frequency_path: Some(frequencies.as_ref().to_path_buf()),
            ..EngineParams::default()
        })
    }

    /// Create an engine over an already-loaded store. The data paths in
    /// `params` are ignored.
    pub fn with_store(
        store: PronunciationStore,
        params: EngineParams,
    ) -> Result<Self, HomophoneError> {
        Self::with_source(CorpusSource::Store(Arc::new(store)), &params)
    }

    fn with_source(source: CorpusSource, params: &EngineParams) -> Result<Self, HomophoneError> {
        let mut pool = rayon::ThreadPoolBuilder::new()
            .thread_name(|i| format!("homophone-search-{i}"));
        if let Some(threads) = params.num_threads {
            pool = pool.num_threads(threads);
        }
        let pool = pool
            .build()
            .map_err(|e| HomophoneError::Worker(format!("search pool: {e}")))?;

        Ok(Self {
            source,
            progress_step: params.progress_step.clamp(1, 100),
            state: Arc::new(Mutex::new(IndexState::Unbuilt)),
            latest_search: Arc::new(AtomicU64::new(0)),
            pool: Arc::new(pool),
        })
    }

    /// Start building the index on a background thread.
    ///
    /// Only one build runs at a time: while building, the in-flight handle is
    /// returned; once ready, an already-finished handle is returned.
    pub fn build_index(&self) -> BuildHandle {
        let mut state = lock(&self.state);
        match &*state {
            IndexState::Building(handle) => return handle.clone(),
            IndexState::Ready(corpus) => return BuildHandle::finished(Ok(corpus.stats())),
            IndexState::Unbuilt => {}
        }

        let handle = BuildHandle::new();
        *state = IndexState::Building(handle.clone());
        drop(state);

        let state = self.state.clone();
        let task = handle.clone();
        let source = self.source.clone();
        let step = self.progress_step;

        let spawned = thread::Builder::new()
            .name("phoneme-index".to_string())
            .spawn(move || {
                let guard = BuildGuard {
                    state,
                    handle: task,
                    done: false,
                };
                let result = load_corpus(&source, step, |p| guard.handle.report_progress(p));
                guard.complete(result);
            });

        if let Err(e) = spawned {
            *lock(&self.state) = IndexState::Unbuilt;
            handle.finish(Err(HomophoneError::Worker(format!("index thread: {e}"))));
        }
        handle
    }

    /// The built corpus, or `IndexNotReady`.
    pub fn corpus(&self) -> Result<Arc<Corpus>, HomophoneError> {
        match &*lock(&self.state) {
            IndexState::Ready(corpus) => Ok(corpus.clone()),
            IndexState::Unbuilt | IndexState::Building(_) => Err(HomophoneError::IndexNotReady),
        }
    }

    /// Run a search on the worker pool.
    ///
    /// Issuing a search supersedes every earlier one: searches still running
    /// stop and resolve to `Cancelled`.
    pub fn search(&self, request: SearchRequest) -> Result<SearchTask, HomophoneError> {
        request.validate()?;
        let corpus = self.corpus()?;

        let generation = self.latest_search.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancelToken::with_generation(self.latest_search.clone(), generation);
        let session = SearchSession::new(corpus, request, cancel.clone());
        let (tx, rx) = bounded(1);

        self.pool.spawn(move || {
            let _ = tx.send(session.execute());
        });

        Ok(SearchTask {
            receiver: rx,
            cancel,
            generation,
        })
    }
}

impl HomophoneFinder for HomophoneEngine {
    fn phase(&self) -> IndexPhase {
        match &*lock(&self.state) {
            IndexState::Unbuilt => IndexPhase::Unbuilt,
            IndexState::Building(_) => IndexPhase::Building,
            IndexState::Ready(_) => IndexPhase::Ready,
        }
    }

    /// Blocks the caller while the search runs on the worker pool. Never
    /// superseded by other searches.
    fn execute(&self, request: &SearchRequest) -> Result<SearchOutcome, HomophoneError> {
        request.validate()?;
        let corpus = self.corpus()?;
        let session = SearchSession::new(corpus, request.clone(), CancelToken::new());
        self.pool.install(|| session.execute())
    }
}

/// A search running on the engine's worker pool.
pub struct SearchTask {
    receiver: Receiver<Result<SearchOutcome, HomophoneError>>,
    cancel: CancelToken,
    generation: u64,
}

impl SearchTask {
    /// Position of this search in the engine's issue order, starting at 1.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Abandon the search. A search still scanning resolves to `Cancelled`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// True once the search was cancelled or superseded.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Block until the search finishes.
    pub fn wait(self) -> Result<SearchOutcome, HomophoneError> {
        self.receiver.recv().unwrap_or_else(|_| Err(worker_gone()))
    }

    /// Block for at most `timeout`; `None` if the search is still running.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<SearchOutcome, HomophoneError>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(worker_gone())),
        }
    }

    /// The result if the search has finished, without blocking.
    pub fn try_result(&self) -> Option<Result<SearchOutcome, HomophoneError>> {
        self.wait_timeout(Duration::ZERO)
    }
}

/// The worker dropped its sender without reporting a result.
fn worker_gone() -> HomophoneError {
    HomophoneError::Worker("search worker stopped without a result".to_string())
}

/// Moves the engine out of `Building` when the build thread ends, including
/// when it panics.
struct BuildGuard {
    state: Arc<Mutex<IndexState>>,
    handle: BuildHandle,
    done: bool,
}

impl BuildGuard {
    fn complete(mut self, result: Result<Corpus, HomophoneError>) {
        match result {
            Ok(corpus) => {
                let stats = corpus.stats();
                *lock(&self.state) = IndexState::Ready(Arc::new(corpus));
                self.handle.finish(Ok(stats));
            }
            Err(err) => {
                log::error!("Phoneme index build failed: {err}");
                *lock(&self.state) = IndexState::Unbuilt;
                self.handle.finish(Err(err));
            }
        }
        self.done = true;
    }
}

impl Drop for BuildGuard {
    fn drop(&mut self) {
        if !self.done {
            *lock(&self.state) = IndexState::Unbuilt;
            self.handle.finish(Err(HomophoneError::Worker(
                "index build thread panicked".to_string(),
            )));
        }
    }
}

fn load_corpus<F>(source: &CorpusSource, step: u8, on_progress: F) -> Result<Corpus, HomophoneError>
where
    F: FnMut(u8),
{
    let store = match source {
        CorpusSource::Files {
            dictionary,
            frequencies,
        } => Arc::new(PronunciationStore::load(dictionary, frequencies)?),
        CorpusSource::Store(store) => store.clone(),
    };
    let index = build_index(&store, step, on_progress);
    Ok(Corpus::new(store, index))
}

fn lock(state: &Mutex<IndexState>) -> MutexGuard<'_, IndexState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::{
        EngineParams, HomophoneEngine, IndexPhase, SearchRequest, SearchRequestBuilder, SearchTask,
    };
    use crate::phonetic::store::{parse_cmudict, PronunciationStore};
    use crate::phonetic::{BuildEvent, CancelToken, FrequencyTable, HomophoneError, SimilarityMetric};
    use crate::{HomophoneFinder, SearchOutcome};
    use crossbeam_channel::bounded;
    use std::io::Write;
    use std::sync::Arc;
    use std::time::Duration;

    const DICT: &str = "night N AY1 T
knight N AY1 T
nite N AY1 T
nine N AY1 N
there DH EH1 R
their DH EH1 R
they're DH EH1 R
";

    fn store() -> PronunciationStore {
        let freqs: FrequencyTable = [
            ("night", 5.4),
            ("knight", 3.6),
            ("nite", 1.5),
            ("nine", 5.0),
            ("there", 6.5),
            ("their", 6.3),
            ("they're", 5.6),
        ]
        .into_iter()
        .map(|(w, f)| (w.to_string(), f))
        .collect();
        PronunciationStore::new(parse_cmudict(DICT).unwrap(), Arc::new(freqs))
    }

    fn engine() -> HomophoneEngine {
        HomophoneEngine::with_store(store(), EngineParams::default()).unwrap()
    }

    fn ready_engine() -> HomophoneEngine {
        let engine = engine();
        engine.build_index().wait().unwrap();
        engine
    }

    #[test]
    fn searches_before_ready_are_rejected() {
        let engine = engine();
        assert_eq!(engine.phase(), IndexPhase::Unbuilt);
        assert_eq!(engine.find("night"), Err(HomophoneError::IndexNotReady));
        assert!(matches!(
            engine.search(SearchRequest::for_word("night")),
            Err(HomophoneError::IndexNotReady)
        ));
    }

    #[test]
    fn build_reaches_ready_with_full_progress() {
        let engine = engine();
        let handle = engine.build_index();
        let events: Vec<BuildEvent> = handle.subscribe().iter().collect();

        let progress: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                BuildEvent::Progress(p) => Some(*p),
                _ => None,
            })
            .collect();
        assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{progress:?}");
        assert_eq!(progress.last(), Some(&100));
        assert!(matches!(events.last(), Some(BuildEvent::Ready(_))));
        assert_eq!(engine.phase(), IndexPhase::Ready);
    }

    #[test]
    fn repeated_build_requests_share_one_build() {
        let engine = engine();
        let first = engine.build_index();
        let second = engine.build_index();
        let stats = first.wait().unwrap();
        assert_eq!(second.wait().unwrap(), stats);

        let after = engine.build_index();
        assert!(after.is_finished());
        assert_eq!(after.wait().unwrap(), stats);
        assert_eq!(stats.words, 7);
        assert_eq!(stats.sequences, 3);
    }

    #[test]
    fn night_query_returns_knight_but_not_itself() {
        let engine = ready_engine();
        let request = SearchRequest {
            threshold: 100,
            ..SearchRequest::for_word("night")
        };
        let outcome = engine.execute(&request).unwrap();
        assert_eq!(outcome, SearchOutcome::Found(vec!["knight".to_string()]));
    }

    #[test]
    fn unknown_word_is_distinct_from_no_match() {
        let engine = ready_engine();
        assert_eq!(engine.find("qwxyz").unwrap(), SearchOutcome::UnknownWord);

        let request = SearchRequest {
            min_frequency: Some(9.0),
            ..SearchRequest::for_word("there")
        };
        assert_eq!(engine.execute(&request).unwrap(), SearchOutcome::NoMatch);
    }

    #[test]
    fn background_search_delivers_result() {
        let engine = ready_engine();
        let task = engine.search(SearchRequest::unlimited("there")).unwrap();
        assert_eq!(task.generation(), 1);
        let outcome = task.wait().unwrap();
        assert_eq!(outcome.words(), ["their".to_string(), "they're".to_string()]);
    }

    #[test]
    fn newer_search_supersedes_older() {
        let engine = ready_engine();
        let stale = engine.search(SearchRequest::for_word("night")).unwrap();
        let fresh = engine.search(SearchRequest::for_word("there")).unwrap();

        assert!(stale.is_cancelled());
        assert!(!fresh.is_cancelled());
        assert!(fresh.wait().is_ok());
        // The stale search either finished before noticing or was cancelled.
        match stale.wait() {
            Ok(_) | Err(HomophoneError::Cancelled) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn cancelled_task_still_resolves() {
        let engine = ready_engine();
        let task = engine.search(SearchRequest::unlimited("there")).unwrap();
        task.cancel();
        assert!(task.is_cancelled());

        let result = task
            .wait_timeout(Duration::from_secs(5))
            .expect("search did not resolve in time");
        match result {
            Ok(_) | Err(HomophoneError::Cancelled) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn dropped_worker_reports_worker_error() {
        let (sender, receiver) = bounded(1);
        let task = SearchTask {
            receiver,
            cancel: CancelToken::new(),
            generation: 1,
        };
        assert!(task.try_result().is_none());
        drop(sender);

        assert!(matches!(task.try_result(), Some(Err(HomophoneError::Worker(_)))));
        assert!(matches!(task.wait(), Err(HomophoneError::Worker(_))));
    }

    #[test]
    fn concurrent_blocking_searches_agree() {
        let engine = Arc::new(ready_engine());
        let request = SearchRequest {
            threshold: 70,
            metric: SimilarityMetric::Levenshtein,
            ..SearchRequest::unlimited("night")
        };
        let expected = engine.execute(&request).unwrap();

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let engine = engine.clone();
                let request = request.clone();
                std::thread::spawn(move || engine.execute(&request).unwrap())
            })
            .collect();
        for worker in workers {
            assert_eq!(worker.join().unwrap(), expected);
        }
        assert!(expected.words().contains(&"nine".to_string()));
    }

    #[test]
    fn builder_validates_requests() {
        let request = SearchRequestBuilder::default()
            .word("night")
            .threshold(80u8)
            .min_frequency(3.0)
            .build()
            .unwrap();
        assert_eq!(request.min_frequency, Some(3.0));
        assert_eq!(request.result_cap, 10);

        assert!(SearchRequestBuilder::default().build().is_err());
        let err: HomophoneError = SearchRequestBuilder::default()
            .word("night")
            .threshold(101u8)
            .build()
            .unwrap_err()
            .into();
        assert!(matches!(err, HomophoneError::InvalidRequest(_)));
    }

    #[test]
    fn missing_data_fails_the_build_and_allows_retry() {
        let dir = tempfile::tempdir().unwrap();
        let dict_path = dir.path().join("cmudict.dict");
        let freq_path = dir.path().join("zipf.tsv");
        std::fs::write(&freq_path, "night 5.4\nknight 3.6\n").unwrap();

        let engine = HomophoneEngine::from_files(&dict_path, &freq_path).unwrap();
        let err = engine.build_index().wait().unwrap_err();
        assert!(matches!(err, HomophoneError::DataUnavailable(_)));
        assert_eq!(engine.phase(), IndexPhase::Unbuilt);

        std::fs::File::create(&dict_path)
            .unwrap()
            .write_all(b"night N AY1 T\nknight N AY1 T\n")
            .unwrap();
        engine.build_index().wait().unwrap();
        assert_eq!(engine.phase(), IndexPhase::Ready);
        assert_eq!(
            engine.find("night").unwrap(),
            SearchOutcome::Found(vec!["knight".to_string()])
        );
    }

    #[test]
    fn params_load_from_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"dictionary_path": "cmudict.dict", "num_threads": 2, "progress_step": 5}}"#
        )
        .unwrap();
        let params = EngineParams::from_json_file(file.path()).unwrap();
        assert_eq!(params.num_threads, Some(2));
        assert_eq!(params.progress_step, 5);
        assert!(params.frequency_path.is_none());

        assert!(matches!(
            HomophoneEngine::new(params),
            Err(HomophoneError::Config(_))
        ));
    }
}
