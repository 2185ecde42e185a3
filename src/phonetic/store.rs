use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use super::frequency::{FrequencyOracle, FrequencyTable};
use super::model::HomophoneError;

/// One way of saying a word: an ordered list of phoneme symbols as they
/// appear in the dictionary, stress digits included (e.g. `["N", "AY1", "T"]`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pronunciation(Vec<String>);

impl Pronunciation {
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(symbols.into_iter().map(Into::into).collect())
    }

    pub fn symbols(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Word → pronunciations dictionary plus a frequency oracle.
///
/// Immutable once constructed. Words are stored lowercase and iterated in
/// sorted order, which keeps index builds deterministic.
pub struct PronunciationStore {
    entries: BTreeMap<String, Vec<Pronunciation>>,
    oracle: Arc<dyn FrequencyOracle>,
}

impl PronunciationStore {
    /// Create a store from already-loaded data.
    ///
    /// Words are lowercased; pronunciations of words that differ only by case
    /// are merged, and duplicate or empty pronunciations are dropped.
    pub fn new<I>(dictionary: I, oracle: Arc<dyn FrequencyOracle>) -> Self
    where
        I: IntoIterator<Item = (String, Vec<Pronunciation>)>,
    {
        let mut entries: BTreeMap<String, Vec<Pronunciation>> = BTreeMap::new();
        for (word, prons) in dictionary {
            let slot = entries.entry(word.to_lowercase()).or_default();
            for pron in prons {
                if !pron.is_empty() && !slot.contains(&pron) {
                    slot.push(pron);
                }
            }
        }
        entries.retain(|_, prons| !prons.is_empty());
        Self { entries, oracle }
    }

    /// Load the dictionary and the frequency table from disk.
    ///
    /// The dictionary format is chosen by extension: `.json` for a word →
    /// pronunciation-list object, `.zip` for an archive holding a CMUdict text
    /// file (requires the `archive` feature), CMUdict text otherwise.
    pub fn load(dictionary_path: &Path, frequency_path: &Path) -> Result<Self, HomophoneError> {
        log::info!("Loading pronunciations from {}", dictionary_path.display());
        let dictionary = load_dictionary(dictionary_path)?;
        let frequencies = FrequencyTable::load(frequency_path)?;

        let store = Self::new(dictionary, Arc::new(frequencies));
        log::info!("Loaded pronunciations for {} words", store.len());
        Ok(store)
    }

    /// Pronunciations of `word`, empty if the word is unknown.
    pub fn pronunciations_of(&self, word: &str) -> &[Pronunciation] {
        let found = match self.entries.get(word) {
            Some(prons) => Some(prons),
            None => self.entries.get(&word.to_lowercase()),
        };
        found.map(Vec::as_slice).unwrap_or_default()
    }

    /// Usage frequency of `word`, or `None` if the oracle does not know it.
    pub fn frequency_of(&self, word: &str) -> Option<f64> {
        self.oracle.frequency_of(&word.to_lowercase())
    }

    pub fn oracle(&self) -> &dyn FrequencyOracle {
        self.oracle.as_ref()
    }

    /// All words with their pronunciations, in sorted word order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&str, &[Pronunciation])> {
        self.entries
            .iter()
            .map(|(word, prons)| (word.as_str(), prons.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn load_dictionary(path: &Path) -> Result<Vec<(String, Vec<Pronunciation>)>, HomophoneError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => {
            let content = read_to_string(path)?;
            parse_json_dictionary(&content)
        }
        Some("zip") => read_archive(path).and_then(|content| parse_cmudict(&content)),
        _ => {
            let content = read_to_string(path)?;
            parse_cmudict(&content)
        }
    }
}

fn read_to_string(path: &Path) -> Result<String, HomophoneError> {
    std::fs::read_to_string(path)
        .map_err(|e| HomophoneError::DataUnavailable(format!("{}: {e}", path.display())))
}

/// Parse CMUdict text.
///
/// ```text
/// ;;; comment
/// read R EH1 D
/// read(2) R IY1 D   # past tense
/// ```
///
/// Variant markers like `(2)` are removed and the variants are collected
/// under the bare word.
pub fn parse_cmudict(content: &str) -> Result<Vec<(String, Vec<Pronunciation>)>, HomophoneError> {
    let mut dict: BTreeMap<String, Vec<Pronunciation>> = BTreeMap::new();

    for (line_no, raw) in content.lines().enumerate() {
        if raw.starts_with(";;;") {
            continue;
        }
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        let mut tokens = line.split_whitespace();
        let Some(term) = tokens.next() else {
            continue;
        };
        let word = strip_variant_marker(term).to_lowercase();
        let symbols: Vec<&str> = tokens.collect();
        if word.is_empty() || symbols.is_empty() {
            return Err(HomophoneError::DataUnavailable(format!(
                "Invalid dictionary entry at line {}: {line:?}",
                line_no + 1
            )));
        }

        dict.entry(word).or_default().push(Pronunciation::new(symbols));
    }

    Ok(dict.into_iter().collect())
}

/// `"read(2)"` → `"read"`. Terms without a trailing `(N)` are returned as is.
fn strip_variant_marker(term: &str) -> &str {
    match term.rfind('(') {
        Some(open)
            if term.ends_with(')')
                && term[open + 1..term.len() - 1]
                    .chars()
                    .all(|c| c.is_ascii_digit()) =>
        {
            &term[..open]
        }
        _ => term,
    }
}

/// Parse a JSON object mapping each word to a list of pronunciations, each a
/// list of phoneme symbols.
pub fn parse_json_dictionary(
    content: &str,
) -> Result<Vec<(String, Vec<Pronunciation>)>, HomophoneError> {
    let parsed: BTreeMap<String, Vec<Vec<String>>> = serde_json::from_str(content).map_err(|e| {
        HomophoneError::DataUnavailable(format!("Failed to parse dictionary JSON: {e}"))
    })?;

    Ok(parsed
        .into_iter()
        .map(|(word, prons)| (word, prons.into_iter().map(Pronunciation::new).collect()))
        .collect())
}

/// Read the first file entry of a zip archive as text.
#[cfg(feature = "archive")]
fn read_archive(path: &Path) -> Result<String, HomophoneError> {
    use std::io::Read;

    let file = std::fs::File::open(path)
        .map_err(|e| HomophoneError::DataUnavailable(format!("{}: {e}", path.display())))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| {
        HomophoneError::DataUnavailable(format!("Failed to open zip archive: {e}"))
    })?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| {
            HomophoneError::DataUnavailable(format!("Failed to read zip entry {i}: {e}"))
        })?;
        if entry.is_dir() {
            continue;
        }

        let name = entry.name().to_string();
        let mut content = String::new();
        entry.read_to_string(&mut content).map_err(|e| {
            HomophoneError::DataUnavailable(format!("Failed to read {name}: {e}"))
        })?;
        log::info!("Using dictionary entry {name} from {}", path.display());
        return Ok(content);
    }

    Err(HomophoneError::DataUnavailable(format!(
        "No dictionary file found in {}",
        path.display()
    )))
}

#[cfg(not(feature = "archive"))]
fn read_archive(path: &Path) -> Result<String, HomophoneError> {
    Err(HomophoneError::DataUnavailable(format!(
        "{} is a zip archive; enable the `archive` feature to read it",
        path.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::{parse_cmudict, parse_json_dictionary, strip_variant_marker, Pronunciation, PronunciationStore};
    use crate::phonetic::{FrequencyTable, HomophoneError};
    use std::io::Write;
    use std::sync::Arc;

    const SAMPLE: &str = ";;; sample
NIGHT N AY1 T
knight N AY1 T
read R EH1 D
read(2) R IY1 D # present tense
";

    #[test]
    fn parses_cmudict_variants_and_comments() {
        let dict = parse_cmudict(SAMPLE).unwrap();
        let words: Vec<&str> = dict.iter().map(|(w, _)| w.as_str()).collect();
        assert_eq!(words, vec!["knight", "night", "read"]);

        let (_, read) = &dict[2];
        assert_eq!(read.len(), 2);
        assert_eq!(read[1], Pronunciation::new(["R", "IY1", "D"]));
    }

    #[test]
    fn rejects_entry_without_phonemes() {
        let err = parse_cmudict("night N AY1 T\norphan\n").unwrap_err();
        match err {
            HomophoneError::DataUnavailable(msg) => assert!(msg.contains("line 2"), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn strips_only_numeric_variant_markers() {
        assert_eq!(strip_variant_marker("read(2)"), "read");
        assert_eq!(strip_variant_marker("(paren"), "(paren");
        assert_eq!(strip_variant_marker("a.m."), "a.m.");
    }

    #[test]
    fn parses_json_dictionary() {
        let dict = parse_json_dictionary(r#"{"night": [["N", "AY1", "T"]]}"#).unwrap();
        assert_eq!(dict[0].1[0].symbols(), ["N", "AY1", "T"]);
    }

    #[test]
    fn lookups_are_case_insensitive_and_unknown_words_are_empty() {
        let freqs: FrequencyTable = [("night".to_string(), 5.0)].into_iter().collect();
        let store = PronunciationStore::new(parse_cmudict(SAMPLE).unwrap(), Arc::new(freqs));

        assert_eq!(store.pronunciations_of("Night").len(), 1);
        assert!(store.pronunciations_of("day").is_empty());
        assert_eq!(store.frequency_of("NIGHT"), Some(5.0));
        assert_eq!(store.frequency_of("knight"), None);
    }

    #[test]
    fn merges_case_variants_and_drops_duplicate_pronunciations() {
        let store = PronunciationStore::new(
            vec![
                ("Read".to_string(), vec![Pronunciation::new(["R", "EH1", "D"])]),
                (
                    "read".to_string(),
                    vec![
                        Pronunciation::new(["R", "EH1", "D"]),
                        Pronunciation::new(Vec::<String>::new()),
                    ],
                ),
            ],
            Arc::new(FrequencyTable::default()),
        );
        assert_eq!(store.len(), 1);
        assert_eq!(store.pronunciations_of("read").len(), 1);
    }

    #[test]
    fn loads_both_files_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let dict_path = dir.path().join("cmudict.dict");
        let freq_path = dir.path().join("zipf.tsv");
        std::fs::File::create(&dict_path)
            .unwrap()
            .write_all(SAMPLE.as_bytes())
            .unwrap();
        std::fs::write(&freq_path, "night 5.2\nknight 3.4\n").unwrap();

        let store = PronunciationStore::load(&dict_path, &freq_path).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.frequency_of("knight"), Some(3.4));
    }

    #[test]
    fn missing_dictionary_is_data_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let freq_path = dir.path().join("zipf.tsv");
        std::fs::write(&freq_path, "night 5.2\n").unwrap();

        let result = PronunciationStore::load(&dir.path().join("absent.dict"), &freq_path);
        assert!(matches!(result, Err(HomophoneError::DataUnavailable(_))));
    }
}
