use std::collections::HashMap;
use std::fmt;

use super::store::{Pronunciation, PronunciationStore};

/// A pronunciation with stress digits removed; the key of the phonetic index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedSequence(Vec<String>);

impl NormalizedSequence {
    /// Strip the trailing stress digit from every symbol (`AY1` → `AY`).
    /// Symbols that become empty are dropped.
    pub fn from_pronunciation(pron: &Pronunciation) -> Self {
        Self(
            pron.symbols()
                .iter()
                .map(|symbol| normalize_symbol(symbol))
                .filter(|symbol| !symbol.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn symbols(&self) -> &[String] {
        &self.0
    }

    /// Symbols joined by single spaces, the form similarity is scored on.
    pub fn rendered(&self) -> String {
        self.0.join(" ")
    }
}

impl<S: Into<String>> FromIterator<S> for NormalizedSequence {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for NormalizedSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered())
    }
}

fn normalize_symbol(symbol: &str) -> &str {
    symbol
        .strip_suffix(|c: char| c.is_ascii_digit())
        .unwrap_or(symbol)
}

/// One distinct normalized sequence and the words pronounced that way.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    sequence: NormalizedSequence,
    rendered: String,
    words: Vec<String>,
}

impl IndexEntry {
    pub fn sequence(&self) -> &NormalizedSequence {
        &self.sequence
    }

    /// Cached `sequence.rendered()`.
    pub fn rendered(&self) -> &str {
        &self.rendered
    }

    /// Words indexed under this sequence. Order is unspecified.
    pub fn words(&self) -> &[String] {
        &self.words
    }
}

/// Summary numbers for a built index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Words consumed from the store.
    pub words: usize,
    /// Distinct normalized sequences.
    pub sequences: usize,
    /// Sequences shared by more than one word.
    pub collisions: usize,
}

/// Words grouped by normalized phoneme sequence.
///
/// Entries live in a single arena; `lookup` maps a sequence to its slot.
/// The index is never modified after [`build_index`] returns.
#[derive(Debug, Clone)]
pub struct PhonemeIndex {
    entries: Vec<IndexEntry>,
    lookup: HashMap<NormalizedSequence, usize>,
    word_count: usize,
}

impl PhonemeIndex {
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn entry(&self, slot: usize) -> Option<&IndexEntry> {
        self.entries.get(slot)
    }

    /// Slot of `sequence`, if indexed.
    pub fn position(&self, sequence: &NormalizedSequence) -> Option<usize> {
        self.lookup.get(sequence).copied()
    }

    /// Words indexed under exactly `sequence`.
    pub fn words_for(&self, sequence: &NormalizedSequence) -> &[String] {
        self.position(sequence)
            .map(|slot| self.entries[slot].words())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            words: self.word_count,
            sequences: self.entries.len(),
            collisions: self.entries.iter().filter(|e| e.words.len() > 1).count(),
        }
    }
}

/// Build the phonetic index for every word in `store`.
///
/// `on_progress` receives a non-decreasing percentage whenever it has
/// advanced by at least `step` points since the last report, and exactly one
/// final `100` after the last word. An empty store reports only `100`.
pub fn build_index<F>(store: &PronunciationStore, step: u8, mut on_progress: F) -> PhonemeIndex
where
    F: FnMut(u8),
{
    let total = store.len();
    let step = step.clamp(1, 100);
    let mut entries: Vec<IndexEntry> = Vec::with_capacity(total);
    let mut lookup: HashMap<NormalizedSequence, usize> = HashMap::with_capacity(total);
    let mut last_reported = 0u8;

    for (i, (word, prons)) in store.iter().enumerate() {
        for pron in prons {
            let sequence = NormalizedSequence::from_pronunciation(pron);
            if sequence.symbols().is_empty() {
                continue;
            }

            let slot = match lookup.get(&sequence) {
                Some(&slot) => slot,
                None => {
                    let slot = entries.len();
                    entries.push(IndexEntry {
                        rendered: sequence.rendered(),
                        sequence: sequence.clone(),
                        words: Vec::with_capacity(1),
                    });
                    lookup.insert(sequence, slot);
                    slot
                }
            };

            // Words arrive one at a time, so a repeat for the same word
            // (stress-only variants) can only be the last one pushed.
            let words = &mut entries[slot].words;
            if words.last().map(String::as_str) != Some(word) {
                words.push(word.to_string());
            }
        }

        let percent = ((i + 1) * 100 / total) as u8;
        if percent < 100 && percent >= last_reported.saturating_add(step) {
            last_reported = percent;
            on_progress(percent);
        }
    }

    on_progress(100);
    entries.shrink_to_fit();

    let index = PhonemeIndex {
        entries,
        lookup,
        word_count: total,
    };
    let stats = index.stats();
    log::info!(
        "Built phoneme index: {} words, {} sequences, {} shared",
        stats.words,
        stats.sequences,
        stats.collisions
    );
    index
}
