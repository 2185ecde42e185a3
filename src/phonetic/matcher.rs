use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::index::{NormalizedSequence, PhonemeIndex};
use super::model::HomophoneError;
use super::session::CancelToken;

/// How two rendered phoneme sequences are compared.
///
/// Both metrics are symmetric and yield integer scores in `0..=100`, where
/// 100 means the sequences are identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    /// `(len_a + len_b - indel_distance) / (len_a + len_b)`, where the indel
    /// distance counts insertions and deletions only.
    #[default]
    Indel,
    /// `1 - levenshtein / max(len_a, len_b)`.
    Levenshtein,
}

impl SimilarityMetric {
    /// Similarity of `a` and `b` in `0..=100`. Two empty strings score 100.
    pub fn score(self, a: &str, b: &str) -> u8 {
        match self {
            SimilarityMetric::Indel => indel_ratio(a, b),
            SimilarityMetric::Levenshtein => to_percent(strsim::normalized_levenshtein(a, b)),
        }
    }

    /// Highest score two strings of these lengths could reach.
    fn upper_bound(self, len_a: usize, len_b: usize) -> u8 {
        let (short, long) = (len_a.min(len_b), len_a.max(len_b));
        match self {
            _ if long == 0 => 100,
            SimilarityMetric::Indel => to_percent(2.0 * short as f64 / (short + long) as f64),
            SimilarityMetric::Levenshtein => to_percent(short as f64 / long as f64),
        }
    }
}

/// Slots of the index entries that matched a query, in ascending slot order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchSet {
    slots: Vec<usize>,
}

impl MatchSet {
    pub fn slots(&self) -> &[usize] {
        &self.slots
    }

    /// The matched sequences, resolved against the index they came from.
    pub fn sequences<'a>(
        &'a self,
        index: &'a PhonemeIndex,
    ) -> impl Iterator<Item = &'a NormalizedSequence> + 'a {
        self.slots
            .iter()
            .filter_map(move |&slot| index.entry(slot))
            .map(|entry| entry.sequence())
    }

    pub fn contains(&self, index: &PhonemeIndex, sequence: &NormalizedSequence) -> bool {
        index
            .position(sequence)
            .is_some_and(|slot| self.slots.binary_search(&slot).is_ok())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Scan every distinct sequence in `index` against each query sequence.
///
/// An entry matches when its score reaches `threshold` for at least one
/// query. The scan is spread over the current rayon pool and stops early with
/// [`HomophoneError::Cancelled`] once `cancel` fires.
pub fn find_matches(
    index: &PhonemeIndex,
    queries: &[NormalizedSequence],
    threshold: u8,
    metric: SimilarityMetric,
    cancel: &CancelToken,
) -> Result<MatchSet, HomophoneError> {
    let queries: Vec<(String, usize)> = queries
        .iter()
        .map(|q| {
            let rendered = q.rendered();
            let len = text_len(&rendered);
            (rendered, len)
        })
        .collect();
    if queries.is_empty() {
        return Ok(MatchSet::default());
    }

    let slots: Vec<usize> = index
        .entries()
        .par_iter()
        .enumerate()
        .filter(|_| !cancel.is_cancelled())
        .filter(|(_, entry)| {
            let candidate = entry.rendered();
            let candidate_len = text_len(candidate);
            queries.iter().any(|(query, query_len)| {
                metric.upper_bound(*query_len, candidate_len) >= threshold
                    && metric.score(query, candidate) >= threshold
            })
        })
        .map(|(slot, _)| slot)
        .collect();

    if cancel.is_cancelled() {
        return Err(HomophoneError::Cancelled);
    }

    log::debug!(
        "Matched {} of {} sequences at threshold {threshold} ({metric:?})",
        slots.len(),
        index.len()
    );
    Ok(MatchSet { slots })
}

fn indel_ratio(a: &str, b: &str) -> u8 {
    let (lcs, total) = if a.is_ascii() && b.is_ascii() {
        (lcs_len(a.as_bytes(), b.as_bytes()), a.len() + b.len())
    } else {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        (lcs_len(&a, &b), a.len() + b.len())
    };

    if total == 0 {
        return 100;
    }
    to_percent(2.0 * lcs as f64 / total as f64)
}

/// Length of the longest common subsequence, two-row dynamic programming.
fn lcs_len<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    let (a, b) = if a.len() < b.len() { (b, a) } else { (a, b) };
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for x in a {
        for (j, y) in b.iter().enumerate() {
            curr[j + 1] = if x == y {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

fn to_percent(ratio: f64) -> u8 {
    (ratio * 100.0).round_ties_even().clamp(0.0, 100.0) as u8
}

fn text_len(s: &str) -> usize {
    if s.is_ascii() {
        s.len()
    } else {
        s.chars().count()
    }
}
