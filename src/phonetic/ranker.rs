use std::cmp::Ordering;
use std::collections::HashSet;

use super::engine::SearchRequest;
use super::frequency::FrequencyOracle;
use super::index::PhonemeIndex;
use super::matcher::MatchSet;

/// Turn matched sequences into the final, ordered list of homophones.
///
/// The words behind every matched sequence are merged and deduplicated, the
/// query word itself is dropped, the frequency filter is applied when the
/// request enables it, and the rest is ordered by descending frequency with
/// ties broken alphabetically. Words without a known frequency fail the
/// filter and otherwise sort after every word with one.
pub fn rank(
    index: &PhonemeIndex,
    matches: &MatchSet,
    request: &SearchRequest,
    oracle: &dyn FrequencyOracle,
) -> Vec<String> {
    let query = request.normalized_word();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut ranked: Vec<(Option<f64>, &str)> = Vec::new();

    for entry in matches.slots().iter().filter_map(|&slot| index.entry(slot)) {
        for word in entry.words() {
            if word.to_lowercase() == query || !seen.insert(word.as_str()) {
                continue;
            }

            let frequency = oracle.frequency_of(&word.to_lowercase());
            if request.use_freq_filter && !passes_filter(frequency, request.min_frequency) {
                continue;
            }
            ranked.push((frequency, word.as_str()));
        }
    }

    ranked.sort_by(|(freq_a, word_a), (freq_b, word_b)| {
        compare_frequency(*freq_b, *freq_a).then_with(|| word_a.cmp(word_b))
    });
    if request.result_cap > 0 {
        ranked.truncate(request.result_cap);
    }

    ranked.into_iter().map(|(_, word)| word.to_string()).collect()
}

fn passes_filter(frequency: Option<f64>, min_frequency: Option<f64>) -> bool {
    match (frequency, min_frequency) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(freq), Some(min)) => freq >= min,
    }
}

/// Known frequencies compare numerically; unknown sorts below every known one.
fn compare_frequency(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}
