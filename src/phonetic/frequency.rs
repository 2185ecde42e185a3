use std::collections::HashMap;
use std::path::Path;

use super::model::HomophoneError;

/// Source of word usage frequencies.
///
/// Frequencies are queried per candidate at ranking time and never copied
/// into the phonetic index, so an oracle may be backed by a large table.
/// Words are passed lowercase.
pub trait FrequencyOracle: Send + Sync {
    /// Frequency score of `word`, or `None` if the word is unknown.
    fn frequency_of(&self, word: &str) -> Option<f64>;
}

impl<F> FrequencyOracle for F
where
    F: Fn(&str) -> Option<f64> + Send + Sync,
{
    fn frequency_of(&self, word: &str) -> Option<f64> {
        self(word)
    }
}

/// In-memory word → frequency table.
#[derive(Debug, Clone, Default)]
pub struct FrequencyTable {
    scores: HashMap<String, f64>,
}

impl FrequencyTable {
    /// Load a frequency table from disk.
    ///
    /// `.json` files must hold an object mapping words to numbers. Any other
    /// file is read as text with one `word score` pair per line; `#` starts a
    /// comment.
    pub fn load(path: &Path) -> Result<Self, HomophoneError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HomophoneError::DataUnavailable(format!("{}: {e}", path.display()))
        })?;

        let table = if path.extension().and_then(|e| e.to_str()) == Some("json") {
            Self::from_json(&content)?
        } else {
            Self::from_text(&content)
        };

        log::info!(
            "Loaded {} word frequencies from {}",
            table.len(),
            path.display()
        );
        Ok(table)
    }

    /// Parse `word score` lines. Lines whose score is not a number are
    /// skipped with a warning.
    pub fn from_text(content: &str) -> Self {
        let mut scores = HashMap::new();
        for (line_no, raw) in content.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let mut fields = line.split_whitespace();
            let (Some(word), Some(score)) = (fields.next(), fields.next()) else {
                log::warn!("Skipping frequency line {}: expected `word score`", line_no + 1);
                continue;
            };
            match score.parse::<f64>() {
                Ok(score) if score.is_finite() => {
                    scores.insert(word.to_lowercase(), score);
                }
                _ => log::warn!(
                    "Skipping frequency line {}: {score:?} is not a number",
                    line_no + 1
                ),
            }
        }
        Self { scores }
    }

    pub fn from_json(content: &str) -> Result<Self, HomophoneError> {
        let json: serde_json::Value = serde_json::from_str(content).map_err(|e| {
            HomophoneError::DataUnavailable(format!("Failed to parse frequency JSON: {e}"))
        })?;

        let obj = json.as_object().ok_or_else(|| {
            HomophoneError::DataUnavailable("Frequency JSON must be an object".to_string())
        })?;

        let mut scores = HashMap::with_capacity(obj.len());
        for (word, value) in obj {
            let score = value.as_f64().ok_or_else(|| {
                HomophoneError::DataUnavailable(format!(
                    "Non-numeric frequency for word {word:?}"
                ))
            })?;
            scores.insert(word.to_lowercase(), score);
        }
        Ok(Self { scores })
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

impl FromIterator<(String, f64)> for FrequencyTable {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            scores: iter
                .into_iter()
                .map(|(word, score)| (word.to_lowercase(), score))
                .collect(),
        }
    }
}

impl FrequencyOracle for FrequencyTable {
    fn frequency_of(&self, word: &str) -> Option<f64> {
        self.scores.get(word).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::{FrequencyOracle, FrequencyTable};
    use crate::phonetic::HomophoneError;
    use std::io::Write;

    #[test]
    fn parses_text_lines_and_skips_bad_scores() {
        let table = FrequencyTable::from_text(
            "# zipf scores\nNight 5.1\nknight\t3.2\nnite not-a-number\n\nlone\n",
        );
        assert_eq!(table.len(), 2);
        assert_eq!(table.frequency_of("night"), Some(5.1));
        assert_eq!(table.frequency_of("knight"), Some(3.2));
        assert_eq!(table.frequency_of("nite"), None);
    }

    #[test]
    fn parses_json_object() {
        let table = FrequencyTable::from_json(r#"{"night": 5.1, "Knight": 3}"#).unwrap();
        assert_eq!(table.frequency_of("knight"), Some(3.0));
    }

    #[test]
    fn rejects_non_numeric_json_values() {
        let err = FrequencyTable::from_json(r#"{"night": "often"}"#).unwrap_err();
        assert!(matches!(err, HomophoneError::DataUnavailable(_)));
    }

    #[test]
    fn missing_file_is_data_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = FrequencyTable::load(&dir.path().join("missing.tsv")).unwrap_err();
        assert!(matches!(err, HomophoneError::DataUnavailable(_)));
    }

    #[test]
    fn loads_json_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"read": 5.5, "reed": 3.1}}"#).unwrap();
        let table = FrequencyTable::load(file.path()).unwrap();
        assert_eq!(table.frequency_of("reed"), Some(3.1));
    }

    #[test]
    fn closures_act_as_oracles() {
        let oracle = |word: &str| (word == "night").then_some(5.0);
        assert_eq!(oracle.frequency_of("night"), Some(5.0));
        assert_eq!(oracle.frequency_of("day"), None);
    }
}
