//! User phrases and excluded phrases.

use std::path::Path;

use indexmap::IndexMap;
use tracing::{debug, warn};

use super::{LanguageModel, LoadError, Unigram};
use crate::dictionary::{Blob, ByteBlockDictionary, ColumnOrder, ParseIssue};

/// A reading-keyed store parsed from a `value SP reading` file.
///
/// The file puts the phrase first to keep it easy to edit by hand; the
/// parser swaps the columns so lookups stay reading-keyed. The same type
/// also backs the excluded-phrases list, which has the identical shape.
#[derive(Default)]
pub struct UserPhrasesLm {
    map: IndexMap<String, Vec<String>>,
    issues: Vec<ParseIssue>,
    loaded: bool,
}

impl UserPhrasesLm {
    /// Score assigned to user unigrams with multi-syllable readings.
    /// System scores are negative log-probabilities, so this wins.
    pub const USER_UNIGRAM_SCORE: f64 = 0.0;

    pub fn new() -> UserPhrasesLm {
        Default::default()
    }

    /// Maps the file at `path`, parses it, and drops the mapping. The
    /// previous contents are replaced.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        let blob = Blob::open(path.as_ref())?;
        if !self.load(blob.as_ref()) {
            return Err(LoadError::Malformed);
        }
        debug!(
            path = %path.as_ref().display(),
            phrases = self.map.len(),
            "loaded user phrases"
        );
        Ok(())
    }

    /// Parses `data` in value-then-key order. Returns false when the blob
    /// is empty or a stray NUL byte aborts the parse.
    pub fn load(&mut self, data: &[u8]) -> bool {
        self.close();

        let mut dict = ByteBlockDictionary::new();
        let ok = dict.parse(data, ColumnOrder::ValueThenKey);
        self.issues = dict.issues().to_vec();
        for issue in &self.issues {
            warn!(line = issue.line, kind = ?issue.kind, "user phrase parse issue");
        }
        if !ok {
            return false;
        }

        for (reading, values) in dict.iter() {
            self.map.insert(
                reading.to_string(),
                values.iter().map(|v| v.to_string()).collect(),
            );
        }
        self.loaded = true;
        true
    }

    pub fn close(&mut self) {
        self.map.clear();
        self.issues.clear();
        self.loaded = false;
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Parse issues from the most recent load, for the shell to display.
    pub fn parse_issues(&self) -> &[ParseIssue] {
        &self.issues
    }
}

impl LanguageModel for UserPhrasesLm {
    fn unigrams(&self, reading: &str) -> Vec<Unigram> {
        match self.map.get(reading) {
            Some(values) => values
                .iter()
                .map(|value| Unigram::new(value.clone(), Self::USER_UNIGRAM_SCORE))
                .collect(),
            None => Vec::new(),
        }
    }

    fn has_unigrams(&self, reading: &str) -> bool {
        self.map.contains_key(reading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: &[u8] = "茗 ㄇㄧㄥˊ\n\
        丼 ㄉㄨㄥˋ\n\
        名刺 ㄇㄧㄥˊ-ㄘˋ\n\
        程式 ㄔㄥˊ-ㄕˋ\n"
        .as_bytes();

    #[test]
    fn lookups_are_keyed_by_the_second_column() {
        let mut lm = UserPhrasesLm::new();
        assert!(lm.load(DATA));
        assert!(lm.is_loaded());

        assert!(lm.has_unigrams("ㄇㄧㄥˊ"));
        assert!(!lm.has_unigrams("茗"));

        let unigrams = lm.unigrams("ㄔㄥˊ-ㄕˋ");
        assert_eq!(1, unigrams.len());
        assert_eq!("程式", unigrams[0].value);
        assert_eq!(UserPhrasesLm::USER_UNIGRAM_SCORE, unigrams[0].score);
    }

    #[test]
    fn close_forgets_everything() {
        let mut lm = UserPhrasesLm::new();
        assert!(lm.load(DATA));
        lm.close();
        assert!(!lm.is_loaded());
        assert!(!lm.has_unigrams("ㄇㄧㄥˊ"));
    }

    #[test]
    fn issues_are_retained_for_the_shell() {
        let mut lm = UserPhrasesLm::new();
        assert!(lm.load(b"lonely\n\xe8\x8c\x97 \xe3\x84\x87\n"));
        assert_eq!(1, lm.parse_issues().len());
        assert_eq!(1, lm.parse_issues()[0].line);
    }
}
