//! The base language model over the sorted phrase database.

use std::path::Path;

use tracing::debug;

use super::{LanguageModel, LoadError, Unigram};
use crate::dictionary::{Blob, SortedPhraseDb};
use crate::textutil::str_from_bytes_truncating;

/// A reading found by reverse lookup, with the row's score.
#[derive(Clone, Debug, PartialEq)]
pub struct FoundReading {
    pub reading: String,
    pub score: f64,
}

/// Serves unigrams straight out of a [`SortedPhraseDb`].
///
/// Rows are `reading SP value SP score`. Queries probe with the reading
/// plus a trailing space so that `ㄇㄚ` does not match `ㄇㄚˊ`.
#[derive(Default)]
pub struct BaseLm {
    db: Option<SortedPhraseDb>,
}

impl BaseLm {
    pub fn new() -> BaseLm {
        Default::default()
    }

    /// Maps and validates the database file at `path`, replacing any
    /// previously loaded one.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        self.close();
        let blob = Blob::open(path.as_ref())?;
        self.db = Some(SortedPhraseDb::new(blob, true)?);
        debug!(path = %path.as_ref().display(), "loaded base language model");
        Ok(())
    }

    /// Adopts an existing database, for in-memory use.
    pub fn load_db(&mut self, db: SortedPhraseDb) {
        self.db = Some(db);
    }

    pub fn close(&mut self) {
        self.db = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.db.is_some()
    }

    /// Linearly scans the database for rows whose value column equals
    /// `value` and returns their readings with scores.
    pub fn readings_for_value(&self, value: &str) -> Vec<FoundReading> {
        let Some(db) = &self.db else {
            return Vec::new();
        };

        // The trailing space restricts the prefix match to the exact
        // value, using the fact that a well-formed row has three columns.
        let needle = format!("{value} ");
        db.reverse_find_rows(needle.as_bytes())
            .into_iter()
            .filter_map(|row| {
                let row = str_from_bytes_truncating(row);
                let (reading, rest) = row.split_once(' ')?;
                let score = rest
                    .split_once(' ')
                    .and_then(|(_, score)| score.trim().parse().ok())
                    .unwrap_or(0.0);
                Some(FoundReading {
                    reading: reading.to_string(),
                    score,
                })
            })
            .collect()
    }
}

impl LanguageModel for BaseLm {
    fn unigrams(&self, reading: &str) -> Vec<Unigram> {
        let Some(db) = &self.db else {
            return Vec::new();
        };

        let key = format!("{reading} ");
        db.find_rows(key.as_bytes())
            .into_iter()
            .filter_map(|row| {
                let row = str_from_bytes_truncating(row);
                let rest = row.strip_prefix(key.as_str())?;
                let (value, score) = match rest.split_once(' ') {
                    Some((value, score)) => (value, score.trim().parse().unwrap_or(0.0)),
                    None => (rest, 0.0),
                };
                Some(Unigram::new(value, score))
            })
            .collect()
    }

    fn has_unigrams(&self, reading: &str) -> bool {
        match &self.db {
            Some(db) => db
                .find_first_matching_line(format!("{reading} ").as_bytes())
                .is_some(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::Blob;

    const DATA: &str = "# format org.openvanilla.mcbopomofo.sorted\n\
        ㄇㄧㄥˊ 明 -3.07936356\n\
        ㄇㄧㄥˊ 名 -3.12166252\n\
        ㄇㄧㄥˊ 銘 -4.43019121\n\
        ㄇㄧㄥˊ-ㄘˊ 名詞 -4.61364867\n\
        ㄇㄧㄥˊ-ㄘˋ 名次 -5.47446950\n";

    fn lm() -> BaseLm {
        let mut lm = BaseLm::new();
        lm.load_db(SortedPhraseDb::new(Blob::from(DATA), true).unwrap());
        lm
    }

    #[test]
    fn unigrams_come_back_in_file_order() {
        let unigrams = lm().unigrams("ㄇㄧㄥˊ");
        let values: Vec<&str> = unigrams.iter().map(|u| u.value.as_str()).collect();
        assert_eq!(vec!["明", "名", "銘"], values);
        assert!((unigrams[0].score - -3.07936356).abs() < 1e-9);
    }

    #[test]
    fn the_probe_is_reading_exact() {
        // ㄇㄧㄥˊ must not match the ㄇㄧㄥˊ-ㄘˊ rows and vice versa.
        assert_eq!(3, lm().unigrams("ㄇㄧㄥˊ").len());
        assert_eq!(1, lm().unigrams("ㄇㄧㄥˊ-ㄘˊ").len());
        assert!(lm().has_unigrams("ㄇㄧㄥˊ-ㄘˋ"));
        assert!(!lm().has_unigrams("ㄇㄧㄥ"));
    }

    #[test]
    fn reverse_lookup_finds_readings_by_value() {
        let found = lm().readings_for_value("名詞");
        assert_eq!(1, found.len());
        assert_eq!("ㄇㄧㄥˊ-ㄘˊ", found[0].reading);
        assert!((found[0].score - -4.61364867).abs() < 1e-9);
    }

    #[test]
    fn a_closed_model_serves_nothing() {
        let mut lm = lm();
        lm.close();
        assert!(!lm.is_loaded());
        assert!(lm.unigrams("ㄇㄧㄥˊ").is_empty());
        assert!(!lm.has_unigrams("ㄇㄧㄥˊ"));
        lm.close();
    }
}
