//! Associated phrase lookup.
//!
//! After the user commits a word, the shell can offer continuations:
//! committing 一 may offer 一個, 一些 and so on. The data file keys each
//! continuation on the interleaved value-reading prefix, for example
//! `一-ㄧ-個-ㄍㄜ˙ -2.9779`, so a prefix query is a plain binary search
//! over the same sorted-database substrate as the base language model.

use std::collections::HashSet;
use std::path::Path;

use indexmap::IndexMap;
use tracing::debug;

use crate::dictionary::{Blob, ByteBlockDictionary, ColumnOrder, SortedPhraseDb};
use crate::lm::LoadError;
use crate::textutil::str_from_bytes_truncating;

const SEPARATOR: char = '-';

/// One associated phrase: the full value (prefix included) and the
/// readings of every character in it.
#[derive(Clone, Debug, PartialEq)]
pub struct Phrase {
    pub value: String,
    pub readings: Vec<String>,
}

impl Phrase {
    pub fn new(value: impl Into<String>, readings: Vec<String>) -> Phrase {
        Phrase {
            value: value.into(),
            readings,
        }
    }

    /// The readings joined with the separator, e.g. `ㄕㄨ-ㄖㄨˋ`.
    pub fn combined_reading(&self) -> String {
        combine_readings(&self.readings)
    }
}

/// Splits a combined reading such as `ㄕㄨ-ㄖㄨˋ` into its parts.
pub fn split_readings(combined: &str) -> Vec<String> {
    if combined.is_empty() {
        return Vec::new();
    }
    combined.split(SEPARATOR).map(str::to_string).collect()
}

/// Joins readings with the separator.
pub fn combine_readings(readings: &[String]) -> String {
    readings.join("-")
}

/// Prefix-searchable associated phrases over a sorted database.
pub struct AssociatedPhrases {
    db: Option<SortedPhraseDb>,
}

impl Default for AssociatedPhrases {
    fn default() -> AssociatedPhrases {
        AssociatedPhrases { db: None }
    }
}

impl AssociatedPhrases {
    pub fn new() -> AssociatedPhrases {
        Default::default()
    }

    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        self.close();
        let blob = Blob::open(path.as_ref())?;
        self.db = Some(SortedPhraseDb::new(blob, true)?);
        debug!(path = %path.as_ref().display(), "loaded associated phrases");
        Ok(())
    }

    /// Adopts an existing database, for in-memory use.
    pub fn load_db(&mut self, db: SortedPhraseDb) {
        self.db = Some(db);
    }

    /// Idempotent; closing twice is a no-op.
    pub fn close(&mut self) {
        self.db = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.db.is_some()
    }

    /// Returns the continuations of `prefix_value`, best first.
    ///
    /// The prefix value must have exactly one reading per code point. As a
    /// special case, a prefix with an empty readings list searches on the
    /// value alone, which matches the behavior of the single-character
    /// lookups of the legacy index.
    pub fn find_phrases(&self, prefix_value: &str, prefix_readings: &[String]) -> Vec<Phrase> {
        if prefix_value.is_empty() {
            return Vec::new();
        }

        if prefix_readings.is_empty() {
            let mut internal = String::from(prefix_value);
            internal.push(SEPARATOR);
            return self.find_with_internal_prefix(&internal);
        }

        let values: Vec<char> = prefix_value.chars().collect();
        if values.len() != prefix_readings.len() {
            return Vec::new();
        }

        let mut internal = String::new();
        for (value, reading) in values.iter().zip(prefix_readings) {
            internal.push(*value);
            internal.push(SEPARATOR);
            internal.push_str(reading);
            internal.push(SEPARATOR);
        }
        self.find_with_internal_prefix(&internal)
    }

    fn find_with_internal_prefix(&self, prefix: &str) -> Vec<Phrase> {
        let Some(db) = &self.db else {
            return Vec::new();
        };

        let rows = db.find_rows(prefix.as_bytes());
        if rows.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(&str, f64)> = rows
            .into_iter()
            .map(|row| {
                let row = str_from_bytes_truncating(row);
                (row, score_in_row(row))
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        // The rows are now ranked, so keeping the first of each value
        // keeps the highest-ranking one.
        let mut seen = HashSet::new();
        let mut phrases = Vec::new();
        for (row, _) in scored {
            let phrase = phrase_from_row(row);
            if seen.insert(phrase.value.clone()) {
                phrases.push(phrase);
            }
        }
        phrases
    }
}

/// Extracts the score column, `f64::MIN` when absent.
fn score_in_row(row: &str) -> f64 {
    match row.split_once(' ') {
        Some((_, score)) => score.trim().parse().unwrap_or(f64::MIN),
        None => f64::MIN,
    }
}

/// Parses `v1-r1-v2-r2-… SP score` into a [`Phrase`]; the value parts
/// concatenate and the reading parts collect.
fn phrase_from_row(row: &str) -> Phrase {
    let key = row.split(' ').next().unwrap_or(row);
    let mut value = String::new();
    let mut readings = Vec::new();
    for (i, part) in key.split(SEPARATOR).enumerate() {
        if i % 2 == 0 {
            value.push_str(part);
        } else {
            readings.push(part.to_string());
        }
    }
    Phrase { value, readings }
}

/// The legacy associated-phrase index: continuations keyed on a single
/// character, parsed from a plain two-column file.
#[derive(Default)]
pub struct LegacyAssociatedPhrases {
    map: IndexMap<String, Vec<String>>,
    loaded: bool,
}

impl LegacyAssociatedPhrases {
    pub fn new() -> LegacyAssociatedPhrases {
        Default::default()
    }

    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        let blob = Blob::open(path.as_ref())?;
        if !self.load(blob.as_ref()) {
            return Err(LoadError::Malformed);
        }
        Ok(())
    }

    pub fn load(&mut self, data: &[u8]) -> bool {
        self.close();

        let mut dict = ByteBlockDictionary::new();
        if !dict.parse(data, ColumnOrder::KeyThenValue) {
            return false;
        }
        for (key, values) in dict.iter() {
            self.map.insert(
                key.to_string(),
                values.iter().map(|v| v.to_string()).collect(),
            );
        }
        self.loaded = true;
        true
    }

    pub fn close(&mut self) {
        self.map.clear();
        self.loaded = false;
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn values_for_key(&self, key: &str) -> &[String] {
        self.map.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn has_values_for_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }
}
