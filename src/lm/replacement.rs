//! The phrase replacement map.

use std::path::Path;

use indexmap::IndexMap;
use tracing::{debug, warn};

use super::LoadError;
use crate::dictionary::{Blob, ByteBlockDictionary, ColumnOrder, ParseIssue};

/// Maps candidate values to user-chosen replacements.
///
/// The file shape is `original SP replacement`. When a key appears on
/// several lines, the first one wins.
#[derive(Default)]
pub struct PhraseReplacementMap {
    map: IndexMap<String, String>,
    issues: Vec<ParseIssue>,
    loaded: bool,
}

impl PhraseReplacementMap {
    pub fn new() -> PhraseReplacementMap {
        Default::default()
    }

    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        let blob = Blob::open(path.as_ref())?;
        if !self.load(blob.as_ref()) {
            return Err(LoadError::Malformed);
        }
        debug!(
            path = %path.as_ref().display(),
            entries = self.map.len(),
            "loaded phrase replacement map"
        );
        Ok(())
    }

    pub fn load(&mut self, data: &[u8]) -> bool {
        self.close();

        let mut dict = ByteBlockDictionary::new();
        let ok = dict.parse(data, ColumnOrder::KeyThenValue);
        self.issues = dict.issues().to_vec();
        for issue in &self.issues {
            warn!(line = issue.line, kind = ?issue.kind, "replacement map parse issue");
        }
        if !ok {
            return false;
        }

        for (key, values) in dict.iter() {
            if let Some(first) = values.first() {
                self.map
                    .entry(key.to_string())
                    .or_insert_with(|| first.to_string());
            }
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

    pub fn value_for_key(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn parse_issues(&self) -> &[ParseIssue] {
        &self.issues
    }
}
