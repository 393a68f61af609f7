//! Language models for the reading grid.
//!
//! The grid only knows the [`LanguageModel`] trait. The concrete models
//! layer on top of each other: [`BaseLm`] serves the big, memory-mapped
//! system database; [`UserPhrasesLm`] serves the user's own phrases (and,
//! in a second instance, the user's exclusion list); [`LayeredLm`] merges
//! them and applies the replacement map and the macro and external
//! converters.

use std::io;

use thiserror::Error;

pub use base::{BaseLm, FoundReading};
pub use layered::{LayeredLm, MACRO_PREFIX};
pub use replacement::PhraseReplacementMap;
pub use user_phrases::UserPhrasesLm;

mod base;
mod layered;
mod replacement;
mod user_phrases;

use crate::dictionary::PhraseDbError;

/// A value and its log-probability score. Larger scores are more likely.
#[derive(Clone, Debug, PartialEq)]
pub struct Unigram {
    pub value: String,
    pub score: f64,
}

impl Unigram {
    pub fn new(value: impl Into<String>, score: f64) -> Unigram {
        Unigram {
            value: value.into(),
            score,
        }
    }
}

/// The error type returned from the file-backed model loaders.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("unable to open data file")]
    Io(#[from] io::Error),
    #[error("invalid phrase database")]
    Db(#[from] PhraseDbError),
    #[error("malformed data file")]
    Malformed,
}

/// The interface the reading grid consumes.
pub trait LanguageModel {
    /// Returns the unigrams for a reading, or an empty list. The reading
    /// of a multi-syllable phrase is the separator-joined compound.
    fn unigrams(&self, reading: &str) -> Vec<Unigram>;

    /// Whether the reading has any unigrams at all.
    fn has_unigrams(&self, reading: &str) -> bool {
        !self.unigrams(reading).is_empty()
    }
}

/// A plain map works as a language model, which keeps tests simple.
impl LanguageModel for std::collections::HashMap<String, Vec<Unigram>> {
    fn unigrams(&self, reading: &str) -> Vec<Unigram> {
        self.get(reading).cloned().unwrap_or_default()
    }

    fn has_unigrams(&self, reading: &str) -> bool {
        self.contains_key(reading)
    }
}
