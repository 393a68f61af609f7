//! The composite language model.

use std::collections::HashSet;
use std::path::Path;

use super::{BaseLm, LanguageModel, LoadError, PhraseReplacementMap, Unigram, UserPhrasesLm};
use crate::associated::{AssociatedPhrases, Phrase};
use crate::dictionary::SortedPhraseDb;

/// Unigram values starting with this prefix denote deferred computations
/// such as `MACRO@DATE_TODAY_SHORT`, resolved by the macro converter at
/// read time. A value the converter leaves with the prefix intact is an
/// unrecognized macro and is dropped.
pub const MACRO_PREFIX: &str = "MACRO@";

const JOIN_SEPARATOR: char = '-';

// The margin by which a mono-syllable user phrase out-ranks the top
// system unigram of the same reading.
const USER_UNIGRAM_BOOST_EPSILON: f64 = 0.000000001;

type Converter = Box<dyn Fn(&str) -> String>;

/// Merges the base model, the user phrases, the exclusion list, the
/// replacement map, and the value converters into the single language
/// model the grid consumes.
///
/// When the grid asks for unigrams, the pipeline is:
///
/// 1. Collect the excluded values for the reading.
/// 2. Collect user unigrams, minus the excluded ones.
/// 3. Collect base unigrams, minus the excluded and the user values.
/// 4. Put the user unigrams first; for a mono-syllable reading their
///    scores are rewritten to just above the top base score.
/// 5. Along the way, apply phrase replacement, macro conversion, and the
///    external converter, and collapse duplicate values.
///
/// Reloading any of the custom files is the owner's responsibility; the
/// model itself never watches for changes.
#[derive(Default)]
pub struct LayeredLm {
    base: BaseLm,
    user_phrases: UserPhrasesLm,
    excluded_phrases: UserPhrasesLm,
    replacement: PhraseReplacementMap,
    associated: AssociatedPhrases,
    phrase_replacement_enabled: bool,
    external_converter_enabled: bool,
    external_converter: Option<Converter>,
    macro_converter: Option<Converter>,
}

impl LayeredLm {
    pub fn new() -> LayeredLm {
        Default::default()
    }

    /// Loads (or reloads) the primary language model file.
    pub fn load_base(&mut self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        self.base.open(path)
    }

    /// Adopts an in-memory primary database.
    pub fn load_base_db(&mut self, db: SortedPhraseDb) {
        self.base.close();
        self.base.load_db(db);
    }

    pub fn is_base_loaded(&self) -> bool {
        self.base.is_loaded()
    }

    /// Loads (or reloads) the associated phrases file.
    pub fn load_associated_phrases(&mut self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        self.associated.open(path)
    }

    /// Adopts an in-memory associated phrases database.
    pub fn load_associated_phrases_db(&mut self, db: SortedPhraseDb) {
        self.associated.close();
        self.associated.load_db(db);
    }

    pub fn is_associated_phrases_loaded(&self) -> bool {
        self.associated.is_loaded()
    }

    /// Loads (or reloads) the user and excluded phrase files. A `None`
    /// leaves the corresponding list untouched.
    pub fn load_user_phrases(
        &mut self,
        user_path: Option<&Path>,
        excluded_path: Option<&Path>,
    ) -> Result<(), LoadError> {
        if let Some(path) = user_path {
            self.user_phrases.open(path)?;
        }
        if let Some(path) = excluded_path {
            self.excluded_phrases.open(path)?;
        }
        Ok(())
    }

    pub fn load_user_phrases_data(&mut self, data: &[u8]) -> bool {
        self.user_phrases.load(data)
    }

    pub fn load_excluded_phrases_data(&mut self, data: &[u8]) -> bool {
        self.excluded_phrases.load(data)
    }

    /// Loads (or reloads) the phrase replacement file.
    pub fn load_replacement_map(&mut self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        self.replacement.open(path)
    }

    pub fn load_replacement_map_data(&mut self, data: &[u8]) -> bool {
        self.replacement.load(data)
    }

    pub fn set_phrase_replacement_enabled(&mut self, enabled: bool) {
        self.phrase_replacement_enabled = enabled;
    }

    pub fn phrase_replacement_enabled(&self) -> bool {
        self.phrase_replacement_enabled
    }

    pub fn set_external_converter_enabled(&mut self, enabled: bool) {
        self.external_converter_enabled = enabled;
    }

    pub fn external_converter_enabled(&self) -> bool {
        self.external_converter_enabled
    }

    pub fn set_external_converter(
        &mut self,
        converter: impl Fn(&str) -> String + 'static,
    ) {
        self.external_converter = Some(Box::new(converter));
    }

    pub fn set_macro_converter(&mut self, converter: impl Fn(&str) -> String + 'static) {
        self.macro_converter = Some(Box::new(converter));
    }

    /// Applies the macro converter, or returns the input unchanged when
    /// none is set.
    pub fn convert_macro(&self, input: &str) -> String {
        match &self.macro_converter {
            Some(converter) => converter(input),
            None => input.to_string(),
        }
    }

    /// The reading for a value, picked from the best-scoring row of the
    /// base model.
    pub fn reading_for_value(&self, value: &str) -> Option<String> {
        self.base
            .readings_for_value(value)
            .into_iter()
            .max_by(|a, b| {
                a.score
                    .partial_cmp(&b.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|found| found.reading)
    }

    pub fn find_associated_phrases(
        &self,
        prefix_value: &str,
        prefix_readings: &[String],
    ) -> Vec<Phrase> {
        self.associated.find_phrases(prefix_value, prefix_readings)
    }

    /// Filters and converts `unigrams`. Values found in `excluded` are
    /// dropped; kept post-conversion values are recorded in `inserted`
    /// and deduplicated against it.
    fn filter_and_transform_unigrams(
        &self,
        unigrams: Vec<Unigram>,
        excluded: &HashSet<String>,
        inserted: &mut HashSet<String>,
    ) -> Vec<Unigram> {
        let mut results = Vec::new();

        for unigram in unigrams {
            // The exclusion list matches the original value; the dedup
            // set matches the converted one.
            if excluded.contains(&unigram.value) {
                continue;
            }

            let mut value = unigram.value;
            if self.phrase_replacement_enabled {
                if let Some(replacement) = self.replacement.value_for_key(&value) {
                    value = replacement.to_string();
                }
            }

            if let Some(converter) = &self.macro_converter {
                value = converter(&value);
            }
            if value.starts_with(MACRO_PREFIX) {
                continue;
            }

            if self.external_converter_enabled {
                if let Some(converter) = &self.external_converter {
                    value = converter(&value);
                }
            }

            if inserted.insert(value.clone()) {
                results.push(Unigram::new(value, unigram.score));
            }
        }

        results
    }
}

impl LanguageModel for LayeredLm {
    fn unigrams(&self, reading: &str) -> Vec<Unigram> {
        let mut excluded_values = HashSet::new();
        if self.excluded_phrases.has_unigrams(reading) {
            excluded_values.extend(
                self.excluded_phrases
                    .unigrams(reading)
                    .into_iter()
                    .map(|u| u.value),
            );
        }

        let mut inserted_values = HashSet::new();
        let user_unigrams = if self.user_phrases.has_unigrams(reading) {
            self.filter_and_transform_unigrams(
                self.user_phrases.unigrams(reading),
                &excluded_values,
                &mut inserted_values,
            )
        } else {
            Vec::new()
        };

        let mut unigrams = if self.base.has_unigrams(reading) {
            self.filter_and_transform_unigrams(
                self.base.unigrams(reading),
                &excluded_values,
                &mut inserted_values,
            )
        } else {
            Vec::new()
        };

        // A mono-syllable user phrase competes against single characters,
        // so its score is rewritten to sit just above the top base score.
        // Poly-syllable user phrases keep their fixed score, which must
        // win against competing single-character paths on the grid.
        let multi_syllable = reading.contains(JOIN_SEPARATOR);
        if multi_syllable || unigrams.is_empty() {
            let mut combined = user_unigrams;
            combined.append(&mut unigrams);
            return combined;
        }

        if !user_unigrams.is_empty() {
            let top_score = unigrams
                .iter()
                .map(|u| u.score)
                .fold(f64::MIN, f64::max);
            let boosted = top_score + USER_UNIGRAM_BOOST_EPSILON;
            let mut combined: Vec<Unigram> = user_unigrams
                .into_iter()
                .map(|u| Unigram::new(u.value, boosted))
                .collect();
            combined.append(&mut unigrams);
            return combined;
        }

        unigrams
    }

    fn has_unigrams(&self, reading: &str) -> bool {
        if !self.excluded_phrases.has_unigrams(reading) {
            return self.user_phrases.has_unigrams(reading) || self.base.has_unigrams(reading);
        }
        !self.unigrams(reading).is_empty()
    }
}
