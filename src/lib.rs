//! The linguistic engine core of a Bopomofo (Zhuyin) input method.
//!
//! The engine converts a stream of Bopomofo syllables into the most
//! likely sequence of Mandarin words. The pieces, from the bottom up:
//!
//! * [`mandarin`]: the packed syllable, the keyboard layouts with their
//!   ambiguous-key heuristics, a Hanyu Pinyin parser, and the reading
//!   buffer that turns keystrokes into syllables.
//! * [`dictionary`]: a memory-mapped, binary-searchable sorted phrase
//!   database and a zero-copy parser for user-editable data files.
//! * [`lm`]: the language models. The base model serves the sorted
//!   database; the layered model folds in user and excluded phrases and
//!   the replacement map.
//! * [`grid`]: the lattice of overlapping word candidates and the
//!   max-weight DAG walk that produces the current best sentence.
//! * [`uom`]: the user override model, which remembers candidate picks
//!   in context and replays them with frequency and recency weighting.
//! * [`associated`]: ranked continuation lookup for committed phrases.
//!
//! A typical embedding feeds each keystroke to a
//! [`mandarin::ReadingBuffer`]; every completed syllable goes into a
//! [`grid::ReadingGrid`] backed by a [`lm::LayeredLm`], a
//! [`grid::ReadingGrid::walk`] yields the composing text, and candidate
//! picks flow through [`grid::ReadingGrid::override_candidate`] and
//! [`uom::UserOverrideModel::observe`]. The engine is single-threaded
//! and cooperative; one key event runs to completion before the next.

pub mod associated;
pub mod dictionary;
pub mod grid;
pub mod lm;
pub mod mandarin;
pub mod textutil;
pub mod uom;
