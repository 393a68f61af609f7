//! Bopomofo syllables, keyboard layouts, and the reading buffer.
//!
//! A Mandarin syllable is at most four phonetic components: a consonant, a
//! medial glide, a vowel, and a tone. The [`Syllable`] type packs them into
//! a single 16-bit value. Keyboards sold in Chinese-speaking regions print
//! Zhuyin symbols next to the Latin letters, in several competing
//! arrangements; [`KeyboardLayout`] models five of them plus a Hanyu Pinyin
//! mode that bypasses the component accumulator entirely. The
//! [`ReadingBuffer`] sits on top and turns raw key characters into one
//! complete syllable at a time.

pub use buffer::ReadingBuffer;
pub use layout::{KeyboardLayout, LayoutKind};
pub use syllable::{Component, Syllable, SymbolParseError};

mod buffer;
mod layout;
mod pinyin;
mod syllable;
