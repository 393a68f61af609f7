//! The reading buffer: raw keys in, one syllable out.

use super::layout::{KeyboardLayout, LayoutKind};
use super::syllable::Syllable;

/// Accumulates key characters into a single syllable.
///
/// In Bopomofo mode the buffer re-derives the full key sequence on every
/// key press and runs it back through the layout, so earlier ambiguous
/// keys are re-resolved with the new context. In Hanyu Pinyin mode the
/// buffer keeps the raw ASCII sequence and reparses it; once a tone digit
/// is present no further letters are accepted until the buffer is
/// cleared.
pub struct ReadingBuffer {
    layout: &'static KeyboardLayout,
    syllable: Syllable,
    pinyin_sequence: String,
}

impl ReadingBuffer {
    pub fn new(layout: &'static KeyboardLayout) -> ReadingBuffer {
        ReadingBuffer {
            layout,
            syllable: Syllable::default(),
            pinyin_sequence: String::new(),
        }
    }

    pub fn keyboard_layout(&self) -> &'static KeyboardLayout {
        self.layout
    }

    /// Switches the layout. The current contents are kept; callers that
    /// want a fresh start should clear first.
    pub fn set_keyboard_layout(&mut self, layout: &'static KeyboardLayout) {
        self.layout = layout;
        if self.pinyin_mode() {
            self.pinyin_sequence.clear();
        }
    }

    fn pinyin_mode(&self) -> bool {
        self.layout.kind() == LayoutKind::HanyuPinyin
    }

    pub fn is_valid_key(&self, key: char) -> bool {
        if !self.pinyin_mode() {
            return !self.layout.key_to_components(key).is_empty();
        }

        let key = key.to_ascii_lowercase();
        if key.is_ascii_lowercase() {
            // No more letters once a tone digit is in place.
            return !matches!(self.pinyin_sequence.chars().last(), Some('2'..='5'));
        }
        !self.pinyin_sequence.is_empty() && matches!(key, '2'..='5')
    }

    /// Merges one key into the buffer. Returns false when the key is not
    /// valid for the active layout; the buffer is unchanged in that case.
    pub fn combine_key(&mut self, key: char) -> bool {
        if !self.is_valid_key(key) {
            return false;
        }

        if self.pinyin_mode() {
            self.pinyin_sequence.push(key.to_ascii_lowercase());
            self.syllable = Syllable::from_hanyu_pinyin(&self.pinyin_sequence);
            return true;
        }

        let mut sequence = self.layout.key_sequence_from_syllable(self.syllable);
        sequence.push(key);
        self.syllable = self.layout.syllable_from_key_sequence(&sequence);
        true
    }

    /// Drops the last component; in Pinyin mode, the last typed character.
    pub fn backspace(&mut self) {
        if self.pinyin_mode() {
            self.pinyin_sequence.pop();
            self.syllable = Syllable::from_hanyu_pinyin(&self.pinyin_sequence);
            return;
        }

        let mut sequence = self.layout.key_sequence_from_syllable(self.syllable);
        if sequence.pop().is_some() {
            self.syllable = self.layout.syllable_from_key_sequence(&sequence);
        }
    }

    pub fn clear(&mut self) {
        self.pinyin_sequence.clear();
        self.syllable.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.syllable.is_empty()
    }

    /// The display form: the raw Pinyin sequence in Pinyin mode, the
    /// composed Bopomofo string otherwise.
    pub fn composed_string(&self) -> String {
        if self.pinyin_mode() {
            return self.pinyin_sequence.clone();
        }
        self.syllable.to_composed()
    }

    pub fn syllable(&self) -> Syllable {
        self.syllable
    }

    /// Renders the current syllable as a Standard-layout key sequence,
    /// regardless of the active layout.
    pub fn standard_layout_query_string(&self) -> String {
        KeyboardLayout::standard().key_sequence_from_syllable(self.syllable)
    }

    pub fn has_tone_marker(&self) -> bool {
        self.syllable.has_tone_marker()
    }

    pub fn has_tone_marker_only(&self) -> bool {
        self.syllable.has_tone_marker()
            && !(self.syllable.has_consonant()
                || self.syllable.has_medial()
                || self.syllable.has_vowel())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_layout_builds_a_syllable_key_by_key() {
        let mut buffer = ReadingBuffer::new(KeyboardLayout::standard());
        assert!(buffer.is_empty());
        for key in "5j/".chars() {
            assert!(buffer.combine_key(key));
        }
        assert_eq!("ㄓㄨㄥ", buffer.composed_string());
        assert!(!buffer.has_tone_marker());
    }

    #[test]
    fn invalid_keys_are_rejected_without_side_effects() {
        let mut buffer = ReadingBuffer::new(KeyboardLayout::standard());
        assert!(buffer.combine_key('1'));
        assert!(!buffer.combine_key('!'));
        assert_eq!("ㄅ", buffer.composed_string());
    }

    #[test]
    fn backspace_drops_the_last_component() {
        let mut buffer = ReadingBuffer::new(KeyboardLayout::standard());
        for key in "cj86".chars() {
            assert!(buffer.combine_key(key));
        }
        assert_eq!("ㄏㄨㄚˊ", buffer.composed_string());
        buffer.backspace();
        assert_eq!("ㄏㄨㄚ", buffer.composed_string());
        buffer.backspace();
        assert_eq!("ㄏㄨ", buffer.composed_string());
        buffer.backspace();
        buffer.backspace();
        assert!(buffer.is_empty());
        buffer.backspace();
        assert!(buffer.is_empty());
    }

    #[test]
    fn hsu_ambiguous_keys_are_reresolved_as_the_buffer_grows() {
        let mut buffer = ReadingBuffer::new(KeyboardLayout::hsu());
        assert!(buffer.combine_key('m'));
        assert_eq!("ㄢ", buffer.composed_string());
        assert!(buffer.combine_key('y'));
        assert_eq!("ㄇㄚ", buffer.composed_string());
    }

    #[test]
    fn tone_only_syllable_is_detected() {
        let mut buffer = ReadingBuffer::new(KeyboardLayout::standard());
        assert!(buffer.combine_key('6'));
        assert!(buffer.has_tone_marker_only());
        assert!(buffer.combine_key('u'));
        assert!(buffer.has_tone_marker());
        assert!(!buffer.has_tone_marker_only());
    }

    #[test]
    fn pinyin_mode_keeps_the_raw_sequence() {
        let mut buffer = ReadingBuffer::new(KeyboardLayout::hanyu_pinyin());
        for key in "ming2".chars() {
            assert!(buffer.combine_key(key));
        }
        assert_eq!("ming2", buffer.composed_string());
        assert_eq!("ㄇㄧㄥˊ", buffer.syllable().to_composed());
    }

    #[test]
    fn pinyin_mode_rejects_letters_after_a_tone_digit() {
        let mut buffer = ReadingBuffer::new(KeyboardLayout::hanyu_pinyin());
        for key in "ma3".chars() {
            assert!(buffer.combine_key(key));
        }
        assert!(!buffer.combine_key('a'));
        assert_eq!("ma3", buffer.composed_string());

        buffer.backspace();
        assert!(buffer.combine_key('a'));
        assert_eq!("maa", buffer.composed_string());
    }

    #[test]
    fn pinyin_mode_rejects_a_leading_tone_digit() {
        let mut buffer = ReadingBuffer::new(KeyboardLayout::hanyu_pinyin());
        assert!(!buffer.combine_key('3'));
        assert!(buffer.combine_key('m'));
        assert!(buffer.combine_key('3'));
    }

    #[test]
    fn standard_layout_query_string_is_layout_independent() {
        let mut buffer = ReadingBuffer::new(KeyboardLayout::hsu());
        for key in "cek".chars() {
            assert!(buffer.combine_key(key));
        }
        // ㄒㄧㄤ in Hsu keys is cek; in Standard keys it is vu;.
        assert_eq!("ㄒㄧㄤ", buffer.composed_string());
        assert_eq!("vu;", buffer.standard_layout_query_string());
    }
}
