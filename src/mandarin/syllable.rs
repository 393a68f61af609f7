//! The packed Bopomofo syllable.

use std::fmt::{self, Display, Write};

use thiserror::Error;

/// One phonetic component, or a combination of them, packed into 16 bits.
pub type Component = u16;

/// The error type returned when a character is not a Bopomofo symbol.
#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown symbol")]
pub struct SymbolParseError;

/// A Mandarin syllable packed into a 16-bit bitfield.
///
/// The data layout, from the most significant bit:
///
/// ```text
///  15 14 | 13 12 11 | 10 9 8 7 | 6 5 | 4 3 2 1 0
///  ------+----------+----------+-----+-----------
///  unused|   tone   |  vowel   | med | consonant
/// ```
///
/// Four disjoint fields hold the consonant (21 values), the medial glide
/// (3 values), the vowel (13 values), and the tone (5 values, with tone 1
/// encoded as zero). Merging another syllable with [`Syllable::merge`] or
/// `+=` replaces only the fields present in the right-hand side.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Debug)]
pub struct Syllable(Component);

#[rustfmt::skip]
impl Syllable {
    pub const CONSONANT_MASK: Component = 0x001F; // 0000 0000 0001 1111, 21 consonants
    pub const MEDIAL_MASK: Component    = 0x0060; // 0000 0000 0110 0000, 3 medial glides
    pub const VOWEL_MASK: Component     = 0x0780; // 0000 0111 1000 0000, 13 vowels
    pub const TONE_MASK: Component      = 0x3800; // 0011 1000 0000 0000, 5 tones (tone 1 = 0)

    pub const B: Component  = 0x0001; pub const P: Component  = 0x0002;
    pub const M: Component  = 0x0003; pub const F: Component  = 0x0004;
    pub const D: Component  = 0x0005; pub const T: Component  = 0x0006;
    pub const N: Component  = 0x0007; pub const L: Component  = 0x0008;
    pub const G: Component  = 0x0009; pub const K: Component  = 0x000A;
    pub const H: Component  = 0x000B; pub const J: Component  = 0x000C;
    pub const Q: Component  = 0x000D; pub const X: Component  = 0x000E;
    pub const ZH: Component = 0x000F; pub const CH: Component = 0x0010;
    pub const SH: Component = 0x0011; pub const R: Component  = 0x0012;
    pub const Z: Component  = 0x0013; pub const C: Component  = 0x0014;
    pub const S: Component  = 0x0015;

    pub const I: Component  = 0x0020;
    pub const U: Component  = 0x0040;
    // The u umlaut; "UE" borrows the German convention as an ersatz for
    // the /y/ sound.
    pub const UE: Component = 0x0060;

    pub const A: Component   = 0x0080; pub const O: Component   = 0x0100;
    pub const ER: Component  = 0x0180; pub const E: Component   = 0x0200;
    pub const AI: Component  = 0x0280; pub const EI: Component  = 0x0300;
    pub const AO: Component  = 0x0380; pub const OU: Component  = 0x0400;
    pub const AN: Component  = 0x0480; pub const EN: Component  = 0x0500;
    pub const ANG: Component = 0x0580; pub const ENG: Component = 0x0600;
    pub const ERR: Component = 0x0680;

    pub const TONE1: Component = 0x0000; pub const TONE2: Component = 0x0800;
    pub const TONE3: Component = 0x1000; pub const TONE4: Component = 0x1800;
    pub const TONE5: Component = 0x2000;
}

impl Syllable {
    pub const fn new(components: Component) -> Syllable {
        Syllable(components)
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub const fn has_consonant(&self) -> bool {
        self.0 & Self::CONSONANT_MASK != 0
    }

    pub const fn has_medial(&self) -> bool {
        self.0 & Self::MEDIAL_MASK != 0
    }

    pub const fn has_vowel(&self) -> bool {
        self.0 & Self::VOWEL_MASK != 0
    }

    pub const fn has_tone_marker(&self) -> bool {
        self.0 & Self::TONE_MASK != 0
    }

    pub const fn consonant(&self) -> Component {
        self.0 & Self::CONSONANT_MASK
    }

    pub const fn medial(&self) -> Component {
        self.0 & Self::MEDIAL_MASK
    }

    pub const fn vowel(&self) -> Component {
        self.0 & Self::VOWEL_MASK
    }

    pub const fn tone_marker(&self) -> Component {
        self.0 & Self::TONE_MASK
    }

    /// The union of the masks of the fields present in this syllable.
    pub const fn mask_type(&self) -> Component {
        let mut mask = 0;
        if self.0 & Self::CONSONANT_MASK != 0 {
            mask |= Self::CONSONANT_MASK;
        }
        if self.0 & Self::MEDIAL_MASK != 0 {
            mask |= Self::MEDIAL_MASK;
        }
        if self.0 & Self::VOWEL_MASK != 0 {
            mask |= Self::VOWEL_MASK;
        }
        if self.0 & Self::TONE_MASK != 0 {
            mask |= Self::TONE_MASK;
        }
        mask
    }

    /// Whether any field is present in both syllables.
    pub fn is_overlapping_with(&self, other: Syllable) -> bool {
        let both = |mask| self.0 & mask != 0 && other.0 & mask != 0;
        both(Self::CONSONANT_MASK)
            || both(Self::MEDIAL_MASK)
            || both(Self::VOWEL_MASK)
            || both(Self::TONE_MASK)
    }

    /// The consonants ㄐㄑㄒ all require the medial ㄧ or ㄩ.
    pub const fn belongs_to_jqx_class(&self) -> bool {
        let consonant = self.consonant();
        consonant == Self::J || consonant == Self::Q || consonant == Self::X
    }

    /// The consonants ㄓㄔㄕㄖㄗㄘㄙ can stand without a vowel.
    pub const fn belongs_to_zcsr_class(&self) -> bool {
        let consonant = self.consonant();
        consonant >= Self::ZH && consonant <= Self::S
    }

    /// Replaces only the fields present in `other`, leaving the rest of
    /// this syllable intact.
    pub fn merge(&mut self, other: Syllable) {
        for mask in [
            Self::CONSONANT_MASK,
            Self::MEDIAL_MASK,
            Self::VOWEL_MASK,
            Self::TONE_MASK,
        ] {
            if other.0 & mask != 0 {
                self.0 = (self.0 & !mask) | (other.0 & mask);
            }
        }
    }

    /// Parses a composed Bopomofo string such as `ㄇㄧㄥˊ`, stopping at the
    /// first character that is not a Bopomofo symbol.
    pub fn from_composed(s: &str) -> Syllable {
        let mut syllable = Syllable::default();
        for c in s.chars() {
            match component_from_char(c) {
                Ok(component) => syllable.merge(Syllable::new(component)),
                Err(SymbolParseError) => break,
            }
        }
        syllable
    }

    /// Renders the syllable in composed Bopomofo form. Tone 1 is silent.
    pub fn to_composed(&self) -> String {
        let mut out = String::new();
        for component in [
            self.consonant(),
            self.medial(),
            self.vowel(),
            self.tone_marker(),
        ] {
            if component != 0 {
                if let Some(c) = char_from_component(component) {
                    out.push(c);
                }
            }
        }
        out
    }
}

impl std::ops::AddAssign for Syllable {
    fn add_assign(&mut self, other: Syllable) {
        self.merge(other);
    }
}

impl std::ops::Add for Syllable {
    type Output = Syllable;

    fn add(mut self, other: Syllable) -> Syllable {
        self.merge(other);
        self
    }
}

impl Display for Syllable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.to_composed().chars() {
            f.write_char(c)?;
        }
        Ok(())
    }
}

/// Maps a Bopomofo character to its packed component value.
pub(crate) fn component_from_char(c: char) -> Result<Component, SymbolParseError> {
    Ok(match c {
        'ㄅ' => Syllable::B,
        'ㄆ' => Syllable::P,
        'ㄇ' => Syllable::M,
        'ㄈ' => Syllable::F,
        'ㄉ' => Syllable::D,
        'ㄊ' => Syllable::T,
        'ㄋ' => Syllable::N,
        'ㄌ' => Syllable::L,
        'ㄍ' => Syllable::G,
        'ㄎ' => Syllable::K,
        'ㄏ' => Syllable::H,
        'ㄐ' => Syllable::J,
        'ㄑ' => Syllable::Q,
        'ㄒ' => Syllable::X,
        'ㄓ' => Syllable::ZH,
        'ㄔ' => Syllable::CH,
        'ㄕ' => Syllable::SH,
        'ㄖ' => Syllable::R,
        'ㄗ' => Syllable::Z,
        'ㄘ' => Syllable::C,
        'ㄙ' => Syllable::S,
        'ㄧ' => Syllable::I,
        'ㄨ' => Syllable::U,
        'ㄩ' => Syllable::UE,
        'ㄚ' => Syllable::A,
        'ㄛ' => Syllable::O,
        'ㄜ' => Syllable::ER,
        'ㄝ' => Syllable::E,
        'ㄞ' => Syllable::AI,
        'ㄟ' => Syllable::EI,
        'ㄠ' => Syllable::AO,
        'ㄡ' => Syllable::OU,
        'ㄢ' => Syllable::AN,
        'ㄣ' => Syllable::EN,
        'ㄤ' => Syllable::ANG,
        'ㄥ' => Syllable::ENG,
        'ㄦ' => Syllable::ERR,
        'ˊ' => Syllable::TONE2,
        'ˇ' => Syllable::TONE3,
        'ˋ' => Syllable::TONE4,
        '˙' => Syllable::TONE5,
        _ => return Err(SymbolParseError),
    })
}

/// Maps a packed component value back to its Bopomofo character.
pub(crate) fn char_from_component(component: Component) -> Option<char> {
    Some(match component {
        Syllable::B => 'ㄅ',
        Syllable::P => 'ㄆ',
        Syllable::M => 'ㄇ',
        Syllable::F => 'ㄈ',
        Syllable::D => 'ㄉ',
        Syllable::T => 'ㄊ',
        Syllable::N => 'ㄋ',
        Syllable::L => 'ㄌ',
        Syllable::G => 'ㄍ',
        Syllable::K => 'ㄎ',
        Syllable::H => 'ㄏ',
        Syllable::J => 'ㄐ',
        Syllable::Q => 'ㄑ',
        Syllable::X => 'ㄒ',
        Syllable::ZH => 'ㄓ',
        Syllable::CH => 'ㄔ',
        Syllable::SH => 'ㄕ',
        Syllable::R => 'ㄖ',
        Syllable::Z => 'ㄗ',
        Syllable::C => 'ㄘ',
        Syllable::S => 'ㄙ',
        Syllable::I => 'ㄧ',
        Syllable::U => 'ㄨ',
        Syllable::UE => 'ㄩ',
        Syllable::A => 'ㄚ',
        Syllable::O => 'ㄛ',
        Syllable::ER => 'ㄜ',
        Syllable::E => 'ㄝ',
        Syllable::AI => 'ㄞ',
        Syllable::EI => 'ㄟ',
        Syllable::AO => 'ㄠ',
        Syllable::OU => 'ㄡ',
        Syllable::AN => 'ㄢ',
        Syllable::EN => 'ㄣ',
        Syllable::ANG => 'ㄤ',
        Syllable::ENG => 'ㄥ',
        Syllable::ERR => 'ㄦ',
        Syllable::TONE2 => 'ˊ',
        Syllable::TONE3 => 'ˇ',
        Syllable::TONE4 => 'ˋ',
        Syllable::TONE5 => '˙',
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_replaces_only_the_present_fields() {
        let mut syllable = Syllable::new(Syllable::M | Syllable::I | Syllable::ENG);
        syllable += Syllable::new(Syllable::TONE2);
        assert_eq!("ㄇㄧㄥˊ", syllable.to_composed());

        syllable += Syllable::new(Syllable::B);
        assert_eq!("ㄅㄧㄥˊ", syllable.to_composed());

        syllable += Syllable::new(Syllable::A);
        assert_eq!("ㄅㄧㄚˊ", syllable.to_composed());
    }

    #[test]
    fn composed_string_round_trips() {
        for composed in ["ㄇㄧㄥˊ", "ㄙ", "ㄍㄠ", "ㄉㄜ˙", "ㄋㄧㄢˊ", "ㄩㄝˋ", "ㄦ"] {
            let syllable = Syllable::from_composed(composed);
            assert!(!syllable.is_empty());
            assert_eq!(composed, syllable.to_composed());
            assert_eq!(syllable, Syllable::from_composed(&syllable.to_composed()));
        }
    }

    #[test]
    fn from_composed_stops_at_the_first_unknown_character() {
        let syllable = Syllable::from_composed("ㄇㄧx˙");
        assert_eq!("ㄇㄧ", syllable.to_composed());
    }

    #[test]
    fn tone1_is_invisible_in_composed_form() {
        let syllable = Syllable::new(Syllable::S | Syllable::TONE1);
        assert_eq!("ㄙ", syllable.to_composed());
        assert!(!syllable.has_tone_marker());
    }

    #[test]
    fn class_predicates() {
        assert!(Syllable::new(Syllable::J).belongs_to_jqx_class());
        assert!(!Syllable::new(Syllable::G).belongs_to_jqx_class());
        assert!(Syllable::new(Syllable::ZH).belongs_to_zcsr_class());
        assert!(Syllable::new(Syllable::S).belongs_to_zcsr_class());
        assert!(!Syllable::new(Syllable::B).belongs_to_zcsr_class());
    }

    #[test]
    fn overlap_checks_each_field_independently() {
        let a = Syllable::new(Syllable::M | Syllable::I);
        assert!(a.is_overlapping_with(Syllable::new(Syllable::B)));
        assert!(a.is_overlapping_with(Syllable::new(Syllable::U)));
        assert!(!a.is_overlapping_with(Syllable::new(Syllable::ENG | Syllable::TONE3)));
    }

    #[test]
    fn mask_type_reports_present_fields() {
        let syllable = Syllable::new(Syllable::M | Syllable::ENG);
        assert_eq!(
            Syllable::CONSONANT_MASK | Syllable::VOWEL_MASK,
            syllable.mask_type()
        );
    }
}
