//! Keyboard layouts and ambiguous-key resolution.
//!
//! The Standard and IBM layouts map every key to exactly one component.
//! ETen26 and Hsu fold 41 symbols onto 26 keys, so a key press may stand
//! for two or three different components; which one applies depends on the
//! keys already entered and the keys still to come. The resolution rules
//! live in [`KeyboardLayout::syllable_from_key_sequence`].

use std::collections::HashMap;
use std::sync::OnceLock;

use super::syllable::{Component, Syllable};

/// Identifies one of the built-in layouts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutKind {
    Standard,
    Eten,
    Hsu,
    Eten26,
    Ibm,
    HanyuPinyin,
}

/// An immutable keyboard layout: key to candidate components, and the
/// reverse map. The five Bopomofo layouts are process-wide singletons.
pub struct KeyboardLayout {
    kind: LayoutKind,
    name: &'static str,
    key_to_components: HashMap<char, Vec<Component>>,
    component_to_key: HashMap<Component, char>,
}

impl KeyboardLayout {
    fn new(
        kind: LayoutKind,
        name: &'static str,
        mappings: &[(char, &[Component])],
    ) -> KeyboardLayout {
        let mut key_to_components = HashMap::new();
        let mut component_to_key = HashMap::new();
        for &(key, components) in mappings {
            key_to_components.insert(key, components.to_vec());
            for &component in components {
                component_to_key.insert(component, key);
            }
        }
        KeyboardLayout {
            kind,
            name,
            key_to_components,
            component_to_key,
        }
    }

    pub fn standard() -> &'static KeyboardLayout {
        static LAYOUT: OnceLock<KeyboardLayout> = OnceLock::new();
        LAYOUT.get_or_init(build_standard)
    }

    pub fn eten() -> &'static KeyboardLayout {
        static LAYOUT: OnceLock<KeyboardLayout> = OnceLock::new();
        LAYOUT.get_or_init(build_eten)
    }

    pub fn hsu() -> &'static KeyboardLayout {
        static LAYOUT: OnceLock<KeyboardLayout> = OnceLock::new();
        LAYOUT.get_or_init(build_hsu)
    }

    pub fn eten26() -> &'static KeyboardLayout {
        static LAYOUT: OnceLock<KeyboardLayout> = OnceLock::new();
        LAYOUT.get_or_init(build_eten26)
    }

    pub fn ibm() -> &'static KeyboardLayout {
        static LAYOUT: OnceLock<KeyboardLayout> = OnceLock::new();
        LAYOUT.get_or_init(build_ibm)
    }

    /// The Hanyu Pinyin pass-through. It has no key table; the reading
    /// buffer detects it and routes keys to the Pinyin parser instead.
    pub fn hanyu_pinyin() -> &'static KeyboardLayout {
        static LAYOUT: OnceLock<KeyboardLayout> = OnceLock::new();
        LAYOUT.get_or_init(|| KeyboardLayout::new(LayoutKind::HanyuPinyin, "HanyuPinyin", &[]))
    }

    pub fn kind(&self) -> LayoutKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn component_to_key(&self, component: Component) -> Option<char> {
        self.component_to_key.get(&component).copied()
    }

    pub fn key_to_components(&self, key: char) -> &[Component] {
        self.key_to_components
            .get(&key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Renders a syllable back into this layout's key sequence.
    pub fn key_sequence_from_syllable(&self, syllable: Syllable) -> String {
        let mut sequence = String::new();
        for component in [
            syllable.consonant(),
            syllable.medial(),
            syllable.vowel(),
            syllable.tone_marker(),
        ] {
            if component != 0 {
                if let Some(key) = self.component_to_key(component) {
                    sequence.push(key);
                }
            }
        }
        sequence
    }

    /// Re-derives the syllable from a full key sequence, resolving
    /// ambiguous keys from the surrounding context.
    pub fn syllable_from_key_sequence(&self, sequence: &str) -> Syllable {
        let mut syllable = Syllable::default();

        for (pos, key) in sequence.char_indices() {
            let before = &sequence[..pos];
            let ahead = &sequence[pos + key.len_utf8()..];
            let before_has_i_or_ue = self.contains_i_or_ue(before);
            let ahead_has_i_or_ue = self.contains_i_or_ue(ahead);

            let components = self.key_to_components(key);
            if components.is_empty() {
                continue;
            }
            if components.len() == 1 {
                syllable += Syllable::new(components[0]);
                continue;
            }

            let head = Syllable::new(components[0]);
            let follow = Syllable::new(components[1]);
            let ending = if components.len() > 2 {
                Syllable::new(components[2])
            } else {
                follow
            };

            // The I/UE + E rule: ㄝ only ever follows ㄧ or ㄩ.
            if head.vowel() == Syllable::E && follow.vowel() != Syllable::E {
                syllable += if before_has_i_or_ue { head } else { follow };
                continue;
            }
            if head.vowel() != Syllable::E && follow.vowel() == Syllable::E {
                syllable += if before_has_i_or_ue { follow } else { head };
                continue;
            }

            // The J/Q/X + I/UE rule; only two candidates occur here.
            if head.belongs_to_jqx_class() && !follow.belongs_to_jqx_class() {
                if !syllable.is_empty() {
                    if ending != follow {
                        syllable += ending;
                    }
                } else {
                    syllable += if ahead_has_i_or_ue { head } else { follow };
                }
                continue;
            }
            if !head.belongs_to_jqx_class() && follow.belongs_to_jqx_class() {
                if !syllable.is_empty() {
                    if ending != follow {
                        syllable += ending;
                    }
                } else {
                    syllable += if ahead_has_i_or_ue { follow } else { head };
                }
                continue;
            }

            // The nasty case of a single key in the whole buffer.
            if pos == 0 && ahead.is_empty() {
                if head.has_vowel() || follow.has_tone_marker() || head.belongs_to_zcsr_class() {
                    syllable += head;
                } else if follow.has_vowel() || ending.has_tone_marker() {
                    syllable += follow;
                } else {
                    syllable += ending;
                }
                continue;
            }

            let tone_or_end_ahead = self.at_end_or_tone_mark_ahead(ahead);
            if syllable.mask_type() & head.mask_type() == 0 && !tone_or_end_ahead {
                syllable += head;
            } else if tone_or_end_ahead
                && head.belongs_to_zcsr_class()
                && syllable.is_empty()
            {
                syllable += head;
            } else if syllable.mask_type() < follow.mask_type() {
                syllable += follow;
            } else {
                syllable += ending;
            }
        }

        if self.kind == LayoutKind::Hsu {
            // Fix the leftover ㄥ to ㄦ when it stands alone, and promote
            // ㄍㄧ/ㄍㄩ to ㄐㄧ/ㄐㄩ.
            if syllable.vowel() == Syllable::ENG
                && !syllable.has_consonant()
                && !syllable.has_medial()
            {
                syllable += Syllable::new(Syllable::ERR);
            } else if syllable.consonant() == Syllable::G
                && (syllable.medial() == Syllable::I || syllable.medial() == Syllable::UE)
            {
                syllable += Syllable::new(Syllable::J);
            }
        }

        syllable
    }

    fn contains_i_or_ue(&self, range: &str) -> bool {
        let i_key = self.component_to_key(Syllable::I);
        let ue_key = self.component_to_key(Syllable::UE);
        range
            .chars()
            .any(|c| Some(c) == i_key || Some(c) == ue_key)
    }

    /// True at the end of the sequence, or when the next key is a tone
    /// mark.
    fn at_end_or_tone_mark_ahead(&self, ahead: &str) -> bool {
        let Some(next) = ahead.chars().next() else {
            return true;
        };

        if let Some(tone1) = self.component_to_key(Syllable::TONE1) {
            if next == tone1 {
                return true;
            }
        }
        [
            Syllable::TONE2,
            Syllable::TONE3,
            Syllable::TONE4,
            Syllable::TONE5,
        ]
        .iter()
        .any(|&tone| self.component_to_key(tone) == Some(next))
    }
}

fn build_standard() -> KeyboardLayout {
    use super::syllable::Syllable as S;
    KeyboardLayout::new(
        LayoutKind::Standard,
        "Standard",
        &[
            ('1', &[S::B]),
            ('q', &[S::P]),
            ('a', &[S::M]),
            ('z', &[S::F]),
            ('2', &[S::D]),
            ('w', &[S::T]),
            ('s', &[S::N]),
            ('x', &[S::L]),
            ('e', &[S::G]),
            ('d', &[S::K]),
            ('c', &[S::H]),
            ('r', &[S::J]),
            ('f', &[S::Q]),
            ('v', &[S::X]),
            ('5', &[S::ZH]),
            ('t', &[S::CH]),
            ('g', &[S::SH]),
            ('b', &[S::R]),
            ('y', &[S::Z]),
            ('h', &[S::C]),
            ('n', &[S::S]),
            ('u', &[S::I]),
            ('j', &[S::U]),
            ('m', &[S::UE]),
            ('8', &[S::A]),
            ('i', &[S::O]),
            ('k', &[S::ER]),
            (',', &[S::E]),
            ('9', &[S::AI]),
            ('o', &[S::EI]),
            ('l', &[S::AO]),
            ('.', &[S::OU]),
            ('0', &[S::AN]),
            ('p', &[S::EN]),
            (';', &[S::ANG]),
            ('/', &[S::ENG]),
            ('-', &[S::ERR]),
            ('3', &[S::TONE3]),
            ('4', &[S::TONE4]),
            ('6', &[S::TONE2]),
            ('7', &[S::TONE5]),
        ],
    )
}

fn build_ibm() -> KeyboardLayout {
    use super::syllable::Syllable as S;
    KeyboardLayout::new(
        LayoutKind::Ibm,
        "IBM",
        &[
            ('1', &[S::B]),
            ('2', &[S::P]),
            ('3', &[S::M]),
            ('4', &[S::F]),
            ('5', &[S::D]),
            ('6', &[S::T]),
            ('7', &[S::N]),
            ('8', &[S::L]),
            ('9', &[S::G]),
            ('0', &[S::K]),
            ('-', &[S::H]),
            ('q', &[S::J]),
            ('w', &[S::Q]),
            ('e', &[S::X]),
            ('r', &[S::ZH]),
            ('t', &[S::CH]),
            ('y', &[S::SH]),
            ('u', &[S::R]),
            ('i', &[S::Z]),
            ('o', &[S::C]),
            ('p', &[S::S]),
            ('a', &[S::I]),
            ('s', &[S::U]),
            ('d', &[S::UE]),
            ('f', &[S::A]),
            ('g', &[S::O]),
            ('h', &[S::ER]),
            ('j', &[S::E]),
            ('k', &[S::AI]),
            ('l', &[S::EI]),
            (';', &[S::AO]),
            ('z', &[S::OU]),
            ('x', &[S::AN]),
            ('c', &[S::EN]),
            ('v', &[S::ANG]),
            ('b', &[S::ENG]),
            ('n', &[S::ERR]),
            ('m', &[S::TONE2]),
            (',', &[S::TONE3]),
            ('.', &[S::TONE4]),
            ('/', &[S::TONE5]),
        ],
    )
}

fn build_eten() -> KeyboardLayout {
    use super::syllable::Syllable as S;
    KeyboardLayout::new(
        LayoutKind::Eten,
        "ETen",
        &[
            ('b', &[S::B]),
            ('p', &[S::P]),
            ('m', &[S::M]),
            ('f', &[S::F]),
            ('d', &[S::D]),
            ('t', &[S::T]),
            ('n', &[S::N]),
            ('l', &[S::L]),
            ('v', &[S::G]),
            ('k', &[S::K]),
            ('h', &[S::H]),
            ('g', &[S::J]),
            ('7', &[S::Q]),
            ('c', &[S::X]),
            (',', &[S::ZH]),
            ('.', &[S::CH]),
            ('/', &[S::SH]),
            ('j', &[S::R]),
            (';', &[S::Z]),
            ('\'', &[S::C]),
            ('s', &[S::S]),
            ('e', &[S::I]),
            ('x', &[S::U]),
            ('u', &[S::UE]),
            ('a', &[S::A]),
            ('o', &[S::O]),
            ('r', &[S::ER]),
            ('w', &[S::E]),
            ('i', &[S::AI]),
            ('q', &[S::EI]),
            ('z', &[S::AO]),
            ('y', &[S::OU]),
            ('8', &[S::AN]),
            ('9', &[S::EN]),
            ('0', &[S::ANG]),
            ('-', &[S::ENG]),
            ('=', &[S::ERR]),
            ('2', &[S::TONE2]),
            ('3', &[S::TONE3]),
            ('4', &[S::TONE4]),
            ('1', &[S::TONE5]),
        ],
    )
}

fn build_hsu() -> KeyboardLayout {
    use super::syllable::Syllable as S;
    KeyboardLayout::new(
        LayoutKind::Hsu,
        "Hsu",
        &[
            ('b', &[S::B]),
            ('p', &[S::P]),
            ('m', &[S::M, S::AN]),
            ('f', &[S::F, S::TONE3]),
            ('d', &[S::D, S::TONE2]),
            ('t', &[S::T]),
            ('n', &[S::N, S::EN]),
            ('l', &[S::L, S::ENG, S::ERR]),
            ('g', &[S::G, S::ER]),
            ('k', &[S::K, S::ANG]),
            ('h', &[S::H, S::O]),
            ('j', &[S::J, S::ZH, S::TONE4]),
            ('v', &[S::Q, S::CH]),
            ('c', &[S::X, S::SH]),
            ('r', &[S::R]),
            ('z', &[S::Z]),
            ('a', &[S::C, S::EI]),
            ('s', &[S::S, S::TONE5]),
            ('e', &[S::I, S::E]),
            ('x', &[S::U]),
            ('u', &[S::UE]),
            ('y', &[S::A]),
            ('i', &[S::AI]),
            ('w', &[S::AO]),
            ('o', &[S::OU]),
        ],
    )
}

fn build_eten26() -> KeyboardLayout {
    use super::syllable::Syllable as S;
    KeyboardLayout::new(
        LayoutKind::Eten26,
        "ETen26",
        &[
            ('b', &[S::B]),
            ('p', &[S::P, S::OU]),
            ('m', &[S::M, S::AN]),
            ('f', &[S::F, S::TONE2]),
            ('d', &[S::D, S::TONE5]),
            ('t', &[S::T, S::ANG]),
            ('n', &[S::N, S::EN]),
            ('l', &[S::L, S::ENG]),
            ('v', &[S::G, S::Q]),
            ('k', &[S::K, S::TONE4]),
            ('h', &[S::H, S::ERR]),
            ('g', &[S::ZH, S::J]),
            ('c', &[S::SH, S::X]),
            ('y', &[S::CH]),
            ('j', &[S::R, S::TONE3]),
            ('q', &[S::Z, S::EI]),
            ('w', &[S::C, S::E]),
            ('s', &[S::S]),
            ('e', &[S::I]),
            ('x', &[S::U]),
            ('u', &[S::UE]),
            ('a', &[S::A]),
            ('o', &[S::O]),
            ('r', &[S::ER]),
            ('i', &[S::AI]),
            ('z', &[S::AO]),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_layout_is_unambiguous() {
        let layout = KeyboardLayout::standard();
        let syllable = layout.syllable_from_key_sequence("su3");
        assert_eq!("ㄋㄧˇ", syllable.to_composed());
    }

    #[test]
    fn standard_layout_key_sequence_round_trips() {
        let layout = KeyboardLayout::standard();
        for sequence in ["5j/", "su3", "cj86", "m,4"] {
            let syllable = layout.syllable_from_key_sequence(sequence);
            assert_eq!(sequence, layout.key_sequence_from_syllable(syllable));
        }
    }

    #[test]
    fn hsu_resolves_consonant_vs_vowel_by_position() {
        let layout = KeyboardLayout::hsu();
        // A lone m reads as the vowel ㄢ until more keys arrive; the
        // buffer re-derives the whole sequence on every key press.
        assert_eq!("ㄢ", layout.syllable_from_key_sequence("m").to_composed());
        assert_eq!(
            "ㄊㄢ",
            layout.syllable_from_key_sequence("tm").to_composed()
        );
        assert_eq!(
            "ㄇㄚ",
            layout.syllable_from_key_sequence("my").to_composed()
        );
    }

    #[test]
    fn hsu_e_is_vowel_after_i() {
        let layout = KeyboardLayout::hsu();
        // e after e: the first is ㄧ, the second is ㄝ.
        assert_eq!(
            "ㄒㄧㄝ",
            layout.syllable_from_key_sequence("cee").to_composed()
        );
    }

    #[test]
    fn hsu_jqx_requires_following_i_or_ue() {
        let layout = KeyboardLayout::hsu();
        // c is ㄒ when ㄧ follows, ㄕ otherwise.
        assert_eq!(
            "ㄒㄧ",
            layout.syllable_from_key_sequence("ce").to_composed()
        );
        assert_eq!("ㄕ", layout.syllable_from_key_sequence("c").to_composed());
    }

    #[test]
    fn hsu_lone_eng_becomes_err() {
        let layout = KeyboardLayout::hsu();
        assert_eq!("ㄦ", layout.syllable_from_key_sequence("l").to_composed());
        assert_eq!(
            "ㄌㄥ",
            layout.syllable_from_key_sequence("ll").to_composed()
        );
    }

    #[test]
    fn hsu_g_with_medial_promotes_to_j() {
        let layout = KeyboardLayout::hsu();
        assert_eq!(
            "ㄐㄧ",
            layout.syllable_from_key_sequence("ge").to_composed()
        );
        assert_eq!(
            "ㄍㄜ",
            layout.syllable_from_key_sequence("gg").to_composed()
        );
    }

    #[test]
    fn hsu_tone_keys_after_content_are_tones() {
        let layout = KeyboardLayout::hsu();
        // d after a syllable is tone 2, not ㄉ.
        assert_eq!(
            "ㄊㄢˊ",
            layout.syllable_from_key_sequence("tmd").to_composed()
        );
    }

    #[test]
    fn eten26_resolves_two_way_keys() {
        let layout = KeyboardLayout::eten26();
        assert_eq!(
            "ㄊㄤ",
            layout.syllable_from_key_sequence("tt").to_composed()
        );
        assert_eq!(
            "ㄓㄨㄥ",
            layout.syllable_from_key_sequence("gxl").to_composed()
        );
    }

    #[test]
    fn pinyin_layout_has_no_key_table() {
        let layout = KeyboardLayout::hanyu_pinyin();
        assert_eq!(LayoutKind::HanyuPinyin, layout.kind());
        assert!(layout.key_to_components('a').is_empty());
    }
}
