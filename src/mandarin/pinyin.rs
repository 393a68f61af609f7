//! Hanyu Pinyin conversion.
//!
//! The parser accepts the ASCII, "v"-tolerant, Taiwan-style Hanyu Pinyin
//! spellings (fong, pong, bong are all accepted) and produces a packed
//! syllable. The renderer is its inverse, including the contraction rules
//! (ong/iong, in/un/ün, iu, ing, ui) and the w/y pseudo-initials.

use super::syllable::Syllable;

fn consume_prefix(s: &mut &str, prefix: &str) -> bool {
    if let Some(rest) = s.strip_prefix(prefix) {
        *s = rest;
        return true;
    }
    false
}

impl Syllable {
    /// Parses an ASCII Hanyu Pinyin token, tone digit included.
    ///
    /// The parser is lenient: it consumes what it recognizes and ignores
    /// the rest, so a partially typed token yields a partial syllable.
    pub fn from_hanyu_pinyin(input: &str) -> Syllable {
        if input.is_empty() {
            return Syllable::default();
        }

        let lowered = input.to_lowercase();
        let mut pinyin = lowered.as_str();

        let mut consonant: u16 = 0;
        let mut medial: u16 = 0;
        let mut vowel: u16 = 0;
        let mut tone: u16 = 0;

        // The y-exceptions come first; the longer match wins.
        if consume_prefix(&mut pinyin, "yuan") {
            medial = Syllable::UE;
            vowel = Syllable::AN;
        } else if consume_prefix(&mut pinyin, "ying") {
            medial = Syllable::I;
            vowel = Syllable::ENG;
        } else if consume_prefix(&mut pinyin, "yung") || consume_prefix(&mut pinyin, "yong") {
            medial = Syllable::UE;
            vowel = Syllable::ENG;
        } else if consume_prefix(&mut pinyin, "yue") {
            medial = Syllable::UE;
            vowel = Syllable::E;
        } else if consume_prefix(&mut pinyin, "yun") {
            medial = Syllable::UE;
            vowel = Syllable::EN;
        } else if consume_prefix(&mut pinyin, "you") {
            medial = Syllable::I;
            vowel = Syllable::OU;
        } else if consume_prefix(&mut pinyin, "yu") {
            medial = Syllable::UE;
        }

        // Single-letter consonants, plus the w/y pseudo-initials.
        let mut consumed_first = true;
        match pinyin.chars().next() {
            Some('b') => consonant = Syllable::B,
            Some('p') => consonant = Syllable::P,
            Some('m') => consonant = Syllable::M,
            Some('f') => consonant = Syllable::F,
            Some('d') => consonant = Syllable::D,
            Some('t') => consonant = Syllable::T,
            Some('n') => consonant = Syllable::N,
            Some('l') => consonant = Syllable::L,
            Some('g') => consonant = Syllable::G,
            Some('k') => consonant = Syllable::K,
            Some('h') => consonant = Syllable::H,
            Some('j') => consonant = Syllable::J,
            Some('q') => consonant = Syllable::Q,
            Some('x') => consonant = Syllable::X,
            Some('w') => medial = Syllable::U,
            Some('y') => {
                if medial == 0 && vowel == 0 {
                    medial = Syllable::I;
                }
            }
            _ => consumed_first = false,
        }
        if consumed_first {
            pinyin = &pinyin[1..];
        }

        // The retroflex and dental sibilants can stand on their own.
        let mut independent_consonant = false;
        if consume_prefix(&mut pinyin, "zh") {
            consonant = Syllable::ZH;
            independent_consonant = true;
        } else if consume_prefix(&mut pinyin, "ch") {
            consonant = Syllable::CH;
            independent_consonant = true;
        } else if consume_prefix(&mut pinyin, "sh") {
            consonant = Syllable::SH;
            independent_consonant = true;
        } else if consume_prefix(&mut pinyin, "r") {
            consonant = Syllable::R;
            independent_consonant = true;
        } else if consume_prefix(&mut pinyin, "z") {
            consonant = Syllable::Z;
            independent_consonant = true;
        } else if consume_prefix(&mut pinyin, "c") {
            consonant = Syllable::C;
            independent_consonant = true;
        } else if consume_prefix(&mut pinyin, "s") {
            consonant = Syllable::S;
            independent_consonant = true;
        }

        // Contracted finals; the longer sequence takes precedence.
        if consume_prefix(&mut pinyin, "veng") || consume_prefix(&mut pinyin, "iong") {
            medial = Syllable::UE;
            vowel = Syllable::ENG;
        } else if consume_prefix(&mut pinyin, "ing") {
            medial = Syllable::I;
            vowel = Syllable::ENG;
        } else if consume_prefix(&mut pinyin, "ien") {
            medial = Syllable::I;
            vowel = Syllable::EN;
        } else if consume_prefix(&mut pinyin, "iou") {
            medial = Syllable::I;
            vowel = Syllable::OU;
        } else if consume_prefix(&mut pinyin, "uen") {
            medial = Syllable::U;
            vowel = Syllable::EN;
        } else if consume_prefix(&mut pinyin, "ven") {
            medial = Syllable::UE;
            vowel = Syllable::EN;
        } else if consume_prefix(&mut pinyin, "uei") {
            medial = Syllable::U;
            vowel = Syllable::EI;
        } else if consume_prefix(&mut pinyin, "ung") || consume_prefix(&mut pinyin, "ong") {
            // fong, pong and friends keep no medial.
            if consonant != Syllable::F {
                medial = Syllable::U;
            }
            vowel = Syllable::ENG;
        } else if consume_prefix(&mut pinyin, "un") {
            medial = if matches!(consonant, Syllable::J | Syllable::Q | Syllable::X) {
                Syllable::UE
            } else {
                Syllable::U
            };
            vowel = Syllable::EN;
        } else if consume_prefix(&mut pinyin, "iu") {
            medial = Syllable::I;
            vowel = Syllable::OU;
        } else if consume_prefix(&mut pinyin, "in") {
            medial = Syllable::I;
            vowel = Syllable::EN;
        } else if consume_prefix(&mut pinyin, "vn") {
            medial = Syllable::UE;
            vowel = Syllable::EN;
        } else if consume_prefix(&mut pinyin, "ui") {
            medial = Syllable::U;
            vowel = Syllable::EI;
        } else if consume_prefix(&mut pinyin, "ue") {
            medial = Syllable::UE;
            vowel = Syllable::E;
        } else if consume_prefix(&mut pinyin, "ü") {
            medial = Syllable::UE;
        }

        // Plain medial.
        if consume_prefix(&mut pinyin, "i") {
            medial = if independent_consonant { 0 } else { Syllable::I };
        } else if consume_prefix(&mut pinyin, "u") {
            medial = if matches!(consonant, Syllable::J | Syllable::Q | Syllable::X) {
                Syllable::UE
            } else {
                Syllable::U
            };
        } else if consume_prefix(&mut pinyin, "v") {
            medial = Syllable::UE;
        }

        // Plain vowels; the longer sequence takes precedence.
        if consume_prefix(&mut pinyin, "ang") {
            vowel = Syllable::ANG;
        } else if consume_prefix(&mut pinyin, "eng") {
            vowel = Syllable::ENG;
        } else if consume_prefix(&mut pinyin, "err") {
            vowel = Syllable::ERR;
        } else if consume_prefix(&mut pinyin, "ai") {
            vowel = Syllable::AI;
        } else if consume_prefix(&mut pinyin, "ei") {
            vowel = Syllable::EI;
        } else if consume_prefix(&mut pinyin, "ao") {
            vowel = Syllable::AO;
        } else if consume_prefix(&mut pinyin, "ou") {
            vowel = Syllable::OU;
        } else if consume_prefix(&mut pinyin, "an") {
            vowel = Syllable::AN;
        } else if consume_prefix(&mut pinyin, "en") {
            vowel = Syllable::EN;
        } else if consume_prefix(&mut pinyin, "er") {
            vowel = Syllable::ERR;
        } else if consume_prefix(&mut pinyin, "a") {
            vowel = Syllable::A;
        } else if consume_prefix(&mut pinyin, "o") {
            vowel = Syllable::O;
        } else if consume_prefix(&mut pinyin, "e") {
            vowel = if medial != 0 { Syllable::E } else { Syllable::ER };
        }

        // The tone digit comes last.
        if consume_prefix(&mut pinyin, "1") {
            tone = Syllable::TONE1;
        } else if consume_prefix(&mut pinyin, "2") {
            tone = Syllable::TONE2;
        } else if consume_prefix(&mut pinyin, "3") {
            tone = Syllable::TONE3;
        } else if consume_prefix(&mut pinyin, "4") {
            tone = Syllable::TONE4;
        } else if consume_prefix(&mut pinyin, "5") {
            tone = Syllable::TONE5;
        }

        Syllable::new(consonant | medial | vowel | tone)
    }

    /// Renders the syllable as a Hanyu Pinyin string.
    pub fn to_hanyu_pinyin(&self, include_tone: bool, v_for_u_umlaut: bool) -> String {
        let cc = self.consonant();
        let mvc = self.medial();
        let vc = self.vowel();
        let lone_consonant = mvc == 0 && vc == 0;

        let mut consonant = "";
        let mut middle = String::new();
        let mut vowel = "";

        match cc {
            Syllable::B => consonant = "b",
            Syllable::P => consonant = "p",
            Syllable::M => consonant = "m",
            Syllable::F => consonant = "f",
            Syllable::D => consonant = "d",
            Syllable::T => consonant = "t",
            Syllable::N => consonant = "n",
            Syllable::L => consonant = "l",
            Syllable::G => consonant = "g",
            Syllable::K => consonant = "k",
            Syllable::H => consonant = "h",
            Syllable::J => consonant = "j",
            Syllable::Q => consonant = "q",
            Syllable::X => consonant = "x",
            Syllable::ZH => consonant = "zh",
            Syllable::CH => consonant = "ch",
            Syllable::SH => consonant = "sh",
            Syllable::R => consonant = "r",
            Syllable::Z => consonant = "z",
            Syllable::C => consonant = "c",
            Syllable::S => consonant = "s",
            _ => {}
        }
        if lone_consonant && matches!(cc, Syllable::J | Syllable::Q | Syllable::X) {
            middle.push('i');
        }
        if lone_consonant
            && matches!(
                cc,
                Syllable::ZH
                    | Syllable::CH
                    | Syllable::SH
                    | Syllable::R
                    | Syllable::Z
                    | Syllable::C
                    | Syllable::S
            )
        {
            middle.push('i');
        }

        match mvc {
            Syllable::I => {
                if cc == 0 {
                    consonant = "y";
                }
                middle = if vc == 0 || cc != 0 {
                    "i".to_string()
                } else {
                    String::new()
                };
            }
            Syllable::U => {
                if cc == 0 {
                    consonant = "w";
                }
                middle = if vc == 0 || cc != 0 {
                    "u".to_string()
                } else {
                    String::new()
                };
            }
            Syllable::UE => {
                if cc == 0 {
                    consonant = "y";
                }
                if matches!(cc, Syllable::N | Syllable::L) && vc != Syllable::E {
                    middle = if v_for_u_umlaut { "v" } else { "ü" }.to_string();
                } else {
                    middle = "u".to_string();
                }
            }
            _ => {}
        }

        match vc {
            Syllable::A => vowel = "a",
            Syllable::O => vowel = "o",
            Syllable::ER => vowel = "e",
            Syllable::E => vowel = "e",
            Syllable::AI => vowel = "ai",
            Syllable::EI => vowel = "ei",
            Syllable::AO => vowel = "ao",
            Syllable::OU => vowel = "ou",
            Syllable::AN => vowel = "an",
            Syllable::EN => vowel = "en",
            Syllable::ANG => vowel = "ang",
            Syllable::ENG => vowel = "eng",
            Syllable::ERR => vowel = "er",
            _ => {}
        }

        // The contraction rules run after the plain lookup.

        // ueng and üeng contract to ong or iong, except the bare "weng".
        if (mvc == Syllable::U || mvc == Syllable::UE) && vc == Syllable::ENG {
            middle.clear();
            vowel = if matches!(cc, Syllable::J | Syllable::Q | Syllable::X) {
                "iong"
            } else if cc == 0 && mvc == Syllable::U {
                "eng"
            } else {
                "ong"
            };
        }

        // ien, uen, üen contract to in, un, ün; but note wen, yin and yun.
        if mvc != 0 && vc == Syllable::EN {
            vowel = if cc != 0 {
                "n"
            } else if mvc == Syllable::UE {
                "n"
            } else if mvc == Syllable::U {
                "en"
            } else {
                "in"
            };
        }

        // iou contracts to iu.
        if cc != 0 && mvc == Syllable::I && vc == Syllable::OU {
            middle.clear();
            vowel = "iu";
        }

        // ieng contracts to ing.
        if mvc == Syllable::I && vc == Syllable::ENG {
            middle.clear();
            vowel = "ing";
        }

        // uei contracts to ui.
        if cc != 0 && mvc == Syllable::U && vc == Syllable::EI {
            middle.clear();
            vowel = "ui";
        }

        let mut out = String::new();
        out.push_str(consonant);
        out.push_str(&middle);
        out.push_str(vowel);

        if include_tone {
            match self.tone_marker() {
                Syllable::TONE2 => out.push('2'),
                Syllable::TONE3 => out.push('3'),
                Syllable::TONE4 => out.push('4'),
                Syllable::TONE5 => out.push('5'),
                _ => {}
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> String {
        Syllable::from_hanyu_pinyin(s).to_composed()
    }

    #[test]
    fn parses_plain_syllables() {
        assert_eq!("ㄇㄚ", parse("ma"));
        assert_eq!("ㄇㄧㄥˊ", parse("ming2"));
        assert_eq!("ㄔㄥˊ", parse("cheng2"));
        assert_eq!("ㄕˋ", parse("shi4"));
        assert_eq!("ㄦˋ", parse("er4"));
    }

    #[test]
    fn parses_y_and_w_pseudo_initials() {
        assert_eq!("ㄧㄥ", parse("ying"));
        assert_eq!("ㄩㄢˊ", parse("yuan2"));
        assert_eq!("ㄧㄡˇ", parse("you3"));
        assert_eq!("ㄨㄛˇ", parse("wo3"));
        assert_eq!("ㄨㄣˊ", parse("wen2"));
        assert_eq!("ㄩㄝˋ", parse("yue4"));
        assert_eq!("ㄩㄣˊ", parse("yun2"));
    }

    #[test]
    fn parses_contracted_finals() {
        assert_eq!("ㄐㄧㄡˇ", parse("jiu3"));
        assert_eq!("ㄍㄨㄥ", parse("gong"));
        assert_eq!("ㄒㄩㄥˊ", parse("xiong2"));
        assert_eq!("ㄌㄧㄣˊ", parse("lin2"));
        assert_eq!("ㄏㄨㄟˊ", parse("hui2"));
        assert_eq!("ㄐㄩㄣ", parse("jun1"));
        assert_eq!("ㄋㄩˇ", parse("nv3"));
    }

    #[test]
    fn fong_keeps_no_medial() {
        assert_eq!("ㄈㄥ", parse("fong"));
        assert_eq!("ㄈㄥ", parse("feng"));
    }

    #[test]
    fn ju_qu_xu_take_the_umlaut() {
        assert_eq!("ㄐㄩ", parse("ju"));
        assert_eq!("ㄑㄩˋ", parse("qu4"));
        assert_eq!("ㄒㄩ", parse("xu"));
        assert_eq!("ㄓㄨ", parse("zhu"));
    }

    #[test]
    fn uppercase_input_is_accepted() {
        assert_eq!("ㄇㄧㄥˊ", parse("MING2"));
    }

    #[test]
    fn renders_basic_pinyin() {
        let s = Syllable::from_hanyu_pinyin("ming2");
        assert_eq!("ming2", s.to_hanyu_pinyin(true, true));
        assert_eq!("ming", s.to_hanyu_pinyin(false, true));
    }

    #[test]
    fn rendering_round_trips_through_the_parser() {
        for token in [
            "ma", "ming2", "gong", "jiu3", "xiong2", "hui2", "wen2", "ying", "yuan2", "nv3",
            "shi4", "er4", "jun1",
        ] {
            let syllable = Syllable::from_hanyu_pinyin(token);
            let rendered = syllable.to_hanyu_pinyin(true, true);
            assert_eq!(
                syllable,
                Syllable::from_hanyu_pinyin(&rendered),
                "round-trip failed for {token} (rendered {rendered})"
            );
        }
    }
}
