//! The user override model.
//!
//! Every time the user picks a non-default candidate, the model records
//! the pick keyed on the surrounding context, and on later cursor moves
//! it suggests the recorded candidate back when the context recurs. A
//! suggestion's strength balances "recent but infrequently observed"
//! against "old but frequently observed": each override's score is its
//! relative frequency damped by an exponential time decay.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use lru::LruCache;

use crate::grid::{WalkResult, WalkedNode};

// An override's contribution fully decays after about 20 half-lives.
const DECAY_THRESHOLD: f64 = 1.0 / 1_048_576.0;

const EMPTY_NODE: &str = "()";

/// A suggested override for the current context.
#[derive(Clone, Debug, PartialEq)]
pub struct Suggestion {
    pub candidate: String,
    /// When set, the shell should apply the suggestion as a high-score
    /// override rather than a soft one.
    pub force_high_score_override: bool,
}

#[derive(Debug, Default)]
struct Override {
    count: usize,
    timestamp: f64,
    force_high_score: bool,
}

#[derive(Debug, Default)]
struct Observation {
    count: usize,
    overrides: HashMap<String, Override>,
}

impl Observation {
    fn update(&mut self, candidate: &str, timestamp: f64, force_high_score: bool) {
        self.count += 1;
        let o = self.overrides.entry(candidate.to_string()).or_default();
        o.timestamp = timestamp;
        o.count += 1;
        o.force_high_score |= force_high_score;
    }
}

/// A capacity-bounded LRU of context key to observation.
pub struct UserOverrideModel {
    lru: LruCache<String, Observation>,
    decay_exponent: f64,
}

impl UserOverrideModel {
    /// `capacity` bounds the number of remembered contexts;
    /// `decay_constant` is the half-life in the timestamp unit (seconds
    /// in practice, e.g. 5400 for 1.5 hours).
    pub fn new(capacity: usize, decay_constant: f64) -> UserOverrideModel {
        let capacity = NonZeroUsize::new(capacity).expect("capacity must be positive");
        UserOverrideModel {
            lru: LruCache::new(capacity),
            decay_exponent: 0.5f64.ln() / decay_constant,
        }
    }

    /// Records the user override that turned `walk_before` into
    /// `walk_after` at `cursor`.
    ///
    /// Three cases are told apart by comparing the head node of the new
    /// walk against the head of the old walk at the same position:
    ///
    /// 1. Same length: a plain substitution. The observation keys off
    ///    the walk before the override, with no forced high score.
    /// 2. New head longer: the user assembled a multi-character phrase
    ///    out of competing shorter nodes. Still keyed off the walk
    ///    before, but the suggestion must force a high-score override,
    ///    because such phrases often lose to the sum of their parts.
    /// 3. New head is a single character breaking up a longer phrase.
    ///    Keyed off the walk after the override, with no forcing, so the
    ///    long phrase can still win elsewhere.
    pub fn observe(
        &mut self,
        walk_before: &WalkResult,
        walk_after: &WalkResult,
        cursor: usize,
        timestamp: f64,
    ) {
        if walk_before.nodes.is_empty() || walk_after.nodes.is_empty() {
            return;
        }
        if walk_before.total_readings != walk_after.total_readings {
            return;
        }

        let Some((current_index, actual_cursor)) = walk_after.find_node_at(cursor) else {
            return;
        };
        let current = &walk_after.nodes[current_index];

        // Phrases longer than three characters are not worth learning.
        if current.spanning_length > 3 {
            return;
        }

        if actual_cursor == 0 {
            return;
        }
        // The returned cursor is past the current node; step back inside.
        let actual_cursor = actual_cursor - 1;

        let Some((prev_head_index, _)) = walk_before.find_node_at(actual_cursor) else {
            return;
        };
        let prev_head = &walk_before.nodes[prev_head_index];

        let force_high_score = current.spanning_length > prev_head.spanning_length;
        let breaking_up =
            current.spanning_length == 1 && prev_head.spanning_length > 1;

        let key = if breaking_up {
            form_observation_key(&walk_after.nodes, current_index)
        } else {
            form_observation_key(&walk_before.nodes, prev_head_index)
        };
        self.observe_key(&key, &current.value, timestamp, force_high_score);
    }

    /// Suggests a candidate for the node at `cursor` of the current walk.
    pub fn suggest(
        &self,
        walk: &WalkResult,
        cursor: usize,
        timestamp: f64,
    ) -> Option<Suggestion> {
        let (index, _) = walk.find_node_at(cursor)?;
        let key = form_observation_key(&walk.nodes, index);
        self.suggest_key(&key, timestamp)
    }

    /// Records one observed override under `key`, moving the entry to
    /// the front of the LRU and evicting the oldest entry on overflow.
    pub fn observe_key(
        &mut self,
        key: &str,
        candidate: &str,
        timestamp: f64,
        force_high_score: bool,
    ) {
        if let Some(observation) = self.lru.get_mut(key) {
            observation.update(candidate, timestamp, force_high_score);
            return;
        }
        let mut observation = Observation::default();
        observation.update(candidate, timestamp, force_high_score);
        self.lru.put(key.to_string(), observation);
    }

    /// Scores every override recorded under `key` and returns the best,
    /// or nothing once all of them have decayed away. Suggesting does
    /// not refresh the entry's LRU position.
    pub fn suggest_key(&self, key: &str, timestamp: f64) -> Option<Suggestion> {
        let observation = self.lru.peek(key)?;

        let mut best: Option<(&str, &Override, f64)> = None;
        for (candidate, o) in &observation.overrides {
            let score = score(
                o.count,
                observation.count,
                o.timestamp,
                timestamp,
                self.decay_exponent,
            );
            if score == 0.0 {
                continue;
            }
            if best.map_or(true, |(_, _, best_score)| score > best_score) {
                best = Some((candidate, o, score));
            }
        }

        best.map(|(candidate, o, _)| Suggestion {
            candidate: candidate.to_string(),
            force_high_score_override: o.force_high_score,
        })
    }
}

fn score(
    event_count: usize,
    total_count: usize,
    event_timestamp: f64,
    timestamp: f64,
    decay_exponent: f64,
) -> f64 {
    let decay = ((timestamp - event_timestamp) * decay_exponent).exp();
    if decay < DECAY_THRESHOLD {
        return 0.0;
    }
    (event_count as f64 / total_count as f64) * decay
}

fn combine_reading_value(reading: &str, value: &str) -> String {
    format!("({reading},{value})")
}

// Punctuation nodes use readings with a leading underscore; they key as
// if the sentence started there.
fn is_punctuation(node: &WalkedNode) -> bool {
    node.reading.starts_with('_')
}

/// Forms the ternary context key `A-B-H` for the node at `head`: the head
/// with its **top** unigram value, then the one and two nodes to its
/// left with their current values, `()` when absent or punctuation.
///
/// The head uses the top unigram because observations describe the walk
/// before the user override, and at suggestion time the head node is not
/// yet overridden.
fn form_observation_key(nodes: &[WalkedNode], head: usize) -> String {
    let head_node = &nodes[head];
    let head_str = combine_reading_value(&head_node.reading, &head_node.top_value);

    let mut prev_is_punctuation = false;
    let prev_str = if head > 0 {
        let prev = &nodes[head - 1];
        prev_is_punctuation = is_punctuation(prev);
        if prev_is_punctuation {
            EMPTY_NODE.to_string()
        } else {
            combine_reading_value(&prev.reading, &prev.value)
        }
    } else {
        EMPTY_NODE.to_string()
    };

    let anterior_str = if head > 1 && !prev_is_punctuation {
        let anterior = &nodes[head - 2];
        if is_punctuation(anterior) {
            EMPTY_NODE.to_string()
        } else {
            combine_reading_value(&anterior.reading, &anterior.value)
        }
    } else {
        EMPTY_NODE.to_string()
    };

    format!("{anterior_str}-{prev_str}-{head_str}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAKE_NOW: f64 = 1657772432.0;
    const CAPACITY: usize = 5;
    const HALF_LIFE: f64 = 5400.0; // 1.5 hours.

    #[test]
    fn a_single_observation_decays_after_twenty_half_lives() {
        let mut uom = UserOverrideModel::new(CAPACITY, HALF_LIFE);
        uom.observe_key("abc", "v", FAKE_NOW, false);

        for generations in [0.0, 1.0, 5.0, 10.0, 20.0] {
            let suggestion = uom
                .suggest_key("abc", FAKE_NOW + HALF_LIFE * generations)
                .unwrap();
            assert_eq!("v", suggestion.candidate);
            assert!(!suggestion.force_high_score_override);
        }

        assert!(uom.suggest_key("abc", FAKE_NOW + HALF_LIFE * 21.0).is_none());
    }

    #[test]
    fn suggestion_scores_never_increase_over_time() {
        let mut uom = UserOverrideModel::new(CAPACITY, HALF_LIFE);
        uom.observe_key("abc", "v", 0.0, false);

        let entry = uom.lru.peek("abc").unwrap();
        let o = &entry.overrides["v"];
        let mut last = f64::INFINITY;
        for hours in 0..30 {
            let s = score(o.count, entry.count, 0.0, hours as f64 * 3600.0, uom.decay_exponent);
            assert!(s <= last);
            last = s;
        }
    }

    #[test]
    fn frequency_wins_until_freshness_takes_over() {
        let mut uom = UserOverrideModel::new(CAPACITY, HALF_LIFE);
        for i in 0..5 {
            uom.observe_key("abc", "older", FAKE_NOW + HALF_LIFE * i as f64, false);
        }
        uom.observe_key("abc", "newer", FAKE_NOW + HALF_LIFE * 5.0, false);
        uom.observe_key("abc", "newer", FAKE_NOW + HALF_LIFE * 5.25, false);

        // The older value was observed five times, so it still wins.
        for generations in [7.0, 20.0, 22.0] {
            let s = uom
                .suggest_key("abc", FAKE_NOW + HALF_LIFE * generations)
                .unwrap();
            assert_eq!("older", s.candidate);
        }

        // A re-observation of the newer value tips the balance.
        uom.observe_key("abc", "newer", FAKE_NOW + HALF_LIFE * 23.0, false);
        for generations in [23.5, 25.0] {
            let s = uom
                .suggest_key("abc", FAKE_NOW + HALF_LIFE * generations)
                .unwrap();
            assert_eq!("newer", s.candidate);
        }

        assert!(uom.suggest_key("abc", FAKE_NOW + HALF_LIFE * 45.0).is_none());
    }

    #[test]
    fn least_recently_used_contexts_are_evicted() {
        let mut uom = UserOverrideModel::new(2, HALF_LIFE);
        uom.observe_key("abc", "x", FAKE_NOW, false);
        uom.observe_key("def", "y", FAKE_NOW + HALF_LIFE, false);
        uom.observe_key("ghi", "z", FAKE_NOW + HALF_LIFE * 2.0, false);

        let s = uom.suggest_key("ghi", FAKE_NOW + HALF_LIFE * 3.0).unwrap();
        assert_eq!("z", s.candidate);
        let s = uom.suggest_key("def", FAKE_NOW + HALF_LIFE * 4.0).unwrap();
        assert_eq!("y", s.candidate);

        assert!(uom.suggest_key("abc", FAKE_NOW + HALF_LIFE * 5.0).is_none());

        // Suggesting does not refresh recency: def is still the least
        // recently observed entry, so the next insert evicts it.
        uom.observe_key("jkl", "p", FAKE_NOW + HALF_LIFE * 6.0, false);
        let s = uom.suggest_key("ghi", FAKE_NOW + HALF_LIFE * 7.0).unwrap();
        assert_eq!("z", s.candidate);
        assert!(uom.suggest_key("def", FAKE_NOW + HALF_LIFE * 7.0).is_none());
    }

    #[test]
    fn the_force_bit_sticks_once_set() {
        let mut uom = UserOverrideModel::new(CAPACITY, HALF_LIFE);
        uom.observe_key("abc", "v", FAKE_NOW, true);
        uom.observe_key("abc", "v", FAKE_NOW + 1.0, false);
        let s = uom.suggest_key("abc", FAKE_NOW + 2.0).unwrap();
        assert!(s.force_high_score_override);
    }

    mod walks {
        use super::*;
        use crate::grid::WalkedNode;

        fn node(reading: &str, len: usize, value: &str, top: &str) -> WalkedNode {
            WalkedNode {
                reading: reading.to_string(),
                spanning_length: len,
                value: value.to_string(),
                top_value: top.to_string(),
            }
        }

        fn walk(nodes: Vec<WalkedNode>) -> WalkResult {
            let total = nodes.iter().map(|n| n.spanning_length).sum();
            WalkResult {
                total_readings: total,
                nodes,
                ..Default::default()
            }
        }

        #[test]
        fn observation_keys_use_top_value_for_the_head_only() {
            let nodes = vec![
                node("ㄊㄚ", 1, "他", "他"),
                node("ㄒㄧㄥˋ", 1, "姓", "姓"),
                node("ㄓㄨㄥ", 1, "中", "中"),
            ];
            let key = form_observation_key(&nodes, 2);
            assert_eq!("(ㄊㄚ,他)-(ㄒㄧㄥˋ,姓)-(ㄓㄨㄥ,中)", key);
        }

        #[test]
        fn punctuation_blanks_the_context() {
            let nodes = vec![
                node("ㄊㄚ", 1, "他", "他"),
                node("_punct", 1, "，", "，"),
                node("ㄓㄨㄥ", 1, "中", "中"),
            ];
            let key = form_observation_key(&nodes, 2);
            assert_eq!("()-()-(ㄓㄨㄥ,中)", key);
        }

        #[test]
        fn the_start_of_the_walk_has_an_empty_context() {
            let nodes = vec![node("ㄓㄨㄥ", 1, "中", "中")];
            assert_eq!("()-()-(ㄓㄨㄥ,中)", form_observation_key(&nodes, 0));
        }

        #[test]
        fn same_length_override_is_observed_without_forcing() {
            let before = walk(vec![
                node("ㄊㄚ", 1, "他", "他"),
                node("ㄒㄧㄥˋ", 1, "姓", "姓"),
                node("ㄓㄨㄥ", 1, "中", "中"),
            ]);
            let after = walk(vec![
                node("ㄊㄚ", 1, "他", "他"),
                node("ㄒㄧㄥˋ", 1, "姓", "姓"),
                node("ㄓㄨㄥ", 1, "鍾", "中"),
            ]);

            let mut uom = UserOverrideModel::new(CAPACITY, HALF_LIFE);
            uom.observe(&before, &after, 2, FAKE_NOW);

            let suggestion = uom.suggest(&before, 2, FAKE_NOW + 1.0).unwrap();
            assert_eq!("鍾", suggestion.candidate);
            assert!(!suggestion.force_high_score_override);
        }

        #[test]
        fn a_longer_new_head_forces_high_score() {
            let before = walk(vec![
                node("ㄗˋ", 1, "自", "自"),
                node("ㄏㄨㄟˋ", 1, "會", "會"),
            ]);
            let after = walk(vec![node("ㄗˋ-ㄏㄨㄟˋ", 2, "字彙", "字彙")]);

            let mut uom = UserOverrideModel::new(CAPACITY, HALF_LIFE);
            uom.observe(&before, &after, 0, FAKE_NOW);

            let suggestion = uom.suggest(&before, 1, FAKE_NOW + 1.0).unwrap();
            assert_eq!("字彙", suggestion.candidate);
            assert!(suggestion.force_high_score_override);
        }

        #[test]
        fn breaking_up_a_phrase_keys_off_the_new_walk() {
            let before = walk(vec![node("ㄙㄢ-ㄅㄞˇ-ㄩㄢˊ", 3, "三百元", "三百元")]);
            let after = walk(vec![
                node("ㄙㄢ", 1, "參", "三"),
                node("ㄅㄞˇ", 1, "百", "百"),
                node("ㄩㄢˊ", 1, "元", "元"),
            ]);

            let mut uom = UserOverrideModel::new(CAPACITY, HALF_LIFE);
            uom.observe(&before, &after, 0, FAKE_NOW);

            // The key derives from the after-walk context of the head.
            let key = form_observation_key(&after.nodes, 0);
            let suggestion = uom.suggest_key(&key, FAKE_NOW + 1.0).unwrap();
            assert_eq!("參", suggestion.candidate);
            assert!(!suggestion.force_high_score_override);
        }

        #[test]
        fn long_heads_are_not_observed() {
            let before = walk(vec![node("ㄚ-ㄚ-ㄚ-ㄚ", 4, "aaaa", "aaaa")]);
            let after = walk(vec![node("ㄚ-ㄚ-ㄚ-ㄚ", 4, "bbbb", "aaaa")]);

            let mut uom = UserOverrideModel::new(CAPACITY, HALF_LIFE);
            uom.observe(&before, &after, 0, FAKE_NOW);
            assert!(uom.suggest(&before, 0, FAKE_NOW + 1.0).is_none());
        }

        #[test]
        fn mismatched_walks_are_ignored() {
            let before = walk(vec![node("ㄚ", 1, "a", "a")]);
            let after = walk(vec![
                node("ㄚ", 1, "a", "a"),
                node("ㄅ", 1, "b", "b"),
            ]);
            let mut uom = UserOverrideModel::new(CAPACITY, HALF_LIFE);
            uom.observe(&before, &after, 0, FAKE_NOW);
            assert!(uom.suggest(&before, 0, FAKE_NOW + 1.0).is_none());
        }
    }
}
