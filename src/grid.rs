//! The reading grid.
//!
//! A grid derives the most likely hidden values from a series of
//! observations. Here the observations are Bopomofo readings and the
//! hidden values are Mandarin words; with swapped data the same machinery
//! segments a run of characters into words. The model sounds like an HMM
//! but the underlying language model has only unigrams, so a plain
//! max-weight DAG walk over the lattice of candidate nodes yields the
//! maximum likelihood estimate.

use std::cell::RefCell;
use std::rc::Rc;

use crate::lm::{LanguageModel, Unigram};

pub use walk::{WalkResult, WalkedNode};

mod walk;

/// The longest phrase the grid will look up, in readings.
pub const MAX_SPAN_LENGTH: usize = 6;

/// The default reading separator used to join compound readings.
pub const DEFAULT_SEPARATOR: &str = "-";

/// A score high enough to make the walk go through an overridden node.
///
/// Zero would do, but a positive value also dampens the competition from
/// free-floating multi-character phrases next to the overridden span,
/// which otherwise can pull the best path away from neighboring
/// single-character nodes.
pub const OVERRIDING_SCORE: f64 = 42.0;

/// How a node's selected unigram participates in scoring.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OverrideType {
    #[default]
    None,
    /// Carry [`OVERRIDING_SCORE`] so the walk almost always keeps the
    /// node.
    HighScore,
    /// Carry the score of the node's top unigram. A soft override: the
    /// node will very likely prevail, but a stronger competing node still
    /// can win, which is what a background suggestion wants.
    TopUnigramScore,
}

/// A candidate word occupying a span of readings.
///
/// The grid joins consecutive readings with the separator, asks the
/// language model for that compound reading, and keeps the returned
/// unigrams here. A node spanning two readings has spanning length 2.
#[derive(Clone, Debug)]
pub struct Node {
    reading: String,
    spanning_length: usize,
    unigrams: Vec<Unigram>,
    selected_index: usize,
    override_type: OverrideType,
}

impl Node {
    fn new(reading: String, spanning_length: usize, unigrams: Vec<Unigram>) -> Node {
        debug_assert!(!unigrams.is_empty());
        Node {
            reading,
            spanning_length,
            unigrams,
            selected_index: 0,
            override_type: OverrideType::None,
        }
    }

    pub fn reading(&self) -> &str {
        &self.reading
    }

    pub fn spanning_length(&self) -> usize {
        self.spanning_length
    }

    pub fn unigrams(&self) -> &[Unigram] {
        &self.unigrams
    }

    /// The selected (possibly overridden) unigram.
    pub fn current_unigram(&self) -> &Unigram {
        &self.unigrams[self.selected_index]
    }

    pub fn value(&self) -> &str {
        &self.current_unigram().value
    }

    pub fn score(&self) -> f64 {
        match self.override_type {
            OverrideType::HighScore => OVERRIDING_SCORE,
            OverrideType::TopUnigramScore => self.unigrams[0].score,
            OverrideType::None => self.unigrams[self.selected_index].score,
        }
    }

    pub fn is_overridden(&self) -> bool {
        self.override_type != OverrideType::None
    }

    fn reset(&mut self) {
        self.selected_index = 0;
        self.override_type = OverrideType::None;
    }

    fn select_override_unigram(&mut self, value: &str, override_type: OverrideType) -> bool {
        debug_assert!(override_type != OverrideType::None);
        for (index, unigram) in self.unigrams.iter().enumerate() {
            if unigram.value == value {
                self.selected_index = index;
                self.override_type = override_type;
                return true;
            }
        }
        false
    }
}

type NodeId = usize;

/// The nodes sharing one starting location, indexed by spanning length.
#[derive(Clone, Debug, Default)]
struct Span {
    nodes: [Option<NodeId>; MAX_SPAN_LENGTH],
    max_length: usize,
}

impl Span {
    /// Slots the node in by length, returning a replaced node id.
    fn add(&mut self, length: usize, id: NodeId) -> Option<NodeId> {
        debug_assert!(length >= 1 && length <= MAX_SPAN_LENGTH);
        let previous = self.nodes[length - 1].replace(id);
        if length > self.max_length {
            self.max_length = length;
        }
        previous
    }

    fn node_of(&self, length: usize) -> Option<NodeId> {
        debug_assert!(length >= 1 && length <= MAX_SPAN_LENGTH);
        self.nodes[length - 1]
    }

    fn max_length(&self) -> usize {
        self.max_length
    }

    /// Drops every node of the given length or longer and returns their
    /// ids. `max_length` is recomputed from what remains.
    fn remove_nodes_of_or_longer_than(&mut self, length: usize) -> Vec<NodeId> {
        debug_assert!(length >= 1 && length <= MAX_SPAN_LENGTH);
        let mut removed = Vec::new();
        for slot in &mut self.nodes[length - 1..] {
            if let Some(id) = slot.take() {
                removed.push(id);
            }
        }

        self.max_length = 0;
        for len in (1..length).rev() {
            if self.nodes[len - 1].is_some() {
                self.max_length = len;
                break;
            }
        }
        removed
    }

    fn drain(&mut self) -> Vec<NodeId> {
        self.remove_nodes_of_or_longer_than(1)
    }
}

/// A candidate at a grid location: the node's compound reading and one of
/// its unigram values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub reading: String,
    pub value: String,
}

impl Candidate {
    pub fn new(reading: impl Into<String>, value: impl Into<String>) -> Candidate {
        Candidate {
            reading: reading.into(),
            value: value.into(),
        }
    }
}

/// The lattice of readings, spans and candidate nodes.
///
/// Nodes live in a slot arena owned by the grid; spans and query results
/// refer to them by index. Walks return self-contained snapshots, so a
/// finished [`WalkResult`] stays valid across later mutations.
pub struct ReadingGrid {
    lm: Rc<RefCell<dyn LanguageModel>>,
    cursor: usize,
    separator: String,
    readings: Vec<String>,
    spans: Vec<Span>,
    nodes: Vec<Option<Node>>,
    free_ids: Vec<NodeId>,
}

impl ReadingGrid {
    pub fn new(lm: Rc<RefCell<dyn LanguageModel>>) -> ReadingGrid {
        ReadingGrid {
            lm,
            cursor: 0,
            separator: DEFAULT_SEPARATOR.to_string(),
            readings: Vec::new(),
            spans: Vec::new(),
            nodes: Vec::new(),
            free_ids: Vec::new(),
        }
    }

    pub fn clear(&mut self) {
        self.cursor = 0;
        self.readings.clear();
        self.spans.clear();
        self.nodes.clear();
        self.free_ids.clear();
    }

    pub fn length(&self) -> usize {
        self.readings.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn set_cursor(&mut self, cursor: usize) {
        assert!(cursor <= self.readings.len());
        self.cursor = cursor;
    }

    pub fn reading_separator(&self) -> &str {
        &self.separator
    }

    /// The separator may be empty, which joins readings by plain
    /// concatenation; the word-segmentation use swaps values in as
    /// readings and relies on this.
    pub fn set_reading_separator(&mut self, separator: impl Into<String>) {
        self.separator = separator.into();
    }

    pub fn readings(&self) -> &[String] {
        &self.readings
    }

    /// Inserts a reading at the cursor and advances the cursor past it.
    /// Returns false, leaving the grid unchanged, when the reading is
    /// empty, equals the separator, or is unknown to the language model.
    pub fn insert_reading(&mut self, reading: &str) -> bool {
        if reading.is_empty() || reading == self.separator {
            return false;
        }
        if !self.lm.borrow().has_unigrams(reading) {
            return false;
        }

        self.readings.insert(self.cursor, reading.to_string());
        self.expand_grid_at(self.cursor);
        self.update();

        // The cursor must only move after the update.
        self.cursor += 1;
        true
    }

    /// Deletes the reading before the cursor, like Backspace. The cursor
    /// moves back by one.
    pub fn delete_reading_before_cursor(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }

        self.readings.remove(self.cursor - 1);
        // The cursor must move first for the shrink and update to work.
        self.cursor -= 1;
        self.shrink_grid_at(self.cursor);
        self.update();
        true
    }

    /// Deletes the reading after the cursor, like Del. The cursor stays.
    pub fn delete_reading_after_cursor(&mut self) -> bool {
        if self.cursor == self.readings.len() {
            return false;
        }

        self.readings.remove(self.cursor);
        self.shrink_grid_at(self.cursor);
        self.update();
        true
    }

    /// Returns all candidates overlapping the location, the nodes ordered
    /// by descending spanning length. When `loc` sits at the end of the
    /// grid, `loc - 1` is used, so callers need not care about that
    /// boundary.
    pub fn candidates_at(&self, loc: usize) -> Vec<Candidate> {
        if self.readings.is_empty() || loc > self.readings.len() {
            return Vec::new();
        }

        let mut nodes =
            self.overlapping_nodes_at(if loc == self.readings.len() { loc - 1 } else { loc });
        nodes.sort_by(|a, b| {
            self.node(b.0)
                .spanning_length
                .cmp(&self.node(a.0).spanning_length)
        });

        let mut result = Vec::new();
        for (id, _) in nodes {
            let node = self.node(id);
            for unigram in &node.unigrams {
                result.push(Candidate::new(node.reading.clone(), unigram.value.clone()));
            }
        }
        result
    }

    /// Applies a user override at the location: the first overlapping
    /// node holding a unigram with the candidate's reading and value gets
    /// selected, and every other node sharing its span positions is reset
    /// so stale overrides cannot survive. Returns false, leaving the grid
    /// unchanged, when nothing matches.
    pub fn override_candidate(
        &mut self,
        loc: usize,
        candidate: &Candidate,
        override_type: OverrideType,
    ) -> bool {
        self.override_candidate_impl(loc, Some(&candidate.reading), &candidate.value, override_type)
    }

    /// Same, but matches on the value alone. When several nodes of
    /// different lengths carry the value, which one gets selected is
    /// unspecified.
    pub fn override_candidate_value(
        &mut self,
        loc: usize,
        value: &str,
        override_type: OverrideType,
    ) -> bool {
        self.override_candidate_impl(loc, None, value, override_type)
    }

    fn override_candidate_impl(
        &mut self,
        loc: usize,
        reading: Option<&str>,
        value: &str,
        override_type: OverrideType,
    ) -> bool {
        if self.readings.is_empty() || loc > self.readings.len() {
            return false;
        }

        let overlapping =
            self.overlapping_nodes_at(if loc == self.readings.len() { loc - 1 } else { loc });

        let mut overridden: Option<(NodeId, usize)> = None;
        for (id, span_index) in overlapping {
            if let Some(reading) = reading {
                if self.node(id).reading != reading {
                    continue;
                }
            }
            if self.node_mut(id).select_override_unigram(value, override_type) {
                overridden = Some((id, span_index));
                break;
            }
        }

        let Some((overridden_id, span_index)) = overridden else {
            return false;
        };

        let end = (span_index + self.node(overridden_id).spanning_length).min(self.spans.len());
        for i in span_index..end {
            // Every node overlapping the overridden span positions gets
            // reset, including ones that merely share a location with the
            // chosen node, so an older override cannot linger next to the
            // new one.
            let nodes = self.overlapping_nodes_at(i);
            for (id, _) in nodes {
                if id != overridden_id {
                    self.node_mut(id).reset();
                }
            }
        }
        true
    }

    // -- Arena plumbing -----------------------------------------------

    fn node(&self, id: NodeId) -> &Node {
        self.nodes[id].as_ref().expect("span holds a live node")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes[id].as_mut().expect("span holds a live node")
    }

    fn alloc_node(&mut self, node: Node) -> NodeId {
        match self.free_ids.pop() {
            Some(id) => {
                self.nodes[id] = Some(node);
                id
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        }
    }

    fn release_nodes(&mut self, ids: Vec<NodeId>) {
        for id in ids {
            self.nodes[id] = None;
            self.free_ids.push(id);
        }
    }

    // -- Grid maintenance ---------------------------------------------

    fn expand_grid_at(&mut self, loc: usize) {
        let at_edge = loc == 0 || loc == self.spans.len();
        self.spans.insert(loc, Span::default());
        if !at_edge {
            self.remove_affected_nodes(loc);
        }
    }

    fn shrink_grid_at(&mut self, loc: usize) {
        if loc == self.spans.len() {
            return;
        }
        let mut span = self.spans.remove(loc);
        let removed = span.drain();
        self.release_nodes(removed);
        self.remove_affected_nodes(loc);
    }

    /// After a span is inserted at or removed from `loc`, the nodes in
    /// earlier spans that used to cross `loc` are broken and must go:
    ///
    /// ```text
    /// Span index 0   1   2   3
    ///                (---)
    ///                (-------)
    ///            (-----------)
    /// ```
    ///
    /// becomes, after inserting a span at 2:
    ///
    /// ```text
    /// Span index 0   1   2   3   4
    ///                (---)
    ///                (----   ----)
    ///            (--------   ----)
    /// ```
    fn remove_affected_nodes(&mut self, loc: usize) {
        if self.spans.is_empty() {
            return;
        }

        let affected_length = MAX_SPAN_LENGTH - 1;
        let begin = loc.saturating_sub(affected_length);
        let end = loc.saturating_sub(1);
        for i in begin..=end {
            let removed = self.spans[i].remove_nodes_of_or_longer_than(loc - i + 1);
            self.release_nodes(removed);
        }
    }

    fn combine_reading(&self, range: std::ops::Range<usize>) -> String {
        self.readings[range].join(self.separator.as_str())
    }

    fn has_node_at(&self, loc: usize, length: usize, reading: &str) -> bool {
        if loc >= self.spans.len() {
            return false;
        }
        match self.spans[loc].node_of(length) {
            Some(id) => self.node(id).reading == reading,
            None => false,
        }
    }

    /// Recomputes the nodes in the window of spans the cursor position
    /// can affect: every start position within a maximum span length of
    /// the cursor, every length that fits.
    fn update(&mut self) {
        let begin = self.cursor.saturating_sub(MAX_SPAN_LENGTH);
        let end = (self.cursor + MAX_SPAN_LENGTH).min(self.readings.len());

        for pos in begin..end {
            for len in 1..=MAX_SPAN_LENGTH {
                if pos + len > end {
                    break;
                }
                let combined = self.combine_reading(pos..pos + len);
                if self.has_node_at(pos, len, &combined) {
                    continue;
                }
                let unigrams = self.ranked_unigrams(&combined);
                if unigrams.is_empty() {
                    continue;
                }
                let id = self.alloc_node(Node::new(combined, len, unigrams));
                if let Some(replaced) = self.spans[pos].add(len, id) {
                    self.release_nodes(vec![replaced]);
                }
            }
        }
    }

    /// The language model's unigrams, stable-sorted by descending score.
    fn ranked_unigrams(&self, reading: &str) -> Vec<Unigram> {
        let mut unigrams = self.lm.borrow().unigrams(reading);
        unigrams.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        unigrams
    }

    /// All nodes that overlap the location, each with its span index.
    fn overlapping_nodes_at(&self, loc: usize) -> Vec<(NodeId, usize)> {
        let mut results = Vec::new();
        if self.spans.is_empty() || loc >= self.spans.len() {
            return results;
        }

        for len in 1..=self.spans[loc].max_length() {
            if let Some(id) = self.spans[loc].node_of(len) {
                results.push((id, loc));
            }
        }

        let begin = loc - loc.min(MAX_SPAN_LENGTH - 1);
        for i in begin..loc {
            let begin_len = loc - i + 1;
            let end_len = self.spans[i].max_length();
            for len in begin_len..=end_len {
                if let Some(id) = self.spans[i].node_of(len) {
                    results.push((id, i));
                }
            }
        }

        results
    }
}
