//! The max-weight path walk over the grid.

use std::time::Instant;

use tracing::debug;

use super::{NodeId, ReadingGrid};

/// A self-contained snapshot of one walked node.
///
/// Carrying owned strings keeps a finished walk valid across later grid
/// mutation, which the user override model relies on when it compares the
/// walks before and after an override.
#[derive(Clone, Debug, PartialEq)]
pub struct WalkedNode {
    pub reading: String,
    pub spanning_length: usize,
    /// The node's current (possibly overridden) unigram value.
    pub value: String,
    /// The value of the node's top-ranked unigram.
    pub top_value: String,
}

/// The best path through the grid at the time of the walk.
#[derive(Clone, Debug, Default)]
pub struct WalkResult {
    pub nodes: Vec<WalkedNode>,
    pub total_readings: usize,
    pub vertices: usize,
    pub edges: usize,
    pub elapsed_microseconds: u64,
}

impl WalkResult {
    /// Finds the node covering the reading at `cursor` and returns its
    /// index along with the cursor position just past that node. A cursor
    /// of zero selects the first node; a cursor at or one before the end
    /// selects the last.
    pub fn find_node_at(&self, cursor: usize) -> Option<(usize, usize)> {
        if self.nodes.is_empty() || cursor > self.total_readings {
            return None;
        }

        if cursor == 0 {
            return Some((0, self.nodes[0].spanning_length));
        }

        // Covers both "cursor at the end" and "one reading before the
        // end".
        if cursor + 1 >= self.total_readings {
            return Some((self.nodes.len() - 1, self.total_readings));
        }

        let mut accumulated = 0;
        for (index, node) in self.nodes.iter().enumerate() {
            accumulated += node.spanning_length;
            if accumulated > cursor {
                return Some((index, accumulated));
            }
        }
        None
    }

    pub fn values(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.value.clone()).collect()
    }

    pub fn readings(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.reading.clone()).collect()
    }
}

// A vertex of the walk DAG. The root and terminal vertices carry no node.
struct Vertex {
    node: Option<NodeId>,
    edges: Vec<usize>,
    topologically_sorted: bool,
    // We compute the path with the *largest* weight, hence the initial
    // distance is negative infinity rather than infinity.
    distance: f64,
    prev: Option<usize>,
}

impl Vertex {
    fn new(node: Option<NodeId>) -> Vertex {
        Vertex {
            node,
            edges: Vec::new(),
            topologically_sorted: false,
            distance: f64::NEG_INFINITY,
            prev: None,
        }
    }
}

// Topological sort with an explicit stack; grids can produce chains deep
// enough to make recursion risky. Vertices come back in post-order, so
// the caller iterates the result in reverse for topological order.
fn topological_sort(vertices: &mut [Vertex], root: usize) -> Vec<usize> {
    let mut result = Vec::with_capacity(vertices.len());
    let mut stack: Vec<(usize, usize)> = vec![(root, 0)];

    while let Some(state) = stack.last_mut() {
        let (vid, edge_index) = *state;
        if edge_index < vertices[vid].edges.len() {
            state.1 += 1;
            let next = vertices[vid].edges[edge_index];
            if !vertices[next].topologically_sorted {
                stack.push((next, 0));
            }
            continue;
        }

        vertices[vid].topologically_sorted = true;
        result.push(vid);
        stack.pop();
    }

    result
}

impl ReadingGrid {
    /// Finds the path with the largest total score through the grid.
    ///
    /// This is the single-source DAG shortest-path algorithm with the
    /// comparison flipped: scores are log probabilities, so the longest
    /// path is the most likely hidden word sequence. Runs in O(V + E).
    pub fn walk(&self) -> WalkResult {
        let mut result = WalkResult::default();
        if self.spans.is_empty() {
            return result;
        }
        let start = Instant::now();

        let mut vertices: Vec<Vertex> = Vec::new();
        let mut vertex_spans: Vec<Vec<usize>> = vec![Vec::new(); self.spans.len()];
        for (i, span) in self.spans.iter().enumerate() {
            for length in 1..=span.max_length() {
                if let Some(id) = span.node_of(length) {
                    vertices.push(Vertex::new(Some(id)));
                    vertex_spans[i].push(vertices.len() - 1);
                }
            }
        }
        result.vertices = vertices.len();

        let terminal = vertices.len();
        vertices.push(Vertex::new(None));

        let mut edges = 0;
        for i in 0..vertex_spans.len() {
            for v in 0..vertex_spans[i].len() {
                let vid = vertex_spans[i][v];
                let node_id = vertices[vid].node.expect("span vertices carry nodes");
                let next_span = i + self.node(node_id).spanning_length();
                if next_span == vertex_spans.len() {
                    vertices[vid].edges.push(terminal);
                    continue;
                }
                for nv in 0..vertex_spans[next_span].len() {
                    vertices[vid].edges.push(vertex_spans[next_span][nv]);
                    edges += 1;
                }
            }
        }
        result.edges = edges;

        let root = vertices.len();
        let mut root_vertex = Vertex::new(None);
        root_vertex.distance = 0.0;
        root_vertex.edges = vertex_spans[0].clone();
        vertices.push(root_vertex);

        let ordered = topological_sort(&mut vertices, root);
        for &u in ordered.iter().rev() {
            let distance_u = vertices[u].distance;
            for e in 0..vertices[u].edges.len() {
                let v = vertices[u].edges[e];
                // The weight of the edge into v is v's own score.
                let weight = match vertices[v].node {
                    Some(id) => self.node(id).score(),
                    None => 0.0,
                };
                if vertices[v].distance < distance_u + weight {
                    vertices[v].distance = distance_u + weight;
                    vertices[v].prev = Some(u);
                }
            }
        }

        let mut walked: Vec<NodeId> = Vec::new();
        let mut total_readings = 0;
        let mut current = terminal;
        while let Some(prev) = vertices[current].prev {
            if let Some(id) = vertices[prev].node {
                walked.push(id);
                total_readings += self.node(id).spanning_length();
            }
            current = prev;
        }
        walked.reverse();
        debug_assert_eq!(total_readings, self.readings().len());

        result.total_readings = total_readings;
        result.nodes = walked
            .into_iter()
            .map(|id| {
                let node = self.node(id);
                WalkedNode {
                    reading: node.reading().to_string(),
                    spanning_length: node.spanning_length(),
                    value: node.value().to_string(),
                    top_value: node.unigrams()[0].value.clone(),
                }
            })
            .collect();
        result.elapsed_microseconds = start.elapsed().as_micros() as u64;
        debug!(
            vertices = result.vertices,
            edges = result.edges,
            elapsed_microseconds = result.elapsed_microseconds,
            "walked the grid"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    use crate::grid::{Candidate, OverrideType, ReadingGrid};
    use crate::lm::{LanguageModel, Unigram};

    fn test_lm() -> Rc<RefCell<dyn LanguageModel>> {
        let mut map: HashMap<String, Vec<Unigram>> = HashMap::new();
        let mut add = |reading: &str, entries: &[(&str, f64)]| {
            map.insert(
                reading.to_string(),
                entries
                    .iter()
                    .map(|(value, score)| Unigram::new(*value, *score))
                    .collect(),
            );
        };
        add("ㄍㄠ", &[("高", -7.17), ("糕", -12.39)]);
        add("ㄎㄜ", &[("科", -7.17), ("顆", -10.57)]);
        add("ㄐㄧˋ", &[("技", -8.45), ("記", -9.9)]);
        add("ㄍㄠ-ㄎㄜ-ㄐㄧˋ", &[("高科技", -9.84)]);
        add("ㄎㄜ-ㄐㄧˋ", &[("科技", -6.73)]);
        add("ㄍㄨㄥ", &[("工", -7.82), ("公", -7.87)]);
        add("ㄙ", &[("斯", -8.09), ("司", -9.0)]);
        add("ㄍㄨㄥ-ㄙ", &[("公司", -6.29)]);
        Rc::new(RefCell::new(map))
    }

    fn build(readings: &[&str]) -> ReadingGrid {
        let mut grid = ReadingGrid::new(test_lm());
        for reading in readings {
            assert!(grid.insert_reading(reading));
        }
        grid
    }

    #[test]
    fn empty_grid_walks_to_an_empty_result() {
        let grid = ReadingGrid::new(test_lm());
        let walk = grid.walk();
        assert!(walk.nodes.is_empty());
        assert_eq!(0, walk.total_readings);
    }

    #[test]
    fn the_walk_prefers_the_weightiest_segmentation() {
        let grid = build(&["ㄍㄠ", "ㄎㄜ", "ㄐㄧˋ", "ㄍㄨㄥ", "ㄙ"]);
        let walk = grid.walk();
        assert_eq!(vec!["高科技", "公司"], walk.values());
        assert_eq!(5, walk.total_readings);
    }

    #[test]
    fn walked_spanning_lengths_sum_to_the_reading_count() {
        let grid = build(&["ㄍㄠ", "ㄎㄜ", "ㄐㄧˋ", "ㄍㄨㄥ", "ㄙ"]);
        let walk = grid.walk();
        let total: usize = walk.nodes.iter().map(|n| n.spanning_length).sum();
        assert_eq!(grid.length(), total);
        assert_eq!(grid.length(), walk.total_readings);
    }

    #[test]
    fn overrides_steer_the_walk() {
        let mut grid = build(&["ㄍㄠ", "ㄎㄜ", "ㄐㄧˋ"]);
        assert_eq!(vec!["高科技"], grid.walk().values());

        assert!(grid.override_candidate(
            1,
            &Candidate::new("ㄎㄜ-ㄐㄧˋ", "科技"),
            OverrideType::HighScore
        ));
        let walk = grid.walk();
        assert_eq!(vec!["高", "科技"], walk.values());
    }

    #[test]
    fn walk_reports_vertex_and_edge_counts() {
        let grid = build(&["ㄍㄨㄥ", "ㄙ"]);
        let walk = grid.walk();
        // Nodes: ㄍㄨㄥ, ㄙ, ㄍㄨㄥ-ㄙ.
        assert_eq!(3, walk.vertices);
        assert!(walk.edges > 0);
    }

    #[test]
    fn find_node_at_walks_the_span_lengths() {
        let grid = build(&["ㄍㄠ", "ㄎㄜ", "ㄐㄧˋ", "ㄍㄨㄥ", "ㄙ"]);
        let walk = grid.walk();
        // Walk is [高科技 (3), 公司 (2)].
        let (index, past) = walk.find_node_at(0).unwrap();
        assert_eq!(0, index);
        assert_eq!(3, past);

        let (index, past) = walk.find_node_at(2).unwrap();
        assert_eq!(0, index);
        assert_eq!(3, past);

        let (index, past) = walk.find_node_at(3).unwrap();
        assert_eq!(1, index);
        assert_eq!(5, past);

        let (index, past) = walk.find_node_at(5).unwrap();
        assert_eq!(1, index);
        assert_eq!(5, past);

        assert!(walk.find_node_at(6).is_none());
    }

    #[test]
    fn walks_snapshot_the_grid_state() {
        let mut grid = build(&["ㄍㄨㄥ", "ㄙ"]);
        let before = grid.walk();
        assert_eq!(vec!["公司"], before.values());

        assert!(grid.delete_reading_before_cursor());
        // The old walk is untouched by the mutation.
        assert_eq!(vec!["公司"], before.values());
        assert_eq!(vec!["工"], grid.walk().values());
    }
}
