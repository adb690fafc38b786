//! Decomposition of a candidate integer solution into simple cycles.
//!
//! In the degree-constrained formulation every node touched by a candidate has
//! exactly two selected edges, so the candidate is a disjoint union of cycles.
//! Storage is index-based (a fixed two-slot neighbor array per node) since this
//! runs on every integer incumbent the engine finds.

use thiserror::Error as ThisError;

use crate::instance::Edge;

/// A candidate that is not a clean degree-2 graph on its touched nodes.
///
/// Recoverable: the current callback invocation is abandoned, the search goes on.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum StructuralError {
    #[error("candidate solution selects no edges")]
    Empty,
    #[error("self-loop on node {node}")]
    SelfLoop { node: usize },
    #[error("node {node} outside [0, {n})")]
    NodeOutOfRange { node: usize, n: usize },
    #[error("node {node} has {degree} incident edges, expected 2")]
    Degree { node: usize, degree: usize },
    #[error("walk from node {start} stopped at node {node} without closing")]
    OpenWalk { start: usize, node: usize },
}

/// A simple cycle found inside a candidate, in walk order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subtour {
    nodes: Vec<usize>,
}

impl Subtour {
    pub fn new(nodes: Vec<usize>) -> Self {
        Subtour { nodes }
    }

    pub fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// True when the cycle covers all `n` nodes, i.e. it is a complete tour.
    pub fn is_hamiltonian(&self, n: usize) -> bool {
        self.nodes.len() == n
    }
}

const NO_NEIGHBOR: usize = usize::MAX;

/// Two-slot adjacency over `n` nodes.
struct Adjacency {
    neighbors: Vec<[usize; 2]>,
    degree: Vec<usize>,
}

impl Adjacency {
    fn build(edges: &[Edge], n: usize) -> Result<Self, StructuralError> {
        let mut neighbors = vec![[NO_NEIGHBOR; 2]; n];
        let mut degree = vec![0usize; n];

        for e in edges {
            if e.i == e.j {
                return Err(StructuralError::SelfLoop { node: e.i });
            }
            for (node, other) in [(e.i, e.j), (e.j, e.i)] {
                if node >= n {
                    return Err(StructuralError::NodeOutOfRange { node, n });
                }
                let d = degree[node];
                if d < 2 {
                    neighbors[node][d] = other;
                }
                degree[node] = d + 1;
            }
        }

        Ok(Adjacency { neighbors, degree })
    }
}

/// Finds the cycles of a candidate edge set over `n` nodes.
#[derive(Debug, Clone, Copy)]
pub struct SubtourDetector {
    n: usize,
}

impl SubtourDetector {
    pub fn new(n: usize) -> Self {
        SubtourDetector { n }
    }

    pub fn dimension(&self) -> usize {
        self.n
    }

    /// Decompose `edges` into its simple cycles, ordered by their smallest node.
    pub fn decompose(&self, edges: &[Edge]) -> Result<Vec<Subtour>, StructuralError> {
        if edges.is_empty() {
            return Err(StructuralError::Empty);
        }
        let adjacency = Adjacency::build(edges, self.n)?;

        if let Some((node, &degree)) = adjacency
            .degree
            .iter()
            .enumerate()
            .find(|&(_, &d)| d != 0 && d != 2)
        {
            return Err(StructuralError::Degree { node, degree });
        }

        let mut visited = vec![false; self.n];
        let mut cycles = Vec::new();

        for start in 0..self.n {
            if visited[start] || adjacency.degree[start] == 0 {
                continue;
            }
            cycles.push(self.walk(&adjacency, start, &mut visited)?);
        }

        Ok(cycles)
    }

    fn walk(
        &self,
        adjacency: &Adjacency,
        start: usize,
        visited: &mut [bool],
    ) -> Result<Subtour, StructuralError> {
        let mut nodes = vec![start];
        visited[start] = true;
        let mut current = adjacency.neighbors[start][0];

        loop {
            visited[current] = true;
            nodes.push(current);
            let [a, b] = adjacency.neighbors[current];
            current = if !visited[a] {
                a
            } else if !visited[b] {
                b
            } else if a == start || b == start {
                break;
            } else {
                return Err(StructuralError::OpenWalk { start, node: current });
            };
        }

        Ok(Subtour::new(nodes))
    }

    /// The shortest cycle of the candidate (fewest nodes, first found on ties).
    ///
    /// A result of length `n` means the candidate is already a complete tour.
    pub fn shortest_subtour(&self, edges: &[Edge]) -> Result<Subtour, StructuralError> {
        self.decompose(edges)?
            .into_iter()
            .min_by_key(Subtour::len)
            .ok_or(StructuralError::Empty)
    }
}
