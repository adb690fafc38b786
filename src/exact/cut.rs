//! Subtour-elimination inequalities.
//!
//! For a proper subtour over node set `S` the cut is
//! `sum(x_ij for i < j, i, j in S) <= |S| - 1`, which forbids closing `S` on
//! itself and forces the engine to connect it to the rest of the graph.

use thiserror::Error as ThisError;

use crate::error::Error;
use crate::exact::subtour::Subtour;
use crate::instance::{edge_index, Edge};

/// Requests the generator refuses: each one would produce an invalid cut.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum CutError {
    #[error("subtour covers all {n} nodes; cutting it would remove a complete tour")]
    CoversAllNodes { n: usize },
    #[error("subtour of {size} nodes is too small to cut")]
    TooSmall { size: usize },
    #[error("subtour node {node} outside [0, {n})")]
    NodeOutOfRange { node: usize, n: usize },
    #[error("subtour repeats node {node}")]
    RepeatedNode { node: usize },
}

impl From<CutError> for Error {
    fn from(err: CutError) -> Self {
        Error::Fatal(err.to_string())
    }
}

/// One subtour-elimination constraint, ready to be handed to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct LazyCut {
    edges: Vec<Edge>,
    indices: Vec<usize>,
    rhs: f64,
}

impl LazyCut {
    /// Edges with a non-zero coefficient, in variable-index order
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Variable indices of [`LazyCut::edges`]
    pub fn var_indices(&self) -> &[usize] {
        &self.indices
    }

    /// Coefficient shared by every term
    pub fn coefficient(&self) -> f64 {
        1.0
    }

    pub fn rhs(&self) -> f64 {
        self.rhs
    }

    /// Number of terms
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Left-hand side evaluated at a full assignment
    pub fn lhs(&self, assignment: &[f64]) -> f64 {
        self.indices
            .iter()
            .map(|&k| self.coefficient() * assignment.get(k).copied().unwrap_or(0.0))
            .sum()
    }

    pub fn is_violated_by(&self, assignment: &[f64]) -> bool {
        self.lhs(assignment) > self.rhs + 1e-6
    }
}

impl std::fmt::Display for LazyCut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (k, e) in self.edges.iter().enumerate() {
            if k > 0 {
                write!(f, " + ")?;
            }
            write!(f, "x_{}_{}", e.i, e.j)?;
        }
        write!(f, " <= {}", self.rhs)
    }
}

/// Builds subtour-elimination cuts for an instance of `n` nodes.
#[derive(Debug, Clone, Copy)]
pub struct LazyCutGenerator {
    n: usize,
}

impl LazyCutGenerator {
    pub fn new(n: usize) -> Self {
        LazyCutGenerator { n }
    }

    /// Cut for a proper subtour with `2 <= k < n` nodes: `k(k-1)/2` terms, rhs `k - 1`.
    pub fn generate(&self, subtour: &Subtour) -> Result<LazyCut, CutError> {
        let k = subtour.len();
        if k >= self.n {
            return Err(CutError::CoversAllNodes { n: self.n });
        }
        if k < 2 {
            return Err(CutError::TooSmall { size: k });
        }

        let mut nodes = subtour.nodes().to_vec();
        nodes.sort_unstable();
        if let Some(&node) = nodes.iter().find(|&&v| v >= self.n) {
            return Err(CutError::NodeOutOfRange { node, n: self.n });
        }
        if let Some(pair) = nodes.windows(2).find(|w| w[0] == w[1]) {
            return Err(CutError::RepeatedNode { node: pair[0] });
        }

        let terms = k * (k - 1) / 2;
        let mut edges = Vec::with_capacity(terms);
        let mut indices = Vec::with_capacity(terms);
        for (a, &i) in nodes.iter().enumerate() {
            for &j in &nodes[a + 1..] {
                edges.push(Edge { i, j });
                indices.push(edge_index(self.n, i, j));
            }
        }

        Ok(LazyCut {
            edges,
            indices,
            rhs: (k - 1) as f64,
        })
    }
}
