//! Post-hoc feasibility check for the edge set an engine reports as its answer.
//!
//! The check is independent of the subtour detector: it re-derives degrees and
//! successor links from scratch so that a bug in the callback path cannot make
//! an invalid tour look valid.

use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

use crate::instance::Edge;

/// The specific condition an edge set violates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum Violation {
    #[error("edge set is empty")]
    Empty,
    #[error("node {node} outside [0, {n})")]
    NodeOutOfRange { node: usize, n: usize },
    #[error("node {node} has combined in/out degree {degree}, expected 2")]
    Degree { node: usize, degree: usize },
    #[error("node {node} has more than one successor")]
    MultipleSuccessors { node: usize },
    /// The successor walk closed back on its start before visiting every node.
    ///
    /// Once degrees and successors are consistent, the arcs form disjoint
    /// cycles, so a premature closure and a disconnected component are the
    /// same condition.
    #[error("cycle through the start node closes after {visited} of {expected} nodes")]
    Disconnected { visited: usize, expected: usize },
}

/// Feasibility verdict, with the violated condition on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feasibility {
    pub feasible: bool,
    pub violation: Option<Violation>,
}

impl Feasibility {
    pub fn ok() -> Self {
        Feasibility { feasible: true, violation: None }
    }

    pub fn violated(violation: Violation) -> Self {
        Feasibility { feasible: false, violation: Some(violation) }
    }

    pub fn into_result(self) -> Result<(), Violation> {
        match self.violation {
            Some(v) => Err(v),
            None => Ok(()),
        }
    }
}

impl From<Result<(), Violation>> for Feasibility {
    fn from(result: Result<(), Violation>) -> Self {
        match result {
            Ok(()) => Feasibility::ok(),
            Err(v) => Feasibility::violated(v),
        }
    }
}

impl std::fmt::Display for Feasibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.violation {
            None => write!(f, "feasible"),
            Some(v) => write!(f, "infeasible: {}", v),
        }
    }
}

/// Validate directed arcs `(from, to)` as a single Hamiltonian cycle over `n` nodes.
pub fn validate_arcs(arcs: &[(usize, usize)], n: usize) -> Feasibility {
    check_arcs(arcs, n).into()
}

fn check_arcs(arcs: &[(usize, usize)], n: usize) -> Result<(), Violation> {
    if arcs.is_empty() || n == 0 {
        return Err(Violation::Empty);
    }

    let mut out_deg = vec![0usize; n];
    let mut in_deg = vec![0usize; n];
    let mut successor: Vec<Option<usize>> = vec![None; n];

    for &(from, to) in arcs {
        for node in [from, to] {
            if node >= n {
                return Err(Violation::NodeOutOfRange { node, n });
            }
        }
        if successor[from].is_some() {
            return Err(Violation::MultipleSuccessors { node: from });
        }
        successor[from] = Some(to);
        out_deg[from] += 1;
        in_deg[to] += 1;
    }

    // Every node must be touched: an untouched node has degree 0.
    for node in 0..n {
        let degree = out_deg[node] + in_deg[node];
        if degree != 2 {
            return Err(Violation::Degree { node, degree });
        }
    }

    // Every node now has exactly one successor and one predecessor.
    let start = arcs[0].0;
    let mut current = start;
    let mut visited = 0;
    while let Some(next) = successor[current] {
        visited += 1;
        current = next;
        if current == start || visited > n {
            break;
        }
    }

    if current != start || visited != n {
        return Err(Violation::Disconnected { visited, expected: n });
    }
    Ok(())
}

/// Validate an undirected edge set as a single Hamiltonian cycle over `n` nodes.
pub fn validate_edges(edges: &[Edge], n: usize) -> Feasibility {
    check_edges(edges, n).into()
}

fn check_edges(edges: &[Edge], n: usize) -> Result<(), Violation> {
    if edges.is_empty() || n == 0 {
        return Err(Violation::Empty);
    }
    let mut degree = vec![0usize; n];
    for e in edges {
        for node in [e.i, e.j] {
            if node >= n {
                return Err(Violation::NodeOutOfRange { node, n });
            }
            degree[node] += 1;
        }
    }
    if let Some((node, &d)) = degree.iter().enumerate().find(|&(_, &d)| d != 2) {
        return Err(Violation::Degree { node, degree: d });
    }
    check_arcs(&orient(edges, n), n)
}

/// Orient an undirected edge set along its cycles.
///
/// Each component is walked from its smallest node. Nodes with a degree other
/// than 2 end their walk early, so the result only describes a valid tour when
/// every degree is 2. Node ids must be below `n`.
pub fn orient(edges: &[Edge], n: usize) -> Vec<(usize, usize)> {
    // (neighbor, edge slot) pairs per node
    let mut adjacency: Vec<Vec<(usize, usize)>> = vec![Vec::new(); n];
    for (slot, e) in edges.iter().enumerate() {
        if e.i < n && e.j < n {
            adjacency[e.i].push((e.j, slot));
            adjacency[e.j].push((e.i, slot));
        }
    }

    let mut arcs = Vec::with_capacity(edges.len());
    let mut used = vec![false; edges.len()];
    let mut visited = vec![false; n];

    for start in 0..n {
        if visited[start] || adjacency[start].is_empty() {
            continue;
        }
        visited[start] = true;
        let mut current = start;
        while let Some(&(next, slot)) = adjacency[current].iter().find(|(_, slot)| !used[*slot]) {
            used[slot] = true;
            arcs.push((current, next));
            if next == start || visited[next] {
                break;
            }
            visited[next] = true;
            current = next;
        }
    }

    arcs
}
