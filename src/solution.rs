//! Tour representation for the symmetric TSP.
//!
//! A tour is kept both as a node sequence (for reporting) and as its list of
//! canonical edges (the form the MIP engine works with).

use serde::{Deserialize, Serialize};

use crate::feasibility::{self, Feasibility, Violation};
use crate::instance::{Edge, ProblemModel};

/// A Hamiltonian cycle over every node of an instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tour {
    /// Nodes in visiting order, starting at the first node; the closing edge is implicit
    pub sequence: Vec<usize>,
    /// Canonical edges in visiting order, including the closing edge
    pub edges: Vec<Edge>,
    /// Total tour length
    pub length: f64,
    /// Algorithm that generated this tour
    pub algorithm: String,
    /// Computation time in seconds
    pub computation_time: f64,
}

impl Tour {
    /// Create a tour from a node sequence; the closing edge back to the first node is added.
    pub fn from_sequence(model: &ProblemModel, sequence: Vec<usize>, algorithm: &str) -> Self {
        let edges: Vec<Edge> = match sequence.len() {
            0 => Vec::new(),
            len => (0..len)
                .map(|k| Edge::new(sequence[k], sequence[(k + 1) % len]))
                .collect(),
        };
        let length = model.edges_weight(&edges);

        Tour {
            sequence,
            edges,
            length,
            algorithm: algorithm.to_string(),
            computation_time: 0.0,
        }
    }

    /// Rebuild a tour from an unordered edge set, as reported by an engine.
    pub fn from_edges(
        model: &ProblemModel,
        edges: &[Edge],
        algorithm: &str,
    ) -> Result<Self, Violation> {
        let n = model.dimension();
        feasibility::validate_edges(edges, n).into_result()?;
        let sequence: Vec<usize> = feasibility::orient(edges, n)
            .into_iter()
            .map(|(from, _)| from)
            .collect();
        Ok(Self::from_sequence(model, sequence, algorithm))
    }

    /// Number of edges in the tour
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn contains_edge(&self, edge: &Edge) -> bool {
        self.edges.contains(edge)
    }

    /// 0/1 value per edge variable, in the model's variable-index order.
    pub fn assignment(&self, model: &ProblemModel) -> Vec<f64> {
        let mut values = vec![0.0; model.num_edges()];
        for e in &self.edges {
            values[model.edge_index(e.i, e.j)] = 1.0;
        }
        values
    }

    /// Run the feasibility validator on this tour's edges
    pub fn validate(&self, n: usize) -> Feasibility {
        feasibility::validate_edges(&self.edges, n)
    }

    /// Get the successor of a node in the tour
    pub fn successor(&self, node: usize) -> Option<usize> {
        let pos = self.sequence.iter().position(|&v| v == node)?;
        Some(self.sequence[(pos + 1) % self.sequence.len()])
    }
}

impl std::fmt::Display for Tour {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Tour ({})", self.algorithm)?;
        writeln!(f, "  Length: {:.2}", self.length)?;
        writeln!(f, "  Edges: {}", self.edges.len())?;
        writeln!(f, "  Time: {:.4}s", self.computation_time)?;
        writeln!(f, "  Sequence: {:?}", self.sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> ProblemModel {
        ProblemModel::new(
            "square",
            4,
            &[(1, 0.0, 0.0), (2, 0.0, 10.0), (3, 10.0, 10.0), (4, 10.0, 0.0)],
        )
        .unwrap()
    }

    #[test]
    fn test_from_sequence() {
        let model = square();
        let tour = Tour::from_sequence(&model, vec![0, 1, 2, 3], "manual");
        assert_eq!(tour.len(), 4);
        assert_eq!(tour.length, 40.0);
        assert!(tour.contains_edge(&Edge::new(3, 0)));
        assert_eq!(tour.successor(3), Some(0));
        assert!(tour.validate(4).feasible);
    }

    #[test]
    fn test_from_edges_reorders() {
        let model = square();
        let edges = vec![Edge::new(2, 3), Edge::new(0, 3), Edge::new(1, 2), Edge::new(0, 1)];
        let tour = Tour::from_edges(&model, &edges, "engine").unwrap();
        assert_eq!(tour.sequence, vec![0, 3, 2, 1]);
        assert_eq!(tour.length, 40.0);
    }

    #[test]
    fn test_from_edges_rejects_subtours() {
        let model = ProblemModel::random(6, 1, 100.0).unwrap();
        let edges = vec![
            Edge::new(0, 1),
            Edge::new(1, 2),
            Edge::new(0, 2),
            Edge::new(3, 4),
            Edge::new(4, 5),
            Edge::new(3, 5),
        ];
        assert!(Tour::from_edges(&model, &edges, "engine").is_err());
    }

    #[test]
    fn test_assignment() {
        let model = square();
        let tour = Tour::from_sequence(&model, vec![0, 2, 1, 3], "manual");
        let values = tour.assignment(&model);
        assert_eq!(values.len(), 6);
        assert_eq!(values.iter().sum::<f64>(), 4.0);
        assert_eq!(values[model.edge_index(0, 2)], 1.0);
        assert_eq!(values[model.edge_index(0, 1)], 0.0);
    }
}
