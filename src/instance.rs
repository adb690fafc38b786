//! Module for parsing and representing symmetric TSP instances.
//!
//! This module handles the TSP-LIB `NODE_COORD_SECTION` format and builds the
//! rounded Euclidean distance matrix together with the canonical edge universe
//! that becomes the variable domain of the MIP engine.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Represents a node of the instance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Node identifier (1-indexed in files, 0-indexed internally)
    pub id: usize,
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
}

impl Node {
    pub fn new(id: usize, x: f64, y: f64) -> Self {
        Node { id, x, y }
    }
}

/// Unordered pair of distinct nodes, always stored with the smaller id first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub i: usize,
    pub j: usize,
}

impl Edge {
    /// Build the canonical edge for `{a, b}`.
    ///
    /// `a == b` is allowed here so that malformed candidates can still be
    /// represented and rejected by the detector instead of panicking.
    #[inline]
    pub fn new(a: usize, b: usize) -> Self {
        if a <= b {
            Edge { i: a, j: b }
        } else {
            Edge { i: b, j: a }
        }
    }

    #[inline]
    pub fn contains(&self, node: usize) -> bool {
        self.i == node || self.j == node
    }

    /// The endpoint opposite to `node`, if `node` is an endpoint.
    #[inline]
    pub fn other(&self, node: usize) -> Option<usize> {
        if self.i == node {
            Some(self.j)
        } else if self.j == node {
            Some(self.i)
        } else {
            None
        }
    }
}

impl From<(usize, usize)> for Edge {
    fn from((a, b): (usize, usize)) -> Self {
        Edge::new(a, b)
    }
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.i, self.j)
    }
}

/// Number of canonical edges over `n` nodes.
#[inline]
pub fn edge_count(n: usize) -> usize {
    n * n.saturating_sub(1) / 2
}

/// Dense variable index of the canonical edge `(i, j)`, `i < j < n`, in
/// row-major upper-triangle order.
#[inline]
pub fn edge_index(n: usize, i: usize, j: usize) -> usize {
    debug_assert!(i < j && j < n);
    i * (2 * n - i - 1) / 2 + (j - i - 1)
}

/// A complete symmetric TSP instance with its distance matrix.
#[derive(Debug, Clone, Serialize)]
pub struct ProblemModel {
    /// Name of the instance
    pub name: String,
    /// Comment/description
    pub comment: String,
    /// Number of nodes
    pub dimension: usize,
    /// Nodes indexed by their internal id
    pub nodes: Vec<Node>,
    /// Row-major `dimension x dimension` rounded Euclidean distances
    #[serde(skip)]
    distances: Vec<f64>,
}

impl ProblemModel {
    /// Build a model from 1-indexed `(nodeId, x, y)` triples.
    pub fn new(
        name: impl Into<String>,
        dimension: usize,
        coords: &[(usize, f64, f64)],
    ) -> Result<Self> {
        if dimension < 3 {
            return Err(Error::malformed(format!(
                "dimension must be at least 3, got {}",
                dimension
            )));
        }
        if coords.len() != dimension {
            return Err(Error::malformed(format!(
                "declared dimension {} but found {} coordinates",
                dimension,
                coords.len()
            )));
        }

        let mut slots: Vec<Option<Node>> = vec![None; dimension];
        for &(id, x, y) in coords {
            if id == 0 || id > dimension {
                return Err(Error::malformed(format!(
                    "node id {} outside [1, {}]",
                    id, dimension
                )));
            }
            if !x.is_finite() || !y.is_finite() {
                return Err(Error::malformed(format!(
                    "node {} has a non-finite coordinate",
                    id
                )));
            }
            let slot = &mut slots[id - 1];
            if slot.is_some() {
                return Err(Error::malformed(format!("duplicate node id {}", id)));
            }
            *slot = Some(Node::new(id - 1, x, y));
        }
        // Every slot is filled: ids are in range, unique and exactly `dimension` in number.
        let nodes: Vec<Node> = slots.into_iter().flatten().collect();

        let distances = Self::compute_distance_matrix(&nodes);

        Ok(ProblemModel {
            name: name.into(),
            comment: String::new(),
            dimension,
            nodes,
            distances,
        })
    }

    /// Parse an instance from a TSP-LIB format file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        let fallback_name = path
            .as_ref()
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let mut model = Self::from_reader(BufReader::new(file))?;
        if model.name.is_empty() {
            model.name = fallback_name;
        }
        Ok(model)
    }

    /// Parse an instance from any buffered TSP-LIB source
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut name = String::new();
        let mut comment = String::new();
        let mut dimension: Option<usize> = None;
        let mut coords: Vec<(usize, f64, f64)> = Vec::new();
        let mut in_coords = false;

        for line in reader.lines() {
            let line = line?;
            let line = line.trim();

            if line.is_empty() {
                continue;
            }
            if line == "EOF" {
                break;
            }

            if line.starts_with("NODE_COORD_SECTION") {
                in_coords = true;
                continue;
            }

            if in_coords {
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.len() < 3 {
                    return Err(Error::malformed(format!("invalid coordinate line '{}'", line)));
                }
                let id: usize = parts[0]
                    .parse()
                    .map_err(|_| Error::malformed(format!("invalid node id '{}'", parts[0])))?;
                let x: f64 = parts[1]
                    .parse()
                    .map_err(|_| Error::malformed(format!("invalid x coordinate '{}'", parts[1])))?;
                let y: f64 = parts[2]
                    .parse()
                    .map_err(|_| Error::malformed(format!("invalid y coordinate '{}'", parts[2])))?;
                coords.push((id, x, y));
                continue;
            }

            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "NAME" => name = value.to_string(),
                "COMMENT" => comment = value.to_string(),
                "DIMENSION" => {
                    dimension = Some(
                        value
                            .parse()
                            .map_err(|_| {
                                Error::malformed(format!("invalid dimension '{}'", value))
                            })?,
                    );
                }
                "EDGE_WEIGHT_TYPE" => {
                    if value != "EUC_2D" {
                        log::warn!(
                            "edge weight type {} treated as rounded Euclidean (EUC_2D)",
                            value
                        );
                    }
                }
                _ => {}
            }
        }

        let dimension = dimension.ok_or_else(|| Error::malformed("missing DIMENSION header"))?;
        let mut model = Self::new(name, dimension, &coords)?;
        model.comment = comment;
        Ok(model)
    }

    /// Reproducible instance with `n` nodes drawn uniformly in `[0, extent)²`.
    pub fn random(n: usize, seed: u64, extent: f64) -> Result<Self> {
        if !(extent.is_finite() && extent > 0.0) {
            return Err(Error::malformed(format!(
                "coordinate extent must be positive and finite, got {}",
                extent
            )));
        }
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let coords: Vec<(usize, f64, f64)> = (1..=n)
            .map(|id| (id, rng.gen_range(0.0..extent), rng.gen_range(0.0..extent)))
            .collect();
        Self::new(format!("random{}-{}", n, seed), n, &coords)
    }

    /// Compute the rounded Euclidean distance matrix
    fn compute_distance_matrix(nodes: &[Node]) -> Vec<f64> {
        let n = nodes.len();
        let mut matrix = vec![0.0; n * n];

        matrix.par_chunks_mut(n).enumerate().for_each(|(i, row)| {
            for (j, cell) in row.iter_mut().enumerate() {
                if i != j {
                    let dx = nodes[i].x - nodes[j].x;
                    let dy = nodes[i].y - nodes[j].y;
                    *cell = (dx * dx + dy * dy).sqrt().round();
                }
            }
        });

        matrix
    }

    /// Get the distance between two nodes
    #[inline]
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        self.distances[i * self.dimension + j]
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Size of the edge universe, `n(n-1)/2`.
    #[inline]
    pub fn num_edges(&self) -> usize {
        edge_count(self.dimension)
    }

    #[inline]
    pub fn edge_weight(&self, edge: &Edge) -> f64 {
        self.distance(edge.i, edge.j)
    }

    /// Variable index of the canonical edge `{a, b}`.
    #[inline]
    pub fn edge_index(&self, a: usize, b: usize) -> usize {
        let e = Edge::new(a, b);
        edge_index(self.dimension, e.i, e.j)
    }

    /// Inverse of [`ProblemModel::edge_index`].
    pub fn edge_at(&self, index: usize) -> Option<Edge> {
        let n = self.dimension;
        let mut offset = 0;
        for i in 0..n.saturating_sub(1) {
            let row = n - i - 1;
            if index < offset + row {
                return Some(Edge::new(i, i + 1 + index - offset));
            }
            offset += row;
        }
        None
    }

    /// The canonical edge universe `{(i, j) : i < j}` in variable-index order.
    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        let n = self.dimension;
        (0..n).flat_map(move |i| (i + 1..n).map(move |j| Edge { i, j }))
    }

    /// Edge universe paired with weights, in variable-index order.
    pub fn weighted_edges(&self) -> impl Iterator<Item = (Edge, f64)> + '_ {
        self.edges().map(move |e| (e, self.edge_weight(&e)))
    }

    /// Total weight of an edge set
    pub fn edges_weight(&self, edges: &[Edge]) -> f64 {
        edges.iter().map(|e| self.edge_weight(e)).sum()
    }

    /// Get statistics about the instance
    pub fn statistics(&self) -> InstanceStatistics {
        let mut total = 0.0;
        let mut min_distance = f64::INFINITY;
        let mut max_distance: f64 = 0.0;
        for (_, w) in self.weighted_edges() {
            total += w;
            min_distance = min_distance.min(w);
            max_distance = max_distance.max(w);
        }
        let num_edges = self.num_edges();

        InstanceStatistics {
            name: self.name.clone(),
            dimension: self.dimension,
            num_edges,
            avg_distance: total / num_edges as f64,
            min_distance,
            max_distance,
        }
    }
}

/// Statistics about an instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceStatistics {
    pub name: String,
    pub dimension: usize,
    pub num_edges: usize,
    pub avg_distance: f64,
    pub min_distance: f64,
    pub max_distance: f64,
}

impl std::fmt::Display for InstanceStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Instance: {}", self.name)?;
        writeln!(f, "  Nodes: {}", self.dimension)?;
        writeln!(f, "  Edge variables: {}", self.num_edges)?;
        writeln!(f, "  Avg distance: {:.2}", self.avg_distance)?;
        writeln!(f, "  Min distance: {:.2}", self.min_distance)?;
        writeln!(f, "  Max distance: {:.2}", self.max_distance)
    }
}
