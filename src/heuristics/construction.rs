use crate::error::{Error, Result};
use crate::instance::ProblemModel;
use crate::solution::Tour;
use ordered_float::OrderedFloat;

pub trait ConstructionHeuristic {
    fn construct(&self, model: &ProblemModel) -> Tour;
    fn name(&self) -> &str;
}

/// Nearest Neighbor Heuristic
///
/// Builds a tour by repeatedly visiting the nearest unvisited node, then
/// closes it back to the start. Ties go to the smallest node id, so the
/// result is deterministic for a given start node. Runs in `O(n²)` and only
/// guarantees feasibility; the tour seeds the MIP engine's warm start.
pub struct NearestNeighborHeuristic {
    pub start: usize,
}

impl NearestNeighborHeuristic {
    pub fn new() -> Self {
        NearestNeighborHeuristic { start: 0 }
    }

    pub fn with_start(start: usize) -> Self {
        NearestNeighborHeuristic { start }
    }

    /// Start node checked against the instance dimension.
    pub fn for_model(start: usize, model: &ProblemModel) -> Result<Self> {
        if start >= model.dimension() {
            return Err(Error::config(format!(
                "start node {} outside [0, {})",
                start,
                model.dimension()
            )));
        }
        Ok(Self::with_start(start))
    }

    fn find_nearest(
        &self,
        model: &ProblemModel,
        current: usize,
        visited: &[bool],
    ) -> Option<usize> {
        (0..model.dimension())
            .filter(|&n| !visited[n])
            .min_by_key(|&n| OrderedFloat(model.distance(current, n)))
    }
}

impl Default for NearestNeighborHeuristic {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstructionHeuristic for NearestNeighborHeuristic {
    fn construct(&self, model: &ProblemModel) -> Tour {
        let start = std::time::Instant::now();
        let n = model.dimension();
        let first = if self.start < n {
            self.start
        } else {
            log::warn!("start node {} outside [0, {}), starting from node 0", self.start, n);
            0
        };

        let mut sequence = Vec::with_capacity(n);
        let mut visited = vec![false; n];
        sequence.push(first);
        visited[first] = true;

        let mut current = first;
        while let Some(next) = self.find_nearest(model, current, &visited) {
            sequence.push(next);
            visited[next] = true;
            current = next;
        }

        let mut tour = Tour::from_sequence(model, sequence, self.name());
        tour.computation_time = start.elapsed().as_secs_f64();
        log::debug!("{} tour of length {:.0} over {} nodes", self.name(), tour.length, n);
        tour
    }

    fn name(&self) -> &str {
        "NearestNeighbor"
    }
}
