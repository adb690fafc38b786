//! The integration point the MIP engine calls on every integer incumbent.
//!
//! Instead of raising exceptions from inside the engine's callback, the adapter
//! returns an explicit [`Decision`] and the backend translates it into the
//! engine's own calls (add a lazy constraint, terminate, or nothing).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::exact::cut::{LazyCut, LazyCutGenerator};
use crate::exact::subtour::{StructuralError, SubtourDetector};
use crate::instance::{Edge, ProblemModel};

/// Value above which an edge variable counts as selected.
pub const SELECTION_THRESHOLD: f64 = 0.5;

/// Outcome of one callback invocation.
#[derive(Debug)]
pub enum Decision {
    /// The candidate is a complete tour.
    NoAction,
    /// The candidate contains a proper subtour; add this cut lazily.
    Cut(LazyCut),
    /// The candidate is structurally inconsistent; ignore it and keep searching.
    Skip(StructuralError),
    /// Internal fault; the engine must stop the whole search.
    Abort(Error),
}

impl Decision {
    pub fn is_cut(&self) -> bool {
        matches!(self, Decision::Cut(_))
    }

    pub fn is_abort(&self) -> bool {
        matches!(self, Decision::Abort(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Decision::NoAction => "no-action",
            Decision::Cut(_) => "cut",
            Decision::Skip(_) => "skip",
            Decision::Abort(_) => "abort",
        }
    }
}

/// Hook invoked by a [`crate::exact::MipBackend`] at every integer-feasible assignment.
///
/// Backends may call it from several worker threads at once.
pub trait IntegerSolutionCallback: Send + Sync {
    /// `assignment` holds one value per edge variable, in variable-index order.
    fn on_integer_solution(&self, assignment: &[f64]) -> Decision;
}

/// Counters accumulated across invocations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackStats {
    pub invocations: u64,
    pub cuts_emitted: u64,
    pub skipped: u64,
    pub complete_tours: u64,
    pub aborts: u64,
}

/// Edges whose value exceeds [`SELECTION_THRESHOLD`].
pub fn selected_edges(model: &ProblemModel, assignment: &[f64]) -> Vec<Edge> {
    model
        .edges()
        .zip(assignment)
        .filter(|&(_, &v)| v > SELECTION_THRESHOLD)
        .map(|(e, _)| e)
        .collect()
}

/// Subtour-elimination callback: detects the shortest cycle of each incumbent
/// and cuts it when it is a proper subtour.
pub struct SubtourEliminator<'a> {
    model: &'a ProblemModel,
    detector: SubtourDetector,
    generator: LazyCutGenerator,
    invocations: AtomicU64,
    cuts_emitted: AtomicU64,
    skipped: AtomicU64,
    complete_tours: AtomicU64,
    aborts: AtomicU64,
    aborted: AtomicBool,
    fault: Mutex<Option<String>>,
}

impl<'a> SubtourEliminator<'a> {
    pub fn new(model: &'a ProblemModel) -> Self {
        let n = model.dimension();
        SubtourEliminator {
            model,
            detector: SubtourDetector::new(n),
            generator: LazyCutGenerator::new(n),
            invocations: AtomicU64::new(0),
            cuts_emitted: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            complete_tours: AtomicU64::new(0),
            aborts: AtomicU64::new(0),
            aborted: AtomicBool::new(false),
            fault: Mutex::new(None),
        }
    }

    pub fn stats(&self) -> CallbackStats {
        CallbackStats {
            invocations: self.invocations.load(Ordering::Relaxed),
            cuts_emitted: self.cuts_emitted.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            complete_tours: self.complete_tours.load(Ordering::Relaxed),
            aborts: self.aborts.load(Ordering::Relaxed),
        }
    }

    /// Whether an internal fault has stopped this run.
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// Message of the first fault, if any.
    pub fn fault(&self) -> Option<String> {
        match self.fault.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn candidate(&self, assignment: &[f64]) -> Result<Vec<Edge>, Error> {
        let expected = self.model.num_edges();
        if assignment.len() != expected {
            return Err(Error::fatal(format!(
                "assignment has {} values, expected {}",
                assignment.len(),
                expected
            )));
        }
        if let Some(k) = assignment.iter().position(|v| !v.is_finite()) {
            return Err(Error::fatal(format!("edge variable {} has a non-finite value", k)));
        }
        Ok(selected_edges(self.model, assignment))
    }

    fn abort(&self, err: Error) -> Decision {
        self.aborts.fetch_add(1, Ordering::Relaxed);
        let message = err.to_string();
        {
            let mut guard = match self.fault.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if guard.is_none() {
                log::error!("aborting search: {}", message);
                *guard = Some(message);
            }
        }
        self.aborted.store(true, Ordering::Release);
        Decision::Abort(err)
    }
}

impl IntegerSolutionCallback for SubtourEliminator<'_> {
    fn on_integer_solution(&self, assignment: &[f64]) -> Decision {
        self.invocations.fetch_add(1, Ordering::Relaxed);

        if self.is_aborted() {
            let reason = self.fault().unwrap_or_default();
            return self.abort(Error::fatal(format!("search already aborted: {}", reason)));
        }

        let candidate = match self.candidate(assignment) {
            Ok(edges) => edges,
            Err(err) => return self.abort(err),
        };

        let subtour = match self.detector.shortest_subtour(&candidate) {
            Ok(subtour) => subtour,
            Err(err) => {
                log::warn!("skipping invalid integer solution: {}", err);
                self.skipped.fetch_add(1, Ordering::Relaxed);
                return Decision::Skip(err);
            }
        };

        if subtour.is_hamiltonian(self.model.dimension()) {
            self.complete_tours.fetch_add(1, Ordering::Relaxed);
            log::debug!("incumbent is a complete tour, no cut needed");
            return Decision::NoAction;
        }

        match self.generator.generate(&subtour) {
            Ok(cut) => {
                self.cuts_emitted.fetch_add(1, Ordering::Relaxed);
                log::debug!(
                    "lazy cut over {} nodes ({} terms, rhs {})",
                    subtour.len(),
                    cut.len(),
                    cut.rhs()
                );
                Decision::Cut(cut)
            }
            Err(err) => self.abort(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    fn assignment_for(model: &ProblemModel, edges: &[(usize, usize)]) -> Vec<f64> {
        let mut values = vec![0.0; model.num_edges()];
        for &(i, j) in edges {
            values[model.edge_index(i, j)] = 1.0;
        }
        values
    }

    fn two_triangles() -> Vec<(usize, usize)> {
        vec![(0, 1), (1, 2), (0, 2), (3, 4), (4, 5), (3, 5)]
    }

    #[test]
    fn test_complete_tour_needs_no_cut() {
        let model = ProblemModel::random(6, 5, 100.0).unwrap();
        let adapter = SubtourEliminator::new(&model);
        let values = assignment_for(&model, &[(0, 1), (1, 2), (2, 3), (3, 4), (4, 5), (0, 5)]);
        assert!(matches!(adapter.on_integer_solution(&values), Decision::NoAction));
        assert_eq!(adapter.stats().complete_tours, 1);
    }

    #[test]
    fn test_subtour_yields_cut() {
        let model = ProblemModel::random(6, 5, 100.0).unwrap();
        let adapter = SubtourEliminator::new(&model);
        let values = assignment_for(&model, &two_triangles());
        match adapter.on_integer_solution(&values) {
            Decision::Cut(cut) => {
                assert_eq!(cut.len(), 3);
                assert_eq!(cut.rhs(), 2.0);
                assert!(cut.is_violated_by(&values));
                assert_eq!(cut.edges(), &[Edge::new(0, 1), Edge::new(0, 2), Edge::new(1, 2)]);
            }
            other => panic!("expected a cut, got {:?}", other),
        }
        assert_eq!(adapter.stats().cuts_emitted, 1);
    }

    #[test]
    fn test_near_integer_values_are_thresholded() {
        let model = ProblemModel::random(6, 5, 100.0).unwrap();
        let adapter = SubtourEliminator::new(&model);
        let mut values = assignment_for(&model, &two_triangles());
        for v in values.iter_mut() {
            *v = if *v > 0.5 { 0.9999 } else { 1e-7 };
        }
        assert!(adapter.on_integer_solution(&values).is_cut());
    }

    #[test]
    fn test_structural_anomaly_is_skipped() {
        let model = ProblemModel::random(4, 2, 100.0).unwrap();
        let adapter = SubtourEliminator::new(&model);
        let values = assignment_for(&model, &[(0, 1), (2, 3)]);
        let decision = adapter.on_integer_solution(&values);
        assert!(matches!(decision, Decision::Skip(StructuralError::Degree { node: 0, degree: 1 })));
        assert!(!adapter.is_aborted());
        // the next invocation proceeds normally
        let values = assignment_for(&model, &[(0, 1), (1, 2), (2, 3), (0, 3)]);
        assert!(matches!(adapter.on_integer_solution(&values), Decision::NoAction));
        let stats = adapter.stats();
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.invocations, 2);
    }

    #[test]
    fn test_wrong_length_aborts_and_stays_aborted() {
        let model = ProblemModel::random(5, 2, 100.0).unwrap();
        let adapter = SubtourEliminator::new(&model);
        let decision = adapter.on_integer_solution(&[1.0, 0.0]);
        assert!(matches!(decision, Decision::Abort(Error::Fatal(_))));
        assert!(adapter.is_aborted());
        assert!(adapter.fault().unwrap().contains("expected 10"));

        let valid = assignment_for(&model, &[(0, 1), (1, 2), (2, 3), (3, 4), (0, 4)]);
        assert!(adapter.on_integer_solution(&valid).is_abort());
        assert_eq!(adapter.stats().aborts, 2);
    }

    #[test]
    fn test_non_finite_value_aborts() {
        let model = ProblemModel::random(4, 2, 100.0).unwrap();
        let adapter = SubtourEliminator::new(&model);
        let mut values = assignment_for(&model, &[(0, 1), (1, 2), (2, 3), (0, 3)]);
        values[1] = f64::NAN;
        assert!(adapter.on_integer_solution(&values).is_abort());
    }

    #[test]
    fn test_concurrent_invocations() {
        let model = ProblemModel::random(6, 9, 100.0).unwrap();
        let adapter = SubtourEliminator::new(&model);
        let split = assignment_for(&model, &two_triangles());
        let tour = assignment_for(&model, &[(0, 1), (1, 2), (2, 3), (3, 4), (4, 5), (0, 5)]);

        let cuts: usize = (0..200)
            .into_par_iter()
            .map(|k| {
                let values = if k % 2 == 0 { &split } else { &tour };
                usize::from(adapter.on_integer_solution(values).is_cut())
            })
            .sum();

        let stats = adapter.stats();
        assert_eq!(cuts, 100);
        assert_eq!(stats.invocations, 200);
        assert_eq!(stats.cuts_emitted, 100);
        assert_eq!(stats.complete_tours, 100);
    }

    #[test]
    fn test_selected_edges() {
        let model = ProblemModel::random(4, 2, 100.0).unwrap();
        let values = assignment_for(&model, &[(0, 2), (1, 3)]);
        assert_eq!(selected_edges(&model, &values), vec![Edge::new(0, 2), Edge::new(1, 3)]);
    }
}
