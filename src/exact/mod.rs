//! Exact branch-and-cut solver module.
//!
//! The MIP engine is reached through [`MipBackend`]. [`BranchAndCut`] drives a
//! backend: it builds the warm start, hands the subtour-elimination callback to
//! the engine and validates whatever the engine reports back.

pub mod callback;
pub mod config;
pub mod cut;
pub mod subtour;

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::feasibility::{self, Feasibility};
use crate::heuristics::{ConstructionHeuristic, NearestNeighborHeuristic};
use crate::instance::{Edge, ProblemModel};
use crate::solution::Tour;

pub use callback::{
    selected_edges, CallbackStats, Decision, IntegerSolutionCallback, SubtourEliminator,
    SELECTION_THRESHOLD,
};
pub use config::SolverConfig;
pub use cut::{CutError, LazyCut, LazyCutGenerator};
pub use subtour::{StructuralError, Subtour, SubtourDetector};

// When built with the `gurobi` feature, expose the real backend
#[cfg(feature = "gurobi")]
mod gurobi;
#[cfg(feature = "gurobi")]
pub use gurobi::GurobiBackend;

// Otherwise provide a stub so the CLI and benchmarks still build
#[cfg(not(feature = "gurobi"))]
mod gurobi_stub {
    use super::{EngineReport, IntegerSolutionCallback, MipBackend, SolverConfig};
    use crate::error::{Error, Result};
    use crate::instance::ProblemModel;
    use crate::solution::Tour;

    #[derive(Debug, Clone, Copy, Default)]
    pub struct GurobiBackend;

    impl GurobiBackend {
        pub fn new() -> Self {
            GurobiBackend
        }
    }

    impl MipBackend for GurobiBackend {
        fn name(&self) -> &str {
            "gurobi"
        }

        fn optimize(
            &self,
            _model: &ProblemModel,
            _config: &SolverConfig,
            _warm_start: Option<&Tour>,
            _callback: &dyn IntegerSolutionCallback,
        ) -> Result<EngineReport> {
            Err(Error::BackendUnavailable("gurobi (rebuild with --features gurobi)".to_string()))
        }
    }
}

#[cfg(not(feature = "gurobi"))]
pub use gurobi_stub::GurobiBackend;

/// Status the engine reports when it stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineStatus {
    Optimal,
    TimeLimit,
    /// The engine proved the model infeasible
    Infeasible,
    /// Interrupted, terminated or any other status without a trusted answer
    Failed,
}

impl std::fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            EngineStatus::Optimal => "Optimal",
            EngineStatus::TimeLimit => "TimeLimit",
            EngineStatus::Infeasible => "Infeasible",
            EngineStatus::Failed => "Failed",
        };
        write!(f, "{}", label)
    }
}

/// Terminal status of an exact run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveStatus {
    /// Proven optimal within the configured gap
    Optimal,
    /// Budget exhausted; the incumbent (if any) is not proven optimal
    TimeLimit,
    /// Aborted, infeasible, or the reported answer could not be trusted
    Failed,
}

impl From<EngineStatus> for SolveStatus {
    fn from(status: EngineStatus) -> Self {
        match status {
            EngineStatus::Optimal => SolveStatus::Optimal,
            EngineStatus::TimeLimit => SolveStatus::TimeLimit,
            EngineStatus::Infeasible | EngineStatus::Failed => SolveStatus::Failed,
        }
    }
}

impl std::fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SolveStatus::Optimal => "Optimal",
            SolveStatus::TimeLimit => "TimeLimit",
            SolveStatus::Failed => "Failed",
        };
        write!(f, "{}", label)
    }
}

/// What a backend reports once the engine stops.
#[derive(Debug, Clone)]
pub struct EngineReport {
    pub status: EngineStatus,
    pub objective: Option<f64>,
    pub bound: Option<f64>,
    pub gap: Option<f64>,
    /// Engine runtime in seconds
    pub runtime: f64,
    pub nodes_explored: u64,
    /// Final value of every edge variable, in variable-index order
    pub assignment: Option<Vec<f64>>,
}

impl EngineReport {
    /// A report without any solution attached.
    pub fn without_solution(status: EngineStatus, runtime: f64) -> Self {
        EngineReport {
            status,
            objective: None,
            bound: None,
            gap: None,
            runtime,
            nodes_explored: 0,
            assignment: None,
        }
    }
}

/// The engine contract.
///
/// An implementation creates one binary variable per canonical edge with the
/// edge weight as objective coefficient and one degree-2 equality per node. It
/// loads `warm_start` as the initial incumbent and calls `callback` at every
/// integer-feasible assignment. It adds every returned cut as a lazy
/// constraint and terminates the search on [`Decision::Abort`].
pub trait MipBackend {
    fn name(&self) -> &str;

    fn optimize(
        &self,
        model: &ProblemModel,
        config: &SolverConfig,
        warm_start: Option<&Tour>,
        callback: &dyn IntegerSolutionCallback,
    ) -> Result<EngineReport>;
}

/// Result of exact solving
#[derive(Debug, Clone, Serialize)]
pub struct ExactResult {
    pub status: SolveStatus,
    /// Name of the backend that produced the result
    pub backend: String,
    /// Validated tour, when the engine returned one
    pub tour: Option<Tour>,
    /// Edges the engine selected in its final assignment
    pub edges: Vec<Edge>,
    /// Objective value of the final assignment
    pub objective: Option<f64>,
    /// Best bound proven by the engine
    pub lower_bound: Option<f64>,
    /// Optimality gap
    pub gap: Option<f64>,
    /// Wall-clock time of the whole run in seconds
    pub time: f64,
    pub nodes_explored: u64,
    /// Length of the nearest-neighbor tour used as warm start
    pub warm_start_length: Option<f64>,
    pub callback: CallbackStats,
    /// Verdict of the feasibility validator on `edges`
    pub feasibility: Option<Feasibility>,
    /// Why the run is `Failed`
    pub failure: Option<String>,
}

impl ExactResult {
    pub fn is_optimal(&self) -> bool {
        self.status == SolveStatus::Optimal
    }

    pub fn tour_length(&self) -> Option<f64> {
        self.tour.as_ref().map(|t| t.length)
    }
}

/// Branch-and-cut driver: warm start, engine run with lazy subtour cuts, validation.
pub struct BranchAndCut<B: MipBackend> {
    backend: B,
    config: SolverConfig,
}

impl<B: MipBackend> BranchAndCut<B> {
    pub fn new(backend: B, config: SolverConfig) -> Self {
        BranchAndCut { backend, config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Solve `model` to optimality, or as far as the time limit allows.
    ///
    /// Configuration and backend errors are returned as `Err`; every outcome
    /// of the search itself (including an aborted run) is an `Ok` result with
    /// the matching [`SolveStatus`].
    pub fn solve(&self, model: &ProblemModel) -> Result<ExactResult> {
        self.config.validate()?;
        let start = Instant::now();
        let n = model.dimension();

        log::info!(
            "branch-and-cut on {} ({} nodes, {} edge variables) with {}",
            model.name,
            n,
            model.num_edges(),
            self.backend.name()
        );

        let warm_start = if self.config.warm_start {
            self.warm_start(model)
        } else {
            None
        };

        let eliminator = SubtourEliminator::new(model);
        let report = self
            .backend
            .optimize(model, &self.config, warm_start.as_ref(), &eliminator)?;
        let stats = eliminator.stats();

        log::info!(
            "engine stopped with {} after {:.2}s ({} invocations, {} cuts, {} skipped)",
            report.status,
            report.runtime,
            stats.invocations,
            stats.cuts_emitted,
            stats.skipped
        );

        let mut result = ExactResult {
            status: SolveStatus::from(report.status),
            backend: self.backend.name().to_string(),
            tour: None,
            edges: Vec::new(),
            objective: report.objective,
            lower_bound: report.bound,
            gap: report.gap,
            time: 0.0,
            nodes_explored: report.nodes_explored,
            warm_start_length: warm_start.as_ref().map(|t| t.length),
            callback: stats,
            feasibility: None,
            failure: None,
        };

        if let Some(fault) = eliminator.fault() {
            result.status = SolveStatus::Failed;
            result.failure = Some(fault);
        } else if report.status == EngineStatus::Infeasible {
            result.failure = Some("engine proved the model infeasible".to_string());
        } else if let Some(values) = report.assignment {
            self.accept(model, &values, &mut result);
        } else if result.status == SolveStatus::Optimal {
            result.status = SolveStatus::Failed;
            result.failure = Some("engine reported optimality without a solution".to_string());
        }
        if result.status == SolveStatus::Failed && result.failure.is_none() {
            result.failure = Some("engine stopped without a usable solution".to_string());
        }

        result.time = start.elapsed().as_secs_f64();
        if let Some(tour) = result.tour.as_mut() {
            tour.computation_time = result.time;
        }
        match &result.failure {
            Some(reason) => log::error!("run failed: {}", reason),
            None => log::info!(
                "{}: objective {:?}, bound {:?}, {:.2}s",
                result.status,
                result.objective,
                result.lower_bound,
                result.time
            ),
        }
        Ok(result)
    }

    fn warm_start(&self, model: &ProblemModel) -> Option<Tour> {
        let tour = NearestNeighborHeuristic::new().construct(model);

        match tour.validate(model.dimension()).into_result() {
            Ok(()) => {
                log::info!("warm start: nearest-neighbor tour of length {}", tour.length);
                Some(tour)
            }
            Err(violation) => {
                log::warn!("discarding warm start: {}", violation);
                None
            }
        }
    }

    /// Validate the engine's final assignment and attach the tour.
    fn accept(&self, model: &ProblemModel, values: &[f64], result: &mut ExactResult) {
        if values.len() != model.num_edges() {
            result.status = SolveStatus::Failed;
            result.failure = Some(format!(
                "engine reported {} values for {} edge variables",
                values.len(),
                model.num_edges()
            ));
            return;
        }

        let edges = selected_edges(model, values);
        let verdict = feasibility::validate_edges(&edges, model.dimension());
        result.edges = edges;

        if let Some(violation) = verdict.violation.clone() {
            result.status = SolveStatus::Failed;
            result.failure = Some(format!("reported solution is not a tour: {}", violation));
            result.feasibility = Some(verdict);
            return;
        }
        result.feasibility = Some(verdict);

        let algorithm = format!("Branch-and-Cut ({})", self.backend.name());
        match Tour::from_edges(model, &result.edges, &algorithm) {
            Ok(tour) => {
                result.objective = Some(tour.length);
                result.tour = Some(tour);
            }
            Err(violation) => {
                result.status = SolveStatus::Failed;
                result.failure = Some(format!("reported solution is not a tour: {}", violation));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::Mutex;

    /// Plays a fixed list of incumbents through the callback, like an engine would.
    struct ScriptedBackend {
        incumbents: Vec<Vec<(usize, usize)>>,
        cuts: Mutex<Vec<LazyCut>>,
        warm_start_seen: Mutex<Option<f64>>,
    }

    impl ScriptedBackend {
        fn new(incumbents: Vec<Vec<(usize, usize)>>) -> Self {
            ScriptedBackend {
                incumbents,
                cuts: Mutex::new(Vec::new()),
                warm_start_seen: Mutex::new(None),
            }
        }
    }

    impl MipBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        fn optimize(
            &self,
            model: &ProblemModel,
            _config: &SolverConfig,
            warm_start: Option<&Tour>,
            callback: &dyn IntegerSolutionCallback,
        ) -> Result<EngineReport> {
            *self.warm_start_seen.lock().unwrap() = warm_start.map(|t| t.length);
            let mut accepted = None;
            for edges in &self.incumbents {
                let mut values = vec![0.0; model.num_edges()];
                for &(i, j) in edges {
                    values[model.edge_index(i, j)] = 1.0;
                }
                match callback.on_integer_solution(&values) {
                    Decision::NoAction => accepted = Some(values),
                    Decision::Cut(cut) => self.cuts.lock().unwrap().push(cut),
                    Decision::Skip(_) => {}
                    Decision::Abort(_) => {
                        return Ok(EngineReport::without_solution(EngineStatus::Failed, 0.1))
                    }
                }
            }
            let status =
                if accepted.is_some() { EngineStatus::Optimal } else { EngineStatus::TimeLimit };
            Ok(EngineReport {
                status,
                objective: None,
                bound: Some(0.0),
                gap: Some(0.0),
                runtime: 0.1,
                nodes_explored: 3,
                assignment: accepted,
            })
        }
    }

    /// Reports a fixed final assignment without calling the callback.
    struct FixedBackend(Vec<(usize, usize)>);

    impl MipBackend for FixedBackend {
        fn name(&self) -> &str {
            "fixed"
        }

        fn optimize(
            &self,
            model: &ProblemModel,
            _config: &SolverConfig,
            _warm_start: Option<&Tour>,
            _callback: &dyn IntegerSolutionCallback,
        ) -> Result<EngineReport> {
            let mut values = vec![0.0; model.num_edges()];
            for &(i, j) in &self.0 {
                values[model.edge_index(i, j)] = 1.0;
            }
            Ok(EngineReport {
                assignment: Some(values),
                ..EngineReport::without_solution(EngineStatus::Optimal, 0.0)
            })
        }
    }

    /// Stops immediately with the given status and no assignment.
    struct StatusBackend(EngineStatus);

    impl MipBackend for StatusBackend {
        fn name(&self) -> &str {
            "status"
        }

        fn optimize(
            &self,
            _model: &ProblemModel,
            _config: &SolverConfig,
            _warm_start: Option<&Tour>,
            _callback: &dyn IntegerSolutionCallback,
        ) -> Result<EngineReport> {
            Ok(EngineReport::without_solution(self.0, 0.0))
        }
    }

    fn hexagon() -> ProblemModel {
        let coords = [
            (1, 0.0, 0.0),
            (2, 10.0, 0.0),
            (3, 20.0, 0.0),
            (4, 20.0, 10.0),
            (5, 10.0, 10.0),
            (6, 0.0, 10.0),
        ];
        ProblemModel::new("hexagon", 6, &coords).unwrap()
    }

    fn two_triangles() -> Vec<(usize, usize)> {
        vec![(0, 1), (1, 5), (0, 5), (2, 3), (3, 4), (2, 4)]
    }

    fn perimeter() -> Vec<(usize, usize)> {
        vec![(0, 1), (1, 2), (2, 3), (3, 4), (4, 5), (0, 5)]
    }

    #[test]
    fn test_cut_then_tour_is_optimal() {
        let model = hexagon();
        let solver = BranchAndCut::new(
            ScriptedBackend::new(vec![two_triangles(), perimeter()]),
            SolverConfig::default(),
        );
        let result = solver.solve(&model).unwrap();

        assert_eq!(result.status, SolveStatus::Optimal);
        assert!(result.failure.is_none());
        assert_eq!(result.callback.cuts_emitted, 1);
        assert_eq!(result.callback.complete_tours, 1);
        assert_eq!(result.tour_length(), Some(60.0));
        assert_eq!(result.objective, Some(60.0));
        assert!(result.feasibility.as_ref().unwrap().feasible);

        let cuts = solver.backend().cuts.lock().unwrap();
        assert_eq!(cuts.len(), 1);
        assert_eq!(cuts[0].rhs(), 2.0);
    }

    #[test]
    fn test_warm_start_is_passed_to_backend() {
        let model = hexagon();
        let solver =
            BranchAndCut::new(ScriptedBackend::new(vec![perimeter()]), SolverConfig::default());
        let result = solver.solve(&model).unwrap();
        assert_eq!(result.warm_start_length, Some(60.0));
        assert_eq!(*solver.backend().warm_start_seen.lock().unwrap(), Some(60.0));

        let cold = BranchAndCut::new(
            ScriptedBackend::new(vec![perimeter()]),
            SolverConfig::default().with_warm_start(false),
        );
        let result = cold.solve(&model).unwrap();
        assert!(result.warm_start_length.is_none());
        assert!(cold.backend().warm_start_seen.lock().unwrap().is_none());
    }

    #[test]
    fn test_structural_anomaly_does_not_stop_search() {
        let model = hexagon();
        let path = vec![(0, 1), (1, 2)];
        let solver = BranchAndCut::new(
            ScriptedBackend::new(vec![path, perimeter()]),
            SolverConfig::default(),
        );
        let result = solver.solve(&model).unwrap();
        assert_eq!(result.status, SolveStatus::Optimal);
        assert_eq!(result.callback.skipped, 1);
    }

    #[test]
    fn test_no_solution_keeps_time_limit_status() {
        let model = hexagon();
        let solver =
            BranchAndCut::new(ScriptedBackend::new(vec![two_triangles()]), SolverConfig::default());
        let result = solver.solve(&model).unwrap();
        assert_eq!(result.status, SolveStatus::TimeLimit);
        assert!(result.tour.is_none());
        assert!(result.failure.is_none());
    }

    #[test]
    fn test_infeasible_engine_is_reported_as_failed() {
        let model = hexagon();
        let solver =
            BranchAndCut::new(StatusBackend(EngineStatus::Infeasible), SolverConfig::default());
        let result = solver.solve(&model).unwrap();
        assert_eq!(result.status, SolveStatus::Failed);
        assert_eq!(result.failure.as_deref(), Some("engine proved the model infeasible"));
        assert!(result.tour.is_none());
    }

    #[test]
    fn test_engine_failure_carries_reason() {
        let model = hexagon();
        let solver =
            BranchAndCut::new(StatusBackend(EngineStatus::Failed), SolverConfig::default());
        let result = solver.solve(&model).unwrap();
        assert_eq!(result.status, SolveStatus::Failed);
        assert!(result.failure.is_some());
    }

    #[test]
    fn test_status_mapping_has_no_infeasible_outcome() {
        assert_eq!(SolveStatus::from(EngineStatus::Infeasible), SolveStatus::Failed);
        assert_eq!(SolveStatus::from(EngineStatus::TimeLimit), SolveStatus::TimeLimit);
        assert_eq!(SolveStatus::from(EngineStatus::Optimal), SolveStatus::Optimal);
    }

    #[test]
    fn test_invalid_final_answer_is_failed() {
        let model = hexagon();
        let solver = BranchAndCut::new(FixedBackend(two_triangles()), SolverConfig::default());
        let result = solver.solve(&model).unwrap();
        assert_eq!(result.status, SolveStatus::Failed);
        assert!(result.tour.is_none());
        assert!(!result.feasibility.as_ref().unwrap().feasible);
        assert!(result.failure.unwrap().contains("not a tour"));
    }

    #[test]
    fn test_valid_final_answer_is_accepted() {
        let model = hexagon();
        let solver = BranchAndCut::new(FixedBackend(perimeter()), SolverConfig::default());
        let result = solver.solve(&model).unwrap();
        assert!(result.is_optimal());
        assert_eq!(result.edges.len(), 6);
        assert_eq!(result.tour.unwrap().sequence, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let model = hexagon();
        let solver = BranchAndCut::new(
            FixedBackend(perimeter()),
            SolverConfig::default().with_time_limit(-1.0),
        );
        assert!(matches!(solver.solve(&model), Err(Error::Config(_))));
    }

    #[cfg(not(feature = "gurobi"))]
    #[test]
    fn test_stub_backend_is_unavailable() {
        let model = hexagon();
        let solver = BranchAndCut::new(GurobiBackend::new(), SolverConfig::default());
        assert!(matches!(solver.solve(&model), Err(Error::BackendUnavailable(_))));
    }
}
