//! TSP Branch-and-Cut Library
//!
//! Core of an exact solver for the symmetric Euclidean Traveling Salesman
//! Problem, built around an external MIP engine.
//!
//! # Features
//!
//! - TSPLIB instance loading with rounded Euclidean distances
//! - Nearest Neighbor construction used as warm start
//! - Subtour detection on integer incumbents and lazy subtour-elimination cuts
//! - Feasibility validation of the engine's final answer
//! - Gurobi backend (feature `gurobi`) and a benchmarking driver
//!
//! # Example
//!
//! ```no_run
//! use tsp_branch_cut::exact::{BranchAndCut, GurobiBackend, SolverConfig};
//! use tsp_branch_cut::instance::ProblemModel;
//!
//! let model = ProblemModel::from_file("berlin52.tsp").unwrap();
//! let solver = BranchAndCut::new(GurobiBackend::new(), SolverConfig::default());
//! let result = solver.solve(&model).unwrap();
//!
//! println!("{}: {:?}", result.status, result.tour_length());
//! ```

pub mod benchmark;
pub mod error;
pub mod exact;
pub mod feasibility;
pub mod heuristics;
pub mod instance;
pub mod logging;
pub mod solution;

pub use error::{Error, Result};
pub use exact::{BranchAndCut, EngineStatus, ExactResult, MipBackend, SolveStatus, SolverConfig};
pub use feasibility::{Feasibility, Violation};
pub use heuristics::{ConstructionHeuristic, NearestNeighborHeuristic};
pub use instance::{Edge, ProblemModel};
pub use solution::Tour;
