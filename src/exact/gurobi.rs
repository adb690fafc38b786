//! Gurobi backend for the branch-and-cut driver.
//!
//! The formulation uses:
//! - One binary variable x_e per canonical edge, objective coefficient = edge weight
//! - One degree constraint per node: the edges touching it sum to 2
//! - Subtour-elimination cuts added lazily from the MIPSOL callback

use grb::callback::{CbResult, Where};
use grb::prelude::*;

use crate::error::{Error, Result};
use crate::exact::callback::IntegerSolutionCallback;
use crate::exact::config::SolverConfig;
use crate::exact::{Decision, EngineReport, EngineStatus, MipBackend};
use crate::instance::ProblemModel;
use crate::solution::Tour;

fn grb_err(context: &'static str) -> impl Fn(grb::Error) -> Error {
    move |e| Error::backend(format!("{}: {}", context, e))
}

/// Gurobi-based engine
#[derive(Debug, Clone, Copy, Default)]
pub struct GurobiBackend;

impl GurobiBackend {
    pub fn new() -> Self {
        GurobiBackend
    }

    fn apply_params(model: &mut Model, config: &SolverConfig) -> Result<()> {
        model
            .set_param(param::TimeLimit, config.time_limit)
            .map_err(grb_err("Failed to set time limit"))?;
        model.set_param(param::MIPGap, config.mip_gap).map_err(grb_err("Failed to set MIP gap"))?;
        model.set_param(param::Threads, config.threads).map_err(grb_err("Failed to set threads"))?;
        model
            .set_param(param::LazyConstraints, 1)
            .map_err(grb_err("Failed to enable lazy constraints"))?;
        model
            .set_param(param::MIPFocus, config.mip_focus)
            .map_err(grb_err("Failed to set MIP focus"))?;
        model
            .set_param(param::Heuristics, config.heuristics)
            .map_err(grb_err("Failed to set heuristics"))?;
        model
            .set_param(param::Presolve, config.presolve)
            .map_err(grb_err("Failed to set presolve"))?;
        model.set_param(param::Cuts, config.cuts).map_err(grb_err("Failed to set cuts"))?;
        model
            .set_param(param::ImproveStartTime, config.improve_start_time)
            .map_err(grb_err("Failed to set improve start time"))?;
        model
            .set_param(param::ImproveStartNodes, config.improve_start_nodes)
            .map_err(grb_err("Failed to set improve start nodes"))?;
        if !config.verbose {
            model.set_param(param::OutputFlag, 0).map_err(grb_err("Failed to set output flag"))?;
        }
        Ok(())
    }
}

impl MipBackend for GurobiBackend {
    fn name(&self) -> &str {
        "gurobi"
    }

    fn optimize(
        &self,
        problem: &ProblemModel,
        config: &SolverConfig,
        warm_start: Option<&Tour>,
        callback: &dyn IntegerSolutionCallback,
    ) -> Result<EngineReport> {
        let n = problem.dimension();

        let env = Env::new("").map_err(grb_err("Failed to create Gurobi environment"))?;
        let mut model =
            Model::with_env(&problem.name, env).map_err(grb_err("Failed to create model"))?;
        Self::apply_params(&mut model, config)?;

        // x[k] for the k-th canonical edge, in variable-index order
        let mut x: Vec<Var> = Vec::with_capacity(problem.num_edges());
        for (e, weight) in problem.weighted_edges() {
            let var = add_binvar!(model, name: &format!("x_{}_{}", e.i, e.j), obj: weight)
                .map_err(grb_err("Failed to add edge variable"))?;
            x.push(var);
        }

        model.update().map_err(grb_err("Failed to update model"))?;

        // Degree constraints
        for v in 0..n {
            let expr: Expr = problem
                .edges()
                .zip(&x)
                .filter(|(e, _)| e.contains(v))
                .map(|(_, &var)| var)
                .grb_sum();
            model
                .add_constr(&format!("deg_{}", v), c!(expr == 2.0))
                .map_err(grb_err("Failed to add degree constraint"))?;
        }

        // Warm start
        if let Some(tour) = warm_start {
            for (value, var) in tour.assignment(problem).into_iter().zip(&x) {
                model
                    .set_obj_attr(attr::Start, var, value)
                    .map_err(grb_err("Failed to set warm start"))?;
            }
        }

        model.update().map_err(grb_err("Failed to update model before optimization"))?;

        let mut lazy = |w: Where| -> CbResult {
            if let Where::MIPSol(ctx) = w {
                let values = ctx.get_solution(&x)?;
                match callback.on_integer_solution(&values) {
                    Decision::Cut(cut) => {
                        let expr: Expr = cut.var_indices().iter().map(|&k| x[k]).grb_sum();
                        ctx.add_lazy(c!(expr <= cut.rhs()))?;
                    }
                    Decision::Abort(err) => {
                        log::error!("terminating Gurobi: {}", err);
                        ctx.terminate();
                    }
                    Decision::NoAction | Decision::Skip(_) => {}
                }
            }
            Ok(())
        };

        model
            .optimize_with_callback(&mut lazy)
            .map_err(grb_err("Optimization failed"))?;

        let status = model.status().map_err(grb_err("Failed to get status"))?;
        let runtime = model.get_attr(attr::Runtime).unwrap_or(0.0);
        let status = match status {
            Status::Optimal => EngineStatus::Optimal,
            Status::TimeLimit | Status::SolutionLimit | Status::NodeLimit => {
                EngineStatus::TimeLimit
            }
            Status::Infeasible | Status::InfOrUnbd => EngineStatus::Infeasible,
            other => {
                log::warn!("Gurobi stopped with status {:?}", other);
                EngineStatus::Failed
            }
        };

        let solutions = model.get_attr(attr::SolCount).unwrap_or(0);
        if solutions == 0 {
            return Ok(EngineReport::without_solution(status, runtime));
        }

        let assignment = model
            .get_obj_attr_batch(attr::X, x.iter().copied())
            .map_err(grb_err("Failed to read solution"))?;

        Ok(EngineReport {
            status,
            objective: model.get_attr(attr::ObjVal).ok(),
            bound: model.get_attr(attr::ObjBound).ok(),
            gap: model.get_attr(attr::MIPGap).ok(),
            runtime,
            nodes_explored: model.get_attr(attr::NodeCount).unwrap_or(0.0) as u64,
            assignment: Some(assignment),
        })
    }
}
