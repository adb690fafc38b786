//! Benchmarking module.
//!
//! Runs the nearest-neighbor heuristic and, optionally, the exact
//! branch-and-cut solver over a set of instances, and collects one
//! [`RunRecord`] per run.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::exact::{BranchAndCut, ExactResult, MipBackend};
use crate::heuristics::{ConstructionHeuristic, NearestNeighborHeuristic};
use crate::instance::ProblemModel;

/// Result of running a single algorithm on an instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// Algorithm name
    pub algorithm: String,
    /// Instance name
    pub instance: String,
    /// Instance dimension
    pub dimension: usize,
    /// Final status (heuristic runs are always "Feasible" or "Infeasible")
    pub status: String,
    /// Tour length, if a tour was produced
    pub length: Option<f64>,
    /// Whether the tour passed the feasibility validator
    pub feasible: bool,
    /// Computation time in seconds
    pub time: f64,
    /// Lower bound (exact runs only)
    pub lower_bound: Option<f64>,
    /// Gap to the best known length, in percent
    pub gap_to_best: Option<f64>,
    /// Relative MIP gap reported by the engine, in percent (exact runs only)
    pub mip_gap: Option<f64>,
    /// Lazy cuts added (exact runs only)
    pub cuts: Option<u64>,
    /// Branch-and-bound nodes explored (exact runs only)
    pub nodes: Option<u64>,
}

/// Aggregated statistics for one algorithm
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmStatistics {
    pub algorithm: String,
    pub num_instances: usize,
    pub num_feasible: usize,
    pub avg_length: f64,
    pub avg_time: f64,
    pub total_time: f64,
    pub avg_gap: Option<f64>,
}

/// Benchmark configuration
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Run the exact solver after the heuristic
    pub run_exact: bool,
    /// Skip the exact solver above this many nodes
    pub max_exact_size: usize,
    /// Show a progress bar
    pub show_progress: bool,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        BenchmarkConfig {
            run_exact: false,
            max_exact_size: 200,
            show_progress: true,
        }
    }
}

/// Benchmarking engine
pub struct Benchmark {
    config: BenchmarkConfig,
    results: Vec<RunRecord>,
    best_known: HashMap<String, f64>,
}

impl Benchmark {
    pub fn new(config: BenchmarkConfig) -> Self {
        Benchmark {
            config,
            results: Vec::new(),
            best_known: HashMap::new(),
        }
    }

    /// Set best known tour length for an instance
    pub fn set_best_known(&mut self, instance_name: &str, length: f64) {
        self.best_known.insert(instance_name.to_string(), length);
    }

    fn gap_to_best(&self, instance: &str, length: Option<f64>) -> Option<f64> {
        let best = *self.best_known.get(instance)?;
        let length = length?;
        (best > 0.0).then(|| (length - best) / best * 100.0)
    }

    /// Run the nearest-neighbor heuristic on an instance
    pub fn run_heuristic(&mut self, model: &ProblemModel) -> &RunRecord {
        let start = Instant::now();
        let tour = NearestNeighborHeuristic::new().construct(model);
        let time = start.elapsed().as_secs_f64();
        let feasible = tour.validate(model.dimension()).feasible;

        let record = RunRecord {
            algorithm: tour.algorithm.clone(),
            instance: model.name.clone(),
            dimension: model.dimension(),
            status: if feasible { "Feasible" } else { "Infeasible" }.to_string(),
            length: Some(tour.length),
            feasible,
            time,
            lower_bound: None,
            gap_to_best: self.gap_to_best(&model.name, Some(tour.length)),
            mip_gap: None,
            cuts: None,
            nodes: None,
        };
        self.push(record)
    }

    /// Run the exact solver on an instance; an optimal tour becomes the best known length.
    pub fn run_exact<B: MipBackend>(
        &mut self,
        model: &ProblemModel,
        solver: &BranchAndCut<B>,
    ) -> Option<ExactResult> {
        match solver.solve(model) {
            Ok(result) => {
                if result.is_optimal() {
                    if let Some(length) = result.tour_length() {
                        self.best_known.insert(model.name.clone(), length);
                    }
                }

                let record = RunRecord {
                    algorithm: format!("Branch-and-Cut ({})", result.backend),
                    instance: model.name.clone(),
                    dimension: model.dimension(),
                    status: result.status.to_string(),
                    length: result.tour_length(),
                    feasible: result.tour.is_some(),
                    time: result.time,
                    lower_bound: result.lower_bound,
                    gap_to_best: self.gap_to_best(&model.name, result.tour_length()),
                    mip_gap: result.gap.map(|g| g * 100.0),
                    cuts: Some(result.callback.cuts_emitted),
                    nodes: Some(result.nodes_explored),
                };
                self.push(record);
                Some(result)
            }
            Err(e) => {
                log::error!("exact solver failed on {}: {}", model.name, e);
                None
            }
        }
    }

    /// Run every configured algorithm on every instance.
    ///
    /// The exact solver runs first so the heuristic gap is measured against
    /// the proven optimum when one is found.
    pub fn run_all<B: MipBackend>(&mut self, instances: &[ProblemModel], solver: &BranchAndCut<B>) {
        let progress = if self.config.show_progress {
            ProgressBar::new(instances.len() as u64)
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) = ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}") {
            progress.set_style(style.progress_chars("=>-"));
        }

        for model in instances {
            progress.set_message(model.name.clone());
            log::info!("Running benchmark on instance: {}", model.name);

            if self.config.run_exact {
                if model.dimension() <= self.config.max_exact_size {
                    self.run_exact(model, solver);
                } else {
                    log::info!(
                        "skipping exact solver on {} ({} > {} nodes)",
                        model.name,
                        model.dimension(),
                        self.config.max_exact_size
                    );
                }
            }
            self.run_heuristic(model);
            progress.inc(1);
        }

        progress.finish_with_message("done");
    }

    fn push(&mut self, record: RunRecord) -> &RunRecord {
        self.results.push(record);
        &self.results[self.results.len() - 1]
    }

    /// Compute statistics for each algorithm, sorted by name
    pub fn compute_statistics(&self) -> Vec<AlgorithmStatistics> {
        let mut by_algorithm: HashMap<&str, Vec<&RunRecord>> = HashMap::new();
        for record in &self.results {
            by_algorithm.entry(record.algorithm.as_str()).or_default().push(record);
        }

        let mut statistics: Vec<AlgorithmStatistics> = by_algorithm
            .into_iter()
            .map(|(algorithm, records)| {
                let feasible: Vec<&&RunRecord> = records.iter().filter(|r| r.feasible).collect();
                let lengths: Vec<f64> = feasible.iter().filter_map(|r| r.length).collect();
                let gaps: Vec<f64> = records.iter().filter_map(|r| r.gap_to_best).collect();
                let total_time: f64 = records.iter().map(|r| r.time).sum();

                AlgorithmStatistics {
                    algorithm: algorithm.to_string(),
                    num_instances: records.len(),
                    num_feasible: feasible.len(),
                    avg_length: mean(&lengths).unwrap_or(f64::NAN),
                    avg_time: total_time / records.len() as f64,
                    total_time,
                    avg_gap: mean(&gaps),
                }
            })
            .collect();

        statistics.sort_by(|a, b| a.algorithm.cmp(&b.algorithm));
        statistics
    }

    /// Export results to CSV
    pub fn export_to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);

        for record in &self.results {
            writer.serialize(record)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Generate summary report
    pub fn generate_report(&self) -> String {
        let mut report = String::new();

        report.push_str("========================================\n");
        report.push_str("         TSP Benchmark Report\n");
        report.push_str("========================================\n\n");

        report.push_str("Algorithm Performance Summary:\n");
        report.push_str("-".repeat(80).as_str());
        report.push('\n');
        report.push_str(&format!(
            "{:<28} {:>10} {:>14} {:>12} {:>12}\n",
            "Algorithm", "Feasible", "Avg Length", "Avg Gap%", "Avg Time"
        ));
        report.push_str("-".repeat(80).as_str());
        report.push('\n');

        for stat in self.compute_statistics() {
            let gap_str = stat
                .avg_gap
                .map(|g| format!("{:.2}%", g))
                .unwrap_or_else(|| "-".to_string());
            report.push_str(&format!(
                "{:<28} {:>10} {:>14.2} {:>12} {:>12.4}\n",
                stat.algorithm,
                format!("{}/{}", stat.num_feasible, stat.num_instances),
                stat.avg_length,
                gap_str,
                stat.avg_time
            ));
        }

        report.push_str("-".repeat(80).as_str());
        report.push('\n');

        if !self.best_known.is_empty() {
            report.push_str("\nProven optima:\n");
            let mut optima: Vec<(&String, &f64)> = self.best_known.iter().collect();
            optima.sort_by(|a, b| a.0.cmp(b.0));
            for (instance, length) in optima {
                report.push_str(&format!("  {}: {:.0}\n", instance, length));
            }
        }

        report
    }

    /// Get all results
    pub fn results(&self) -> &[RunRecord] {
        &self.results
    }

    /// Get best known values
    pub fn best_known(&self) -> &HashMap<String, f64> {
        &self.best_known
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Load every `.tsp` file in a directory, sorted by dimension.
///
/// Files that fail to parse are logged and skipped.
pub fn load_instances_from_dir<P: AsRef<Path>>(dir: P) -> Result<Vec<ProblemModel>> {
    let mut instances = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().map(|e| e == "tsp").unwrap_or(false) {
            match ProblemModel::from_file(&path) {
                Ok(model) => instances.push(model),
                Err(e) => log::warn!("skipping {}: {}", path.display(), e),
            }
        }
    }

    instances.sort_by(|a, b| a.dimension().cmp(&b.dimension()).then_with(|| a.name.cmp(&b.name)));
    Ok(instances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exact::{EngineReport, EngineStatus, IntegerSolutionCallback, SolverConfig};
    use crate::solution::Tour;

    /// Returns the warm start as the optimal solution.
    struct WarmStartBackend;

    impl MipBackend for WarmStartBackend {
        fn name(&self) -> &str {
            "warm-start"
        }

        fn optimize(
            &self,
            model: &ProblemModel,
            _config: &SolverConfig,
            warm_start: Option<&Tour>,
            callback: &dyn IntegerSolutionCallback,
        ) -> Result<EngineReport> {
            let assignment = warm_start.map(|t| t.assignment(model));
            if let Some(values) = &assignment {
                callback.on_integer_solution(values);
            }
            Ok(EngineReport {
                assignment,
                ..EngineReport::without_solution(EngineStatus::Optimal, 0.0)
            })
        }
    }

    /// Returns the warm start as an unproven incumbent with a 25% MIP gap.
    struct UnprovenBackend;

    impl MipBackend for UnprovenBackend {
        fn name(&self) -> &str {
            "unproven"
        }

        fn optimize(
            &self,
            model: &ProblemModel,
            _config: &SolverConfig,
            warm_start: Option<&Tour>,
            _callback: &dyn IntegerSolutionCallback,
        ) -> Result<EngineReport> {
            Ok(EngineReport {
                gap: Some(0.25),
                assignment: warm_start.map(|t| t.assignment(model)),
                ..EngineReport::without_solution(EngineStatus::TimeLimit, 0.0)
            })
        }
    }

    fn quiet() -> BenchmarkConfig {
        BenchmarkConfig {
            run_exact: true,
            show_progress: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_benchmark_config() {
        let config = BenchmarkConfig::default();
        assert!(!config.run_exact);
        assert_eq!(config.max_exact_size, 200);
    }

    #[test]
    fn test_run_heuristic_records_feasible_tour() {
        let model = ProblemModel::random(12, 4, 100.0).unwrap();
        let mut bench = Benchmark::new(quiet());
        let record = bench.run_heuristic(&model);
        assert!(record.feasible);
        assert_eq!(record.dimension, 12);
        assert!(record.gap_to_best.is_none());
    }

    #[test]
    fn test_run_all_measures_heuristic_against_optimum() {
        let instances = vec![
            ProblemModel::random(8, 1, 100.0).unwrap(),
            ProblemModel::random(10, 2, 100.0).unwrap(),
        ];
        let solver = BranchAndCut::new(WarmStartBackend, SolverConfig::default());
        let mut bench = Benchmark::new(quiet());
        bench.run_all(&instances, &solver);

        assert_eq!(bench.results().len(), 4);
        assert_eq!(bench.best_known().len(), 2);
        for record in bench.results().iter().filter(|r| r.cuts.is_none()) {
            assert_eq!(record.gap_to_best, Some(0.0));
        }
        let stats = bench.compute_statistics();
        assert_eq!(stats.len(), 2);
        assert!(stats.iter().all(|s| s.num_feasible == 2));
        assert!(bench.generate_report().contains("Proven optima"));
    }

    #[test]
    fn test_mip_gap_is_kept_apart_from_gap_to_best() {
        let model = ProblemModel::random(8, 3, 100.0).unwrap();
        let solver = BranchAndCut::new(UnprovenBackend, SolverConfig::default());
        let mut bench = Benchmark::new(quiet());

        bench.run_exact(&model, &solver).unwrap();
        let record = &bench.results()[0];
        assert_eq!(record.status, "TimeLimit");
        assert_eq!(record.mip_gap, Some(25.0));
        assert_eq!(record.gap_to_best, None);
        assert!(bench.best_known().is_empty());

        let length = record.length.unwrap();
        bench.set_best_known(&model.name, length / 2.0);
        bench.run_exact(&model, &solver).unwrap();
        let record = &bench.results()[1];
        assert_eq!(record.gap_to_best, Some(100.0));
        assert_eq!(record.mip_gap, Some(25.0));
    }

    #[test]
    fn test_large_instances_skip_exact() {
        let instances = vec![ProblemModel::random(9, 1, 100.0).unwrap()];
        let solver = BranchAndCut::new(WarmStartBackend, SolverConfig::default());
        let mut bench = Benchmark::new(BenchmarkConfig { max_exact_size: 5, ..quiet() });
        bench.run_all(&instances, &solver);
        assert_eq!(bench.results().len(), 1);
        assert!(bench.results()[0].cuts.is_none());
    }

    #[test]
    fn test_export_to_csv() {
        let model = ProblemModel::random(6, 7, 100.0).unwrap();
        let mut bench = Benchmark::new(quiet());
        bench.run_heuristic(&model);
        let path = std::env::temp_dir().join("tsp_branch_cut_bench_test.csv");
        bench.export_to_csv(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("algorithm,instance,dimension"));
        assert_eq!(text.lines().count(), 2);
        let _ = std::fs::remove_file(&path);
    }
}
