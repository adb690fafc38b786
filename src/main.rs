//! TSP Branch-and-Cut - Command Line Interface

use clap::{Parser, Subcommand};
use tsp_branch_cut::benchmark::{load_instances_from_dir, Benchmark, BenchmarkConfig};
use tsp_branch_cut::exact::{BranchAndCut, GurobiBackend, SolveStatus, SolverConfig};
use tsp_branch_cut::heuristics::{ConstructionHeuristic, NearestNeighborHeuristic};
use tsp_branch_cut::instance::ProblemModel;
use tsp_branch_cut::logging::{init_logger, LogLevel};
use tsp_branch_cut::Result;

use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "tsp-branch-cut")]
#[command(version = "1.0")]
#[command(about = "Exact symmetric TSP solver: branch-and-cut with lazy subtour elimination")]
struct Cli {
    /// Log verbosity (RUST_LOG overrides it)
    #[arg(long, value_enum, default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve an instance to optimality with the MIP engine
    Solve {
        /// Path to the TSPLIB instance file
        #[arg(short, long)]
        instance: PathBuf,

        /// JSON file with solver options
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Time limit in seconds
        #[arg(short, long)]
        time_limit: Option<f64>,

        /// Number of engine threads
        #[arg(long)]
        threads: Option<i32>,

        /// Do not seed the engine with the nearest-neighbor tour
        #[arg(long)]
        no_warm_start: bool,

        /// Show engine output
        #[arg(short, long)]
        verbose: bool,

        /// Write the result as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build a nearest-neighbor tour only
    Heuristic {
        /// Path to the TSPLIB instance file
        #[arg(short, long)]
        instance: PathBuf,

        /// Start node (0-based)
        #[arg(short, long, default_value = "0")]
        start: usize,

        /// Write the tour as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Analyze an instance
    Analyze {
        /// Path to the instance file
        #[arg(short, long)]
        instance: PathBuf,
    },

    /// Run benchmarks on a directory of instances
    Benchmark {
        /// Directory containing instance files
        #[arg(short, long)]
        dir: PathBuf,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Run the exact solver (requires the gurobi feature)
        #[arg(long)]
        exact: bool,

        /// Exact solver time limit per instance
        #[arg(short, long, default_value = "120")]
        time_limit: f64,

        /// Maximum instance size
        #[arg(long)]
        max_size: Option<usize>,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logger(cli.log_level.to_filter()) {
        eprintln!("Error: {}", e);
    }

    let outcome = match cli.command {
        Commands::Solve {
            instance,
            config,
            time_limit,
            threads,
            no_warm_start,
            verbose,
            output,
        } => solve_instance(
            &instance,
            config.as_deref(),
            time_limit,
            threads,
            no_warm_start,
            verbose,
            output,
        ),
        Commands::Heuristic { instance, start, output } => run_heuristic(&instance, start, output),
        Commands::Analyze { instance } => analyze_instance(&instance),
        Commands::Benchmark { dir, output, exact, time_limit, max_size } => {
            run_benchmark(&dir, &output, exact, time_limit, max_size)
        }
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Returns `false` when the run ended without a trusted answer.
fn solve_instance(
    path: &Path,
    config_path: Option<&Path>,
    time_limit: Option<f64>,
    threads: Option<i32>,
    no_warm_start: bool,
    verbose: bool,
    output: Option<PathBuf>,
) -> Result<bool> {
    println!("Loading instance from {:?}...", path);
    let model = ProblemModel::from_file(path)?;

    let mut config = match config_path {
        Some(p) => SolverConfig::from_json_file(p)?,
        None => SolverConfig::default(),
    };
    if let Some(limit) = time_limit {
        config = config.with_time_limit(limit);
    }
    if let Some(t) = threads {
        config = config.with_threads(t);
    }
    if no_warm_start {
        config = config.with_warm_start(false);
    }
    if verbose {
        config = config.with_verbose(true);
        println!("{}", model.statistics());
    }

    let solver = BranchAndCut::new(GurobiBackend::new(), config);
    let result = solver.solve(&model)?;

    println!("\n========== Results ==========");
    println!("Status: {}", result.status);
    if let Some(length) = result.tour_length() {
        println!("Tour length: {:.0}", length);
    }
    if let Some(bound) = result.lower_bound {
        println!("Lower bound: {:.2}", bound);
    }
    if let Some(gap) = result.gap {
        println!("Gap: {:.4}%", gap * 100.0);
    }
    if let Some(warm) = result.warm_start_length {
        println!("Warm start (nearest neighbor): {:.0}", warm);
    }
    println!("Lazy cuts: {}", result.callback.cuts_emitted);
    println!("Nodes explored: {}", result.nodes_explored);
    println!("Time: {:.4}s", result.time);
    if let Some(reason) = &result.failure {
        println!("Failure: {}", reason);
    }
    if verbose {
        if let Some(tour) = &result.tour {
            println!("\nTour: {:?}", tour.sequence);
        }
    }

    if let Some(out_path) = output {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(&out_path, json)?;
        println!("\nResult saved to {:?}", out_path);
    }

    Ok(result.status != SolveStatus::Failed)
}

fn run_heuristic(path: &Path, start: usize, output: Option<PathBuf>) -> Result<bool> {
    let model = ProblemModel::from_file(path)?;
    let tour = NearestNeighborHeuristic::for_model(start, &model)?.construct(&model);
    let verdict = tour.validate(model.dimension());

    println!("{}", tour);
    println!("Feasibility: {}", verdict);

    if let Some(out_path) = output {
        let json = serde_json::to_string_pretty(&tour)?;
        std::fs::write(&out_path, json)?;
        println!("\nTour saved to {:?}", out_path);
    }

    Ok(verdict.feasible)
}

fn analyze_instance(path: &Path) -> Result<bool> {
    let model = ProblemModel::from_file(path)?;

    println!("========== Instance Analysis ==========\n");
    println!("{}", model.statistics());
    println!("Edge variables: {}", model.num_edges());

    let nn = NearestNeighborHeuristic::new().construct(&model);
    println!("\nQuick Solution Estimate:");
    println!(
        "  Nearest Neighbor: {:.0} (feasible: {})",
        nn.length,
        nn.validate(model.dimension()).feasible
    );
    Ok(true)
}

fn run_benchmark(
    dir: &Path,
    output: &Path,
    exact: bool,
    time_limit: f64,
    max_size: Option<usize>,
) -> Result<bool> {
    println!("Loading instances from {:?}...", dir);
    let mut instances = load_instances_from_dir(dir)?;

    if let Some(max) = max_size {
        instances.retain(|m| m.dimension() <= max);
    }

    println!("Found {} instances", instances.len());
    if instances.is_empty() {
        eprintln!("No instances found!");
        return Ok(false);
    }

    std::fs::create_dir_all(output)?;

    let mut benchmark = Benchmark::new(BenchmarkConfig {
        run_exact: exact,
        ..Default::default()
    });
    let config = SolverConfig::default().with_time_limit(time_limit);
    let solver = BranchAndCut::new(GurobiBackend::new(), config);
    benchmark.run_all(&instances, &solver);

    let results_path = output.join("results.csv");
    benchmark.export_to_csv(&results_path)?;
    println!("\nResults exported to {:?}", results_path);

    let report = benchmark.generate_report();
    println!("\n{}", report);

    let report_path = output.join("report.txt");
    std::fs::write(&report_path, &report)?;
    println!("Report saved to {:?}", report_path);
    Ok(true)
}
