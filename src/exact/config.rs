//! Engine configuration.
//!
//! One immutable object carries every tuning knob the run uses. Backends read
//! it once, before the search starts.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// MIP engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Wall-clock budget in seconds
    pub time_limit: f64,
    /// Relative MIP gap tolerance
    pub mip_gap: f64,
    /// Number of worker threads (0 = automatic)
    pub threads: i32,
    /// Search emphasis: 0 balanced, 1 feasibility, 2 optimality, 3 bound
    pub mip_focus: i32,
    /// Share of time spent in primal heuristics, in `[0, 1]`
    pub heuristics: f64,
    /// Presolve level: -1 automatic, 0 off, 1 conservative, 2 aggressive
    pub presolve: i32,
    /// Generic cut aggressiveness: -1 automatic, 0 off .. 3 very aggressive
    pub cuts: i32,
    /// Seconds after which the engine switches to solution improvement
    pub improve_start_time: f64,
    /// Node count after which the engine switches to solution improvement
    pub improve_start_nodes: f64,
    /// Seed the engine with the nearest-neighbor tour
    pub warm_start: bool,
    /// Enable engine log output
    pub verbose: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            time_limit: 120.0,
            mip_gap: 1e-6,
            threads: 8,
            mip_focus: 1,
            heuristics: 0.8,
            presolve: 1,
            cuts: 1,
            improve_start_time: 5.0,
            improve_start_nodes: 100.0,
            warm_start: true,
            verbose: false,
        }
    }
}

impl SolverConfig {
    pub fn with_time_limit(mut self, seconds: f64) -> Self {
        self.time_limit = seconds;
        self
    }

    pub fn with_threads(mut self, threads: i32) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_mip_gap(mut self, gap: f64) -> Self {
        self.mip_gap = gap;
        self
    }

    pub fn with_warm_start(mut self, enabled: bool) -> Self {
        self.warm_start = enabled;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Load a configuration from a JSON file; missing keys keep their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: SolverConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every option against the range the engine accepts.
    pub fn validate(&self) -> Result<()> {
        if !(self.time_limit > 0.0) {
            return Err(Error::config(format!(
                "time_limit must be positive, got {}",
                self.time_limit
            )));
        }
        if !(0.0..=1.0).contains(&self.mip_gap) {
            return Err(Error::config(format!("mip_gap must be in [0, 1], got {}", self.mip_gap)));
        }
        if self.threads < 0 {
            return Err(Error::config(format!("threads must be >= 0, got {}", self.threads)));
        }
        if !(0..=3).contains(&self.mip_focus) {
            return Err(Error::config(format!(
                "mip_focus must be in 0..=3, got {}",
                self.mip_focus
            )));
        }
        if !(0.0..=1.0).contains(&self.heuristics) {
            return Err(Error::config(format!(
                "heuristics must be in [0, 1], got {}",
                self.heuristics
            )));
        }
        if !(-1..=2).contains(&self.presolve) {
            return Err(Error::config(format!("presolve must be in -1..=2, got {}", self.presolve)));
        }
        if !(-1..=3).contains(&self.cuts) {
            return Err(Error::config(format!("cuts must be in -1..=3, got {}", self.cuts)));
        }
        if self.improve_start_time < 0.0 || self.improve_start_nodes < 0.0 {
            return Err(Error::config("improve_start_time and improve_start_nodes must be >= 0"));
        }
        Ok(())
    }
}
