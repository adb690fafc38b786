//! Heuristics module.
//!
//! This module exports the construction heuristic used for the warm start.

pub mod construction;

pub use construction::*;
