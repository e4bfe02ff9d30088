// src/dag/mod.rs

//! Dependency tracking for a run.
//!
//! - [`resolver`] decides which incomplete nodes have all their inputs ready.
//! - [`run_state`] holds the incomplete / running / runnable sets of the
//!   current run and hands nodes out to workers one at a time.

pub mod resolver;
pub mod run_state;

pub use resolver::{deps_satisfied, recompute_runnable};
pub use run_state::{Claim, RunPhase, RunState};
