// src/exec/mod.rs

//! Execution layer: the worker pool and the blocking run coordinator.
//!
//! - [`executor`] owns the pool and implements `run_blocking`.
//! - `worker` is the body of each worker thread: acquire a compute queue,
//!   then claim, stage, refresh and complete nodes until shutdown.
//! - `shared` holds the locks and condition variables both sides use.

pub mod executor;
mod shared;
mod worker;

pub use executor::FilterGraphExecutor;
