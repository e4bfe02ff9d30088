// src/lib.rs

//! Dataflow scheduler for filter graphs.
//!
//! A filter graph is a set of processing nodes where each node reads the
//! outputs of other nodes. [`FilterGraphExecutor`] takes an unordered set of
//! nodes, works out which ones are ready, and refreshes each of them exactly
//! once on a fixed pool of worker threads, never before its inputs are.
//!
//! - [`node`] defines the interface a node exposes to the scheduler.
//! - [`dag`] holds per-run bookkeeping and dependency resolution.
//! - [`exec`] owns the worker pool and the blocking run coordinator.
//! - [`gpu`] and [`cache`] are the collaborator seams for compute queues and
//!   the cross-node analysis cache.
//!
//! ```no_run
//! use filtergraph::{ExecutorConfig, FilterGraphExecutor, NodeHandle};
//!
//! # fn nodes() -> Vec<NodeHandle> { Vec::new() }
//! let executor = FilterGraphExecutor::with_host_backend(&ExecutorConfig::with_workers(4))?;
//! executor.run_blocking(nodes());
//! # Ok::<(), filtergraph::errors::FilterGraphError>(())
//! ```

pub mod cache;
pub mod config;
pub mod dag;
pub mod errors;
pub mod exec;
pub mod gpu;
pub mod logging;
pub mod node;
pub mod stats;
pub mod types;

pub use cache::{AnalysisCache, MemoCache, NoAnalysisCache};
pub use config::{ConfigFile, ExecutorConfig};
pub use dag::RunPhase;
pub use errors::{FilterGraphError, Result};
pub use exec::FilterGraphExecutor;
pub use gpu::{CommandBuffer, ComputeQueue, HostQueueManager, QueueManager};
pub use node::{FlowGraphNode, NodeHandle, StagedBuffer, dependency_closure};
pub use stats::{NodeTiming, RunSummary};
pub use types::{ExecLocation, LogLevel};
