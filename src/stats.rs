// src/stats.rs

//! Per-run profiling data.

use std::time::Duration;

/// How long one node's `refresh` took, and on which worker.
#[derive(Debug, Clone)]
pub struct NodeTiming {
    pub node: String,
    pub worker: usize,
    pub elapsed: Duration,
}

/// Summary of one completed `run_blocking` call.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Monotonically increasing run identifier (first run is 1).
    pub run_id: u64,
    /// Number of distinct nodes executed.
    pub node_count: usize,
    /// Wall time from entering the run (after the run gate) to completion.
    pub elapsed: Duration,
    /// True if this call found another run in flight and had to wait for it.
    pub waited_for_previous: bool,
    /// One entry per executed node, in completion order.
    pub node_times: Vec<NodeTiming>,
}

impl RunSummary {
    /// Sum of all node refresh times. Exceeds `elapsed` when nodes ran in
    /// parallel.
    pub fn busy_time(&self) -> Duration {
        self.node_times.iter().map(|t| t.elapsed).sum()
    }

    /// The slowest node of the run, if any ran.
    pub fn slowest(&self) -> Option<&NodeTiming> {
        self.node_times.iter().max_by_key(|t| t.elapsed)
    }
}
