// src/dag/run_state.rs

//! Mutable state of the current run.
//!
//! One `RunState` lives behind the executor's state lock. `begin` resets it
//! for each run; every other method is called by workers while they hold
//! that lock.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::dag::resolver::recompute_runnable;
use crate::node::NodeHandle;
use crate::stats::NodeTiming;

/// Coarse lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// State is set up but no node has started yet.
    Init,
    /// Nodes are executing or waiting for a worker.
    Running,
    /// Every node still incomplete is currently executing.
    Draining,
    /// Nothing is left to run.
    Complete,
}

/// Outcome of trying to claim a node.
#[derive(Debug)]
pub enum Claim {
    /// This node moved from runnable to running; the caller must execute it.
    Node(NodeHandle),
    /// Nodes remain, but none can start until something completes.
    Blocked,
    /// The run has no incomplete nodes left.
    Finished,
}

#[derive(Debug, Default)]
pub struct RunState {
    run_id: u64,
    incomplete: HashSet<NodeHandle>,
    running: HashSet<NodeHandle>,
    runnable: HashSet<NodeHandle>,
    completed: usize,
    timings: Vec<NodeTiming>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new run over `nodes`.
    ///
    /// Returns `true` if the previous run still had incomplete nodes, which
    /// means the caller reset state under a run that had not drained.
    pub fn begin(&mut self, nodes: HashSet<NodeHandle>) -> bool {
        let undrained = !self.incomplete.is_empty();
        if undrained {
            warn!(
                run_id = self.run_id,
                incomplete = self.incomplete.len(),
                running = self.running.len(),
                "resetting run state while previous run still has incomplete nodes"
            );
        }

        self.run_id += 1;
        self.incomplete = nodes;
        self.running.clear();
        self.runnable.clear();
        self.completed = 0;
        self.timings.clear();

        debug!(
            run_id = self.run_id,
            nodes = self.incomplete.len(),
            "run state initialised"
        );

        undrained
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    /// Whether there is anything left to do in the current run.
    pub fn has_pending_work(&self) -> bool {
        !self.incomplete.is_empty()
    }

    pub fn is_finished(&self) -> bool {
        self.incomplete.is_empty()
    }

    /// Try to take one node for execution.
    ///
    /// The runnable set is only recomputed once it has been drained, so the
    /// cost of resolution is paid once per wave of ready nodes instead of on
    /// every claim.
    pub fn claim_next(&mut self) -> Claim {
        if self.incomplete.is_empty() {
            return Claim::Finished;
        }

        if self.runnable.is_empty() {
            self.runnable = recompute_runnable(&self.incomplete, &self.running);
        }

        let Some(node) = self.runnable.iter().next().cloned() else {
            return Claim::Blocked;
        };

        self.runnable.remove(&node);
        self.running.insert(node.clone());
        Claim::Node(node)
    }

    /// Record that `node` finished. Removes it from both `running` and
    /// `incomplete`.
    ///
    /// Returns `true` if this was the last incomplete node of the run.
    pub fn complete(&mut self, node: &NodeHandle, timing: NodeTiming) -> bool {
        let was_running = self.running.remove(node);
        let was_incomplete = self.incomplete.remove(node);

        if !was_running || !was_incomplete {
            warn!(
                run_id = self.run_id,
                node = %node.name(),
                was_running,
                was_incomplete,
                "completion for a node that was not running in this run"
            );
            return false;
        }

        self.completed += 1;
        self.timings.push(timing);
        self.incomplete.is_empty()
    }

    pub fn phase(&self) -> RunPhase {
        if self.incomplete.is_empty() {
            RunPhase::Complete
        } else if self.completed == 0 && self.running.is_empty() {
            RunPhase::Init
        } else if self.running.len() == self.incomplete.len() {
            RunPhase::Draining
        } else {
            RunPhase::Running
        }
    }

    /// Number of nodes completed so far in this run.
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Hand over the timings collected so far, leaving the list empty.
    pub fn take_timings(&mut self) -> Vec<NodeTiming> {
        std::mem::take(&mut self.timings)
    }

    #[cfg(test)]
    fn runnable_len(&self) -> usize {
        self.runnable.len()
    }
}
