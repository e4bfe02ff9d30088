// src/exec/executor.rs

//! Public executor: owns the worker pool and coordinates blocking runs.

use std::collections::HashSet;
use std::fmt;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::cache::{AnalysisCache, NoAnalysisCache};
use crate::config::ExecutorConfig;
use crate::config::validate::validate_executor_config;
use crate::dag::RunPhase;
use crate::errors::{FilterGraphError, Result};
use crate::exec::shared::Shared;
use crate::exec::worker::{StartupReport, Worker};
use crate::gpu::{HostQueueManager, QueueManager};
use crate::node::NodeHandle;
use crate::stats::RunSummary;

/// Executes sets of nodes in dependency order on a fixed worker pool.
///
/// The pool is created by [`FilterGraphExecutor::new`] and lives until the
/// executor is dropped. Each call to [`run_blocking`](Self::run_blocking)
/// refreshes every node it is given exactly once, never starting a node
/// before its upstream nodes in the same set have finished.
///
/// Runs are serialized. A second `run_blocking` that arrives while a run is
/// in flight logs a warning and waits for that run to finish first.
///
/// Dropping the executor stops the workers and joins them, which waits for
/// any `refresh` call still in progress.
pub struct FilterGraphExecutor {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    cache: Arc<dyn AnalysisCache>,
    run_gate: Mutex<()>,
    last_run: Mutex<Option<RunSummary>>,
}

impl fmt::Debug for FilterGraphExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterGraphExecutor")
            .field("workers", &self.workers.len())
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl FilterGraphExecutor {
    /// Spawn the worker pool.
    ///
    /// Every worker asks `queues` for its own compute queue before this
    /// returns. If any worker cannot be spawned or cannot get its queue, the
    /// workers already started are shut down and the error is returned.
    pub fn new(
        config: &ExecutorConfig,
        queues: Arc<dyn QueueManager>,
        cache: Arc<dyn AnalysisCache>,
    ) -> Result<Self> {
        validate_executor_config(config)?;

        let shared = Arc::new(Shared::new(config.idle_timeout()));
        let (ready_tx, ready_rx) = mpsc::channel::<StartupReport>();
        let mut workers = Vec::with_capacity(config.workers);

        for index in 0..config.workers {
            let label = format!("{}-{}", config.thread_name, index);
            let worker_shared = Arc::clone(&shared);
            let worker_queues = Arc::clone(&queues);
            let ready = ready_tx.clone();
            let thread_label = label.clone();

            let spawned = thread::Builder::new().name(label).spawn(move || {
                Worker::spawn_body(index, thread_label, worker_shared, worker_queues, ready)
            });

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(source) => {
                    error!(worker = index, error = %source, "failed to spawn worker thread");
                    shutdown_and_join(&shared, workers);
                    return Err(FilterGraphError::WorkerSpawn { index, source });
                }
            }
        }
        drop(ready_tx);

        if let Err(e) = await_startup(&ready_rx, workers.len()) {
            shutdown_and_join(&shared, workers);
            return Err(e);
        }

        info!(
            workers = workers.len(),
            idle_timeout_ms = config.idle_timeout_ms,
            "filter graph executor started"
        );

        Ok(Self {
            shared,
            workers,
            cache,
            run_gate: Mutex::new(()),
            last_run: Mutex::new(None),
        })
    }

    /// Executor backed by [`HostQueueManager`] and no analysis cache.
    pub fn with_host_backend(config: &ExecutorConfig) -> Result<Self> {
        Self::new(
            config,
            Arc::new(HostQueueManager::new()),
            Arc::new(NoAnalysisCache),
        )
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn phase(&self) -> RunPhase {
        self.shared.lock_state().phase()
    }

    /// Summary of the most recent completed run.
    pub fn last_run(&self) -> Option<RunSummary> {
        lock(&self.last_run).clone()
    }

    /// Refresh every node in `nodes` once, in dependency order, and block
    /// until all of them have finished.
    ///
    /// Accepts `NodeHandle`s or `Option<NodeHandle>`s; `None` entries and
    /// duplicates are ignored. An empty set returns immediately.
    ///
    /// The set must be dependency-closed: an upstream node that is not in
    /// `nodes` is treated as already up to date. Use
    /// [`crate::node::dependency_closure`] to close a set first.
    ///
    /// Never returns if the set contains a dependency cycle. Calling this
    /// from inside a node's `refresh` deadlocks.
    pub fn run_blocking<I, N>(&self, nodes: I)
    where
        I: IntoIterator<Item = N>,
        N: Into<Option<NodeHandle>>,
    {
        let nodes: HashSet<NodeHandle> = nodes.into_iter().filter_map(Into::into).collect();
        if nodes.is_empty() {
            debug!("run_blocking called with no nodes; nothing to do");
            return;
        }

        let (_gate, waited_for_previous) = self.enter_run();
        let started = Instant::now();
        let node_count = nodes.len();

        let run_id = {
            let mut state = self.shared.lock_state();
            state.begin(nodes);
            self.cache.clear();
            state.run_id()
        };

        debug!(run_id, nodes = node_count, "waking workers");
        self.shared.wake_workers();
        self.shared.wait_for_completion(run_id);

        let node_times = {
            let mut state = self.shared.lock_state();
            if state.phase() != RunPhase::Complete {
                warn!(
                    run_id,
                    phase = ?state.phase(),
                    "run signalled complete but state has not drained"
                );
            }
            state.take_timings()
        };

        let summary = RunSummary {
            run_id,
            node_count,
            elapsed: started.elapsed(),
            waited_for_previous,
            node_times,
        };

        debug!(
            run_id,
            nodes = node_count,
            elapsed_us = summary.elapsed.as_micros() as u64,
            busy_us = summary.busy_time().as_micros() as u64,
            "run complete"
        );

        *lock(&self.last_run) = Some(summary);
    }

    /// Take the run gate, waiting for an in-flight run if there is one.
    fn enter_run(&self) -> (MutexGuard<'_, ()>, bool) {
        match self.run_gate.try_lock() {
            Ok(gate) => (gate, false),
            Err(TryLockError::Poisoned(poisoned)) => (poisoned.into_inner(), false),
            Err(TryLockError::WouldBlock) => {
                warn!(
                    phase = ?self.phase(),
                    "run_blocking called while previous run has not drained; waiting for it"
                );
                (lock(&self.run_gate), true)
            }
        }
    }
}

impl Drop for FilterGraphExecutor {
    fn drop(&mut self) {
        debug!(workers = self.workers.len(), "stopping filter graph executor");
        shutdown_and_join(&self.shared, std::mem::take(&mut self.workers));
    }
}

/// Wait for every spawned worker to report in.
fn await_startup(ready_rx: &mpsc::Receiver<StartupReport>, expected: usize) -> Result<()> {
    for _ in 0..expected {
        match ready_rx.recv() {
            Ok((_, Ok(()))) => {}
            Ok((index, Err(e))) => {
                return Err(FilterGraphError::WorkerInit {
                    index,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(FilterGraphError::WorkerInit {
                    index: expected,
                    reason: "worker exited before reporting readiness".to_string(),
                });
            }
        }
    }
    Ok(())
}

fn shutdown_and_join(shared: &Shared, workers: Vec<JoinHandle<()>>) {
    shared.request_shutdown();
    for handle in workers {
        if let Err(e) = handle.join() {
            error!(?e, "worker thread panicked");
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
