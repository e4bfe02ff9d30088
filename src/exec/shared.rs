// src/exec/shared.rs

//! State shared between the run coordinator and the worker threads.
//!
//! Locking:
//! - `state` guards the run sets. `work_cv` is paired with it and wakes
//!   workers on a new run, on every node completion, and on shutdown.
//! - `completion` guards the id of the newest finished run and is paired
//!   with `completion_cv`, which only the coordinator waits on.
//!
//! The two locks are never held at the same time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::dag::{Claim, RunState};
use crate::node::NodeHandle;
use crate::stats::NodeTiming;

pub(crate) struct Shared {
    state: Mutex<RunState>,
    work_cv: Condvar,
    completed_through: Mutex<u64>,
    completion_cv: Condvar,
    shutdown: AtomicBool,
    idle_timeout: Duration,
}

impl Shared {
    pub(crate) fn new(idle_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(RunState::new()),
            work_cv: Condvar::new(),
            completed_through: Mutex::new(0),
            completion_cv: Condvar::new(),
            shutdown: AtomicBool::new(false),
            idle_timeout,
        }
    }

    /// Lock the run state. A panic while holding the lock cannot leave the
    /// sets half-updated, so poisoning is ignored.
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Set the shutdown flag and wake every worker.
    pub(crate) fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        // Take the lock so a worker between its predicate check and its wait
        // cannot miss the notification.
        drop(self.lock_state());
        self.work_cv.notify_all();
    }

    pub(crate) fn wake_workers(&self) {
        self.work_cv.notify_all();
    }

    /// Idle wait between runs.
    ///
    /// Returns with the state lock held once there is work, shutdown was
    /// requested, or the idle timeout elapsed.
    pub(crate) fn wait_for_work(&self) -> MutexGuard<'_, RunState> {
        let guard = self.lock_state();
        let (guard, _timeout) = self
            .work_cv
            .wait_timeout_while(guard, self.idle_timeout, |st| {
                !self.is_shutdown() && !st.has_pending_work()
            })
            .unwrap_or_else(PoisonError::into_inner);
        guard
    }

    /// Block until a node can be claimed for the current run.
    ///
    /// Returns `None` once the run has no incomplete nodes left, or on
    /// shutdown. While every remaining node is blocked on a dependency, the
    /// caller sleeps until some other worker completes a node.
    pub(crate) fn next_runnable_node(&self) -> Option<NodeHandle> {
        let mut state = self.lock_state();
        loop {
            if self.is_shutdown() {
                return None;
            }

            match state.claim_next() {
                Claim::Node(node) => return Some(node),
                Claim::Finished => return None,
                Claim::Blocked => {
                    state = self
                        .work_cv
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }

    /// Mark `node` done and wake every worker, since its completion may
    /// unblock dependents.
    pub(crate) fn finish_node(&self, node: &NodeHandle, timing: NodeTiming) {
        {
            let mut state = self.lock_state();
            state.complete(node, timing);
        }
        self.work_cv.notify_all();
    }

    /// If the current run has no incomplete nodes, publish it as complete.
    pub(crate) fn publish_if_finished(&self) {
        let finished_run = {
            let state = self.lock_state();
            state.is_finished().then(|| state.run_id())
        };

        if let Some(run_id) = finished_run {
            self.mark_complete(run_id);
        }
    }

    fn mark_complete(&self, run_id: u64) {
        let mut done = self
            .completed_through
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if run_id > *done {
            *done = run_id;
        }
        self.completion_cv.notify_all();
    }

    /// Block until run `run_id` (or a later one) has been published complete.
    pub(crate) fn wait_for_completion(&self, run_id: u64) {
        let done = self
            .completed_through
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let _done = self
            .completion_cv
            .wait_while(done, |done| *done < run_id)
            .unwrap_or_else(PoisonError::into_inner);
    }
}
