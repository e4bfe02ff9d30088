// src/exec/worker.rs

//! Worker thread body.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Instant;

use tracing::{debug, error, info, trace};

use crate::errors::Result;
use crate::exec::shared::Shared;
use crate::gpu::{CommandBuffer, ComputeQueue, QueueManager};
use crate::node::{NodeHandle, stage_inputs};
use crate::stats::NodeTiming;

/// Startup report sent back to the executor constructor.
pub(crate) type StartupReport = (usize, Result<()>);

/// Compute resources owned by one worker for its whole lifetime.
struct WorkerResources {
    queue: Arc<dyn ComputeQueue>,
    cmd: Box<dyn CommandBuffer>,
}

impl WorkerResources {
    fn acquire(queues: &dyn QueueManager, label: &str) -> Result<Self> {
        let queue = queues.get_compute_queue(label)?;
        let cmd = queue.create_command_buffer()?;
        Ok(Self { queue, cmd })
    }
}

pub(crate) struct Worker {
    index: usize,
    shared: Arc<Shared>,
    resources: WorkerResources,
}

impl Worker {
    /// Thread entry point.
    ///
    /// Acquires the worker's queue and command buffer, reports the result on
    /// `ready`, then serves runs until shutdown. A worker that cannot get its
    /// resources exits immediately; the constructor turns that into an error.
    pub(crate) fn spawn_body(
        index: usize,
        label: String,
        shared: Arc<Shared>,
        queues: Arc<dyn QueueManager>,
        ready: mpsc::Sender<StartupReport>,
    ) {
        let resources = match WorkerResources::acquire(queues.as_ref(), &label) {
            Ok(r) => r,
            Err(e) => {
                error!(worker = index, error = %e, "failed to acquire compute resources");
                let _ = ready.send((index, Err(e)));
                return;
            }
        };

        debug!(worker = index, queue = %resources.queue.label(), "worker ready");
        if ready.send((index, Ok(()))).is_err() {
            // Constructor already gave up on the pool.
            return;
        }
        drop(ready);

        let mut worker = Worker {
            index,
            shared,
            resources,
        };
        worker.run();
    }

    fn run(&mut self) {
        loop {
            {
                let state = self.shared.wait_for_work();
                if self.shared.is_shutdown() {
                    break;
                }
                if !state.has_pending_work() {
                    continue;
                }
            }

            while let Some(node) = self.shared.next_runnable_node() {
                let timing = self.execute(&node);
                self.shared.finish_node(&node, timing);
            }

            self.shared.publish_if_finished();
        }

        info!(worker = self.index, "worker shutting down");
    }

    fn execute(&mut self, node: &NodeHandle) -> NodeTiming {
        let name = node.name().to_string();
        trace!(worker = self.index, node = %name, "refresh start");

        let started = Instant::now();
        let WorkerResources { queue, cmd } = &mut self.resources;
        // Staging calls into buffer code and is contained like refresh.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            stage_inputs(node.node());
            node.node().refresh(&mut **cmd, &**queue)
        }));
        let elapsed = started.elapsed();

        if let Err(payload) = outcome {
            error!(
                worker = self.index,
                node = %name,
                panic = %panic_message(payload.as_ref()),
                "node panicked during staging or refresh; treating it as completed"
            );
            cmd.reset();
        }

        trace!(
            worker = self.index,
            node = %name,
            elapsed_us = elapsed.as_micros() as u64,
            "refresh done"
        );

        NodeTiming {
            node: name,
            worker: self.index,
            elapsed,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
