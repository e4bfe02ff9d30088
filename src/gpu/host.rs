// src/gpu/host.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, trace};

use crate::errors::{FilterGraphError, Result};
use crate::gpu::{CommandBuffer, ComputeQueue, QueueManager};

/// Queue manager that executes everything on the host.
///
/// `failing_after(n)` makes every request after the first `n` fail, which is
/// how worker-startup failure is exercised in tests.
#[derive(Debug, Default)]
pub struct HostQueueManager {
    issued: AtomicUsize,
    fail_after: Option<usize>,
}

impl HostQueueManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_after(n: usize) -> Self {
        Self {
            issued: AtomicUsize::new(0),
            fail_after: Some(n),
        }
    }

    /// Number of queues handed out so far.
    pub fn queues_issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }
}

impl QueueManager for HostQueueManager {
    fn get_compute_queue(&self, debug_label: &str) -> Result<Arc<dyn ComputeQueue>> {
        let index = self.issued.fetch_add(1, Ordering::SeqCst);

        if let Some(limit) = self.fail_after {
            if index >= limit {
                return Err(FilterGraphError::Gpu(format!(
                    "no compute queue available for '{debug_label}' ({limit} already issued)"
                )));
            }
        }

        debug!(label = %debug_label, index, "issued host compute queue");
        Ok(Arc::new(HostQueue {
            label: debug_label.to_string(),
        }))
    }
}

/// Host-side queue. Submissions complete synchronously.
#[derive(Debug)]
pub struct HostQueue {
    label: String,
}

impl ComputeQueue for HostQueue {
    fn label(&self) -> &str {
        &self.label
    }

    fn create_command_buffer(&self) -> Result<Box<dyn CommandBuffer>> {
        Ok(Box::new(HostCommandBuffer::default()))
    }

    fn submit_and_block(&self, cmd: &mut dyn CommandBuffer) -> Result<()> {
        trace!(queue = %self.label, commands = cmd.recorded(), "host submit");
        cmd.reset();
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct HostCommandBuffer {
    commands: Vec<String>,
}

impl CommandBuffer for HostCommandBuffer {
    fn reset(&mut self) {
        self.commands.clear();
    }

    fn record(&mut self, command: &str) {
        self.commands.push(command.to_string());
    }

    fn recorded(&self) -> usize {
        self.commands.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_drains_the_command_buffer() {
        let manager = HostQueueManager::new();
        let queue = manager.get_compute_queue("worker-0").unwrap();
        let mut cmd = queue.create_command_buffer().unwrap();

        cmd.record("dispatch fft");
        cmd.record("barrier");
        assert_eq!(cmd.recorded(), 2);

        queue.submit_and_block(&mut *cmd).unwrap();
        assert_eq!(cmd.recorded(), 0);
        assert_eq!(queue.label(), "worker-0");
    }

    #[test]
    fn failing_after_limits_issued_queues() {
        let manager = HostQueueManager::failing_after(1);

        assert!(manager.get_compute_queue("worker-0").is_ok());
        match manager.get_compute_queue("worker-1") {
            Err(FilterGraphError::Gpu(msg)) => assert!(msg.contains("worker-1")),
            Err(e) => panic!("expected Gpu error, got {e:?}"),
            Ok(_) => panic!("expected failure"),
        }
        assert_eq!(manager.queues_issued(), 2);
    }
}
