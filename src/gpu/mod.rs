// src/gpu/mod.rs

//! Compute queue abstraction handed to nodes.
//!
//! Each worker thread asks the [`QueueManager`] for one queue at startup and
//! allocates one command buffer from it. Both stay private to that worker for
//! its whole lifetime, so no GPU submission path is ever shared between
//! threads.
//!
//! - [`host`] provides `HostQueueManager`, which runs everything in host
//!   memory. It is the default backend and the one the tests use.

use std::sync::Arc;

use crate::errors::Result;

pub mod host;

pub use host::HostQueueManager;

/// A recorded list of commands for one submission.
pub trait CommandBuffer: Send {
    /// Drop everything recorded so far.
    fn reset(&mut self);

    /// Record a named command.
    fn record(&mut self, command: &str);

    /// Number of commands recorded since the last reset or submit.
    fn recorded(&self) -> usize;
}

/// A queue that can execute command buffers.
pub trait ComputeQueue: Send + Sync {
    fn label(&self) -> &str;

    fn create_command_buffer(&self) -> Result<Box<dyn CommandBuffer>>;

    /// Submit `cmd` and block the calling thread until it has executed.
    fn submit_and_block(&self, cmd: &mut dyn CommandBuffer) -> Result<()>;
}

/// Hands out compute queues.
pub trait QueueManager: Send + Sync {
    /// Get a queue for a worker. `debug_label` names the worker in driver
    /// tooling and logs.
    fn get_compute_queue(&self, debug_label: &str) -> Result<Arc<dyn ComputeQueue>>;
}
