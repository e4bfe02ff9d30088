// src/node.rs

//! The node interface the executor schedules against.
//!
//! The executor knows nothing about what a node computes. It only needs:
//! - how many inputs a node has and which upstream node feeds each one,
//! - where the node wants its input buffers staged before it runs,
//! - a `refresh` entry point.
//!
//! Nodes are shared between the caller and the worker threads through
//! [`NodeHandle`], which compares by identity rather than by value.

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tracing::trace;

use crate::gpu::{CommandBuffer, ComputeQueue};
use crate::types::ExecLocation;

/// A processing node with declared upstream inputs.
///
/// `refresh` takes `&self` because nodes are shared across worker threads;
/// implementations keep their output behind interior mutability. A node that
/// cannot compute anything useful should publish an empty output and return
/// normally. The executor does not interpret node failures.
pub trait FlowGraphNode: Send + Sync {
    /// Debug name used in logs and run summaries.
    fn name(&self) -> &str;

    fn input_count(&self) -> usize;

    /// Upstream node bound to input port `index`, if any.
    fn input(&self, index: usize) -> Option<NodeHandle>;

    /// Data currently bound to input port `index`, used for staging.
    fn input_data(&self, _index: usize) -> Option<Arc<dyn StagedBuffer>> {
        None
    }

    fn input_location(&self) -> ExecLocation {
        ExecLocation::DontCare
    }

    /// Recompute this node's outputs from its inputs.
    ///
    /// `cmd` and `queue` belong to the calling worker for its whole lifetime.
    fn refresh(&self, cmd: &mut dyn CommandBuffer, queue: &dyn ComputeQueue);
}

/// A buffer that can live in host memory, device memory, or both.
pub trait StagedBuffer: Send + Sync {
    /// Make the contents readable from the CPU. No-op if already resident.
    fn prepare_for_cpu_access(&self);

    /// Make the contents readable from the GPU. No-op if already resident.
    fn prepare_for_gpu_access(&self);
}

/// Shared, identity-compared reference to a node.
///
/// Two handles are equal only if they point at the same allocation.
#[derive(Clone)]
pub struct NodeHandle(Arc<dyn FlowGraphNode>);

impl NodeHandle {
    pub fn new<N: FlowGraphNode + 'static>(node: N) -> Self {
        Self(Arc::new(node))
    }

    pub fn from_arc(node: Arc<dyn FlowGraphNode>) -> Self {
        Self(node)
    }

    pub fn node(&self) -> &dyn FlowGraphNode {
        self.0.as_ref()
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    /// Iterate the non-null upstream nodes of this node.
    pub fn upstream(&self) -> impl Iterator<Item = NodeHandle> + '_ {
        (0..self.0.input_count()).filter_map(|i| self.0.input(i))
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }
}

impl PartialEq for NodeHandle {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for NodeHandle {}

impl Hash for NodeHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeHandle")
            .field(&self.0.name())
            .field(&self.addr())
            .finish()
    }
}

impl<N: FlowGraphNode + 'static> From<Arc<N>> for NodeHandle {
    fn from(node: Arc<N>) -> Self {
        Self(node)
    }
}

/// Stage every input buffer of `node` into the memory space it asked for.
///
/// Null inputs and inputs without data are skipped.
pub fn stage_inputs(node: &dyn FlowGraphNode) {
    let location = node.input_location();
    if location == ExecLocation::DontCare {
        return;
    }

    for i in 0..node.input_count() {
        let Some(data) = node.input_data(i) else {
            continue;
        };

        trace!(node = %node.name(), input = i, %location, "staging input");
        match location {
            ExecLocation::Cpu => data.prepare_for_cpu_access(),
            ExecLocation::Gpu => data.prepare_for_gpu_access(),
            ExecLocation::DontCare => {}
        }
    }
}

/// Smallest dependency-closed set containing every node in `nodes`.
///
/// `run_blocking` treats an upstream node outside the set it is given as
/// already satisfied, so callers that only know the nodes they want fresh
/// output from should pass them through this first.
pub fn dependency_closure<I>(nodes: I) -> HashSet<NodeHandle>
where
    I: IntoIterator<Item = Option<NodeHandle>>,
{
    let mut closed: HashSet<NodeHandle> = HashSet::new();
    let mut stack: Vec<NodeHandle> = nodes.into_iter().flatten().collect();

    while let Some(node) = stack.pop() {
        if !closed.insert(node.clone()) {
            continue;
        }
        stack.extend(node.upstream());
    }

    closed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{CommandBuffer, ComputeQueue};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Stub {
        name: String,
        inputs: Vec<Option<NodeHandle>>,
        data: Vec<Option<Arc<dyn StagedBuffer>>>,
        location: ExecLocation,
    }

    impl Stub {
        fn handle(name: &str, inputs: Vec<Option<NodeHandle>>) -> NodeHandle {
            NodeHandle::new(Stub {
                name: name.to_string(),
                inputs,
                data: Vec::new(),
                location: ExecLocation::DontCare,
            })
        }
    }

    impl FlowGraphNode for Stub {
        fn name(&self) -> &str {
            &self.name
        }

        fn input_count(&self) -> usize {
            self.inputs.len()
        }

        fn input(&self, index: usize) -> Option<NodeHandle> {
            self.inputs.get(index).cloned().flatten()
        }

        fn input_data(&self, index: usize) -> Option<Arc<dyn StagedBuffer>> {
            self.data.get(index).cloned().flatten()
        }

        fn input_location(&self) -> ExecLocation {
            self.location
        }

        fn refresh(&self, _cmd: &mut dyn CommandBuffer, _queue: &dyn ComputeQueue) {}
    }

    #[derive(Default)]
    struct CountingBuffer {
        cpu: AtomicUsize,
        gpu: AtomicUsize,
    }

    impl StagedBuffer for CountingBuffer {
        fn prepare_for_cpu_access(&self) {
            self.cpu.fetch_add(1, Ordering::SeqCst);
        }

        fn prepare_for_gpu_access(&self) {
            self.gpu.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn handles_compare_by_identity() {
        let a = Stub::handle("same", vec![]);
        let b = Stub::handle("same", vec![]);

        assert_eq!(a, a.clone());
        assert_ne!(a, b);

        let set: HashSet<NodeHandle> = [a.clone(), a.clone(), b].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn closure_pulls_in_transitive_upstream_and_skips_nulls() {
        let a = Stub::handle("a", vec![]);
        let b = Stub::handle("b", vec![Some(a.clone()), None]);
        let c = Stub::handle("c", vec![Some(b.clone())]);
        let unrelated = Stub::handle("x", vec![]);

        let closed = dependency_closure([Some(c.clone()), None]);

        assert_eq!(closed.len(), 3);
        assert!(closed.contains(&a));
        assert!(closed.contains(&b));
        assert!(closed.contains(&c));
        assert!(!closed.contains(&unrelated));
    }

    #[test]
    fn staging_follows_location_preference() {
        let buf = Arc::new(CountingBuffer::default());
        let data: Vec<Option<Arc<dyn StagedBuffer>>> =
            vec![Some(buf.clone() as Arc<dyn StagedBuffer>), None];

        let gpu_node = Stub {
            name: "gpu".into(),
            inputs: vec![None, None],
            data: data.clone(),
            location: ExecLocation::Gpu,
        };
        stage_inputs(&gpu_node);
        assert_eq!(buf.gpu.load(Ordering::SeqCst), 1);
        assert_eq!(buf.cpu.load(Ordering::SeqCst), 0);

        let indifferent = Stub {
            name: "any".into(),
            inputs: vec![None, None],
            data,
            location: ExecLocation::DontCare,
        };
        stage_inputs(&indifferent);
        assert_eq!(buf.gpu.load(Ordering::SeqCst), 1);
        assert_eq!(buf.cpu.load(Ordering::SeqCst), 0);
    }
}
