use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Condvar, Mutex};
use std::time::Duration;

use filtergraph::{
    CommandBuffer, ComputeQueue, ExecLocation, FlowGraphNode, NodeHandle, StagedBuffer,
};

use crate::recorder::ExecutionRecorder;

/// One-shot flag threads can block on.
#[derive(Debug, Default)]
pub struct Latch {
    set: Mutex<bool>,
    cv: Condvar,
}

impl Latch {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn release(&self) {
        *self.set.lock().unwrap() = true;
        self.cv.notify_all();
    }

    pub fn wait(&self) {
        let guard = self.set.lock().unwrap();
        let _guard = self.cv.wait_while(guard, |set| !*set).unwrap();
    }

    /// Returns `true` if the latch was released within `limit`.
    pub fn wait_timeout(&self, limit: Duration) -> bool {
        let guard = self.set.lock().unwrap();
        let (guard, _) = self.cv.wait_timeout_while(guard, limit, |set| !*set).unwrap();
        *guard
    }
}

/// What a mock node does inside `refresh`, besides recording itself.
#[derive(Clone, Default)]
pub struct MockBehaviour {
    /// Sleep this long while "computing".
    pub delay: Option<Duration>,
    /// Released when refresh starts, so tests know the node is in flight.
    pub entered: Option<Arc<Latch>>,
    /// Refresh blocks until this latch is released.
    pub hold: Option<Arc<Latch>>,
    /// All nodes sharing this barrier must be refreshing at once to proceed.
    pub barrier: Option<Arc<Barrier>>,
    /// Panic instead of producing output.
    pub panic: bool,
    /// Record a command and submit it on the worker's queue.
    pub submit: bool,
}

impl MockBehaviour {
    pub fn delay(ms: u64) -> Self {
        Self {
            delay: Some(Duration::from_millis(ms)),
            ..Self::default()
        }
    }

    pub fn held(entered: Arc<Latch>, hold: Arc<Latch>) -> Self {
        Self {
            entered: Some(entered),
            hold: Some(hold),
            ..Self::default()
        }
    }

    pub fn barrier(barrier: Arc<Barrier>) -> Self {
        Self {
            barrier: Some(barrier),
            ..Self::default()
        }
    }

    pub fn panicking() -> Self {
        Self {
            panic: true,
            ..Self::default()
        }
    }
}

/// Buffer that tracks where its contents currently live.
#[derive(Debug, Default)]
pub struct MockBuffer {
    residency: Mutex<(bool, bool)>,
    to_cpu: AtomicUsize,
    to_gpu: AtomicUsize,
    panic_on_stage: bool,
}

impl MockBuffer {
    /// A buffer that starts out resident on the CPU only.
    pub fn on_cpu() -> Arc<Self> {
        Arc::new(Self {
            residency: Mutex::new((true, false)),
            ..Self::default()
        })
    }

    /// A buffer that starts out resident on the GPU only.
    pub fn on_gpu() -> Arc<Self> {
        Arc::new(Self {
            residency: Mutex::new((false, true)),
            ..Self::default()
        })
    }

    /// A CPU-resident buffer whose staging calls panic.
    pub fn panicking() -> Arc<Self> {
        Arc::new(Self {
            residency: Mutex::new((true, false)),
            panic_on_stage: true,
            ..Self::default()
        })
    }

    pub fn cpu_resident(&self) -> bool {
        self.residency.lock().unwrap().0
    }

    pub fn gpu_resident(&self) -> bool {
        self.residency.lock().unwrap().1
    }

    /// Number of host-to-device copies performed.
    pub fn uploads(&self) -> usize {
        self.to_gpu.load(Ordering::SeqCst)
    }

    /// Number of device-to-host copies performed.
    pub fn downloads(&self) -> usize {
        self.to_cpu.load(Ordering::SeqCst)
    }
}

impl StagedBuffer for MockBuffer {
    fn prepare_for_cpu_access(&self) {
        if self.panic_on_stage {
            panic!("mock buffer failed to download");
        }
        let mut r = self.residency.lock().unwrap();
        if !r.0 {
            self.to_cpu.fetch_add(1, Ordering::SeqCst);
            r.0 = true;
        }
    }

    fn prepare_for_gpu_access(&self) {
        if self.panic_on_stage {
            panic!("mock buffer failed to upload");
        }
        let mut r = self.residency.lock().unwrap();
        if !r.1 {
            self.to_gpu.fetch_add(1, Ordering::SeqCst);
            r.1 = true;
        }
    }
}

/// Scriptable node used by the integration tests.
pub struct MockNode {
    name: String,
    inputs: Mutex<Vec<Option<NodeHandle>>>,
    data: Mutex<Vec<Option<Arc<MockBuffer>>>>,
    location: ExecLocation,
    behaviour: MockBehaviour,
    recorder: Arc<ExecutionRecorder>,
    /// Whether every input buffer was resident where requested at refresh time.
    inputs_were_staged: Mutex<Option<bool>>,
}

impl MockNode {
    /// Wire an extra input after construction (used to build cycles).
    pub fn add_input(&self, upstream: Option<NodeHandle>) {
        self.inputs.lock().unwrap().push(upstream);
    }

    pub fn bind_input_data(&self, index: usize, buffer: Arc<MockBuffer>) {
        let mut data = self.data.lock().unwrap();
        if data.len() <= index {
            data.resize(index + 1, None);
        }
        data[index] = Some(buffer);
    }

    /// `Some(true)` if the last refresh saw all inputs staged as requested.
    pub fn inputs_were_staged(&self) -> Option<bool> {
        *self.inputs_were_staged.lock().unwrap()
    }

    fn check_staging(&self) -> bool {
        let data = self.data.lock().unwrap();
        data.iter().flatten().all(|b| match self.location {
            ExecLocation::Cpu => b.cpu_resident(),
            ExecLocation::Gpu => b.gpu_resident(),
            ExecLocation::DontCare => true,
        })
    }
}

impl FlowGraphNode for MockNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_count(&self) -> usize {
        self.inputs.lock().unwrap().len()
    }

    fn input(&self, index: usize) -> Option<NodeHandle> {
        self.inputs.lock().unwrap().get(index).cloned().flatten()
    }

    fn input_data(&self, index: usize) -> Option<Arc<dyn StagedBuffer>> {
        self.data
            .lock()
            .unwrap()
            .get(index)
            .cloned()
            .flatten()
            .map(|b| b as Arc<dyn StagedBuffer>)
    }

    fn input_location(&self) -> ExecLocation {
        self.location
    }

    fn refresh(&self, cmd: &mut dyn CommandBuffer, queue: &dyn ComputeQueue) {
        self.recorder.started(&self.name);
        *self.inputs_were_staged.lock().unwrap() = Some(self.check_staging());

        let b = &self.behaviour;
        if let Some(entered) = &b.entered {
            entered.release();
        }
        if let Some(hold) = &b.hold {
            hold.wait();
        }
        if let Some(barrier) = &b.barrier {
            barrier.wait();
        }
        if let Some(delay) = b.delay {
            std::thread::sleep(delay);
        }
        if b.submit {
            cmd.record(&format!("dispatch {}", self.name));
            let _ = queue.submit_and_block(cmd);
        }

        // Record the finish before a deliberate panic so ordering checks
        // still see it.
        self.recorder.finished(&self.name);

        if b.panic {
            panic!("mock node '{}' failed", self.name);
        }
    }
}

/// A built set of mock nodes sharing one recorder.
pub struct MockGraph {
    pub recorder: Arc<ExecutionRecorder>,
    nodes: BTreeMap<String, Arc<MockNode>>,
}

impl MockGraph {
    pub fn node(&self, name: &str) -> Arc<MockNode> {
        Arc::clone(
            self.nodes
                .get(name)
                .unwrap_or_else(|| panic!("no mock node named '{name}'")),
        )
    }

    pub fn handle(&self, name: &str) -> NodeHandle {
        NodeHandle::from(self.node(name))
    }

    pub fn handles(&self) -> Vec<NodeHandle> {
        self.nodes.values().cloned().map(NodeHandle::from).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.nodes.keys().cloned().collect()
    }

    /// Make `to` depend on `from` after the graph is built.
    pub fn connect(&self, from: &str, to: &str) {
        self.node(to).add_input(Some(self.handle(from)));
    }
}

/// Builder for `MockGraph` to simplify test setup.
///
/// Dependencies must be added before their dependents.
pub struct GraphBuilder {
    recorder: Arc<ExecutionRecorder>,
    nodes: BTreeMap<String, Arc<MockNode>>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            recorder: Arc::new(ExecutionRecorder::new()),
            nodes: BTreeMap::new(),
        }
    }

    pub fn node(self, name: &str, deps: &[&str]) -> Self {
        self.node_with(name, deps, ExecLocation::DontCare, MockBehaviour::default())
    }

    pub fn node_behaving(self, name: &str, deps: &[&str], behaviour: MockBehaviour) -> Self {
        self.node_with(name, deps, ExecLocation::DontCare, behaviour)
    }

    pub fn node_at(self, name: &str, deps: &[&str], location: ExecLocation) -> Self {
        self.node_with(name, deps, location, MockBehaviour::default())
    }

    pub fn node_with(
        mut self,
        name: &str,
        deps: &[&str],
        location: ExecLocation,
        behaviour: MockBehaviour,
    ) -> Self {
        let inputs: Vec<Option<NodeHandle>> = deps
            .iter()
            .map(|d| {
                let upstream = self
                    .nodes
                    .get(*d)
                    .unwrap_or_else(|| panic!("dependency '{d}' must be added before '{name}'"));
                Some(NodeHandle::from(Arc::clone(upstream)))
            })
            .collect();

        let node = MockNode {
            name: name.to_string(),
            inputs: Mutex::new(inputs),
            data: Mutex::new(Vec::new()),
            location,
            behaviour,
            recorder: Arc::clone(&self.recorder),
            inputs_were_staged: Mutex::new(None),
        };
        self.nodes.insert(name.to_string(), Arc::new(node));
        self
    }

    /// Add a node with a null input port in front of its real dependencies.
    pub fn node_with_null_input(mut self, name: &str, deps: &[&str]) -> Self {
        self = self.node(name, deps);
        let node = Arc::clone(&self.nodes[name]);
        node.inputs.lock().unwrap().insert(0, None);
        self
    }

    pub fn build(self) -> MockGraph {
        MockGraph {
            recorder: self.recorder,
            nodes: self.nodes,
        }
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}
