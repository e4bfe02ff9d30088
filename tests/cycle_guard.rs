use std::time::Duration;

use filtergraph::{ExecutorConfig, FilterGraphExecutor};
use filtergraph_test_utils::builders::GraphBuilder;
use filtergraph_test_utils::{init_tracing, with_timeout};

// A cycle is a caller error. The run never completes, and nothing in the
// cycle ever starts.
#[test]
fn cyclic_set_never_starts_and_never_returns() {
    init_tracing();
    let graph = GraphBuilder::new().node("A", &[]).node("B", &["A"]).build();
    graph.connect("B", "A");

    let exec = FilterGraphExecutor::with_host_backend(&ExecutorConfig::with_workers(2))
        .expect("executor should start");
    let handles = graph.handles();

    // The executor moves into the stuck helper thread and is never dropped.
    let finished = with_timeout(Duration::from_millis(500), move || {
        exec.run_blocking(handles)
    });

    assert!(finished.is_none(), "run over a cycle should not complete");
    assert_eq!(graph.recorder.total_refreshes(), 0);
}
