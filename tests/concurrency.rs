use std::sync::{Arc, Barrier};

use filtergraph::{ExecutorConfig, FilterGraphExecutor};
use filtergraph_test_utils::builders::{GraphBuilder, MockBehaviour};
use filtergraph_test_utils::{init_tracing, within_5s};

#[test]
fn independent_nodes_use_the_whole_pool() {
    init_tracing();
    const POOL: usize = 4;

    // Every node waits on the barrier, so the run can only finish if all
    // POOL nodes are refreshing at the same time.
    let barrier = Arc::new(Barrier::new(POOL));
    let mut builder = GraphBuilder::new();
    for i in 0..POOL {
        builder = builder.node_behaving(
            &format!("n{i}"),
            &[],
            MockBehaviour::barrier(Arc::clone(&barrier)),
        );
    }
    let graph = builder.build();

    let exec = FilterGraphExecutor::with_host_backend(&ExecutorConfig::with_workers(POOL))
        .expect("executor should start");
    let handles = graph.handles();
    within_5s(move || exec.run_blocking(handles));

    assert_eq!(graph.recorder.total_refreshes(), POOL);
    assert_eq!(graph.recorder.max_concurrency(), POOL);
}

#[test]
fn never_more_nodes_in_flight_than_workers() {
    init_tracing();
    const POOL: usize = 3;

    let mut builder = GraphBuilder::new();
    for i in 0..12 {
        builder = builder.node_behaving(&format!("n{i}"), &[], MockBehaviour::delay(10));
    }
    let graph = builder.build();

    let exec = FilterGraphExecutor::with_host_backend(&ExecutorConfig::with_workers(POOL))
        .expect("executor should start");
    let handles = graph.handles();
    within_5s(move || exec.run_blocking(handles));

    assert_eq!(graph.recorder.total_refreshes(), 12);
    assert!(graph.recorder.max_concurrency() <= POOL);
    assert!(graph.recorder.max_concurrency() > 1);
}

#[test]
fn fan_out_after_a_shared_root() {
    init_tracing();
    let mut builder = GraphBuilder::new().node("root", &[]);
    for i in 0..6 {
        builder = builder.node_behaving(&format!("leaf{i}"), &["root"], MockBehaviour::delay(5));
    }
    let graph = builder.build();

    let exec = FilterGraphExecutor::with_host_backend(&ExecutorConfig::with_workers(4))
        .expect("executor should start");
    let handles = graph.handles();
    within_5s(move || exec.run_blocking(handles));

    for i in 0..6 {
        assert!(graph.recorder.finished_before("root", &format!("leaf{i}")));
    }
    assert_eq!(graph.recorder.start_order()[0], "root");
}
