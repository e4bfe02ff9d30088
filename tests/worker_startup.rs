use std::sync::Arc;

use filtergraph::{
    ExecutorConfig, FilterGraphError, FilterGraphExecutor, HostQueueManager, NoAnalysisCache,
};
use filtergraph_test_utils::init_tracing;

#[test]
fn queue_exhaustion_fails_construction() {
    init_tracing();
    let err = FilterGraphExecutor::new(
        &ExecutorConfig::with_workers(3),
        Arc::new(HostQueueManager::failing_after(1)),
        Arc::new(NoAnalysisCache),
    )
    .expect_err("only one queue is available for three workers");

    match err {
        FilterGraphError::WorkerInit { index, reason } => {
            assert!(index < 3);
            assert!(reason.contains("no compute queue"), "unexpected reason: {reason}");
        }
        other => panic!("expected WorkerInit, got {other:?}"),
    }
}

#[test]
fn zero_workers_is_a_config_error() {
    init_tracing();
    let err = FilterGraphExecutor::with_host_backend(&ExecutorConfig::with_workers(0))
        .expect_err("empty pool must be rejected");

    assert!(matches!(err, FilterGraphError::ConfigError(_)));
}

#[test]
fn workers_are_named_after_the_configured_prefix() {
    init_tracing();
    let config = ExecutorConfig {
        thread_name: "fg-test".to_string(),
        ..ExecutorConfig::with_workers(2)
    };
    let queues = Arc::new(HostQueueManager::new());
    let exec = FilterGraphExecutor::new(&config, queues.clone(), Arc::new(NoAnalysisCache))
        .expect("executor should start");

    assert_eq!(exec.worker_count(), 2);
    assert_eq!(queues.queues_issued(), 2);
    assert!(format!("{exec:?}").contains("FilterGraphExecutor"));
}

#[test]
fn drop_joins_idle_workers() {
    init_tracing();
    let exec = FilterGraphExecutor::with_host_backend(&ExecutorConfig::with_workers(4))
        .expect("executor should start");
    // Returning from drop at all means every worker observed shutdown.
    drop(exec);
}
