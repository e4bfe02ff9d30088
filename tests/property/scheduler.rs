use std::collections::BTreeSet;
use std::sync::Arc;

use filtergraph::{ExecutorConfig, FilterGraphExecutor, NodeHandle};
use filtergraph_test_utils::builders::{GraphBuilder, MockGraph};
use filtergraph_test_utils::within_5s;
use proptest::prelude::*;

// Strategy to generate a random acyclic graph.
// We ensure acyclicity by only allowing node N to depend on nodes 0..N-1.
fn dag_strategy(max_nodes: usize) -> impl Strategy<Value = (DagShape, usize)> {
    (1..=max_nodes).prop_flat_map(|num_nodes| {
        let deps_strat = proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_nodes),
            num_nodes,
        );
        let pool = 1..=6usize;

        (deps_strat, pool).prop_map(|(raw_deps, pool)| {
            let deps = raw_deps
                .into_iter()
                .enumerate()
                .map(|(i, potential)| {
                    // Sanitize dependencies: only allow deps < i
                    if i == 0 {
                        BTreeSet::new()
                    } else {
                        potential.into_iter().map(|d| d % i).collect()
                    }
                })
                .collect();
            (DagShape { deps }, pool)
        })
    })
}

/// Dependency lists by node index, kept separate from the built graph so
/// proptest can print a failing case.
#[derive(Debug, Clone)]
struct DagShape {
    deps: Vec<BTreeSet<usize>>,
}

impl DagShape {
    fn name(i: usize) -> String {
        format!("node_{i}")
    }

    fn build(&self) -> MockGraph {
        let mut builder = GraphBuilder::new();
        for (i, deps) in self.deps.iter().enumerate() {
            let dep_names: Vec<String> = deps.iter().map(|&d| Self::name(d)).collect();
            let dep_refs: Vec<&str> = dep_names.iter().map(String::as_str).collect();
            builder = builder.node(&Self::name(i), &dep_refs);
        }
        builder.build()
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn every_node_runs_once_after_its_inputs(
        (shape, pool) in dag_strategy(12),
        nulls in 0..3usize,
    ) {
        let graph = shape.build();
        let exec = FilterGraphExecutor::with_host_backend(&ExecutorConfig::with_workers(pool))
            .expect("executor should start");

        let mut nodes: Vec<Option<NodeHandle>> = graph.handles().into_iter().map(Some).collect();
        nodes.extend(std::iter::repeat_n(None, nulls));
        within_5s(move || exec.run_blocking(nodes));

        let r = &graph.recorder;
        prop_assert_eq!(r.total_refreshes(), shape.deps.len());
        prop_assert!(r.max_concurrency() <= pool);

        for (i, deps) in shape.deps.iter().enumerate() {
            let name = DagShape::name(i);
            prop_assert_eq!(r.refresh_count(&name), 1, "{} refreshed wrong number of times", name);
            for &d in deps {
                let dep = DagShape::name(d);
                prop_assert!(
                    r.finished_before(&dep, &name),
                    "{} started before its input {} finished", name, dep
                );
            }
        }
    }

    #[test]
    fn repeated_runs_stay_consistent((shape, pool) in dag_strategy(8)) {
        let graph = shape.build();
        let exec = Arc::new(
            FilterGraphExecutor::with_host_backend(&ExecutorConfig::with_workers(pool))
                .expect("executor should start"),
        );

        for round in 1..=3u64 {
            let exec = Arc::clone(&exec);
            let nodes = graph.handles();
            within_5s(move || exec.run_blocking(nodes));

            prop_assert_eq!(
                graph.recorder.total_refreshes(),
                shape.deps.len() * round as usize
            );
        }

        prop_assert_eq!(exec.last_run().map(|s| s.run_id), Some(3));
    }
}
