// src/dag/resolver.rs

//! Dependency resolution for a single run.

use std::collections::HashSet;

use tracing::trace;

use crate::node::NodeHandle;

/// Compute the nodes that may start right now.
///
/// A node is runnable when it is incomplete, not already running, and none
/// of its upstream nodes is still incomplete. Null inputs and upstream nodes
/// that are not part of the run at all count as satisfied.
///
/// This only checks that upstream nodes are no longer scheduled for this
/// run; it never looks at whether their output actually changed. Nodes on a
/// cycle are never returned.
pub fn recompute_runnable(
    incomplete: &HashSet<NodeHandle>,
    running: &HashSet<NodeHandle>,
) -> HashSet<NodeHandle> {
    let runnable: HashSet<NodeHandle> = incomplete
        .iter()
        .filter(|node| !running.contains(*node))
        .filter(|node| deps_satisfied(node, incomplete))
        .cloned()
        .collect();

    trace!(
        incomplete = incomplete.len(),
        running = running.len(),
        runnable = runnable.len(),
        "recomputed runnable set"
    );

    runnable
}

/// Whether every upstream node of `node` has left the incomplete set.
pub fn deps_satisfied(node: &NodeHandle, incomplete: &HashSet<NodeHandle>) -> bool {
    node.upstream().all(|dep| !incomplete.contains(&dep))
}
