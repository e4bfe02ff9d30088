use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

/// One refresh boundary observed by the recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stamp {
    Start(u64),
    Finish(u64),
}

/// Records when mock nodes start and finish refreshing.
///
/// Every start and finish gets a sequence number from a single counter, so
/// "A finished before B started" is a plain integer comparison.
#[derive(Debug, Default)]
pub struct ExecutionRecorder {
    seq: AtomicU64,
    active: AtomicUsize,
    max_active: AtomicUsize,
    stamps: Mutex<HashMap<String, Vec<Stamp>>>,
    starts: Mutex<Vec<String>>,
}

impl ExecutionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn started(&self, node: &str) {
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        self.stamps
            .lock()
            .unwrap()
            .entry(node.to_string())
            .or_default()
            .push(Stamp::Start(seq));
        self.starts.lock().unwrap().push(node.to_string());
    }

    pub fn finished(&self, node: &str) {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        self.stamps
            .lock()
            .unwrap()
            .entry(node.to_string())
            .or_default()
            .push(Stamp::Finish(seq));
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    /// Number of times `node` started refreshing.
    pub fn refresh_count(&self, node: &str) -> usize {
        self.stamps
            .lock()
            .unwrap()
            .get(node)
            .map(|s| s.iter().filter(|s| matches!(s, Stamp::Start(_))).count())
            .unwrap_or(0)
    }

    pub fn total_refreshes(&self) -> usize {
        self.starts.lock().unwrap().len()
    }

    /// Node names in the order they started.
    pub fn start_order(&self) -> Vec<String> {
        self.starts.lock().unwrap().clone()
    }

    /// Highest number of nodes observed refreshing at the same time.
    pub fn max_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// True if `upstream` finished before `downstream` started, looking at
    /// the most recent refresh of each.
    pub fn finished_before(&self, upstream: &str, downstream: &str) -> bool {
        let stamps = self.stamps.lock().unwrap();
        let finish = stamps.get(upstream).and_then(|s| {
            s.iter().rev().find_map(|s| match s {
                Stamp::Finish(seq) => Some(*seq),
                Stamp::Start(_) => None,
            })
        });
        let start = stamps.get(downstream).and_then(|s| {
            s.iter().rev().find_map(|s| match s {
                Stamp::Start(seq) => Some(*seq),
                Stamp::Finish(_) => None,
            })
        });

        matches!((finish, start), (Some(f), Some(s)) if f < s)
    }
}
