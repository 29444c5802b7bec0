//! Work and result queues hosted by the master
//!
//! Every item moves Pending → Delivered → Done. Delivered items are leased to
//! the node that pulled them. A lease goes back to Pending when its node
//! disconnects or, if a timeout is configured, when it grows stale.
//!
//! All state sits behind one mutex and no critical section awaits, so pull
//! and complete are atomic with respect to every connection task.

use crate::coordinator::WorkItem;
use num_bigint::BigInt;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Append-only sink for weighted results
#[derive(Debug, Default)]
pub struct ResultQueue {
    values: Mutex<Vec<BigInt>>,
}

impl ResultQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, value: BigInt) {
        lock(&self.values).push(value);
    }

    /// Take every result pushed so far
    pub fn drain_all(&self) -> Vec<BigInt> {
        std::mem::take(&mut *lock(&self.values))
    }

    pub fn len(&self) -> usize {
        lock(&self.values).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Snapshot of queue counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub total: usize,
    pub pending: usize,
    pub delivered: usize,
    pub done: usize,
}

#[derive(Debug)]
struct Lease {
    node: String,
    item: WorkItem,
    since: Instant,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<WorkItem>,
    leased: HashMap<usize, Lease>,
    done: HashSet<usize>,
    total: usize,
}

impl QueueState {
    fn is_finished(&self) -> bool {
        self.done.len() == self.total
    }
}

/// Shared work queue with leases and a join barrier
#[derive(Debug, Default)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    results: ResultQueue,
    finished: Notify,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pending item
    pub fn put(&self, item: WorkItem) {
        let mut state = lock(&self.state);
        state.total += 1;
        state.pending.push_back(item);
    }

    /// Hand the next pending item to `node`, or `None` when nothing is pending
    ///
    /// Items leased to other nodes are not handed out again until they are
    /// released or expire.
    pub fn try_pull(&self, node: &str) -> Option<WorkItem> {
        let mut state = lock(&self.state);
        let item = state.pending.pop_front()?;

        debug!("item {} leased to {}", item.index, node);
        state.leased.insert(
            item.index,
            Lease {
                node: node.to_string(),
                item: item.clone(),
                since: Instant::now(),
            },
        );
        Some(item)
    }

    /// Record the result of item `index`
    ///
    /// Returns `false` and records nothing if the item is unknown or already
    /// done. A result for an item that was re-queued in the meantime is
    /// accepted and the item leaves the pending list.
    pub fn complete(&self, index: usize, value: BigInt) -> bool {
        let mut state = lock(&self.state);

        if state.done.contains(&index) {
            debug!("ignoring duplicate result for item {}", index);
            return false;
        }

        if state.leased.remove(&index).is_none() {
            let before = state.pending.len();
            state.pending.retain(|item| item.index != index);
            if state.pending.len() == before {
                warn!("ignoring result for unknown item {}", index);
                return false;
            }
        }

        self.results.push(value);
        state.done.insert(index);

        if state.is_finished() {
            self.finished.notify_waiters();
        }
        true
    }

    /// Return every item leased to `node` to the front of the queue
    pub fn release(&self, node: &str) -> usize {
        let mut state = lock(&self.state);

        let mut indices: Vec<usize> = state
            .leased
            .iter()
            .filter(|(_, lease)| lease.node == node)
            .map(|(&index, _)| index)
            .collect();
        indices.sort_unstable();

        for &index in indices.iter().rev() {
            if let Some(lease) = state.leased.remove(&index) {
                state.pending.push_front(lease.item);
            }
        }

        if !indices.is_empty() {
            warn!("re-queued {} item(s) leased to {}", indices.len(), node);
        }
        indices.len()
    }

    /// Return every lease older than `timeout` to the queue
    pub fn requeue_expired(&self, timeout: Duration) -> usize {
        let mut state = lock(&self.state);

        let expired: Vec<usize> = state
            .leased
            .iter()
            .filter(|(_, lease)| lease.since.elapsed() >= timeout)
            .map(|(&index, _)| index)
            .collect();

        for index in &expired {
            if let Some(lease) = state.leased.remove(index) {
                warn!(
                    "lease on item {} held by {} expired after {:?}, re-queueing",
                    index, lease.node, timeout
                );
                state.pending.push_back(lease.item);
            }
        }
        expired.len()
    }

    /// Wait until every item put so far is done
    pub async fn join(&self) {
        loop {
            // register before checking so a completion in between is not lost
            let notified = self.finished.notified();
            if self.is_finished() {
                return;
            }
            notified.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        lock(&self.state).is_finished()
    }

    pub fn progress(&self) -> Progress {
        let state = lock(&self.state);
        Progress {
            total: state.total,
            pending: state.pending.len(),
            delivered: state.leased.len(),
            done: state.done.len(),
        }
    }

    pub fn results(&self) -> &ResultQueue {
        &self.results
    }
}

/// Lock a mutex, recovering the data if a holder panicked
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
