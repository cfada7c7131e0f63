//! Priority-ordered pending queue.

use std::collections::BTreeMap;
use taskpool_core::{Priority, SharedTask};

/// Position of a task in the queue: priority first, then admission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct QueueKey {
    priority: Priority,
    seq: u64,
}

/// Multiset of admitted tasks, drained HIGH before MEDIUM before LOW.
#[derive(Debug, Default)]
pub(crate) struct PendingQueue {
    entries: BTreeMap<QueueKey, SharedTask>,
    next_seq: u64,
}

impl PendingQueue {
    pub(crate) fn push(&mut self, task: SharedTask) -> QueueKey {
        let key = QueueKey {
            priority: task.priority(),
            seq: self.next_seq,
        };
        self.next_seq = self.next_seq.wrapping_add(1);
        self.entries.insert(key, task);
        key
    }

    pub(crate) fn remove(&mut self, key: QueueKey) -> Option<SharedTask> {
        self.entries.remove(&key)
    }

    /// Ordered copy of the queue; later admissions do not affect it.
    pub(crate) fn snapshot(&self) -> Vec<(QueueKey, SharedTask)> {
        self.entries
            .iter()
            .map(|(key, task)| (*key, SharedTask::clone(task)))
            .collect()
    }

    pub(crate) fn tasks(&self) -> Vec<SharedTask> {
        self.entries.values().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Sum of pending durations.
    pub(crate) fn total_load(&self) -> u64 {
        self.entries
            .values()
            .fold(0u64, |acc, task| acc.saturating_add(task.duration_ms()))
    }
}
