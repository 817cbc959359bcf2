//! Priority queue of pending task ids
//!
//! Ordered by priority weight (highest first) and then by creation order,
//! so a retried task goes back to the slot it had when first scheduled.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use super::task::{CalculationTask, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct QueueKey {
    weight: Reverse<u8>,
    sequence: u64,
}

impl QueueKey {
    fn of(task: &CalculationTask) -> Self {
        Self {
            weight: Reverse(task.priority.weight()),
            sequence: task.sequence,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct TaskQueue {
    order: BTreeMap<QueueKey, TaskId>,
    keys: HashMap<TaskId, QueueKey>,
}

impl TaskQueue {
    pub fn push(&mut self, task: &CalculationTask) {
        let key = QueueKey::of(task);
        if let Some(previous) = self.keys.insert(task.id.clone(), key) {
            self.order.remove(&previous);
        }
        self.order.insert(key, task.id.clone());
    }

    pub fn remove(&mut self, id: &TaskId) -> bool {
        match self.keys.remove(id) {
            Some(key) => {
                self.order.remove(&key);
                true
            }
            None => false,
        }
    }

    /// Ids in dispatch order
    pub fn iter(&self) -> impl Iterator<Item = &TaskId> {
        self.order.values()
    }

    /// Remove and return every id, in dispatch order
    pub fn drain(&mut self) -> Vec<TaskId> {
        self.keys.clear();
        std::mem::take(&mut self.order).into_values().collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }
}
