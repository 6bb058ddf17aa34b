//! # Action History
//!
//! Bounded, insertion-ordered record of executed actions. When the capacity is
//! exceeded the oldest half is dropped in one go, so the cost of eviction is
//! amortised over many pushes.

use std::collections::VecDeque;

use crate::domain::types::ActionResult;

#[derive(Debug, Clone)]
pub struct ActionHistory {
    entries: VecDeque<ActionResult>,
    capacity: usize,
}

impl ActionHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn push(&mut self, result: ActionResult) {
        self.entries.push_back(result);
        if self.entries.len() > self.capacity {
            let keep = (self.capacity / 2).max(1);
            let evict = self.entries.len() - keep;
            self.entries.drain(..evict);
            tracing::debug!("Action history trimmed to {} entries", keep);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The most recent `limit` results, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<ActionResult> {
        let skip = self.entries.len().saturating_sub(limit);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn last(&self) -> Option<&ActionResult> {
        self.entries.back()
    }
}
