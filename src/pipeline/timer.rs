//! Single-threaded timer queue
//!
//! Timers are keyed by sample position. The session drains due timers at
//! the start of every render chunk; a cancelled timer never fires.

use std::collections::{BTreeMap, HashMap};

/// Handle for a scheduled timer, never reused within a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

pub struct TimerQueue<E> {
    /// Ordered by (due time, scheduling order)
    pending: BTreeMap<(u64, TimerId), E>,
    due_times: HashMap<TimerId, u64>,
    next_id: u64,
}

impl<E> TimerQueue<E> {
    pub fn new() -> Self {
        Self {
            pending: BTreeMap::new(),
            due_times: HashMap::new(),
            next_id: 0,
        }
    }

    /// Schedule `event` to fire at sample position `at`
    pub fn schedule(&mut self, at: u64, event: E) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.pending.insert((at, id), event);
        self.due_times.insert(id, at);
        id
    }

    /// Cancel a timer; returns false if it already fired or was cancelled
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.due_times.remove(&id) {
            Some(at) => self.pending.remove(&(at, id)).is_some(),
            None => false,
        }
    }

    /// Due time of the earliest pending timer
    pub fn next_due(&self) -> Option<u64> {
        self.pending.keys().next().map(|&(at, _)| at)
    }

    /// Remove and return the earliest timer due at or before `now`
    pub fn pop_due(&mut self, now: u64) -> Option<(u64, TimerId, E)> {
        let &(at, id) = self.pending.keys().next()?;
        if at > now {
            return None;
        }
        let event = self.pending.remove(&(at, id))?;
        self.due_times.remove(&id);
        Some((at, id, event))
    }

    pub fn is_scheduled(&self, id: TimerId) -> bool {
        self.due_times.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.due_times.clear();
    }
}

impl<E> Default for TimerQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}
