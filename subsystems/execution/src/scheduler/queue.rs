//! # Process Queues
//!
//! Bounded FIFO queues of process ids. The same type backs the ready queue,
//! the sleep queue and every mutex wait queue. A queue can never hold more
//! entries than there are process slots, and a process is linked into at most
//! one queue at a time, so pushes cannot overflow.

use crate::config::MAX_PROCESSES;
use crate::{MutexId, ProcessId};
use heapless::Deque;

/// Which queue a process is linked into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueTag {
    /// Ready to run
    Ready,
    /// Sleeping on the clock
    Sleep,
    /// Waiting for a mutex
    MutexWait(MutexId),
}

/// Simple FIFO process queue
#[derive(Debug)]
pub struct ProcessQueue {
    tag: QueueTag,
    entries: Deque<ProcessId, MAX_PROCESSES>,
}

impl ProcessQueue {
    /// Create a new FIFO queue
    pub const fn new(tag: QueueTag) -> Self {
        Self {
            tag,
            entries: Deque::new(),
        }
    }

    /// Tag recorded on members of this queue
    pub fn tag(&self) -> QueueTag {
        self.tag
    }

    /// Append at the tail
    pub fn push_back(&mut self, id: ProcessId) {
        if self.entries.push_back(id).is_err() {
            // Unreachable while each process sits on at most one queue
            log::error!("{:?} queue overflow dropping pid {}", self.tag, id);
            debug_assert!(false, "process queue overflow");
        }
    }

    /// Remove the head
    pub fn pop_front(&mut self) -> Option<ProcessId> {
        self.entries.pop_front()
    }

    /// Peek at the head
    pub fn front(&self) -> Option<ProcessId> {
        self.entries.front().copied()
    }

    /// Unlink `id` from anywhere in the queue, keeping the others in order
    pub fn remove(&mut self, id: ProcessId) -> bool {
        let mut found = false;
        for _ in 0..self.entries.len() {
            let Some(entry) = self.entries.pop_front() else {
                break;
            };
            if entry == id && !found {
                found = true;
            } else {
                let _ = self.entries.push_back(entry);
            }
        }
        found
    }

    /// Check membership
    pub fn contains(&self, id: ProcessId) -> bool {
        self.entries.iter().any(|&entry| entry == id)
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of queued processes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate from head to tail
    pub fn iter(&self) -> impl Iterator<Item = ProcessId> + '_ {
        self.entries.iter().copied()
    }

    /// Copy of the queue contents, head first
    pub fn snapshot(&self) -> heapless::Vec<ProcessId, MAX_PROCESSES> {
        self.iter().collect()
    }
}
