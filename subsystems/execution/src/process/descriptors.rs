//! # Mutex Descriptors
//!
//! Per-process list of open mutexes. Entries stay packed at the front in
//! the order they were opened; closing one shifts the rest down.

use crate::config::MUTEXES_PER_PROCESS;
use crate::{ExecError, ExecResult, MutexId};

/// Ordered, bounded set of mutex ids a process has open
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutexDescriptors {
    ids: heapless::Vec<MutexId, MUTEXES_PER_PROCESS>,
}

impl MutexDescriptors {
    /// Create an empty descriptor table
    pub const fn new() -> Self {
        Self {
            ids: heapless::Vec::new(),
        }
    }

    /// Add `id`; adding an id that is already present is a no-op
    pub fn insert(&mut self, id: MutexId) -> ExecResult<()> {
        if self.contains(id) {
            return Ok(());
        }
        self.ids.push(id).map_err(|_| ExecError::TooManyOpenMutexes)
    }

    /// Remove `id`, compacting the remaining entries
    pub fn remove(&mut self, id: MutexId) -> bool {
        match self.ids.iter().position(|&open| open == id) {
            Some(index) => {
                self.ids.remove(index);
                true
            }
            None => false,
        }
    }

    /// Check whether `id` is open
    pub fn contains(&self, id: MutexId) -> bool {
        self.ids.contains(&id)
    }

    /// Oldest open mutex
    pub fn first(&self) -> Option<MutexId> {
        self.ids.first().copied()
    }

    /// Check if no further mutex can be opened
    pub fn is_full(&self) -> bool {
        self.ids.is_full()
    }

    /// Number of open mutexes
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Check if nothing is open
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Open mutexes in open order
    pub fn as_slice(&self) -> &[MutexId] {
        &self.ids
    }
}
