//! # Mutex Registry
//!
//! System-wide table of named mutexes. Names are unique among live mutexes;
//! ids come from a counter and are never reused.

use crate::config::{MAX_MUTEXES, MAX_PROCESSES, MUTEX_NAME_LEN};
use crate::scheduler::queue::{ProcessQueue, QueueTag};
use crate::slab::Slab;
use crate::{ExecError, ExecResult, MutexId, ProcessId};

/// Mutex name
pub type MutexName = heapless::String<MUTEX_NAME_LEN>;

/// Mutex flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutexKind {
    /// A second lock by the owner is rejected
    NonRecursive,
    /// The owner may lock again; each lock needs a matching unlock
    Recursive,
}

impl MutexKind {
    /// Decode the kind argument of the create-mutex call
    pub const fn from_raw(raw: u64) -> ExecResult<Self> {
        match raw {
            0 => Ok(Self::NonRecursive),
            1 => Ok(Self::Recursive),
            _ => Err(ExecError::InvalidArgument),
        }
    }
}

/// Lock state, derived from the hold count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// Nobody holds the mutex
    Unlocked,
    /// Held by the owner at least once
    Locked,
}

/// One registered mutex
#[derive(Debug)]
pub struct MutexRecord {
    id: MutexId,
    name: MutexName,
    kind: MutexKind,
    pub(crate) hold_count: u32,
    pub(crate) owner: Option<ProcessId>,
    pub(crate) open_count: usize,
    pub(crate) waiters: ProcessQueue,
}

impl MutexRecord {
    fn new(id: MutexId, name: MutexName, kind: MutexKind) -> Self {
        Self {
            id,
            name,
            kind,
            hold_count: 0,
            owner: None,
            open_count: 0,
            waiters: ProcessQueue::new(QueueTag::MutexWait(id)),
        }
    }

    /// Get the mutex ID
    pub fn id(&self) -> MutexId {
        self.id
    }

    /// Get the name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the kind
    pub fn kind(&self) -> MutexKind {
        self.kind
    }

    /// Current lock state
    pub fn state(&self) -> LockState {
        if self.hold_count == 0 {
            LockState::Unlocked
        } else {
            LockState::Locked
        }
    }

    /// Check if `pid` holds the lock
    pub fn is_owned_by(&self, pid: ProcessId) -> bool {
        self.owner == Some(pid) && self.hold_count > 0
    }

    /// Drop every hold and clear the owner
    pub(crate) fn release(&mut self) {
        self.hold_count = 0;
        self.owner = None;
    }

    /// Diagnostic snapshot
    pub fn info(&self) -> MutexInfo {
        MutexInfo {
            id: self.id,
            name: self.name.clone(),
            kind: self.kind,
            state: self.state(),
            hold_count: self.hold_count,
            owner: self.owner,
            open_count: self.open_count,
            waiters: self.waiters.snapshot(),
        }
    }
}

/// Read-only view of a mutex
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutexInfo {
    /// Mutex ID
    pub id: MutexId,
    /// Name
    pub name: MutexName,
    /// Kind
    pub kind: MutexKind,
    /// Lock state
    pub state: LockState,
    /// Times the owner has locked it
    pub hold_count: u32,
    /// Current owner
    pub owner: Option<ProcessId>,
    /// Processes that have it open
    pub open_count: usize,
    /// Blocked lockers, head first
    pub waiters: heapless::Vec<ProcessId, MAX_PROCESSES>,
}

/// Registry of live mutexes
#[derive(Debug)]
pub struct MutexRegistry {
    records: Slab<MutexRecord, MAX_MUTEXES>,
    next_id: u64,
}

impl MutexRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            records: Slab::new(),
            next_id: 0,
        }
    }

    /// Number of live mutexes
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if no mutex exists
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Check if no further mutex can be registered
    pub fn is_full(&self) -> bool {
        self.records.is_full()
    }

    fn slot_of(&self, id: MutexId) -> Option<usize> {
        self.records
            .iter()
            .find(|(_, record)| record.id == id)
            .map(|(slot, _)| slot)
    }

    /// Look up by id
    pub fn get(&self, id: MutexId) -> Option<&MutexRecord> {
        self.records.get(self.slot_of(id)?)
    }

    /// Look up by id, mutably
    pub fn get_mut(&mut self, id: MutexId) -> Option<&mut MutexRecord> {
        let slot = self.slot_of(id)?;
        self.records.get_mut(slot)
    }

    /// Look up by name
    pub fn by_name(&self, name: &str) -> Option<&MutexRecord> {
        self.records
            .iter()
            .map(|(_, record)| record)
            .find(|record| record.name == name)
    }

    /// Register a new, unopened mutex
    pub fn register(&mut self, name: MutexName, kind: MutexKind) -> ExecResult<MutexId> {
        if self.by_name(&name).is_some() {
            return Err(ExecError::DuplicateMutexName);
        }
        let id = MutexId::new(self.next_id);
        self.records
            .insert(MutexRecord::new(id, name, kind))
            .map_err(|_| ExecError::MutexRegistryFull)?;
        self.next_id += 1;
        Ok(id)
    }

    /// Remove a mutex from the registry
    pub fn remove(&mut self, id: MutexId) -> Option<MutexRecord> {
        let slot = self.slot_of(id)?;
        self.records.remove(slot)
    }
}

impl Default for MutexRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate and copy a mutex name
pub fn mutex_name(name: &str) -> ExecResult<MutexName> {
    if name.is_empty() {
        return Err(ExecError::InvalidArgument);
    }
    let mut owned = MutexName::new();
    owned.push_str(name).map_err(|_| ExecError::NameTooLong)?;
    Ok(owned)
}
