//! # Process Management
//!
//! Process control blocks and the process table.
//!
//! A process id is its slot in the table. Each control block records which
//! queue (if any) the process is linked into; linking goes through
//! [`ProcessTable`] so that tag and queue never disagree.

pub mod descriptors;
mod lifecycle;

pub use descriptors::MutexDescriptors;

use crate::config::{MAX_PROCESSES, PROGRAM_NAME_LEN};
use crate::scheduler::queue::{ProcessQueue, QueueTag};
use crate::slab::Slab;
use crate::sync::{MutexKind, MutexName};
use crate::{ExecError, ExecResult, MutexId, ProcessId};
use core::fmt;
use minikernel_hal::HardwareAbstractionLayer;

/// Program name as stored in a control block
pub type ProgramName = heapless::String<PROGRAM_NAME_LEN>;

/// Process state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Waiting on the ready queue
    Ready,
    /// Owns the CPU
    Running,
    /// Waiting for the clock or a mutex
    Blocked,
    /// Finished; the slot is reclaimed once the CPU has left it
    Terminated,
}

/// Work a blocked process still has to finish when it next runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resume {
    /// Sleep expired; the call returns 0
    Sleep,
    /// Retry acquiring the mutex
    Lock(MutexId),
    /// Ownership was handed over while waiting; the lock returns 0
    Acquired,
    /// Retry creating a mutex after the registry was full
    CreateMutex {
        /// Requested name
        name: MutexName,
        /// Requested kind
        kind: MutexKind,
        /// Retries already made
        retries: u32,
    },
}

/// Process control block
pub struct ProcessControlBlock<H: HardwareAbstractionLayer> {
    id: ProcessId,
    program: ProgramName,
    pub(crate) state: ProcessState,
    pub(crate) context: H::Context,
    pub(crate) image: Option<H::Image>,
    pub(crate) stack: Option<H::Stack>,
    pub(crate) time_slice: u32,
    pub(crate) sleep_ticks: u32,
    pub(crate) mutexes: MutexDescriptors,
    pub(crate) queue: Option<QueueTag>,
    pub(crate) resume: Option<Resume>,
    pub(crate) pending_result: Option<i64>,
}

impl<H: HardwareAbstractionLayer> ProcessControlBlock<H> {
    pub(crate) fn new(
        id: ProcessId,
        program: ProgramName,
        context: H::Context,
        image: H::Image,
        stack: H::Stack,
        time_slice: u32,
    ) -> Self {
        Self {
            id,
            program,
            state: ProcessState::Ready,
            context,
            image: Some(image),
            stack: Some(stack),
            time_slice,
            sleep_ticks: 0,
            mutexes: MutexDescriptors::new(),
            queue: None,
            resume: None,
            pending_result: None,
        }
    }

    /// Get the process ID
    pub fn id(&self) -> ProcessId {
        self.id
    }

    /// Get the program name
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Get the current state
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Saved register context
    pub fn context(&self) -> &H::Context {
        &self.context
    }

    /// Diagnostic snapshot
    pub fn info(&self) -> ProcessInfo {
        ProcessInfo {
            id: self.id,
            program: self.program.clone(),
            state: self.state,
            open_mutexes: self.mutexes.clone(),
            time_slice: self.time_slice,
            sleep_ticks: self.sleep_ticks,
            queue: self.queue,
            resume: self.resume.clone(),
        }
    }
}

impl<H: HardwareAbstractionLayer> fmt::Debug for ProcessControlBlock<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessControlBlock")
            .field("id", &self.id)
            .field("program", &self.program)
            .field("state", &self.state)
            .field("queue", &self.queue)
            .field("mutexes", &self.mutexes)
            .finish_non_exhaustive()
    }
}

/// Read-only view of a process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    /// Process ID
    pub id: ProcessId,
    /// Program the process was created from
    pub program: ProgramName,
    /// Current state
    pub state: ProcessState,
    /// Open mutexes in open order
    pub open_mutexes: MutexDescriptors,
    /// Remaining quantum in ticks
    pub time_slice: u32,
    /// Remaining sleep in ticks
    pub sleep_ticks: u32,
    /// Queue the process is linked into
    pub queue: Option<QueueTag>,
    /// Pending work for a blocked process
    pub resume: Option<Resume>,
}

/// Process table
pub struct ProcessTable<H: HardwareAbstractionLayer> {
    slots: Slab<ProcessControlBlock<H>, MAX_PROCESSES>,
}

impl<H: HardwareAbstractionLayer> ProcessTable<H> {
    /// Create an empty table
    pub fn new() -> Self {
        Self { slots: Slab::new() }
    }

    /// Lowest free process id
    pub fn vacant_id(&self) -> Option<ProcessId> {
        self.slots.vacant_key().map(ProcessId::new)
    }

    /// Number of live control blocks
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Get a control block
    pub fn get(&self, id: ProcessId) -> Option<&ProcessControlBlock<H>> {
        self.slots.get(id.slot())
    }

    /// Get a control block mutably
    pub fn get_mut(&mut self, id: ProcessId) -> Option<&mut ProcessControlBlock<H>> {
        self.slots.get_mut(id.slot())
    }

    /// Iterate over live control blocks
    pub fn iter(&self) -> impl Iterator<Item = &ProcessControlBlock<H>> {
        self.slots.iter().map(|(_, pcb)| pcb)
    }

    pub(crate) fn insert(
        &mut self,
        pcb: ProcessControlBlock<H>,
    ) -> Result<(), ProcessControlBlock<H>> {
        self.slots.insert_at(pcb.id.slot(), pcb)
    }

    pub(crate) fn remove(&mut self, id: ProcessId) -> Option<ProcessControlBlock<H>> {
        self.slots.remove(id.slot())
    }

    /// Link `id` at the tail of `queue`
    pub(crate) fn enqueue(&mut self, queue: &mut ProcessQueue, id: ProcessId) {
        let Some(pcb) = self.get_mut(id) else {
            return;
        };
        debug_assert!(
            pcb.queue.is_none(),
            "pid {} already on {:?}",
            id,
            pcb.queue
        );
        pcb.queue = Some(queue.tag());
        queue.push_back(id);
    }

    /// Unlink the head of `queue`
    pub(crate) fn dequeue(&mut self, queue: &mut ProcessQueue) -> Option<ProcessId> {
        let id = queue.pop_front()?;
        if let Some(pcb) = self.get_mut(id) {
            pcb.queue = None;
        }
        Some(id)
    }

    /// Unlink `id` from the middle of `queue`
    pub(crate) fn unlink(&mut self, queue: &mut ProcessQueue, id: ProcessId) -> bool {
        if !queue.remove(id) {
            return false;
        }
        if let Some(pcb) = self.get_mut(id) {
            pcb.queue = None;
        }
        true
    }

    /// Mark `id` Ready and append it to the ready queue
    pub(crate) fn make_ready(&mut self, ready: &mut ProcessQueue, id: ProcessId) {
        if let Some(pcb) = self.get_mut(id) {
            pcb.state = ProcessState::Ready;
        }
        self.enqueue(ready, id);
    }
}

impl<H: HardwareAbstractionLayer> Default for ProcessTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: HardwareAbstractionLayer> fmt::Debug for ProcessTable<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Validate and copy a program name
pub(crate) fn program_name(program: &str) -> ExecResult<ProgramName> {
    if program.is_empty() {
        return Err(ExecError::InvalidArgument);
    }
    let mut name = ProgramName::new();
    name.push_str(program).map_err(|_| ExecError::NameTooLong)?;
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockHal;
    use minikernel_hal::{HardwareAbstractionLayer, ImageLoader};

    fn pcb(hal: &MockHal, slot: usize) -> ProcessControlBlock<MockHal> {
        let loader = hal.loader();
        let (image, entry) = loader.create_image("init").unwrap();
        let stack = loader.create_stack(64);
        let context = loader.initial_context(&image, &stack, 64, entry);
        ProcessControlBlock::new(
            ProcessId::new(slot),
            program_name("init").unwrap(),
            context,
            image,
            stack,
            10,
        )
    }

    #[test]
    fn test_new_pcb_is_ready_and_empty() {
        let hal = MockHal::new();
        let pcb = pcb(&hal, 3);
        assert_eq!(pcb.id(), ProcessId::new(3));
        assert_eq!(pcb.program(), "init");
        let info = pcb.info();
        assert_eq!(info.state, ProcessState::Ready);
        assert!(info.open_mutexes.is_empty());
        assert_eq!(info.time_slice, 10);
        assert_eq!(info.queue, None);
    }

    #[test]
    fn test_info_lists_open_mutexes_in_order() {
        let hal = MockHal::new();
        let mut pcb = pcb(&hal, 0);
        for raw in [4, 1, 7] {
            pcb.mutexes.insert(MutexId::new(raw)).unwrap();
        }
        pcb.mutexes.remove(MutexId::new(1));
        let info = pcb.info();
        assert_eq!(info.open_mutexes.as_slice(), &[MutexId::new(4), MutexId::new(7)]);
        assert_eq!(info.open_mutexes, pcb.mutexes);
    }

    #[test]
    fn test_queue_membership_is_tracked() {
        let hal = MockHal::new();
        let mut table: ProcessTable<MockHal> = ProcessTable::new();
        let mut ready = ProcessQueue::new(QueueTag::Ready);
        let mut sleep = ProcessQueue::new(QueueTag::Sleep);
        table.insert(pcb(&hal, 0)).unwrap();
        table.insert(pcb(&hal, 1)).unwrap();

        table.enqueue(&mut ready, ProcessId::new(0));
        table.enqueue(&mut sleep, ProcessId::new(1));
        assert_eq!(table.get(ProcessId::new(0)).unwrap().queue, Some(QueueTag::Ready));
        assert_eq!(table.get(ProcessId::new(1)).unwrap().queue, Some(QueueTag::Sleep));

        assert!(table.unlink(&mut sleep, ProcessId::new(1)));
        assert_eq!(table.get(ProcessId::new(1)).unwrap().queue, None);

        assert_eq!(table.dequeue(&mut ready), Some(ProcessId::new(0)));
        assert_eq!(table.get(ProcessId::new(0)).unwrap().queue, None);
    }

    #[test]
    fn test_vacant_id_reuses_slots() {
        let hal = MockHal::new();
        let mut table: ProcessTable<MockHal> = ProcessTable::new();
        table.insert(pcb(&hal, 0)).unwrap();
        table.insert(pcb(&hal, 1)).unwrap();
        assert_eq!(table.vacant_id(), Some(ProcessId::new(2)));
        table.remove(ProcessId::new(0));
        assert_eq!(table.vacant_id(), Some(ProcessId::new(0)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_program_name_limits() {
        assert_eq!(program_name(""), Err(ExecError::InvalidArgument));
        let long = "x".repeat(PROGRAM_NAME_LEN + 1);
        assert_eq!(program_name(&long), Err(ExecError::NameTooLong));
        assert_eq!(program_name("shell").unwrap().as_str(), "shell");
    }
}
