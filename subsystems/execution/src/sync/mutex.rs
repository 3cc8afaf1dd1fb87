//! Mutex operations performed on behalf of the running process.

use super::registry::{mutex_name, MutexKind, MutexName};
use crate::config::WakePolicy;
use crate::kernel::Kernel;
use crate::process::Resume;
use crate::scheduler::Wait;
use crate::{ExecError, ExecResult, MutexId, Outcome, ProcessId};
use minikernel_hal::HardwareAbstractionLayer;

impl<'h, H: HardwareAbstractionLayer> Kernel<'h, H> {
    /// Create a mutex and open it for the caller
    ///
    /// Completes with the new mutex id. While the registry is full the
    /// caller sleeps and retries, so this may deschedule the caller.
    pub(crate) fn create_mutex(&mut self, name: &str, kind: MutexKind) -> ExecResult<Outcome> {
        let name = mutex_name(name)?;
        self.create_named_mutex(name, kind, 0)
    }

    pub(crate) fn create_named_mutex(
        &mut self,
        name: MutexName,
        kind: MutexKind,
        retries: u32,
    ) -> ExecResult<Outcome> {
        let caller = self.caller()?;
        if self.mutexes.by_name(&name).is_some() {
            return Err(ExecError::DuplicateMutexName);
        }
        if self.processes.get(caller).is_some_and(|pcb| pcb.mutexes.is_full()) {
            return Err(ExecError::TooManyOpenMutexes);
        }

        if self.mutexes.is_full() {
            if self.config.mutex_retry_limit.is_some_and(|limit| retries >= limit) {
                log::warn!(
                    "pid {} gave up creating mutex {:?}: registry full",
                    caller,
                    name.as_str()
                );
                return Err(ExecError::MutexRegistryFull);
            }
            let ticks = self.config.seconds_to_ticks(self.config.mutex_retry_seconds);
            log::debug!("mutex registry full, pid {} retries in {} ticks", caller, ticks);
            let retry = Resume::CreateMutex {
                name,
                kind,
                retries: retries.saturating_add(1),
            };
            self.block_current(Wait::Sleep(ticks), retry);
            return Ok(Outcome::Deschedule);
        }

        let id = self.mutexes.register(name, kind)?;
        if let Err(err) = self.attach(caller, id) {
            self.mutexes.remove(id);
            return Err(err);
        }
        log::info!(
            "mutex {} ({:?}) created by pid {}",
            id,
            self.mutex_label(id),
            caller
        );
        Ok(Outcome::Complete(id.as_u64() as i64))
    }

    /// Open an existing mutex by name
    ///
    /// Opening a mutex the caller already has open returns the same id.
    pub fn open_mutex(&mut self, name: &str) -> ExecResult<MutexId> {
        let caller = self.caller()?;
        let name = mutex_name(name)?;
        if self.processes.get(caller).is_some_and(|pcb| pcb.mutexes.is_full()) {
            return Err(ExecError::TooManyOpenMutexes);
        }
        let id = self
            .mutexes
            .by_name(&name)
            .map(|record| record.id())
            .ok_or(ExecError::MutexNotFound)?;
        self.attach(caller, id)?;
        log::debug!("pid {} opened mutex {} ({:?})", caller, id, name.as_str());
        Ok(id)
    }

    /// Acquire a mutex, blocking while another process holds it
    pub(crate) fn lock_mutex(&mut self, id: MutexId) -> ExecResult<Outcome> {
        let caller = self.caller()?;
        self.check_open(caller, id)?;
        let record = self.mutexes.get_mut(id).ok_or(ExecError::MutexNotFound)?;

        let available = match record.kind() {
            MutexKind::NonRecursive => {
                if record.is_owned_by(caller) {
                    return Err(ExecError::SelfDeadlock);
                }
                record.hold_count == 0
            }
            MutexKind::Recursive => record.hold_count == 0 || record.is_owned_by(caller),
        };

        if available {
            record.owner = Some(caller);
            record.hold_count += 1;
            log::trace!("pid {} holds mutex {} x{}", caller, id, record.hold_count);
            return Ok(Outcome::Complete(0));
        }

        log::debug!(
            "pid {} waits for mutex {} held by {:?}",
            caller,
            id,
            record.owner
        );
        self.block_current(Wait::Mutex(id), Resume::Lock(id));
        Ok(Outcome::Deschedule)
    }

    /// Release one hold on a mutex the caller owns
    pub fn unlock_mutex(&mut self, id: MutexId) -> ExecResult<()> {
        let caller = self.caller()?;
        self.check_open(caller, id)?;
        let record = self.mutexes.get_mut(id).ok_or(ExecError::MutexNotFound)?;
        if !record.is_owned_by(caller) {
            return Err(ExecError::NotOwner);
        }

        record.hold_count = match record.kind() {
            MutexKind::NonRecursive => 0,
            MutexKind::Recursive => record.hold_count - 1,
        };
        if record.hold_count == 0 {
            record.owner = None;
            log::debug!("pid {} released mutex {}", caller, id);
            self.wake_waiters(id);
        }
        Ok(())
    }

    /// Close the caller's descriptor for a mutex
    ///
    /// A caller that still holds the mutex releases it completely. The last
    /// close removes the mutex from the registry.
    pub fn close_mutex(&mut self, id: MutexId) -> ExecResult<()> {
        let caller = self.caller()?;
        let closed = self
            .processes
            .get_mut(caller)
            .is_some_and(|pcb| pcb.mutexes.remove(id));
        if !closed {
            return Err(ExecError::NotOpenedByCaller);
        }

        let Some(record) = self.mutexes.get_mut(id) else {
            return Ok(());
        };
        record.open_count = record.open_count.saturating_sub(1);
        let remaining = record.open_count;
        if record.is_owned_by(caller) {
            record.release();
            log::debug!("pid {} closed mutex {} while holding it", caller, id);
            self.wake_waiters(id);
        }
        if remaining == 0 {
            self.destroy_mutex(id);
        }
        Ok(())
    }

    fn check_open(&self, caller: ProcessId, id: MutexId) -> ExecResult<()> {
        match self.processes.get(caller) {
            Some(pcb) if pcb.mutexes.contains(id) => Ok(()),
            _ => Err(ExecError::NotOpenedByCaller),
        }
    }

    fn attach(&mut self, pid: ProcessId, id: MutexId) -> ExecResult<()> {
        let pcb = self
            .processes
            .get_mut(pid)
            .ok_or(ExecError::NoCurrentProcess)?;
        if pcb.mutexes.contains(id) {
            return Ok(());
        }
        pcb.mutexes.insert(id)?;
        if let Some(record) = self.mutexes.get_mut(id) {
            record.open_count += 1;
        }
        Ok(())
    }

    /// Move waiters of an unlocked mutex to the ready queue
    fn wake_waiters(&mut self, id: MutexId) {
        let policy = self.config.wake_policy;
        let Some(record) = self.mutexes.get_mut(id) else {
            return;
        };
        match policy {
            WakePolicy::WakeAll => {
                while let Some(waiter) = self.processes.dequeue(&mut record.waiters) {
                    log::debug!("pid {} woken by mutex {}", waiter, id);
                    self.processes.make_ready(&mut self.ready, waiter);
                }
            }
            WakePolicy::HandOff => {
                if let Some(waiter) = self.processes.dequeue(&mut record.waiters) {
                    record.owner = Some(waiter);
                    record.hold_count = 1;
                    if let Some(pcb) = self.processes.get_mut(waiter) {
                        pcb.resume = Some(Resume::Acquired);
                    }
                    log::debug!("mutex {} handed to pid {}", id, waiter);
                    self.processes.make_ready(&mut self.ready, waiter);
                }
            }
        }
    }

    fn destroy_mutex(&mut self, id: MutexId) {
        let Some(mut record) = self.mutexes.remove(id) else {
            return;
        };
        while let Some(waiter) = self.processes.dequeue(&mut record.waiters) {
            log::warn!("pid {} released from removed mutex {}", waiter, id);
            self.processes.make_ready(&mut self.ready, waiter);
        }
        log::info!("mutex {} ({:?}) removed", id, record.name());
    }

    fn mutex_label(&self, id: MutexId) -> &str {
        self.mutexes.get(id).map_or("?", |record| record.name())
    }
}
