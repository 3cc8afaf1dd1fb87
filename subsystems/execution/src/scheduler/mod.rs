//! # Scheduler
//!
//! FIFO scheduling with round-robin time slicing.
//!
//! The ready queue holds every runnable process except the running one.
//! Picking the next process pops the head; a process that is preempted or
//! woken goes to the tail. When nothing is runnable the kernel lowers the
//! interrupt level, waits for an interrupt, services it and looks again.
//!
//! Quantum accounting lives in [`crate::timer`]: the clock decrements the
//! running quantum and raises a software interrupt when it runs out while
//! others are waiting. The software interrupt lands in [`Kernel::preempt`].

pub mod metrics;
pub mod queue;

use crate::kernel::Kernel;
use crate::process::{ProcessState, Resume};
use crate::{MutexId, Outcome, ProcessId};
use minikernel_hal::{CpuAbstraction, HardwareAbstractionLayer, InterruptLevel, LevelGuard, Trap};

/// Where a blocking process waits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wait {
    /// On the sleep queue for this many ticks
    Sleep(u32),
    /// On the wait queue of a mutex
    Mutex(MutexId),
}

impl<'h, H: HardwareAbstractionLayer> Kernel<'h, H> {
    /// Make the next runnable process current
    ///
    /// A process picked here may still owe work from the call it blocked in;
    /// that work runs now, and if it blocks again another process is picked.
    pub(crate) fn schedule(&mut self) {
        debug_assert!(self.current.is_none(), "schedule with a running process");
        loop {
            let next = self.pick_next();
            let slice = self.config.time_slice_ticks;
            if let Some(pcb) = self.processes.get_mut(next) {
                pcb.state = ProcessState::Running;
                pcb.time_slice = slice;
            }
            self.current = Some(next);
            log::debug!("pid {} scheduled", next);

            match self.resume_current() {
                Some(Outcome::Deschedule) => continue,
                Some(Outcome::Complete(value)) => {
                    self.complete(value);
                    return;
                }
                None => return,
            }
        }
    }

    /// Pop the ready-queue head, idling until there is one
    fn pick_next(&mut self) -> ProcessId {
        loop {
            if let Some(id) = self.processes.dequeue(&mut self.ready) {
                return id;
            }
            self.idle_wait();
        }
    }

    fn idle_wait(&mut self) {
        let hal = self.hal;
        self.metrics.record_idle_wait();
        log::trace!("nothing ready, waiting for an interrupt");
        let fired = {
            let _level = LevelGuard::set(hal.cpu(), InterruptLevel::Software);
            debug_assert!(hal.cpu().interrupt_level().permits(Trap::Clock));
            hal.cpu().halt_until_interrupt()
        };
        if let Some(trap) = fired {
            self.service_interrupt(trap);
        }
    }

    /// Handle an interrupt taken while the kernel was idle
    fn service_interrupt(&mut self, trap: Trap) {
        match trap {
            Trap::Clock => self.clock_tick(),
            Trap::Terminal => self.terminal_input(),
            // Masked while idle, and meaningless with nothing running
            Trap::Software => {}
            other => log::warn!("unexpected {:?} while idle", other),
        }
    }

    fn resume_current(&mut self) -> Option<Outcome> {
        let id = self.current?;
        let step = self.processes.get_mut(id)?.resume.take()?;
        log::trace!("pid {} resumes {:?}", id, step);
        let outcome = match step {
            Resume::Sleep | Resume::Acquired => Outcome::Complete(0),
            Resume::Lock(mutex) => Outcome::settle(self.lock_mutex(mutex)),
            Resume::CreateMutex {
                name,
                kind,
                retries,
            } => Outcome::settle(self.create_named_mutex(name, kind, retries)),
        };
        Some(outcome)
    }

    /// Take the running process off the CPU and park it
    pub(crate) fn block_current(&mut self, wait: Wait, resume: Resume) {
        let Some(id) = self.current.take() else {
            return;
        };
        let Some(pcb) = self.processes.get_mut(id) else {
            return;
        };
        pcb.state = ProcessState::Blocked;
        pcb.resume = Some(resume);

        match wait {
            Wait::Sleep(ticks) => {
                pcb.sleep_ticks = ticks.max(1);
                self.processes.enqueue(&mut self.sleeping, id);
            }
            Wait::Mutex(mutex) => match self.mutexes.get_mut(mutex) {
                Some(record) => self.processes.enqueue(&mut record.waiters, id),
                None => {
                    log::warn!("pid {} blocked on missing mutex {}", id, mutex);
                    self.processes.make_ready(&mut self.ready, id);
                }
            },
        }
        self.metrics.record_block();
        log::debug!("pid {} blocked on {:?}", id, wait);
    }

    /// Software interrupt: requeue the running process if its quantum is spent
    pub(crate) fn preempt(&mut self) {
        let Some(id) = self.current else {
            return;
        };
        let Some(pcb) = self.processes.get_mut(id) else {
            return;
        };
        if pcb.time_slice > 0 {
            return;
        }
        if self.ready.is_empty() {
            pcb.time_slice = self.config.time_slice_ticks;
            return;
        }

        log::debug!("pid {} quantum expired", id);
        self.current = None;
        self.processes.make_ready(&mut self.ready, id);
        self.metrics.record_preemption();
        self.schedule();
    }
}

#[cfg(test)]
mod tests {
    use crate::mock::{boot, boot_with, syscall, MockHal};
    use crate::{KernelConfig, ProcessId, ProcessState, Service};
    use minikernel_hal::{InterruptLevel, Trap};

    fn pid(n: usize) -> ProcessId {
        ProcessId::new(n)
    }

    #[test]
    fn test_ready_queue_is_fifo() {
        let hal = MockHal::new();
        let mut kernel = boot(&hal);
        for program in ["a", "b", "c"] {
            let name = hal.user_str(program);
            syscall(&mut kernel, Service::CreateProcess, &[name]).unwrap();
        }
        assert_eq!(kernel.ready_queue().as_slice(), &[pid(1), pid(2), pid(3)]);

        // init leaves; the head runs first
        assert_eq!(syscall(&mut kernel, Service::TerminateProcess, &[]), None);
        assert_eq!(kernel.current(), Some(pid(1)));
        assert_eq!(kernel.ready_queue().as_slice(), &[pid(2), pid(3)]);
    }

    #[test]
    fn test_quantum_expiry_rotates_ready_queue() {
        let hal = MockHal::new();
        let config = KernelConfig {
            time_slice_ticks: 3,
            ..KernelConfig::new()
        };
        let mut kernel = boot_with(&hal, config);
        for program in ["a", "b"] {
            let name = hal.user_str(program);
            syscall(&mut kernel, Service::CreateProcess, &[name]).unwrap();
        }

        kernel.handle_trap(Trap::Clock);
        kernel.handle_trap(Trap::Clock);
        assert!(!hal.take_software_interrupt());
        kernel.handle_trap(Trap::Clock);
        assert!(hal.take_software_interrupt());

        kernel.handle_trap(Trap::Software);
        assert_eq!(kernel.current(), Some(pid(1)));
        assert_eq!(kernel.ready_queue().as_slice(), &[pid(2), pid(0)]);
        assert_eq!(kernel.process(pid(0)).unwrap().state, ProcessState::Ready);
        assert_eq!(kernel.process(pid(1)).unwrap().time_slice, 3);
        assert_eq!(kernel.stats().preemptions, 1);
    }

    #[test]
    fn test_quantum_expiry_alone_keeps_running() {
        let hal = MockHal::new();
        let config = KernelConfig {
            time_slice_ticks: 2,
            ..KernelConfig::new()
        };
        let mut kernel = boot_with(&hal, config);
        kernel.handle_trap(Trap::Clock);
        kernel.handle_trap(Trap::Clock);
        // Nothing else is ready, so no software interrupt is requested
        assert!(!hal.take_software_interrupt());
        assert_eq!(kernel.process(pid(0)).unwrap().time_slice, 0);

        // A stray software interrupt refills the quantum instead
        kernel.handle_trap(Trap::Software);
        assert_eq!(kernel.current(), Some(pid(0)));
        assert_eq!(kernel.process(pid(0)).unwrap().time_slice, 2);
    }

    #[test]
    fn test_software_interrupt_with_quantum_left_is_ignored() {
        let hal = MockHal::new();
        let mut kernel = boot(&hal);
        let name = hal.user_str("a");
        syscall(&mut kernel, Service::CreateProcess, &[name]).unwrap();
        kernel.handle_trap(Trap::Software);
        assert_eq!(kernel.current(), Some(pid(0)));
        assert_eq!(kernel.ready_queue().as_slice(), &[pid(1)]);
    }

    #[test]
    fn test_idle_lowers_level_and_services_clock() {
        let hal = MockHal::new();
        let mut kernel = boot_with(
            &hal,
            KernelConfig {
                ticks_per_second: 2,
                ..KernelConfig::new()
            },
        );

        hal.script_idle(&[Trap::Terminal, Trap::Clock, Trap::Clock]);
        assert_eq!(syscall(&mut kernel, Service::Sleep, &[1]), Some(0));
        assert_eq!(kernel.current(), Some(pid(0)));
        assert_eq!(kernel.stats().idle_waits, 3);
        assert!(hal.level_history().contains(&InterruptLevel::Software));
        assert_eq!(hal.level(), InterruptLevel::User);
        // The same process resumed, so no switch was needed
        assert_eq!(kernel.stats().context_switches, 1);
    }
}
