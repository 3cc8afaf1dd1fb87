//! # Kernel
//!
//! The kernel object owns every table and queue and borrows the HAL.
//!
//! ## Context switching
//!
//! The process whose registers are on the CPU when a trap arrives is the
//! *live* process. Handlers may change the *current* process (block, sleep,
//! terminate, preempt). When the trap finishes and the two differ, the live
//! frame is saved into its control block and the current one is installed,
//! so exactly one switch happens per trap. A terminated process is never
//! saved, and its stack is released only after the switch away from it.

use crate::config::{KernelConfig, MAX_PROCESSES};
use crate::process::{ProcessInfo, ProcessState, ProcessTable};
use crate::scheduler::metrics::{SchedulerMetrics, SchedulerStats};
use crate::scheduler::queue::{ProcessQueue, QueueTag};
use crate::sync::{MutexInfo, MutexRegistry};
use crate::{ExecError, ExecResult, MutexId, ProcessId};
use minikernel_hal::cpu::RESULT_REGISTER;
use minikernel_hal::{
    CpuAbstraction, CpuContext, HardwareAbstractionLayer, ImageLoader, InterruptLevel,
    LevelGuard,
};

/// The kernel core
pub struct Kernel<'h, H: HardwareAbstractionLayer> {
    pub(crate) hal: &'h H,
    pub(crate) config: KernelConfig,
    pub(crate) processes: ProcessTable<H>,
    pub(crate) ready: ProcessQueue,
    pub(crate) sleeping: ProcessQueue,
    pub(crate) mutexes: MutexRegistry,
    /// Process chosen to run
    pub(crate) current: Option<ProcessId>,
    /// Process whose frame is on the CPU
    pub(crate) live: Option<ProcessId>,
    /// Terminated during this trap, reaped after the switch
    pub(crate) exited: Option<ProcessId>,
    pub(crate) metrics: SchedulerMetrics,
}

impl<'h, H: HardwareAbstractionLayer> Kernel<'h, H> {
    /// Create a kernel with no processes
    pub fn new(hal: &'h H, config: KernelConfig) -> ExecResult<Self> {
        config.validate()?;
        log::info!(
            "kernel: {} process slots, {} Hz, quantum {} ticks, {:?}",
            MAX_PROCESSES,
            config.ticks_per_second,
            config.time_slice_ticks,
            config.wake_policy
        );
        Ok(Self {
            hal,
            config,
            processes: ProcessTable::new(),
            ready: ProcessQueue::new(QueueTag::Ready),
            sleeping: ProcessQueue::new(QueueTag::Sleep),
            mutexes: MutexRegistry::new(),
            current: None,
            live: None,
            exited: None,
            metrics: SchedulerMetrics::new(),
        })
    }

    /// Start the first process and hand the CPU to it
    ///
    /// Halts through the HAL if the init program cannot be created.
    pub fn start(&mut self) {
        let hal = self.hal;
        let _level = LevelGuard::raise(hal.cpu(), InterruptLevel::Clock);
        let program = self.config.init_program;
        log::info!("kernel: starting {:?}", program);

        if let Err(err) = self.create_process(program) {
            log::error!("kernel: cannot create {:?}: {}", program, err);
            hal.panic("init process not found");
        }
        self.live = None;
        self.schedule();
        self.finish_trap();
    }

    /// Get the HAL
    pub fn hal(&self) -> &'h H {
        self.hal
    }

    /// Get the configuration
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Get the running process
    pub fn current(&self) -> Option<ProcessId> {
        self.current
    }

    /// Diagnostic view of a process
    pub fn process(&self, id: ProcessId) -> Option<ProcessInfo> {
        self.processes.get(id).map(|pcb| pcb.info())
    }

    /// Number of processes in the table
    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    /// Diagnostic view of a mutex
    pub fn mutex(&self, id: MutexId) -> Option<MutexInfo> {
        self.mutexes.get(id).map(|record| record.info())
    }

    /// Diagnostic view of a mutex, by name
    pub fn mutex_by_name(&self, name: &str) -> Option<MutexInfo> {
        self.mutexes.by_name(name).map(|record| record.info())
    }

    /// Number of live mutexes
    pub fn mutex_count(&self) -> usize {
        self.mutexes.len()
    }

    /// Ready queue, head first
    pub fn ready_queue(&self) -> heapless::Vec<ProcessId, MAX_PROCESSES> {
        self.ready.snapshot()
    }

    /// Sleep queue, head first
    pub fn sleep_queue(&self) -> heapless::Vec<ProcessId, MAX_PROCESSES> {
        self.sleeping.snapshot()
    }

    /// Scheduler counters
    pub fn stats(&self) -> SchedulerStats {
        self.metrics.snapshot()
    }

    pub(crate) fn caller(&self) -> ExecResult<ProcessId> {
        self.current.ok_or(ExecError::NoCurrentProcess)
    }

    /// Record the value the running process sees in its result register
    pub(crate) fn complete(&mut self, value: i64) {
        let Some(id) = self.current else {
            return;
        };
        if let Some(pcb) = self.processes.get_mut(id) {
            pcb.pending_result = Some(value);
        }
    }

    /// Install the current process on the CPU and clean up after the trap
    pub(crate) fn finish_trap(&mut self) {
        if let Some(next) = self.current {
            if self.live != Some(next) {
                self.switch_to(next);
            }
            self.deliver_result(next);
        }
        self.reap();
    }

    fn switch_to(&mut self, next: ProcessId) {
        let hal = self.hal;
        let Some(restore) = self.processes.get(next).map(|pcb| pcb.context.clone()) else {
            return;
        };
        let previous = self.live;
        let save = match previous {
            Some(id) => self
                .processes
                .get_mut(id)
                .filter(|pcb| pcb.state != ProcessState::Terminated)
                .map(|pcb| &mut pcb.context),
            None => None,
        };
        log::debug!(
            "switch {:?} -> pid {} (ip {}, sp {})",
            previous,
            next,
            restore.instruction_pointer(),
            restore.stack_pointer()
        );
        // SAFETY: `restore` was built by the loader or saved by an earlier
        // switch, and every caller runs with the clock masked
        unsafe { hal.cpu().switch_context(save, &restore) };
        self.live = Some(next);
        self.metrics.record_context_switch();
    }

    fn deliver_result(&mut self, id: ProcessId) {
        let hal = self.hal;
        let value = self
            .processes
            .get_mut(id)
            .and_then(|pcb| pcb.pending_result.take());
        if let Some(value) = value {
            hal.cpu().write_register(RESULT_REGISTER, value as u64);
        }
    }

    fn reap(&mut self) {
        let Some(id) = self.exited.take() else {
            return;
        };
        if let Some(pcb) = self.processes.remove(id) {
            if let Some(stack) = pcb.stack {
                self.hal.loader().release_stack(stack);
            }
            log::debug!("pid {} reaped", id);
        }
    }
}

impl<H: HardwareAbstractionLayer> core::fmt::Debug for Kernel<'_, H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Kernel")
            .field("current", &self.current)
            .field("ready", &self.ready)
            .field("sleeping", &self.sleeping)
            .field("processes", &self.processes)
            .field("mutexes", &self.mutexes.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crate::mock::{boot, MockHal};
    use crate::{ExecError, Kernel, KernelConfig, ProcessId, ProcessState};
    use minikernel_hal::{CpuContext, InterruptLevel, VirtAddr};

    #[test]
    fn test_start_runs_init() {
        let hal = MockHal::new();
        let kernel = boot(&hal);
        assert_eq!(kernel.current(), Some(ProcessId::new(0)));
        let init = kernel.process(ProcessId::new(0)).unwrap();
        assert_eq!(init.state, ProcessState::Running);
        assert_eq!(init.program.as_str(), "init");
        assert_eq!(hal.switches(), vec![(None, hal.entry_of("init"))]);
        assert_eq!(hal.live_entry(), hal.entry_of("init"));
        let context = kernel.processes.get(ProcessId::new(0)).unwrap().context();
        assert_eq!(context.instruction_pointer(), VirtAddr::new(hal.entry_of("init")));
        assert!(!context.stack_pointer().is_null());
        assert_eq!(hal.level(), InterruptLevel::User);
        assert!(hal.level_history().contains(&InterruptLevel::Clock));
    }

    #[test]
    #[should_panic(expected = "init process not found")]
    fn test_start_without_init_is_fatal() {
        let hal = MockHal::with_programs(&["shell"]);
        let mut kernel = Kernel::new(&hal, KernelConfig::new()).unwrap();
        kernel.start();
    }

    #[test]
    fn test_custom_init_program() {
        let hal = MockHal::with_programs(&["shell"]);
        let config = KernelConfig {
            init_program: "shell",
            ..KernelConfig::new()
        };
        let mut kernel = Kernel::new(&hal, config).unwrap();
        kernel.start();
        assert_eq!(kernel.process(ProcessId::new(0)).unwrap().program.as_str(), "shell");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let hal = MockHal::new();
        let config = KernelConfig {
            ticks_per_second: 0,
            ..KernelConfig::new()
        };
        assert!(matches!(
            Kernel::new(&hal, config),
            Err(ExecError::InvalidArgument)
        ));
    }
}
