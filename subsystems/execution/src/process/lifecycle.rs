//! Process creation, termination and fault handling.

use super::{program_name, ProcessControlBlock, ProcessState};
use crate::kernel::Kernel;
use crate::{ExecError, ExecResult, MutexId, Outcome, ProcessId};
use minikernel_hal::{CpuAbstraction, HardwareAbstractionLayer, ImageLoader, Trap};

impl<'h, H: HardwareAbstractionLayer> Kernel<'h, H> {
    /// Create a process running `program` and append it to the ready queue
    ///
    /// On failure nothing is allocated and the table is unchanged.
    pub fn create_process(&mut self, program: &str) -> ExecResult<ProcessId> {
        let id = self.processes.vacant_id().ok_or(ExecError::ProcessTableFull)?;
        let name = program_name(program)?;

        let hal = self.hal;
        let loader = hal.loader();
        let (image, entry) = loader
            .create_image(program)
            .ok_or(ExecError::ImageLoadFailed)?;
        let stack_size = self.config.stack_size;
        let stack = loader.create_stack(stack_size);
        let context = loader.initial_context(&image, &stack, stack_size, entry);

        let slice = self.config.time_slice_ticks;
        let pcb = ProcessControlBlock::new(id, name, context, image, stack, slice);
        if let Err(mut pcb) = self.processes.insert(pcb) {
            if let Some(image) = pcb.image.take() {
                loader.release_image(image);
            }
            if let Some(stack) = pcb.stack.take() {
                loader.release_stack(stack);
            }
            return Err(ExecError::ProcessTableFull);
        }
        self.processes.enqueue(&mut self.ready, id);
        log::info!("pid {} created from {:?}, entry {}", id, program, entry);
        Ok(id)
    }

    /// Terminate the running process
    ///
    /// Every mutex it has open is released and closed, oldest first, and its
    /// image is freed. The stack outlives this call until the CPU has left it.
    pub(crate) fn terminate_current(&mut self) -> ExecResult<Outcome> {
        let id = self.caller()?;
        self.release_mutexes(id);

        let hal = self.hal;
        if let Some(pcb) = self.processes.get_mut(id) {
            if let Some(image) = pcb.image.take() {
                hal.loader().release_image(image);
            }
            pcb.state = ProcessState::Terminated;
        }
        self.current = None;
        self.exited = Some(id);
        log::info!("pid {} terminated", id);
        Ok(Outcome::Deschedule)
    }

    fn release_mutexes(&mut self, id: ProcessId) {
        while let Some(mutex) = self.processes.get(id).and_then(|pcb| pcb.mutexes.first()) {
            while self.holds(id, mutex) {
                if self.unlock_mutex(mutex).is_err() {
                    break;
                }
            }
            if self.close_mutex(mutex).is_err() {
                // Drop the stale descriptor so the loop makes progress
                if let Some(pcb) = self.processes.get_mut(id) {
                    pcb.mutexes.remove(mutex);
                }
            }
        }
    }

    fn holds(&self, id: ProcessId, mutex: MutexId) -> bool {
        self.mutexes
            .get(mutex)
            .is_some_and(|record| record.is_owned_by(id))
    }

    /// Arithmetic or memory exception
    ///
    /// Fatal when raised by the kernel itself; otherwise the running process
    /// is terminated.
    pub(crate) fn handle_fault(&mut self, trap: Trap) -> Outcome {
        debug_assert!(trap.is_exception());
        let hal = self.hal;
        if !hal.cpu().from_user_mode() {
            log::error!("{:?} in kernel mode, current {:?}", trap, self.current);
            let message = match trap {
                Trap::ArithmeticFault => "arithmetic exception in kernel",
                _ => "memory exception in kernel",
            };
            hal.panic(message);
        }
        log::warn!("pid {:?} killed by {:?}", self.current, trap);
        Outcome::settle(self.terminate_current())
    }
}
