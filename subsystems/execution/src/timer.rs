//! # Sleep and Clock
//!
//! Sleeping processes wait on the sleep queue with a countdown in ticks.
//! Every clock tick decrements each countdown and wakes the processes that
//! reach zero, then charges the running process's quantum.

use crate::kernel::Kernel;
use crate::process::Resume;
use crate::scheduler::Wait;
use crate::{ExecResult, Outcome};
use minikernel_hal::{CpuAbstraction, HardwareAbstractionLayer};

impl<'h, H: HardwareAbstractionLayer> Kernel<'h, H> {
    /// Block the running process for `seconds`
    ///
    /// Zero seconds completes at once without giving up the CPU. Otherwise
    /// no process is current afterwards until the trap path reschedules.
    pub(crate) fn sleep(&mut self, seconds: u32) -> ExecResult<Outcome> {
        let caller = self.caller()?;
        if seconds == 0 {
            return Ok(Outcome::Complete(0));
        }
        let ticks = self.config.seconds_to_ticks(seconds);
        log::debug!("pid {} sleeps {} ticks", caller, ticks);
        self.block_current(Wait::Sleep(ticks), Resume::Sleep);
        Ok(Outcome::Deschedule)
    }

    /// Clock interrupt
    pub(crate) fn clock_tick(&mut self) {
        self.metrics.record_tick();
        log::trace!("tick, current {:?}", self.current);
        self.expire_sleepers();
        self.charge_quantum();
    }

    fn expire_sleepers(&mut self) {
        // Walk a copy so waking can unlink from the live queue
        for id in self.sleeping.snapshot() {
            let Some(pcb) = self.processes.get_mut(id) else {
                continue;
            };
            pcb.sleep_ticks = pcb.sleep_ticks.saturating_sub(1);
            if pcb.sleep_ticks > 0 {
                continue;
            }
            self.processes.unlink(&mut self.sleeping, id);
            self.processes.make_ready(&mut self.ready, id);
            log::debug!("pid {} woke", id);
        }
    }

    fn charge_quantum(&mut self) {
        let Some(id) = self.current else {
            return;
        };
        let Some(pcb) = self.processes.get_mut(id) else {
            return;
        };
        pcb.time_slice = pcb.time_slice.saturating_sub(1);
        if pcb.time_slice == 0 && !self.ready.is_empty() {
            log::trace!("pid {} out of quantum", id);
            self.hal.cpu().raise_software_interrupt();
        }
    }
}
