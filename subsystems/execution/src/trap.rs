//! # Trap Dispatch
//!
//! Every exception, interrupt and system call enters the kernel through
//! [`Kernel::handle_trap`]. The handler runs with the interrupt level raised
//! to the trap's handler level and restored on exit. Before returning, the
//! process chosen to run is installed on the CPU.
//!
//! ```text
//!   ArithmeticFault ─┐
//!   MemoryFault ─────┴─► terminate caller (fatal in kernel mode)
//!   Syscall ──────────► service table ──► result register / reschedule
//!   Clock ────────────► sleepers, quantum
//!   Terminal ─────────► read and log one character
//!   Software ─────────► round-robin requeue
//! ```

use crate::kernel::Kernel;
use crate::Outcome;
use minikernel_hal::{HardwareAbstractionLayer, LevelGuard, TerminalDevice, Trap};

impl<'h, H: HardwareAbstractionLayer> Kernel<'h, H> {
    /// Handle one trap taken while a process was running
    pub fn handle_trap(&mut self, trap: Trap) {
        let hal = self.hal;
        let _level = LevelGuard::raise(hal.cpu(), trap.handler_level());
        debug_assert_eq!(self.live, self.current, "trap with a stale frame");

        match trap {
            Trap::ArithmeticFault | Trap::MemoryFault => {
                let outcome = self.handle_fault(trap);
                self.conclude(outcome);
            }
            Trap::Syscall => {
                let outcome = self.dispatch_syscall();
                self.conclude(outcome);
            }
            Trap::Clock => self.clock_tick(),
            Trap::Terminal => self.terminal_input(),
            Trap::Software => self.preempt(),
        }
        self.finish_trap();
    }

    /// Terminal interrupt
    pub(crate) fn terminal_input(&self) {
        let ch = self.hal.terminal().read_char();
        log::debug!("terminal input {:?}", char::from(ch));
    }

    fn conclude(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Complete(value) => self.complete(value),
            Outcome::Deschedule => self.schedule(),
        }
    }
}
