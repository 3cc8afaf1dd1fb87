//! # CPU Abstraction
//!
//! This module defines the processor operations the kernel core relies on:
//! interrupt-level control, the general-purpose registers that carry system
//! call arguments and results, and register-based context save/restore.

use crate::{InterruptLevel, Trap, VirtAddr};
use core::fmt::Debug;

/// Register holding the service number on system-call entry and the result on exit
pub const RESULT_REGISTER: usize = 0;

/// First register carrying a system-call argument
pub const FIRST_ARGUMENT_REGISTER: usize = 1;

/// CPU abstraction trait
///
/// Provides architecture-independent access to the trapping CPU.
pub trait CpuAbstraction: Send + Sync {
    /// CPU context type for saving/restoring state
    type Context: CpuContext;

    /// Set the interrupt level, returning the previous one
    fn set_interrupt_level(&self, level: InterruptLevel) -> InterruptLevel;

    /// Get the current interrupt level
    fn interrupt_level(&self) -> InterruptLevel;

    /// Wait until an interrupt unmasked at the current level arrives
    ///
    /// Returns the trap that ended the wait. The kernel services it inline
    /// before deciding whether to wait again.
    fn halt_until_interrupt(&self) -> Option<Trap>;

    /// Check whether the current trap was taken from user mode
    fn from_user_mode(&self) -> bool;

    /// Read a general-purpose register of the live trap frame
    fn read_register(&self, index: usize) -> u64;

    /// Write a general-purpose register of the live trap frame
    fn write_register(&self, index: usize, value: u64);

    /// Request a software interrupt, delivered once the level drops below `Software`
    fn raise_software_interrupt(&self);

    /// Save the live frame into `save` (if any) and make `restore` live
    ///
    /// # Safety
    ///
    /// - `restore` must have been produced by the image loader or by an
    ///   earlier save on this CPU
    /// - Must be called at `InterruptLevel::Clock`
    unsafe fn switch_context(&self, save: Option<&mut Self::Context>, restore: &Self::Context);
}

/// CPU context trait
///
/// Represents the saved state of a process for context switching.
pub trait CpuContext: Clone + Send + Debug {
    /// Get the instruction pointer from the context
    fn instruction_pointer(&self) -> VirtAddr;

    /// Get the stack pointer from the context
    fn stack_pointer(&self) -> VirtAddr;
}

/// Scoped interrupt-level change
///
/// Records the level in force when created and restores it on drop, so
/// nested critical sections unwind in order.
#[derive(Debug)]
#[must_use = "the previous level is restored when the guard is dropped"]
pub struct LevelGuard<'a, C: CpuAbstraction + ?Sized> {
    cpu: &'a C,
    previous: InterruptLevel,
}

impl<'a, C: CpuAbstraction + ?Sized> LevelGuard<'a, C> {
    /// Raise to at least `level`; never lowers the current level
    pub fn raise(cpu: &'a C, level: InterruptLevel) -> Self {
        let target = level.max(cpu.interrupt_level());
        Self::set(cpu, target)
    }

    /// Set exactly `level`, which may lower the current level
    pub fn set(cpu: &'a C, level: InterruptLevel) -> Self {
        let previous = cpu.set_interrupt_level(level);
        log::trace!("interrupt level {:?} -> {:?}", previous, level);
        Self { cpu, previous }
    }

    /// Level that will be restored
    pub fn previous(&self) -> InterruptLevel {
        self.previous
    }
}

impl<C: CpuAbstraction + ?Sized> Drop for LevelGuard<'_, C> {
    fn drop(&mut self) {
        self.cpu.set_interrupt_level(self.previous);
    }
}
