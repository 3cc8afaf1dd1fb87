//! # Interrupt Levels and Traps
//!
//! The platform exposes a small ordered set of interrupt priority levels.
//! Setting the level to `L` masks every interrupt source whose priority is at
//! or below `L`; raising the level therefore masks strictly more.
//!
//! ```text
//! User(0) < Software(1) < Terminal(2) < Clock(3)
//! ```
//!
//! Exceptions and system calls are synchronous and cannot be masked.

use bitflags::bitflags;

/// Interrupt priority level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum InterruptLevel {
    /// Everything enabled
    #[default]
    User = 0,
    /// Software interrupts masked
    Software = 1,
    /// Software and terminal interrupts masked
    Terminal = 2,
    /// All maskable interrupts masked
    Clock = 3,
}

impl InterruptLevel {
    /// Sources still deliverable at this level
    pub const fn unmasked(self) -> InterruptMask {
        match self {
            Self::User => InterruptMask::ALL,
            Self::Software => InterruptMask::TERMINAL.union(InterruptMask::CLOCK),
            Self::Terminal => InterruptMask::CLOCK,
            Self::Clock => InterruptMask::empty(),
        }
    }

    /// Check whether a trap can be delivered at this level
    pub fn permits(self, trap: Trap) -> bool {
        trap.is_synchronous() || self.unmasked().contains(trap.source())
    }
}

bitflags! {
    /// Set of maskable interrupt sources
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InterruptMask: u8 {
        /// Software interrupt (used for preemption)
        const SOFTWARE = 1 << 0;
        /// Terminal character interrupt
        const TERMINAL = 1 << 1;
        /// Clock tick
        const CLOCK = 1 << 2;
        /// Every maskable source
        const ALL = Self::SOFTWARE.bits() | Self::TERMINAL.bits() | Self::CLOCK.bits();
    }
}

/// Trap classes the platform delivers to the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trap {
    /// Arithmetic exception (division by zero, overflow trap)
    ArithmeticFault,
    /// Memory protection or addressing exception
    MemoryFault,
    /// Periodic clock tick
    Clock,
    /// Terminal character available
    Terminal,
    /// System call from user mode
    Syscall,
    /// Software interrupt
    Software,
}

impl Trap {
    /// Check if the trap is an exception
    pub const fn is_exception(self) -> bool {
        matches!(self, Self::ArithmeticFault | Self::MemoryFault)
    }

    /// Check if the trap is raised by the running instruction stream
    pub const fn is_synchronous(self) -> bool {
        matches!(self, Self::ArithmeticFault | Self::MemoryFault | Self::Syscall)
    }

    /// Interrupt source bit for asynchronous traps
    pub const fn source(self) -> InterruptMask {
        match self {
            Self::Clock => InterruptMask::CLOCK,
            Self::Terminal => InterruptMask::TERMINAL,
            Self::Software => InterruptMask::SOFTWARE,
            _ => InterruptMask::empty(),
        }
    }

    /// Level the kernel runs at while handling this trap
    ///
    /// Terminal handling only masks the terminal and below; every other
    /// handler touches scheduler state and runs with everything masked.
    pub const fn handler_level(self) -> InterruptLevel {
        match self {
            Self::Terminal => InterruptLevel::Terminal,
            _ => InterruptLevel::Clock,
        }
    }
}
