//! # Minikernel HAL - Hardware Abstraction Layer
//!
//! This crate defines the contract between the kernel core and the platform
//! it runs on. The kernel never touches hardware directly; everything it needs
//! is reached through the traits below.
//!
//! ## Design Philosophy
//!
//! The HAL is designed to be:
//! - **Minimal**: Only exposes what the kernel core actually calls
//! - **Policy-free**: Scheduling and process decisions stay in the kernel
//! - **Substitutable**: A host-side double can stand in for real hardware
//!
//! ## Collaborators
//!
//! | Trait | Role |
//! |-------|------|
//! | [`CpuAbstraction`] | Interrupt levels, registers, context switch, idle wait |
//! | [`ImageLoader`] | Program images, user stacks, initial contexts |
//! | [`UserMemory`] | Copying data out of user address space |
//! | [`TerminalDevice`] | Character output and input |

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod cpu;
pub mod interrupts;
pub mod loader;
pub mod mmu;
pub mod terminal;

pub use cpu::{CpuAbstraction, CpuContext, LevelGuard};
pub use interrupts::{InterruptLevel, InterruptMask, Trap};
pub use loader::ImageLoader;
pub use mmu::UserMemory;
pub use terminal::TerminalDevice;

use core::fmt;

/// Result type for HAL operations
pub type HalResult<T> = Result<T, HalError>;

/// Errors that can occur in HAL operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalError {
    /// The operation is not supported by this platform
    NotSupported,
    /// Address is not mapped in the user address space
    InvalidAddress,
    /// Memory allocation failed
    OutOfMemory,
    /// Hardware reported an error
    HardwareError,
}

impl fmt::Display for HalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotSupported => write!(f, "operation not supported"),
            Self::InvalidAddress => write!(f, "invalid address"),
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::HardwareError => write!(f, "hardware error"),
        }
    }
}

/// The main HAL trait that platform implementations must provide
///
/// This trait aggregates all sub-traits the kernel core consumes. The
/// associated types are tied together so that the context produced by the
/// loader is the context the CPU knows how to switch to.
pub trait HardwareAbstractionLayer: Send + Sync {
    /// Saved register context of a process
    type Context: CpuContext;

    /// Opaque handle to a loaded program image
    type Image;

    /// Opaque handle to an allocated user stack
    type Stack;

    /// The CPU abstraction type
    type Cpu: CpuAbstraction<Context = Self::Context>;

    /// The image loader type
    type Loader: ImageLoader<Context = Self::Context, Image = Self::Image, Stack = Self::Stack>;

    /// The user memory accessor type
    type Memory: UserMemory;

    /// The terminal device type
    type Terminal: TerminalDevice;

    /// Get the CPU abstraction
    fn cpu(&self) -> &Self::Cpu;

    /// Get the image loader
    fn loader(&self) -> &Self::Loader;

    /// Get the user memory accessor
    fn memory(&self) -> &Self::Memory;

    /// Get the terminal device
    fn terminal(&self) -> &Self::Terminal;

    /// Fatal kernel error: report the message and stop the machine
    fn panic(&self, message: &str) -> !;
}

/// Virtual address type (architecture-independent)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct VirtAddr(u64);

impl VirtAddr {
    /// Null address
    pub const NULL: Self = Self(0);

    /// Create a new virtual address
    #[inline]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Get the raw address value
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Check whether this is the null address
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Add an offset to the address, returning `None` on wrap-around
    #[inline]
    pub const fn checked_add(self, offset: u64) -> Option<Self> {
        match self.0.checked_add(offset) {
            Some(addr) => Some(Self(addr)),
            None => None,
        }
    }
}

impl fmt::Display for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
