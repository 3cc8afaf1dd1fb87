//! # Minikernel Execution Subsystem
//!
//! The execution subsystem is the concurrency core of the kernel:
//! - Process table and process lifecycle
//! - FIFO scheduling with round-robin time slicing
//! - Timed sleep driven by the clock
//! - Named mutexes with recursive and non-recursive semantics
//! - Trap dispatch and the system-call table
//!
//! ## Execution Model
//!
//! There is a single CPU and a single kernel stack. Every trap runs to
//! completion at a raised interrupt level. A process that has to wait is
//! parked on a queue together with the work it still has to finish (its
//! [`process::Resume`] step); when the scheduler picks it again that step is
//! run before control returns to user mode. The register context of the
//! process chosen last is made live on the CPU as the trap exits.
//!
//! All storage is bounded and statically sized: the process table, the mutex
//! registry, every queue and every descriptor table.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod config;
pub mod kernel;
pub mod process;
pub mod scheduler;
pub mod slab;
pub mod sync;
pub mod syscall;
pub mod timer;
pub mod trap;

mod usercopy;

#[cfg(test)]
mod mock;

pub use config::{KernelConfig, WakePolicy};
pub use kernel::Kernel;
pub use process::{ProcessInfo, ProcessState};
pub use scheduler::metrics::SchedulerStats;
pub use sync::{MutexInfo, MutexKind, LockState};
pub use syscall::Service;

use core::fmt;
use minikernel_hal::HalError;

/// Unique identifier for processes
///
/// A process id is the index of its slot in the process table, so ids are
/// reused once a slot is freed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(usize);

impl ProcessId {
    /// Create a process ID from a table slot
    pub const fn new(slot: usize) -> Self {
        Self(slot)
    }

    /// Get the table slot
    pub const fn slot(self) -> usize {
        self.0
    }

    /// Get the raw ID value
    pub const fn as_u64(self) -> u64 {
        self.0 as u64
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for mutexes
///
/// Mutex ids come from a monotonically increasing counter and are never
/// reused while the kernel runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MutexId(u64);

impl MutexId {
    /// Create a mutex ID from its raw value
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw ID value
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MutexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Execution result type
pub type ExecResult<T> = Result<T, ExecError>;

/// Execution errors
///
/// Each error has a stable negative code that is what user programs see in
/// the result register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecError {
    /// Service number outside the system-call table
    NoSuchService,
    /// No free slot in the process table
    ProcessTableFull,
    /// The loader could not produce an image for the program
    ImageLoadFailed,
    /// A mutex with this name already exists
    DuplicateMutexName,
    /// No mutex with this name or id exists
    MutexNotFound,
    /// The caller's mutex descriptor table is full
    TooManyOpenMutexes,
    /// The caller does not have this mutex open
    NotOpenedByCaller,
    /// The caller does not own this mutex
    NotOwner,
    /// Non-recursive mutex locked again by its owner
    SelfDeadlock,
    /// Malformed argument
    InvalidArgument,
    /// Name longer than the kernel accepts
    NameTooLong,
    /// User pointer does not reference readable memory
    BadAddress,
    /// The system-wide mutex registry stayed full
    MutexRegistryFull,
    /// Operation needs a running process and there is none
    NoCurrentProcess,
}

impl ExecError {
    /// Code delivered to user mode
    pub const fn code(self) -> i64 {
        match self {
            Self::NoSuchService => -1,
            Self::ProcessTableFull => -2,
            Self::ImageLoadFailed => -3,
            Self::DuplicateMutexName => -4,
            Self::MutexNotFound => -5,
            Self::TooManyOpenMutexes => -6,
            Self::NotOpenedByCaller => -7,
            Self::NotOwner => -8,
            Self::SelfDeadlock => -9,
            Self::InvalidArgument => -10,
            Self::NameTooLong => -11,
            Self::BadAddress => -12,
            Self::MutexRegistryFull => -13,
            Self::NoCurrentProcess => -14,
        }
    }
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NoSuchService => "no such service",
            Self::ProcessTableFull => "process table full",
            Self::ImageLoadFailed => "image load failed",
            Self::DuplicateMutexName => "duplicate mutex name",
            Self::MutexNotFound => "mutex not found",
            Self::TooManyOpenMutexes => "too many open mutexes",
            Self::NotOpenedByCaller => "mutex not opened by caller",
            Self::NotOwner => "caller does not own mutex",
            Self::SelfDeadlock => "non-recursive mutex already held by caller",
            Self::InvalidArgument => "invalid argument",
            Self::NameTooLong => "name too long",
            Self::BadAddress => "bad address",
            Self::MutexRegistryFull => "mutex registry full",
            Self::NoCurrentProcess => "no current process",
        };
        f.write_str(text)
    }
}

impl From<HalError> for ExecError {
    fn from(err: HalError) -> Self {
        match err {
            HalError::InvalidAddress => Self::BadAddress,
            HalError::OutOfMemory => Self::ImageLoadFailed,
            HalError::NotSupported | HalError::HardwareError => Self::InvalidArgument,
        }
    }
}

/// How a kernel operation left the calling process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Finished; the value goes to the caller's result register
    Complete(i64),
    /// The caller left the CPU (blocked or terminated); pick another process
    Deschedule,
}

impl Outcome {
    /// Fold an error into its user-visible code
    pub fn settle(result: ExecResult<Outcome>) -> Outcome {
        match result {
            Ok(outcome) => outcome,
            Err(err) => Outcome::Complete(err.code()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_distinct_and_negative() {
        let all = [
            ExecError::NoSuchService,
            ExecError::ProcessTableFull,
            ExecError::ImageLoadFailed,
            ExecError::DuplicateMutexName,
            ExecError::MutexNotFound,
            ExecError::TooManyOpenMutexes,
            ExecError::NotOpenedByCaller,
            ExecError::NotOwner,
            ExecError::SelfDeadlock,
            ExecError::InvalidArgument,
            ExecError::NameTooLong,
            ExecError::BadAddress,
            ExecError::MutexRegistryFull,
            ExecError::NoCurrentProcess,
        ];
        for (i, a) in all.iter().enumerate() {
            assert!(a.code() < 0);
            for b in &all[i + 1..] {
                assert_ne!(a.code(), b.code());
            }
        }
        assert_eq!(ExecError::NoSuchService.code(), -1);
    }

    #[test]
    fn test_settle() {
        assert_eq!(Outcome::settle(Ok(Outcome::Complete(3))), Outcome::Complete(3));
        assert_eq!(Outcome::settle(Ok(Outcome::Deschedule)), Outcome::Deschedule);
        assert_eq!(
            Outcome::settle(Err(ExecError::NotOwner)),
            Outcome::Complete(-8)
        );
    }

    #[test]
    fn test_hal_error_mapping() {
        assert_eq!(ExecError::from(HalError::InvalidAddress), ExecError::BadAddress);
    }
}
