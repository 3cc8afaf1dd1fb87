//! # Kernel Configuration
//!
//! Table capacities are compile-time constants because every table is
//! statically sized. Timing and policy knobs live in [`KernelConfig`].

use crate::{ExecError, ExecResult};
use static_assertions::const_assert;

/// Number of slots in the process table
pub const MAX_PROCESSES: usize = 10;

/// Number of mutexes that may exist system-wide
pub const MAX_MUTEXES: usize = 16;

/// Number of mutexes a single process may have open
pub const MUTEXES_PER_PROCESS: usize = 4;

/// Longest accepted mutex name, in bytes
pub const MUTEX_NAME_LEN: usize = 8;

/// Longest accepted program name, in bytes
pub const PROGRAM_NAME_LEN: usize = 32;

const_assert!(MAX_PROCESSES > 0);
const_assert!(MUTEXES_PER_PROCESS > 0);
const_assert!(MUTEXES_PER_PROCESS <= MAX_MUTEXES);
const_assert!(MUTEX_NAME_LEN > 0);
const_assert!(PROGRAM_NAME_LEN >= MUTEX_NAME_LEN);

/// What happens to the waiters of a mutex when it becomes unlocked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WakePolicy {
    /// Every waiter becomes ready and retries the lock when it next runs
    #[default]
    WakeAll,
    /// Ownership passes directly to the longest waiter; only it is woken
    HandOff,
}

/// Configuration for the kernel core
#[derive(Debug, Clone)]
pub struct KernelConfig {
    /// Clock ticks per second
    pub ticks_per_second: u32,
    /// Quantum, in ticks
    pub time_slice_ticks: u32,
    /// User stack size for new processes, in bytes
    pub stack_size: usize,
    /// How long a mutex creator sleeps when the registry is full
    pub mutex_retry_seconds: u32,
    /// Give up creating a mutex after this many retries (`None` retries forever)
    pub mutex_retry_limit: Option<u32>,
    /// Waiter handling on unlock
    pub wake_policy: WakePolicy,
    /// Program started at boot
    pub init_program: &'static str,
}

impl KernelConfig {
    /// Default clock rate: 100 Hz
    pub const DEFAULT_TICKS_PER_SECOND: u32 = 100;
    /// Default quantum: 10 ticks
    pub const DEFAULT_TIME_SLICE_TICKS: u32 = 10;
    /// Default stack: 32 KiB
    pub const DEFAULT_STACK_SIZE: usize = 32 * 1024;
    /// Default program started at boot
    pub const DEFAULT_INIT_PROGRAM: &'static str = "init";

    /// Create default configuration
    pub const fn new() -> Self {
        Self {
            ticks_per_second: Self::DEFAULT_TICKS_PER_SECOND,
            time_slice_ticks: Self::DEFAULT_TIME_SLICE_TICKS,
            stack_size: Self::DEFAULT_STACK_SIZE,
            mutex_retry_seconds: 1,
            mutex_retry_limit: None,
            wake_policy: WakePolicy::WakeAll,
            init_program: Self::DEFAULT_INIT_PROGRAM,
        }
    }

    /// Create a configuration that hands mutexes straight to the next waiter
    pub fn hand_off() -> Self {
        Self {
            wake_policy: WakePolicy::HandOff,
            ..Self::new()
        }
    }

    /// Create a configuration that gives up on a full registry after `limit` retries
    pub fn bounded_retries(limit: u32) -> Self {
        Self {
            mutex_retry_limit: Some(limit),
            ..Self::new()
        }
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> ExecResult<()> {
        if self.ticks_per_second == 0 || self.time_slice_ticks == 0 {
            return Err(ExecError::InvalidArgument);
        }
        if self.stack_size == 0 || self.mutex_retry_seconds == 0 {
            return Err(ExecError::InvalidArgument);
        }
        if self.init_program.is_empty() || self.init_program.len() > PROGRAM_NAME_LEN {
            return Err(ExecError::InvalidArgument);
        }
        Ok(())
    }

    /// Convert whole seconds to clock ticks
    pub fn seconds_to_ticks(&self, seconds: u32) -> u32 {
        seconds.saturating_mul(self.ticks_per_second)
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::new()
    }
}
