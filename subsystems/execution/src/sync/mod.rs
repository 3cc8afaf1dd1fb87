//! # Synchronization
//!
//! Named kernel mutexes shared between processes.
//!
//! A process must open a mutex (by name) before it can lock it. Creating a
//! mutex opens it for the creator. The mutex is destroyed when the last
//! process closes it.
//!
//! ```text
//!           lock                 lock (recursive, owner)
//! Unlocked ------> Locked(1) ---------------------------> Locked(n+1)
//!     ^                |  unlock / close by owner              |
//!     +----------------+<--------------------------------------+
//!                         unlock until hold count is 0
//! ```

mod mutex;
pub mod registry;

pub use registry::{
    mutex_name, LockState, MutexInfo, MutexKind, MutexName, MutexRecord, MutexRegistry,
};
