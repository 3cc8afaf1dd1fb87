//! # User Memory Access
//!
//! System calls pass pointers into the caller's address space. The kernel
//! only ever reads through them, and only via this trait.

use crate::{HalResult, VirtAddr};

/// Access to the address space of the trapping process
pub trait UserMemory: Send + Sync {
    /// Copy `buf.len()` bytes starting at `addr` into `buf`
    ///
    /// Fails with [`crate::HalError::InvalidAddress`] if any byte of the
    /// range is not readable by the process.
    fn copy_from_user(&self, addr: VirtAddr, buf: &mut [u8]) -> HalResult<()>;
}
