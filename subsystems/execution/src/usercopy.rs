//! Reading system-call arguments out of user memory.

use crate::{ExecError, ExecResult};
use minikernel_hal::{UserMemory, VirtAddr};

/// Bytes moved per user-memory copy when forwarding a buffer
const CHUNK: usize = 64;

/// Read a NUL-terminated string of at most `N` bytes
pub(crate) fn read_user_str<M: UserMemory + ?Sized, const N: usize>(
    memory: &M,
    addr: VirtAddr,
) -> ExecResult<heapless::String<N>> {
    if addr.is_null() {
        return Err(ExecError::BadAddress);
    }
    let mut bytes: heapless::Vec<u8, N> = heapless::Vec::new();
    for offset in 0..=N as u64 {
        let at = addr.checked_add(offset).ok_or(ExecError::BadAddress)?;
        let mut byte = [0u8; 1];
        memory.copy_from_user(at, &mut byte)?;
        if byte[0] == 0 {
            let text = core::str::from_utf8(&bytes).map_err(|_| ExecError::InvalidArgument)?;
            let mut owned = heapless::String::new();
            owned.push_str(text).map_err(|_| ExecError::NameTooLong)?;
            return Ok(owned);
        }
        bytes.push(byte[0]).map_err(|_| ExecError::NameTooLong)?;
    }
    Err(ExecError::NameTooLong)
}

/// Copy `len` bytes from user memory, handing them to `sink` chunk by chunk
pub(crate) fn copy_user_chunks<M, F>(
    memory: &M,
    addr: VirtAddr,
    len: u64,
    mut sink: F,
) -> ExecResult<()>
where
    M: UserMemory + ?Sized,
    F: FnMut(&[u8]),
{
    let mut buf = [0u8; CHUNK];
    let mut done = 0u64;
    while done < len {
        let count = (len - done).min(CHUNK as u64) as usize;
        let at = addr.checked_add(done).ok_or(ExecError::BadAddress)?;
        memory.copy_from_user(at, &mut buf[..count])?;
        sink(&buf[..count]);
        done += count as u64;
    }
    Ok(())
}
