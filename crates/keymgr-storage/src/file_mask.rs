//! Scoped narrowing of the process file-creation mask.
//!
//! The mask is process-wide state. Every swap goes through `MASK_LOCK` so two
//! guards in different threads cannot restore each other's narrowed value.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::trace;

static MASK_LOCK: Mutex<()> = Mutex::new(());

/// Strips every group and other permission bit from newly created files.
pub const KEY_FILE_MASK: u32 = 0o077;

/// Holds a narrowed creation mask until dropped, then restores the previous one.
#[must_use = "the mask is restored as soon as the guard is dropped"]
pub struct FileMaskGuard {
    previous: u32,
    _lock: MutexGuard<'static, ()>,
}

impl FileMaskGuard {
    pub fn narrow(mask: u32) -> Self {
        let lock = MASK_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = swap_mask(mask);
        trace!(
            mask = format_args!("{mask:o}"),
            previous = format_args!("{previous:o}"),
            "narrowed file mask"
        );
        Self {
            previous,
            _lock: lock,
        }
    }
}

impl Drop for FileMaskGuard {
    fn drop(&mut self) {
        swap_mask(self.previous);
    }
}

/// Current process creation mask.
pub fn current_mask() -> u32 {
    let _lock = MASK_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    let current = swap_mask(0);
    swap_mask(current);
    current
}

#[cfg(unix)]
fn swap_mask(mask: u32) -> u32 {
    // SAFETY: umask has no failure modes and touches no memory.
    let previous = unsafe { libc::umask(mask as libc::mode_t) };
    previous as u32
}

#[cfg(not(unix))]
fn swap_mask(_mask: u32) -> u32 {
    0
}
