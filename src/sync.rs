#[cfg(not(feature = "portable-atomic"))]
mod inner {
    pub(crate) use alloc::sync::Arc;
    pub(crate) use core::sync::atomic::{AtomicUsize, Ordering};
}

#[cfg(feature = "portable-atomic")]
mod inner {
    pub(crate) use portable_atomic::{AtomicUsize, Ordering};
    pub(crate) use portable_atomic_util::Arc;
}

pub(crate) use inner::*;

use spin::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A reader/writer lock guarding shared registry state.
///
/// Any number of readers may hold the lock at once; a writer excludes both
/// readers and other writers. Guards release the lock when dropped, so a
/// critical section is exactly the lifetime of the guard.
pub(crate) struct SharedLock<T> {
    inner: RwLock<T>,
}

impl<T> SharedLock<T> {
    pub(crate) const fn new(value: T) -> Self {
        Self {
            inner: RwLock::new(value),
        }
    }

    #[inline]
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, T> {
        self.inner.read()
    }

    #[inline]
    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.inner.write()
    }
}
