// SPDX-License-Identifier: BSD-3-Clause

//! A thin [`spin::Mutex`] wrapper in the shape the teacher's own
//! `SpinLock` exposes (`framework/aster-frame/src/sync/spin.rs`): `lock`,
//! `try_lock`, a guard with `Deref`/`DerefMut`.
//!
//! Unlike the teacher's version, this one runs hosted rather than inside a
//! kernel, so there is no local-IRQ or preemption state to disable around
//! the critical section — that concern belongs to the platform layer the
//! spec places out of scope (§1, §5). What's kept is the busy-wait
//! acquire/release discipline, used for the root registry and parent-list
//! critical sections (§5 "Shared-resource policy"), which are always held
//! only briefly.

use core::fmt;
use core::ops::{Deref, DerefMut};

/// A spin lock guarding `T`.
pub struct SpinLock<T> {
    inner: spin::Mutex<T>,
}

impl<T> SpinLock<T> {
    pub const fn new(val: T) -> Self {
        Self {
            inner: spin::Mutex::new(val),
        }
    }

    /// Acquires the lock, busy-waiting until it becomes available.
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        SpinLockGuard {
            inner: self.inner.lock(),
        }
    }

    /// Tries to acquire the lock without blocking.
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        self.inner.try_lock().map(|inner| SpinLockGuard { inner })
    }
}

impl<T: fmt::Debug> fmt::Debug for SpinLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

/// An RAII guard for [`SpinLock`].
pub struct SpinLockGuard<'a, T> {
    inner: spin::MutexGuard<'a, T>,
}

impl<'a, T> Deref for SpinLockGuard<'a, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<'a, T> DerefMut for SpinLockGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}
