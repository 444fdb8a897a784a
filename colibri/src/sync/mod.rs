// SPDX-License-Identifier: BSD-3-Clause

//! Synchronization primitives used by the heap (spec §5).

mod group;
mod spin;

pub use group::GroupState;
pub use spin::{SpinLock, SpinLockGuard};
