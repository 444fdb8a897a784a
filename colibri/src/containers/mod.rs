// SPDX-License-Identifier: BSD-3-Clause

//! Persistent container algorithms built on top of [`crate::word`] and
//! [`crate::alloc`] (spec §4.E).
//!
//! Every function here takes the allocator (and, where a container can
//! be mutated in place, a `&mut Allocator`) explicitly rather than
//! reaching for global state, matching the rest of the crate's
//! dependency-injected `Allocator`/`Roots` style. None of these
//! operations touch the root registry or parent registry themselves;
//! callers (the future heap facade) are responsible for rooting
//! whatever `Word` these return for as long as they need it.

pub mod hashmap;
pub mod list;
pub mod rope;
pub mod triemap;
pub mod vector;
