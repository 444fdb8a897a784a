// SPDX-License-Identifier: BSD-3-Clause

//! The platform boundary (spec §1: "the platform layer (virtual-memory
//! reservation, per-thread data, inter-thread GC synchronization
//! primitives) ... treated only as external collaborators via their
//! interfaces to the core").
//!
//! Grounded on the teacher's own frame allocator
//! (`framework/aster-frame/src/vm/frame_allocator.rs`): a small
//! static/injectable source of fresh pages that the rest of the crate
//! calls into without knowing how pages are actually backed. The teacher
//! backs pages with real physical memory discovered from the boot
//! loader; [`DefaultPlatform`] backs them with ordinary heap allocations
//! and a configurable page budget, since Colibri runs hosted rather than
//! as a kernel.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Supplies fresh pages to the allocator and is the single point where a
/// host could plug in a different memory-acquisition strategy (e.g. a
/// fixed-size arena, or real `mmap`-backed pages).
pub trait Platform: Send + Sync {
    /// Requests permission to create one more page. Returns `false` if
    /// the platform refuses (spec §4.A "Failure semantics").
    fn request_page(&self) -> bool;

    /// Returns one page's worth of capacity to the platform.
    fn release_page(&self);
}

/// The default, hosted platform: heap-backed pages with an optional
/// upper bound on the number of live pages, used to exercise the
/// allocation-failure path in tests.
pub struct DefaultPlatform {
    max_pages: Option<usize>,
    live_pages: AtomicUsize,
}

impl DefaultPlatform {
    pub fn new() -> Self {
        Self {
            max_pages: None,
            live_pages: AtomicUsize::new(0),
        }
    }

    pub fn with_page_budget(max_pages: usize) -> Self {
        Self {
            max_pages: Some(max_pages),
            live_pages: AtomicUsize::new(0),
        }
    }
}

impl Default for DefaultPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for DefaultPlatform {
    fn request_page(&self) -> bool {
        match self.max_pages {
            None => {
                self.live_pages.fetch_add(1, Ordering::Relaxed);
                true
            }
            Some(max) => {
                let mut current = self.live_pages.load(Ordering::Relaxed);
                loop {
                    if current >= max {
                        return false;
                    }
                    match self.live_pages.compare_exchange_weak(
                        current,
                        current + 1,
                        Ordering::Relaxed,
                        Ordering::Relaxed,
                    ) {
                        Ok(_) => return true,
                        Err(observed) => current = observed,
                    }
                }
            }
        }
    }

    fn release_page(&self) {
        self.live_pages.fetch_sub(1, Ordering::Relaxed);
    }
}
