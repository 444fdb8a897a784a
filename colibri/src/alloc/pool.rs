// SPDX-License-Identifier: BSD-3-Clause

//! Per-generation pools (spec §3 "Pool", §4.A "Key policies").
//!
//! A pool owns the pages belonging to one generation and the bookkeeping
//! needed to allocate into them cheaply: a run of pages, a "last free
//! cell" hint per run size to accelerate the linear scan, and the
//! counters the collector uses to decide when to run (spec §4.C
//! "Trigger policy").
//!
//! Grounded on the teacher's per-CPU frame-allocator pools
//! (`framework/aster-frame/src/vm/frame_allocator.rs`), which likewise
//! keep a page list plus a cached allocation cursor rather than
//! rescanning from the start of the list on every request.

use std::collections::VecDeque;

use super::arena::Arena;
use super::cell::{CellId, PageId};
use super::platform::Platform;
use crate::config::{CELLS_PER_PAGE, LARGE_ALLOC_PAGE_THRESHOLD};

/// Where an allocation landed, or why it could not be satisfied.
pub enum AllocOutcome {
    /// First page and slot of the allocated run.
    Placed(PageId, u16),
    /// The platform refused to grant the pages this request needed.
    OutOfMemory,
}

pub struct Pool {
    pub generation: u8,
    pages: VecDeque<PageId>,
    /// Cached page to resume scanning from; reset on promotion and after
    /// each collection (spec §4.A "the hint is reset on promotion and
    /// after GC").
    hint: Option<PageId>,
    pub pages_allocated: usize,
    pub allocations_since_gc: usize,
    pub gc_cycles: usize,
    /// This generation's finalizer sweep list: every live custom-typed
    /// cell whose descriptor has a non-null finalizer (spec §3
    /// "Lifecycle": "finalizable customs are enqueued on creation and
    /// dequeued on sweep"). A `Vec` stands in for the spec's singly-linked
    /// sweep list; nothing but membership and iteration order matters.
    pub finalizers: Vec<CellId>,
}

impl Pool {
    pub fn new(generation: u8) -> Self {
        Self {
            generation,
            pages: VecDeque::new(),
            hint: None,
            pages_allocated: 0,
            allocations_since_gc: 0,
            gc_cycles: 0,
            finalizers: Vec::new(),
        }
    }

    pub fn reset_hint(&mut self) {
        self.hint = self.pages.front().copied();
    }

    pub fn pages(&self) -> impl Iterator<Item = PageId> + '_ {
        self.pages.iter().copied()
    }

    pub fn adopt_page(&mut self, id: PageId) {
        self.pages.push_back(id);
        self.pages_allocated += 1;
        if self.hint.is_none() {
            self.hint = Some(id);
        }
    }

    pub fn remove_page(&mut self, id: PageId) {
        self.pages.retain(|&p| p != id);
        self.pages_allocated = self.pages_allocated.saturating_sub(1);
        if self.hint == Some(id) {
            self.hint = self.pages.front().copied();
        }
    }

    /// Satisfies a request for `n` contiguous cells (spec §4.A
    /// `alloc_cells`): scans from the cached hint first, falls back to a
    /// full scan of the pool's existing pages, then allocates one or more
    /// fresh pages from `arena`/`platform`.
    ///
    /// Requests needing at least [`LARGE_ALLOC_PAGE_THRESHOLD`] pages take
    /// the dedicated multi-page run path instead of searching for a fit
    /// among ordinary pages (spec §4.A "large requests bypass the normal
    /// per-page scan and are given a dedicated run of freshly allocated
    /// pages").
    pub fn alloc_cells(
        &mut self,
        n: usize,
        arena: &mut Arena,
        platform: &dyn Platform,
        on_fatal: impl FnOnce(),
    ) -> AllocOutcome {
        let pages_needed = n.div_ceil(CELLS_PER_PAGE);
        if pages_needed >= LARGE_ALLOC_PAGE_THRESHOLD {
            return self.alloc_large_run(n, pages_needed, arena, platform, on_fatal);
        }

        if let Some(hint) = self.hint {
            if let Some(slot) = arena.get_mut(hint).alloc_run(n) {
                self.allocations_since_gc += 1;
                return AllocOutcome::Placed(hint, slot);
            }
        }

        for id in self.pages.iter().copied() {
            if let Some(slot) = arena.get_mut(id).alloc_run(n) {
                self.hint = Some(id);
                self.allocations_since_gc += 1;
                return AllocOutcome::Placed(id, slot);
            }
        }

        let Some(id) = arena.new_page(self.generation, platform) else {
            on_fatal();
            return AllocOutcome::OutOfMemory;
        };
        self.adopt_page(id);
        let slot = arena
            .get_mut(id)
            .alloc_run(n)
            .expect("a freshly created page must fit a request under the page capacity");
        self.hint = Some(id);
        self.allocations_since_gc += 1;
        AllocOutcome::Placed(id, slot)
    }

    fn alloc_large_run(
        &mut self,
        n: usize,
        pages_needed: usize,
        arena: &mut Arena,
        platform: &dyn Platform,
        on_fatal: impl FnOnce(),
    ) -> AllocOutcome {
        let mut first_id = None;
        let mut remaining = n;
        let mut prev: Option<PageId> = None;
        let mut run: Vec<PageId> = Vec::with_capacity(pages_needed);
        for i in 0..pages_needed {
            let Some(id) = arena.new_page(self.generation, platform) else {
                for placed in run {
                    arena.free(placed, platform);
                    self.remove_page(placed);
                }
                on_fatal();
                return AllocOutcome::OutOfMemory;
            };
            run.push(id);
            let take = remaining.min(CELLS_PER_PAGE);
            let slot = arena
                .get_mut(id)
                .alloc_run(take)
                .expect("fresh page always fits its share of a dedicated run");
            remaining -= take;
            let page = arena.get_mut(id);
            if i == 0 {
                page.flags |= super::page::PageFlags::FIRST;
                first_id = Some((id, slot));
            }
            if i + 1 == pages_needed {
                page.flags |= super::page::PageFlags::LAST;
            }
            if let Some(prev_id) = prev {
                arena.get_mut(prev_id).next_in_run = Some(id);
            }
            self.adopt_page(id);
            prev = Some(id);
        }
        self.allocations_since_gc += 1;
        match first_id {
            Some((id, slot)) => AllocOutcome::Placed(id, slot),
            None => AllocOutcome::OutOfMemory,
        }
    }
}
