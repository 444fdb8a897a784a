// SPDX-License-Identifier: BSD-3-Clause

//! Cell allocator and page pools (spec §4.A).
//!
//! Ties [`cell`], [`page`], [`pool`] and [`platform`] together behind the
//! allocator's public contract: `alloc_record` hands out fresh cells,
//! `clear_bitmaps`/`free_empty_pages` bracket a collection cycle, and
//! `promote_page` moves a page from one generation's pool to the next
//! (spec §4.C step 9, "Compacting promotion").

pub mod arena;
pub mod cell;
pub mod page;
pub mod platform;
pub mod pool;

use arena::Arena;
use cell::{CellId, PageId};
use platform::Platform;
use pool::{AllocOutcome, Pool};

use crate::config::MAX_GENERATION;
use crate::error::{Error, Result};
use crate::word::CellRecord;

/// Owns every page and pool in the heap. One [`Allocator`] backs one
/// `GroupData` (spec §1 "the core exposes exactly one `Platform`
/// collaborator per GC group").
pub struct Allocator {
    arena: Arena,
    pools: Vec<Pool>,
    platform: Box<dyn Platform>,
}

impl Allocator {
    pub fn new(platform: Box<dyn Platform>) -> Self {
        let pools = (0..=MAX_GENERATION).map(Pool::new).collect();
        Self {
            arena: Arena::new(),
            pools,
            platform,
        }
    }

    pub fn pool_mut(&mut self, generation: u8) -> &mut Pool {
        &mut self.pools[generation as usize]
    }

    pub fn pool(&self, generation: u8) -> &Pool {
        &self.pools[generation as usize]
    }

    pub fn pools(&self) -> impl Iterator<Item = &Pool> {
        self.pools.iter()
    }

    pub fn pools_mut(&mut self) -> impl Iterator<Item = &mut Pool> {
        self.pools.iter_mut()
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    /// Allocates and stores one record in `generation`'s pool, returning
    /// its identity (spec §4.A `alloc_cells`, composed with the record's
    /// own cell-count policy).
    pub fn alloc_record(
        &mut self,
        generation: u8,
        cells_needed: usize,
        record: CellRecord,
    ) -> Result<CellId> {
        let needs_finalizer = matches!(&record, CellRecord::Custom(c) if c.has_finalizer());
        let outcome = self.pool_mut(generation).alloc_cells(
            cells_needed,
            &mut self.arena,
            self.platform.as_ref(),
            || log::error!("colibri: platform out of memory allocating {cells_needed} cells"),
        );
        match outcome {
            AllocOutcome::Placed(page, slot) => {
                self.arena.get_mut(page).set_record(slot, record);
                let id = CellId::new(page, slot);
                if needs_finalizer {
                    self.pool_mut(generation).finalizers.push(id);
                }
                Ok(id)
            }
            AllocOutcome::OutOfMemory => Err(Error::OutOfMemory),
        }
    }

    pub fn record(&self, id: CellId) -> Option<&CellRecord> {
        self.arena.get(id.page).record(id.slot)
    }

    pub fn record_mut(&mut self, id: CellId) -> Option<&mut CellRecord> {
        self.arena.get_mut(id.page).record_mut(id.slot)
    }

    pub fn is_allocated(&self, id: CellId) -> bool {
        self.arena.get(id.page).is_allocated(id.slot)
    }

    /// Follows a chain of [`CellRecord::Redirect`]s to the cell's current
    /// location. Containers call this before dereferencing any `CellId`
    /// read out of structurally-shared storage (an immutable vector's
    /// elements, a custom word's advertised children), since marking
    /// those leaves stale redirects unresolved rather than rewriting them
    /// in place (see `gc::mark::mark_word_shared`).
    pub fn resolve(&self, mut id: CellId) -> CellId {
        while let Some(CellRecord::Redirect(target)) = self.record(id) {
            id = *target;
        }
        id
    }

    pub fn mark_allocated(&mut self, id: CellId, cells: usize) {
        self.arena.get_mut(id.page).mark_allocated(id.slot, cells);
    }

    /// Clears every page's allocation bitmap (spec §4.C step 1, "Clear
    /// bitmaps": live cells are re-marked by the upcoming mark phase, so
    /// whatever is left clear at the end of mark is garbage).
    pub fn clear_bitmaps(&mut self) {
        for id in self.all_page_ids() {
            self.arena.get_mut(id).clear_bitmap();
        }
    }

    /// Reclaims every page left with zero live cells after a sweep (spec
    /// §4.C step 8, "Free empty pages"), restricted to `low..=high`
    /// (the pools actually collected this cycle).
    pub fn free_empty_pages_in_range(&mut self, low: u8, high: u8) {
        for generation in low..=high {
            let empties: Vec<PageId> = self.pools[generation as usize]
                .pages()
                .filter(|&id| self.arena.get(id).is_empty())
                .collect();
            for id in empties {
                self.pools[generation as usize].remove_page(id);
                self.arena.free(id, self.platform.as_ref());
            }
            self.pools[generation as usize].reset_hint();
        }
    }

    /// Reclaims empty pages across every generation, for use outside a
    /// GC cycle (e.g. after bulk manual frees in tests).
    pub fn free_empty_pages(&mut self) {
        self.free_empty_pages_in_range(0, MAX_GENERATION);
    }

    /// Moves a page from `from` generation's pool into `to`'s (spec §4.C
    /// step 9: pages surviving enough cycles are promoted wholesale
    /// rather than their cells being copied one by one).
    pub fn promote_page(&mut self, id: PageId, from: u8, to: u8) {
        self.pools[from as usize].remove_page(id);
        self.arena.get_mut(id).generation = to;
        self.pools[to as usize].adopt_page(id);
    }

    fn all_page_ids(&self) -> Vec<PageId> {
        self.pools.iter().flat_map(|p| p.pages()).collect()
    }
}
