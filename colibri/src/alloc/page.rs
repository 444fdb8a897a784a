// SPDX-License-Identifier: BSD-3-Clause

//! Pages: fixed-size spans of cells carrying an allocation bitmap
//! (spec §3 "Page").
//!
//! The bitmap implementation is grounded directly on `libs/id-alloc`
//! (itself carried over from the teacher's `framework/libs/id-alloc`):
//! a `bitvec`-backed free-slot tracker with a "first available" hint,
//! used here exactly as the teacher's own frame allocator uses its
//! bitmap-backed `IdAlloc` to track which physical frames are free.

use bitflags::bitflags;
use id_alloc::IdAlloc;

use crate::config::CELLS_PER_PAGE;
use crate::word::CellRecord;

bitflags! {
    /// Per-page header flags (spec §3 "Page").
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct PageFlags: u8 {
        /// First page of a multi-page record run.
        const FIRST = 0b0001;
        /// Last page of a multi-page record run.
        const LAST = 0b0010;
        /// The page has at least one cross-generation child pointer
        /// (spec §3 "A page in generation g may reference only words in
        /// generations ≥ g, unless the page's PARENT flag is set").
        const PARENT = 0b0100;
        /// The page is write-protected by the platform's write-barrier
        /// mechanism (spec §4.A "Key policies").
        const PROTECTED = 0b1000;
    }
}

/// One page: a header plus `CELLS_PER_PAGE` data cells.
pub struct Page {
    pub generation: u8,
    pub flags: PageFlags,
    /// Links pages belonging to a single dedicated multi-page record
    /// together (spec §4.A "large requests ... flagged FIRST/LAST").
    /// Unused for ordinary, single-page records.
    pub next_in_run: Option<super::cell::PageId>,
    bitmap: IdAlloc,
    records: Vec<Option<Box<CellRecord>>>,
}

impl Page {
    pub fn new(generation: u8) -> Self {
        let mut records = Vec::with_capacity(CELLS_PER_PAGE);
        records.resize_with(CELLS_PER_PAGE, || None);
        Self {
            generation,
            flags: PageFlags::empty(),
            next_in_run: None,
            bitmap: IdAlloc::with_capacity(CELLS_PER_PAGE),
            records,
        }
    }

    /// Finds a contiguous run of `n` free cells and marks them allocated,
    /// returning the index of the first cell (spec §4.A `alloc_cells`).
    pub fn alloc_run(&mut self, n: usize) -> Option<u16> {
        self.bitmap
            .alloc_consecutive(n)
            .map(|range| range.start as u16)
    }

    /// Marks `n` cells starting at `slot` as allocated outright (used
    /// when promoting/compacting a record whose destination cells are
    /// already known, spec §4.C `mark_word`).
    pub fn mark_allocated(&mut self, slot: u16, n: usize) {
        for i in slot as usize..slot as usize + n {
            if !self.bitmap.is_allocated(i) {
                self.bitmap.alloc_specific(i);
            }
        }
    }

    pub fn is_allocated(&self, slot: u16) -> bool {
        self.bitmap.is_allocated(slot as usize)
    }

    pub fn set_record(&mut self, slot: u16, record: CellRecord) {
        self.records[slot as usize] = Some(Box::new(record));
    }

    pub fn record(&self, slot: u16) -> Option<&CellRecord> {
        self.records[slot as usize].as_deref()
    }

    pub fn record_mut(&mut self, slot: u16) -> Option<&mut CellRecord> {
        self.records[slot as usize].as_deref_mut()
    }

    pub fn take_record(&mut self, slot: u16) -> Option<Box<CellRecord>> {
        self.records[slot as usize].take()
    }

    /// Clears the whole allocation bitmap (spec §4.A `clear_bitmap`,
    /// used at the start of mark).
    pub fn clear_bitmap(&mut self) {
        for i in 0..CELLS_PER_PAGE {
            if self.bitmap.is_allocated(i) {
                self.bitmap.free(i);
            }
        }
    }

    /// Frees a record's cells and drops its stored data. Used by the
    /// sweeper (spec §4.C step 7) once a custom word's finalizer has run,
    /// and whenever the bitmap bit for an unmarked cell is discovered
    /// clear at the end of mark (the whole point of mark-and-sweep: an
    /// unmarked bit was never re-set, so its storage can simply be
    /// dropped).
    pub fn free_run(&mut self, slot: u16, n: usize) {
        for i in slot as usize..slot as usize + n {
            self.records[i] = None;
            if self.bitmap.is_allocated(i) {
                self.bitmap.free(i);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        (0..CELLS_PER_PAGE).all(|i| !self.bitmap.is_allocated(i))
    }

    pub fn live_cells(&self) -> usize {
        (0..CELLS_PER_PAGE).filter(|&i| self.bitmap.is_allocated(i)).count()
    }

    pub fn fill_ratio(&self) -> f64 {
        self.live_cells() as f64 / CELLS_PER_PAGE as f64
    }

    /// Iterates over all currently-allocated cell slots, used by
    /// `mark_from_parents` (spec §4.C step 5: "walk every allocated cell
    /// on the page").
    pub fn allocated_slots(&self) -> impl Iterator<Item = u16> + '_ {
        (0..CELLS_PER_PAGE).filter(|&i| self.bitmap.is_allocated(i)).map(|i| i as u16)
    }
}
