// SPDX-License-Identifier: BSD-3-Clause

//! The mark phase (spec §4.C `mark_word`).
//!
//! `mark_word` is tail-recursive in the original design so that long
//! chains (a rope's spine, a list's concat tree) don't blow the call
//! stack; the loop in [`mark_cell`] is that tail-call turned into
//! iteration, matching the teacher's own preference for an explicit loop
//! over recursion in its page-table walkers
//! (`framework/aster-frame/src/vm/page_table/cursor.rs`, whose `Cursor`
//! drives `move_forward`/`level_up`/`level_down` with `while`/`loop`
//! rather than recursing down the page-table tree).

use crate::alloc::cell::{CellId, PageId};
use crate::alloc::page::PageFlags;
use crate::alloc::Allocator;
use crate::root::{ParentRegistry, RootRegistry};
use crate::word::{CellRecord, Word};

pub struct MarkContext<'a> {
    pub allocator: &'a mut Allocator,
    pub parents: &'a mut ParentRegistry,
    pub registry: &'a RootRegistry,
    /// The generation being compacted this cycle, if any (spec §4.C
    /// step 1 "Compact-decision").
    pub compacting_generation: Option<u8>,
    pub max_collected_gen: u8,
}

/// Marks `word` reachable, rewriting it in place when redirects or
/// compaction change its address (spec §4.C `mark_word`).
pub fn mark_word(word: &mut Word, parent_page: Option<PageId>, ctx: &mut MarkContext) {
    match word {
        Word::CircularList(core) => mark_word(core, parent_page, ctx),
        Word::Cell(id) => {
            let mut id = *id;
            mark_cell(&mut id, parent_page, ctx);
            *word = Word::Cell(id);
        }
        _ => {}
    }
}

/// Marks a word reached through a structurally-shared `Rc` (an
/// immutable vector's elements, a custom word's advertised children):
/// these cannot be rewritten in place without breaking every other
/// holder of the same `Rc`, so redirects into them are left to be
/// resolved lazily on next access via [`crate::alloc::Allocator::resolve`]
/// instead of eagerly here.
pub fn mark_word_shared(word: &Word, parent_page: Option<PageId>, ctx: &mut MarkContext) {
    match word {
        Word::CircularList(core) => mark_word_shared(core, parent_page, ctx),
        Word::Cell(id) => {
            let mut id = *id;
            mark_cell(&mut id, parent_page, ctx);
        }
        _ => {}
    }
}

fn mark_cell(id: &mut CellId, parent_page: Option<PageId>, ctx: &mut MarkContext) {
    loop {
        if let Some(CellRecord::Redirect(target)) = ctx.allocator.record(*id) {
            *id = *target;
            continue;
        }

        let page_generation = ctx.allocator.arena().get(id.page).generation;
        if let Some(pp) = parent_page {
            install_write_barrier_if_needed(pp, page_generation, ctx);
        }

        if ctx.allocator.is_allocated(*id) {
            return;
        }

        if ctx.compacting_generation == Some(page_generation)
            && !ctx.registry.is_pinned(id.trie_key())
        {
            // `compact` allocates the destination cell, which already
            // marks its bitmap bit, so the loop's own allocated-bit
            // check above would short-circuit before ever visiting its
            // children; recurse into them directly instead.
            *id = compact(*id, page_generation, ctx);
            let mut record = ctx
                .allocator
                .arena_mut()
                .get_mut(id.page)
                .take_record(id.slot)
                .expect("compaction destination holds the freshly copied record");
            mark_record_children(&mut record, id.page, ctx);
            ctx.allocator
                .arena_mut()
                .get_mut(id.page)
                .set_record(id.slot, *record);
            return;
        }

        let cells = ctx
            .allocator
            .record(*id)
            .expect("mark_cell only reaches unvisited live cells")
            .cell_count();
        ctx.allocator.mark_allocated(*id, cells);

        let mut record = ctx
            .allocator
            .arena_mut()
            .get_mut(id.page)
            .take_record(id.slot)
            .expect("cell just marked allocated still holds its record");
        mark_record_children(&mut record, id.page, ctx);
        ctx.allocator
            .arena_mut()
            .get_mut(id.page)
            .set_record(id.slot, *record);
        return;
    }
}

fn install_write_barrier_if_needed(parent_page: PageId, child_generation: u8, ctx: &mut MarkContext) {
    let parent_generation = ctx.allocator.arena().get(parent_page).generation;
    if child_generation < parent_generation
        && !ctx
            .allocator
            .arena()
            .get(parent_page)
            .flags
            .contains(PageFlags::PARENT)
    {
        ctx.allocator
            .arena_mut()
            .get_mut(parent_page)
            .flags
            .insert(PageFlags::PARENT);
        ctx.parents.note_discovered(parent_page);
    }
}

/// Individually copies a record into the next generation, installing a
/// forwarding redirect behind it (spec §4.C `mark_word`: "allocate the
/// required cells in the next generation, byte-copy the record, install
/// a redirect in the old cell, rewrite the slot to the new address").
fn compact(old: CellId, generation: u8, ctx: &mut MarkContext) -> CellId {
    let record = ctx
        .allocator
        .arena_mut()
        .get_mut(old.page)
        .take_record(old.slot)
        .expect("compaction only visits live cells");
    let cells = record.cell_count();
    let new_id = ctx
        .allocator
        .alloc_record(generation + 1, cells, *record)
        .expect("compaction never allocates a size the old cell didn't already fit");
    ctx.allocator
        .arena_mut()
        .get_mut(old.page)
        .set_record(old.slot, CellRecord::Redirect(new_id));
    new_id
}

/// Spec §4.C step 5 ("Mark from parents"): walks every allocated cell on
/// an uncollected parent page and marks its children, without marking
/// the parent cell itself (its own generation wasn't cleared, so it's
/// already known live).
pub fn mark_from_parent_page(page: PageId, ctx: &mut MarkContext) {
    let slots: Vec<u16> = ctx.allocator.arena().get(page).allocated_slots().collect();
    for slot in slots {
        let mut record = match ctx.allocator.arena_mut().get_mut(page).take_record(slot) {
            Some(r) => r,
            None => continue,
        };
        mark_record_children(&mut record, page, ctx);
        ctx.allocator.arena_mut().get_mut(page).set_record(slot, *record);
    }
}

fn mark_record_children(record: &mut CellRecord, owner: PageId, ctx: &mut MarkContext) {
    if let CellRecord::Vector(v) = record {
        for child in v.elements.iter() {
            mark_word_shared(child, Some(owner), ctx);
        }
    }
    if let CellRecord::Custom(custom) = record {
        for child in custom.children() {
            mark_word_shared(&child, Some(owner), ctx);
        }
    }
    for child in record.children_mut() {
        mark_word(child, Some(owner), ctx);
    }
    for child_id in record.child_cells_mut() {
        mark_cell(child_id, Some(owner), ctx);
    }
}
