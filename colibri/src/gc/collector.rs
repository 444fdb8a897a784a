// SPDX-License-Identifier: BSD-3-Clause

//! The collection cycle itself (spec §4.C "Cycle").

use crate::alloc::cell::PageId;
use crate::alloc::page::PageFlags;
use crate::alloc::Allocator;
use crate::config::{
    COMPACT_FILL_RATIO, EDEN_GENERATION, GC_GENERATIONAL_FREQUENCY, GC_MAX_THRESHOLD,
    GC_MIN_THRESHOLD, GC_THRESHOLD_GENERATIONAL_FACTOR, MAX_GENERATION,
};
use crate::gc::mark::{mark_from_parent_page, mark_word, MarkContext};
use crate::gc::sweep::sweep_finalizers;
use crate::root::Roots;
use crate::word::Word;

/// Runs one full collection cycle, per the ten numbered steps of
/// spec §4.C.
pub fn collect(allocator: &mut Allocator, roots: &mut Roots) {
    let max_collected_gen = decide_max_collected_gen(allocator);
    let compacting_generation = decide_compacting_generation(allocator, max_collected_gen);

    clear_bitmaps(allocator, max_collected_gen);
    roots.parents.update_parents(allocator.arena_mut());
    mark_from_roots(allocator, roots, max_collected_gen, compacting_generation);
    mark_from_parents(allocator, roots, max_collected_gen, compacting_generation);
    roots
        .parents
        .purge_parents(allocator.arena_mut(), max_collected_gen);
    sweep_finalizers(allocator, max_collected_gen);
    allocator.free_empty_pages_in_range(EDEN_GENERATION, max_collected_gen);
    promote(allocator, max_collected_gen, compacting_generation);
    reset_counters(allocator, max_collected_gen);
}

/// Spec §4.C "Cycle": "iterating generations 2…MAX and stopping at the
/// first that fails either its per-generation allocation threshold or
/// its 'every factor-th collection' frequency gate; Eden is always
/// included."
fn decide_max_collected_gen(allocator: &Allocator) -> u8 {
    let mut max_gen = EDEN_GENERATION;
    for generation in (EDEN_GENERATION + 1)..=MAX_GENERATION {
        let pool = allocator.pool(generation);
        let due_by_frequency =
            pool.gc_cycles % GC_GENERATIONAL_FREQUENCY as usize == 0;
        let due_by_allocation = pool.allocations_since_gc >= generation_threshold(generation);
        if !due_by_frequency || !due_by_allocation {
            break;
        }
        max_gen = generation;
    }
    max_gen
}

fn generation_threshold(generation: u8) -> usize {
    let scale = GC_THRESHOLD_GENERATIONAL_FACTOR.saturating_pow((generation - 1) as u32);
    GC_MIN_THRESHOLD.saturating_mul(scale).clamp(GC_MIN_THRESHOLD, GC_MAX_THRESHOLD)
}

/// Spec §4.C step 1: the next uncollected pool's fill ratio decides
/// whether this cycle compacts.
fn decide_compacting_generation(allocator: &Allocator, max_collected_gen: u8) -> Option<u8> {
    let next = max_collected_gen + 1;
    if next > MAX_GENERATION {
        return None;
    }
    let pool = allocator.pool(next);
    let total_cells: usize = pool.pages().count() * crate::config::CELLS_PER_PAGE;
    if total_cells == 0 {
        return None;
    }
    let arena = allocator.arena();
    let live_cells: usize = pool.pages().map(|id| arena.get(id).live_cells()).sum();
    let fill_ratio = live_cells as f64 / total_cells as f64;
    (fill_ratio < COMPACT_FILL_RATIO).then_some(max_collected_gen)
}

fn clear_bitmaps(allocator: &mut Allocator, max_collected_gen: u8) {
    for generation in EDEN_GENERATION..=max_collected_gen {
        let pages: Vec<PageId> = allocator.pool(generation).pages().collect();
        for page in pages {
            allocator.arena_mut().get_mut(page).clear_bitmap();
        }
    }
}

fn mark_from_roots(
    allocator: &mut Allocator,
    roots: &mut Roots,
    max_collected_gen: u8,
    compacting_generation: Option<u8>,
) {
    let pinned: Vec<(Word, u8)> = {
        let mut out = Vec::new();
        roots.registry.for_each(|word, generation| {
            out.push((word.clone(), generation));
        });
        out
    };
    for (mut word, generation) in pinned {
        if generation > max_collected_gen {
            continue;
        }
        {
            let mut ctx = MarkContext {
                allocator: &mut *allocator,
                parents: &mut roots.parents,
                registry: &roots.registry,
                compacting_generation,
                max_collected_gen,
            };
            mark_word(&mut word, None, &mut ctx);
        }
        if let Some(id) = word.as_cell() {
            roots.registry.bump_generation(id.trie_key(), MAX_GENERATION);
        }
    }
}

fn mark_from_parents(
    allocator: &mut Allocator,
    roots: &mut Roots,
    max_collected_gen: u8,
    compacting_generation: Option<u8>,
) {
    let parent_pages: Vec<PageId> = roots.parents.iter().collect();
    for page in parent_pages {
        let generation = allocator.arena().get(page).generation;
        if generation <= max_collected_gen {
            continue;
        }
        let mut ctx = MarkContext {
            allocator: &mut *allocator,
            parents: &mut roots.parents,
            registry: &roots.registry,
            compacting_generation,
            max_collected_gen,
        };
        mark_from_parent_page(page, &mut ctx);
    }
}

/// Spec §4.C step 9: whole-page promotion for every collected generation
/// except the one that was individually compacted this cycle (its pages
/// are already empty by the time this runs, their content having moved
/// cell-by-cell via `compact`).
fn promote(allocator: &mut Allocator, max_collected_gen: u8, compacting_generation: Option<u8>) {
    for generation in EDEN_GENERATION..=max_collected_gen {
        if Some(generation) == compacting_generation {
            continue;
        }
        let next = (generation + 1).min(MAX_GENERATION);
        if next == generation {
            continue;
        }
        let pages: Vec<PageId> = allocator.pool(generation).pages().collect();
        for page in pages {
            allocator.promote_page(page, generation, next);
            let still_unflagged = !allocator.arena().get(page).flags.contains(PageFlags::PARENT);
            if still_unflagged {
                allocator.arena_mut().get_mut(page).flags.insert(PageFlags::PROTECTED);
            }
        }
    }
}

fn reset_counters(allocator: &mut Allocator, max_collected_gen: u8) {
    for generation in EDEN_GENERATION..=max_collected_gen {
        let pool = allocator.pool_mut(generation);
        pool.allocations_since_gc = 0;
        pool.gc_cycles += 1;
        pool.reset_hint();
    }
}

/// Spec §4.C "Trigger": "On the outermost unpause, GC runs if
/// `eden.nb_alloc ≥ threshold` where threshold is derived from the
/// oldest-generation-1 pool's page count scaled by a generational
/// factor (clamped between configured min/max values)."
pub fn should_collect(allocator: &Allocator) -> bool {
    let eden = allocator.pool(EDEN_GENERATION);
    let threshold = (eden.pages_allocated * GC_THRESHOLD_GENERATIONAL_FACTOR)
        .clamp(GC_MIN_THRESHOLD, GC_MAX_THRESHOLD);
    eden.allocations_since_gc >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::platform::DefaultPlatform;
    use crate::word::{CellRecord, WrapRecord};

    fn new_allocator() -> Allocator {
        Allocator::new(Box::new(DefaultPlatform::new()))
    }

    #[test]
    fn unreferenced_cell_is_collected() {
        let mut allocator = new_allocator();
        let mut roots = Roots::new();
        let id = allocator
            .alloc_record(
                EDEN_GENERATION,
                1,
                CellRecord::Wrap(WrapRecord { wrapped: Word::Nil }),
            )
            .unwrap();
        assert!(allocator.is_allocated(id));
        assert_eq!(allocator.arena().page_count(), 1);

        collect(&mut allocator, &mut roots);

        // The cell was never rooted, so it comes up unmarked; being the
        // page's only occupant, the whole page is then reclaimed.
        assert_eq!(allocator.arena().page_count(), 0);
    }

    #[test]
    fn pinned_cell_survives_and_its_children_are_kept_alive() {
        let mut allocator = new_allocator();
        let mut roots = Roots::new();
        let child = allocator
            .alloc_record(
                EDEN_GENERATION,
                1,
                CellRecord::Wrap(WrapRecord { wrapped: Word::SmallInt(1) }),
            )
            .unwrap();
        let parent = allocator
            .alloc_record(
                EDEN_GENERATION,
                1,
                CellRecord::Wrap(WrapRecord {
                    wrapped: Word::Cell(child),
                }),
            )
            .unwrap();

        roots.preserve(&Word::Cell(parent), &allocator);
        collect(&mut allocator, &mut roots);

        assert!(allocator.is_allocated(parent));
        assert!(allocator.is_allocated(child));
    }

    #[test]
    fn should_collect_reports_false_on_a_fresh_allocator() {
        let allocator = new_allocator();
        assert!(!should_collect(&allocator));
    }
}
