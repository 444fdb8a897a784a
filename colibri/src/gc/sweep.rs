// SPDX-License-Identifier: BSD-3-Clause

//! Finalizer sweep (spec §4.C step 7).
//!
//! Walks each collected generation's finalizer list, oldest first, and
//! for every custom word whose allocation bit came up clear after mark,
//! runs its free procedure. Survivors move up to the next generation's
//! list; words compaction relocated are skipped here because
//! [`crate::gc::mark::compact`] already re-registered their new cell
//! when it called back into [`crate::alloc::Allocator::alloc_record`].

use std::mem;

use crate::alloc::Allocator;
use crate::config::MAX_GENERATION;
use crate::word::CellRecord;

/// Sweeps every generation from `max_collected_gen` down to Eden.
pub fn sweep_finalizers(allocator: &mut Allocator, max_collected_gen: u8) {
    for generation in (1..=max_collected_gen).rev() {
        let entries = mem::take(&mut allocator.pool_mut(generation).finalizers);
        for id in entries {
            match allocator.record(id) {
                Some(CellRecord::Redirect(_)) => {
                    // Relocated by compaction; the new cell was already
                    // enqueued on its destination generation's list.
                }
                Some(_) if allocator.is_allocated(id) => {
                    let next_gen = (generation + 1).min(MAX_GENERATION);
                    allocator.pool_mut(next_gen).finalizers.push(id);
                }
                Some(_) => {
                    if let Some(record) = allocator.arena_mut().get_mut(id.page).take_record(id.slot)
                    {
                        if let CellRecord::Custom(mut custom) = *record {
                            custom.on_free();
                        }
                    }
                }
                None => {}
            }
        }
    }
}
