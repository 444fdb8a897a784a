// SPDX-License-Identifier: BSD-3-Clause

//! Cross-generation write-barrier bookkeeping (spec §4.B "Parent
//! registry").
//!
//! The spec describes a singly-linked list of parent-page cells; a flat
//! `Vec<PageId>` plays the same role here; the meaningful state isn't the
//! list's shape but which pages are flagged [`PageFlags::PARENT`]. Mirrors
//! the allocation bitmap's "guilt must be reproven every cycle"
//! discipline: `update_parents` clears last cycle's flags before
//! reinstating the ones still known, and `mark_word` may additionally
//! flag pages it discovers mid-traversal via [`note_discovered`].

use crate::alloc::arena::Arena;
use crate::alloc::cell::PageId;
use crate::alloc::page::PageFlags;

pub struct ParentRegistry {
    parents: Vec<PageId>,
    /// Pages named by [`declare_parent`]/[`declare_child`] since the last
    /// call to [`update_parents`] (spec: "incorporates all pages
    /// protected-then-touched since the previous GC").
    pending: Vec<PageId>,
}

impl ParentRegistry {
    pub fn new() -> Self {
        Self {
            parents: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Spec §4.B `declare_parent`: queues `page` for registration if it
    /// is old enough (generation > 1) that a younger cross-gen pointer
    /// into it would matter to the collector.
    pub fn declare_parent(&mut self, generation: u8, page: PageId) {
        if generation > 1 {
            self.pending.push(page);
        }
    }

    /// The portable write-barrier hook (spec §9 "Write barrier"):
    /// clients call this after storing a word into a pre-existing cell
    /// on `page`, in place of relying on OS page-protection faults.
    pub fn declare_child(&mut self, generation: u8, page: PageId) {
        self.declare_parent(generation, page);
    }

    /// Called mid-mark when `mark_word` discovers a cross-generation
    /// pointer into a page not already known to the registry (spec
    /// §4.C `mark_word`: "write-barrier installation").
    pub fn note_discovered(&mut self, page: PageId) {
        if !self.parents.contains(&page) {
            self.parents.push(page);
        }
    }

    /// Spec §4.C step 3, run at the start of a cycle: pages already known
    /// from a prior cycle must re-earn their flag by being rediscovered
    /// during this cycle's mark (so their flag is cleared here); pages
    /// named by the write barrier since the previous GC are trusted
    /// without re-proof for this one cycle (spec: "incorporates all
    /// pages protected-then-touched since the previous GC").
    pub fn update_parents(&mut self, arena: &mut Arena) {
        for &id in &self.parents {
            arena.get_mut(id).flags.remove(PageFlags::PARENT);
        }
        for &id in &self.pending {
            arena.get_mut(id).flags.insert(PageFlags::PARENT);
        }
        self.parents.append(&mut self.pending);
        self.parents.sort_unstable_by_key(|id| id.0);
        self.parents.dedup();
    }

    /// Spec §4.C step 6: after mark, drop entries whose PARENT flag
    /// wasn't re-set by this cycle's traversal, re-protecting pages that
    /// remain uncollected.
    pub fn purge_parents(&mut self, arena: &mut Arena, max_collected_gen: u8) {
        self.parents.retain(|&id| {
            let page = arena.get_mut(id);
            if page.flags.contains(PageFlags::PARENT) {
                if page.generation > max_collected_gen {
                    page.flags.insert(PageFlags::PROTECTED);
                }
                true
            } else {
                page.flags.remove(PageFlags::PROTECTED);
                false
            }
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = PageId> + '_ {
        self.parents.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

impl Default for ParentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::platform::DefaultPlatform;

    #[test]
    fn freshly_declared_parent_survives_its_first_cycle_unproven() {
        let mut arena = Arena::new();
        let platform = DefaultPlatform::new();
        let id = arena.new_page(3, &platform).unwrap();

        let mut registry = ParentRegistry::new();
        registry.declare_parent(3, id);
        registry.update_parents(&mut arena);
        assert!(arena.get(id).flags.contains(PageFlags::PARENT));

        registry.purge_parents(&mut arena, 1);
        assert!(arena.get(id).flags.contains(PageFlags::PARENT));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn stale_parent_is_dropped_when_not_rediscovered_next_cycle() {
        let mut arena = Arena::new();
        let platform = DefaultPlatform::new();
        let id = arena.new_page(3, &platform).unwrap();

        let mut registry = ParentRegistry::new();
        registry.declare_parent(3, id);
        registry.update_parents(&mut arena);

        // Next cycle: update_parents re-clears the flag since `id` is no
        // longer pending, and nothing rediscovers it before purge runs.
        registry.update_parents(&mut arena);
        registry.purge_parents(&mut arena, 1);
        assert!(registry.is_empty());
        assert!(!arena.get(id).flags.contains(PageFlags::PARENT));
    }

    #[test]
    fn rediscovered_parent_survives_purge() {
        let mut arena = Arena::new();
        let platform = DefaultPlatform::new();
        let id = arena.new_page(3, &platform).unwrap();

        let mut registry = ParentRegistry::new();
        registry.declare_parent(3, id);
        registry.update_parents(&mut arena);
        registry.update_parents(&mut arena);

        // Simulates mark_word rediscovering a genuine cross-gen pointer.
        arena.get_mut(id).flags.insert(PageFlags::PARENT);
        registry.note_discovered(id);

        registry.purge_parents(&mut arena, 1);
        assert_eq!(registry.len(), 1);
        assert!(arena.get(id).flags.contains(PageFlags::PARENT));
    }
}
