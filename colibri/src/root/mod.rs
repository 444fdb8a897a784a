// SPDX-License-Identifier: BSD-3-Clause

//! Root & parent registries (spec §4.B).

pub mod parents;
pub mod registry;

use crate::alloc::Allocator;
use crate::word::Word;

pub use parents::ParentRegistry;
pub use registry::RootRegistry;

/// The two registries the collector consults every cycle, bundled
/// together because `preserve`/`release` need the page-generation lookup
/// that only the allocator can answer (spec §4.B `preserve`: "record the
/// current page generation").
pub struct Roots {
    pub registry: RootRegistry,
    pub parents: ParentRegistry,
}

impl Roots {
    pub fn new() -> Self {
        Self {
            registry: RootRegistry::new(),
            parents: ParentRegistry::new(),
        }
    }

    /// Spec §4.B `preserve(word)`.
    pub fn preserve(&mut self, word: &Word, allocator: &Allocator) {
        if let Some(core) = word.circular_core() {
            return self.preserve(core, allocator);
        }
        let Some(id) = word.as_cell() else {
            return;
        };
        let generation = allocator.arena().get(id.page).generation;
        self.registry.insert(id.trie_key(), word.clone(), generation);
    }

    /// Spec §4.B `release(word)`.
    pub fn release(&mut self, word: &Word) {
        if let Some(core) = word.circular_core() {
            return self.release(core);
        }
        let Some(id) = word.as_cell() else {
            return;
        };
        self.registry.release(id.trie_key());
    }

    pub fn is_pinned(&self, word: &Word) -> bool {
        match word.circular_core() {
            Some(core) => self.is_pinned(core),
            None => match word.as_cell() {
                Some(id) => self.registry.is_pinned(id.trie_key()),
                None => false,
            },
        }
    }
}

impl Default for Roots {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::platform::DefaultPlatform;
    use crate::word::CellRecord;

    #[test]
    fn preserve_then_release_unpins() {
        let mut allocator = Allocator::new(Box::new(DefaultPlatform::new()));
        let id = allocator
            .alloc_record(1, 1, CellRecord::Wrap(crate::word::WrapRecord { wrapped: Word::Nil }))
            .unwrap();
        let word = Word::Cell(id);

        let mut roots = Roots::new();
        roots.preserve(&word, &allocator);
        assert!(roots.is_pinned(&word));
        roots.release(&word);
        assert!(!roots.is_pinned(&word));
    }

    #[test]
    fn preserving_an_immediate_is_a_no_op() {
        let allocator = Allocator::new(Box::new(DefaultPlatform::new()));
        let mut roots = Roots::new();
        roots.preserve(&Word::SmallInt(5), &allocator);
        assert!(roots.registry.is_empty());
    }
}
