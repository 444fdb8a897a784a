// SPDX-License-Identifier: BSD-3-Clause

//! Colibri: a library of persistent, immutable-capable data structures
//! (ropes, lists, vectors, hash maps and trie maps) backed by a
//! generational mark-and-sweep collector (spec §1 "Overview").
//!
//! [`Heap`] is the facade client code actually calls: it ties together
//! the cell allocator ([`alloc::Allocator`]), the root/parent registries
//! ([`root::Roots`]) and the protected-region state machine
//! ([`sync::GroupState`]), and exposes thin, GC-safe wrappers over the
//! [`containers`] algorithms. The submodules below are the internals
//! it's assembled from and are public so an embedder can reach for them
//! directly when the facade's shape doesn't fit (e.g. a custom word's
//! `children()` implementation needs a bare `Word`, not a `Heap`).

pub mod alloc;
pub mod config;
pub mod containers;
pub mod error;
pub mod gc;
pub mod prelude;
pub mod root;
pub mod sync;
pub mod word;

use std::sync::Mutex;

use crate::alloc::platform::{DefaultPlatform, Platform};
use crate::alloc::Allocator;
use crate::config::EDEN_GENERATION;
use crate::error::{Error, ErrorHook, LoggingErrorHook, Result};
use crate::root::Roots;
use crate::sync::GroupState;
use crate::word::{CellRecord, CustomWord, Word};

/// Selects how a [`Heap`]'s protected region is shared (spec §6 "External
/// interfaces"). Colibri always arbitrates collection through the same
/// [`GroupState`] machinery; the two modes differ only in the usage
/// pattern they document, not in the algorithm, since `GroupState` is
/// safe to share across threads either way.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Threading {
    /// A single thread drives the heap; `pause`/`try_pause` are called
    /// without ever being contended.
    #[default]
    SingleThreaded,
    /// Multiple threads share one heap and may enter/leave protected
    /// regions concurrently; outermost `pause` callers block on a
    /// running collection exactly as spec §5 "Suspension points"
    /// describes.
    MultiThreaded,
}

struct HeapInner {
    allocator: Allocator,
    roots: Roots,
}

/// The top-level handle to a Colibri heap.
///
/// Every mutating or allocating operation runs inside a [`GcGuard`]
/// internally, so a single call is itself a protected region; callers
/// that need several operations to observe a consistent heap (e.g. build
/// up a rope and immediately root it) should hold their own guard via
/// [`Heap::pause`] across the whole sequence.
pub struct Heap {
    threading: Threading,
    group: GroupState,
    inner: Mutex<HeapInner>,
    error_hook: Box<dyn ErrorHook>,
}

impl Heap {
    /// A single-threaded heap over the default (heap-backed) platform.
    pub fn new() -> Self {
        Self::with_platform(Threading::SingleThreaded, Box::new(DefaultPlatform::new()))
    }

    pub fn with_platform(threading: Threading, platform: Box<dyn Platform>) -> Self {
        Self::with_error_hook(threading, platform, Box::new(LoggingErrorHook))
    }

    pub fn with_error_hook(
        threading: Threading,
        platform: Box<dyn Platform>,
        error_hook: Box<dyn ErrorHook>,
    ) -> Self {
        Self {
            threading,
            group: GroupState::new(),
            inner: Mutex::new(HeapInner {
                allocator: Allocator::new(platform),
                roots: Roots::new(),
            }),
            error_hook,
        }
    }

    pub fn threading(&self) -> Threading {
        self.threading
    }

    pub fn error_hook(&self) -> &dyn ErrorHook {
        self.error_hook.as_ref()
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, HeapInner> {
        self.inner.lock().expect("colibri heap mutex poisoned")
    }

    /// Enters a GC-protected region, blocking if a collection is
    /// currently running (spec §5). Dropping the returned guard leaves
    /// the region; the outermost drop runs [`gc::should_collect`]/
    /// [`gc::collect`] before unblocking anyone waiting in `pause`.
    pub fn pause(&self) -> GcGuard<'_> {
        self.group.pause();
        GcGuard { heap: self }
    }

    /// Like [`Self::pause`], but returns [`Error::CollectionInProgress`]
    /// instead of blocking if a cycle is already running.
    pub fn try_pause(&self) -> Result<GcGuard<'_>> {
        match self.group.try_pause() {
            Some(_) => Ok(GcGuard { heap: self }),
            None => Err(Error::CollectionInProgress),
        }
    }

    /// Runs `f` inside its own protected region, with direct access to
    /// the allocator and root registries. Every container wrapper below
    /// is built on this.
    fn protected<R>(&self, f: impl FnOnce(&mut Allocator, &mut Roots) -> R) -> R {
        let _guard = self.pause();
        let mut inner = self.locked();
        let HeapInner { allocator, roots } = &mut *inner;
        f(allocator, roots)
    }

    /// Adds a client-supplied [`CustomWord`] to the heap (spec §4.D
    /// "Custom words", §6 "Custom-type descriptor"). The value is
    /// registered for finalization if [`CustomWord::has_finalizer`]
    /// returns `true`.
    pub fn new_custom(&self, value: Box<dyn CustomWord>) -> Result<Word> {
        self.protected(|allocator, _roots| {
            let id = allocator.alloc_record(EDEN_GENERATION, 1, CellRecord::Custom(value))?;
            Ok(Word::Cell(id))
        })
    }

    /// Spec §4.B `preserve(word)`: pins `word` so a collection cannot
    /// reclaim it, until a matching [`Self::release`].
    pub fn preserve(&self, word: &Word) {
        self.protected(|allocator, roots| roots.preserve(word, allocator));
    }

    /// Spec §4.B `release(word)`.
    pub fn release(&self, word: &Word) {
        self.protected(|_allocator, roots| roots.release(word));
    }

    pub fn is_pinned(&self, word: &Word) -> bool {
        self.protected(|_allocator, roots| roots.is_pinned(word))
    }

    // -- Ropes (spec §4.E.1) ------------------------------------------

    pub fn rope_from_str(&self, s: &str) -> Result<Word> {
        self.protected(|allocator, _roots| containers::rope::from_str(allocator, s))
    }

    pub fn rope_concat(&self, left: Word, right: Word) -> Result<Word> {
        self.protected(|allocator, _roots| containers::rope::concat(allocator, left, right))
    }

    pub fn rope_subrope(&self, word: &Word, first: u64, last: u64) -> Result<Word> {
        self.protected(|allocator, _roots| containers::rope::subrope(allocator, word, first, last))
    }

    pub fn rope_length(&self, word: &Word) -> u64 {
        self.protected(|allocator, _roots| containers::rope::length(allocator, word))
    }

    pub fn rope_char_at(&self, word: &Word, index: u64) -> char {
        let hook = self.error_hook();
        self.protected(|allocator, _roots| containers::rope::char_at(allocator, word, index, hook))
    }

    // -- Lists (spec §4.E.1) -------------------------------------------

    pub fn list_concat(&self, left: Word, right: Word) -> Result<Word> {
        let hook = self.error_hook();
        self.protected(|allocator, _roots| containers::list::concat(allocator, left, right, hook))
    }

    pub fn list_sublist(&self, word: &Word, first: u64, last: u64) -> Result<Word> {
        let hook = self.error_hook();
        self.protected(|allocator, _roots| containers::list::sublist(allocator, word, first, last, hook))
    }

    pub fn list_insert(&self, word: &Word, index: u64, value: Word) -> Result<Word> {
        let hook = self.error_hook();
        self.protected(|allocator, _roots| containers::list::insert(allocator, word, index, value, hook))
    }

    pub fn list_remove(&self, word: &Word, index: u64) -> Result<Word> {
        let hook = self.error_hook();
        self.protected(|allocator, _roots| containers::list::remove(allocator, word, index, hook))
    }

    pub fn list_replace(&self, word: &Word, index: u64, value: Word) -> Result<Word> {
        let hook = self.error_hook();
        self.protected(|allocator, _roots| containers::list::replace(allocator, word, index, value, hook))
    }

    pub fn list_get(&self, word: &Word, index: u64) -> Word {
        let hook = self.error_hook();
        self.protected(|allocator, _roots| containers::list::get_at(allocator, word, index, hook))
    }

    pub fn list_length(&self, word: &Word) -> u64 {
        let hook = self.error_hook();
        self.protected(|allocator, _roots| containers::list::length(allocator, word, hook))
    }

    // -- Vectors (spec §4.E.2) ------------------------------------------

    pub fn vector_new_immutable(&self, elements: Vec<Word>) -> Result<Word> {
        self.protected(|allocator, _roots| containers::vector::new_immutable(allocator, elements))
    }

    pub fn vector_new_mutable(&self, capacity: usize) -> Result<Word> {
        self.protected(|allocator, _roots| containers::vector::new_mutable(allocator, capacity))
    }

    pub fn vector_push(&self, word: &Word, value: Word) -> Result<()> {
        let hook = self.error_hook();
        self.protected(|allocator, _roots| containers::vector::push(allocator, word, value, hook))
    }

    pub fn vector_set(&self, word: &Word, index: usize, value: Word) {
        let hook = self.error_hook();
        self.protected(|allocator, _roots| containers::vector::set(allocator, word, index, value, hook));
    }

    pub fn vector_get(&self, word: &Word, index: usize) -> Word {
        let hook = self.error_hook();
        self.protected(|allocator, _roots| containers::vector::get(allocator, word, index, hook))
    }

    pub fn vector_length(&self, word: &Word) -> usize {
        let hook = self.error_hook();
        self.protected(|allocator, _roots| containers::vector::length(allocator, word, hook))
    }

    pub fn vector_freeze(&self, word: &Word) -> Word {
        let hook = self.error_hook();
        self.protected(|allocator, _roots| containers::vector::freeze(allocator, word, hook))
    }

    // -- Hash maps (spec §4.E.3) ----------------------------------------

    pub fn hashmap_new_str(&self) -> Result<Word> {
        self.protected(|allocator, _roots| containers::hashmap::new_str_map(allocator))
    }

    pub fn hashmap_new_int(&self) -> Result<Word> {
        self.protected(|allocator, _roots| containers::hashmap::new_int_map(allocator))
    }

    pub fn hashmap_len(&self, map: &Word) -> usize {
        let hook = self.error_hook();
        self.protected(|allocator, _roots| containers::hashmap::len(allocator, map, hook))
    }

    pub fn hashmap_get(&self, map: &Word, key: &Word) -> Option<Word> {
        let hook = self.error_hook();
        self.protected(|allocator, _roots| containers::hashmap::get(allocator, map, key, hook))
    }

    pub fn hashmap_insert(&self, map: &Word, key: Word, value: Word) -> Result<bool> {
        let hook = self.error_hook();
        self.protected(|allocator, _roots| containers::hashmap::insert(allocator, map, key, value, hook))
    }

    pub fn hashmap_delete(&self, map: &Word, key: &Word) -> Result<bool> {
        let hook = self.error_hook();
        self.protected(|allocator, _roots| containers::hashmap::delete(allocator, map, key, hook))
    }

    pub fn hashmap_copy(&self, map: &Word) -> Result<Word> {
        let hook = self.error_hook();
        self.protected(|allocator, _roots| containers::hashmap::copy(allocator, map, hook))
    }

    /// Collects the whole map into a vector of entries. The facade
    /// trades the lazy `{map, entry, bucket_index}` cursor `containers`
    /// exposes for an eager snapshot, since a borrowed iterator can't
    /// outlive the mutex guard a `Heap` method takes.
    pub fn hashmap_entries(&self, map: &Word) -> Vec<(Word, Word)> {
        let hook = self.error_hook();
        self.protected(|allocator, _roots| {
            let mut iter = containers::hashmap::iter(allocator, map, hook);
            let mut out = Vec::new();
            while let Some(entry) = iter.next(allocator, hook) {
                out.push(entry);
            }
            out
        })
    }

    // -- Trie maps (spec §4.E.4) ------------------------------------------

    pub fn triemap_new_str(&self) -> Result<Word> {
        self.protected(|allocator, _roots| containers::triemap::new_str_map(allocator))
    }

    pub fn triemap_new_int(&self) -> Result<Word> {
        self.protected(|allocator, _roots| containers::triemap::new_int_map(allocator))
    }

    pub fn triemap_len(&self, map: &Word) -> usize {
        let hook = self.error_hook();
        self.protected(|allocator, _roots| containers::triemap::len(allocator, map, hook))
    }

    pub fn triemap_get(&self, map: &Word, key: &Word) -> Option<Word> {
        let hook = self.error_hook();
        self.protected(|allocator, _roots| containers::triemap::get(allocator, map, key, hook))
    }

    pub fn triemap_insert(&self, map: &Word, key: Word, value: Word) -> Result<bool> {
        let hook = self.error_hook();
        self.protected(|allocator, _roots| containers::triemap::insert(allocator, map, key, value, hook))
    }

    pub fn triemap_delete(&self, map: &Word, key: &Word) -> Result<bool> {
        let hook = self.error_hook();
        self.protected(|allocator, _roots| containers::triemap::delete(allocator, map, key, hook))
    }

    pub fn triemap_copy(&self, map: &Word) -> Result<Word> {
        let hook = self.error_hook();
        self.protected(|allocator, _roots| containers::triemap::copy(allocator, map, hook))
    }

    /// In-order entry snapshot, for the same reason as
    /// [`Self::hashmap_entries`].
    pub fn triemap_entries(&self, map: &Word) -> Vec<(Word, Word)> {
        let hook = self.error_hook();
        self.protected(|allocator, _roots| containers::triemap::iter(allocator, map, hook).collect())
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

/// An active GC-protected region (spec §5). Dropping it leaves the
/// region; the outermost drop decides whether a cycle is due and, if so,
/// runs it before anyone blocked in [`Heap::pause`] wakes up.
pub struct GcGuard<'heap> {
    heap: &'heap Heap,
}

impl Drop for GcGuard<'_> {
    fn drop(&mut self) {
        if self.heap.group.begin_release() {
            {
                let mut inner = self.heap.locked();
                if gc::should_collect(&inner.allocator) {
                    gc::collect(&mut inner.allocator, &mut inner.roots);
                }
            }
            self.heap.group.finish_collecting();
        } else {
            self.heap.group.cancel_release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rope_roundtrips_through_the_facade() {
        let heap = Heap::new();
        let rope = heap.rope_from_str("hello").unwrap();
        assert_eq!(heap.rope_length(&rope), 5);
        assert_eq!(heap.rope_char_at(&rope, 1), 'e');
    }

    #[test]
    fn hashmap_copy_is_isolated_through_the_facade() {
        let heap = Heap::new();
        let map = heap.hashmap_new_str().unwrap();
        let key = heap.rope_from_str("k").unwrap();
        heap.hashmap_insert(&map, key.clone(), Word::SmallInt(1)).unwrap();
        let copy = heap.hashmap_copy(&map).unwrap();
        heap.hashmap_insert(&copy, key.clone(), Word::SmallInt(2)).unwrap();
        assert_eq!(heap.hashmap_get(&map, &key), Some(Word::SmallInt(1)));
        assert_eq!(heap.hashmap_get(&copy, &key), Some(Word::SmallInt(2)));
    }

    #[test]
    fn preserve_then_release_unpins_through_the_facade() {
        let heap = Heap::new();
        let word = heap.vector_new_mutable(1).unwrap();
        heap.preserve(&word);
        assert!(heap.is_pinned(&word));
        heap.release(&word);
        assert!(!heap.is_pinned(&word));
    }

    #[test]
    fn nested_pause_is_safe_to_drop_in_either_order() {
        let heap = Heap::new();
        let outer = heap.pause();
        let inner = heap.pause();
        drop(inner);
        drop(outer);
    }

    #[test]
    fn try_pause_succeeds_when_idle() {
        let heap = Heap::new();
        assert!(heap.try_pause().is_ok());
    }
}
