// SPDX-License-Identifier: BSD-3-Clause

//! Hash maps: a flat bucket array of singly-linked entry chains, with
//! copy-on-write entries so `copy(map)` is O(1) and safe to mutate
//! afterward (spec §4.E.3).
//!
//! An entry tagged `mutable = false` may be reachable from more than one
//! map (shared by a prior `copy`); `mutable = true` entries are always
//! exclusively owned by the map that created them. Every write walks the
//! bucket chain from its head, cloning frozen entries into fresh mutable
//! ones as it goes, and only ever touches entries it has itself just
//! cloned or that were already exclusively owned (spec §4.E.3 "Delete":
//! "path from the bucket head is made mutable up to the victim").
//!
//! Every public entry point below takes an [`ErrorHook`] and reports
//! through it instead of panicking when handed a malformed `map`/`key`
//! word, returning the documented sentinel for that call (spec §7
//! "Error handling design").

use crate::alloc::cell::CellId;
use crate::alloc::Allocator;
use crate::config::{EDEN_GENERATION, HASH_INITIAL_BUCKETS, HASH_LOAD_FACTOR};
use crate::containers::rope;
use crate::error::{Domain, ErrorHook, Level, Report, Result};
use crate::word::{CellRecord, CustomWord, HashEntry, HashKeyKind, HashMapHeader, Word};

/// Large odd multiplier for integer key randomization (spec §4.E.3
/// "Integer keys: randomized by multiplication with a large odd
/// constant rather than hashed bit-by-bit").
const INT_HASH_MULTIPLIER: u64 = 0x9E3779B97F4A7C15;

const CODE_NOT_A_HASH_MAP: u32 = 1;
const CODE_KEY_WRONG_TYPE: u32 = 2;
const CODE_CUSTOM_KEY_UNSUPPORTED: u32 = 3;
const CODE_CORRUPT_CHAIN: u32 = 4;

fn not_a_hash_map(hook: &dyn ErrorHook) {
    hook.report(Report {
        level: Level::TypeCheck,
        domain: Domain::Container,
        code: CODE_NOT_A_HASH_MAP,
    });
}

fn corrupt_chain(hook: &dyn ErrorHook) {
    hook.report(Report {
        level: Level::Fatal,
        domain: Domain::Container,
        code: CODE_CORRUPT_CHAIN,
    });
}

/// Resolves `key` to the [`CustomWord`] it's keyed by, for
/// [`HashKeyKind::Custom`] dispatch. `None` if `key` isn't a custom cell
/// at all.
fn custom_word<'a>(allocator: &'a Allocator, key: &Word) -> Option<&'a dyn CustomWord> {
    let id = allocator.resolve(key.as_cell()?);
    match allocator.record(id)? {
        CellRecord::Custom(value) => Some(value.as_ref()),
        _ => None,
    }
}

fn hash_key(allocator: &Allocator, kind: HashKeyKind, key: &Word, hook: &dyn ErrorHook) -> u64 {
    match kind {
        HashKeyKind::Int => match key {
            Word::SmallInt(i) => (*i as u64).wrapping_mul(INT_HASH_MULTIPLIER),
            _ => {
                hook.report(Report {
                    level: Level::TypeCheck,
                    domain: Domain::Container,
                    code: CODE_KEY_WRONG_TYPE,
                });
                0
            }
        },
        HashKeyKind::Str => {
            // Cumulative shift-3-add over the key rope's Unicode scalar
            // values (spec §4.E.3 "String keys").
            let mut h: u64 = 0;
            rope::for_each_chunk(allocator, key, |chunk| {
                for &c in chunk {
                    h = (h << 3).wrapping_add(h).wrapping_add(c as u64);
                }
            });
            h
        }
        HashKeyKind::Custom => match custom_word(allocator, key).and_then(CustomWord::as_hash_key) {
            Some(hash_key) => hash_key.hash(),
            None => {
                hook.report(Report {
                    level: Level::TypeCheck,
                    domain: Domain::Container,
                    code: CODE_CUSTOM_KEY_UNSUPPORTED,
                });
                0
            }
        },
    }
}

fn keys_equal(allocator: &Allocator, kind: HashKeyKind, a: &Word, b: &Word, hook: &dyn ErrorHook) -> bool {
    match kind {
        HashKeyKind::Int => matches!((a, b), (Word::SmallInt(x), Word::SmallInt(y)) if x == y),
        HashKeyKind::Str => rope::collect_chars(allocator, a) == rope::collect_chars(allocator, b),
        HashKeyKind::Custom => {
            let ka = custom_word(allocator, a).and_then(CustomWord::as_hash_key);
            let kb = custom_word(allocator, b).and_then(CustomWord::as_hash_key);
            match (ka, kb) {
                (Some(ka), Some(kb)) => ka.key_eq(kb),
                _ => {
                    hook.report(Report {
                        level: Level::TypeCheck,
                        domain: Domain::Container,
                        code: CODE_CUSTOM_KEY_UNSUPPORTED,
                    });
                    false
                }
            }
        }
    }
}

fn header<'a>(allocator: &'a Allocator, id: CellId, hook: &dyn ErrorHook) -> Option<&'a HashMapHeader> {
    match allocator.record(id).expect("hash map handle refers to a live cell") {
        CellRecord::StrHashMap(h) | CellRecord::IntHashMap(h) => Some(h),
        _ => {
            not_a_hash_map(hook);
            None
        }
    }
}

fn header_mut<'a>(allocator: &'a mut Allocator, id: CellId, hook: &dyn ErrorHook) -> Option<&'a mut HashMapHeader> {
    match allocator.record_mut(id).expect("hash map handle refers to a live cell") {
        CellRecord::StrHashMap(h) | CellRecord::IntHashMap(h) => Some(h),
        _ => {
            not_a_hash_map(hook);
            None
        }
    }
}

/// `id` is assumed to have come from a bucket head or an entry's own
/// `next` pointer, both maintained exclusively by this module; landing
/// on a non-entry cell here means the bucket chain itself is corrupt,
/// not that the client passed a bad argument.
fn entry_fields(allocator: &Allocator, id: CellId, hook: &dyn ErrorHook) -> (Option<CellId>, Word, bool) {
    match allocator.record(id).expect("hash bucket chain references a live entry") {
        CellRecord::HashEntry(e, m) | CellRecord::IntHashEntry(e, m) => (e.next, e.key.clone(), *m),
        _ => {
            corrupt_chain(hook);
            (None, Word::Nil, false)
        }
    }
}

fn link_next(allocator: &mut Allocator, id: CellId, next: Option<CellId>, hook: &dyn ErrorHook) {
    match allocator.record_mut(id).expect("live hash entry") {
        CellRecord::HashEntry(e, _) | CellRecord::IntHashEntry(e, _) => e.next = next,
        _ => corrupt_chain(hook),
    }
}

fn cow_entry_at(allocator: &mut Allocator, id: CellId, hook: &dyn ErrorHook) -> Result<CellId> {
    let cloned = match allocator.record(id).expect("live hash entry") {
        CellRecord::HashEntry(e, _) => CellRecord::HashEntry(e.clone(), true),
        CellRecord::IntHashEntry(e, _) => CellRecord::IntHashEntry(e.clone(), true),
        _ => {
            corrupt_chain(hook);
            CellRecord::HashEntry(
                HashEntry {
                    next: None,
                    key: Word::Nil,
                    value: Word::Nil,
                    hash_high_bits: 0,
                },
                true,
            )
        }
    };
    allocator.alloc_record(EDEN_GENERATION, 1, cloned)
}

pub fn new_str_map(allocator: &mut Allocator) -> Result<Word> {
    new_map(allocator, HashKeyKind::Str)
}

pub fn new_int_map(allocator: &mut Allocator) -> Result<Word> {
    new_map(allocator, HashKeyKind::Int)
}

fn new_map(allocator: &mut Allocator, kind: HashKeyKind) -> Result<Word> {
    let header = HashMapHeader {
        kind,
        size: 0,
        buckets: vec![None; HASH_INITIAL_BUCKETS],
        buckets_frozen: false,
    };
    let record = match kind {
        HashKeyKind::Str => CellRecord::StrHashMap(header),
        HashKeyKind::Int => CellRecord::IntHashMap(header),
        HashKeyKind::Custom => unreachable!("custom maps are not built through this constructor"),
    };
    let id = allocator.alloc_record(EDEN_GENERATION, 1, record)?;
    Ok(Word::Cell(id))
}

pub fn len(allocator: &Allocator, map: &Word, hook: &dyn ErrorHook) -> usize {
    let Some(cell) = map.as_cell() else {
        not_a_hash_map(hook);
        return 0;
    };
    let id = allocator.resolve(cell);
    header(allocator, id, hook).map(|h| h.size).unwrap_or(0)
}

struct Location {
    bucket: usize,
    entry: Option<CellId>,
}

fn locate(allocator: &Allocator, map_id: CellId, key: &Word, hook: &dyn ErrorHook) -> Option<Location> {
    let h = header(allocator, map_id, hook)?;
    let kind = h.kind;
    let bucket_count = h.buckets.len();
    let hash = hash_key(allocator, kind, key, hook);
    let bucket = (hash as usize) & (bucket_count - 1);
    let mut cursor = h.buckets[bucket];
    while let Some(id) = cursor {
        let id = allocator.resolve(id);
        let (next, ekey, _) = entry_fields(allocator, id, hook);
        if keys_equal(allocator, kind, &ekey, key, hook) {
            return Some(Location { bucket, entry: Some(id) });
        }
        cursor = next;
    }
    Some(Location { bucket, entry: None })
}

pub fn find_entry(allocator: &Allocator, map: &Word, key: &Word, hook: &dyn ErrorHook) -> Option<CellId> {
    let Some(cell) = map.as_cell() else {
        not_a_hash_map(hook);
        return None;
    };
    let map_id = allocator.resolve(cell);
    locate(allocator, map_id, key, hook)?.entry
}

pub fn get(allocator: &Allocator, map: &Word, key: &Word, hook: &dyn ErrorHook) -> Option<Word> {
    let id = find_entry(allocator, map, key, hook)?;
    match allocator.record(id)? {
        CellRecord::HashEntry(e, _) | CellRecord::IntHashEntry(e, _) => Some(e.value.clone()),
        _ => None,
    }
}

/// Walks the bucket chain from its head, cloning every frozen entry
/// before (and including) `target` into a fresh mutable copy, relinking
/// as it goes; entries already exclusively owned (`mutable = true`) are
/// reused as-is. Returns `target`'s own (possibly new) id, or `target`
/// unchanged if the chain doesn't actually reach it (bucket corruption,
/// reported as [`Level::Fatal`]).
fn cow_path_to(
    allocator: &mut Allocator,
    map_id: CellId,
    bucket: usize,
    target: CellId,
    hook: &dyn ErrorHook,
) -> Result<CellId> {
    let head = header(allocator, map_id, hook).map(|h| h.buckets[bucket]).unwrap_or(None);
    let mut new_prev: Option<CellId> = None;
    let mut cursor = head;
    loop {
        let id = match cursor {
            Some(c) => allocator.resolve(c),
            None => {
                corrupt_chain(hook);
                return Ok(target);
            }
        };
        let (next, _key, is_mutable) = entry_fields(allocator, id, hook);
        let new_id = if is_mutable { id } else { cow_entry_at(allocator, id, hook)? };
        match new_prev {
            Some(prev_id) => link_next(allocator, prev_id, Some(new_id), hook),
            None => {
                if let Some(h) = header_mut(allocator, map_id, hook) {
                    h.buckets[bucket] = Some(new_id);
                }
            }
        }
        if id == target {
            return Ok(new_id);
        }
        new_prev = Some(new_id);
        cursor = next;
    }
}

/// Same prefix-COW walk as [`cow_path_to`], but unlinks `target`
/// entirely instead of keeping (a clone of) it in the chain.
fn cow_path_remove(
    allocator: &mut Allocator,
    map_id: CellId,
    bucket: usize,
    target: CellId,
    hook: &dyn ErrorHook,
) -> Result<()> {
    let head = header(allocator, map_id, hook).map(|h| h.buckets[bucket]).unwrap_or(None);
    let mut new_prev: Option<CellId> = None;
    let mut cursor = head;
    loop {
        let id = match cursor {
            Some(c) => allocator.resolve(c),
            None => {
                corrupt_chain(hook);
                return Ok(());
            }
        };
        let (next, _key, is_mutable) = entry_fields(allocator, id, hook);
        if id == target {
            match new_prev {
                Some(prev_id) => link_next(allocator, prev_id, next, hook),
                None => {
                    if let Some(h) = header_mut(allocator, map_id, hook) {
                        h.buckets[bucket] = next;
                    }
                }
            }
            return Ok(());
        }
        let new_id = if is_mutable { id } else { cow_entry_at(allocator, id, hook)? };
        match new_prev {
            Some(prev_id) => link_next(allocator, prev_id, Some(new_id), hook),
            None => {
                if let Some(h) = header_mut(allocator, map_id, hook) {
                    h.buckets[bucket] = Some(new_id);
                }
            }
        }
        new_prev = Some(new_id);
        cursor = next;
    }
}

/// Inserts `key -> value`, growing the bucket array first if the load
/// factor would be exceeded (spec §4.E.3 "Insert"). Returns `true` if
/// this created a new entry, `false` if an existing one was overwritten
/// or `map`/`key` failed validation (reported through `hook`).
pub fn insert(allocator: &mut Allocator, map: &Word, key: Word, value: Word, hook: &dyn ErrorHook) -> Result<bool> {
    let Some(cell) = map.as_cell() else {
        not_a_hash_map(hook);
        return Ok(false);
    };
    let map_id = allocator.resolve(cell);
    let Some(loc) = locate(allocator, map_id, &key, hook) else {
        return Ok(false);
    };
    if let Some(entry_id) = loc.entry {
        let writable = cow_path_to(allocator, map_id, loc.bucket, entry_id, hook)?;
        match allocator.record_mut(writable).expect("live hash entry") {
            CellRecord::HashEntry(e, _) | CellRecord::IntHashEntry(e, _) => e.value = value,
            _ => corrupt_chain(hook),
        }
        return Ok(false);
    }

    let Some((kind, bucket_count, size)) = header(allocator, map_id, hook).map(|h| (h.kind, h.buckets.len(), h.size))
    else {
        return Ok(false);
    };
    if size >= bucket_count * HASH_LOAD_FACTOR {
        grow_hash(allocator, map_id, hook)?;
    }

    let bucket_count = header(allocator, map_id, hook)
        .map(|h| h.buckets.len())
        .unwrap_or(bucket_count);
    let hash = hash_key(allocator, kind, &key, hook);
    let bucket = (hash as usize) & (bucket_count - 1);
    let head = header(allocator, map_id, hook).map(|h| h.buckets[bucket]).unwrap_or(None);

    let entry = HashEntry {
        next: head,
        key,
        value,
        hash_high_bits: hash >> bucket_count.trailing_zeros(),
    };
    let entry_record = match kind {
        HashKeyKind::Int => CellRecord::IntHashEntry(entry, true),
        HashKeyKind::Str | HashKeyKind::Custom => CellRecord::HashEntry(entry, true),
    };
    let entry_id = allocator.alloc_record(EDEN_GENERATION, 1, entry_record)?;
    if let Some(h) = header_mut(allocator, map_id, hook) {
        h.buckets[bucket] = Some(entry_id);
        h.size += 1;
    }
    Ok(true)
}

/// Doubles the bucket count and relinks every entry, reconstructing each
/// one's full hash from its cached high bits plus its old bucket index
/// rather than recomputing it (spec §4.E.3 "Insert": hash recomputation
/// on grow is avoidable when the cached high bits plus the old bucket
/// index determine the new one"). Allocates exactly one new bucket
/// array (`SPEC_FULL.md` §2's single-allocation grow fix); every entry
/// visited that is still frozen is copy-on-written rather than mutated
/// in place, so a grow never corrupts a sibling map produced by `copy`.
fn grow_hash(allocator: &mut Allocator, map_id: CellId, hook: &dyn ErrorHook) -> Result<()> {
    let Some(old_buckets) = header(allocator, map_id, hook).map(|h| h.buckets.clone()) else {
        return Ok(());
    };
    let old_count = old_buckets.len();
    let old_bits = old_count.trailing_zeros();
    let new_count = old_count * 2;
    let new_bits = new_count.trailing_zeros();
    let mut new_buckets: Vec<Option<CellId>> = vec![None; new_count];

    for (old_index, old_head) in old_buckets.into_iter().enumerate() {
        let mut cursor = old_head;
        while let Some(id) = cursor {
            let id = allocator.resolve(id);
            let (next, _key, is_mutable) = entry_fields(allocator, id, hook);
            let high_bits = match allocator.record(id).expect("live hash entry") {
                CellRecord::HashEntry(e, _) | CellRecord::IntHashEntry(e, _) => e.hash_high_bits,
                _ => {
                    corrupt_chain(hook);
                    0
                }
            };
            let full_hash = (high_bits << old_bits) | old_index as u64;
            let new_bucket = (full_hash as usize) & (new_count - 1);
            let new_high_bits = full_hash >> new_bits;

            let target_id = if is_mutable { id } else { cow_entry_at(allocator, id, hook)? };
            match allocator.record_mut(target_id).expect("live hash entry") {
                CellRecord::HashEntry(e, _) | CellRecord::IntHashEntry(e, _) => {
                    e.next = new_buckets[new_bucket];
                    e.hash_high_bits = new_high_bits;
                }
                _ => corrupt_chain(hook),
            }
            new_buckets[new_bucket] = Some(target_id);
            cursor = next;
        }
    }

    if let Some(h) = header_mut(allocator, map_id, hook) {
        h.buckets = new_buckets;
    }
    Ok(())
}

/// Removes `key`'s entry, copy-on-writing the bucket prefix up to it
/// (spec §4.E.3 "Delete").
pub fn delete(allocator: &mut Allocator, map: &Word, key: &Word, hook: &dyn ErrorHook) -> Result<bool> {
    let Some(cell) = map.as_cell() else {
        not_a_hash_map(hook);
        return Ok(false);
    };
    let map_id = allocator.resolve(cell);
    let Some(loc) = locate(allocator, map_id, key, hook) else {
        return Ok(false);
    };
    let Some(entry_id) = loc.entry else {
        return Ok(false);
    };
    cow_path_remove(allocator, map_id, loc.bucket, entry_id, hook)?;
    if let Some(h) = header_mut(allocator, map_id, hook) {
        h.size -= 1;
    }
    Ok(true)
}

/// `copy(map)`: shares the bucket array and freezes every reachable
/// entry, so either the original or the new handle can be mutated
/// afterward without affecting the other (spec §4.E.3 "`copy(map)`").
/// Returns `Word::Nil` if `map` fails validation.
pub fn copy(allocator: &mut Allocator, map: &Word, hook: &dyn ErrorHook) -> Result<Word> {
    let Some(cell) = map.as_cell() else {
        not_a_hash_map(hook);
        return Ok(Word::Nil);
    };
    let map_id = allocator.resolve(cell);
    let Some((kind, size, buckets)) = header(allocator, map_id, hook).map(|h| (h.kind, h.size, h.buckets.clone()))
    else {
        return Ok(Word::Nil);
    };
    for &head in &buckets {
        freeze_chain(allocator, head, hook);
    }
    if let Some(h) = header_mut(allocator, map_id, hook) {
        h.buckets_frozen = true;
    }
    let new_header = HashMapHeader {
        kind,
        size,
        buckets,
        buckets_frozen: true,
    };
    let record = match kind {
        HashKeyKind::Str => CellRecord::StrHashMap(new_header),
        HashKeyKind::Int => CellRecord::IntHashMap(new_header),
        HashKeyKind::Custom => unreachable!(),
    };
    let id = allocator.alloc_record(EDEN_GENERATION, 1, record)?;
    Ok(Word::Cell(id))
}

fn freeze_chain(allocator: &mut Allocator, head: Option<CellId>, hook: &dyn ErrorHook) {
    let mut cursor = head;
    while let Some(id) = cursor {
        let id = allocator.resolve(id);
        let next = match allocator.record_mut(id).expect("live hash entry") {
            CellRecord::HashEntry(e, m) => {
                *m = false;
                e.next
            }
            CellRecord::IntHashEntry(e, m) => {
                *m = false;
                e.next
            }
            _ => {
                corrupt_chain(hook);
                None
            }
        };
        cursor = next;
    }
}

/// Iterates `{map, entry, bucket_index}` state (spec §4.E.3
/// "Iteration"), advancing to the next occupied bucket once a chain is
/// exhausted. An iterator built over a malformed `map` word is left
/// empty (`map: None`) rather than panicking; [`Iter::next`] then simply
/// never yields.
pub struct Iter {
    map: Option<CellId>,
    bucket: usize,
    cursor: Option<CellId>,
}

pub fn iter(allocator: &Allocator, map: &Word, hook: &dyn ErrorHook) -> Iter {
    let Some(cell) = map.as_cell() else {
        not_a_hash_map(hook);
        return Iter {
            map: None,
            bucket: 0,
            cursor: None,
        };
    };
    let map_id = allocator.resolve(cell);
    let mut it = Iter {
        map: Some(map_id),
        bucket: 0,
        cursor: None,
    };
    it.advance_to_first(allocator, hook);
    it
}

impl Iter {
    fn advance_to_first(&mut self, allocator: &Allocator, hook: &dyn ErrorHook) {
        let Some(map_id) = self.map else { return };
        let Some(h) = header(allocator, map_id, hook) else { return };
        while self.bucket < h.buckets.len() {
            if let Some(id) = h.buckets[self.bucket] {
                self.cursor = Some(id);
                return;
            }
            self.bucket += 1;
        }
        self.cursor = None;
    }

    pub fn next(&mut self, allocator: &Allocator, hook: &dyn ErrorHook) -> Option<(Word, Word)> {
        let id = allocator.resolve(self.cursor?);
        let (next, key, _) = entry_fields(allocator, id, hook);
        let value = match allocator.record(id).expect("live hash entry") {
            CellRecord::HashEntry(e, _) | CellRecord::IntHashEntry(e, _) => e.value.clone(),
            _ => Word::Nil,
        };
        match next {
            Some(n) => self.cursor = Some(n),
            None => {
                self.bucket += 1;
                self.advance_to_first(allocator, hook);
            }
        }
        Some((key, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::platform::DefaultPlatform;
    use crate::error::LoggingErrorHook;

    fn new_allocator() -> Allocator {
        Allocator::new(Box::new(DefaultPlatform::new()))
    }

    #[test]
    fn insert_then_get_roundtrips() {
        let mut allocator = new_allocator();
        let hook = LoggingErrorHook;
        let map = new_int_map(&mut allocator).unwrap();
        assert!(insert(&mut allocator, &map, Word::SmallInt(1), Word::SmallInt(10), &hook).unwrap());
        assert!(!insert(&mut allocator, &map, Word::SmallInt(1), Word::SmallInt(20), &hook).unwrap());
        assert_eq!(get(&allocator, &map, &Word::SmallInt(1), &hook), Some(Word::SmallInt(20)));
        assert_eq!(len(&allocator, &map, &hook), 1);
    }

    #[test]
    fn grows_past_the_initial_load_factor() {
        let mut allocator = new_allocator();
        let hook = LoggingErrorHook;
        let map = new_int_map(&mut allocator).unwrap();
        for i in 0..64i64 {
            insert(&mut allocator, &map, Word::SmallInt(i), Word::SmallInt(i * 2), &hook).unwrap();
        }
        for i in 0..64i64 {
            assert_eq!(get(&allocator, &map, &Word::SmallInt(i), &hook), Some(Word::SmallInt(i * 2)));
        }
        assert_eq!(len(&allocator, &map, &hook), 64);
    }

    #[test]
    fn copy_isolates_subsequent_mutation() {
        let mut allocator = new_allocator();
        let hook = LoggingErrorHook;
        let original = new_int_map(&mut allocator).unwrap();
        insert(&mut allocator, &original, Word::SmallInt(1), Word::SmallInt(1), &hook).unwrap();
        let copied = copy(&mut allocator, &original, &hook).unwrap();

        insert(&mut allocator, &copied, Word::SmallInt(2), Word::SmallInt(2), &hook).unwrap();
        assert_eq!(len(&allocator, &copied, &hook), 2);
        assert_eq!(len(&allocator, &original, &hook), 1);
        assert_eq!(get(&allocator, &original, &Word::SmallInt(2), &hook), None);

        insert(&mut allocator, &copied, Word::SmallInt(1), Word::SmallInt(99), &hook).unwrap();
        assert_eq!(get(&allocator, &copied, &Word::SmallInt(1), &hook), Some(Word::SmallInt(99)));
        assert_eq!(get(&allocator, &original, &Word::SmallInt(1), &hook), Some(Word::SmallInt(1)));
    }

    #[test]
    fn delete_removes_the_key() {
        let mut allocator = new_allocator();
        let hook = LoggingErrorHook;
        let map = new_str_map(&mut allocator).unwrap();
        let key = rope::from_str(&mut allocator, "hello").unwrap();
        insert(&mut allocator, &map, key.clone(), Word::SmallInt(1), &hook).unwrap();
        assert!(delete(&mut allocator, &map, &key, &hook).unwrap());
        assert_eq!(get(&allocator, &map, &key, &hook), None);
        assert_eq!(len(&allocator, &map, &hook), 0);
        assert!(!delete(&mut allocator, &map, &key, &hook).unwrap());
    }

    #[test]
    fn iteration_visits_every_entry() {
        let mut allocator = new_allocator();
        let hook = LoggingErrorHook;
        let map = new_int_map(&mut allocator).unwrap();
        for i in 0..10i64 {
            insert(&mut allocator, &map, Word::SmallInt(i), Word::SmallInt(i), &hook).unwrap();
        }
        let mut seen = Vec::new();
        let mut it = iter(&allocator, &map, &hook);
        while let Some((k, _)) = it.next(&allocator, &hook) {
            if let Word::SmallInt(i) = k {
                seen.push(i);
            }
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn get_on_a_non_map_word_reports_instead_of_panicking() {
        let allocator = new_allocator();
        let hook = LoggingErrorHook;
        assert_eq!(get(&allocator, &Word::SmallInt(5), &Word::SmallInt(1), &hook), None);
    }

    #[test]
    fn int_map_rejects_a_non_integer_key_without_panicking() {
        let mut allocator = new_allocator();
        let hook = LoggingErrorHook;
        let map = new_int_map(&mut allocator).unwrap();
        let string_key = rope::from_str(&mut allocator, "nope").unwrap();
        assert!(!insert(&mut allocator, &map, string_key.clone(), Word::SmallInt(1), &hook).unwrap());
        assert_eq!(get(&allocator, &map, &string_key, &hook), None);
    }
}
