// SPDX-License-Identifier: BSD-3-Clause

//! Trie maps: crit-bit (PATRICIA) trees keyed by integer or string words
//! (spec §4.E.4).
//!
//! Shares its crit-bit discipline with [`crate::root::registry`]
//! (branch/leaf split on the highest differing bit), generalized here
//! from the registry's fixed `u64` keys to variable-length byte
//! sequences so string keys work the same way. Keys are reduced to
//! big-endian byte arrays before comparison: a transformed 8-byte
//! encoding for integers (sign bit flipped so unsigned byte comparison
//! matches signed ordering) and the UTF-8 bytes of the key rope's
//! collected characters for strings. This sacrifices the spec's
//! `(index << 32) | mask` discriminant packing for something that
//! composes with a single shared `diff_bit`/`bit_at` pair; see
//! `DESIGN.md`.
//!
//! Every public entry point below takes an [`ErrorHook`] and reports
//! through it instead of panicking when handed a malformed `map`/`key`
//! word, returning the documented sentinel for that call (spec §7).

use crate::alloc::cell::CellId;
use crate::alloc::Allocator;
use crate::config::EDEN_GENERATION;
use crate::containers::rope;
use crate::error::{Domain, ErrorHook, Level, Report, Result};
use crate::word::{CellRecord, HashKeyKind, TrieLeaf, TrieMapHeader, TrieNode, Word};

const CODE_NOT_A_TRIE_MAP: u32 = 1;
const CODE_KEY_WRONG_TYPE: u32 = 2;
const CODE_CORRUPT_TREE: u32 = 3;

fn not_a_trie_map(hook: &dyn ErrorHook) {
    hook.report(Report {
        level: Level::TypeCheck,
        domain: Domain::Container,
        code: CODE_NOT_A_TRIE_MAP,
    });
}

fn corrupt_tree(hook: &dyn ErrorHook) {
    hook.report(Report {
        level: Level::Fatal,
        domain: Domain::Container,
        code: CODE_CORRUPT_TREE,
    });
}

fn int_key_bytes(i: i64) -> [u8; 8] {
    ((i as u64) ^ (1u64 << 63)).to_be_bytes()
}

fn str_key_bytes(allocator: &Allocator, word: &Word) -> Vec<u8> {
    rope::collect_chars(allocator, word).into_iter().collect::<String>().into_bytes()
}

/// `kind` always comes from a trie map's own header, which only ever
/// holds [`HashKeyKind::Str`] or [`HashKeyKind::Int`] ([`new_map`] rejects
/// [`HashKeyKind::Custom`] at construction) — there is no working custom
/// trie-key dispatch to reach here through.
fn key_bytes(allocator: &Allocator, kind: HashKeyKind, key: &Word, hook: &dyn ErrorHook) -> Vec<u8> {
    match kind {
        HashKeyKind::Int => match key {
            Word::SmallInt(i) => int_key_bytes(*i).to_vec(),
            _ => {
                hook.report(Report {
                    level: Level::TypeCheck,
                    domain: Domain::Container,
                    code: CODE_KEY_WRONG_TYPE,
                });
                Vec::new()
            }
        },
        HashKeyKind::Str => str_key_bytes(allocator, key),
        HashKeyKind::Custom => unreachable!("trie maps are always keyed Int or Str"),
    }
}

fn bit_at(bytes: &[u8], bit_index: u32) -> bool {
    let byte_index = (bit_index / 8) as usize;
    let bit_in_byte = bit_index % 8;
    let byte = bytes.get(byte_index).copied().unwrap_or(0);
    let mask = 0x80u8 >> bit_in_byte;
    byte & mask != 0
}

/// Highest-order bit at which `a` and `b` differ, scanning from the most
/// significant bit of byte 0; `None` if identical. A key that is a
/// proper prefix of the other is treated as having zero bytes beyond
/// its own length, so it always sorts to the left (spec §4.E.4
/// "string keys ... the shorter key, if a prefix of the other, always
/// compares less").
fn diff_bit(a: &[u8], b: &[u8]) -> Option<u32> {
    let len = a.len().max(b.len());
    for byte_index in 0..len {
        let ab = a.get(byte_index).copied().unwrap_or(0);
        let bb = b.get(byte_index).copied().unwrap_or(0);
        if ab != bb {
            let diff = ab ^ bb;
            for bit_in_byte in 0..8u32 {
                if diff & (0x80u8 >> bit_in_byte) != 0 {
                    return Some(byte_index as u32 * 8 + bit_in_byte);
                }
            }
        }
    }
    None
}

fn header<'a>(allocator: &'a Allocator, id: CellId, hook: &dyn ErrorHook) -> Option<&'a TrieMapHeader> {
    match allocator.record(id).expect("trie map handle refers to a live cell") {
        CellRecord::StrTrieMap(h) | CellRecord::IntTrieMap(h) => Some(h),
        _ => {
            not_a_trie_map(hook);
            None
        }
    }
}

fn header_mut<'a>(allocator: &'a mut Allocator, id: CellId, hook: &dyn ErrorHook) -> Option<&'a mut TrieMapHeader> {
    match allocator.record_mut(id).expect("trie map handle refers to a live cell") {
        CellRecord::StrTrieMap(h) | CellRecord::IntTrieMap(h) => Some(h),
        _ => {
            not_a_trie_map(hook);
            None
        }
    }
}

pub fn new_str_map(allocator: &mut Allocator) -> Result<Word> {
    new_map(allocator, HashKeyKind::Str)
}

pub fn new_int_map(allocator: &mut Allocator) -> Result<Word> {
    new_map(allocator, HashKeyKind::Int)
}

fn new_map(allocator: &mut Allocator, kind: HashKeyKind) -> Result<Word> {
    let header = TrieMapHeader { kind, size: 0, root: None };
    let record = match kind {
        HashKeyKind::Str => CellRecord::StrTrieMap(header),
        HashKeyKind::Int => CellRecord::IntTrieMap(header),
        HashKeyKind::Custom => unreachable!("custom maps are not built through this constructor"),
    };
    let id = allocator.alloc_record(EDEN_GENERATION, 1, record)?;
    Ok(Word::Cell(id))
}

pub fn len(allocator: &Allocator, map: &Word, hook: &dyn ErrorHook) -> usize {
    let Some(cell) = map.as_cell() else {
        not_a_trie_map(hook);
        return 0;
    };
    let id = allocator.resolve(cell);
    header(allocator, id, hook).map(|h| h.size).unwrap_or(0)
}

/// Descends from `node` toward the leaf `target`'s bits would reach,
/// without yet knowing whether that leaf's key actually equals `target`
/// (spec §4.E.4 "`find_node`, a two-pass algorithm: first find the
/// closest leaf, then verify").
fn descend(allocator: &Allocator, mut node: CellId, target: &[u8], hook: &dyn ErrorHook) -> CellId {
    loop {
        node = allocator.resolve(node);
        match allocator.record(node).expect("live trie node") {
            CellRecord::TrieNode(n, _) => {
                node = if bit_at(target, n.discriminant as u32) { n.right } else { n.left };
            }
            CellRecord::TrieLeaf(_, _) => return node,
            _ => {
                corrupt_tree(hook);
                return node;
            }
        }
    }
}

fn leaf_key_bytes(allocator: &Allocator, kind: HashKeyKind, id: CellId, hook: &dyn ErrorHook) -> Vec<u8> {
    match allocator.record(id).expect("live trie leaf") {
        CellRecord::TrieLeaf(l, _) => key_bytes(allocator, kind, &l.key, hook),
        _ => {
            corrupt_tree(hook);
            Vec::new()
        }
    }
}

pub fn get(allocator: &Allocator, map: &Word, key: &Word, hook: &dyn ErrorHook) -> Option<Word> {
    let Some(cell) = map.as_cell() else {
        not_a_trie_map(hook);
        return None;
    };
    let map_id = allocator.resolve(cell);
    let h = header(allocator, map_id, hook)?;
    let kind = h.kind;
    let root = h.root?;
    let target = key_bytes(allocator, kind, key, hook);
    let leaf_id = descend(allocator, root, &target, hook);
    match allocator.record(leaf_id).expect("live trie leaf") {
        CellRecord::TrieLeaf(l, _) => {
            let lb = key_bytes(allocator, kind, &l.key, hook);
            (lb == target).then(|| l.value.clone())
        }
        _ => None,
    }
}

fn cow_leaf_if_frozen(allocator: &mut Allocator, leaf: CellId, hook: &dyn ErrorHook) -> Result<CellId> {
    let leaf = allocator.resolve(leaf);
    let is_mutable = match allocator.record(leaf).expect("live trie leaf") {
        CellRecord::TrieLeaf(_, m) => *m,
        _ => {
            corrupt_tree(hook);
            true
        }
    };
    if is_mutable {
        return Ok(leaf);
    }
    let cloned = match allocator.record(leaf).expect("live trie leaf") {
        CellRecord::TrieLeaf(l, _) => CellRecord::TrieLeaf(l.clone(), true),
        _ => unreachable!(),
    };
    allocator.alloc_record(EDEN_GENERATION, 1, cloned)
}

/// Rebuilds the path from `node` down to the leaf that `target_bytes`
/// deterministically reaches, swapping that leaf for `replacement` and
/// copy-on-writing every branch node on the way (spec §4.E.4 "First
/// mutation on an immutable branch triggers copy-on-write along the
/// root spine"). Untouched siblings are passed through unchanged.
fn rebuild_path_to(
    allocator: &mut Allocator,
    node: CellId,
    target_bytes: &[u8],
    replacement: CellId,
    hook: &dyn ErrorHook,
) -> Result<CellId> {
    let node = allocator.resolve(node);
    match allocator.record(node).expect("live trie node") {
        CellRecord::TrieLeaf(_, _) => Ok(replacement),
        CellRecord::TrieNode(n, _) => {
            let (bit, left, right) = (n.discriminant, n.left, n.right);
            let (new_left, new_right) = if bit_at(target_bytes, bit as u32) {
                (left, rebuild_path_to(allocator, right, target_bytes, replacement, hook)?)
            } else {
                (rebuild_path_to(allocator, left, target_bytes, replacement, hook)?, right)
            };
            allocator.alloc_record(
                EDEN_GENERATION,
                1,
                CellRecord::TrieNode(TrieNode { discriminant: bit, left: new_left, right: new_right }, true),
            )
        }
        _ => {
            corrupt_tree(hook);
            Ok(replacement)
        }
    }
}

/// Splices `new_leaf` into the tree rooted at `node` at the point
/// dictated by `diff` (the highest bit at which the new key differs
/// from its closest existing neighbor), copy-on-writing every branch
/// node it descends through (spec §4.E.4 "Insert: descend while the
/// existing branch's bit precedes the new key's differing bit; splice a
/// new branch node at the point it no longer does").
fn splice_in(
    allocator: &mut Allocator,
    node: CellId,
    new_leaf: CellId,
    target: &[u8],
    diff: u32,
    hook: &dyn ErrorHook,
) -> Result<CellId> {
    let node = allocator.resolve(node);
    let branch = match allocator.record(node).expect("live trie node") {
        CellRecord::TrieNode(n, _) => Some((n.discriminant as u32, n.left, n.right)),
        CellRecord::TrieLeaf(_, _) => None,
        _ => {
            corrupt_tree(hook);
            None
        }
    };

    if let Some((bit, left, right)) = branch {
        if bit < diff {
            let (new_left, new_right) = if bit_at(target, bit) {
                (left, splice_in(allocator, right, new_leaf, target, diff, hook)?)
            } else {
                (splice_in(allocator, left, new_leaf, target, diff, hook)?, right)
            };
            return allocator.alloc_record(
                EDEN_GENERATION,
                1,
                CellRecord::TrieNode(TrieNode { discriminant: bit as u64, left: new_left, right: new_right }, true),
            );
        }
    }

    let branch = if bit_at(target, diff) {
        TrieNode { discriminant: diff as u64, left: node, right: new_leaf }
    } else {
        TrieNode { discriminant: diff as u64, left: new_leaf, right: node }
    };
    allocator.alloc_record(EDEN_GENERATION, 1, CellRecord::TrieNode(branch, true))
}

/// Inserts `key -> value` (spec §4.E.4 "Insert"). Returns `true` if this
/// created a new leaf, `false` if an existing one was overwritten or
/// `map`/`key` failed validation (reported through `hook`).
pub fn insert(allocator: &mut Allocator, map: &Word, key: Word, value: Word, hook: &dyn ErrorHook) -> Result<bool> {
    let Some(cell) = map.as_cell() else {
        not_a_trie_map(hook);
        return Ok(false);
    };
    let map_id = allocator.resolve(cell);
    let Some(kind) = header(allocator, map_id, hook).map(|h| h.kind) else {
        return Ok(false);
    };
    let target = key_bytes(allocator, kind, &key, hook);

    let Some(root) = header(allocator, map_id, hook).and_then(|h| h.root) else {
        let leaf_id = allocator.alloc_record(EDEN_GENERATION, 1, CellRecord::TrieLeaf(TrieLeaf { key, value }, true))?;
        if let Some(h) = header_mut(allocator, map_id, hook) {
            h.root = Some(leaf_id);
            h.size = 1;
        }
        return Ok(true);
    };

    let closest = descend(allocator, root, &target, hook);
    let closest_bytes = leaf_key_bytes(allocator, kind, closest, hook);
    let Some(diff) = diff_bit(&target, &closest_bytes) else {
        let writable = cow_leaf_if_frozen(allocator, closest, hook)?;
        match allocator.record_mut(writable).expect("live trie leaf") {
            CellRecord::TrieLeaf(l, _) => l.value = value,
            _ => corrupt_tree(hook),
        }
        if writable != closest {
            let new_root = rebuild_path_to(allocator, root, &target, writable, hook)?;
            if let Some(h) = header_mut(allocator, map_id, hook) {
                h.root = Some(new_root);
            }
        }
        return Ok(false);
    };

    let new_leaf = allocator.alloc_record(EDEN_GENERATION, 1, CellRecord::TrieLeaf(TrieLeaf { key, value }, true))?;
    let new_root = splice_in(allocator, root, new_leaf, &target, diff, hook)?;
    if let Some(h) = header_mut(allocator, map_id, hook) {
        h.root = Some(new_root);
        h.size += 1;
    }
    Ok(true)
}

/// Removes `target`'s leaf: its parent branch collapses into the
/// sibling subtree (spec §4.E.4 "Delete").
fn remove_leaf(
    allocator: &mut Allocator,
    node: CellId,
    target: CellId,
    target_bytes: &[u8],
    hook: &dyn ErrorHook,
) -> Result<Option<CellId>> {
    let node = allocator.resolve(node);
    if node == allocator.resolve(target) {
        return Ok(None);
    }
    match allocator.record(node).expect("live trie node") {
        CellRecord::TrieNode(n, _) => {
            let (bit, left, right) = (n.discriminant, n.left, n.right);
            if bit_at(target_bytes, bit as u32) {
                match remove_leaf(allocator, right, target, target_bytes, hook)? {
                    Some(new_right) => Ok(Some(allocator.alloc_record(
                        EDEN_GENERATION,
                        1,
                        CellRecord::TrieNode(TrieNode { discriminant: bit, left, right: new_right }, true),
                    )?)),
                    None => Ok(Some(left)),
                }
            } else {
                match remove_leaf(allocator, left, target, target_bytes, hook)? {
                    Some(new_left) => Ok(Some(allocator.alloc_record(
                        EDEN_GENERATION,
                        1,
                        CellRecord::TrieNode(TrieNode { discriminant: bit, left: new_left, right }, true),
                    )?)),
                    None => Ok(Some(right)),
                }
            }
        }
        _ => {
            corrupt_tree(hook);
            Ok(None)
        }
    }
}

pub fn delete(allocator: &mut Allocator, map: &Word, key: &Word, hook: &dyn ErrorHook) -> Result<bool> {
    let Some(cell) = map.as_cell() else {
        not_a_trie_map(hook);
        return Ok(false);
    };
    let map_id = allocator.resolve(cell);
    let Some(kind) = header(allocator, map_id, hook).map(|h| h.kind) else {
        return Ok(false);
    };
    let Some(root) = header(allocator, map_id, hook).and_then(|h| h.root) else {
        return Ok(false);
    };
    let target = key_bytes(allocator, kind, key, hook);
    let closest = descend(allocator, root, &target, hook);
    let closest_bytes = leaf_key_bytes(allocator, kind, closest, hook);
    if closest_bytes != target {
        return Ok(false);
    }
    let new_root = remove_leaf(allocator, root, closest, &target, hook)?;
    if let Some(h) = header_mut(allocator, map_id, hook) {
        h.root = new_root;
        h.size -= 1;
    }
    Ok(true)
}

fn freeze_subtree(allocator: &mut Allocator, node: CellId, hook: &dyn ErrorHook) {
    let node = allocator.resolve(node);
    let children = match allocator.record_mut(node).expect("live trie node") {
        CellRecord::TrieNode(n, m) => {
            *m = false;
            Some((n.left, n.right))
        }
        CellRecord::TrieLeaf(_, m) => {
            *m = false;
            None
        }
        _ => {
            corrupt_tree(hook);
            None
        }
    };
    if let Some((l, r)) = children {
        freeze_subtree(allocator, l, hook);
        freeze_subtree(allocator, r, hook);
    }
}

/// `copy(map)` (spec §4.E.4): an O(size) freeze pass over the whole
/// tree, after which either handle can be mutated independently.
/// Returns `Word::Nil` if `map` fails validation.
pub fn copy(allocator: &mut Allocator, map: &Word, hook: &dyn ErrorHook) -> Result<Word> {
    let Some(cell) = map.as_cell() else {
        not_a_trie_map(hook);
        return Ok(Word::Nil);
    };
    let map_id = allocator.resolve(cell);
    let Some((kind, size, root)) = header(allocator, map_id, hook).map(|h| (h.kind, h.size, h.root)) else {
        return Ok(Word::Nil);
    };
    if let Some(root) = root {
        freeze_subtree(allocator, root, hook);
    }
    let new_header = TrieMapHeader { kind, size, root };
    let record = match kind {
        HashKeyKind::Str => CellRecord::StrTrieMap(new_header),
        HashKeyKind::Int => CellRecord::IntTrieMap(new_header),
        HashKeyKind::Custom => unreachable!(),
    };
    let id = allocator.alloc_record(EDEN_GENERATION, 1, record)?;
    Ok(Word::Cell(id))
}

/// In-order iteration over the crit-bit tree, which visits keys in
/// ascending byte order (spec §4.E.4 "Iteration"). Collected eagerly
/// rather than re-descending lazily per step, trading the spec's
/// cached-next-branch optimization for a simpler, obviously-correct
/// implementation.
pub struct Iter {
    items: std::vec::IntoIter<(Word, Word)>,
}

pub fn iter(allocator: &Allocator, map: &Word, hook: &dyn ErrorHook) -> Iter {
    let Some(cell) = map.as_cell() else {
        not_a_trie_map(hook);
        return Iter { items: Vec::new().into_iter() };
    };
    let map_id = allocator.resolve(cell);
    let root = header(allocator, map_id, hook).and_then(|h| h.root);
    let mut items = Vec::new();
    if let Some(root) = root {
        collect_in_order(allocator, root, &mut items, hook);
    }
    Iter { items: items.into_iter() }
}

fn collect_in_order(allocator: &Allocator, node: CellId, out: &mut Vec<(Word, Word)>, hook: &dyn ErrorHook) {
    let node = allocator.resolve(node);
    match allocator.record(node).expect("live trie node") {
        CellRecord::TrieNode(n, _) => {
            collect_in_order(allocator, n.left, out, hook);
            collect_in_order(allocator, n.right, out, hook);
        }
        CellRecord::TrieLeaf(l, _) => out.push((l.key.clone(), l.value.clone())),
        _ => corrupt_tree(hook),
    }
}

impl Iterator for Iter {
    type Item = (Word, Word);
    fn next(&mut self) -> Option<Self::Item> {
        self.items.next()
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
        for i in [5i64, -3, 100, 0, -100] {
            insert(&mut allocator, &map, Word::SmallInt(i), Word::SmallInt(i * 10), &hook).unwrap();
        }
        for i in [5i64, -3, 100, 0, -100] {
            assert_eq!(get(&allocator, &map, &Word::SmallInt(i), &hook), Some(Word::SmallInt(i * 10)));
        }
        assert_eq!(len(&allocator, &map, &hook), 5);
    }

    #[test]
    fn overwrite_does_not_change_size() {
        let mut allocator = new_allocator();
        let hook = LoggingErrorHook;
        let map = new_int_map(&mut allocator).unwrap();
        insert(&mut allocator, &map, Word::SmallInt(1), Word::SmallInt(1), &hook).unwrap();
        insert(&mut allocator, &map, Word::SmallInt(1), Word::SmallInt(2), &hook).unwrap();
        assert_eq!(len(&allocator, &map, &hook), 1);
        assert_eq!(get(&allocator, &map, &Word::SmallInt(1), &hook), Some(Word::SmallInt(2)));
    }

    #[test]
    fn string_keys_iterate_in_ascending_byte_order() {
        let mut allocator = new_allocator();
        let hook = LoggingErrorHook;
        let map = new_str_map(&mut allocator).unwrap();
        for s in ["b", "abc", "ab", "a"] {
            let key = rope::from_str(&mut allocator, s).unwrap();
            insert(&mut allocator, &map, key, Word::SmallInt(s.len() as i64), &hook).unwrap();
        }

        let mut seen = Vec::new();
        for (k, _) in iter(&allocator, &map, &hook) {
            seen.push(rope::collect_chars(&allocator, &k).into_iter().collect::<String>());
        }
        assert_eq!(seen, vec!["a", "ab", "abc", "b"]);
    }

    #[test]
    fn delete_removes_and_rest_remain_reachable() {
        let mut allocator = new_allocator();
        let hook = LoggingErrorHook;
        let map = new_str_map(&mut allocator).unwrap();
        let keys = ["a", "ab", "abc", "b"];
        for s in keys {
            let key = rope::from_str(&mut allocator, s).unwrap();
            insert(&mut allocator, &map, key, Word::SmallInt(1), &hook).unwrap();
        }
        let ab = rope::from_str(&mut allocator, "ab").unwrap();
        assert!(delete(&mut allocator, &map, &ab, &hook).unwrap());
        assert_eq!(len(&allocator, &map, &hook), 3);
        assert_eq!(get(&allocator, &map, &ab, &hook), None);
        for s in ["a", "abc", "b"] {
            let key = rope::from_str(&mut allocator, s).unwrap();
            assert_eq!(get(&allocator, &map, &key, &hook), Some(Word::SmallInt(1)));
        }
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
    fn int_map_rejects_a_non_integer_key_without_panicking() {
        let mut allocator = new_allocator();
        let hook = LoggingErrorHook;
        let map = new_int_map(&mut allocator).unwrap();
        let string_key = rope::from_str(&mut allocator, "nope").unwrap();
        assert!(!insert(&mut allocator, &map, string_key.clone(), Word::SmallInt(1), &hook).unwrap());
    }
}
