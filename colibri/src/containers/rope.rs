// SPDX-License-Identifier: BSD-3-Clause

//! Ropes: balanced concatenation trees over string leaves (spec §4.E.1).
//!
//! Leaves are flat strings (`CellRecord::UcsString`/`UtfString`, or the
//! `SmallChar`/`SmallString` immediates); internal nodes are
//! `CellRecord::ConcatRope`; `CellRecord::Subrope` is a slice over an
//! immutable source. Rebalancing on `concat` follows the standard
//! rope-literature rotation (descend into the taller side and rebuild)
//! rather than any one teacher file, since none of the retrieval pack's
//! examples implement a concat tree; it is the direct expression of
//! spec §4.E.1's "depth within 1 of max(depth(l), depth(r))+1" guarantee.

use std::rc::Rc;

use crate::alloc::cell::CellId;
use crate::alloc::Allocator;
use crate::config::EDEN_GENERATION;
use crate::error::{Domain, ErrorHook, Level, Report, Result};
use crate::word::{CellRecord, ConcatNode, SliceNode, Word};

const CODE_NOT_A_ROPE: u32 = 1;

fn not_a_rope(hook: &dyn ErrorHook) {
    hook.report(Report { level: Level::TypeCheck, domain: Domain::Container, code: CODE_NOT_A_ROPE });
}

fn record_of<'a>(allocator: &'a Allocator, id: CellId) -> (CellId, &'a CellRecord) {
    let id = allocator.resolve(id);
    (
        id,
        allocator
            .record(id)
            .expect("rope traversal only reaches live cells"),
    )
}

/// Number of Unicode scalar values represented by `word`
/// (spec §4.E.1 `length`).
pub fn length(allocator: &Allocator, word: &Word) -> u64 {
    match word {
        Word::Nil | Word::VoidList(_) | Word::Bool(_) | Word::SmallInt(_) | Word::SmallFloat(_) => 0,
        Word::SmallChar(_) => 1,
        Word::SmallString(s) => s.len() as u64,
        Word::CircularList(core) => length(allocator, core),
        Word::Cell(id) => {
            let (_, record) = record_of(allocator, *id);
            match record {
                CellRecord::UcsString(v) => v.len() as u64,
                CellRecord::UtfString(s) => s.chars().count() as u64,
                CellRecord::ConcatRope(c) => c.total_length,
                CellRecord::Subrope(s) => s.last - s.first + 1,
                CellRecord::Wrap(w) => length(allocator, &w.wrapped),
                other => unreachable!("not a rope node: {}", other.type_name()),
            }
        }
    }
}

/// Depth of `word`'s concat tree, `0` for any leaf (spec §4.E.1 `depth`).
pub fn depth(allocator: &Allocator, word: &Word) -> u8 {
    match word {
        Word::CircularList(core) => depth(allocator, core),
        Word::Cell(id) => {
            let (_, record) = record_of(allocator, *id);
            match record {
                CellRecord::ConcatRope(c) => c.depth,
                CellRecord::Subrope(s) => s.depth,
                CellRecord::Wrap(w) => depth(allocator, &w.wrapped),
                _ => 0,
            }
        }
        _ => 0,
    }
}

fn left_length(allocator: &Allocator, c: &ConcatNode) -> u64 {
    if c.left_length != 0 {
        c.left_length as u64
    } else {
        length(allocator, &c.left)
    }
}

/// `get_at(i)` for ropes (spec §4.E.1). Reports through `hook` and
/// returns `'\0'` instead of panicking if `word` isn't a rope at all.
pub fn char_at(allocator: &Allocator, word: &Word, index: u64, hook: &dyn ErrorHook) -> char {
    match char_at_recurse(allocator, word, index) {
        Some(c) => c,
        None => {
            not_a_rope(hook);
            '\0'
        }
    }
}

fn char_at_recurse(allocator: &Allocator, word: &Word, index: u64) -> Option<char> {
    match word {
        Word::SmallString(s) => Some(s[index as usize] as char),
        Word::SmallChar(c) => {
            debug_assert_eq!(index, 0);
            Some(*c)
        }
        Word::CircularList(core) => char_at_recurse(allocator, core, index),
        Word::Cell(id) => {
            let (_, record) = record_of(allocator, *id);
            match record {
                CellRecord::UcsString(v) => Some(v[index as usize]),
                CellRecord::UtfString(s) => Some(s.chars().nth(index as usize).expect("index in range")),
                CellRecord::ConcatRope(c) => {
                    let left_len = left_length(allocator, c);
                    if index < left_len {
                        char_at_recurse(allocator, &c.left, index)
                    } else {
                        char_at_recurse(allocator, &c.right, index - left_len)
                    }
                }
                CellRecord::Subrope(s) => char_at_recurse(allocator, &s.source, s.first + index),
                CellRecord::Wrap(w) => char_at_recurse(allocator, &w.wrapped, index),
                other => unreachable!("not a rope node: {}", other.type_name()),
            }
        }
        _ => None,
    }
}

fn build_leaf(allocator: &mut Allocator, chars: Vec<char>) -> Result<Word> {
    if chars.is_empty() {
        return Ok(Word::SmallString(Default::default()));
    }
    if chars.len() == 1 {
        return Ok(Word::SmallChar(chars[0]));
    }
    if chars.len() <= crate::config::SMALL_STRING_MAX_LEN && chars.iter().all(char::is_ascii) {
        let bytes = chars.iter().map(|&c| c as u8).collect();
        return Ok(Word::SmallString(bytes));
    }
    let id = allocator.alloc_record(EDEN_GENERATION, 1, CellRecord::UcsString(Rc::new(chars)))?;
    Ok(Word::Cell(id))
}

/// Builds a rope from a Rust string slice, choosing the smallest leaf
/// representation that fits (immediate char/small-string, or a
/// cell-allocated `UcsString`).
pub fn from_str(allocator: &mut Allocator, s: &str) -> Result<Word> {
    build_leaf(allocator, s.chars().collect())
}

fn concat_children(allocator: &Allocator, word: &Word) -> Option<(Word, Word)> {
    let id = word.as_cell()?;
    let (_, record) = record_of(allocator, id);
    match record {
        CellRecord::ConcatRope(c) => Some((c.left.clone(), c.right.clone())),
        _ => None,
    }
}

fn make_concat_node(allocator: &mut Allocator, left: Word, right: Word) -> Result<Word> {
    let left_len = length(allocator, &left);
    let total = left_len + length(allocator, &right);
    let tree_depth = depth(allocator, &left).max(depth(allocator, &right)) + 1;
    let left_length_cache = if left_len <= u32::MAX as u64 { left_len as u32 } else { 0 };
    let node = ConcatNode {
        depth: tree_depth,
        left_length: left_length_cache,
        total_length: total,
        left,
        right,
    };
    let id = allocator.alloc_record(EDEN_GENERATION, 1, CellRecord::ConcatRope(node))?;
    Ok(Word::Cell(id))
}

fn concat_balanced(allocator: &mut Allocator, left: Word, right: Word) -> Result<Word> {
    let dl = depth(allocator, &left);
    let dr = depth(allocator, &right);
    if dl > dr + 1 {
        if let Some((ll, lr)) = concat_children(allocator, &left) {
            let new_right = concat_balanced(allocator, lr, right)?;
            return concat_balanced(allocator, ll, new_right);
        }
    } else if dr > dl + 1 {
        if let Some((rl, rr)) = concat_children(allocator, &right) {
            let new_left = concat_balanced(allocator, left, rl)?;
            return concat_balanced(allocator, new_left, rr);
        }
    }
    make_concat_node(allocator, left, right)
}

/// `concat(l, r)` (spec §4.E.1): rebalances so the result's depth is
/// within 1 of `max(depth(l), depth(r)) + 1`.
pub fn concat(allocator: &mut Allocator, left: Word, right: Word) -> Result<Word> {
    if length(allocator, &left) == 0 {
        return Ok(right);
    }
    if length(allocator, &right) == 0 {
        return Ok(left);
    }
    concat_balanced(allocator, left, right)
}

/// `sublist(s, a, b)` for ropes, called `subrope` in the spec's own
/// prose (spec §4.E.1): returns an immediate for single-char results, a
/// direct leaf slice for small flat leaves, or a `Subrope` node sharing
/// its immutable source otherwise.
pub fn subrope(allocator: &mut Allocator, word: &Word, first: u64, last: u64) -> Result<Word> {
    let len = length(allocator, word);
    if len == 0 || first > last || first >= len {
        return Ok(Word::SmallString(Default::default()));
    }
    let last = last.min(len - 1);
    if first == 0 && last == len - 1 {
        return Ok(word.clone());
    }
    if last == first {
        return Ok(Word::SmallChar(char_at_recurse(allocator, word, first).unwrap_or('\0')));
    }
    if let Word::SmallString(s) = word {
        let chars: Vec<char> = s[first as usize..=last as usize].iter().map(|&b| b as char).collect();
        return build_leaf(allocator, chars);
    }
    if let Word::Cell(id) = word {
        let (_, record) = record_of(allocator, *id);
        match record {
            CellRecord::ConcatRope(c) => {
                let left_len = left_length(allocator, c);
                let (left, right) = (c.left.clone(), c.right.clone());
                if last < left_len {
                    return subrope(allocator, &left, first, last);
                }
                if first >= left_len {
                    return subrope(allocator, &right, first - left_len, last - left_len);
                }
                let lpart = subrope(allocator, &left, first, left_len - 1)?;
                let rpart = subrope(allocator, &right, 0, last - left_len)?;
                return concat(allocator, lpart, rpart);
            }
            CellRecord::Subrope(s) => {
                let source = s.source.clone();
                let base = s.first;
                return subrope(allocator, &source, base + first, base + last);
            }
            _ => {}
        }
    }
    // A proper sub-range of a flat cell-allocated leaf: share rather than
    // copy (spec: "source is immutable").
    let id = allocator.alloc_record(
        EDEN_GENERATION,
        1,
        CellRecord::Subrope(SliceNode {
            depth: 1,
            source: word.clone(),
            first,
            last,
        }),
    )?;
    Ok(Word::Cell(id))
}

/// Visits each maximal contiguous leaf span without per-element dispatch
/// (spec §4.E.1 "Chunk traversal").
pub fn for_each_chunk<F: FnMut(&[char])>(allocator: &Allocator, word: &Word, mut f: F) {
    fn walk<F: FnMut(&[char])>(allocator: &Allocator, word: &Word, f: &mut F) {
        match word {
            Word::Nil | Word::VoidList(_) => {}
            Word::SmallChar(c) => f(&[*c]),
            Word::SmallString(s) => {
                let chars: Vec<char> = s.iter().map(|&b| b as char).collect();
                f(&chars);
            }
            Word::CircularList(core) => walk(allocator, core, f),
            Word::Cell(id) => {
                let (_, record) = record_of(allocator, *id);
                match record {
                    CellRecord::UcsString(v) => f(v),
                    CellRecord::UtfString(s) => {
                        let chars: Vec<char> = s.chars().collect();
                        f(&chars);
                    }
                    CellRecord::ConcatRope(c) => {
                        walk(allocator, &c.left, f);
                        walk(allocator, &c.right, f);
                    }
                    CellRecord::Subrope(s) => {
                        let chars: Vec<char> = (s.first..=s.last)
                            .map(|i| char_at_recurse(allocator, &s.source, i).unwrap_or('\0'))
                            .collect();
                        f(&chars);
                    }
                    CellRecord::Wrap(w) => walk(allocator, &w.wrapped, f),
                    other => unreachable!("not a rope node: {}", other.type_name()),
                }
            }
            _ => {}
        }
    }
    walk(allocator, word, &mut f);
}

/// Collects every character of `word` into a `Vec` (used by
/// `containers::hashmap`'s string-key hashing/comparison).
pub fn collect_chars(allocator: &Allocator, word: &Word) -> Vec<char> {
    let mut out = Vec::with_capacity(length(allocator, word) as usize);
    for_each_chunk(allocator, word, |chunk| out.extend_from_slice(chunk));
    out
}

/// A positional cursor over a rope's characters (spec §4.E.1
/// "iteration", generalized to a first-class primitive): steps forward
/// one character at a time in O(1) amortized time, without re-descending
/// from the root on every step. Built the same way
/// [`super::triemap::Iter`] is — a small stateful struct with a `next`
/// method — but lazily: rather than collecting every leaf up front, it
/// keeps a stack of subtrees still to visit and only ever materializes
/// the one leaf chunk it's currently stepping through.
pub struct RopeCursor<'a> {
    allocator: &'a Allocator,
    pending: Vec<Word>,
    chunk: Vec<char>,
    chunk_pos: usize,
    index: u64,
}

/// Opens a cursor positioned before `word`'s first character.
pub fn cursor(allocator: &Allocator, word: &Word) -> RopeCursor<'_> {
    let mut c = RopeCursor { allocator, pending: vec![word.clone()], chunk: Vec::new(), chunk_pos: 0, index: 0 };
    c.fill_next_chunk();
    c
}

impl<'a> RopeCursor<'a> {
    /// Descends along the leftmost spine of the next pending subtree,
    /// pushing each right sibling it passes so the stack holds exactly
    /// the as-yet-unvisited subtrees (at most `depth(word)` entries at
    /// any time). Returns `false` once nothing is left to visit.
    fn fill_next_chunk(&mut self) -> bool {
        while let Some(mut node) = self.pending.pop() {
            loop {
                match &node {
                    Word::Nil | Word::VoidList(_) => break,
                    Word::SmallChar(c) => {
                        self.chunk = vec![*c];
                        self.chunk_pos = 0;
                        return true;
                    }
                    Word::SmallString(s) => {
                        self.chunk = s.iter().map(|&b| b as char).collect();
                        self.chunk_pos = 0;
                        return true;
                    }
                    Word::CircularList(core) => {
                        node = (**core).clone();
                        continue;
                    }
                    Word::Cell(id) => {
                        let (_, record) = record_of(self.allocator, *id);
                        match record {
                            CellRecord::UcsString(v) => {
                                self.chunk = (**v).clone();
                                self.chunk_pos = 0;
                                return true;
                            }
                            CellRecord::UtfString(s) => {
                                self.chunk = s.chars().collect();
                                self.chunk_pos = 0;
                                return true;
                            }
                            CellRecord::ConcatRope(c) => {
                                self.pending.push(c.right.clone());
                                node = c.left.clone();
                                continue;
                            }
                            CellRecord::Subrope(s) => {
                                self.chunk = (s.first..=s.last)
                                    .map(|i| char_at_recurse(self.allocator, &s.source, i).unwrap_or('\0'))
                                    .collect();
                                self.chunk_pos = 0;
                                return true;
                            }
                            CellRecord::Wrap(w) => {
                                node = w.wrapped.clone();
                                continue;
                            }
                            other => unreachable!("not a rope node: {}", other.type_name()),
                        }
                    }
                    _ => break,
                }
            }
        }
        false
    }

    /// The character index the next call to [`Self::next`] would yield,
    /// i.e. how many characters have been consumed so far.
    pub fn position(&self) -> u64 {
        self.index
    }
}

impl Iterator for RopeCursor<'_> {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        loop {
            if self.chunk_pos < self.chunk.len() {
                let c = self.chunk[self.chunk_pos];
                self.chunk_pos += 1;
                self.index += 1;
                return Some(c);
            }
            if !self.fill_next_chunk() {
                return None;
            }
        }
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
    fn concat_reports_combined_length() {
        let mut allocator = new_allocator();
        let a = from_str(&mut allocator, "hello ").unwrap();
        let b = from_str(&mut allocator, "world").unwrap();
        let r = concat(&mut allocator, a, b).unwrap();
        assert_eq!(length(&allocator, &r), 11);
        assert_eq!(collect_chars(&allocator, &r), "hello world".chars().collect::<Vec<_>>());
    }

    #[test]
    fn full_sublist_is_identity() {
        let mut allocator = new_allocator();
        let r = from_str(&mut allocator, "abcdefghij").unwrap();
        let len = length(&allocator, &r);
        let s = subrope(&mut allocator, &r, 0, len - 1).unwrap();
        assert_eq!(collect_chars(&allocator, &s), collect_chars(&allocator, &r));
    }

    #[test]
    fn subrope_extracts_expected_range() {
        let mut allocator = new_allocator();
        let r = from_str(&mut allocator, "abcdefghij").unwrap();
        let s = subrope(&mut allocator, &r, 2, 5).unwrap();
        assert_eq!(collect_chars(&allocator, &s), vec!['c', 'd', 'e', 'f']);
    }

    #[test]
    fn char_at_matches_source_string() {
        let mut allocator = new_allocator();
        let hook = LoggingErrorHook;
        let r = from_str(&mut allocator, "colibri").unwrap();
        for (i, expected) in "colibri".chars().enumerate() {
            assert_eq!(char_at(&allocator, &r, i as u64, &hook), expected);
        }
    }

    #[test]
    fn repeated_concatenation_stays_log_depth() {
        // Scenario 5: concatenate 10_000 single-char ropes; depth must
        // stay within a small constant multiple of log_phi(10000) rather
        // than degenerating to a 10_000-deep chain.
        let mut allocator = new_allocator();
        let hook = LoggingErrorHook;
        let mut r = from_str(&mut allocator, "a").unwrap();
        for _ in 1..10_000 {
            let next = from_str(&mut allocator, "a").unwrap();
            r = concat(&mut allocator, r, next).unwrap();
        }
        assert_eq!(length(&allocator, &r), 10_000);
        assert!(depth(&allocator, &r) <= 60, "depth grew unbounded: {}", depth(&allocator, &r));
        assert_eq!(char_at(&allocator, &r, 9_999, &hook), 'a');
    }

    #[test]
    fn char_at_on_a_non_rope_word_reports_instead_of_panicking() {
        let allocator = new_allocator();
        let hook = LoggingErrorHook;
        assert_eq!(char_at(&allocator, &Word::SmallInt(5), 0, &hook), '\0');
    }

    #[test]
    fn cursor_visits_every_character_in_order() {
        let mut allocator = new_allocator();
        let a = from_str(&mut allocator, "hello ").unwrap();
        let b = from_str(&mut allocator, "world").unwrap();
        let r = concat(&mut allocator, a, b).unwrap();
        let collected: String = cursor(&allocator, &r).collect();
        assert_eq!(collected, "hello world");
    }

    #[test]
    fn cursor_position_tracks_characters_consumed() {
        let mut allocator = new_allocator();
        let r = from_str(&mut allocator, "colibri").unwrap();
        let mut c = cursor(&allocator, &r);
        assert_eq!(c.position(), 0);
        c.next();
        c.next();
        assert_eq!(c.position(), 2);
    }

    #[test]
    fn cursor_over_a_deep_concat_tree_matches_collect_chars() {
        let mut allocator = new_allocator();
        let mut r = from_str(&mut allocator, "a").unwrap();
        for _ in 1..2_000 {
            let next = from_str(&mut allocator, "a").unwrap();
            r = concat(&mut allocator, r, next).unwrap();
        }
        let via_cursor: Vec<char> = cursor(&allocator, &r).collect();
        assert_eq!(via_cursor, collect_chars(&allocator, &r));
    }
}
