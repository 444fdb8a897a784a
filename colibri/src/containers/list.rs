// SPDX-License-Identifier: BSD-3-Clause

//! Lists: concat trees over vector leaves, with a mutable node variant
//! for in-place construction (spec §4.E.1).
//!
//! Shares its balancing algorithm with [`super::rope`] (same
//! `ConcatNode`/`SliceNode` shapes, tagged `ConcatList`/`Sublist`
//! instead of `ConcatRope`/`Subrope`); `insert`/`remove`/`replace` are
//! expressed in terms of `sublist` + `concat` exactly as spec §4.E.1
//! directs ("implemented in terms of sublist and concat, not as
//! independent tree surgery").

use std::rc::Rc;

use crate::alloc::cell::CellId;
use crate::alloc::Allocator;
use crate::config::EDEN_GENERATION;
use crate::error::{Domain, ErrorHook, Level, Report, Result};
use crate::word::{CellRecord, ConcatNode, SliceNode, VectorRecord, Word};

const CODE_NOT_A_LIST: u32 = 1;

fn not_a_list(hook: &dyn ErrorHook) {
    hook.report(Report { level: Level::TypeCheck, domain: Domain::Container, code: CODE_NOT_A_LIST });
}

fn record_of<'a>(allocator: &'a Allocator, id: CellId) -> (CellId, &'a CellRecord) {
    let id = allocator.resolve(id);
    (
        id,
        allocator
            .record(id)
            .expect("list traversal only reaches live cells"),
    )
}

/// Reports through `hook` and returns `0` instead of panicking if
/// `word` isn't a list at all (spec §7).
pub fn length(allocator: &Allocator, word: &Word, hook: &dyn ErrorHook) -> u64 {
    match length_recurse(allocator, word) {
        Some(n) => n,
        None => {
            not_a_list(hook);
            0
        }
    }
}

fn length_recurse(allocator: &Allocator, word: &Word) -> Option<u64> {
    match word {
        Word::VoidList(n) => Some(*n),
        Word::Nil => Some(0),
        Word::Cell(id) => {
            let (_, record) = record_of(allocator, *id);
            match record {
                CellRecord::Vector(v) => Some(v.elements.len() as u64),
                CellRecord::MVector(v) => Some(v.elements.len() as u64),
                CellRecord::ConcatList(c, _) => Some(c.total_length),
                CellRecord::Sublist(s) => Some(s.last - s.first + 1),
                CellRecord::Wrap(w) => length_recurse(allocator, &w.wrapped),
                other => unreachable!("not a list node: {}", other.type_name()),
            }
        }
        _ => None,
    }
}

pub fn depth(allocator: &Allocator, word: &Word) -> u8 {
    match word {
        Word::Cell(id) => {
            let (_, record) = record_of(allocator, *id);
            match record {
                CellRecord::ConcatList(c, _) => c.depth,
                CellRecord::Sublist(s) => s.depth,
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
        length_recurse(allocator, &c.left).unwrap_or(0)
    }
}

/// `get_at(i)` for lists (spec §4.E.1). Reports through `hook` and
/// returns `Word::Nil` instead of panicking if `word` isn't a list at
/// all (spec §7).
pub fn get_at(allocator: &Allocator, word: &Word, index: u64, hook: &dyn ErrorHook) -> Word {
    match get_at_recurse(allocator, word, index) {
        Some(w) => w,
        None => {
            not_a_list(hook);
            Word::Nil
        }
    }
}

fn get_at_recurse(allocator: &Allocator, word: &Word, index: u64) -> Option<Word> {
    match word {
        Word::VoidList(n) => {
            debug_assert!(index < *n);
            Some(Word::Nil)
        }
        Word::Cell(id) => {
            let (_, record) = record_of(allocator, *id);
            match record {
                CellRecord::Vector(v) => Some(v.elements[index as usize].clone()),
                CellRecord::MVector(v) => Some(v.elements[index as usize].clone()),
                CellRecord::ConcatList(c, _) => {
                    let left_len = left_length(allocator, c);
                    if index < left_len {
                        get_at_recurse(allocator, &c.left, index)
                    } else {
                        get_at_recurse(allocator, &c.right, index - left_len)
                    }
                }
                CellRecord::Sublist(s) => get_at_recurse(allocator, &s.source, s.first + index),
                CellRecord::Wrap(w) => get_at_recurse(allocator, &w.wrapped, index),
                other => unreachable!("not a list node: {}", other.type_name()),
            }
        }
        _ => None,
    }
}

fn singleton(allocator: &mut Allocator, value: Word) -> Result<Word> {
    let id = allocator.alloc_record(
        EDEN_GENERATION,
        1,
        CellRecord::Vector(VectorRecord {
            elements: Rc::new(vec![value]),
        }),
    )?;
    Ok(Word::Cell(id))
}

fn concat_children(allocator: &Allocator, word: &Word) -> Option<(Word, Word)> {
    let id = word.as_cell()?;
    let (_, record) = record_of(allocator, id);
    match record {
        CellRecord::ConcatList(c, _) => Some((c.left.clone(), c.right.clone())),
        _ => None,
    }
}

fn make_concat_node(allocator: &mut Allocator, left: Word, right: Word) -> Result<Word> {
    let left_len = length_recurse(allocator, &left).unwrap_or(0);
    let total = left_len + length_recurse(allocator, &right).unwrap_or(0);
    let tree_depth = depth(allocator, &left).max(depth(allocator, &right)) + 1;
    let left_length_cache = if left_len <= u32::MAX as u64 { left_len as u32 } else { 0 };
    let node = ConcatNode {
        depth: tree_depth,
        left_length: left_length_cache,
        total_length: total,
        left,
        right,
    };
    let id = allocator.alloc_record(EDEN_GENERATION, 1, CellRecord::ConcatList(node, false))?;
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

/// `concat(l, r)` for lists (spec §4.E.1).
pub fn concat(allocator: &mut Allocator, left: Word, right: Word, hook: &dyn ErrorHook) -> Result<Word> {
    if length(allocator, &left, hook) == 0 {
        return Ok(right);
    }
    if length(allocator, &right, hook) == 0 {
        return Ok(left);
    }
    concat_balanced(allocator, left, right)
}

/// `sublist(s, a, b)` for lists (spec §4.E.1): mirrors
/// [`rope::subrope`](super::rope::subrope) over `Vector`/`MVector`
/// leaves instead of string leaves.
pub fn sublist(allocator: &mut Allocator, word: &Word, first: u64, last: u64, hook: &dyn ErrorHook) -> Result<Word> {
    let len = length(allocator, word, hook);
    if len == 0 || first > last || first >= len {
        return Ok(Word::VoidList(0));
    }
    let last = last.min(len - 1);
    if first == 0 && last == len - 1 {
        return Ok(word.clone());
    }
    if let Word::VoidList(_) = word {
        return Ok(Word::VoidList(last - first + 1));
    }
    if let Word::Cell(id) = word {
        let (_, record) = record_of(allocator, *id);
        match record {
            CellRecord::ConcatList(c, _) => {
                let left_len = left_length(allocator, c);
                let (left, right) = (c.left.clone(), c.right.clone());
                if last < left_len {
                    return sublist(allocator, &left, first, last, hook);
                }
                if first >= left_len {
                    return sublist(allocator, &right, first - left_len, last - left_len, hook);
                }
                let lpart = sublist(allocator, &left, first, left_len - 1, hook)?;
                let rpart = sublist(allocator, &right, 0, last - left_len, hook)?;
                return concat(allocator, lpart, rpart, hook);
            }
            CellRecord::Sublist(s) => {
                let source = s.source.clone();
                let base = s.first;
                return sublist(allocator, &source, base + first, base + last, hook);
            }
            _ => {}
        }
    }
    let id = allocator.alloc_record(
        EDEN_GENERATION,
        1,
        CellRecord::Sublist(SliceNode {
            depth: 1,
            source: word.clone(),
            first,
            last,
        }),
    )?;
    Ok(Word::Cell(id))
}

/// `insert(s, i, v)` (spec §4.E.1): `concat(concat(sublist(s,0,i-1), [v]),
/// sublist(s,i,length(s)-1))`.
pub fn insert(allocator: &mut Allocator, word: &Word, index: u64, value: Word, hook: &dyn ErrorHook) -> Result<Word> {
    let len = length(allocator, word, hook);
    let index = index.min(len);
    let left = if index == 0 {
        Word::VoidList(0)
    } else {
        sublist(allocator, word, 0, index - 1, hook)?
    };
    let right = if index >= len {
        Word::VoidList(0)
    } else {
        sublist(allocator, word, index, len - 1, hook)?
    };
    let mid = singleton(allocator, value)?;
    let lm = concat(allocator, left, mid, hook)?;
    concat(allocator, lm, right, hook)
}

/// `remove(s, i)` (spec §4.E.1): `concat(sublist(s,0,i-1),
/// sublist(s,i+1,length(s)-1))`.
pub fn remove(allocator: &mut Allocator, word: &Word, index: u64, hook: &dyn ErrorHook) -> Result<Word> {
    let len = length(allocator, word, hook);
    if index >= len {
        return Ok(word.clone());
    }
    let left = if index == 0 {
        Word::VoidList(0)
    } else {
        sublist(allocator, word, 0, index - 1, hook)?
    };
    let right = if index + 1 >= len {
        Word::VoidList(0)
    } else {
        sublist(allocator, word, index + 1, len - 1, hook)?
    };
    concat(allocator, left, right, hook)
}

/// `replace(s, i, v)` (spec §4.E.1): `remove` then `insert`.
pub fn replace(allocator: &mut Allocator, word: &Word, index: u64, value: Word, hook: &dyn ErrorHook) -> Result<Word> {
    let len = length(allocator, word, hook);
    if index >= len {
        return Ok(word.clone());
    }
    let removed = remove(allocator, word, index, hook)?;
    insert(allocator, &removed, index, value, hook)
}

/// Converts the access path down to `index` into mutable
/// `ConcatList(_, true)` nodes, leaving untouched subtrees shared (spec
/// §4.E.1 "Mutable list operations convert immutable subtrees to mutable
/// variants along the accessed path").
pub fn to_mutable_path(allocator: &mut Allocator, word: &Word, index: u64) -> Result<Word> {
    let id = match word {
        Word::Cell(id) => *id,
        _ => return Ok(word.clone()),
    };
    let (resolved, node) = record_of(allocator, id);
    let (left, right, total, tree_depth, left_len_cache) = match node {
        CellRecord::ConcatList(c, _) => (c.left.clone(), c.right.clone(), c.total_length, c.depth, c.left_length),
        _ => return Ok(word.clone()),
    };
    let _ = resolved;
    let left_len = if left_len_cache != 0 { left_len_cache as u64 } else { length_recurse(allocator, &left).unwrap_or(0) };
    let (new_left, new_right) = if index < left_len {
        (to_mutable_path(allocator, &left, index)?, right)
    } else {
        (left, to_mutable_path(allocator, &right, index - left_len)?)
    };
    let node = ConcatNode {
        depth: tree_depth,
        left_length: left_len_cache,
        total_length: total,
        left: new_left,
        right: new_right,
    };
    let new_id = allocator.alloc_record(EDEN_GENERATION, 1, CellRecord::ConcatList(node, true))?;
    Ok(Word::Cell(new_id))
}

/// A positional cursor over a list's elements (spec §4.E.1 "iteration",
/// generalized to a first-class primitive, mirroring
/// [`super::rope::RopeCursor`] and [`super::triemap::Iter`] for the same
/// "small stateful struct with a `next`" idiom): steps forward one
/// element at a time in O(1) amortized time without re-descending from
/// the root on every step, keeping a stack of subtrees still to visit
/// and materializing only the one leaf vector it's currently stepping
/// through.
pub struct ListCursor<'a> {
    allocator: &'a Allocator,
    pending: Vec<Word>,
    chunk: Rc<Vec<Word>>,
    chunk_pos: usize,
    index: u64,
}

/// Opens a cursor positioned before `word`'s first element.
pub fn cursor(allocator: &Allocator, word: &Word) -> ListCursor<'_> {
    let mut c = ListCursor { allocator, pending: vec![word.clone()], chunk: Rc::new(Vec::new()), chunk_pos: 0, index: 0 };
    c.fill_next_chunk();
    c
}

impl<'a> ListCursor<'a> {
    fn fill_next_chunk(&mut self) -> bool {
        while let Some(mut node) = self.pending.pop() {
            loop {
                match &node {
                    Word::Nil | Word::VoidList(0) => break,
                    Word::VoidList(n) => {
                        self.chunk = Rc::new(vec![Word::Nil; *n as usize]);
                        self.chunk_pos = 0;
                        return true;
                    }
                    Word::Cell(id) => {
                        let (_, record) = record_of(self.allocator, *id);
                        match record {
                            CellRecord::Vector(v) => {
                                self.chunk = v.elements.clone();
                                self.chunk_pos = 0;
                                return true;
                            }
                            CellRecord::MVector(v) => {
                                self.chunk = Rc::new(v.elements.clone());
                                self.chunk_pos = 0;
                                return true;
                            }
                            CellRecord::ConcatList(c, _) => {
                                self.pending.push(c.right.clone());
                                node = c.left.clone();
                                continue;
                            }
                            CellRecord::Sublist(s) => {
                                let chars: Vec<Word> = (s.first..=s.last)
                                    .filter_map(|i| get_at_recurse(self.allocator, &s.source, i))
                                    .collect();
                                self.chunk = Rc::new(chars);
                                self.chunk_pos = 0;
                                return true;
                            }
                            CellRecord::Wrap(w) => {
                                node = w.wrapped.clone();
                                continue;
                            }
                            other => unreachable!("not a list node: {}", other.type_name()),
                        }
                    }
                    _ => break,
                }
            }
        }
        false
    }

    /// The element index the next call to [`Self::next`] would yield.
    pub fn position(&self) -> u64 {
        self.index
    }
}

impl Iterator for ListCursor<'_> {
    type Item = Word;

    fn next(&mut self) -> Option<Word> {
        loop {
            if self.chunk_pos < self.chunk.len() {
                let w = self.chunk[self.chunk_pos].clone();
                self.chunk_pos += 1;
                self.index += 1;
                return Some(w);
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

    fn collect(allocator: &Allocator, word: &Word, hook: &dyn ErrorHook) -> Vec<Word> {
        (0..length(allocator, word, hook)).map(|i| get_at(allocator, word, i, hook)).collect()
    }

    #[test]
    fn concat_and_get_at_roundtrip() {
        let mut allocator = new_allocator();
        let hook = LoggingErrorHook;
        let a = singleton(&mut allocator, Word::SmallInt(1)).unwrap();
        let b = singleton(&mut allocator, Word::SmallInt(2)).unwrap();
        let l = concat(&mut allocator, a, b, &hook).unwrap();
        assert_eq!(length(&allocator, &l, &hook), 2);
        assert_eq!(get_at(&allocator, &l, 0, &hook), Word::SmallInt(1));
        assert_eq!(get_at(&allocator, &l, 1, &hook), Word::SmallInt(2));
    }

    #[test]
    fn insert_remove_replace_roundtrip() {
        let mut allocator = new_allocator();
        let hook = LoggingErrorHook;
        let mut l = Word::VoidList(0);
        for i in 0..5i64 {
            l = insert(&mut allocator, &l, i as u64, Word::SmallInt(i), &hook).unwrap();
        }
        assert_eq!(collect(&allocator, &l, &hook), vec![0, 1, 2, 3, 4].into_iter().map(Word::SmallInt).collect::<Vec<_>>());

        let removed = remove(&mut allocator, &l, 2, &hook).unwrap();
        assert_eq!(
            collect(&allocator, &removed, &hook),
            vec![0, 1, 3, 4].into_iter().map(Word::SmallInt).collect::<Vec<_>>()
        );

        let replaced = replace(&mut allocator, &l, 2, Word::SmallInt(99), &hook).unwrap();
        assert_eq!(get_at(&allocator, &replaced, 2, &hook), Word::SmallInt(99));
        // Original is untouched.
        assert_eq!(get_at(&allocator, &l, 2, &hook), Word::SmallInt(2));
    }

    #[test]
    fn void_list_sublist_then_insert_matches_scenario() {
        // Scenario 6: a void list of length 2^20, concat with a
        // one-element list, then sublist the boundary straddling the
        // void run and the appended element.
        let mut allocator = new_allocator();
        let hook = LoggingErrorHook;
        let void = Word::VoidList(1 << 20);
        let one = singleton(&mut allocator, Word::SmallInt(7)).unwrap();
        let whole = concat(&mut allocator, void, one, &hook).unwrap();
        assert_eq!(length(&allocator, &whole, &hook), (1 << 20) + 1);

        let boundary = sublist(&mut allocator, &whole, (1 << 20) - 1, 1 << 20, &hook).unwrap();
        assert_eq!(length(&allocator, &boundary, &hook), 2);
        assert_eq!(get_at(&allocator, &boundary, 0, &hook), Word::Nil);
        assert_eq!(get_at(&allocator, &boundary, 1, &hook), Word::SmallInt(7));
    }

    #[test]
    fn full_sublist_is_identity() {
        let mut allocator = new_allocator();
        let hook = LoggingErrorHook;
        let a = singleton(&mut allocator, Word::SmallInt(1)).unwrap();
        let b = singleton(&mut allocator, Word::SmallInt(2)).unwrap();
        let l = concat(&mut allocator, a, b, &hook).unwrap();
        let len = length(&allocator, &l, &hook);
        let s = sublist(&mut allocator, &l, 0, len - 1, &hook).unwrap();
        assert_eq!(collect(&allocator, &s, &hook), collect(&allocator, &l, &hook));
    }

    #[test]
    fn get_at_on_a_non_list_word_reports_instead_of_panicking() {
        let allocator = new_allocator();
        let hook = LoggingErrorHook;
        assert_eq!(get_at(&allocator, &Word::SmallInt(5), 0, &hook), Word::Nil);
        assert_eq!(length(&allocator, &Word::SmallInt(5), &hook), 0);
    }

    #[test]
    fn cursor_visits_every_element_in_order() {
        let mut allocator = new_allocator();
        let hook = LoggingErrorHook;
        let mut l = Word::VoidList(0);
        for i in 0..5i64 {
            l = insert(&mut allocator, &l, i as u64, Word::SmallInt(i), &hook).unwrap();
        }
        let via_cursor: Vec<Word> = cursor(&allocator, &l).collect();
        assert_eq!(via_cursor, vec![0, 1, 2, 3, 4].into_iter().map(Word::SmallInt).collect::<Vec<_>>());
    }

    #[test]
    fn cursor_position_tracks_elements_consumed() {
        let mut allocator = new_allocator();
        let a = singleton(&mut allocator, Word::SmallInt(1)).unwrap();
        let b = singleton(&mut allocator, Word::SmallInt(2)).unwrap();
        let hook = LoggingErrorHook;
        let l = concat(&mut allocator, a, b, &hook).unwrap();
        let mut c = cursor(&allocator, &l);
        assert_eq!(c.position(), 0);
        c.next();
        assert_eq!(c.position(), 1);
    }
}
