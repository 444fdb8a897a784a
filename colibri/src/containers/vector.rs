// SPDX-License-Identifier: BSD-3-Clause

//! Vectors: fixed immutable arrays and growable mutable arrays of words
//! (spec §4.E.2).

use std::rc::Rc;

use crate::alloc::cell::CellId;
use crate::alloc::Allocator;
use crate::config::{EDEN_GENERATION, MVECTOR_MAX_CELLS};
use crate::error::{Domain, Error, ErrorHook, Level, Report, Result};
use crate::word::{CellRecord, MVectorRecord, VectorRecord, Word};

const CODE_NOT_A_VECTOR: u32 = 1;
const CODE_NOT_MUTABLE: u32 = 2;
const CODE_INDEX_OUT_OF_RANGE: u32 = 3;

fn not_a_vector(hook: &dyn ErrorHook) {
    hook.report(Report { level: Level::TypeCheck, domain: Domain::Container, code: CODE_NOT_A_VECTOR });
}

fn not_mutable(hook: &dyn ErrorHook) {
    hook.report(Report { level: Level::TypeCheck, domain: Domain::Container, code: CODE_NOT_MUTABLE });
}

fn index_out_of_range(hook: &dyn ErrorHook) {
    hook.report(Report { level: Level::ValueCheck, domain: Domain::Container, code: CODE_INDEX_OUT_OF_RANGE });
}

fn resolved<'a>(allocator: &'a Allocator, id: CellId) -> (CellId, &'a CellRecord) {
    let id = allocator.resolve(id);
    (id, allocator.record(id).expect("vector handle refers to a live cell"))
}

/// Builds an immutable vector directly from its elements (spec §4.E.2
/// "Immutable vector").
pub fn new_immutable(allocator: &mut Allocator, elements: Vec<Word>) -> Result<Word> {
    let id = allocator.alloc_record(EDEN_GENERATION, 1, CellRecord::Vector(VectorRecord { elements: Rc::new(elements) }))?;
    Ok(Word::Cell(id))
}

/// Allocates a mutable vector with room for up to `capacity` elements,
/// rejecting requests beyond `MVECTOR_MAX_CELLS` cells' worth of storage
/// (spec §4.E.2 "Mutable vector").
pub fn new_mutable(allocator: &mut Allocator, capacity: usize) -> Result<Word> {
    if capacity > MVECTOR_MAX_CELLS {
        return Err(Error::OutOfMemory);
    }
    let id = allocator.alloc_record(EDEN_GENERATION, 1, CellRecord::MVector(MVectorRecord { elements: Vec::new(), capacity }))?;
    Ok(Word::Cell(id))
}

/// Returns `0` (instead of panicking) if `word` isn't a vector cell at
/// all (spec §7).
pub fn length(allocator: &Allocator, word: &Word, hook: &dyn ErrorHook) -> usize {
    let Some(cell) = word.as_cell() else {
        not_a_vector(hook);
        return 0;
    };
    match resolved(allocator, cell).1 {
        CellRecord::Vector(v) => v.elements.len(),
        CellRecord::MVector(v) => v.elements.len(),
        _ => {
            not_a_vector(hook);
            0
        }
    }
}

/// Returns `Word::Nil` (instead of panicking) if `word` isn't a vector
/// cell or `index` is out of range (spec §7).
pub fn get(allocator: &Allocator, word: &Word, index: usize, hook: &dyn ErrorHook) -> Word {
    let Some(cell) = word.as_cell() else {
        not_a_vector(hook);
        return Word::Nil;
    };
    let elements = match resolved(allocator, cell).1 {
        CellRecord::Vector(v) => &v.elements,
        CellRecord::MVector(v) => &v.elements,
        _ => {
            not_a_vector(hook);
            return Word::Nil;
        }
    };
    match elements.get(index) {
        Some(w) => w.clone(),
        None => {
            index_out_of_range(hook);
            Word::Nil
        }
    }
}

/// Appends `value` to a mutable vector, failing once `capacity` is
/// reached rather than silently reallocating (spec §4.E.2 "Mutable
/// vector": capacity is fixed at construction). Reports and no-ops if
/// `word` isn't a mutable vector.
pub fn push(allocator: &mut Allocator, word: &Word, value: Word, hook: &dyn ErrorHook) -> Result<()> {
    let Some(cell) = word.as_cell() else {
        not_a_vector(hook);
        return Ok(());
    };
    let id = allocator.resolve(cell);
    match allocator.record_mut(id).expect("live mutable vector") {
        CellRecord::MVector(v) => {
            if v.elements.len() >= v.capacity {
                return Err(Error::OutOfMemory);
            }
            v.elements.push(value);
            Ok(())
        }
        _ => {
            not_mutable(hook);
            Ok(())
        }
    }
}

/// Reports and no-ops, rather than panicking, if `word` isn't a mutable
/// vector or `index` is out of range (spec §7).
pub fn set(allocator: &mut Allocator, word: &Word, index: usize, value: Word, hook: &dyn ErrorHook) {
    let Some(cell) = word.as_cell() else {
        not_a_vector(hook);
        return;
    };
    let id = allocator.resolve(cell);
    match allocator.record_mut(id).expect("live mutable vector") {
        CellRecord::MVector(v) => match v.elements.get_mut(index) {
            Some(slot) => *slot = value,
            None => index_out_of_range(hook),
        },
        _ => not_mutable(hook),
    }
}

/// Flips the cell's type ID from `MVector` to `Vector` in place,
/// truncating the logical contents to their current length and leaving
/// any unused trailing capacity cells for the next GC cycle to reclaim
/// (spec §4.E.2 "`freeze`"). Idempotent: freezing an already-frozen
/// vector is a no-op. Returns `Word::Nil` if `word` isn't a vector at
/// all.
pub fn freeze(allocator: &mut Allocator, word: &Word, hook: &dyn ErrorHook) -> Word {
    let Some(cell) = word.as_cell() else {
        not_a_vector(hook);
        return Word::Nil;
    };
    let id = allocator.resolve(cell);
    let elements = match allocator.record_mut(id).expect("live vector") {
        CellRecord::MVector(v) => std::mem::take(&mut v.elements),
        CellRecord::Vector(_) => return Word::Cell(id),
        _ => {
            not_a_vector(hook);
            return Word::Nil;
        }
    };
    *allocator.record_mut(id).expect("live vector") = CellRecord::Vector(VectorRecord { elements: Rc::new(elements) });
    Word::Cell(id)
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
    fn push_then_get_roundtrips() {
        let mut allocator = new_allocator();
        let hook = LoggingErrorHook;
        let v = new_mutable(&mut allocator, 4).unwrap();
        for i in 0..3 {
            push(&mut allocator, &v, Word::SmallInt(i), &hook).unwrap();
        }
        assert_eq!(length(&allocator, &v, &hook), 3);
        assert_eq!(get(&allocator, &v, 1, &hook), Word::SmallInt(1));
    }

    #[test]
    fn push_past_capacity_fails() {
        let mut allocator = new_allocator();
        let hook = LoggingErrorHook;
        let v = new_mutable(&mut allocator, 1).unwrap();
        push(&mut allocator, &v, Word::SmallInt(0), &hook).unwrap();
        assert!(push(&mut allocator, &v, Word::SmallInt(1), &hook).is_err());
    }

    #[test]
    fn freeze_is_idempotent_and_preserves_contents() {
        let mut allocator = new_allocator();
        let hook = LoggingErrorHook;
        let v = new_mutable(&mut allocator, 8).unwrap();
        for i in 0..5 {
            push(&mut allocator, &v, Word::SmallInt(i), &hook).unwrap();
        }
        let frozen_once = freeze(&mut allocator, &v, &hook);
        assert_eq!(length(&allocator, &frozen_once, &hook), 5);
        let frozen_twice = freeze(&mut allocator, &frozen_once, &hook);
        assert_eq!(length(&allocator, &frozen_twice, &hook), 5);
        for i in 0..5 {
            assert_eq!(get(&allocator, &frozen_twice, i as usize, &hook), Word::SmallInt(i));
        }
    }

    #[test]
    fn new_mutable_rejects_capacity_beyond_the_cell_budget() {
        let mut allocator = new_allocator();
        assert!(new_mutable(&mut allocator, MVECTOR_MAX_CELLS + 1).is_err());
    }

    #[test]
    fn get_out_of_range_reports_instead_of_panicking() {
        let mut allocator = new_allocator();
        let hook = LoggingErrorHook;
        let v = new_mutable(&mut allocator, 2).unwrap();
        push(&mut allocator, &v, Word::SmallInt(0), &hook).unwrap();
        assert_eq!(get(&allocator, &v, 5, &hook), Word::Nil);
    }

    #[test]
    fn get_on_a_non_vector_word_reports_instead_of_panicking() {
        let allocator = new_allocator();
        let hook = LoggingErrorHook;
        assert_eq!(get(&allocator, &Word::SmallInt(7), 0, &hook), Word::Nil);
        assert_eq!(length(&allocator, &Word::SmallInt(7), &hook), 0);
    }
}
