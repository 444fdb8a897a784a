// SPDX-License-Identifier: BSD-3-Clause

//! Synonym chains (spec §4.D "Synonym chains", §9 Design Notes
//! "Pointer-graph cycles").
//!
//! A synonym chain is a circular singly-linked list of cells declared
//! equivalent at the client level. It has no head and no order, so the
//! whole operation reduces to "exchange two nodes' `next` pointers",
//! exactly like splicing two circular lists in an intrusive linked list.
//! The splice itself is expressed here as a pure function over any
//! `next`-pointer accessor so it can be unit-tested without a heap;
//! [`crate::Heap::add_synonym`]/[`crate::Heap::clear_synonym`] supply the
//! cell-storage-backed accessor.

/// Splices two circular chains given their current `next` pointers.
///
/// `next_a`/`next_b` are the current successor of `a`/`b` within their
/// (possibly singleton, possibly shared) chains. Returns the two new
/// `next` pointers to install: `(new_next_a, new_next_b)`.
///
/// If `a == b`, the node is already its own chain; nothing changes.
pub fn splice<T: Copy + PartialEq>(a: T, next_a: T, b: T, next_b: T) -> (T, T) {
    if a == b {
        return (next_a, next_b);
    }
    // Standard circular-list splice: each node takes over the other's
    // former successor.
    (next_b, next_a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splicing_two_singletons_forms_a_two_cycle() {
        // a -> a, b -> b
        let (next_a, next_b) = splice('a', 'a', 'b', 'b');
        assert_eq!(next_a, 'b');
        assert_eq!(next_b, 'a');
    }

    #[test]
    fn splicing_a_node_into_itself_is_a_no_op() {
        let (next_a, next_b) = splice('a', 'a', 'a', 'a');
        assert_eq!(next_a, 'a');
        assert_eq!(next_b, 'a');
    }
}
