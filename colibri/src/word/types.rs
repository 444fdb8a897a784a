// SPDX-License-Identifier: BSD-3-Clause

//! The closed set of predefined cell-allocated record types (spec §4.D
//! "Predefined type IDs").
//!
//! Grounded on `examples/original_source/colWordInt.h`'s `WORD_TYPE_*`
//! constants and on the teacher's `PageUsage` enum
//! (`framework/aster-frame/src/mm/page/meta.rs`), which plays the same
//! role for page metadata: a closed, explicitly-discriminated `enum`
//! instead of a raw tag byte. The original C discriminants are kept as
//! the explicit values here purely as a cross-reference for anyone
//! diffing against the C sources; nothing in this crate manipulates the
//! tag bits directly (see the module-level Design Notes in `spec.md` §9).

/// A predefined cell-record type, or a client-supplied custom type.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum PredefinedType {
    /// Generic wrapper adding a synonym slot to a word that lacks one.
    Wrap = 2,
    /// Flat fixed-width Unicode string leaf (UCS-1/2/4).
    UcsString = 6,
    /// Flat UTF-8/16 string leaf.
    UtfString = 10,
    /// Rope slice over an immutable source rope.
    Subrope = 14,
    /// Rope concatenation node.
    ConcatRope = 18,
    /// Immutable vector.
    Vector = 22,
    /// Mutable vector.
    MVector = 26,
    /// List slice over an immutable source list.
    Sublist = 30,
    /// Immutable list concatenation node.
    ConcatList = 34,
    /// Mutable list concatenation node.
    MConcatList = 38,
    /// String-keyed hash map header.
    StrHashMap = 42,
    /// Integer-keyed hash map header.
    IntHashMap = 46,
    /// Immutable hash entry (string/custom keys).
    HashEntry = 50,
    /// Mutable hash entry (string/custom keys).
    MHashEntry = 54,
    /// Immutable hash entry (integer keys).
    IntHashEntry = 58,
    /// Mutable hash entry (integer keys).
    MIntHashEntry = 62,
    /// String-keyed trie map header.
    StrTrieMap = 66,
    /// Integer-keyed trie map header.
    IntTrieMap = 70,
    /// Immutable generic/custom-key trie branch node.
    TrieNode = 74,
    /// Mutable generic/custom-key trie branch node.
    MTrieNode = 78,
    /// Immutable string-key trie branch node.
    StrTrieNode = 82,
    /// Mutable string-key trie branch node.
    MStrTrieNode = 86,
    /// Immutable integer-key trie branch node.
    IntTrieNode = 90,
    /// Mutable integer-key trie branch node.
    MIntTrieNode = 94,
    /// Immutable trie leaf (generic/custom keys).
    TrieLeaf = 98,
    /// Mutable trie leaf (generic/custom keys).
    MTrieLeaf = 102,
    /// Immutable trie leaf (integer keys).
    IntTrieLeaf = 106,
    /// Mutable trie leaf (integer keys).
    MIntTrieLeaf = 110,
    /// String-buffer accumulator. Recognized by the collector for sizing
    /// and marking; not constructed by this crate (spec §1 scopes the
    /// accumulator itself out, see `SPEC_FULL.md` §2).
    StrBuf = 114,
    /// A forwarding redirect left behind by compacting promotion
    /// (spec §3 "Lifecycle", §4.C `mark_word`).
    Redirect = 254,
}

impl PredefinedType {
    /// Bit 1 is always set in the original C tag byte to distinguish a
    /// predefined type ID from the low bits of a type-descriptor pointer.
    pub const TAG_BIT: u8 = 0b0000_0010;
    /// Bit 0 of the original C tag byte is the "pinned" flag.
    pub const PINNED_BIT: u8 = 0b0000_0001;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminants_are_even_and_nonoverlapping_with_redirect() {
        let all = [
            PredefinedType::Wrap,
            PredefinedType::UcsString,
            PredefinedType::UtfString,
            PredefinedType::Subrope,
            PredefinedType::ConcatRope,
            PredefinedType::Vector,
            PredefinedType::MVector,
            PredefinedType::Sublist,
            PredefinedType::ConcatList,
            PredefinedType::MConcatList,
            PredefinedType::StrHashMap,
            PredefinedType::IntHashMap,
            PredefinedType::HashEntry,
            PredefinedType::MHashEntry,
            PredefinedType::IntHashEntry,
            PredefinedType::MIntHashEntry,
            PredefinedType::StrTrieMap,
            PredefinedType::IntTrieMap,
            PredefinedType::TrieNode,
            PredefinedType::MTrieNode,
            PredefinedType::StrTrieNode,
            PredefinedType::MStrTrieNode,
            PredefinedType::IntTrieNode,
            PredefinedType::MIntTrieNode,
            PredefinedType::TrieLeaf,
            PredefinedType::MTrieLeaf,
            PredefinedType::IntTrieLeaf,
            PredefinedType::MIntTrieLeaf,
            PredefinedType::StrBuf,
        ];
        for t in all {
            assert_eq!((t as u8) % 4, 2);
        }
    }
}
