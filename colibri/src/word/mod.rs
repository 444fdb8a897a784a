// SPDX-License-Identifier: BSD-3-Clause

//! The word-tagging discipline (spec §4.D).

pub mod custom;
pub mod repr;
pub mod synonym;
pub mod types;

pub use custom::{CustomHashKey, CustomKind, CustomWord};
pub use repr::{
    CellRecord, ConcatNode, HashEntry, HashKeyKind, HashMapHeader, MVectorRecord, SliceNode,
    StringLeaf, TrieLeaf, TrieMapHeader, TrieNode, VectorRecord, Word, WrapRecord,
};
pub use types::PredefinedType;
