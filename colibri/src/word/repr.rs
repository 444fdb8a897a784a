// SPDX-License-Identifier: BSD-3-Clause

//! The `Word` handle and the closed set of cell-allocated record shapes
//! it can point to (spec §3 "Word"/"Cell", §4.D).
//!
//! Spec §9 Design Notes directs replacing "the C-style first byte is
//! either an enum or the LSB of a pointer" encoding with "a tagged sum
//! whose variants are exactly the closed set of predefined types plus a
//! `custom(descriptor)` variant" — i.e. an ordinary Rust `enum` rather
//! than manual bit-packing into a machine word. That is what [`Word`]
//! and [`CellRecord`] are. The original tag-bit layout from spec §3's
//! Word table (low-bit discrimination between nil/small-int/small-
//! float/.../cell-pointer) is preserved only as documentation on each
//! variant; nothing here reads or writes raw tag bits, matching the
//! teacher's own preference for a `#[repr(u8)]` enum
//! (`PageUsage`, in `framework/aster-frame/src/mm/page/meta.rs`) over a
//! hand-rolled bitfield wherever the closed set is known up front.

use smallvec::SmallVec;
use std::rc::Rc;

use crate::alloc::cell::CellId;
use crate::word::custom::CustomWord;

/// A machine-word-sized handle: either an immediate value or a pointer to
/// a cell-allocated record (spec §3 "Word").
#[derive(Clone, Debug)]
pub enum Word {
    /// The nil singleton (spec: "`0` (exactly)").
    Nil,
    /// A signed integer that fits directly in the handle.
    SmallInt(i64),
    /// A floating-point value that fits directly in the handle.
    ///
    /// The original encoding clears the low 2 mantissa bits to make room
    /// for the tag; `Word` is a safe enum rather than a packed pointer,
    /// so no such restriction applies here (see `DESIGN.md`).
    SmallFloat(f64),
    /// A single Unicode scalar value.
    SmallChar(char),
    /// A boolean immediate.
    Bool(bool),
    /// Up to `SMALL_STRING_MAX_LEN` 8-bit characters packed in the handle.
    SmallString(SmallVec<[u8; crate::config::SMALL_STRING_MAX_LEN]>),
    /// A length-N sequence of nil, represented without allocating any
    /// cells.
    VoidList(u64),
    /// An infinite repetition of an (acyclic) core list.
    CircularList(Box<Word>),
    /// A pointer to a cell-allocated record.
    Cell(CellId),
}

impl Word {
    pub fn is_immediate(&self) -> bool {
        !matches!(self, Word::Cell(_))
    }

    pub fn as_cell(&self) -> Option<CellId> {
        match self {
            Word::Cell(id) => Some(*id),
            _ => None,
        }
    }

    /// The delegate word a circular list recurses through (spec §4.B
    /// `preserve`/`release`: "if a circular list, delegate to its core").
    pub fn circular_core(&self) -> Option<&Word> {
        match self {
            Word::CircularList(core) => Some(core),
            _ => None,
        }
    }
}

impl PartialEq for Word {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Word::Nil, Word::Nil) => true,
            (Word::SmallInt(a), Word::SmallInt(b)) => a == b,
            (Word::SmallFloat(a), Word::SmallFloat(b)) => a.to_bits() == b.to_bits(),
            (Word::SmallChar(a), Word::SmallChar(b)) => a == b,
            (Word::Bool(a), Word::Bool(b)) => a == b,
            (Word::SmallString(a), Word::SmallString(b)) => a == b,
            (Word::VoidList(a), Word::VoidList(b)) => a == b,
            (Word::CircularList(a), Word::CircularList(b)) => a == b,
            (Word::Cell(a), Word::Cell(b)) => a == b,
            _ => false,
        }
    }
}

/// A concat-tree node shared by ropes and lists (spec §4.E.1).
#[derive(Clone, Debug)]
pub struct ConcatNode {
    pub depth: u8,
    /// Cached length of the left subtree; `0` means "recompute from
    /// `left`" (spec: "0 means 'doesn't fit, compute from left'").
    pub left_length: u32,
    pub total_length: u64,
    pub left: Word,
    pub right: Word,
}

/// A subrope/sublist node: a slice over an immutable source
/// (spec §4.E.1 "Sublist/subrope extraction").
#[derive(Clone, Debug)]
pub struct SliceNode {
    pub depth: u8,
    pub source: Word,
    pub first: u64,
    pub last: u64,
}

/// A flat string leaf. `Ucs` stores already-decoded scalar values (UCS-1/
/// 2/4 collapse to the same representation in a safe Rust port); `Utf`
/// keeps the original encoded bytes.
#[derive(Clone, Debug)]
pub enum StringLeaf {
    Ucs(Rc<Vec<char>>),
    Utf(Rc<String>),
}

impl StringLeaf {
    pub fn len(&self) -> usize {
        match self {
            StringLeaf::Ucs(v) => v.len(),
            StringLeaf::Utf(s) => s.chars().count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn char_at(&self, index: usize) -> char {
        match self {
            StringLeaf::Ucs(v) => v[index],
            StringLeaf::Utf(s) => s.chars().nth(index).expect("index in range"),
        }
    }
}

/// An immutable vector (spec §4.E.2).
#[derive(Clone, Debug)]
pub struct VectorRecord {
    pub elements: Rc<Vec<Word>>,
}

/// A mutable vector: carries spare capacity beyond its logical length,
/// pre-cleared to nil (spec §4.E.2 "Mutable vector").
#[derive(Clone, Debug)]
pub struct MVectorRecord {
    pub elements: Vec<Word>,
    pub capacity: usize,
}

/// Which hash family a bucket/entry belongs to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum HashKeyKind {
    Str,
    Int,
    Custom,
}

/// A hash map header (spec §4.E.3 "Representation").
#[derive(Clone, Debug)]
pub struct HashMapHeader {
    pub kind: HashKeyKind,
    pub size: usize,
    /// Bucket array: always a power of two in length. `None` entries are
    /// empty buckets; `Some` is the head of that bucket's entry chain.
    pub buckets: Vec<Option<CellId>>,
    /// Whether the bucket array itself has been frozen (shared via
    /// `copy`) and must be copy-on-write before the next structural
    /// mutation (spec §4.E.3 "`copy(map)`").
    pub buckets_frozen: bool,
}

/// One hash-chain entry (spec §4.E.3 "Each bucket is a singly-linked list
/// of entries"). The same struct backs both the mutable and immutable
/// predefined type IDs; which one a given cell is tagged as is tracked by
/// [`CellRecord`]'s variant, matching the original C type-ID duality
/// without duplicating the field list.
#[derive(Clone, Debug)]
pub struct HashEntry {
    pub next: Option<CellId>,
    pub key: Word,
    pub value: Word,
    /// High bits of the key's hash, used to avoid recomputing during
    /// rehash (spec §4.E.3 "Key-hashing contract").
    pub hash_high_bits: u64,
}

/// A trie map header (spec §4.E.4).
#[derive(Clone, Debug)]
pub struct TrieMapHeader {
    pub kind: HashKeyKind,
    pub size: usize,
    pub root: Option<CellId>,
}

/// A crit-bit branch node. The `discriminant` field's meaning depends on
/// the key flavor: for integer keys it is a single-bit mask, for string
/// keys a `(diff_char_index, mask)` pair packed as `(index << 32) | mask`,
/// for custom keys a `(diff_index, bit_pos)` pair.
#[derive(Clone, Debug)]
pub struct TrieNode {
    pub discriminant: u64,
    pub left: CellId,
    pub right: CellId,
}

/// A trie map leaf: a key/value pair (spec §4.E.4).
#[derive(Clone, Debug)]
pub struct TrieLeaf {
    pub key: Word,
    pub value: Word,
}

/// A generic wrapper adding a synonym slot to a word that otherwise lacks
/// one (spec §4.D "Synonym chains").
#[derive(Clone, Debug)]
pub struct WrapRecord {
    pub wrapped: Word,
}

/// The full closed set of cell-allocated record shapes (spec §4.D
/// "Predefined type IDs" plus the `custom(descriptor)` variant called for
/// by spec §9 Design Notes).
#[derive(Debug)]
pub enum CellRecord {
    Wrap(WrapRecord),
    UcsString(Rc<Vec<char>>),
    UtfString(Rc<String>),
    Subrope(SliceNode),
    ConcatRope(ConcatNode),
    Vector(VectorRecord),
    MVector(MVectorRecord),
    Sublist(SliceNode),
    ConcatList(ConcatNode, bool /* mutable */),
    StrHashMap(HashMapHeader),
    IntHashMap(HashMapHeader),
    HashEntry(HashEntry, bool /* mutable */),
    IntHashEntry(HashEntry, bool /* mutable */),
    StrTrieMap(TrieMapHeader),
    IntTrieMap(TrieMapHeader),
    TrieNode(TrieNode, bool /* mutable */),
    TrieLeaf(TrieLeaf, bool /* mutable */),
    /// A client-supplied custom value (spec §4.D "Custom words").
    Custom(Box<dyn CustomWord>),
    /// A forwarding redirect left by compacting promotion
    /// (spec §3 "Lifecycle").
    Redirect(CellId),
    /// Every synonym-capable record also carries a back-pointer forming a
    /// circular chain (spec §4.D "Synonym chains"). Stored out of line
    /// from the payload enum above so every variant can share the same
    /// slot without the match arms above needing to carry it.
}

impl CellRecord {
    /// Enumerates this record's direct `Word` children, for the mark
    /// phase (spec §4.C `mark_word`).
    pub fn children(&self) -> SmallVec<[&Word; 4]> {
        let mut out = SmallVec::new();
        match self {
            CellRecord::Wrap(w) => out.push(&w.wrapped),
            CellRecord::UcsString(_) | CellRecord::UtfString(_) => {}
            CellRecord::Subrope(s) | CellRecord::Sublist(s) => out.push(&s.source),
            CellRecord::ConcatRope(c) => {
                out.push(&c.left);
                out.push(&c.right);
            }
            CellRecord::ConcatList(c, _) => {
                out.push(&c.left);
                out.push(&c.right);
            }
            CellRecord::Vector(v) => out.extend(v.elements.iter()),
            CellRecord::MVector(v) => out.extend(v.elements.iter()),
            CellRecord::StrHashMap(_) | CellRecord::IntHashMap(_) => {}
            CellRecord::HashEntry(e, _) | CellRecord::IntHashEntry(e, _) => {
                out.push(&e.key);
                out.push(&e.value);
            }
            CellRecord::StrTrieMap(_) | CellRecord::IntTrieMap(_) => {}
            CellRecord::TrieNode(_, _) => {}
            CellRecord::TrieLeaf(l, _) => {
                out.push(&l.key);
                out.push(&l.value);
            }
            CellRecord::Custom(_) => {}
            CellRecord::Redirect(_) => {}
        }
        out
    }

    /// Mutable counterpart of [`children`](Self::children): the mark
    /// phase rewrites each slot in place as redirects are resolved and
    /// compaction moves cells.
    pub fn children_mut(&mut self) -> SmallVec<[&mut Word; 4]> {
        let mut out = SmallVec::new();
        match self {
            CellRecord::Wrap(w) => out.push(&mut w.wrapped),
            CellRecord::UcsString(_) | CellRecord::UtfString(_) => {}
            CellRecord::Subrope(s) | CellRecord::Sublist(s) => out.push(&mut s.source),
            CellRecord::ConcatRope(c) => {
                out.push(&mut c.left);
                out.push(&mut c.right);
            }
            CellRecord::ConcatList(c, _) => {
                out.push(&mut c.left);
                out.push(&mut c.right);
            }
            CellRecord::Vector(_) => {}
            CellRecord::MVector(v) => out.extend(v.elements.iter_mut()),
            CellRecord::StrHashMap(_) | CellRecord::IntHashMap(_) => {}
            CellRecord::HashEntry(e, _) | CellRecord::IntHashEntry(e, _) => {
                out.push(&mut e.key);
                out.push(&mut e.value);
            }
            CellRecord::StrTrieMap(_) | CellRecord::IntTrieMap(_) => {}
            CellRecord::TrieNode(_, _) => {}
            CellRecord::TrieLeaf(l, _) => {
                out.push(&mut l.key);
                out.push(&mut l.value);
            }
            CellRecord::Custom(_) => {}
            CellRecord::Redirect(_) => {}
        }
        out
    }

    /// Child *cell* pointers that are not carried as `Word`s (bucket
    /// arrays, trie children): the mark phase walks these too.
    pub fn child_cells(&self) -> SmallVec<[CellId; 4]> {
        let mut out = SmallVec::new();
        match self {
            CellRecord::StrHashMap(h) | CellRecord::IntHashMap(h) => {
                out.extend(h.buckets.iter().flatten().copied())
            }
            CellRecord::HashEntry(e, _) | CellRecord::IntHashEntry(e, _) => {
                out.extend(e.next)
            }
            CellRecord::StrTrieMap(t) | CellRecord::IntTrieMap(t) => out.extend(t.root),
            CellRecord::TrieNode(n, _) => {
                out.push(n.left);
                out.push(n.right);
            }
            CellRecord::Custom(c) => {
                for w in c.children() {
                    if let Word::Cell(id) = w {
                        out.push(id);
                    }
                }
            }
            _ => {}
        }
        out
    }

    /// Mutable counterpart of [`child_cells`](Self::child_cells), for the
    /// bucket/trie children the mark phase can rewrite in place (unlike
    /// `Vector`'s `Rc`-shared elements, these are never aliased, since a
    /// hash map or trie map's own bucket array and node tree are only
    /// ever reached through its own header).
    pub fn child_cells_mut(&mut self) -> SmallVec<[&mut CellId; 4]> {
        let mut out = SmallVec::new();
        match self {
            CellRecord::StrHashMap(h) | CellRecord::IntHashMap(h) => {
                out.extend(h.buckets.iter_mut().flatten())
            }
            CellRecord::HashEntry(e, _) | CellRecord::IntHashEntry(e, _) => {
                out.extend(e.next.iter_mut())
            }
            CellRecord::StrTrieMap(t) | CellRecord::IntTrieMap(t) => out.extend(t.root.iter_mut()),
            CellRecord::TrieNode(n, _) => {
                out.push(&mut n.left);
                out.push(&mut n.right);
            }
            _ => {}
        }
        out
    }

    /// Number of cells this record occupies, matching whatever count was
    /// passed to `Allocator::alloc_record` when it was created (spec
    /// §4.A `alloc_cells`/§4.C `mark_word`: "set the allocation bits for
    /// the word's cells"). Only the two dynamically-sized container
    /// shapes scale with payload; every other predefined type is a
    /// single fixed-layout cell.
    pub fn cell_count(&self) -> usize {
        use crate::alloc::cell::cells_for_bytes;
        use crate::config::WORD_SIZE;
        match self {
            CellRecord::Vector(v) => cells_for_bytes(1, v.elements.len() * WORD_SIZE),
            CellRecord::MVector(v) => cells_for_bytes(1, v.capacity * WORD_SIZE),
            _ => 1,
        }
    }

    /// The predefined type ID for this record, for error messages and
    /// `type_of`-style introspection (spec §4.D `type_of`).
    pub fn type_name(&self) -> &'static str {
        match self {
            CellRecord::Wrap(_) => "wrap",
            CellRecord::UcsString(_) => "ucs-string",
            CellRecord::UtfString(_) => "utf-string",
            CellRecord::Subrope(_) => "subrope",
            CellRecord::ConcatRope(_) => "concat-rope",
            CellRecord::Vector(_) => "vector",
            CellRecord::MVector(_) => "mutable-vector",
            CellRecord::Sublist(_) => "sublist",
            CellRecord::ConcatList(_, m) => {
                if *m {
                    "mutable-concat-list"
                } else {
                    "concat-list"
                }
            }
            CellRecord::StrHashMap(_) => "string-hash-map",
            CellRecord::IntHashMap(_) => "int-hash-map",
            CellRecord::HashEntry(_, m) => {
                if *m {
                    "mutable-hash-entry"
                } else {
                    "hash-entry"
                }
            }
            CellRecord::IntHashEntry(_, m) => {
                if *m {
                    "mutable-int-hash-entry"
                } else {
                    "int-hash-entry"
                }
            }
            CellRecord::StrTrieMap(_) => "string-trie-map",
            CellRecord::IntTrieMap(_) => "int-trie-map",
            CellRecord::TrieNode(_, m) => {
                if *m {
                    "mutable-trie-node"
                } else {
                    "trie-node"
                }
            }
            CellRecord::TrieLeaf(_, m) => {
                if *m {
                    "mutable-trie-leaf"
                } else {
                    "trie-leaf"
                }
            }
            CellRecord::Custom(_) => "custom",
            CellRecord::Redirect(_) => "redirect",
        }
    }
}
