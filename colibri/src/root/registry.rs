// SPDX-License-Identifier: BSD-3-Clause

//! Pinned-root reference table (spec §4.B "Root registry").
//!
//! A crit-bit (PATRICIA) trie keyed on [`CellId::trie_key`], exactly as
//! the spec asks for rather than a hash table, because the later
//! trie-map container (`containers::triemap`) and this registry share the
//! same crit-bit discipline and the spec treats both as instances of one
//! idea. Grounded structurally on the teacher's intrusive rb-tree
//! (`framework/aster-frame/src/collections/`), adapted from "owned
//! children in a balanced binary tree" to "owned children split on the
//! highest differing key bit" since that is what the spec specifies
//! instead of balance.
//!
//! A cell counts as pinned exactly when its key has a leaf here (spec:
//! "A root's reference count is ≥ 1 iff its leaf is present in the root
//! trie"), so no separate pinned bit is tracked; `is_pinned` is a trie
//! lookup.

use crate::word::Word;

struct RootEntry {
    key: u64,
    word: Word,
    refcount: u32,
    /// Page generation recorded at the moment this root was first pinned
    /// (spec §4.B: "initialize refcount=1 and record the current page
    /// generation").
    generation: u8,
}

enum Node {
    Leaf(RootEntry),
    Branch {
        bit: u32,
        left: Box<Node>,
        right: Box<Node>,
    },
}

fn direction(key: u64, bit: u32) -> bool {
    (key >> bit) & 1 != 0
}

/// The highest bit at which `a` and `b` differ (spec: "the differing bit
/// between two address keys is the highest-order differing bit").
fn crit_bit(a: u64, b: u64) -> u32 {
    63 - (a ^ b).leading_zeros()
}

impl Node {
    fn best_match(&self, key: u64) -> &RootEntry {
        match self {
            Node::Leaf(entry) => entry,
            Node::Branch { bit, left, right } => {
                if direction(key, *bit) {
                    right.best_match(key)
                } else {
                    left.best_match(key)
                }
            }
        }
    }
}

/// The pinned-root reference table itself. Mutual exclusion is the
/// caller's concern (spec §5 "Shared-resource policy": guarded by a
/// dedicated `protect_roots` critical section), so every method here
/// takes `&mut self` and assumes the caller already holds that lock.
pub struct RootRegistry {
    root: Option<Box<Node>>,
    len: usize,
}

impl RootRegistry {
    pub fn new() -> Self {
        Self { root: None, len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn find(&self, key: u64) -> Option<&RootEntry> {
        let entry = self.root.as_ref()?.best_match(key);
        (entry.key == key).then_some(entry)
    }

    fn find_mut(&mut self, key: u64) -> Option<&mut RootEntry> {
        let mut node = self.root.as_mut()?;
        loop {
            match node.as_mut() {
                Node::Leaf(entry) => return (entry.key == key).then_some(entry),
                Node::Branch { bit, left, right } => {
                    node = if direction(key, *bit) { right } else { left };
                }
            }
        }
    }

    pub fn is_pinned(&self, key: u64) -> bool {
        self.find(key).is_some()
    }

    pub fn generation_of(&self, key: u64) -> Option<u8> {
        self.find(key).map(|e| e.generation)
    }

    /// Bumps a pinned root's recorded generation, capped at `MAX`
    /// (spec §4.C step 4: "if the word survives, bump its leaf's
    /// generation (capped at MAX)").
    pub fn bump_generation(&mut self, key: u64, max: u8) {
        if let Some(entry) = self.find_mut(key) {
            entry.generation = entry.generation.saturating_add(1).min(max);
        }
    }

    /// `preserve(word)` (spec §4.B), minus the immediate/circular-list
    /// short-circuits, which the caller (`crate::root::preserve`)
    /// resolves before reaching here.
    pub fn insert(&mut self, key: u64, word: Word, generation: u8) {
        if let Some(entry) = self.find_mut(key) {
            entry.refcount += 1;
            return;
        }
        let leaf = Box::new(Node::Leaf(RootEntry {
            key,
            word,
            refcount: 1,
            generation,
        }));
        self.len += 1;
        self.root = Some(match self.root.take() {
            None => leaf,
            Some(root) => {
                let closest = root.best_match(key).key;
                let bit = crit_bit(closest, key);
                Self::splice(root, leaf, key, bit)
            }
        });
    }

    fn splice(node: Box<Node>, new_leaf: Box<Node>, key: u64, bit: u32) -> Box<Node> {
        match *node {
            Node::Branch {
                bit: node_bit,
                left,
                right,
            } if node_bit > bit => {
                if direction(key, node_bit) {
                    Box::new(Node::Branch {
                        bit: node_bit,
                        left,
                        right: Self::splice(right, new_leaf, key, bit),
                    })
                } else {
                    Box::new(Node::Branch {
                        bit: node_bit,
                        left: Self::splice(left, new_leaf, key, bit),
                        right,
                    })
                }
            }
            other => {
                let existing = Box::new(other);
                if direction(key, bit) {
                    Box::new(Node::Branch {
                        bit,
                        left: existing,
                        right: new_leaf,
                    })
                } else {
                    Box::new(Node::Branch {
                        bit,
                        left: new_leaf,
                        right: existing,
                    })
                }
            }
        }
    }

    /// Decrements a root's refcount, deleting its leaf (and collapsing
    /// its parent branch) once it reaches zero. Returns `true` if the
    /// key was pinned at all.
    pub fn release(&mut self, key: u64) -> bool {
        let Some(entry) = self.find_mut(key) else {
            return false;
        };
        entry.refcount -= 1;
        if entry.refcount == 0 {
            let root = self.root.take().expect("a matched entry implies a root");
            let (new_root, _) = Self::remove(root, key);
            self.root = new_root;
            self.len -= 1;
        }
        true
    }

    fn remove(node: Box<Node>, key: u64) -> (Option<Box<Node>>, Option<RootEntry>) {
        match *node {
            Node::Leaf(entry) => {
                if entry.key == key {
                    (None, Some(entry))
                } else {
                    (Some(Box::new(Node::Leaf(entry))), None)
                }
            }
            Node::Branch { bit, left, right } => {
                if direction(key, bit) {
                    let (new_right, removed) = Self::remove(right, key);
                    match new_right {
                        Some(r) => (Some(Box::new(Node::Branch { bit, left, right: r })), removed),
                        None => (Some(left), removed),
                    }
                } else {
                    let (new_left, removed) = Self::remove(left, key);
                    match new_left {
                        Some(l) => (Some(Box::new(Node::Branch { bit, left: l, right })), removed),
                        None => (Some(right), removed),
                    }
                }
            }
        }
    }

    /// Visits every pinned root, used by `mark_from_roots` (spec §4.C
    /// step 4).
    pub fn for_each<F: FnMut(&Word, u8)>(&self, mut f: F) {
        fn walk<F: FnMut(&Word, u8)>(node: &Node, f: &mut F) {
            match node {
                Node::Leaf(entry) => f(&entry.word, entry.generation),
                Node::Branch { left, right, .. } => {
                    walk(left, f);
                    walk(right, f);
                }
            }
        }
        if let Some(root) = &self.root {
            walk(root, &mut f);
        }
    }
}

impl Default for RootRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_release_empties_the_trie() {
        let mut reg = RootRegistry::new();
        reg.insert(42, Word::Nil, 1);
        assert!(reg.is_pinned(42));
        assert!(reg.release(42));
        assert!(!reg.is_pinned(42));
        assert!(reg.is_empty());
    }

    #[test]
    fn repeated_preserve_increments_refcount_without_growing_trie() {
        let mut reg = RootRegistry::new();
        reg.insert(7, Word::SmallInt(1), 1);
        reg.insert(7, Word::SmallInt(1), 1);
        assert_eq!(reg.len(), 1);
        assert!(reg.release(7));
        assert!(reg.is_pinned(7));
        assert!(reg.release(7));
        assert!(!reg.is_pinned(7));
    }

    #[test]
    fn many_keys_all_individually_addressable() {
        let mut reg = RootRegistry::new();
        let keys: Vec<u64> = (0..200).map(|i| i * 97 + 3).collect();
        for &k in &keys {
            reg.insert(k, Word::SmallInt(k as i64), 1);
        }
        assert_eq!(reg.len(), keys.len());
        for &k in &keys {
            assert!(reg.is_pinned(k));
        }
        for &k in &keys {
            reg.release(k);
        }
        assert!(reg.is_empty());
    }
}
