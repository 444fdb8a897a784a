// SPDX-License-Identifier: BSD-3-Clause

//! Client-supplied custom word descriptors (spec §4.D "Custom words",
//! §6 "Custom-type descriptor").

use std::any::Any;
use std::fmt;

use crate::word::Word;

/// The broad kind of a custom word, matching the `type_tag` field of
/// spec §6's descriptor struct.
///
/// Spec §6 also names a trie-keyed custom word and a fully custom
/// map/int-map surface (client supplies get/set/unset/iterate directly).
/// Neither has a real integration point in `containers::hashmap`/
/// `containers::triemap`, which own their bucket/node layout outright, so
/// those variants aren't offered here.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CustomKind {
    /// A plain opaque value with no map semantics.
    Custom,
    /// A hash map with client-provided hashing and key comparison
    /// (see [`CustomWord::as_hash_key`]).
    HashMap,
}

/// A client-provided value stored in a custom cell, together with the
/// procedures the collector and the map algorithms need to treat it
/// opaquely (spec §4.D, §6).
///
/// A type implementing this trait is addable to the heap via
/// [`crate::Heap::new_custom`]. `on_free` is invoked by the sweeper
/// (spec §4.C step 7) if and only if the value was unreachable at the end
/// of a cycle; the crate otherwise never invokes it, matching spec §3's
/// "eventually, once unreachable" non-goal on finalization ordering.
pub trait CustomWord: Any + fmt::Debug + Send + Sync {
    /// The broad kind of this custom word.
    fn kind(&self) -> CustomKind;

    /// Enumerates the child words directly referenced by this value, for
    /// the mark phase (spec §4.C `mark_word`, "enumerate the word's
    /// children per its type's child-layout").
    fn children(&self) -> Vec<Word> {
        Vec::new()
    }

    /// Called once, when the value becomes unreachable. The default
    /// no-op means the value is not added to the sweep list at all
    /// (spec §4.D: "if non-null ⇒ word is added to eden sweep list at
    /// creation").
    fn has_finalizer(&self) -> bool {
        false
    }

    /// Runs the finalizer. Only called if [`Self::has_finalizer`]
    /// returned `true`. Must not allocate (spec §4.C "Failure
    /// semantics": "the spec forbids allocation from finalizers").
    fn on_free(&mut self) {}

    /// Downcasts to the hashing/equality procedures of a
    /// [`CustomKind::HashMap`] word; `containers::hashmap` calls this
    /// whenever it is handed a [`crate::word::HashKeyKind::Custom`] key.
    /// The default `None` is correct for any value whose [`Self::kind`]
    /// isn't `HashMap`.
    fn as_hash_key(&self) -> Option<&dyn CustomHashKey> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

/// Hash map key procedures for a [`CustomKind::HashMap`] word
/// (spec §6 `hash_proc`, `compare_keys_proc`).
pub trait CustomHashKey: fmt::Debug {
    fn hash(&self) -> u64;
    fn key_eq(&self, other: &dyn CustomHashKey) -> bool;
}
