// SPDX-License-Identifier: BSD-3-Clause

//! Tunable constants for the cell allocator and collector.
//!
//! Grounded on the teacher's flat `pub const` configuration module
//! (`framework/aster-frame/src/config.rs`): one file, no nesting, values
//! documented inline rather than pulled from an external config format,
//! since none of these are meant to be runtime-configurable.

/// Number of machine words per cell (spec §3 "Cell").
pub const CELL_WORDS: usize = 4;

/// Size in bytes of one machine word on this target.
pub const WORD_SIZE: usize = core::mem::size_of::<usize>();

/// Size in bytes of one cell.
pub const CELL_SIZE: usize = CELL_WORDS * WORD_SIZE;

/// Size in bytes of one page. The spec allows 1 KiB or 4 KiB; 4 KiB matches
/// the host page size on most platforms and keeps the per-page header
/// overhead negligible.
pub const PAGE_SIZE: usize = 4096;

/// Number of cells per page, excluding the reserved header cell.
pub const CELLS_PER_PAGE: usize = PAGE_SIZE / CELL_SIZE - 1;

/// Highest generation number a pool may carry (spec §3 "Pools":
/// "2…≤15 = shared older generations").
pub const MAX_GENERATION: u8 = 15;

/// Generation number of the per-thread Eden pool.
pub const EDEN_GENERATION: u8 = 1;

/// Page-count threshold above which `alloc_cells` bypasses the normal pool
/// pages and allocates a dedicated multi-page range (spec §4.A).
pub const LARGE_ALLOC_PAGE_THRESHOLD: usize = 128;

/// Lower bound on the GC trigger threshold, in cells allocated since the
/// last cycle.
pub const GC_MIN_THRESHOLD: usize = 1024;

/// Upper bound on the GC trigger threshold, in cells allocated since the
/// last cycle.
pub const GC_MAX_THRESHOLD: usize = 1 << 20;

/// Scaling factor applied to the oldest generation-1 pool's page count to
/// derive the GC trigger threshold (spec §4.C "Trigger").
pub const GC_THRESHOLD_GENERATIONAL_FACTOR: usize = 2;

/// Live-cell fill ratio below which a generation is chosen for compacting
/// promotion instead of plain promotion (spec §4.C step 1).
pub const COMPACT_FILL_RATIO: f64 = 0.90;

/// Every how many collections of a generation its next generation is
/// eligible for collection too (spec §4.C "frequency gate").
pub const GC_GENERATIONAL_FREQUENCY: u32 = 4;

/// Hash map load factor: `size >= buckets * HASH_LOAD_FACTOR` triggers
/// `grow_hash` (spec §4.E.3 "Insert").
pub const HASH_LOAD_FACTOR: usize = 1;

/// Initial (minimum) bucket count for a hash map's inline static array
/// (spec §4.E.3 "Representation").
pub const HASH_INITIAL_BUCKETS: usize = 8;

/// Maximum number of cells a mutable vector's capacity may address
/// (spec §4.E.2 "Vectors").
pub const MVECTOR_MAX_CELLS: usize = 65_535;

/// Maximum number of 8-bit characters a small string immediate can hold:
/// one word minus the tag/length byte (spec §3 Word table, "small string").
pub const SMALL_STRING_MAX_LEN: usize = WORD_SIZE - 1;
