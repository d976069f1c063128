//! Property store and collector tuning constants.
//!
//! Values the embedder may want to change per VM live in `HeapOption`;
//! these are fixed shape parameters of the object model.

// ===== Property storage =====

/// Slot capacity is always rounded up to a multiple of this
pub const NUM_PROP: usize = 8;

/// Past this capacity, objects grow by a quarter of their size at a time
pub const LOTSA_PROP: usize = 256;

/// Objects with at most this many properties are searched linearly
pub const HASH_MIN_PROP: usize = 8;

/// Bucket counts used for property hash indexes
pub const HASH_SIZES: [usize; 16] = [
    19, 29, 59, 79, 97, 193, 389, 769, 1543, 3079, 6151, 12289, 24593, 49157, 98317, 196613,
];

/// Round a property count up to the slot allocation increment
#[inline(always)]
pub const fn prop_roundup(count: usize) -> usize {
    count.div_ceil(NUM_PROP) * NUM_PROP
}

/// Bucket count for an index over `num_prop` names
pub fn get_hash_size(num_prop: usize) -> usize {
    HASH_SIZES
        .iter()
        .copied()
        .find(|&size| num_prop < size)
        .unwrap_or(num_prop * 2 + 1)
}

// ===== Memory accounting =====

/// Bytes charged per slot of capacity
pub const SLOT_BYTES: usize = std::mem::size_of::<Option<crate::gc::VarId>>();

/// Bytes charged per record header
pub const HEADER_BYTES: usize = 32;

// ===== Collector =====

/// Minimum idle time (msec) before an idle collection is worthwhile
pub const MIN_TIME_FOR_GC: u64 = 300;

/// Allocation slack below the work quota that still allows an idle collection
pub const GC_MIN_WORK_QUOTA: usize = 50;

/// Upper bound on generation passes for one smart collection request
pub const SMART_MAX_PASSES: usize = crate::gc::MAX_GEN;
