use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::types::LinkId;

pub fn stable_hash_with(f: impl FnOnce(&mut DefaultHasher)) -> u64 {
    let mut hasher = DefaultHasher::new();
    f(&mut hasher);
    hasher.finish()
}

/// Order-sensitive link id: `(a, b)` and `(b, a)` hash differently.
pub fn link_hash(source_id: &str, target_id: &str) -> LinkId {
    stable_hash_with(|hasher| {
        source_id.hash(hasher);
        target_id.hash(hasher);
    })
}

/// Derive a per-step seed so chained random operations stay decorrelated.
pub fn derive_seed(seed: u64, step: u64) -> u64 {
    stable_hash_with(|hasher| {
        seed.hash(hasher);
        step.hash(hasher);
    })
}
