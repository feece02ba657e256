//! Feature hashing utilities
//!
//! All fingerprint features are stored as one-way hashes. The feature hash
//! is SHA-256 emitted as lowercase hex; the 32-bit hash family used by
//! MinHash is CRC-32 mixed with per-slot seeds through a murmur-style
//! finalizer.

use sha2::{Digest, Sha256};

/// Hash a canonical feature string to lowercase hex
pub fn feature_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Base 32-bit hash of a feature string (for MinHash families)
pub fn hash32(input: &str) -> u32 {
    crc32fast::hash(input.as_bytes())
}

/// Mix a 32-bit hash with a seed through an avalanche finalizer
///
/// Combined with distinct seeds this yields effectively independent hash
/// families from one base hash.
pub fn mix32(value: u32, seed: u32) -> u32 {
    let mut h = value ^ seed;
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

/// Derive `count` per-slot seeds from a base seed
///
/// Splitmix-style expansion truncated to 32 bits; deterministic for a given
/// base seed across platforms.
pub fn derive_seeds(base: u64, count: usize) -> Vec<u32> {
    (0..count as u64)
        .map(|i| {
            let mut z = base.wrapping_add((i + 1).wrapping_mul(0x9e37_79b9_7f4a_7c15));
            z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
            (z ^ (z >> 31)) as u32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_hash_deterministic() {
        let h1 = feature_hash("com/example/Foo|java/lang/Object|");
        let h2 = feature_hash("com/example/Foo|java/lang/Object|");
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_feature_hash_is_lowercase_hex() {
        let h = feature_hash("anything");
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_feature_hash_different_input() {
        assert_ne!(feature_hash("hello"), feature_hash("world"));
    }

    #[test]
    fn test_mix32_spreads_seeds() {
        let base = hash32("com/example/Foo");
        let a = mix32(base, 1);
        let b = mix32(base, 2);
        assert_ne!(a, b);
    }

    #[test]
    fn test_derive_seeds_distinct() {
        let seeds = derive_seeds(42, 128);
        assert_eq!(seeds.len(), 128);
        let unique: std::collections::HashSet<u32> = seeds.iter().copied().collect();
        assert_eq!(unique.len(), seeds.len());
    }

    #[test]
    fn test_derive_seeds_depend_on_base() {
        assert_ne!(derive_seeds(1, 8), derive_seeds(2, 8));
    }
}
