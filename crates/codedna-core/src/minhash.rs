//! MinHash signatures
//!
//! Fixed-width signatures whose positional agreement estimates the Jaccard
//! similarity of the underlying string sets. Deterministic for a given seed
//! across platforms.

use crate::hash::{derive_seeds, hash32, mix32};
use crate::similarity::jaccard;
use std::collections::BTreeSet;

/// Default signature width
pub const DEFAULT_NUM_HASHES: usize = 128;

/// Default construction seed
pub const DEFAULT_SEED: u64 = 0xC0DE_DA7A_5EED_0001;

/// MinHash signature generator
///
/// Construct once; signature generation is stateless per call.
#[derive(Debug, Clone)]
pub struct MinHash {
    seeds: Vec<u32>,
}

impl Default for MinHash {
    fn default() -> Self {
        Self::new(DEFAULT_NUM_HASHES, DEFAULT_SEED)
    }
}

impl MinHash {
    /// Create a generator with `num_hashes` seeded hash families
    pub fn new(num_hashes: usize, seed: u64) -> Self {
        Self {
            seeds: derive_seeds(seed, num_hashes),
        }
    }

    /// Signature width
    pub fn num_hashes(&self) -> usize {
        self.seeds.len()
    }

    /// MinHash signature of a string set
    ///
    /// The signature of the empty set is all-maximum.
    pub fn signature(&self, set: &BTreeSet<String>) -> Vec<u32> {
        let mut signature = vec![u32::MAX; self.seeds.len()];
        for element in set {
            let base = hash32(element);
            for (slot, &seed) in signature.iter_mut().zip(&self.seeds) {
                let value = mix32(base, seed);
                if value < *slot {
                    *slot = value;
                }
            }
        }
        signature
    }

    /// Fraction of agreeing positions, an estimate of Jaccard similarity
    ///
    /// Both signatures must have the same width.
    pub fn estimate_similarity(sig1: &[u32], sig2: &[u32]) -> f64 {
        assert_eq!(
            sig1.len(),
            sig2.len(),
            "MinHash signatures must have the same width"
        );
        let matches = sig1.iter().zip(sig2).filter(|(a, b)| a == b).count();
        matches as f64 / sig1.len() as f64
    }

    /// Exact Jaccard similarity, with the same empty-set conventions as the
    /// similarity calculator
    pub fn exact_jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
        jaccard(a, b)
    }
}
