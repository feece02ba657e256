//! Banded LSH index over MinHash signatures
//!
//! Splits each class-hash signature into `b` bands of `r` rows and buckets
//! plugins by per-band hashes. Similar plugins collide in at least one band
//! with high probability; bucket sharing is the retrieval mechanism, not a
//! defect. For sets with Jaccard `s`, the co-bucketing probability is
//! `1 - (1 - s^r)^b`.

use crate::error::IndexError;
use crate::minhash::{MinHash, DEFAULT_NUM_HASHES, DEFAULT_SEED};
use crate::types::CodeDna;
use std::collections::{HashMap, HashSet};

/// Default band count
pub const DEFAULT_BANDS: usize = 16;

/// Score contributed by dimensions the index has no signature for
const ESTIMATE_FOLD: f64 = 0.5;

/// MinHash signatures stored per indexed plugin
#[derive(Debug, Clone)]
struct StoredSignatures {
    class_hashes: Vec<u32>,
    method_signatures: Vec<u32>,
    external_references: Vec<u32>,
}

/// Ranking estimate for one indexed plugin against a query
///
/// Composed from signature agreement with constant folds for the dimensions
/// the index does not store. Suitable for ranking only; authoritative
/// similarity comes from the full calculator.
#[derive(Debug, Clone)]
pub struct IndexEstimate {
    pub class_similarity: f64,
    pub method_similarity: f64,
    pub reference_similarity: f64,
    pub overall: f64,
}

/// Bucket occupancy statistics
#[derive(Debug, Clone)]
pub struct IndexStats {
    pub num_plugins: usize,
    pub num_buckets: usize,
    pub avg_bucket_size: f64,
    pub max_bucket_size: usize,
}

/// Approximate-nearest-neighbor index over fingerprints
///
/// Build first, then query; the index is ephemeral and never persisted.
pub struct LshIndex {
    minhash: MinHash,
    bands: usize,
    rows: usize,
    buckets: HashMap<u64, HashSet<String>>,
    plugins: HashMap<String, StoredSignatures>,
}

impl LshIndex {
    /// Create an index with `num_hashes`-wide signatures in `bands` bands
    ///
    /// `num_hashes` must divide evenly into `bands`.
    pub fn new(num_hashes: usize, bands: usize, seed: u64) -> Result<Self, IndexError> {
        if bands == 0 {
            return Err(IndexError::ZeroBands);
        }
        if num_hashes % bands != 0 {
            return Err(IndexError::InvalidBandCount { num_hashes, bands });
        }
        Ok(Self {
            minhash: MinHash::new(num_hashes, seed),
            bands,
            rows: num_hashes / bands,
            buckets: HashMap::new(),
            plugins: HashMap::new(),
        })
    }

    /// Create an index with the recommended defaults (128 hashes, 16 bands)
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_NUM_HASHES, DEFAULT_BANDS, DEFAULT_SEED)
            .expect("default index parameters are valid")
    }

    /// Number of indexed plugins
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Index one fingerprint under its overall hash
    pub fn add(&mut self, dna: &CodeDna) {
        let plugin_id = dna.hash.clone();
        let stored = StoredSignatures {
            class_hashes: self.minhash.signature(&dna.structure.class_hashes),
            method_signatures: self
                .minhash
                .signature(&dna.api_footprint.method_signature_hashes),
            external_references: self
                .minhash
                .signature(&dna.api_footprint.external_references),
        };

        for (band_index, band) in stored.class_hashes.chunks(self.rows).enumerate() {
            self.buckets
                .entry(band_key(band_index, band))
                .or_default()
                .insert(plugin_id.clone());
        }
        self.plugins.insert(plugin_id, stored);
    }

    /// Plugins sharing at least `min_band_matches` bands with the query
    ///
    /// Ordered by band-match count, then by plugin id for determinism.
    pub fn find_candidates(&self, query: &CodeDna, min_band_matches: usize) -> Vec<String> {
        let signature = self.minhash.signature(&query.structure.class_hashes);
        let mut band_matches: HashMap<&str, usize> = HashMap::new();

        for (band_index, band) in signature.chunks(self.rows).enumerate() {
            if let Some(bucket) = self.buckets.get(&band_key(band_index, band)) {
                for plugin_id in bucket {
                    *band_matches.entry(plugin_id.as_str()).or_insert(0) += 1;
                }
            }
        }

        let floor = min_band_matches.max(1);
        let mut candidates: Vec<(&str, usize)> = band_matches
            .into_iter()
            .filter(|&(_, count)| count >= floor)
            .collect();
        candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        candidates.into_iter().map(|(id, _)| id.to_string()).collect()
    }

    /// Ranking estimate for a known plugin, `None` for unknown ids
    pub fn estimate_similarity(&self, plugin_id: &str, query: &CodeDna) -> Option<IndexEstimate> {
        let stored = self.plugins.get(plugin_id)?;

        let class_similarity = MinHash::estimate_similarity(
            &stored.class_hashes,
            &self.minhash.signature(&query.structure.class_hashes),
        );
        let method_similarity = MinHash::estimate_similarity(
            &stored.method_signatures,
            &self
                .minhash
                .signature(&query.api_footprint.method_signature_hashes),
        );
        let reference_similarity = MinHash::estimate_similarity(
            &stored.external_references,
            &self
                .minhash
                .signature(&query.api_footprint.external_references),
        );

        // same dimension weights as the full calculator; inheritance,
        // interfaces, packages, annotations and behavior fold in as constants
        let structural = 0.4 * class_similarity + 0.6 * ESTIMATE_FOLD;
        let api = 0.5 * reference_similarity + 0.3 * method_similarity + 0.2 * ESTIMATE_FOLD;
        let behavioral = ESTIMATE_FOLD;
        let overall = (0.4 * structural + 0.3 * api + 0.3 * behavioral).clamp(0.0, 1.0);

        Some(IndexEstimate {
            class_similarity,
            method_similarity,
            reference_similarity,
            overall,
        })
    }

    /// Bucket occupancy statistics
    pub fn stats(&self) -> IndexStats {
        let total_entries: usize = self.buckets.values().map(HashSet::len).sum();
        let max_bucket_size = self.buckets.values().map(HashSet::len).max().unwrap_or(0);
        let avg_bucket_size = if self.buckets.is_empty() {
            0.0
        } else {
            total_entries as f64 / self.buckets.len() as f64
        };
        IndexStats {
            num_plugins: self.plugins.len(),
            num_buckets: self.buckets.len(),
            avg_bucket_size,
            max_bucket_size,
        }
    }
}

/// FNV-1a fold of one signature band, keyed by band position
fn band_key(band_index: usize, band: &[u32]) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = FNV_OFFSET ^ band_index as u64;
    for &value in band {
        for byte in value.to_le_bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    }
    hash
}
