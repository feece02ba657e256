//! Corpus search
//!
//! Glues the LSH index to exact verification: candidates come from banded
//! retrieval, ranking uses the signature estimate, and callers needing
//! authoritative numbers re-score candidates with the full calculator.

use crate::error::SchemaError;
use crate::fingerprint::ensure_same_mode;
use crate::lsh::{IndexEstimate, IndexStats, LshIndex};
use crate::similarity::SimilarityCalculator;
use crate::types::{CodeDna, SimilarityScore};
use std::collections::HashMap;

/// Knobs for one search
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Minimum score for a result to be reported
    pub threshold: f64,
    /// Maximum number of results
    pub top_k: usize,
    /// Bands a candidate must share with the query
    pub min_band_matches: usize,
    /// Re-score candidates with the full similarity calculator
    pub exact: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            top_k: 10,
            min_band_matches: 1,
            exact: false,
        }
    }
}

/// One ranked search hit
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub plugin_id: String,
    pub artifact_name: String,
    /// Signature-based ranking estimate
    pub estimate: IndexEstimate,
    /// Full similarity, present when exact verification was requested
    pub exact: Option<SimilarityScore>,
    /// Ranking score: the exact overall when verified, else the estimate
    pub score: f64,
}

/// Searchable fingerprint corpus
///
/// Holds the fingerprints alongside the index so exact verification never
/// needs a second data source. All indexed fingerprints must share one
/// tokenization mode.
pub struct SearchEngine {
    index: LshIndex,
    calculator: SimilarityCalculator,
    plugins: HashMap<String, CodeDna>,
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl SearchEngine {
    /// Create an engine over a preconfigured index
    pub fn new(index: LshIndex) -> Self {
        Self {
            index,
            calculator: SimilarityCalculator::new(),
            plugins: HashMap::new(),
        }
    }

    /// Create an engine with the recommended index defaults
    pub fn with_defaults() -> Self {
        Self::new(LshIndex::with_defaults())
    }

    /// Number of indexed plugins
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Index one fingerprint
    pub fn add(&mut self, dna: CodeDna) -> Result<(), SchemaError> {
        if let Some(existing) = self.plugins.values().next() {
            ensure_same_mode(existing, &dna)?;
        }
        self.index.add(&dna);
        self.plugins.insert(dna.hash.clone(), dna);
        Ok(())
    }

    /// Bucket statistics of the underlying index
    pub fn stats(&self) -> IndexStats {
        self.index.stats()
    }

    /// Ranked plugins most similar to the query
    pub fn search(
        &self,
        query: &CodeDna,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, SchemaError> {
        if let Some(existing) = self.plugins.values().next() {
            ensure_same_mode(existing, query)?;
        }

        let mut results = Vec::new();
        for plugin_id in self.index.find_candidates(query, options.min_band_matches) {
            let estimate = match self.index.estimate_similarity(&plugin_id, query) {
                Some(estimate) => estimate,
                None => continue,
            };
            let dna = match self.plugins.get(&plugin_id) {
                Some(dna) => dna,
                None => continue,
            };

            let exact = options
                .exact
                .then(|| self.calculator.compute_similarity(dna, query));
            let score = exact
                .as_ref()
                .map(|score| score.overall)
                .unwrap_or(estimate.overall);
            if score < options.threshold {
                continue;
            }

            results.push(SearchResult {
                plugin_id,
                artifact_name: dna.metadata.artifact_name.clone(),
                estimate,
                exact,
                score,
            });
        }

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.plugin_id.cmp(&b.plugin_id))
        });
        results.truncate(options.top_k);
        Ok(results)
    }
}
