//! codedna core - bytecode fingerprints and similarity for JVM plugins
//!
//! This crate turns compiled plugin artifacts into compact, non-reversible
//! fingerprints and compares them: how similar are two artifacts, what
//! changed between versions, and which plugins in a corpus are closest to a
//! query. Archive extraction and persistence live with the callers; the core
//! consumes `(entry name, class bytes)` pairs and produces [`CodeDna`]
//! records, similarity scores, churn metrics and LSH-backed candidate sets.

pub mod analyzer;
pub mod classfile;
pub mod error;
pub mod fingerprint;
pub mod hash;
pub mod lsh;
pub mod minhash;
pub mod opcodes;
pub mod search;
pub mod similarity;
pub mod types;

#[cfg(test)]
pub(crate) mod fixtures;

// Re-export commonly used types
pub use analyzer::{ClassAnalyzer, DEFAULT_PLATFORM_PREFIXES};
pub use classfile::{
    ClassFileParser, Instruction, RawClass, RawField, RawMethod, CLASS_EXTENSION, CLASS_MAGIC,
};
pub use error::{CodeDnaError, FingerprintError, IndexError, ParseError, SchemaError};
pub use fingerprint::{
    ensure_same_mode, from_json, overall_hash, parse_version, recompute_hash, to_json,
    AnalysisReport, FingerprintBuilder, SkippedEntry,
};
pub use hash::feature_hash;
pub use lsh::{IndexEstimate, IndexStats, LshIndex, DEFAULT_BANDS};
pub use minhash::{MinHash, DEFAULT_NUM_HASHES, DEFAULT_SEED};
pub use search::{SearchEngine, SearchOptions, SearchResult};
pub use similarity::{jaccard, SimilarityCalculator};
pub use types::{
    ApiFootprint, BehavioralFeatures, ChurnMetrics, ClassInfo, CodeDna, DnaMetadata, FieldInfo,
    InstructionHistogram, MethodInfo, SimilarityDetails, SimilarityScore, StructuralFeatures,
    TokenMode,
};
