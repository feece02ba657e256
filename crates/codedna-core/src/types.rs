//! Core data types for codedna

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Opcode tokenization mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenMode {
    /// Tokens are decimal opcode values
    #[default]
    Exact,
    /// Tokens are semantic category labels
    Fuzzy,
}

impl fmt::Display for TokenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenMode::Exact => write!(f, "exact"),
            TokenMode::Fuzzy => write!(f, "fuzzy"),
        }
    }
}

/// Instruction counts per hashed opcode token
pub type InstructionHistogram = BTreeMap<String, u32>;

/// Analyzed method surface
#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub name: String,
    pub descriptor: String,
    pub access_flags: u16,
    /// Hash over the method's normalized opcode 3-grams; `None` for methods
    /// without a body
    pub instruction_pattern: Option<String>,
    /// Token histogram; `None` for methods without a body
    pub instruction_histogram: Option<InstructionHistogram>,
}

impl MethodInfo {
    /// Name and descriptor concatenated, the method's identity within its
    /// class
    pub fn signature(&self) -> String {
        format!("{}{}", self.name, self.descriptor)
    }
}

/// Analyzed field surface
#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: String,
    pub descriptor: String,
    pub access_flags: u16,
}

/// Analyzer output for one class file
#[derive(Debug, Clone)]
pub struct ClassInfo {
    /// Internal slash-separated name
    pub class_name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub methods: Vec<MethodInfo>,
    pub fields: Vec<FieldInfo>,
    /// Class-scope annotation descriptors in encounter order
    pub annotations: Vec<String>,
    /// Raw references to non-platform types
    pub external_references: BTreeSet<String>,
}

/// Fingerprint metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnaMetadata {
    pub artifact_name: String,
    pub version: Option<String>,
    pub timestamp_ms: u64,
    pub total_classes: usize,
    pub total_methods: usize,
    pub total_fields: usize,
    /// Tokenization mode the fingerprint was generated under; fingerprints
    /// from different modes are not comparable
    #[serde(default)]
    pub mode: TokenMode,
}

/// Structural dimension of a fingerprint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuralFeatures {
    /// One hash per class over name, superclass and sorted interfaces
    pub class_hashes: BTreeSet<String>,
    /// Class count per package prefix
    pub package_structure: BTreeMap<String, usize>,
    /// One hash per extends edge
    pub inheritance_hashes: BTreeSet<String>,
    /// One hash per (class, interface) pair
    pub interface_hashes: BTreeSet<String>,
}

/// API dimension of a fingerprint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiFootprint {
    pub external_references: BTreeSet<String>,
    pub method_signature_hashes: BTreeSet<String>,
    pub annotation_hashes: BTreeSet<String>,
}

/// Behavioral dimension of a fingerprint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BehavioralFeatures {
    pub instruction_pattern_hashes: BTreeSet<String>,
    /// Histogram per method key (hash of `class.signature`)
    pub instruction_histograms: BTreeMap<String, InstructionHistogram>,
}

/// The fingerprint record for one artifact
///
/// Immutable after construction; every stored feature is a one-way hash, so
/// serialized fingerprints never leak source content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeDna {
    pub metadata: DnaMetadata,
    pub structure: StructuralFeatures,
    pub api_footprint: ApiFootprint,
    pub behavioral: BehavioralFeatures,
    /// Overall hash over the five sorted feature sets
    pub hash: String,
}

/// Side-by-side counts backing a similarity score
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimilarityDetails {
    pub common_classes: usize,
    pub classes_a: usize,
    pub classes_b: usize,
    pub common_methods: usize,
    pub methods_a: usize,
    pub methods_b: usize,
    pub common_api_references: usize,
    pub api_references_a: usize,
    pub api_references_b: usize,
}

/// Three-dimensional similarity between two fingerprints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityScore {
    /// Class layout, inheritance and packaging agreement, in [0, 1]
    pub structural: f64,
    /// External reference, method signature and annotation agreement
    pub api: f64,
    /// Instruction pattern and histogram agreement
    pub behavioral: f64,
    /// Weighted combination of the three dimensions
    pub overall: f64,
    pub details: SimilarityDetails,
}

/// What changed between two successive fingerprints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChurnMetrics {
    pub added_classes: usize,
    pub removed_classes: usize,
    pub unchanged_classes: usize,
    pub added_methods: usize,
    pub removed_methods: usize,
    pub added_api_references: usize,
    pub removed_api_references: usize,
    /// Added plus removed classes and methods relative to the old
    /// fingerprint's size, as a percentage
    pub churn_percentage: f64,
}
