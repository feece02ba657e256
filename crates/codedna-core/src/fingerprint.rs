//! Fingerprint construction
//!
//! Aggregates analyzed classes into one [`CodeDna`] record. Classes that
//! fail to parse are skipped with a diagnostic; the fingerprint stays valid
//! over the remaining classes. An artifact with no parseable class at all is
//! an error.

use crate::analyzer::ClassAnalyzer;
use crate::classfile::CLASS_EXTENSION;
use crate::error::{FingerprintError, SchemaError};
use crate::hash::feature_hash;
use crate::types::{
    ApiFootprint, BehavioralFeatures, ClassInfo, CodeDna, DnaMetadata, StructuralFeatures,
    TokenMode,
};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

static VERSION_PATTERN: OnceLock<Regex> = OnceLock::new();

/// A class entry that failed to parse and was excluded from the fingerprint
#[derive(Debug, Clone)]
pub struct SkippedEntry {
    pub entry_name: String,
    pub reason: String,
}

/// A generated fingerprint plus per-entry diagnostics
#[derive(Debug)]
pub struct AnalysisReport {
    pub dna: CodeDna,
    pub skipped: Vec<SkippedEntry>,
}

/// Builds [`CodeDna`] records from class-file entries
pub struct FingerprintBuilder {
    analyzer: ClassAnalyzer,
}

impl FingerprintBuilder {
    /// Create a builder analyzing under `mode`
    pub fn new(mode: TokenMode) -> Self {
        Self {
            analyzer: ClassAnalyzer::new(mode),
        }
    }

    /// Create a builder around a preconfigured analyzer
    pub fn with_analyzer(analyzer: ClassAnalyzer) -> Self {
        Self { analyzer }
    }

    /// Fingerprint a stream of `(entry name, bytes)` pairs
    ///
    /// Entries whose name does not end in `.class` are ignored. Unparseable
    /// classes are skipped and reported; the artifact is an error only when
    /// nothing parses.
    pub fn fingerprint_entries<I>(
        &self,
        artifact_name: &str,
        entries: I,
    ) -> Result<AnalysisReport, FingerprintError>
    where
        I: IntoIterator<Item = (String, Vec<u8>)>,
    {
        let mut classes = Vec::new();
        let mut skipped = Vec::new();

        for (entry_name, bytes) in entries {
            if !entry_name.ends_with(CLASS_EXTENSION) {
                continue;
            }
            match self.analyzer.analyze(&bytes) {
                Ok(info) => classes.push(info),
                Err(error) => {
                    tracing::warn!(entry = %entry_name, %error, "skipping unparseable class");
                    skipped.push(SkippedEntry {
                        entry_name,
                        reason: error.to_string(),
                    });
                }
            }
        }

        if classes.is_empty() {
            return Err(FingerprintError::UnsupportedArtifact);
        }

        Ok(AnalysisReport {
            dna: self.build(artifact_name, &classes),
            skipped,
        })
    }

    /// Aggregate analyzed classes into a fingerprint
    pub fn build(&self, artifact_name: &str, classes: &[ClassInfo]) -> CodeDna {
        let mut structure = StructuralFeatures::default();
        let mut api_footprint = ApiFootprint::default();
        let mut behavioral = BehavioralFeatures::default();
        let mut total_methods = 0;
        let mut total_fields = 0;

        for class in classes {
            let mut interfaces = class.interfaces.clone();
            interfaces.sort();
            let class_key = format!(
                "{}|{}|{}",
                class.class_name,
                class.super_name.as_deref().unwrap_or(""),
                interfaces.join(",")
            );
            structure.class_hashes.insert(feature_hash(&class_key));

            *structure
                .package_structure
                .entry(package_of(&class.class_name).to_string())
                .or_insert(0) += 1;

            if let Some(super_name) = &class.super_name {
                structure.inheritance_hashes.insert(feature_hash(&format!(
                    "{}:extends:{}",
                    class.class_name, super_name
                )));
            }
            for iface in &class.interfaces {
                structure.interface_hashes.insert(feature_hash(&format!(
                    "{}:implements:{}",
                    class.class_name, iface
                )));
            }

            for reference in &class.external_references {
                api_footprint
                    .external_references
                    .insert(feature_hash(reference));
            }
            for annotation in &class.annotations {
                api_footprint
                    .annotation_hashes
                    .insert(feature_hash(annotation));
            }

            total_fields += class.fields.len();
            for method in &class.methods {
                total_methods += 1;
                let method_key =
                    feature_hash(&format!("{}.{}", class.class_name, method.signature()));
                api_footprint
                    .method_signature_hashes
                    .insert(method_key.clone());

                if let Some(pattern) = &method.instruction_pattern {
                    behavioral
                        .instruction_pattern_hashes
                        .insert(pattern.clone());
                }
                if let Some(histogram) = &method.instruction_histogram {
                    behavioral
                        .instruction_histograms
                        .insert(method_key, histogram.clone());
                }
            }
        }

        let hash = overall_hash(&structure, &api_footprint, &behavioral);
        CodeDna {
            metadata: DnaMetadata {
                artifact_name: artifact_name.to_string(),
                version: parse_version(artifact_name),
                timestamp_ms: now_ms(),
                total_classes: classes.len(),
                total_methods,
                total_fields,
                mode: self.analyzer.mode(),
            },
            structure,
            api_footprint,
            behavioral,
            hash,
        }
    }
}

/// Overall hash over the five sorted feature sets
///
/// Depends only on set contents, never on insertion order, so parallel or
/// reordered analysis yields the same value.
pub fn overall_hash(
    structure: &StructuralFeatures,
    api_footprint: &ApiFootprint,
    behavioral: &BehavioralFeatures,
) -> String {
    fn join(set: &BTreeSet<String>) -> String {
        set.iter().map(String::as_str).collect::<Vec<_>>().join(",")
    }
    let combined = [
        join(&structure.class_hashes),
        join(&structure.inheritance_hashes),
        join(&api_footprint.external_references),
        join(&api_footprint.method_signature_hashes),
        join(&behavioral.instruction_pattern_hashes),
    ]
    .join("|");
    feature_hash(&combined)
}

/// Recompute a fingerprint's overall hash from its feature sets
pub fn recompute_hash(dna: &CodeDna) -> String {
    overall_hash(&dna.structure, &dna.api_footprint, &dna.behavioral)
}

/// First `major.minor[.patch]` match in the artifact name
pub fn parse_version(artifact_name: &str) -> Option<String> {
    let pattern = VERSION_PATTERN
        .get_or_init(|| Regex::new(r"\d+\.\d+(\.\d+)?").expect("version pattern is valid"));
    pattern.find(artifact_name).map(|m| m.as_str().to_string())
}

/// Serialize a fingerprint to JSON
pub fn to_json(dna: &CodeDna, pretty: bool) -> Result<String, SchemaError> {
    let text = if pretty {
        serde_json::to_string_pretty(dna)?
    } else {
        serde_json::to_string(dna)?
    };
    Ok(text)
}

/// Deserialize and validate a fingerprint from JSON
pub fn from_json(text: &str) -> Result<CodeDna, SchemaError> {
    let dna: CodeDna = serde_json::from_str(text)?;
    if dna.hash.is_empty() {
        return Err(SchemaError::EmptyField("hash"));
    }
    if dna.metadata.artifact_name.is_empty() {
        return Err(SchemaError::EmptyField("metadata.artifact_name"));
    }
    Ok(dna)
}

/// Reject fingerprints generated under different tokenization modes
pub fn ensure_same_mode(a: &CodeDna, b: &CodeDna) -> Result<(), SchemaError> {
    if a.metadata.mode != b.metadata.mode {
        return Err(SchemaError::ModeMismatch {
            left: a.metadata.mode.to_string(),
            right: b.metadata.mode.to_string(),
        });
    }
    Ok(())
}

/// Package prefix of an internal class name; empty for the default package
fn package_of(class_name: &str) -> &str {
    match class_name.rfind('/') {
        Some(index) => &class_name[..index],
        None => "",
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
