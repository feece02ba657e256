//! Similarity and churn between fingerprints
//!
//! Compares two [`CodeDna`] records across the structural, API and
//! behavioral dimensions and reports what changed between successive
//! versions. All operations are total: every pair of well-formed
//! fingerprints produces a defined result, including for empty feature sets.

use crate::types::{ChurnMetrics, CodeDna, SimilarityDetails, SimilarityScore};
use std::collections::{BTreeMap, BTreeSet};

/// Dimension weights for the overall score
const STRUCTURAL_WEIGHT: f64 = 0.4;
const API_WEIGHT: f64 = 0.3;
const BEHAVIORAL_WEIGHT: f64 = 0.3;

/// Behavioral score when neither side exposes instruction patterns
pub const BEHAVIORAL_NEUTRAL: f64 = 0.5;
/// Behavioral score when exactly one side exposes instruction patterns
const BEHAVIORAL_ONE_SIDED: f64 = 0.1;

/// Computes similarity scores and churn metrics
pub struct SimilarityCalculator;

impl Default for SimilarityCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl SimilarityCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Weighted three-dimensional similarity between two fingerprints
    pub fn compute_similarity(&self, a: &CodeDna, b: &CodeDna) -> SimilarityScore {
        let structural = 0.4 * jaccard(&a.structure.class_hashes, &b.structure.class_hashes)
            + 0.2 * jaccard(
                &a.structure.inheritance_hashes,
                &b.structure.inheritance_hashes,
            )
            + 0.2 * jaccard(&a.structure.interface_hashes, &b.structure.interface_hashes)
            + 0.2 * cosine_counts(
                &package_counts(&a.structure.package_structure),
                &package_counts(&b.structure.package_structure),
            );

        let api = 0.5
            * jaccard(
                &a.api_footprint.external_references,
                &b.api_footprint.external_references,
            )
            + 0.3 * jaccard(
                &a.api_footprint.method_signature_hashes,
                &b.api_footprint.method_signature_hashes,
            )
            + 0.2 * jaccard(
                &a.api_footprint.annotation_hashes,
                &b.api_footprint.annotation_hashes,
            );

        let behavioral = self.behavioral_similarity(a, b);
        let overall =
            STRUCTURAL_WEIGHT * structural + API_WEIGHT * api + BEHAVIORAL_WEIGHT * behavioral;

        SimilarityScore {
            structural,
            api,
            behavioral,
            overall,
            details: details(a, b),
        }
    }

    fn behavioral_similarity(&self, a: &CodeDna, b: &CodeDna) -> f64 {
        let patterns_a = &a.behavioral.instruction_pattern_hashes;
        let patterns_b = &b.behavioral.instruction_pattern_hashes;

        if patterns_a.is_empty() && patterns_b.is_empty() {
            return BEHAVIORAL_NEUTRAL;
        }
        if patterns_a.is_empty() || patterns_b.is_empty() {
            return BEHAVIORAL_ONE_SIDED;
        }

        let pattern_score = jaccard(patterns_a, patterns_b);
        let histogram_score = histogram_similarity(a, b);
        let raw = 0.7 * pattern_score + 0.3 * histogram_score;
        raw * complexity_factor(a, b)
    }

    /// What changed from `old` to `new`
    pub fn compute_churn(&self, old: &CodeDna, new: &CodeDna) -> ChurnMetrics {
        let old_classes = &old.structure.class_hashes;
        let new_classes = &new.structure.class_hashes;
        let old_methods = &old.api_footprint.method_signature_hashes;
        let new_methods = &new.api_footprint.method_signature_hashes;
        let old_refs = &old.api_footprint.external_references;
        let new_refs = &new.api_footprint.external_references;

        let added_classes = new_classes.difference(old_classes).count();
        let removed_classes = old_classes.difference(new_classes).count();
        let unchanged_classes = old_classes.intersection(new_classes).count();
        let added_methods = new_methods.difference(old_methods).count();
        let removed_methods = old_methods.difference(new_methods).count();
        let added_api_references = new_refs.difference(old_refs).count();
        let removed_api_references = old_refs.difference(new_refs).count();

        let changes = added_classes + removed_classes + added_methods + removed_methods;
        let baseline = old_classes.len() + old_methods.len();
        let churn_percentage = if baseline == 0 {
            100.0
        } else {
            changes as f64 / baseline as f64 * 100.0
        };

        ChurnMetrics {
            added_classes,
            removed_classes,
            unchanged_classes,
            added_methods,
            removed_methods,
            added_api_references,
            removed_api_references,
            churn_percentage,
        }
    }
}

/// Jaccard similarity with the empty-set conventions
///
/// Two empty sets are identical (1.0); one empty side shares nothing (0.0).
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

/// Cosine similarity over two count maps, with the same empty conventions
pub fn cosine_counts<K: Ord>(a: &BTreeMap<K, u64>, b: &BTreeMap<K, u64>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    for (key, &count_a) in a {
        let count_b = b.get(key).copied().unwrap_or(0);
        dot += count_a as f64 * count_b as f64;
        norm_a += (count_a as f64) * (count_a as f64);
    }
    let norm_b: f64 = b.values().map(|&c| (c as f64) * (c as f64)).sum();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 1.0)
}

/// Cosine over per-token instruction totals, damped by the method-count
/// disparity between the two sides
fn histogram_similarity(a: &CodeDna, b: &CodeDna) -> f64 {
    let aggregate_a = aggregate_histograms(a);
    let aggregate_b = aggregate_histograms(b);
    if aggregate_a.is_empty() || aggregate_b.is_empty() {
        return 0.0;
    }

    let methods_a = a.behavioral.instruction_histograms.len();
    let methods_b = b.behavioral.instruction_histograms.len();
    let disparity = methods_a.min(methods_b) as f64 / methods_a.max(methods_b) as f64;

    cosine_counts(&aggregate_a, &aggregate_b) * disparity
}

fn aggregate_histograms(dna: &CodeDna) -> BTreeMap<&str, u64> {
    let mut aggregate = BTreeMap::new();
    for histogram in dna.behavioral.instruction_histograms.values() {
        for (token, &count) in histogram {
            *aggregate.entry(token.as_str()).or_insert(0) += count as u64;
        }
    }
    aggregate
}

/// Damping factor for small methods
///
/// Short methods produce few 3-grams, so their pattern agreement carries
/// little evidence; scale the behavioral score down accordingly.
fn complexity_factor(a: &CodeDna, b: &CodeDna) -> f64 {
    let (mean_a, mean_b) = match (mean_method_length(a), mean_method_length(b)) {
        (Some(x), Some(y)) => (x, y),
        _ => return 1.0,
    };
    let s = (mean_a + mean_b) / 2.0;
    match s {
        s if s < 3.0 => 0.3,
        s if s < 5.0 => 0.5,
        s if s < 10.0 => 0.7,
        s if s < 20.0 => 0.9,
        _ => 1.0,
    }
}

/// Mean instruction count across a fingerprint's analyzed methods
fn mean_method_length(dna: &CodeDna) -> Option<f64> {
    let histograms = &dna.behavioral.instruction_histograms;
    if histograms.is_empty() {
        return None;
    }
    let total: u64 = histograms
        .values()
        .map(|h| h.values().map(|&c| c as u64).sum::<u64>())
        .sum();
    Some(total as f64 / histograms.len() as f64)
}

fn package_counts(packages: &BTreeMap<String, usize>) -> BTreeMap<&str, u64> {
    packages
        .iter()
        .map(|(package, &count)| (package.as_str(), count as u64))
        .collect()
}

fn details(a: &CodeDna, b: &CodeDna) -> SimilarityDetails {
    let common = |x: &BTreeSet<String>, y: &BTreeSet<String>| x.intersection(y).count();
    SimilarityDetails {
        common_classes: common(&a.structure.class_hashes, &b.structure.class_hashes),
        classes_a: a.structure.class_hashes.len(),
        classes_b: b.structure.class_hashes.len(),
        common_methods: common(
            &a.api_footprint.method_signature_hashes,
            &b.api_footprint.method_signature_hashes,
        ),
        methods_a: a.api_footprint.method_signature_hashes.len(),
        methods_b: b.api_footprint.method_signature_hashes.len(),
        common_api_references: common(
            &a.api_footprint.external_references,
            &b.api_footprint.external_references,
        ),
        api_references_a: a.api_footprint.external_references.len(),
        api_references_b: b.api_footprint.external_references.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::FingerprintBuilder;
    use crate::hash::feature_hash;
    use crate::types::{ClassInfo, InstructionHistogram, MethodInfo, TokenMode};

    const EPSILON: f64 = 1e-9;

    fn class(name: &str, super_name: Option<&str>) -> ClassInfo {
        ClassInfo {
            class_name: name.to_string(),
            super_name: super_name.map(str::to_string),
            interfaces: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            annotations: Vec::new(),
            external_references: BTreeSet::new(),
        }
    }

    /// Method whose histogram holds `length` copies of one token
    fn method(name: &str, pattern: &str, length: u32) -> MethodInfo {
        let mut histogram = InstructionHistogram::new();
        histogram.insert(feature_hash("96"), length);
        MethodInfo {
            name: name.to_string(),
            descriptor: "()V".to_string(),
            access_flags: 0x0001,
            instruction_pattern: Some(feature_hash(pattern)),
            instruction_histogram: Some(histogram),
        }
    }

    fn dna_of(classes: &[ClassInfo]) -> CodeDna {
        FingerprintBuilder::new(TokenMode::Exact).build("test.jar", classes)
    }

    fn calculator() -> SimilarityCalculator {
        SimilarityCalculator::new()
    }

    #[test]
    fn test_jaccard_conventions() {
        let empty = BTreeSet::new();
        let full: BTreeSet<String> = ["a".to_string()].into_iter().collect();
        assert_eq!(jaccard(&empty, &empty), 1.0);
        assert_eq!(jaccard(&full, &empty), 0.0);
        assert_eq!(jaccard(&empty, &full), 0.0);
        assert_eq!(jaccard(&full, &full), 1.0);
    }

    #[test]
    fn test_cosine_conventions() {
        let empty: BTreeMap<&str, u64> = BTreeMap::new();
        let full: BTreeMap<&str, u64> = [("a", 2u64)].into_iter().collect();
        assert_eq!(cosine_counts(&empty, &empty), 1.0);
        assert_eq!(cosine_counts(&full, &empty), 0.0);
        assert!((cosine_counts(&full, &full) - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_cosine_scale_invariant() {
        let a: BTreeMap<&str, u64> = [("x", 1u64), ("y", 2)].into_iter().collect();
        let b: BTreeMap<&str, u64> = [("x", 2u64), ("y", 4)].into_iter().collect();
        assert!((cosine_counts(&a, &b) - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_reflexivity_without_patterns() {
        let dna = dna_of(&[
            class("com/example/A", Some("java/lang/Object")),
            class("com/example/B", Some("com/example/A")),
        ]);
        let score = calculator().compute_similarity(&dna, &dna);
        assert!((score.structural - 1.0).abs() < EPSILON);
        assert!((score.api - 1.0).abs() < EPSILON);
        assert!((score.behavioral - BEHAVIORAL_NEUTRAL).abs() < EPSILON);
        assert!((score.overall - 0.85).abs() < EPSILON);
    }

    #[test]
    fn test_reflexivity_with_patterns_equals_complexity_factor() {
        // every method has 4 instructions, so the mean lands in the 0.5 band
        let mut holder = class("com/example/A", Some("java/lang/Object"));
        holder.methods.push(method("go", "p1", 4));
        holder.methods.push(method("stop", "p2", 4));
        let dna = dna_of(&[holder]);
        let score = calculator().compute_similarity(&dna, &dna);
        assert!((score.behavioral - 0.5).abs() < EPSILON);
        assert!(score.overall >= 0.7);
    }

    #[test]
    fn test_symmetry() {
        let mut left_class = class("com/example/A", Some("java/lang/Object"));
        left_class.methods.push(method("go", "p1", 6));
        let left = dna_of(&[left_class]);

        let mut right_class = class("com/example/B", Some("java/lang/Object"));
        right_class.methods.push(method("go", "p2", 9));
        let right = dna_of(&[right_class]);

        let ab = calculator().compute_similarity(&left, &right);
        let ba = calculator().compute_similarity(&right, &left);
        assert_eq!(ab.structural, ba.structural);
        assert_eq!(ab.api, ba.api);
        assert_eq!(ab.behavioral, ba.behavioral);
        assert_eq!(ab.overall, ba.overall);
        assert_eq!(ab.details.common_classes, ba.details.common_classes);
    }

    #[test]
    fn test_one_sided_patterns_score_low() {
        let mut with_patterns = class("com/example/A", Some("java/lang/Object"));
        with_patterns.methods.push(method("go", "p1", 6));
        let left = dna_of(&[with_patterns]);
        let right = dna_of(&[class("com/example/A", Some("java/lang/Object"))]);

        let score = calculator().compute_similarity(&left, &right);
        assert!((score.behavioral - 0.1).abs() < EPSILON);
    }

    #[test]
    fn test_disjoint_plugins_score_low() {
        let mut left_class = class("com/one/A", Some("java/lang/Object"));
        left_class.methods.push(method("go", "p1", 25));
        left_class.external_references.insert("org/x/Lib".into());
        let left = dna_of(&[left_class]);

        let mut right_class = class("net/two/B", Some("java/lang/Object"));
        right_class.methods.push(method("run", "p2", 25));
        right_class.external_references.insert("org/y/Other".into());
        let right = dna_of(&[right_class]);

        let score = calculator().compute_similarity(&left, &right);
        assert!(score.overall < 0.3, "overall = {}", score.overall);
    }

    #[test]
    fn test_renamed_class_keeps_behavior_and_api() {
        let mut original = class("com/example/Worker", Some("java/lang/Object"));
        original.methods.push(method("work", "shared-pattern", 30));
        original.external_references.insert("org/x/Lib.run()V".into());
        let left = dna_of(&[original]);

        let mut renamed = class("com/example/Laborer", Some("java/lang/Object"));
        renamed.methods.push(method("work", "shared-pattern", 30));
        renamed.external_references.insert("org/x/Lib.run()V".into());
        let right = dna_of(&[renamed]);

        let score = calculator().compute_similarity(&left, &right);
        // the class hash covers the name, so structure diverges
        assert!(score.structural < 0.7);
        // patterns and references survive the rename
        assert!(score.behavioral >= 0.9);
        assert!(score.api >= 0.6);
    }

    #[test]
    fn test_complexity_factor_bands() {
        for (length, expected) in [(2u32, 0.3), (4, 0.5), (8, 0.7), (15, 0.9), (40, 1.0)] {
            let mut holder = class("com/example/A", Some("java/lang/Object"));
            holder.methods.push(method("go", "p", length));
            let dna = dna_of(&[holder]);
            let score = calculator().compute_similarity(&dna, &dna);
            assert!(
                (score.behavioral - expected).abs() < EPSILON,
                "length {length}: expected {expected}, got {}",
                score.behavioral
            );
        }
    }

    #[test]
    fn test_histogram_disparity_penalty() {
        // same aggregate shape, but one side spreads it over three methods
        let mut one_method = class("com/example/A", Some("java/lang/Object"));
        one_method.methods.push(method("a", "p", 30));
        let left = dna_of(&[one_method]);

        let mut three_methods = class("com/example/A", Some("java/lang/Object"));
        three_methods.methods.push(method("a", "p", 30));
        three_methods.methods.push(method("b", "p2", 30));
        three_methods.methods.push(method("c", "p3", 30));
        let right = dna_of(&[three_methods]);

        let score = calculator().compute_similarity(&left, &right);
        // cosine of identical shapes is 1, damped by 1/3 method disparity;
        // pattern jaccard is 1/3; both sides average 30 instructions
        let expected = 0.7 * (1.0 / 3.0) + 0.3 * (1.0 / 3.0);
        assert!((score.behavioral - expected).abs() < EPSILON);
    }

    #[test]
    fn test_churn_identity() {
        let dna = dna_of(&[
            class("com/example/A", Some("java/lang/Object")),
            class("com/example/B", Some("java/lang/Object")),
        ]);
        let churn = calculator().compute_churn(&dna, &dna);
        assert_eq!(churn.added_classes, 0);
        assert_eq!(churn.removed_classes, 0);
        assert_eq!(churn.added_methods, 0);
        assert_eq!(churn.removed_methods, 0);
        assert_eq!(churn.unchanged_classes, 2);
        assert_eq!(churn.churn_percentage, 0.0);
    }

    #[test]
    fn test_churn_empty_baseline_is_total() {
        let empty = dna_of(&[]);
        let churn = calculator().compute_churn(&empty, &empty);
        assert_eq!(churn.churn_percentage, 100.0);
    }

    #[test]
    fn test_churn_version_delta() {
        let with_methods = |name: &str, methods: &[&str]| {
            let mut info = class(name, Some("java/lang/Object"));
            for m in methods {
                info.methods.push(method(m, "p", 5));
            }
            info
        };
        // old: A, B, C, D with 6 methods
        let old = dna_of(&[
            with_methods("com/p/A", &["a1", "a2"]),
            with_methods("com/p/B", &["b1", "b2"]),
            with_methods("com/p/C", &["c1"]),
            with_methods("com/p/D", &["d1"]),
        ]);
        // new: A, B, C, E with 5 methods; D and its method gone, E added
        let new = dna_of(&[
            with_methods("com/p/A", &["a1", "a2"]),
            with_methods("com/p/B", &["b1", "b2"]),
            with_methods("com/p/C", &["c1"]),
            with_methods("com/p/E", &[]),
        ]);

        let churn = calculator().compute_churn(&old, &new);
        assert_eq!(churn.added_classes, 1);
        assert_eq!(churn.removed_classes, 1);
        assert_eq!(churn.unchanged_classes, 3);
        assert_eq!(churn.added_methods, 0);
        assert_eq!(churn.removed_methods, 1);
        // (1 + 1 + 0 + 1) changes over (4 classes + 6 methods)
        assert!((churn.churn_percentage - 30.0).abs() < EPSILON);
    }

    #[test]
    fn test_api_reference_churn() {
        let mut old_class = class("com/p/A", Some("java/lang/Object"));
        old_class.external_references.insert("org/x/Old.run()V".into());
        old_class.external_references.insert("org/x/Kept.go()V".into());
        let old = dna_of(&[old_class]);

        let mut new_class = class("com/p/A", Some("java/lang/Object"));
        new_class.external_references.insert("org/x/Kept.go()V".into());
        new_class.external_references.insert("org/x/New.run()V".into());
        let new = dna_of(&[new_class]);

        let churn = calculator().compute_churn(&old, &new);
        assert_eq!(churn.added_api_references, 1);
        assert_eq!(churn.removed_api_references, 1);
    }

    /// Calculator class with a constructor and one `return a + b` method
    fn calculator_dna(mode: TokenMode, class_name: &str, add_desc: &str, code: Vec<u8>) -> CodeDna {
        use crate::fixtures::ClassBytes;
        let mut builder = ClassBytes::new(class_name);
        let ctor = builder.method_ref("java/lang/Object", "<init>", "()V");
        // aload_0, invokespecial Object.<init>, return
        let mut init = vec![0x2a, 0xb7];
        init.extend_from_slice(&ctor.to_be_bytes());
        init.push(0xb1);
        let bytes = builder
            .method("<init>", "()V", 0x0001, Some(init))
            .method("add", add_desc, 0x0001, Some(code))
            .build();
        let builder = FingerprintBuilder::new(mode);
        builder
            .fingerprint_entries(
                "calc.jar",
                vec![(format!("{class_name}.class"), bytes)],
            )
            .unwrap()
            .dna
    }

    #[test]
    fn test_type_variant_calculators_end_to_end() {
        // int and float flavors of `return a + b`
        let int_code = vec![0x1b, 0x1c, 0x60, 0xac];
        let float_code = vec![0x23, 0x24, 0x62, 0xae];

        let exact_int =
            calculator_dna(TokenMode::Exact, "com/example/IntCalc", "(II)I", int_code.clone());
        let exact_float = calculator_dna(
            TokenMode::Exact,
            "com/example/FloatCalc",
            "(FF)F",
            float_code.clone(),
        );
        let exact_score = calculator().compute_similarity(&exact_int, &exact_float);

        let fuzzy_int =
            calculator_dna(TokenMode::Fuzzy, "com/example/IntCalc", "(II)I", int_code);
        let fuzzy_float =
            calculator_dna(TokenMode::Fuzzy, "com/example/FloatCalc", "(FF)F", float_code);
        let fuzzy_score = calculator().compute_similarity(&fuzzy_int, &fuzzy_float);

        // exact mode sees different opcodes; fuzzy mode sees LOAD,LOAD,ARITH
        assert!(exact_score.behavioral < 0.3);
        assert!(fuzzy_score.behavioral > exact_score.behavioral);
        // fuzzy patterns agree completely, so only the damping factor remains
        assert!((fuzzy_score.behavioral - 0.5).abs() < EPSILON);
        assert!(fuzzy_score.overall >= 0.4);
    }

    #[test]
    fn test_details_counts() {
        let mut left_class = class("com/p/A", Some("java/lang/Object"));
        left_class.methods.push(method("shared", "p", 5));
        left_class.methods.push(method("only_left", "p2", 5));
        let left = dna_of(&[left_class]);

        let mut right_class = class("com/p/A", Some("java/lang/Object"));
        right_class.methods.push(method("shared", "p", 5));
        let right = dna_of(&[right_class]);

        let score = calculator().compute_similarity(&left, &right);
        assert_eq!(score.details.common_classes, 1);
        assert_eq!(score.details.methods_a, 2);
        assert_eq!(score.details.methods_b, 1);
        assert_eq!(score.details.common_methods, 1);
    }
}
