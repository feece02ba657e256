//! `codedna compare` command implementation

use crate::archive;
use anyhow::{Context, Result};
use codedna_core::{ensure_same_mode, SimilarityCalculator};
use std::path::Path;

/// Compare two fingerprints and print their similarity
pub fn run(fp1: &Path, fp2: &Path, verbose: bool) -> Result<()> {
    let a = archive::read_fingerprint(fp1)?;
    let b = archive::read_fingerprint(fp2)?;
    ensure_same_mode(&a, &b).context("Fingerprints are not comparable")?;

    let score = SimilarityCalculator::new().compute_similarity(&a, &b);

    println!("Fingerprint Comparison");
    println!("======================");
    println!();
    println!("A: {} ({})", a.metadata.artifact_name, short(&a.hash));
    println!("B: {} ({})", b.metadata.artifact_name, short(&b.hash));
    println!();
    println!("Structural:     {:.4}", score.structural);
    println!("API:            {:.4}", score.api);
    println!("Behavioral:     {:.4}", score.behavioral);
    println!("Overall:        {:.4}", score.overall);

    if verbose {
        let details = &score.details;
        println!();
        println!("Detail counts");
        println!(
            "  Classes:        {} common ({} vs {})",
            details.common_classes, details.classes_a, details.classes_b
        );
        println!(
            "  Methods:        {} common ({} vs {})",
            details.common_methods, details.methods_a, details.methods_b
        );
        println!(
            "  API references: {} common ({} vs {})",
            details.common_api_references, details.api_references_a, details.api_references_b
        );
    }

    Ok(())
}

fn short(hash: &str) -> &str {
    &hash[..hash.len().min(12)]
}
