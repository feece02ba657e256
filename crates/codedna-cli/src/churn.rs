//! `codedna churn` command implementation

use crate::archive;
use anyhow::Result;
use codedna_core::SimilarityCalculator;
use std::path::Path;

/// Print what changed between two versions of a plugin
pub fn run(old: &Path, new: &Path) -> Result<()> {
    let old_dna = archive::read_fingerprint(old)?;
    let new_dna = archive::read_fingerprint(new)?;

    let churn = SimilarityCalculator::new().compute_churn(&old_dna, &new_dna);

    println!("Version Churn");
    println!("=============");
    println!();
    println!(
        "Old: {} ({} classes, {} methods)",
        old_dna.metadata.artifact_name,
        old_dna.metadata.total_classes,
        old_dna.metadata.total_methods
    );
    println!(
        "New: {} ({} classes, {} methods)",
        new_dna.metadata.artifact_name,
        new_dna.metadata.total_classes,
        new_dna.metadata.total_methods
    );
    println!();
    println!("Added classes:        {}", churn.added_classes);
    println!("Removed classes:      {}", churn.removed_classes);
    println!("Unchanged classes:    {}", churn.unchanged_classes);
    println!("Added methods:        {}", churn.added_methods);
    println!("Removed methods:      {}", churn.removed_methods);
    println!("Added API refs:       {}", churn.added_api_references);
    println!("Removed API refs:     {}", churn.removed_api_references);
    println!();
    println!("Churn:                {:.1}%", churn.churn_percentage);

    Ok(())
}
