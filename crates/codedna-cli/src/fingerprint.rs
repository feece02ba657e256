//! `codedna fingerprint` command implementation

use crate::archive;
use anyhow::{Context, Result};
use codedna_core::{to_json, FingerprintBuilder, TokenMode};
use std::fs;
use std::path::Path;

/// Fingerprint one artifact and write the record as JSON
pub fn run(artifact: &Path, output: &Path, pretty: bool, fuzzy: bool) -> Result<()> {
    let mode = if fuzzy { TokenMode::Fuzzy } else { TokenMode::Exact };
    let entries = archive::read_class_entries(artifact)?;

    let builder = FingerprintBuilder::new(mode);
    let report = builder
        .fingerprint_entries(&archive::artifact_name(artifact), entries)
        .with_context(|| format!("Failed to fingerprint {}", artifact.display()))?;

    for skipped in &report.skipped {
        eprintln!(
            "warning: skipped {}: {}",
            skipped.entry_name, skipped.reason
        );
    }

    let json = to_json(&report.dna, pretty).context("Failed to serialize fingerprint")?;
    fs::write(output, json).with_context(|| format!("Failed to write {}", output.display()))?;

    let dna = &report.dna;
    println!("Plugin Fingerprint");
    println!("==================");
    println!();
    println!("Artifact:       {}", artifact.display());
    if let Some(version) = &dna.metadata.version {
        println!("Version:        {version}");
    }
    println!("Mode:           {}", dna.metadata.mode);
    println!("Classes:        {}", dna.metadata.total_classes);
    println!("Methods:        {}", dna.metadata.total_methods);
    println!("Fields:         {}", dna.metadata.total_fields);
    println!(
        "External refs:  {}",
        dna.api_footprint.external_references.len()
    );
    println!(
        "Patterns:       {}",
        dna.behavioral.instruction_pattern_hashes.len()
    );
    if !report.skipped.is_empty() {
        println!("Skipped:        {} unparseable", report.skipped.len());
    }
    println!();
    println!("Hash:           {}", dna.hash);
    println!("Written to:     {}", output.display());

    Ok(())
}
