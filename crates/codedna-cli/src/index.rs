//! `codedna build-index` and `codedna search` command implementations

use crate::archive;
use anyhow::{bail, Context, Result};
use codedna_core::{CodeDna, FingerprintBuilder, SearchEngine, SearchOptions, TokenMode};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::fs;
use std::path::Path;

/// Fingerprint every artifact under `dir` into a database file
pub fn build(dir: &Path, out: &Path, fuzzy: bool) -> Result<()> {
    let artifacts = archive::collect_artifacts(dir)?;
    if artifacts.is_empty() {
        bail!("No plugin artifacts found under {}", dir.display());
    }

    let mode = if fuzzy { TokenMode::Fuzzy } else { TokenMode::Exact };
    let builder = FingerprintBuilder::new(mode);

    let progress = ProgressBar::new(artifacts.len() as u64);
    progress.set_style(ProgressStyle::with_template(
        "{bar:40.cyan/blue} {pos}/{len} {msg}",
    )?);

    let outcomes: Vec<_> = artifacts
        .par_iter()
        .map(|path| {
            let outcome = archive::read_class_entries(path).and_then(|entries| {
                builder
                    .fingerprint_entries(&archive::artifact_name(path), entries)
                    .map_err(anyhow::Error::from)
            });
            progress.inc(1);
            (path, outcome)
        })
        .collect();
    progress.finish_and_clear();

    let mut fingerprints = Vec::new();
    let mut failed = 0;
    for (path, outcome) in outcomes {
        match outcome {
            Ok(report) => fingerprints.push(report.dna),
            Err(error) => {
                eprintln!("warning: skipping {}: {error:#}", path.display());
                failed += 1;
            }
        }
    }
    if fingerprints.is_empty() {
        bail!("No artifact under {} could be fingerprinted", dir.display());
    }

    // deterministic database layout regardless of analysis order
    fingerprints.sort_by(|a, b| a.hash.cmp(&b.hash));
    let json =
        serde_json::to_string_pretty(&fingerprints).context("Failed to serialize database")?;
    fs::write(out, json).with_context(|| format!("Failed to write {}", out.display()))?;

    println!("Fingerprint Database");
    println!("====================");
    println!();
    println!("Artifacts:   {}", fingerprints.len());
    if failed > 0 {
        println!("Failed:      {failed}");
    }
    println!("Written to:  {}", out.display());

    Ok(())
}

/// Rank the database plugins most similar to a query fingerprint
pub fn search(
    query: &Path,
    db: &Path,
    threshold: f64,
    top_k: usize,
    exact: bool,
    verbose: bool,
) -> Result<()> {
    let query_dna = archive::read_fingerprint(query)?;

    let text =
        fs::read_to_string(db).with_context(|| format!("Failed to read {}", db.display()))?;
    let fingerprints: Vec<CodeDna> =
        serde_json::from_str(&text).context("Invalid fingerprint database")?;

    let mut engine = SearchEngine::with_defaults();
    for dna in fingerprints {
        engine
            .add(dna)
            .context("Incompatible fingerprint in database")?;
    }

    let options = SearchOptions {
        threshold,
        top_k,
        exact,
        ..SearchOptions::default()
    };
    let results = engine
        .search(&query_dna, &options)
        .context("Query is not comparable to this database")?;

    println!("Search Results");
    println!("==============");
    println!();
    println!("Query:      {}", query_dna.metadata.artifact_name);
    println!("Database:   {} plugins", engine.len());
    println!("Matches:    {}", results.len());
    println!();

    if results.is_empty() {
        println!("No plugins scored above {threshold}");
        return Ok(());
    }

    for (rank, hit) in results.iter().enumerate() {
        println!(
            "{:>3}. {:.4}  {}  ({})",
            rank + 1,
            hit.score,
            hit.artifact_name,
            &hit.plugin_id[..hit.plugin_id.len().min(12)]
        );
        if verbose {
            println!(
                "     estimate: classes {:.3}, methods {:.3}, refs {:.3}",
                hit.estimate.class_similarity,
                hit.estimate.method_similarity,
                hit.estimate.reference_similarity
            );
            if let Some(exact) = &hit.exact {
                println!(
                    "     exact:    structural {:.3}, api {:.3}, behavioral {:.3}",
                    exact.structural, exact.api, exact.behavioral
                );
            }
        }
    }

    Ok(())
}
