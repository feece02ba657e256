//! Artifact and fingerprint file IO

use anyhow::{Context, Result};
use codedna_core::{from_json, CodeDna, CLASS_EXTENSION};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Read all class entries from a plugin artifact
///
/// Accepts a `.jar`/`.zip` archive or a bare `.class` file.
pub fn read_class_entries(path: &Path) -> Result<Vec<(String, Vec<u8>)>> {
    if path.extension().and_then(|e| e.to_str()) == Some("class") {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("entry.class")
            .to_string();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        return Ok(vec![(name, bytes)]);
    }

    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut zip = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read archive {}", path.display()))?;

    let mut entries = Vec::new();
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).context("Failed to read archive entry")?;
        if !entry.is_file() {
            continue;
        }
        let name = entry.name().to_string();
        if !name.ends_with(CLASS_EXTENSION) {
            continue;
        }
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut bytes)
            .with_context(|| format!("Failed to read entry {name}"))?;
        entries.push((name, bytes));
    }
    Ok(entries)
}

/// Load and validate a serialized fingerprint
pub fn read_fingerprint(path: &Path) -> Result<CodeDna> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    from_json(&text).with_context(|| format!("Invalid fingerprint in {}", path.display()))
}

/// Artifact name as recorded in fingerprint metadata
pub fn artifact_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("artifact")
        .to_string()
}

/// Collect plugin artifacts under a directory, recursively, in sorted order
pub fn collect_artifacts(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut artifacts = Vec::new();
    walk(dir, &mut artifacts)?;
    artifacts.sort();
    Ok(artifacts)
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in
        fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_dir() {
            walk(&path, out)?;
        } else if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("jar") | Some("zip")
        ) {
            out.push(path);
        }
    }
    Ok(())
}
