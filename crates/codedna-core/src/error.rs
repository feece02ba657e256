//! Error types for codedna

use thiserror::Error;

/// Top-level error type for codedna operations
#[derive(Debug, Error)]
pub enum CodeDnaError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Fingerprint error: {0}")]
    Fingerprint(#[from] FingerprintError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors during class-file parsing
///
/// A `ParseError` is scoped to a single class file. Callers analyzing a
/// whole artifact recover from it by skipping the offending entry.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid magic bytes")]
    InvalidMagic,

    #[error("Unsupported class file version: {0}")]
    UnsupportedVersion(u16),

    #[error("Bad constant pool reference: {0}")]
    BadConstantIndex(u16),

    #[error("Unknown constant pool tag: {0}")]
    UnknownConstantTag(u8),

    #[error("Unknown opcode: {0:#04x}")]
    UnknownOpcode(u8),

    #[error("Malformed data: {0}")]
    Malformed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors during fingerprint generation at the artifact level
#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("No readable class files in artifact")]
    UnsupportedArtifact,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors in serialized fingerprints
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Malformed fingerprint: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Fingerprint field is empty: {0}")]
    EmptyField(&'static str),

    #[error("Fingerprint token modes differ: {left} vs {right}")]
    ModeMismatch { left: String, right: String },
}

/// Errors during index construction
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Signature width {num_hashes} is not divisible by band count {bands}")]
    InvalidBandCount { num_hashes: usize, bands: usize },

    #[error("Band count must be non-zero")]
    ZeroBands,
}
