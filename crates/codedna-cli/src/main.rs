//! codedna CLI - fingerprinting and similarity search for JVM plugin artifacts

mod archive;
mod churn;
mod compare;
mod fingerprint;
mod index;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "codedna")]
#[command(author, version, about = "Structural fingerprints for JVM plugin artifacts")]
#[command(
    long_about = "codedna computes compact, non-reversible fingerprints of compiled plugin \
archives and compares them: duplicate detection, version churn tracking, and corpus-scale \
similarity search over an LSH index."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a fingerprint for a plugin artifact
    Fingerprint {
        /// Plugin archive (.jar/.zip) or a single .class file
        artifact: PathBuf,

        /// Output fingerprint file (JSON)
        output: PathBuf,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,

        /// Tokenize opcodes into semantic categories instead of exact values
        #[arg(long)]
        fuzzy: bool,
    },

    /// Compare two fingerprints across all similarity dimensions
    Compare {
        /// First fingerprint file
        fp1: PathBuf,

        /// Second fingerprint file
        fp2: PathBuf,

        /// Show common/total detail counts
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show what changed between two versions of a plugin
    Churn {
        /// Fingerprint of the older version
        old: PathBuf,

        /// Fingerprint of the newer version
        new: PathBuf,
    },

    /// Fingerprint every artifact under a directory into a database
    BuildIndex {
        /// Directory scanned recursively for .jar/.zip artifacts
        dir: PathBuf,

        /// Output database file (JSON array of fingerprints)
        out: PathBuf,

        /// Tokenize opcodes into semantic categories instead of exact values
        #[arg(long)]
        fuzzy: bool,
    },

    /// Find the plugins most similar to a query fingerprint
    Search {
        /// Query fingerprint file
        query: PathBuf,

        /// Fingerprint database produced by build-index
        db: PathBuf,

        /// Minimum score for a result to be reported
        #[arg(short = 't', long, default_value = "0.3")]
        threshold: f64,

        /// Maximum number of results
        #[arg(short = 'k', long, default_value = "10")]
        top_k: usize,

        /// Re-score candidates with the full similarity calculator
        #[arg(long)]
        exact: bool,

        /// Show per-dimension scores for each hit
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Fingerprint {
            artifact,
            output,
            pretty,
            fuzzy,
        } => fingerprint::run(&artifact, &output, pretty, fuzzy),

        Commands::Compare { fp1, fp2, verbose } => compare::run(&fp1, &fp2, verbose),

        Commands::Churn { old, new } => churn::run(&old, &new),

        Commands::BuildIndex { dir, out, fuzzy } => index::build(&dir, &out, fuzzy),

        Commands::Search {
            query,
            db,
            threshold,
            top_k,
            exact,
            verbose,
        } => index::search(&query, &db, threshold, top_k, exact, verbose),
    }
}
