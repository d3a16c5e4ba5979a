//! Integrity manifest utility for StrokeGuard model artifacts.
//!
//! Writes `manifest.json` binding each artifact present in the model
//! directory to its SHA-256 digest. The registry refuses any listed artifact
//! whose bytes no longer match.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin write_manifest -- <model_dir>
//! ```

use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use strokeguard::adapters::artifact::{ArtifactManifest, MANIFEST_FILE};
use strokeguard::adapters::lstm::AFIB_MODEL_FILE;
use strokeguard::adapters::xgboost::STROKE_MODEL_FILE;

fn parse_args() -> Result<PathBuf> {
    let mut args = env::args().skip(1);
    let model_dir = match args.next() {
        Some(dir) if dir != "--help" && dir != "-h" => PathBuf::from(dir),
        _ => bail!("Usage: write_manifest <model_dir>"),
    };
    if let Some(extra) = args.next() {
        bail!("Unexpected argument: {extra}");
    }
    Ok(model_dir)
}

fn main() -> Result<()> {
    let model_dir = parse_args()?;
    if !model_dir.is_dir() {
        bail!("{} is not a directory", model_dir.display());
    }

    let manifest = ArtifactManifest::from_dir(&model_dir, &[STROKE_MODEL_FILE, AFIB_MODEL_FILE])
        .with_context(|| format!("Failed to hash artifacts in {}", model_dir.display()))?;

    if manifest.files.is_empty() {
        bail!(
            "No model artifacts found in {} (expected {STROKE_MODEL_FILE} or {AFIB_MODEL_FILE})",
            model_dir.display()
        );
    }

    let manifest_path = model_dir.join(MANIFEST_FILE);
    fs::write(&manifest_path, manifest.to_json()?)
        .with_context(|| format!("Failed to write {}", manifest_path.display()))?;

    println!("Wrote {}", manifest_path.display());
    for (name, digest) in &manifest.files {
        println!("  {name}  sha256:{digest}");
    }
    Ok(())
}
