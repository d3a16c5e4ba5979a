//! Model artifact access: reading files and checking their integrity.
//!
//! # Integrity manifest
//!
//! A model directory may carry a `manifest.json` binding each artifact to
//! its SHA-256 digest (written by the `write_manifest` tool):
//!
//! ```json
//! { "version": 1, "files": { "xgboost_stroke_model.json": "<hex>" } }
//! ```
//!
//! When present, an artifact is only parsed after its bytes match the bound
//! digest. A corrupt or swapped file becomes a load error for that artifact
//! alone; the other artifact still loads.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// File name of the integrity manifest inside a model directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Supported manifest format version.
pub const MANIFEST_VERSION: u32 = 1;

/// Error type for artifact loading.
#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("Artifact not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed artifact: {0}")]
    Parse(String),

    #[error("Artifact does not match the declared model: {0}")]
    Schema(String),

    #[error("Integrity check failed: {0}")]
    Integrity(String),
}

impl From<serde_json::Error> for ModelLoadError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

/// Digest manifest binding artifact file names to SHA-256 hex digests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub version: u32,
    pub files: BTreeMap<String, String>,
}

impl ArtifactManifest {
    /// Build a manifest over the given files in `dir`. Missing files are skipped.
    ///
    /// # Errors
    /// Returns `ModelLoadError::Io` if an existing file cannot be read.
    pub fn from_dir(dir: &Path, names: &[&str]) -> Result<Self, ModelLoadError> {
        let mut files = BTreeMap::new();
        for name in names {
            let path = dir.join(name);
            if !path.exists() {
                continue;
            }
            let bytes = fs::read(&path)?;
            files.insert((*name).to_string(), sha256_hex(&bytes));
        }
        Ok(Self {
            version: MANIFEST_VERSION,
            files,
        })
    }

    /// Load `manifest.json` from `dir` if it exists.
    ///
    /// # Errors
    /// Returns an error if the manifest exists but is unreadable, malformed,
    /// or of an unsupported version.
    pub fn load(dir: &Path) -> Result<Option<Self>, ModelLoadError> {
        let path = dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read(&path)?;
        let manifest: Self = serde_json::from_slice(&content)
            .map_err(|e| ModelLoadError::Integrity(format!("Invalid {MANIFEST_FILE}: {e}")))?;

        if manifest.version != MANIFEST_VERSION {
            return Err(ModelLoadError::Integrity(format!(
                "Unsupported manifest version: {}",
                manifest.version
            )));
        }
        if manifest.files.is_empty() {
            return Err(ModelLoadError::Integrity(format!(
                "{MANIFEST_FILE} contains no files"
            )));
        }

        Ok(Some(manifest))
    }

    /// Check `bytes` against the digest bound to `name`.
    ///
    /// # Errors
    /// Returns `ModelLoadError::Integrity` if the file is unbound or its digest differs.
    pub fn verify(&self, name: &str, bytes: &[u8]) -> Result<(), ModelLoadError> {
        let expected = self.files.get(name).ok_or_else(|| {
            ModelLoadError::Integrity(format!("{name} is not bound by {MANIFEST_FILE}"))
        })?;

        let actual = sha256_hex(bytes);
        if !constant_time_eq_str(&actual, &expected.to_ascii_lowercase()) {
            return Err(ModelLoadError::Integrity(format!(
                "SHA-256 mismatch for {name}"
            )));
        }
        Ok(())
    }

    /// Serialize to pretty JSON.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }
}

/// Read an artifact, verifying it against the manifest when one is given.
///
/// # Errors
/// Returns `NotFound` when the file is missing, `Io` on read failure and
/// `Integrity` on a digest mismatch.
pub fn read_artifact(
    dir: &Path,
    name: &str,
    manifest: Option<&ArtifactManifest>,
) -> Result<Vec<u8>, ModelLoadError> {
    let path = dir.join(name);
    if !path.exists() {
        return Err(ModelLoadError::NotFound(path));
    }

    let bytes = fs::read(&path)?;
    if let Some(manifest) = manifest {
        manifest.verify(name, &bytes)?;
        tracing::debug!("Verified digest of {}", name);
    }
    Ok(bytes)
}

/// Lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

// Constant-time compare for equal-length ASCII digests.
fn constant_time_eq_str(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}
