//! Model registry: one-time loading and shared access to both models.
//!
//! The registry is constructed once per process and handed to the
//! dispatcher behind an `Arc`. Loading happens on the first `load()` or
//! accessor call; a `OnceLock` guarantees it runs exactly once and that no
//! caller sees a half-loaded registry.
//!
//! Each artifact loads on its own. A missing or corrupt stroke model does
//! not keep the AFib model from serving, and vice versa; the failure is
//! logged, recorded in [`RegistryStatus`], and the accessor returns `None`.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::adapters::artifact::{ArtifactManifest, ModelLoadError, MANIFEST_FILE};
use crate::adapters::lstm::{LstmClassifier, AFIB_MODEL_FILE};
use crate::adapters::xgboost::{TreeEnsemble, STROKE_MODEL_FILE};
use crate::config::ServiceConfig;
use crate::ports::{ModelKind, SequenceModel, TabularModel};

/// Load outcome for one model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelStatus {
    pub kind: ModelKind,
    pub loaded: bool,
    pub backend: Option<String>,
    /// Artifact path; `None` for models supplied in memory.
    pub source: Option<PathBuf>,
    pub error: Option<String>,
    pub loaded_at: Option<DateTime<Utc>>,
}

impl ModelStatus {
    fn loaded(kind: ModelKind, backend: &str, source: Option<PathBuf>) -> Self {
        Self {
            kind,
            loaded: true,
            backend: Some(backend.to_string()),
            source,
            error: None,
            loaded_at: Some(Utc::now()),
        }
    }

    fn failed(kind: ModelKind, source: Option<PathBuf>, error: String) -> Self {
        Self {
            kind,
            loaded: false,
            backend: None,
            source,
            error: Some(error),
            loaded_at: None,
        }
    }
}

/// Snapshot of the registry for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStatus {
    pub version: &'static str,
    pub model_dir: PathBuf,
    pub manifest_verified: bool,
    pub stroke: ModelStatus,
    pub afib: ModelStatus,
}

struct LoadedModels {
    tabular: Option<Arc<dyn TabularModel>>,
    sequence: Option<Arc<dyn SequenceModel>>,
    manifest_verified: bool,
    stroke: ModelStatus,
    afib: ModelStatus,
}

/// Owner of the two served models.
pub struct ModelRegistry {
    model_dir: PathBuf,
    require_manifest: bool,
    models: OnceLock<LoadedModels>,
}

impl ModelRegistry {
    /// Registry over `model_dir`. Nothing is read until first use.
    #[must_use]
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            require_manifest: false,
            models: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(config.model_dir.clone()).with_required_manifest(config.require_manifest)
    }

    /// Refuse to load any artifact unless `manifest.json` is present.
    #[must_use]
    pub fn with_required_manifest(mut self, required: bool) -> Self {
        self.require_manifest = required;
        self
    }

    /// Registry pre-populated with in-memory models. `load()` is a no-op.
    #[must_use]
    pub fn from_models(
        tabular: Option<Arc<dyn TabularModel>>,
        sequence: Option<Arc<dyn SequenceModel>>,
    ) -> Self {
        let missing = |kind| ModelStatus::failed(kind, None, "Not provided".to_string());
        let stroke = tabular.as_ref().map_or_else(
            || missing(ModelKind::Stroke),
            |m| ModelStatus::loaded(ModelKind::Stroke, m.backend(), None),
        );
        let afib = sequence.as_ref().map_or_else(
            || missing(ModelKind::Afib),
            |m| ModelStatus::loaded(ModelKind::Afib, m.backend(), None),
        );

        Self {
            model_dir: PathBuf::new(),
            require_manifest: false,
            models: OnceLock::from(LoadedModels {
                tabular,
                sequence,
                manifest_verified: false,
                stroke,
                afib,
            }),
        }
    }

    #[must_use]
    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Load both models if not done yet. Later calls return immediately.
    pub fn load(&self) {
        self.loaded();
    }

    /// Whether loading has already run.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.models.get().is_some()
    }

    /// Stroke model, loading on first use.
    #[must_use]
    pub fn tabular_model(&self) -> Option<Arc<dyn TabularModel>> {
        self.loaded().tabular.clone()
    }

    /// AFib model, loading on first use.
    #[must_use]
    pub fn sequence_model(&self) -> Option<Arc<dyn SequenceModel>> {
        self.loaded().sequence.clone()
    }

    #[must_use]
    pub fn status(&self) -> RegistryStatus {
        let models = self.loaded();
        RegistryStatus {
            version: env!("CARGO_PKG_VERSION"),
            model_dir: self.model_dir.clone(),
            manifest_verified: models.manifest_verified,
            stroke: models.stroke.clone(),
            afib: models.afib.clone(),
        }
    }

    fn loaded(&self) -> &LoadedModels {
        self.models.get_or_init(|| self.load_all())
    }

    fn load_all(&self) -> LoadedModels {
        tracing::info!("Loading models from {:?}", self.model_dir);

        let manifest = match ArtifactManifest::load(&self.model_dir) {
            Ok(Some(manifest)) => {
                tracing::info!("Verifying artifacts against {MANIFEST_FILE}");
                Ok(Some(manifest))
            }
            Ok(None) if self.require_manifest => Err(format!(
                "{MANIFEST_FILE} is required but missing from {}",
                self.model_dir.display()
            )),
            Ok(None) => {
                tracing::warn!(
                    "No {MANIFEST_FILE} in {:?}; artifacts are not integrity-checked",
                    self.model_dir
                );
                Ok(None)
            }
            Err(e) => Err(e.to_string()),
        };
        if let Err(reason) = &manifest {
            tracing::error!("Manifest unusable, no model will load: {reason}");
        }

        let (tabular, stroke) = self.load_one(
            ModelKind::Stroke,
            STROKE_MODEL_FILE,
            &manifest,
            TreeEnsemble::load,
        );
        let (sequence, afib) = self.load_one(
            ModelKind::Afib,
            AFIB_MODEL_FILE,
            &manifest,
            LstmClassifier::load,
        );

        LoadedModels {
            tabular: tabular.map(|m| Arc::new(m) as Arc<dyn TabularModel>),
            sequence: sequence.map(|m| Arc::new(m) as Arc<dyn SequenceModel>),
            manifest_verified: matches!(manifest, Ok(Some(_))),
            stroke,
            afib,
        }
    }

    fn load_one<T>(
        &self,
        kind: ModelKind,
        file: &str,
        manifest: &Result<Option<ArtifactManifest>, String>,
        load: impl FnOnce(&Path, Option<&ArtifactManifest>) -> Result<T, ModelLoadError>,
    ) -> (Option<T>, ModelStatus)
    where
        T: BackendName,
    {
        let source = Some(self.model_dir.join(file));
        let manifest = match manifest {
            Ok(m) => m.as_ref(),
            Err(reason) => return (None, ModelStatus::failed(kind, source, reason.clone())),
        };

        match load(&self.model_dir, manifest) {
            Ok(model) => {
                let status = ModelStatus::loaded(kind, model.backend_name(), source);
                (Some(model), status)
            }
            Err(e) => {
                tracing::error!("Failed to load {kind} model: {e}");
                (None, ModelStatus::failed(kind, source, e.to_string()))
            }
        }
    }
}

/// Backend label for either model type, used while it is still concrete.
trait BackendName {
    fn backend_name(&self) -> &str;
}

impl BackendName for TreeEnsemble {
    fn backend_name(&self) -> &str {
        TabularModel::backend(self)
    }
}

impl BackendName for LstmClassifier {
    fn backend_name(&self) -> &str {
        SequenceModel::backend(self)
    }
}
