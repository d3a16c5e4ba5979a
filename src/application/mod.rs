//! Application layer: Use cases and services.
//!
//! The registry owns the loaded models; the inference service validates
//! requests and routes them to those models.

mod inference;
mod registry;

pub use inference::InferenceService;
pub use registry::{ModelRegistry, ModelStatus, RegistryStatus};
