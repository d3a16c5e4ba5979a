//! Ports layer: Trait definitions for the inference backends.
//!
//! Following Hexagonal Architecture, these traits separate the dispatch
//! logic from the concrete model formats in `adapters`.

mod model;

pub use model::{
    sigmoid, InferenceError, ModelKind, SequenceModel, SequenceOutput, TabularModel,
};
