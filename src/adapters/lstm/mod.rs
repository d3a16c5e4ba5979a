//! LSTM adapter: Implementation of SequenceModel for the AFib detector.
//!
//! The weight artifact is a safetensors export of the PyTorch `state_dict`.
//! It holds only tensors, so the network is declared here as
//! [`AFIB_ARCHITECTURE`] and built with `candle_nn` layers bound to those
//! tensors by name:
//!
//! ```text
//! LSTM(input=1, hidden=64, layers=2, batch_first) -> Linear(64 -> 1)
//! ```
//!
//! A missing tensor or an unexpected one (e.g. a third layer) fails the
//! load before any layer is built; `VarBuilder` then rejects any tensor whose
//! shape differs from the declared one.
//!
//! The export's final activation is recorded in the file's metadata under
//! `output_activation` (`"none"` or `"sigmoid"`, default `"sigmoid"`).
//! Inter-layer dropout is a training-only operation and is not applied.
//!
//! # Thread Safety
//!
//! `forward` builds its own hidden/cell state per call; weights are never
//! written after load. One instance serves concurrent requests.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::{Linear, LSTMConfig, VarBuilder, LSTM, RNN};
use safetensors::SafeTensors;

use crate::adapters::artifact::{read_artifact, ArtifactManifest, ModelLoadError};
use crate::domain::ConditionedSignal;
use crate::ports::{InferenceError, SequenceModel, SequenceOutput};

/// Artifact file name inside the model directory.
pub const AFIB_MODEL_FILE: &str = "lstm_afib_model.safetensors";

/// Metadata key naming the export's final activation.
pub const ACTIVATION_METADATA_KEY: &str = "output_activation";

/// Shape contract between this crate and the training pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LstmArchitecture {
    pub input_size: usize,
    pub hidden_size: usize,
    pub num_layers: usize,
    pub num_outputs: usize,
}

impl LstmArchitecture {
    /// Every tensor name and shape the state dict must contain.
    #[must_use]
    pub fn expected_tensors(&self) -> BTreeMap<String, Vec<usize>> {
        let gates = 4 * self.hidden_size;
        let mut expected = BTreeMap::new();
        for layer in 0..self.num_layers {
            expected.insert(
                format!("lstm.weight_ih_l{layer}"),
                vec![gates, self.layer_input(layer)],
            );
            expected.insert(
                format!("lstm.weight_hh_l{layer}"),
                vec![gates, self.hidden_size],
            );
            expected.insert(format!("lstm.bias_ih_l{layer}"), vec![gates]);
            expected.insert(format!("lstm.bias_hh_l{layer}"), vec![gates]);
        }
        expected.insert(
            "fc.weight".to_string(),
            vec![self.num_outputs, self.hidden_size],
        );
        expected.insert("fc.bias".to_string(), vec![self.num_outputs]);
        expected
    }

    fn layer_input(&self, layer: usize) -> usize {
        if layer == 0 {
            self.input_size
        } else {
            self.hidden_size
        }
    }
}

/// Architecture the AFib weights were trained with.
pub const AFIB_ARCHITECTURE: LstmArchitecture = LstmArchitecture {
    input_size: 1,
    hidden_size: 64,
    num_layers: 2,
    num_outputs: 1,
};

/// Activation applied by the exported model's final layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputActivation {
    /// Forward pass returns raw logits.
    None,
    /// Forward pass ends in a sigmoid (the reference training module does).
    #[default]
    Sigmoid,
}

impl OutputActivation {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "none" => Some(Self::None),
            "sigmoid" => Some(Self::Sigmoid),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Sigmoid => "sigmoid",
        }
    }
}

/// Two-layer LSTM classifier with a linear head.
#[derive(Debug, Clone)]
pub struct LstmClassifier {
    architecture: LstmArchitecture,
    layers: Vec<LSTM>,
    fc: Linear,
    output_activation: OutputActivation,
    device: Device,
}

fn parse_error(e: impl std::fmt::Display) -> ModelLoadError {
    ModelLoadError::Parse(e.to_string())
}

fn schema_error(e: candle_core::Error) -> ModelLoadError {
    ModelLoadError::Schema(e.to_string())
}

impl LstmClassifier {
    /// Load the AFib model from `model_dir`.
    ///
    /// # Errors
    /// Returns error if the artifact is missing, fails its integrity check,
    /// or does not match [`AFIB_ARCHITECTURE`].
    pub fn load(
        model_dir: &Path,
        manifest: Option<&ArtifactManifest>,
    ) -> Result<Self, ModelLoadError> {
        let bytes = read_artifact(model_dir, AFIB_MODEL_FILE, manifest)?;
        let model = Self::from_safetensors(AFIB_ARCHITECTURE, &bytes)?;
        tracing::info!(
            "Loaded LSTM AFib model from {:?} (layers={}, hidden={}, activation={})",
            model_dir.join(AFIB_MODEL_FILE),
            AFIB_ARCHITECTURE.num_layers,
            AFIB_ARCHITECTURE.hidden_size,
            model.output_activation.as_str()
        );
        Ok(model)
    }

    /// Bind a safetensors state dict to a declared architecture.
    ///
    /// # Errors
    /// Returns `ModelLoadError::Parse` for bytes that are not a safetensors
    /// file and `ModelLoadError::Schema` on any missing, unexpected or
    /// mis-shaped tensor or an unknown activation name.
    pub fn from_safetensors(
        architecture: LstmArchitecture,
        bytes: &[u8],
    ) -> Result<Self, ModelLoadError> {
        let (_, metadata) = SafeTensors::read_metadata(bytes).map_err(parse_error)?;
        let output_activation = match metadata
            .metadata()
            .as_ref()
            .and_then(|m| m.get(ACTIVATION_METADATA_KEY))
        {
            Some(raw) => OutputActivation::parse(raw).ok_or_else(|| {
                ModelLoadError::Schema(format!("Unknown {ACTIVATION_METADATA_KEY} {raw:?}"))
            })?,
            None => OutputActivation::default(),
        };

        let device = Device::Cpu;
        let tensors: HashMap<String, Tensor> =
            candle_core::safetensors::load_buffer(bytes, &device).map_err(parse_error)?;

        let expected = architecture.expected_tensors();
        let mut names: Vec<&String> = tensors.keys().collect();
        names.sort();
        if let Some(extra) = names.iter().find(|name| !expected.contains_key(name.as_str())) {
            return Err(ModelLoadError::Schema(format!(
                "Unexpected tensor {extra:?} (declared {} layers)",
                architecture.num_layers
            )));
        }
        if let Some(missing) = expected.keys().find(|name| !tensors.contains_key(*name)) {
            return Err(ModelLoadError::Schema(format!("Missing tensor {missing:?}")));
        }

        let vb = VarBuilder::from_tensors(tensors, DType::F32, &device);
        let layers = (0..architecture.num_layers)
            .map(|layer_idx| {
                let config = LSTMConfig {
                    layer_idx,
                    ..Default::default()
                };
                candle_nn::lstm(
                    architecture.layer_input(layer_idx),
                    architecture.hidden_size,
                    config,
                    vb.pp("lstm"),
                )
            })
            .collect::<candle_core::Result<Vec<_>>>()
            .map_err(schema_error)?;
        let fc = candle_nn::linear(
            architecture.hidden_size,
            architecture.num_outputs,
            vb.pp("fc"),
        )
        .map_err(schema_error)?;

        Ok(Self {
            architecture,
            layers,
            fc,
            output_activation,
            device,
        })
    }

    #[must_use]
    pub fn output_activation(&self) -> OutputActivation {
        self.output_activation
    }

    /// Head output at the last time step of a `(1, steps, input)` batch.
    fn run(&self, input: Tensor, steps: usize) -> candle_core::Result<f32> {
        let mut sequence = input;
        for layer in &self.layers {
            let states = layer.seq(&sequence)?;
            sequence = layer.states_to_tensor(&states)?;
        }

        let last = sequence.i((.., steps - 1, ..))?;
        let out = candle_nn::Module::forward(&self.fc, &last)?;
        let values: Vec<f32> = out.flatten_all()?.to_vec1()?;
        values
            .first()
            .copied()
            .ok_or_else(|| candle_core::Error::Msg("linear head produced no output".into()))
    }
}

impl SequenceModel for LstmClassifier {
    fn forward(&self, signal: &ConditionedSignal) -> Result<SequenceOutput, InferenceError> {
        let (batch, steps, channels) = signal.tensor().dim();
        if batch != 1 || channels != self.architecture.input_size {
            return Err(InferenceError::Shape(format!(
                "Expected (1, steps, {}), got {:?}",
                self.architecture.input_size,
                (batch, steps, channels)
            )));
        }
        if steps == 0 {
            return Err(InferenceError::Shape("Sequence has no time steps".into()));
        }

        let input = Tensor::from_iter(signal.steps(), &self.device)
            .and_then(|t| t.reshape((batch, steps, channels)))
            .map_err(|e| InferenceError::Shape(e.to_string()))?;
        let z = self
            .run(input, steps)
            .map_err(|e| InferenceError::Evaluation(e.to_string()))?;

        let z = f64::from(z);
        if !z.is_finite() {
            return Err(InferenceError::NonFinite);
        }

        Ok(match self.output_activation {
            OutputActivation::None => SequenceOutput::Logit(z),
            OutputActivation::Sigmoid => SequenceOutput::Probability(crate::ports::sigmoid(z)),
        })
    }

    fn backend(&self) -> &str {
        "lstm"
    }
}
