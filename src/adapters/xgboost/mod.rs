//! XGBoost adapter: Implementation of TabularModel over an XGBoost JSON model.
//!
//! Reads the document produced by `Booster.save_model("model.json")` and
//! evaluates it natively:
//!
//! - Each tree is stored as parallel node arrays (`left_children`,
//!   `right_children`, `split_indices`, `split_conditions`, `default_left`).
//!   A node is a leaf when its left child is `-1`; its value is then held in
//!   `split_conditions`.
//! - Splits go left when `x < split_condition`; missing values (NaN) follow
//!   `default_left`.
//! - For `binary:logistic`, `base_score` is a probability. The margin starts
//!   at `logit(base_score)`, accumulates every tree's leaf, and is mapped back
//!   through the sigmoid.
//!
//! Arithmetic is `f32`, matching XGBoost's own predictor.
//!
//! # Thread Safety
//!
//! Trees are immutable after load and prediction only reads them.

use std::path::Path;

use serde::Deserialize;

use crate::adapters::artifact::{read_artifact, ArtifactManifest, ModelLoadError};
use crate::domain::{FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
use crate::ports::{InferenceError, TabularModel};

/// Artifact file name inside the model directory.
pub const STROKE_MODEL_FILE: &str = "xgboost_stroke_model.json";

const SUPPORTED_OBJECTIVE: &str = "binary:logistic";

#[derive(Debug, Deserialize)]
struct XgbDocument {
    learner: Learner,
}

#[derive(Debug, Deserialize)]
struct Learner {
    #[serde(default)]
    feature_names: Vec<String>,
    gradient_booster: GradientBooster,
    learner_model_param: LearnerModelParam,
    objective: Objective,
}

#[derive(Debug, Deserialize)]
struct GradientBooster {
    name: String,
    #[serde(default)]
    model: Option<GbTreeModel>,
}

#[derive(Debug, Deserialize)]
struct GbTreeModel {
    trees: Vec<RawTree>,
}

#[derive(Debug, Deserialize)]
struct LearnerModelParam {
    base_score: String,
    num_feature: String,
}

#[derive(Debug, Deserialize)]
struct Objective {
    name: String,
}

/// `default_left` is written as 0/1 integers by JSON exports and as
/// booleans by some converters.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
}

impl Flag {
    fn is_set(self) -> bool {
        match self {
            Self::Bool(b) => b,
            Self::Int(i) => i != 0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawTree {
    left_children: Vec<i32>,
    right_children: Vec<i32>,
    split_indices: Vec<u32>,
    split_conditions: Vec<f32>,
    default_left: Vec<Flag>,
}

#[derive(Debug, Clone, Copy)]
enum Node {
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
        default_left: bool,
    },
    Leaf(f32),
}

/// A single regression tree, root at index 0.
#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn from_raw(index: usize, raw: RawTree, num_feature: usize) -> Result<Self, ModelLoadError> {
        let n = raw.left_children.len();
        if n == 0 {
            return Err(ModelLoadError::Parse(format!("Tree {index} has no nodes")));
        }
        if raw.right_children.len() != n
            || raw.split_indices.len() != n
            || raw.split_conditions.len() != n
            || raw.default_left.len() != n
        {
            return Err(ModelLoadError::Parse(format!(
                "Tree {index} node arrays have inconsistent lengths"
            )));
        }

        let child = |node: usize, c: i32| -> Result<usize, ModelLoadError> {
            // Children always come after their parent, which also rules out cycles.
            usize::try_from(c)
                .ok()
                .filter(|&c| c > node && c < n)
                .ok_or_else(|| {
                    ModelLoadError::Parse(format!("Tree {index} node {node} has invalid child {c}"))
                })
        };

        let mut nodes = Vec::with_capacity(n);
        for i in 0..n {
            if raw.left_children[i] == -1 {
                nodes.push(Node::Leaf(raw.split_conditions[i]));
                continue;
            }

            let feature = raw.split_indices[i] as usize;
            if feature >= num_feature {
                return Err(ModelLoadError::Schema(format!(
                    "Tree {index} splits on feature {feature}, model has {num_feature}"
                )));
            }
            nodes.push(Node::Split {
                feature,
                threshold: raw.split_conditions[i],
                left: child(i, raw.left_children[i])?,
                right: child(i, raw.right_children[i])?,
                default_left: raw.default_left[i].is_set(),
            });
        }

        Ok(Self { nodes })
    }

    fn leaf_value(&self, features: &[f32]) -> f32 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                Node::Leaf(value) => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    default_left,
                } => {
                    let x = features[feature];
                    idx = if x.is_nan() {
                        if default_left {
                            left
                        } else {
                            right
                        }
                    } else if x < threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }
}

/// Gradient-boosted tree ensemble for binary classification.
#[derive(Debug, Clone)]
pub struct TreeEnsemble {
    trees: Vec<Tree>,
    base_margin: f32,
}

impl TreeEnsemble {
    /// Load the stroke model from `model_dir`.
    ///
    /// # Errors
    /// Returns error if the artifact is missing, fails its integrity check,
    /// or does not match the stroke feature schema.
    pub fn load(
        model_dir: &Path,
        manifest: Option<&ArtifactManifest>,
    ) -> Result<Self, ModelLoadError> {
        let bytes = read_artifact(model_dir, STROKE_MODEL_FILE, manifest)?;
        let model = Self::from_json_slice(&bytes)?;
        tracing::info!(
            "Loaded XGBoost stroke model from {:?} ({} trees)",
            model_dir.join(STROKE_MODEL_FILE),
            model.num_trees()
        );
        Ok(model)
    }

    /// Parse an XGBoost JSON model document.
    ///
    /// # Errors
    /// Returns `Parse` for malformed documents and `Schema` when the model's
    /// objective or features differ from the stroke feature encoder.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ModelLoadError> {
        let doc: XgbDocument = serde_json::from_slice(bytes)?;
        let learner = doc.learner;

        if learner.objective.name != SUPPORTED_OBJECTIVE {
            return Err(ModelLoadError::Schema(format!(
                "Unsupported objective {:?}, expected {SUPPORTED_OBJECTIVE}",
                learner.objective.name
            )));
        }

        let num_feature: usize = learner
            .learner_model_param
            .num_feature
            .trim()
            .parse()
            .map_err(|_| {
                ModelLoadError::Parse(format!(
                    "Invalid num_feature {:?}",
                    learner.learner_model_param.num_feature
                ))
            })?;
        if num_feature != FEATURE_COUNT {
            return Err(ModelLoadError::Schema(format!(
                "Model expects {num_feature} features, encoder produces {FEATURE_COUNT}"
            )));
        }

        if !learner.feature_names.is_empty()
            && !learner
                .feature_names
                .iter()
                .map(String::as_str)
                .eq(FEATURE_NAMES.iter().copied())
        {
            return Err(ModelLoadError::Schema(format!(
                "Feature names {:?} do not match encoder columns",
                learner.feature_names
            )));
        }

        let base_score = parse_base_score(&learner.learner_model_param.base_score)?;
        if !(base_score > 0.0 && base_score < 1.0) {
            return Err(ModelLoadError::Parse(format!(
                "base_score {base_score} must lie strictly between 0 and 1"
            )));
        }

        let model = match (learner.gradient_booster.name.as_str(), learner.gradient_booster.model) {
            ("gbtree", Some(model)) => model,
            (name, _) => {
                return Err(ModelLoadError::Schema(format!(
                    "Unsupported booster {name:?}, expected gbtree"
                )))
            }
        };

        let trees = model
            .trees
            .into_iter()
            .enumerate()
            .map(|(i, raw)| Tree::from_raw(i, raw, num_feature))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            trees,
            base_margin: (base_score / (1.0 - base_score)).ln(),
        })
    }

    #[must_use]
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Raw additive score before the logistic link.
    fn margin(&self, features: &[f32]) -> f32 {
        self.trees
            .iter()
            .fold(self.base_margin, |acc, tree| acc + tree.leaf_value(features))
    }
}

/// `base_score` is a decimal string, bracketed (`"[5E-1]"`) in newer exports.
fn parse_base_score(raw: &str) -> Result<f32, ModelLoadError> {
    let inner = raw.trim().trim_start_matches('[').trim_end_matches(']');
    inner
        .split(',')
        .next()
        .unwrap_or_default()
        .trim()
        .parse::<f32>()
        .map_err(|_| ModelLoadError::Parse(format!("Invalid base_score {raw:?}")))
}

impl TabularModel for TreeEnsemble {
    fn predict_proba(&self, features: &FeatureVector) -> Result<f64, InferenceError> {
        let row: Vec<f32> = features.as_slice().iter().map(|&x| x as f32).collect();
        if row.len() != FEATURE_COUNT {
            return Err(InferenceError::Shape(format!(
                "Expected {FEATURE_COUNT} features, got {}",
                row.len()
            )));
        }

        let margin = f64::from(self.margin(&row));
        if !margin.is_finite() {
            return Err(InferenceError::NonFinite);
        }
        Ok(crate::ports::sigmoid(margin))
    }

    fn backend(&self) -> &str {
        "xgboost"
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::{clinical::tests::sample_record, encode};
    use serde_json::{json, Value};

    /// One stump on `age` (feature 1): age < 50 → -1.0, else +1.0; NaN goes left.
    pub(crate) fn stump_tree() -> Value {
        json!({
            "left_children": [1, -1, -1],
            "right_children": [2, -1, -1],
            "split_indices": [1, 0, 0],
            "split_conditions": [50.0, -1.0, 1.0],
            "default_left": [1, 0, 0],
            "base_weights": [0.0, -1.0, 1.0]
        })
    }

    pub(crate) fn model_document(trees: Vec<Value>, base_score: &str) -> Value {
        json!({
            "learner": {
                "feature_names": FEATURE_NAMES,
                "gradient_booster": {
                    "model": {
                        "gbtree_model_param": { "num_trees": trees.len().to_string() },
                        "trees": trees
                    },
                    "name": "gbtree"
                },
                "learner_model_param": {
                    "base_score": base_score,
                    "num_class": "0",
                    "num_feature": "17"
                },
                "objective": { "name": "binary:logistic" }
            },
            "version": [2, 0, 3]
        })
    }

    fn ensemble(doc: &Value) -> Result<TreeEnsemble, ModelLoadError> {
        TreeEnsemble::from_json_slice(&serde_json::to_vec(doc).expect("serialize"))
    }

    #[test]
    fn test_stump_prediction() {
        let model = ensemble(&model_document(vec![stump_tree()], "5E-1")).expect("Should load");
        assert_eq!(model.num_trees(), 1);

        // sample record has age 67 → right leaf (+1.0), base margin 0
        let v = encode(&sample_record()).expect("encode");
        let p = model.predict_proba(&v).expect("predict");
        assert!((p - crate::ports::sigmoid(1.0)).abs() < 1e-6);

        let young = encode(&crate::domain::ClinicalRecord {
            age: 30.0,
            ..sample_record()
        })
        .expect("encode");
        let p = model.predict_proba(&young).expect("predict");
        assert!((p - crate::ports::sigmoid(-1.0)).abs() < 1e-6);
    }

    #[test]
    fn test_trees_are_additive_with_base_score() {
        let model = ensemble(&model_document(vec![stump_tree(), stump_tree()], "[2E-1]"))
            .expect("Should load");
        let v = encode(&sample_record()).expect("encode");
        let p = model.predict_proba(&v).expect("predict");

        let expected = crate::ports::sigmoid((0.2f64 / 0.8).ln() + 2.0);
        assert!((p - expected).abs() < 1e-5, "{p} vs {expected}");
    }

    #[test]
    fn test_missing_value_follows_default_direction() {
        let model = ensemble(&model_document(vec![stump_tree()], "0.5")).expect("Should load");
        let tree = &model.trees[0];
        let mut row = vec![0.0f32; FEATURE_COUNT];
        row[1] = f32::NAN;
        assert_eq!(tree.leaf_value(&row), -1.0);
    }

    #[test]
    fn test_bool_default_left_is_accepted() {
        let mut tree = stump_tree();
        tree["default_left"] = json!([false, false, false]);
        let model = ensemble(&model_document(vec![tree], "0.5")).expect("Should load");
        let mut row = vec![0.0f32; FEATURE_COUNT];
        row[1] = f32::NAN;
        assert_eq!(model.trees[0].leaf_value(&row), 1.0);
    }

    #[test]
    fn test_rejects_wrong_feature_count() {
        let mut doc = model_document(vec![stump_tree()], "0.5");
        doc["learner"]["learner_model_param"]["num_feature"] = json!("9");
        doc["learner"]["feature_names"] = json!([]);
        assert!(matches!(ensemble(&doc), Err(ModelLoadError::Schema(_))));
    }

    #[test]
    fn test_rejects_reordered_feature_names() {
        let mut doc = model_document(vec![stump_tree()], "0.5");
        let mut names: Vec<&str> = FEATURE_NAMES.to_vec();
        names.swap(0, 1);
        doc["learner"]["feature_names"] = json!(names);
        assert!(matches!(ensemble(&doc), Err(ModelLoadError::Schema(_))));
    }

    #[test]
    fn test_rejects_unsupported_objective() {
        let mut doc = model_document(vec![stump_tree()], "0.5");
        doc["learner"]["objective"]["name"] = json!("reg:squarederror");
        assert!(matches!(ensemble(&doc), Err(ModelLoadError::Schema(_))));
    }

    #[test]
    fn test_rejects_backward_child_pointer() {
        let mut tree = stump_tree();
        tree["left_children"] = json!([0, -1, -1]);
        assert!(matches!(
            ensemble(&model_document(vec![tree], "0.5")),
            Err(ModelLoadError::Parse(_))
        ));
    }

    #[test]
    fn test_rejects_out_of_range_split_feature() {
        let mut tree = stump_tree();
        tree["split_indices"] = json!([17, 0, 0]);
        assert!(matches!(
            ensemble(&model_document(vec![tree], "0.5")),
            Err(ModelLoadError::Schema(_))
        ));
    }

    #[test]
    fn test_parse_base_score() {
        assert_eq!(parse_base_score("5E-1").expect("parse"), 0.5);
        assert_eq!(parse_base_score("[5E-1]").expect("parse"), 0.5);
        assert!(parse_base_score("abc").is_err());
    }

    #[test]
    fn test_load_from_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        let doc = model_document(vec![stump_tree()], "0.5");
        std::fs::write(
            temp.path().join(STROKE_MODEL_FILE),
            serde_json::to_vec(&doc).expect("serialize"),
        )
        .expect("write");

        let model = TreeEnsemble::load(temp.path(), None).expect("Should load");
        assert_eq!(model.backend(), "xgboost");
    }
}
