//! On-disk model artefact schema and its validation.
//!
//! An artefact is a JSON document produced by offline training:
//!
//! ```json
//! {
//!   "model_version": "20250115_103000",
//!   "feature_names": ["has_name", "...", "is_recent"],
//!   "model": { "type": "linear", "intercept": 12.0, "coefficients": [ ... ] },
//!   "metrics": { "r2": 0.98, "mae": 1.2 },
//!   "feature_importances": [ ... ]
//! }
//! ```
//!
//! `feature_names` fixes the column order every per-feature list is aligned
//! with. It must name each engine feature exactly once; legacy names such as
//! `insee_salary_median` are accepted.
#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use camino::Utf8Path;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use waypost_core::{FEATURE_COUNT, FeatureName};

use crate::error::ModelError;
use crate::model::{GradientBoostedModel, LinearModel, Regressor, TrainedModel, Tree};

/// Format of versions derived from the artefact modification time.
pub const MTIME_VERSION_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Serialised form of a trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Version identifier; derived from the file modification time when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    /// Column order of the model.
    pub feature_names: Vec<String>,
    /// Regressor parameters.
    pub model: ModelParameters,
    /// Evaluation metrics recorded at training time.
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    /// Importance per column, aligned with `feature_names`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_importances: Option<Vec<f64>>,
}

/// Regressor parameters, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelParameters {
    /// `intercept + Σ coefficients[i] · x[i]`.
    Linear {
        /// Constant term.
        intercept: f64,
        /// Weight per column.
        coefficients: Vec<f64>,
    },
    /// `init + learning_rate · Σ tree(x)`.
    GradientBoosting {
        /// Initial prediction.
        init: f64,
        /// Shrinkage applied to every tree.
        learning_rate: f64,
        /// Regression trees as flat node arrays rooted at index 0.
        trees: Vec<Vec<TreeNode>>,
    },
}

/// A node of a regression tree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    /// Internal node: values `<= threshold` go left.
    Split {
        /// Column index into `feature_names`.
        feature: usize,
        /// Split threshold.
        threshold: f64,
        /// Index of the left child.
        left: usize,
        /// Index of the right child.
        right: usize,
    },
    /// Terminal node.
    Leaf {
        /// Contribution of this leaf.
        value: f64,
    },
}

impl ModelArtifact {
    /// Parse an artefact from JSON text without validating it.
    ///
    /// # Errors
    /// Returns the `serde_json` error for malformed documents.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Read, parse and validate the artefact at `path`.
    ///
    /// A missing `model_version` is replaced by the file modification time
    /// in UTC, formatted with [`MTIME_VERSION_FORMAT`].
    ///
    /// # Errors
    /// Returns [`ModelError`] when the file cannot be read, parsed or
    /// validated.
    pub fn load(path: &Utf8Path) -> Result<TrainedModel, ModelError> {
        let read_error = |source| ModelError::Read {
            path: path.to_path_buf(),
            source,
        };
        let text = waypost_fs::read_to_string(path).map_err(read_error)?;
        let mut artifact = Self::from_json(&text).map_err(|source| ModelError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if artifact.model_version.as_deref().is_none_or(|v| v.trim().is_empty()) {
            let modified = waypost_fs::modified_time(path).map_err(read_error)?;
            let stamp: DateTime<Utc> = modified.into();
            artifact.model_version = Some(stamp.format(MTIME_VERSION_FORMAT).to_string());
        }
        TrainedModel::try_from(artifact)
    }
}

impl TryFrom<ModelArtifact> for TrainedModel {
    type Error = ModelError;

    fn try_from(artifact: ModelArtifact) -> Result<Self, Self::Error> {
        let version = artifact
            .model_version
            .filter(|v| !v.trim().is_empty())
            .ok_or(ModelError::MissingVersion)?;
        let columns = resolve_columns(&artifact.feature_names)?;
        let regressor = match artifact.model {
            ModelParameters::Linear {
                intercept,
                coefficients,
            } => Regressor::Linear(linear(intercept, coefficients)?),
            ModelParameters::GradientBoosting {
                init,
                learning_rate,
                trees,
            } => Regressor::Boosted(boosted(init, learning_rate, trees)?),
        };
        if let Some(importances) = &artifact.feature_importances {
            check_aligned("feature_importances", importances.len())?;
            check_finite_all("feature_importances", importances)?;
        }
        Ok(Self::new(
            version,
            columns,
            regressor,
            artifact.metrics,
            artifact.feature_importances,
        ))
    }
}

fn resolve_columns(names: &[String]) -> Result<Vec<FeatureName>, ModelError> {
    if names.len() != FEATURE_COUNT {
        return Err(ModelError::FeatureCount {
            expected: FEATURE_COUNT,
            found: names.len(),
        });
    }
    let mut seen = BTreeSet::new();
    names
        .iter()
        .map(|raw| {
            let name: FeatureName = raw.parse().map_err(|_| ModelError::UnknownFeature {
                name: raw.clone(),
            })?;
            if seen.insert(name) {
                Ok(name)
            } else {
                Err(ModelError::DuplicateFeature { name })
            }
        })
        .collect()
}

fn check_aligned(field: &'static str, found: usize) -> Result<(), ModelError> {
    if found == FEATURE_COUNT {
        Ok(())
    } else {
        Err(ModelError::LengthMismatch {
            field,
            expected: FEATURE_COUNT,
            found,
        })
    }
}

fn check_finite(location: impl FnOnce() -> String, value: f64) -> Result<(), ModelError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ModelError::NonFiniteParameter {
            location: location(),
        })
    }
}

fn check_finite_all(field: &str, values: &[f64]) -> Result<(), ModelError> {
    values
        .iter()
        .enumerate()
        .try_for_each(|(i, &value)| check_finite(|| format!("{field}[{i}]"), value))
}

fn linear(intercept: f64, coefficients: Vec<f64>) -> Result<LinearModel, ModelError> {
    check_finite(|| "intercept".to_owned(), intercept)?;
    check_aligned("coefficients", coefficients.len())?;
    check_finite_all("coefficients", &coefficients)?;
    Ok(LinearModel {
        intercept,
        coefficients,
    })
}

fn boosted(
    init: f64,
    learning_rate: f64,
    trees: Vec<Vec<TreeNode>>,
) -> Result<GradientBoostedModel, ModelError> {
    check_finite(|| "init".to_owned(), init)?;
    check_finite(|| "learning_rate".to_owned(), learning_rate)?;
    let trees = trees
        .into_iter()
        .enumerate()
        .map(|(index, nodes)| validate_tree(index, nodes))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(GradientBoostedModel {
        init,
        learning_rate,
        trees,
    })
}

fn validate_tree(tree: usize, nodes: Vec<TreeNode>) -> Result<Tree, ModelError> {
    if nodes.is_empty() {
        return Err(ModelError::InvalidTree {
            tree,
            node: 0,
            reason: "tree has no nodes",
        });
    }
    let invalid = |node, reason| ModelError::InvalidTree { tree, node, reason };
    for (index, node) in nodes.iter().enumerate() {
        match *node {
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if feature >= FEATURE_COUNT {
                    return Err(invalid(index, "split feature index is out of range"));
                }
                check_finite(|| format!("trees[{tree}][{index}].threshold"), threshold)?;
                let forward = |child: usize| child > index && child < nodes.len();
                if !forward(left) || !forward(right) {
                    return Err(invalid(index, "children must point forward within the tree"));
                }
            }
            TreeNode::Leaf { value } => {
                check_finite(|| format!("trees[{tree}][{index}].value"), value)?;
            }
        }
    }
    Ok(Tree { nodes })
}
