//! Validated regressors and the metadata they expose.
#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use waypost_core::{FeatureName, FeatureVector, ScoringModel};

use crate::artifact::TreeNode;

/// Linear regression over artefact columns.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    pub(crate) intercept: f64,
    pub(crate) coefficients: Vec<f64>,
}

impl LinearModel {
    #[expect(clippy::float_arithmetic, reason = "dot product")]
    fn predict(&self, row: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(row)
                .map(|(weight, value)| weight * value)
                .sum::<f64>()
    }
}

/// A regression tree whose children always point forward.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    pub(crate) nodes: Vec<TreeNode>,
}

impl Tree {
    fn predict(&self, row: &[f64]) -> f64 {
        let mut at = 0;
        // Forward-only children bound the walk by the node count.
        while let Some(node) = self.nodes.get(at) {
            match *node {
                TreeNode::Leaf { value } => return value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = row.get(feature).copied().unwrap_or_default();
                    at = if value <= threshold { left } else { right };
                }
            }
        }
        0.0
    }
}

/// Gradient-boosted ensemble of regression trees.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientBoostedModel {
    pub(crate) init: f64,
    pub(crate) learning_rate: f64,
    pub(crate) trees: Vec<Tree>,
}

impl GradientBoostedModel {
    #[expect(clippy::float_arithmetic, reason = "boosting sums shrunken tree outputs")]
    fn predict(&self, row: &[f64]) -> f64 {
        let boost: f64 = self.trees.iter().map(|tree| tree.predict(row)).sum();
        self.init + self.learning_rate * boost
    }
}

/// Regressor family of a [`TrainedModel`].
#[derive(Debug, Clone, PartialEq)]
pub enum Regressor {
    /// Linear regression.
    Linear(LinearModel),
    /// Gradient-boosted trees.
    Boosted(GradientBoostedModel),
}

impl Regressor {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Linear(_) => "linear",
            Self::Boosted(_) => "gradient_boosting",
        }
    }
}

/// A validated model loaded from an artefact.
///
/// Construct one with [`ModelArtifact::load`](crate::ModelArtifact::load) or
/// `TrainedModel::try_from(artifact)`.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedModel {
    version: String,
    columns: Vec<FeatureName>,
    regressor: Regressor,
    metrics: BTreeMap<String, f64>,
    importances: Option<Vec<f64>>,
}

impl TrainedModel {
    pub(crate) const fn new(
        version: String,
        columns: Vec<FeatureName>,
        regressor: Regressor,
        metrics: BTreeMap<String, f64>,
        importances: Option<Vec<f64>>,
    ) -> Self {
        Self {
            version,
            columns,
            regressor,
            metrics,
            importances,
        }
    }

    /// Features in the column order the model was trained with.
    #[must_use]
    pub fn columns(&self) -> &[FeatureName] {
        &self.columns
    }

    /// Describe the model for callers and operators.
    #[must_use]
    pub fn metadata(&self) -> ModelMetadata {
        let feature_importances = self
            .importances
            .as_ref()
            .map(|values| {
                self.columns
                    .iter()
                    .zip(values)
                    .map(|(&feature, &importance)| FeatureImportance {
                        feature,
                        importance,
                    })
                    .collect()
            })
            .unwrap_or_default();
        ModelMetadata {
            model_version: self.version.clone(),
            model_kind: self.regressor.kind().to_owned(),
            feature_count: self.columns.len(),
            features: self.columns.clone(),
            metrics: self.metrics.clone(),
            feature_importances,
        }
    }

    fn row(&self, features: &FeatureVector) -> Vec<f64> {
        self.columns.iter().map(|&name| features.get(name)).collect()
    }
}

impl ScoringModel for TrainedModel {
    fn version(&self) -> &str {
        &self.version
    }

    fn predict(&self, features: &FeatureVector) -> f64 {
        let row = self.row(features);
        match &self.regressor {
            Regressor::Linear(model) => model.predict(&row),
            Regressor::Boosted(model) => model.predict(&row),
        }
    }
}

/// Importance of a single feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    /// Feature name.
    pub feature: FeatureName,
    /// Importance recorded at training time.
    pub importance: f64,
}

/// Description of the active model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Version identifier.
    pub model_version: String,
    /// Regressor family, such as `linear` or `gradient_boosting`.
    pub model_kind: String,
    /// Number of input features.
    pub feature_count: usize,
    /// Input features in model column order.
    pub features: Vec<FeatureName>,
    /// Evaluation metrics recorded at training time.
    pub metrics: BTreeMap<String, f64>,
    /// Per-feature importances, empty when the artefact has none.
    pub feature_importances: Vec<FeatureImportance>,
}

impl ModelMetadata {
    /// Minimal metadata for a model that was not loaded from an artefact.
    #[must_use]
    pub fn for_model(model: &dyn ScoringModel) -> Self {
        Self {
            model_version: model.version().to_owned(),
            model_kind: "custom".to_owned(),
            feature_count: FeatureName::ALL.len(),
            features: FeatureName::ALL.to_vec(),
            metrics: BTreeMap::new(),
            feature_importances: Vec::new(),
        }
    }

    /// The `n` most important features, highest first.
    ///
    /// Ties keep column order.
    #[must_use]
    pub fn top_features(&self, n: usize) -> Vec<FeatureImportance> {
        let mut ranked = self.feature_importances.clone();
        ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        ranked.truncate(n);
        ranked
    }
}
