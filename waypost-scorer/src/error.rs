//! Error types raised while loading models and scoring records.
#![forbid(unsafe_code)]

use camino::Utf8PathBuf;
use thiserror::Error;
use waypost_core::{ExtractionError, FeatureName, FeatureVectorError, ValidationError};

/// Errors raised while loading or validating a model artefact.
///
/// All variants are fatal at start-up: a service never runs with a model
/// that failed validation.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Reading the artefact from disk failed.
    #[error("failed to read model artefact at {path}")]
    Read {
        /// Artefact location.
        path: Utf8PathBuf,
        /// Source error from std I/O.
        #[source]
        source: std::io::Error,
    },
    /// The artefact is not valid JSON or does not match the schema.
    #[error("failed to parse model artefact at {path}")]
    Parse {
        /// Artefact location.
        path: Utf8PathBuf,
        /// Source error from `serde_json`.
        #[source]
        source: serde_json::Error,
    },
    /// The artefact names the wrong number of features.
    #[error("model expects {found} features; the engine produces {expected}")]
    FeatureCount {
        /// Features produced by extraction.
        expected: usize,
        /// Features listed by the artefact.
        found: usize,
    },
    /// The artefact lists a feature the engine does not produce.
    #[error("model lists unknown feature {name:?}")]
    UnknownFeature {
        /// Name found in the artefact.
        name: String,
    },
    /// The artefact lists a feature more than once.
    #[error("model lists feature {name} more than once")]
    DuplicateFeature {
        /// Repeated feature.
        name: FeatureName,
    },
    /// A per-feature parameter list does not match the feature list.
    #[error("model {field} has {found} entries; expected {expected}")]
    LengthMismatch {
        /// Parameter list that is misaligned.
        field: &'static str,
        /// Number of features.
        expected: usize,
        /// Number of entries supplied.
        found: usize,
    },
    /// A numeric parameter is NaN or infinite.
    #[error("model parameter {location} is not finite")]
    NonFiniteParameter {
        /// Human-readable location of the parameter.
        location: String,
    },
    /// A decision tree is structurally invalid.
    #[error("tree {tree} node {node} is invalid: {reason}")]
    InvalidTree {
        /// Index of the tree within the ensemble.
        tree: usize,
        /// Index of the node within the tree.
        node: usize,
        /// What is wrong with the node.
        reason: &'static str,
    },
    /// The artefact carries no usable `model_version`.
    #[error("model artefact has no model_version")]
    MissingVersion,
}

/// Errors returned for a single scoring request.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScoringError {
    /// The record was rejected before scoring.
    #[error("invalid record: {0}")]
    Validation(#[from] ValidationError),
    /// Feature extraction produced an incomplete vector.
    #[error("internal scoring defect: {0}")]
    Defect(#[from] FeatureVectorError),
}

impl From<ExtractionError> for ScoringError {
    fn from(error: ExtractionError) -> Self {
        match error {
            ExtractionError::Validation(source) => Self::Validation(source),
            ExtractionError::Defect(source) => Self::Defect(source),
        }
    }
}

/// Failure of one record within a batch.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("record {index}: {error}")]
pub struct BatchItemError {
    /// Position of the record in the submitted batch.
    pub index: usize,
    /// Why the record failed.
    #[source]
    pub error: ScoringError,
}

/// Errors raised by a cache backend.
///
/// These never reach callers of the scorer; the cache logs them and falls
/// back to direct computation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// The backend cannot be reached.
    #[error("cache backend unavailable: {reason}")]
    Unavailable {
        /// Backend-specific description.
        reason: String,
    },
    /// A stored entry could not be decoded.
    #[error("cache entry {key} is corrupt: {reason}")]
    Corrupt {
        /// Hex fingerprint of the entry.
        key: String,
        /// Backend-specific description.
        reason: String,
    },
}
