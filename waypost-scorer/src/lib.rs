//! Model loading, caching and scoring for Waypost records.
//!
//! The crate provides three layers:
//! - **Model artefacts** are JSON documents describing a linear regression or
//!   a gradient-boosted tree ensemble. [`ModelArtifact::load`] validates an
//!   artefact against the engine's feature set and yields a [`TrainedModel`]
//!   implementing [`ScoringModel`](waypost_core::ScoringModel).
//! - **Scoring** through [`QualityScorer`] extracts features, consults a
//!   [`ResultCache`] keyed by feature [`Fingerprint`]s and predicts on miss.
//!   Batches extract in parallel and predict misses in one model call.
//! - **The service boundary** [`ScoringService`] adds quality bands and
//!   [`Recommendation`]s and reports model metadata and cache counters.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use camino::Utf8Path;
//! use waypost_core::{PoiRecord, SpatialContextProvider, ReferenceTable};
//! use waypost_scorer::{ModelArtifact, ScoringContext, ScoringService};
//!
//! let model = ModelArtifact::load(Utf8Path::new("artifacts/model.json")).expect("load model");
//! let provider = SpatialContextProvider::from_table(ReferenceTable::default());
//! let service = ScoringService::new(
//!     ScoringContext::for_trained(model).with_provider(Arc::new(provider)),
//! );
//! let response = service.score_record(&PoiRecord::default()).expect("score record");
//! println!("{} scored {:.1}", response.record_id, response.score);
//! ```

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod advice;
mod artifact;
mod cache;
mod config;
mod error;
mod model;
mod quality;
mod service;

pub use advice::{DESCRIPTION_TARGET_CHARS, Recommendation, recommendations};
pub use artifact::{MTIME_VERSION_FORMAT, ModelArtifact, ModelParameters, TreeNode};
pub use cache::{
    CacheBackend, CacheStats, DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL, Fingerprint, MemoryCache,
    ResultCache,
};
pub use config::{ConfigError, ScorerConfig};
pub use error::{BatchItemError, CacheError, ModelError, ScoringError};
pub use model::{
    FeatureImportance, GradientBoostedModel, LinearModel, ModelMetadata, Regressor, TrainedModel,
    Tree,
};
pub use quality::{
    CONFIDENCE_CEILING, CONFIDENCE_FLOOR, QualityLevel, QualityScorer, ScoringContext,
    ScoringResult, confidence,
};
pub use service::{BatchEntry, ScoreResponse, ScoringService};
