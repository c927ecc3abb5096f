//! Facade crate for the Waypost record quality engine.
//!
//! This crate re-exports the core domain types and, behind the `scorer`
//! feature, the model loading, caching and scoring service.

#![forbid(unsafe_code)]

pub use waypost_core::{
    Clock, Coordinates, FEATURE_COUNT, FeatureCategory, FeatureExtractor, FeatureName,
    FeatureVector, PoiRecord, ReferenceTable, ScoringModel, SpatialContext,
    SpatialContextProvider, SystemClock, ValidationError,
};

#[cfg(feature = "scorer")]
pub use waypost_scorer::{
    BatchEntry, CacheStats, ModelArtifact, ModelMetadata, QualityLevel, QualityScorer,
    Recommendation, ScoreResponse, ScorerConfig, ScoringContext, ScoringError, ScoringResult,
    ScoringService, TrainedModel,
};
