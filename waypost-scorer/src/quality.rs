//! Scoring of individual records and batches.
//!
//! [`QualityScorer`] owns everything a scoring call needs: the model, the
//! reference context, the result cache and the clock. Nothing is global, so
//! several scorers with different models can live in one process.
#![forbid(unsafe_code)]

use std::fmt;
use std::iter;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use waypost_core::{
    Clock, FeatureExtractor, FeatureName, FeatureVector, PoiRecord, ScoringModel,
    SpatialContextProvider, SystemClock, ValidationError, sanitise_score,
};

use crate::cache::{CacheStats, Fingerprint, ResultCache};
use crate::config::ScorerConfig;
use crate::error::{BatchItemError, ScoringError};
use crate::model::{ModelMetadata, TrainedModel};

/// Lowest confidence ever reported.
pub const CONFIDENCE_FLOOR: f64 = 0.5;

/// Highest confidence ever reported.
pub const CONFIDENCE_CEILING: f64 = 0.95;

const CONFIDENCE_WEIGHT: f64 = 0.4;

const CONFIDENCE_FLAGS: [FeatureName; 5] = [
    FeatureName::HasName,
    FeatureName::HasDescription,
    FeatureName::HasGps,
    FeatureName::HasAddress,
    FeatureName::HasImages,
];

/// Confidence in a score given the completeness of its record.
///
/// `0.5 + 0.4 * mean(flags)` over name, description, GPS, address and
/// images, clamped to [`CONFIDENCE_FLOOR`]..=[`CONFIDENCE_CEILING`].
#[must_use]
#[expect(clippy::float_arithmetic, reason = "confidence is a weighted mean")]
pub fn confidence(features: &FeatureVector) -> f64 {
    let sum: f64 = CONFIDENCE_FLAGS.iter().map(|&name| features.get(name)).sum();
    let mean = sum / 5.0;
    CONFIDENCE_WEIGHT
        .mul_add(mean, CONFIDENCE_FLOOR)
        .clamp(CONFIDENCE_FLOOR, CONFIDENCE_CEILING)
}

/// Coarse banding of a quality score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    /// Below 40.
    Low,
    /// 40 up to 60.
    Medium,
    /// 60 up to 80.
    Good,
    /// 80 and above.
    Excellent,
}

impl QualityLevel {
    /// Band for `score`.
    ///
    /// # Examples
    ///
    /// ```
    /// use waypost_scorer::QualityLevel;
    ///
    /// assert_eq!(QualityLevel::from_score(80.0), QualityLevel::Excellent);
    /// assert_eq!(QualityLevel::from_score(79.9), QualityLevel::Good);
    /// assert_eq!(QualityLevel::from_score(0.0), QualityLevel::Low);
    /// ```
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Self::Excellent
        } else if score >= 60.0 {
            Self::Good
        } else if score >= 40.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Lower-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::Good => "good",
            Self::Excellent => "excellent",
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of scoring one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    /// Identifier of the scored record.
    pub record_id: String,
    /// Score in `[0, 100]`.
    pub quality_score: f64,
    /// Confidence in `[0.5, 0.95]`.
    pub confidence: f64,
    /// Feature vector, present when echoing is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<FeatureVector>,
    /// When the score was computed.
    pub computed_at: DateTime<Utc>,
    /// Version of the model that produced the score.
    pub model_version: String,
}

impl ScoringResult {
    /// Band of [`Self::quality_score`].
    #[must_use]
    pub fn quality_level(&self) -> QualityLevel {
        QualityLevel::from_score(self.quality_score)
    }
}

/// Dependencies of a [`QualityScorer`].
///
/// Build one with [`ScoringContext::new`] or [`ScoringContext::for_trained`]
/// and refine it with the `with_*` methods.
pub struct ScoringContext {
    model: Arc<dyn ScoringModel>,
    metadata: ModelMetadata,
    provider: Option<Arc<SpatialContextProvider>>,
    cache: ResultCache,
    clock: Arc<dyn Clock>,
    config: ScorerConfig,
}

impl fmt::Debug for ScoringContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScoringContext")
            .field("model_version", &self.metadata.model_version)
            .field("provider", &self.provider.is_some())
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ScoringContext {
    /// Context for an arbitrary model with default configuration.
    ///
    /// Uses the system clock, an in-memory cache sized by the default
    /// configuration and no reference context.
    #[must_use]
    pub fn new(model: Arc<dyn ScoringModel>) -> Self {
        let metadata = ModelMetadata::for_model(model.as_ref());
        let config = ScorerConfig::default();
        Self {
            model,
            metadata,
            provider: None,
            cache: ResultCache::memory(config.cache_capacity),
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Context for a model loaded from an artefact, keeping its metadata.
    #[must_use]
    pub fn for_trained(model: TrainedModel) -> Self {
        let metadata = model.metadata();
        Self {
            metadata,
            ..Self::new(Arc::new(model))
        }
    }

    /// Enrich records from `provider`.
    ///
    /// Regions are searched within [`ScorerConfig::region_fallback_km`] and
    /// nearby records within [`ScorerConfig::nearby_radius_km`], whatever the
    /// provider's own fallback radius.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<SpatialContextProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Replace the result cache.
    #[must_use]
    pub fn with_cache(mut self, cache: ResultCache) -> Self {
        self.cache = cache;
        self
    }

    /// Replace the clock used for freshness and timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Apply `config`, resizing the in-memory cache to match.
    ///
    /// A capacity of zero disables caching. Call [`Self::with_cache`]
    /// afterwards to attach a different backend.
    #[must_use]
    pub fn with_config(mut self, config: ScorerConfig) -> Self {
        self.cache = if config.cache_capacity == 0 {
            ResultCache::disabled()
        } else {
            ResultCache::memory(config.cache_capacity)
        };
        self.config = config;
        self
    }
}

/// Scores records against a model.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use waypost_core::PoiRecord;
/// use waypost_core::test_support::ConstantModel;
/// use waypost_scorer::{QualityScorer, ScoringContext};
///
/// let scorer = QualityScorer::new(ScoringContext::new(Arc::new(ConstantModel::new("v1", 72.0))));
/// let record = PoiRecord {
///     id: Some("poi_9".to_owned()),
///     name: Some("Col de la Croix".to_owned()),
///     ..PoiRecord::default()
/// };
/// let result = scorer.score(&record).expect("valid record");
/// assert_eq!(result.record_id, "poi_9");
/// assert_eq!(result.quality_score, 72.0);
/// assert_eq!(result.model_version, "v1");
/// ```
pub struct QualityScorer {
    model: Arc<dyn ScoringModel>,
    metadata: ModelMetadata,
    provider: Option<Arc<SpatialContextProvider>>,
    extractor: FeatureExtractor,
    cache: ResultCache,
    config: ScorerConfig,
}

impl fmt::Debug for QualityScorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QualityScorer")
            .field("model_version", &self.metadata.model_version)
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl QualityScorer {
    /// Create a scorer from its dependencies.
    #[must_use]
    pub fn new(context: ScoringContext) -> Self {
        let ScoringContext {
            model,
            metadata,
            provider,
            cache,
            clock,
            config,
        } = context;
        Self {
            model,
            metadata,
            provider,
            extractor: FeatureExtractor::new(clock),
            cache,
            config,
        }
    }

    /// Description of the active model.
    #[must_use]
    pub const fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &ScorerConfig {
        &self.config
    }

    /// Cache counters.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop every cached result.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Score one record.
    ///
    /// # Errors
    /// Returns [`ScoringError::Validation`] for malformed coordinates, or for
    /// missing ones when coordinates are required.
    pub fn score(&self, record: &PoiRecord) -> Result<ScoringResult, ScoringError> {
        self.score_with_features(record).map(|(result, _)| result)
    }

    /// Score `records`, returning one outcome per record in input order.
    ///
    /// Extraction runs in parallel. Records missing from the cache are
    /// predicted in a single model call. A failing record never affects the
    /// others.
    #[must_use]
    pub fn score_batch(
        &self,
        records: &[PoiRecord],
    ) -> Vec<Result<ScoringResult, BatchItemError>> {
        self.score_batch_with_features(records)
            .into_iter()
            .map(|outcome| outcome.map(|(result, _)| result))
            .collect()
    }

    pub(crate) fn score_with_features(
        &self,
        record: &PoiRecord,
    ) -> Result<(ScoringResult, FeatureVector), ScoringError> {
        let features = self.features(record)?;
        let key = Fingerprint::new(&features, self.model.version());
        if let Some(hit) = self.cache.get(&key) {
            debug!("record {} served from cache ({key})", record.record_id());
            return Ok((self.rebind(hit, record, features), features));
        }
        let raw = self.model.predict(&features);
        Ok((self.finish(record, features, raw, key), features))
    }

    pub(crate) fn score_batch_with_features(
        &self,
        records: &[PoiRecord],
    ) -> Vec<Result<(ScoringResult, FeatureVector), BatchItemError>> {
        let version = self.model.version();
        let prepared: Vec<Result<(FeatureVector, Fingerprint), ScoringError>> = records
            .par_iter()
            .map(|record| -> Result<_, ScoringError> {
                let features = self.features(record)?;
                Ok((features, Fingerprint::new(&features, version)))
            })
            .collect();

        let mut slots = Vec::with_capacity(records.len());
        let mut pending = Vec::new();
        for (index, (record, outcome)) in records.iter().zip(prepared).enumerate() {
            match outcome {
                Err(error) => slots.push(Some(Err(BatchItemError { index, error }))),
                Ok((features, key)) => match self.cache.get(&key) {
                    Some(hit) => {
                        let result = self.rebind(hit, record, features);
                        slots.push(Some(Ok((result, features))));
                    }
                    None => {
                        pending.push((index, record, features, key));
                        slots.push(None);
                    }
                },
            }
        }

        if !pending.is_empty() {
            let inputs: Vec<FeatureVector> = pending
                .iter()
                .map(|&(_, _, features, _)| features)
                .collect();
            let predictions = self.model.predict_batch(&inputs);
            if predictions.len() != inputs.len() {
                warn!(
                    "model {version} returned {} predictions for {} records",
                    predictions.len(),
                    inputs.len()
                );
            }
            // Missing predictions count as non-finite and score zero.
            let padded = predictions.into_iter().chain(iter::repeat(f64::NAN));
            for ((index, record, features, key), raw) in pending.into_iter().zip(padded) {
                if let Some(slot) = slots.get_mut(index) {
                    *slot = Some(Ok((self.finish(record, features, raw, key), features)));
                }
            }
        }

        // Every slot is filled above.
        slots.into_iter().flatten().collect()
    }

    fn features(&self, record: &PoiRecord) -> Result<FeatureVector, ScoringError> {
        let coordinates = record.coordinates()?;
        let context = match (coordinates, self.provider.as_deref()) {
            (None, _) if self.config.require_coordinates => {
                return Err(ValidationError::MissingCoordinates.into());
            }
            (Some(at), Some(provider)) => Some(provider.enrich_within(
                at,
                self.config.nearby_radius_km,
                self.config.region_fallback_km,
                record.id.as_deref(),
            )),
            _ => None,
        };
        Ok(self.extractor.extract(record, context.as_ref())?)
    }

    fn rebind(
        &self,
        mut hit: ScoringResult,
        record: &PoiRecord,
        features: FeatureVector,
    ) -> ScoringResult {
        record.record_id().clone_into(&mut hit.record_id);
        hit.features = self.config.echo_features.then_some(features);
        hit
    }

    fn finish(
        &self,
        record: &PoiRecord,
        features: FeatureVector,
        raw: f64,
        key: Fingerprint,
    ) -> ScoringResult {
        if !raw.is_finite() {
            warn!(
                "model {} produced {raw} for record {}; reporting 0",
                self.model.version(),
                record.record_id()
            );
        }
        let result = ScoringResult {
            record_id: record.record_id().to_owned(),
            quality_score: sanitise_score(raw),
            confidence: confidence(&features),
            features: self.config.echo_features.then_some(features),
            computed_at: self.extractor.clock().now(),
            model_version: self.model.version().to_owned(),
        };
        self.cache.put(key, &result, self.config.cache_ttl());
        result
    }
}
