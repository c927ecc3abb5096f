//! Caller-facing scoring operations.
//!
//! [`ScoringService`] wraps a [`QualityScorer`] and shapes its results into
//! serialisable responses with quality bands and improvement suggestions.
#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use waypost_core::{FeatureVector, PoiRecord};

use crate::advice::{Recommendation, recommendations};
use crate::cache::CacheStats;
use crate::error::ScoringError;
use crate::model::ModelMetadata;
use crate::quality::{QualityLevel, QualityScorer, ScoringContext, ScoringResult};

/// Response for one scored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResponse {
    /// Identifier of the scored record.
    pub record_id: String,
    /// Score in `[0, 100]`.
    pub score: f64,
    /// Confidence in the score.
    pub confidence: f64,
    /// Band of the score.
    pub quality_level: QualityLevel,
    /// Version of the model that produced the score.
    pub model_version: String,
    /// When the score was computed.
    pub timestamp: DateTime<Utc>,
    /// Feature vector, present when echoing is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<FeatureVector>,
    /// Suggested improvements.
    pub recommendations: Vec<Recommendation>,
}

impl ScoreResponse {
    fn new(result: ScoringResult, features: &FeatureVector) -> Self {
        let quality_level = result.quality_level();
        let recommendations = recommendations(features, result.quality_score);
        Self {
            record_id: result.record_id,
            score: result.quality_score,
            confidence: result.confidence,
            quality_level,
            model_version: result.model_version,
            timestamp: result.computed_at,
            features: result.features,
            recommendations,
        }
    }
}

/// Outcome of one record in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchEntry {
    /// The record was scored.
    Scored(ScoreResponse),
    /// The record was rejected.
    Failed {
        /// Position of the record in the batch.
        index: usize,
        /// Identifier of the rejected record.
        record_id: String,
        /// Why the record was rejected.
        error: String,
    },
}

impl BatchEntry {
    /// Whether the record was scored.
    #[must_use]
    pub const fn is_scored(&self) -> bool {
        matches!(self, Self::Scored(_))
    }
}

/// Scoring operations exposed to callers.
#[derive(Debug)]
pub struct ScoringService {
    scorer: QualityScorer,
}

impl ScoringService {
    /// Create a service from its dependencies.
    #[must_use]
    pub fn new(context: ScoringContext) -> Self {
        Self {
            scorer: QualityScorer::new(context),
        }
    }

    /// Underlying scorer.
    #[must_use]
    pub const fn scorer(&self) -> &QualityScorer {
        &self.scorer
    }

    /// Score one record.
    ///
    /// # Errors
    /// Returns [`ScoringError`] when the record is rejected.
    pub fn score_record(&self, record: &PoiRecord) -> Result<ScoreResponse, ScoringError> {
        let (result, features) = self.scorer.score_with_features(record)?;
        Ok(ScoreResponse::new(result, &features))
    }

    /// Score `records`, one entry per record in input order.
    #[must_use]
    pub fn score_batch(&self, records: &[PoiRecord]) -> Vec<BatchEntry> {
        self.scorer
            .score_batch_with_features(records)
            .into_iter()
            .map(|outcome| match outcome {
                Ok((result, features)) => BatchEntry::Scored(ScoreResponse::new(result, &features)),
                Err(failure) => BatchEntry::Failed {
                    index: failure.index,
                    record_id: records
                        .get(failure.index)
                        .map_or(waypost_core::UNKNOWN_RECORD_ID, PoiRecord::record_id)
                        .to_owned(),
                    error: failure.error.to_string(),
                },
            })
            .collect()
    }

    /// Description of the active model.
    #[must_use]
    pub const fn model_info(&self) -> &ModelMetadata {
        self.scorer.metadata()
    }

    /// Cache counters.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.scorer.cache_stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use rstest::{fixture, rstest};
    use serde_json::json;
    use waypost_core::test_support::ConstantModel;

    #[fixture]
    fn service() -> ScoringService {
        ScoringService::new(ScoringContext::new(Arc::new(ConstantModel::new("svc-1", 85.0))))
    }

    #[rstest]
    fn responses_carry_level_and_advice(service: ScoringService) {
        let record = PoiRecord {
            id: Some("poi_7".to_owned()),
            name: Some("Lac Blanc".to_owned()),
            ..PoiRecord::default()
        };
        let response = service.score_record(&record).expect("scored");
        assert_eq!(response.quality_level, QualityLevel::Excellent);
        assert_eq!(response.model_version, "svc-1");
        assert!(!response.recommendations.contains(&Recommendation::AddName));
        assert!(response.recommendations.contains(&Recommendation::AddDescription));
        assert_eq!(
            response.recommendations.last(),
            Some(&Recommendation::MaintainQuality)
        );
    }

    #[rstest]
    fn failed_batch_entries_serialise_with_status(service: ScoringService) {
        let broken = PoiRecord {
            id: Some("half".to_owned()),
            longitude: Some(6.8),
            ..PoiRecord::default()
        };
        let entries = service.score_batch(&[PoiRecord::default(), broken]);
        assert!(entries.first().is_some_and(BatchEntry::is_scored));
        let second = entries.get(1).expect("second entry");
        let failed = serde_json::to_value(second).expect("serialise");
        assert_eq!(failed.get("status"), Some(&json!("failed")));
        assert_eq!(failed.get("index"), Some(&json!(1)));
        assert_eq!(failed.get("record_id"), Some(&json!("half")));
    }

    #[rstest]
    fn model_info_reports_custom_models(service: ScoringService) {
        let info = service.model_info();
        assert_eq!(info.model_version, "svc-1");
        assert_eq!(info.model_kind, "custom");
        assert_eq!(info.feature_count, 17);
    }
}
