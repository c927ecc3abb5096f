//! Deterministic models and reference data for unit and behaviour tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{FeatureCategory, FeatureVector, KnownRecord, ReferenceTable, Region, ScoringModel};

/// Model returning the same raw score for every vector.
#[derive(Debug, Clone)]
pub struct ConstantModel {
    version: String,
    score: f64,
}

impl ConstantModel {
    /// Create a model reporting `score` under `version`.
    #[must_use]
    pub fn new(version: impl Into<String>, score: f64) -> Self {
        Self {
            version: version.into(),
            score,
        }
    }
}

impl ScoringModel for ConstantModel {
    fn version(&self) -> &str {
        &self.version
    }

    fn predict(&self, _features: &FeatureVector) -> f64 {
        self.score
    }
}

/// Model scoring the share of completeness flags that are set, times 100.
///
/// Counts every call to [`ScoringModel::predict`] and
/// [`ScoringModel::predict_batch`] so tests can observe cache behaviour.
#[derive(Debug, Default)]
pub struct CompletenessModel {
    predictions: AtomicUsize,
    batches: AtomicUsize,
}

impl CompletenessModel {
    /// Version string reported by this model.
    pub const VERSION: &'static str = "completeness-test";

    /// Vectors evaluated so far.
    #[must_use]
    pub fn predictions(&self) -> usize {
        self.predictions.load(Ordering::SeqCst)
    }

    /// Calls to `predict_batch` so far.
    #[must_use]
    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    #[expect(
        clippy::float_arithmetic,
        reason = "test model averages completeness flags"
    )]
    fn evaluate(features: &FeatureVector) -> f64 {
        let (sum, count) = features
            .category(FeatureCategory::Completeness)
            .fold((0.0, 0.0), |(sum, count), (_, value)| (sum + value, count + 1.0));
        if count > 0.0 { 100.0 * sum / count } else { 0.0 }
    }
}

impl ScoringModel for CompletenessModel {
    fn version(&self) -> &str {
        Self::VERSION
    }

    fn predict(&self, features: &FeatureVector) -> f64 {
        self.predictions.fetch_add(1, Ordering::SeqCst);
        Self::evaluate(features)
    }

    fn predict_batch(&self, batch: &[FeatureVector]) -> Vec<f64> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        self.predictions.fetch_add(batch.len(), Ordering::SeqCst);
        batch.iter().map(Self::evaluate).collect()
    }
}

/// Small reference table around the Chamonix valley.
#[must_use]
pub fn alpine_reference_table() -> ReferenceTable {
    ReferenceTable {
        regions: vec![
            Region {
                region_id: "74056".to_owned(),
                centroid_lat: 45.923,
                centroid_lon: 6.869,
                median_salary: 2_450.0,
                population: 8_600.0,
            },
            Region {
                region_id: "74143".to_owned(),
                centroid_lat: 45.900,
                centroid_lon: 6.700,
                median_salary: 2_250.0,
                population: 6_100.0,
            },
        ],
        records: vec![
            KnownRecord {
                id: "poi_001".to_owned(),
                latitude: 45.8500,
                longitude: 6.8300,
            },
            KnownRecord {
                id: "poi_002".to_owned(),
                latitude: 45.8600,
                longitude: 6.8400,
            },
            KnownRecord {
                id: "poi_003".to_owned(),
                latitude: 45.8800,
                longitude: 6.8800,
            },
        ],
    }
}
