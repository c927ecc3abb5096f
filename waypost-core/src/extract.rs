//! Reduction of raw records to [`FeatureVector`]s.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use log::error;
use serde_json::Value;
use thiserror::Error;

use crate::clock::{Clock, SystemClock};
use crate::context::{
    DEFAULT_MEDIAN_SALARY, DEFAULT_NEARBY_COUNT, DEFAULT_POPULATION, SpatialContext,
};
use crate::features::{FeatureName, FeatureVector, FeatureVectorBuilder, FeatureVectorError};
use crate::record::{Coordinates, PoiRecord, ValidationError, is_present};

/// Age assigned to records with a missing or unreadable update timestamp.
pub const MISSING_UPDATE_DAYS: f64 = 365.0;

/// Records updated at most this many days ago count as recent.
pub const RECENT_WINDOW_DAYS: f64 = 180.0;

const NAIVE_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Failure to extract features from a record.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExtractionError {
    /// The record itself is invalid.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Extraction produced an incomplete vector. This is a bug.
    #[error("feature extraction defect: {0}")]
    Defect(#[from] FeatureVectorError),
}

/// Turns records into feature vectors.
///
/// Extraction is a pure function of the record, the optional context and the
/// clock's current instant.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use chrono::{TimeZone, Utc};
/// use waypost_core::{FeatureExtractor, FeatureName, FixedClock, PoiRecord};
///
/// let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
/// let extractor = FeatureExtractor::new(Arc::new(FixedClock::new(now)));
/// let record = PoiRecord {
///     name: Some("Summit Refuge".into()),
///     updated_at: Some("2025-05-01".into()),
///     ..PoiRecord::default()
/// };
/// let features = extractor.extract(&record, None).expect("valid record");
/// assert_eq!(features.get(FeatureName::HasName), 1.0);
/// assert_eq!(features.get(FeatureName::DaysSinceUpdate), 31.0);
/// assert_eq!(features.get(FeatureName::IsRecent), 1.0);
/// ```
#[derive(Clone)]
pub struct FeatureExtractor {
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for FeatureExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureExtractor").finish_non_exhaustive()
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl FeatureExtractor {
    /// Create an extractor reading "now" from `clock`.
    #[must_use]
    pub const fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// The clock this extractor uses.
    #[must_use]
    pub const fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Extract all 17 features from `record`.
    ///
    /// `context` supplies enrichment values; record overrides take precedence
    /// and fixed defaults fill any remaining gap.
    ///
    /// # Errors
    /// Returns [`ExtractionError::Validation`] for partial or out-of-range
    /// coordinates and [`ExtractionError::Defect`] if the vector cannot be
    /// completed.
    pub fn extract(
        &self,
        record: &PoiRecord,
        context: Option<&SpatialContext>,
    ) -> Result<FeatureVector, ExtractionError> {
        let coordinates = record.coordinates()?;
        let mut builder = FeatureVectorBuilder::new();
        completeness(&mut builder, record, coordinates);
        richness(&mut builder, record);
        spatial(&mut builder, record, coordinates, context);
        freshness(&mut builder, record.updated_at.as_deref(), self.clock.now());
        builder.build().map_err(|defect| {
            error!("record {}: {defect}", record.record_id());
            ExtractionError::Defect(defect)
        })
    }
}

fn completeness(builder: &mut FeatureVectorBuilder, record: &PoiRecord, gps: Option<Coordinates>) {
    builder
        .flag(FeatureName::HasName, is_present(record.name.as_deref()))
        .flag(FeatureName::HasDescription, is_present(record.description.as_deref()))
        .flag(FeatureName::HasGps, gps.is_some())
        .flag(FeatureName::HasAddress, is_present(record.address.as_deref()))
        .flag(FeatureName::HasImages, has_images(record))
        .flag(
            FeatureName::HasOpeningHours,
            record.opening_hours.as_ref().is_some_and(opening_hours_present),
        )
        .flag(
            FeatureName::HasContact,
            is_present(record.phone.as_deref()) || is_present(record.email.as_deref()),
        );
}

fn richness(builder: &mut FeatureVectorBuilder, record: &PoiRecord) {
    let description_length = record
        .description
        .as_deref()
        .map_or(0, |text| text.chars().count());
    builder
        .set(FeatureName::DescriptionLength, count_to_f64(description_length))
        .set(FeatureName::NumImages, f64::from(image_count(record)))
        .flag(FeatureName::HasWebsite, is_present(record.website.as_deref()));
}

fn spatial(
    builder: &mut FeatureVectorBuilder,
    record: &PoiRecord,
    gps: Option<Coordinates>,
    context: Option<&SpatialContext>,
) {
    let pick = |own: Option<f64>, enriched: Option<f64>, default: f64| {
        own.filter(|v| v.is_finite()).or(enriched).unwrap_or(default)
    };
    builder
        .set(FeatureName::Latitude, gps.map_or(0.0, Coordinates::latitude))
        .set(FeatureName::Longitude, gps.map_or(0.0, Coordinates::longitude))
        .set(
            FeatureName::MedianSalary,
            pick(record.median_salary, context.map(|c| c.median_salary), DEFAULT_MEDIAN_SALARY),
        )
        .set(
            FeatureName::Population,
            pick(record.population, context.map(|c| c.population), DEFAULT_POPULATION),
        )
        .set(
            FeatureName::NearbyCount,
            pick(record.nearby_count, context.map(|c| c.nearby_count), DEFAULT_NEARBY_COUNT),
        );
}

fn freshness(builder: &mut FeatureVectorBuilder, updated_at: Option<&str>, now: DateTime<Utc>) {
    let days = updated_at
        .and_then(parse_timestamp)
        .map_or(MISSING_UPDATE_DAYS, |at| days_between(at, now));
    builder
        .set(FeatureName::DaysSinceUpdate, days)
        .flag(FeatureName::IsRecent, days <= RECENT_WINDOW_DAYS);
}

fn has_images(record: &PoiRecord) -> bool {
    record.num_images.is_some_and(|n| n > 0)
        || record.images.iter().any(|image| !image.trim().is_empty())
}

fn image_count(record: &PoiRecord) -> u32 {
    record.num_images.unwrap_or_else(|| {
        let listed = record
            .images
            .iter()
            .filter(|image| !image.trim().is_empty())
            .count();
        u32::try_from(listed).unwrap_or(u32::MAX)
    })
}

fn opening_hours_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(open) => *open,
        Value::Number(_) => true,
        Value::String(text) => !text.trim().is_empty(),
        Value::Array(periods) => !periods.is_empty(),
        Value::Object(days) => !days.is_empty(),
    }
}

fn count_to_f64(count: usize) -> f64 {
    f64::from(u32::try_from(count).unwrap_or(u32::MAX))
}

/// Whole days from `then` to `now`, floored and never negative.
fn days_between(then: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let days = now.signed_duration_since(then).num_days().max(0);
    f64::from(i32::try_from(days).unwrap_or(i32::MAX))
}

/// Parse an update timestamp in any accepted form. Naive values are UTC.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let text = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Some(parsed) = NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
    {
        return Some(parsed.and_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FEATURE_COUNT;
    use crate::clock::FixedClock;
    use crate::context::ContextSource;
    use chrono::{Duration, TimeZone};
    use rstest::{fixture, rstest};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0)
            .single()
            .expect("valid instant")
    }

    #[fixture]
    fn extractor() -> FeatureExtractor {
        FeatureExtractor::new(Arc::new(FixedClock::new(now())))
    }

    #[rstest]
    fn empty_record_uses_every_default(extractor: FeatureExtractor) {
        let features = extractor
            .extract(&PoiRecord::default(), None)
            .expect("empty record");
        assert_eq!(features.iter().count(), FEATURE_COUNT);
        assert_eq!(features.get(FeatureName::HasName), 0.0);
        assert_eq!(features.get(FeatureName::Latitude), 0.0);
        assert_eq!(features.get(FeatureName::MedianSalary), DEFAULT_MEDIAN_SALARY);
        assert_eq!(features.get(FeatureName::Population), DEFAULT_POPULATION);
        assert_eq!(features.get(FeatureName::NearbyCount), DEFAULT_NEARBY_COUNT);
        assert_eq!(features.get(FeatureName::DaysSinceUpdate), MISSING_UPDATE_DAYS);
        assert_eq!(features.get(FeatureName::IsRecent), 0.0);
    }

    #[rstest]
    #[case("   ")]
    #[case("\t\n")]
    #[case("")]
    fn whitespace_only_strings_are_absent(extractor: FeatureExtractor, #[case] blank: &str) {
        let record = PoiRecord {
            name: Some(blank.to_owned()),
            address: Some(blank.to_owned()),
            website: Some(blank.to_owned()),
            phone: Some(blank.to_owned()),
            ..PoiRecord::default()
        };
        let features = extractor.extract(&record, None).expect("record");
        for name in [
            FeatureName::HasName,
            FeatureName::HasAddress,
            FeatureName::HasWebsite,
            FeatureName::HasContact,
        ] {
            assert_eq!(features.get(name), 0.0, "{name}");
        }
    }

    #[rstest]
    fn description_length_counts_raw_characters(extractor: FeatureExtractor) {
        let record = PoiRecord {
            description: Some("  Refuge d'été ".to_owned()),
            ..PoiRecord::default()
        };
        let features = extractor.extract(&record, None).expect("record");
        assert_eq!(features.get(FeatureName::DescriptionLength), 15.0);
        assert_eq!(features.get(FeatureName::HasDescription), 1.0);
    }

    #[rstest]
    #[case(Some(8), vec![], 8.0, 1.0)]
    #[case(None, vec!["a.jpg", " ", "b.jpg"], 2.0, 1.0)]
    #[case(Some(0), vec!["a.jpg"], 0.0, 1.0)]
    #[case(None, vec![], 0.0, 0.0)]
    fn image_features_prefer_the_explicit_count(
        extractor: FeatureExtractor,
        #[case] num_images: Option<u32>,
        #[case] images: Vec<&str>,
        #[case] count: f64,
        #[case] flag: f64,
    ) {
        let record = PoiRecord {
            num_images,
            images: images.into_iter().map(str::to_owned).collect(),
            ..PoiRecord::default()
        };
        let features = extractor.extract(&record, None).expect("record");
        assert_eq!(features.get(FeatureName::NumImages), count);
        assert_eq!(features.get(FeatureName::HasImages), flag);
    }

    #[rstest]
    #[case(json!("Mo-Su 08:00-20:00"), 1.0)]
    #[case(json!("  "), 0.0)]
    #[case(json!([]), 0.0)]
    #[case(json!([{"open": "08:00"}]), 1.0)]
    #[case(json!({}), 0.0)]
    #[case(json!(null), 0.0)]
    fn opening_hours_presence(
        extractor: FeatureExtractor,
        #[case] hours: Value,
        #[case] expected: f64,
    ) {
        let record = PoiRecord {
            opening_hours: Some(hours),
            ..PoiRecord::default()
        };
        let features = extractor.extract(&record, None).expect("record");
        assert_eq!(features.get(FeatureName::HasOpeningHours), expected);
    }

    #[rstest]
    #[case(180, 1.0)]
    #[case(181, 0.0)]
    #[case(0, 1.0)]
    fn recency_window_is_inclusive(
        extractor: FeatureExtractor,
        #[case] age_days: i64,
        #[case] recent: f64,
    ) {
        let updated = now() - Duration::days(age_days);
        let record = PoiRecord {
            updated_at: Some(updated.to_rfc3339()),
            ..PoiRecord::default()
        };
        let features = extractor.extract(&record, None).expect("record");
        assert_eq!(
            features.get(FeatureName::DaysSinceUpdate),
            f64::from(i32::try_from(age_days).expect("small"))
        );
        assert_eq!(features.get(FeatureName::IsRecent), recent);
    }

    #[rstest]
    #[case("2025-05-31T13:00:00Z", 0.0)]
    #[case("2025-05-01T12:00:00+02:00", 31.0)]
    #[case("2025-05-01T11:59:59.250", 31.0)]
    #[case("2025-05-01 12:00:00", 31.0)]
    #[case("2025-05-01", 31.0)]
    #[case("2026-01-01", 0.0)]
    #[case("not a date", MISSING_UPDATE_DAYS)]
    fn timestamps_in_accepted_forms(
        extractor: FeatureExtractor,
        #[case] raw: &str,
        #[case] days: f64,
    ) {
        let record = PoiRecord {
            updated_at: Some(raw.to_owned()),
            ..PoiRecord::default()
        };
        let features = extractor.extract(&record, None).expect("record");
        assert_eq!(features.get(FeatureName::DaysSinceUpdate), days);
    }

    #[cfg(feature = "serde")]
    #[rstest]
    fn loosely_typed_payloads_still_extract(extractor: FeatureExtractor) {
        let record: PoiRecord = serde_json::from_value(json!({
            "num_images": 8.0,
            "updated_at": 1_736_899_200,
        }))
        .expect("lenient fields");
        let features = extractor.extract(&record, None).expect("record");
        assert_eq!(features.get(FeatureName::NumImages), 8.0);
        assert_eq!(features.get(FeatureName::DaysSinceUpdate), MISSING_UPDATE_DAYS);
        assert_eq!(features.get(FeatureName::IsRecent), 0.0);
    }

    #[rstest]
    fn context_fills_gaps_and_overrides_win(extractor: FeatureExtractor) {
        let context = SpatialContext {
            median_salary: 2_450.0,
            population: 8_600.0,
            nearby_count: 3.0,
            source: ContextSource::Default,
        };
        let record = PoiRecord {
            latitude: Some(45.85),
            longitude: Some(6.83),
            population: Some(120.0),
            ..PoiRecord::default()
        };
        let features = extractor.extract(&record, Some(&context)).expect("record");
        assert_eq!(features.get(FeatureName::Latitude), 45.85);
        assert_eq!(features.get(FeatureName::Longitude), 6.83);
        assert_eq!(features.get(FeatureName::MedianSalary), 2_450.0);
        assert_eq!(features.get(FeatureName::Population), 120.0);
        assert_eq!(features.get(FeatureName::NearbyCount), 3.0);
        assert_eq!(features.get(FeatureName::HasGps), 1.0);
    }

    #[rstest]
    fn partial_coordinates_fail_validation(extractor: FeatureExtractor) {
        let record = PoiRecord {
            latitude: Some(45.0),
            ..PoiRecord::default()
        };
        let err = extractor.extract(&record, None).expect_err("partial pair");
        assert!(matches!(
            err,
            ExtractionError::Validation(ValidationError::PartialCoordinates { .. })
        ));
    }
}
