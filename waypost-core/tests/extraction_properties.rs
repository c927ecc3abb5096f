//! Property-based tests for feature extraction.
//!
//! # Invariants tested
//!
//! - **Totality:** every record with valid or absent coordinates yields all
//!   17 features, each finite.
//! - **Binary flags:** completeness flags are exactly `0.0` or `1.0`.
//! - **Freshness consistency:** `is_recent` agrees with `days_since_update`.
//! - **Index agreement:** R\*-tree and linear scans find the same neighbours.

#![expect(
    clippy::expect_used,
    reason = "property tests should fail fast when setup breaks"
)]

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use geo::Coord;
use proptest::prelude::*;
use waypost_core::context::{LinearIndex, Located, RTreeIndex, SpatialIndex};
use waypost_core::{
    FEATURE_COUNT, FeatureCategory, FeatureExtractor, FeatureName, FixedClock, PoiRecord,
    RECENT_WINDOW_DAYS,
};

fn extractor() -> FeatureExtractor {
    let now = Utc
        .with_ymd_and_hms(2025, 6, 1, 12, 0, 0)
        .single()
        .expect("valid instant");
    FeatureExtractor::new(Arc::new(FixedClock::new(now)))
}

fn text() -> impl Strategy<Value = Option<String>> {
    prop::option::of(prop_oneof![
        Just(String::new()),
        Just("   ".to_owned()),
        "[a-zA-Z ]{1,40}",
    ])
}

fn timestamp() -> impl Strategy<Value = Option<String>> {
    prop::option::of(prop_oneof![
        (0_i64..2_000).prop_map(|days| {
            let base = Utc
                .with_ymd_and_hms(2025, 6, 1, 12, 0, 0)
                .single()
                .expect("valid instant");
            (base - Duration::days(days)).to_rfc3339()
        }),
        Just("2025-13-45".to_owned()),
        "[0-9-]{0,12}",
    ])
}

prop_compose! {
    fn record()(
        name in text(),
        description in text(),
        address in text(),
        website in text(),
        phone in text(),
        coordinates in prop::option::of((-90.0_f64..=90.0, -180.0_f64..=180.0)),
        images in prop::collection::vec("[a-z]{0,8}", 0..5),
        num_images in prop::option::of(0_u32..50),
        updated_at in timestamp(),
        population in prop::option::of(0.0_f64..1.0e7),
    ) -> PoiRecord {
        PoiRecord {
            name,
            description,
            address,
            website,
            phone,
            latitude: coordinates.map(|(lat, _)| lat),
            longitude: coordinates.map(|(_, lon)| lon),
            images,
            num_images,
            updated_at,
            population,
            ..PoiRecord::default()
        }
    }
}

#[derive(Debug, Clone)]
struct Pin(Coord<f64>);

impl Located for Pin {
    fn location(&self) -> Coord<f64> {
        self.0
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: extraction is total and finite on well-typed records.
    #[test]
    fn extraction_yields_seventeen_finite_features(record in record()) {
        let features = extractor().extract(&record, None).expect("valid record");
        prop_assert_eq!(features.iter().count(), FEATURE_COUNT);
        prop_assert!(features.iter().all(|(_, value)| value.is_finite()));
    }

    /// Property: completeness flags never take values other than 0 or 1.
    #[test]
    fn completeness_flags_are_binary(record in record()) {
        let features = extractor().extract(&record, None).expect("valid record");
        for (name, value) in features.category(FeatureCategory::Completeness) {
            prop_assert!(value == 0.0 || value == 1.0, "{} = {}", name, value);
        }
    }

    /// Property: recency follows directly from the elapsed days.
    #[test]
    fn recency_matches_elapsed_days(record in record()) {
        let features = extractor().extract(&record, None).expect("valid record");
        let days = features.get(FeatureName::DaysSinceUpdate);
        let recent = features.get(FeatureName::IsRecent);
        prop_assert!(days >= 0.0);
        prop_assert_eq!(recent == 1.0, days <= RECENT_WINDOW_DAYS);
    }

    /// Property: both index strategies return identical neighbour sets.
    #[test]
    fn rtree_and_linear_index_agree(
        points in prop::collection::vec((-89.0_f64..89.0, -180.0_f64..=180.0), 0..40),
        centre in (-89.0_f64..89.0, -180.0_f64..=180.0),
        radius_km in 0.0_f64..2_000.0,
    ) {
        let pins: Vec<Pin> = points
            .into_iter()
            .map(|(y, x)| Pin(Coord { x, y }))
            .collect();
        let rtree = RTreeIndex::new(pins.clone());
        let linear = LinearIndex::new(pins);
        let centre = Coord { x: centre.1, y: centre.0 };
        let ordinals = |index: &dyn SpatialIndex<Pin>| -> Vec<usize> {
            index
                .within_radius(centre, radius_km)
                .into_iter()
                .map(|n| n.ordinal)
                .collect()
        };
        prop_assert_eq!(ordinals(&rtree), ordinals(&linear));
    }
}
