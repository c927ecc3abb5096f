//! Raw point-of-interest records as supplied by upstream collectors.
//!
//! Field presence is the only quality signal the engine relies on, so every
//! field is optional. Coordinates are the one exception to "anything goes":
//! latitude and longitude must be supplied together and within range.

use geo::Coord;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifier reported for records that carry no `id`.
pub const UNKNOWN_RECORD_ID: &str = "unknown";

/// A point-of-interest record with partially-missing fields.
///
/// # Examples
///
/// ```
/// use waypost_core::PoiRecord;
///
/// let record = PoiRecord {
///     name: Some("Summit Refuge".into()),
///     latitude: Some(45.85),
///     longitude: Some(6.83),
///     num_images: Some(8),
///     ..PoiRecord::default()
/// };
/// assert_eq!(record.record_id(), "unknown");
/// assert!(record.coordinates().expect("valid pair").is_some());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct PoiRecord {
    /// Opaque identifier.
    pub id: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Free-text description.
    pub description: Option<String>,
    /// WGS84 latitude in degrees.
    pub latitude: Option<f64>,
    /// WGS84 longitude in degrees.
    pub longitude: Option<f64>,
    /// Postal address.
    pub address: Option<String>,
    /// Image references, possibly empty.
    pub images: Vec<String>,
    /// Explicit image count, preferred over the length of `images`.
    ///
    /// Integral floats such as `8.0` are accepted when deserialising.
    #[cfg_attr(feature = "serde", serde(deserialize_with = "lenient::image_count"))]
    pub num_images: Option<u32>,
    /// Opening-hours descriptor: a string, a list of periods or an object.
    pub opening_hours: Option<serde_json::Value>,
    /// Phone number.
    pub phone: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Website URL.
    pub website: Option<String>,
    /// Last update timestamp in ISO-8601 form.
    ///
    /// Non-string JSON values deserialise to `None` and so count as an
    /// unknown update date.
    #[cfg_attr(
        feature = "serde",
        serde(alias = "last_update", deserialize_with = "lenient::timestamp")
    )]
    pub updated_at: Option<String>,
    /// Pre-computed regional median salary overriding enrichment.
    #[cfg_attr(feature = "serde", serde(alias = "insee_salary_median"))]
    pub median_salary: Option<f64>,
    /// Pre-computed regional population overriding enrichment.
    pub population: Option<f64>,
    /// Pre-computed density count overriding enrichment.
    #[cfg_attr(feature = "serde", serde(alias = "poi_density_10km"))]
    pub nearby_count: Option<f64>,
}

/// A validated latitude/longitude pair.
///
/// Stored as a [`Coord`] with `x = longitude` and `y = latitude`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates(Coord<f64>);

impl Coordinates {
    /// Validate and wrap a latitude/longitude pair.
    ///
    /// # Errors
    /// Returns [`ValidationError::LatitudeOutOfRange`] or
    /// [`ValidationError::LongitudeOutOfRange`] when a value is non-finite or
    /// outside the WGS84 range.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ValidationError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(ValidationError::LatitudeOutOfRange { value: latitude });
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(ValidationError::LongitudeOutOfRange { value: longitude });
        }
        Ok(Self(Coord {
            x: longitude,
            y: latitude,
        }))
    }

    /// Latitude in degrees.
    #[must_use]
    pub const fn latitude(self) -> f64 {
        self.0.y
    }

    /// Longitude in degrees.
    #[must_use]
    pub const fn longitude(self) -> f64 {
        self.0.x
    }

    /// The pair as a `geo` coordinate.
    #[must_use]
    pub const fn as_coord(self) -> Coord<f64> {
        self.0
    }
}

/// Input rejected before scoring.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    /// Only one half of the coordinate pair was supplied.
    #[error("{present} was supplied without {missing}; coordinates must be given as a pair")]
    PartialCoordinates {
        /// Field that was present.
        present: &'static str,
        /// Field that was missing.
        missing: &'static str,
    },
    /// Latitude outside `[-90, 90]` or not finite.
    #[error("latitude {value} is outside [-90, 90]")]
    LatitudeOutOfRange {
        /// Supplied latitude.
        value: f64,
    },
    /// Longitude outside `[-180, 180]` or not finite.
    #[error("longitude {value} is outside [-180, 180]")]
    LongitudeOutOfRange {
        /// Supplied longitude.
        value: f64,
    },
    /// Context enrichment requires coordinates and none were supplied.
    #[error("latitude and longitude are required for context enrichment")]
    MissingCoordinates,
}

impl PoiRecord {
    /// Identifier to report in results, falling back to [`UNKNOWN_RECORD_ID`].
    #[must_use]
    pub fn record_id(&self) -> &str {
        self.id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or(UNKNOWN_RECORD_ID)
    }

    /// Validated coordinates, `None` when both halves are absent.
    ///
    /// # Errors
    /// Returns [`ValidationError::PartialCoordinates`] when only one half is
    /// present, or a range error for invalid values.
    pub fn coordinates(&self) -> Result<Option<Coordinates>, ValidationError> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Coordinates::new(lat, lon).map(Some),
            (None, None) => Ok(None),
            (Some(_), None) => Err(ValidationError::PartialCoordinates {
                present: "latitude",
                missing: "longitude",
            }),
            (None, Some(_)) => Err(ValidationError::PartialCoordinates {
                present: "longitude",
                missing: "latitude",
            }),
        }
    }
}

#[cfg(feature = "serde")]
mod lenient {
    use serde::Deserialize;
    use serde::de::{Deserializer, Error, Unexpected};
    use serde_json::{Number, Value};

    /// Accept any JSON value; only strings are kept.
    pub(super) fn timestamp<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(text) => Some(text),
            _ => None,
        })
    }

    /// Accept unsigned integers and integral floats that fit a `u32`.
    pub(super) fn image_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(number) = Option::<Number>::deserialize(deserializer)? else {
            return Ok(None);
        };
        if let Some(count) = number.as_u64() {
            return u32::try_from(count).map(Some).map_err(|_| {
                D::Error::invalid_value(Unexpected::Unsigned(count), &"an image count")
            });
        }
        let whole =
            |value: f64| value.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&value);
        match number.as_f64() {
            Some(value) if whole(value) => {
                #[expect(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    reason = "the value is whole and within u32 range"
                )]
                let count = value as u32;
                Ok(Some(count))
            }
            Some(value) => Err(D::Error::invalid_value(
                Unexpected::Float(value),
                &"a non-negative whole image count",
            )),
            None => Err(D::Error::custom("image count is not a number")),
        }
    }
}

/// Whether an optional string carries non-whitespace content.
#[must_use]
pub fn is_present(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some(1.0), None, "latitude", "longitude")]
    #[case(None, Some(1.0), "longitude", "latitude")]
    fn partial_coordinates_name_both_fields(
        #[case] latitude: Option<f64>,
        #[case] longitude: Option<f64>,
        #[case] present: &'static str,
        #[case] missing: &'static str,
    ) {
        let record = PoiRecord {
            latitude,
            longitude,
            ..PoiRecord::default()
        };
        let err = record.coordinates().expect_err("partial pair");
        assert_eq!(err, ValidationError::PartialCoordinates { present, missing });
        assert!(err.to_string().contains(present));
    }

    #[rstest]
    #[case(90.5, 0.0)]
    #[case(-91.0, 0.0)]
    #[case(f64::NAN, 0.0)]
    #[case(0.0, 180.5)]
    #[case(0.0, f64::INFINITY)]
    fn out_of_range_coordinates_are_rejected(#[case] latitude: f64, #[case] longitude: f64) {
        assert!(Coordinates::new(latitude, longitude).is_err());
    }

    #[rstest]
    #[case(90.0, 180.0)]
    #[case(-90.0, -180.0)]
    fn boundary_coordinates_are_accepted(#[case] latitude: f64, #[case] longitude: f64) {
        let coords = Coordinates::new(latitude, longitude).expect("boundary values");
        assert_eq!(coords.latitude(), latitude);
        assert_eq!(coords.longitude(), longitude);
    }

    #[rstest]
    #[case(None, "unknown")]
    #[case(Some("   "), "unknown")]
    #[case(Some("poi_001"), "poi_001")]
    fn record_id_falls_back_to_sentinel(#[case] id: Option<&str>, #[case] expected: &str) {
        let record = PoiRecord {
            id: id.map(str::to_owned),
            ..PoiRecord::default()
        };
        assert_eq!(record.record_id(), expected);
    }

    #[cfg(feature = "serde")]
    #[rstest]
    fn deserialises_legacy_field_names() {
        let record: PoiRecord = serde_json::from_value(serde_json::json!({
            "name": "Tour Eiffel",
            "insee_salary_median": 2800.0,
            "poi_density_10km": 1250,
            "last_update": "2025-01-15"
        }))
        .expect("legacy payload");
        assert_eq!(record.median_salary, Some(2800.0));
        assert_eq!(record.nearby_count, Some(1250.0));
        assert_eq!(record.updated_at.as_deref(), Some("2025-01-15"));
        assert!(record.images.is_empty());
    }

    #[cfg(feature = "serde")]
    #[rstest]
    #[case(serde_json::json!(8), Some(8))]
    #[case(serde_json::json!(8.0), Some(8))]
    #[case(serde_json::json!(0.0), Some(0))]
    #[case(serde_json::json!(null), None)]
    fn image_counts_accept_whole_numbers(
        #[case] raw: serde_json::Value,
        #[case] expected: Option<u32>,
    ) {
        let record: PoiRecord =
            serde_json::from_value(serde_json::json!({ "num_images": raw })).expect("whole count");
        assert_eq!(record.num_images, expected);
    }

    #[cfg(feature = "serde")]
    #[rstest]
    #[case(serde_json::json!(8.5))]
    #[case(serde_json::json!(-1))]
    #[case(serde_json::json!(5_000_000_000_u64))]
    #[case(serde_json::json!("many"))]
    fn image_counts_reject_other_values(#[case] raw: serde_json::Value) {
        let outcome = serde_json::from_value::<PoiRecord>(serde_json::json!({ "num_images": raw }));
        assert!(outcome.is_err());
    }

    #[cfg(feature = "serde")]
    #[rstest]
    #[case(serde_json::json!(20_250_115))]
    #[case(serde_json::json!(true))]
    #[case(serde_json::json!({ "date": "2025-01-15" }))]
    #[case(serde_json::json!(null))]
    fn non_string_update_dates_are_dropped(#[case] raw: serde_json::Value) {
        let record: PoiRecord = serde_json::from_value(serde_json::json!({
            "id": "poi_007",
            "updated_at": raw,
        }))
        .expect("any update value is accepted");
        assert_eq!(record.updated_at, None);
        assert_eq!(record.record_id(), "poi_007");
    }
}
