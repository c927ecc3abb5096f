//! The fixed 17-feature vector consumed by scoring models.
//!
//! Every record is reduced to the same named set of `f64` features. The
//! canonical order of [`FeatureName::ALL`] is the column order a model
//! artefact is trained against; [`FeatureVector::sorted_by_name`] provides the
//! alphabetical order used when fingerprinting.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Number of features produced for every record.
pub const FEATURE_COUNT: usize = 17;

/// Grouping of features by the aspect of the record they describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureCategory {
    /// Binary flags recording whether a field is meaningfully present.
    Completeness,
    /// Continuous measures of how much content a record carries.
    Richness,
    /// Location and enrichment values from the reference context.
    Context,
    /// Elapsed time since the record was last updated.
    Freshness,
}

/// Name of a single feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum FeatureName {
    /// Record has a non-blank name.
    HasName,
    /// Record has a non-blank description.
    HasDescription,
    /// Record has both coordinates.
    HasGps,
    /// Record has a non-blank address.
    HasAddress,
    /// Record has at least one image.
    HasImages,
    /// Record has an opening-hours descriptor.
    HasOpeningHours,
    /// Record has a phone number or an email address.
    HasContact,
    /// Character count of the raw description.
    DescriptionLength,
    /// Number of images attached to the record.
    NumImages,
    /// Record has a non-blank website.
    HasWebsite,
    /// Latitude in degrees, `0.0` when absent.
    Latitude,
    /// Longitude in degrees, `0.0` when absent.
    Longitude,
    /// Median salary of the nearest reference region.
    #[cfg_attr(feature = "serde", serde(alias = "insee_salary_median"))]
    MedianSalary,
    /// Population of the nearest reference region.
    Population,
    /// Count of other known records within the density radius.
    #[cfg_attr(feature = "serde", serde(alias = "poi_density_10km"))]
    NearbyCount,
    /// Whole days elapsed since the last update.
    DaysSinceUpdate,
    /// `1.0` when the record was updated within the recency window.
    IsRecent,
}

impl FeatureName {
    /// All features in canonical model column order.
    pub const ALL: [Self; FEATURE_COUNT] = [
        Self::HasName,
        Self::HasDescription,
        Self::HasGps,
        Self::HasAddress,
        Self::HasImages,
        Self::HasOpeningHours,
        Self::HasContact,
        Self::DescriptionLength,
        Self::NumImages,
        Self::HasWebsite,
        Self::Latitude,
        Self::Longitude,
        Self::MedianSalary,
        Self::Population,
        Self::NearbyCount,
        Self::DaysSinceUpdate,
        Self::IsRecent,
    ];

    /// Snake-case identifier used in artefacts and serialised output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HasName => "has_name",
            Self::HasDescription => "has_description",
            Self::HasGps => "has_gps",
            Self::HasAddress => "has_address",
            Self::HasImages => "has_images",
            Self::HasOpeningHours => "has_opening_hours",
            Self::HasContact => "has_contact",
            Self::DescriptionLength => "description_length",
            Self::NumImages => "num_images",
            Self::HasWebsite => "has_website",
            Self::Latitude => "latitude",
            Self::Longitude => "longitude",
            Self::MedianSalary => "median_salary",
            Self::Population => "population",
            Self::NearbyCount => "nearby_count",
            Self::DaysSinceUpdate => "days_since_update",
            Self::IsRecent => "is_recent",
        }
    }

    /// Category the feature belongs to.
    #[must_use]
    pub const fn category(self) -> FeatureCategory {
        match self {
            Self::HasName
            | Self::HasDescription
            | Self::HasGps
            | Self::HasAddress
            | Self::HasImages
            | Self::HasOpeningHours
            | Self::HasContact => FeatureCategory::Completeness,
            Self::DescriptionLength | Self::NumImages | Self::HasWebsite => {
                FeatureCategory::Richness
            }
            Self::Latitude
            | Self::Longitude
            | Self::MedianSalary
            | Self::Population
            | Self::NearbyCount => FeatureCategory::Context,
            Self::DaysSinceUpdate | Self::IsRecent => FeatureCategory::Freshness,
        }
    }
}

impl fmt::Display for FeatureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown feature name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown feature name: {0}")]
pub struct UnknownFeature(pub String);

impl FromStr for FeatureName {
    type Err = UnknownFeature;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "insee_salary_median" => return Ok(Self::MedianSalary),
            "poi_density_10km" => return Ok(Self::NearbyCount),
            _ => {}
        }
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s.trim())
            .ok_or_else(|| UnknownFeature(s.to_owned()))
    }
}

/// Raised when a feature vector cannot be assembled from named values.
///
/// This signals a programming error in extraction, never bad user input.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FeatureVectorError {
    /// One or more features were never set.
    #[error("feature vector is missing {} feature(s): {}", .0.len(), join_names(.0))]
    Missing(Vec<FeatureName>),
    /// A feature was set to NaN or an infinity.
    #[error("feature {name} has non-finite value {value}")]
    NonFinite {
        /// Offending feature.
        name: FeatureName,
        /// Value that was supplied.
        value: f64,
    },
}

fn join_names(names: &[FeatureName]) -> String {
    names
        .iter()
        .map(|name| name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A complete, finite feature vector.
///
/// Construct one through [`FeatureVectorBuilder`] or
/// [`FeatureVector::from_fn`]; both guarantee that all 17 features are
/// present.
///
/// # Examples
///
/// ```
/// use waypost_core::{FeatureName, FeatureVector};
///
/// let vector = FeatureVector::from_fn(|name| match name {
///     FeatureName::HasName => 1.0,
///     _ => 0.0,
/// })
/// .expect("finite features");
/// assert_eq!(vector.get(FeatureName::HasName), 1.0);
/// assert_eq!(vector.iter().count(), 17);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(
        into = "BTreeMap<FeatureName, f64>",
        try_from = "BTreeMap<FeatureName, f64>"
    )
)]
pub struct FeatureVector {
    has_name: f64,
    has_description: f64,
    has_gps: f64,
    has_address: f64,
    has_images: f64,
    has_opening_hours: f64,
    has_contact: f64,
    description_length: f64,
    num_images: f64,
    has_website: f64,
    latitude: f64,
    longitude: f64,
    median_salary: f64,
    population: f64,
    nearby_count: f64,
    days_since_update: f64,
    is_recent: f64,
}

impl FeatureVector {
    /// Build a vector by evaluating `value` for every feature.
    ///
    /// # Errors
    /// Returns [`FeatureVectorError::NonFinite`] when any value is NaN or
    /// infinite.
    pub fn from_fn(mut value: impl FnMut(FeatureName) -> f64) -> Result<Self, FeatureVectorError> {
        let mut builder = FeatureVectorBuilder::new();
        for name in FeatureName::ALL {
            builder.set(name, value(name));
        }
        builder.build()
    }

    /// Value of a single feature.
    #[must_use]
    pub const fn get(&self, name: FeatureName) -> f64 {
        match name {
            FeatureName::HasName => self.has_name,
            FeatureName::HasDescription => self.has_description,
            FeatureName::HasGps => self.has_gps,
            FeatureName::HasAddress => self.has_address,
            FeatureName::HasImages => self.has_images,
            FeatureName::HasOpeningHours => self.has_opening_hours,
            FeatureName::HasContact => self.has_contact,
            FeatureName::DescriptionLength => self.description_length,
            FeatureName::NumImages => self.num_images,
            FeatureName::HasWebsite => self.has_website,
            FeatureName::Latitude => self.latitude,
            FeatureName::Longitude => self.longitude,
            FeatureName::MedianSalary => self.median_salary,
            FeatureName::Population => self.population,
            FeatureName::NearbyCount => self.nearby_count,
            FeatureName::DaysSinceUpdate => self.days_since_update,
            FeatureName::IsRecent => self.is_recent,
        }
    }

    /// Iterate over `(name, value)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (FeatureName, f64)> + '_ {
        FeatureName::ALL.into_iter().map(|name| (name, self.get(name)))
    }

    /// Values in canonical model column order.
    #[must_use]
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        FeatureName::ALL.map(|name| self.get(name))
    }

    /// `(name, value)` pairs sorted alphabetically by feature name.
    #[must_use]
    pub fn sorted_by_name(&self) -> Vec<(&'static str, f64)> {
        let mut pairs: Vec<_> = self.iter().map(|(name, v)| (name.as_str(), v)).collect();
        pairs.sort_unstable_by(|a, b| a.0.cmp(b.0));
        pairs
    }

    /// Values of all features in `category`.
    pub fn category(
        &self,
        category: FeatureCategory,
    ) -> impl Iterator<Item = (FeatureName, f64)> + '_ {
        self.iter()
            .filter(move |(name, _)| name.category() == category)
    }
}

impl From<FeatureVector> for BTreeMap<FeatureName, f64> {
    fn from(vector: FeatureVector) -> Self {
        vector.iter().collect()
    }
}

impl TryFrom<BTreeMap<FeatureName, f64>> for FeatureVector {
    type Error = FeatureVectorError;

    fn try_from(map: BTreeMap<FeatureName, f64>) -> Result<Self, Self::Error> {
        let mut builder = FeatureVectorBuilder::new();
        for (name, value) in map {
            builder.set(name, value);
        }
        builder.build()
    }
}

/// Incrementally collects feature values and checks completeness on build.
#[derive(Debug, Clone, Default)]
pub struct FeatureVectorBuilder {
    values: BTreeMap<FeatureName, f64>,
}

impl FeatureVectorBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the value of `name`, replacing any earlier value.
    pub fn set(&mut self, name: FeatureName, value: f64) -> &mut Self {
        self.values.insert(name, value);
        self
    }

    /// Record a binary flag as `1.0` or `0.0`.
    pub fn flag(&mut self, name: FeatureName, present: bool) -> &mut Self {
        self.set(name, if present { 1.0 } else { 0.0 })
    }

    /// Assemble the vector.
    ///
    /// # Errors
    /// Returns [`FeatureVectorError::Missing`] listing every unset feature, or
    /// [`FeatureVectorError::NonFinite`] for the first NaN or infinite value.
    pub fn build(&self) -> Result<FeatureVector, FeatureVectorError> {
        let missing: Vec<FeatureName> = FeatureName::ALL
            .into_iter()
            .filter(|name| !self.values.contains_key(name))
            .collect();
        if !missing.is_empty() {
            return Err(FeatureVectorError::Missing(missing));
        }
        if let Some((&name, &value)) = self.values.iter().find(|(_, v)| !v.is_finite()) {
            return Err(FeatureVectorError::NonFinite { name, value });
        }
        let value = |name: FeatureName| self.values.get(&name).copied().unwrap_or_default();
        Ok(FeatureVector {
            has_name: value(FeatureName::HasName),
            has_description: value(FeatureName::HasDescription),
            has_gps: value(FeatureName::HasGps),
            has_address: value(FeatureName::HasAddress),
            has_images: value(FeatureName::HasImages),
            has_opening_hours: value(FeatureName::HasOpeningHours),
            has_contact: value(FeatureName::HasContact),
            description_length: value(FeatureName::DescriptionLength),
            num_images: value(FeatureName::NumImages),
            has_website: value(FeatureName::HasWebsite),
            latitude: value(FeatureName::Latitude),
            longitude: value(FeatureName::Longitude),
            median_salary: value(FeatureName::MedianSalary),
            population: value(FeatureName::Population),
            nearby_count: value(FeatureName::NearbyCount),
            days_since_update: value(FeatureName::DaysSinceUpdate),
            is_recent: value(FeatureName::IsRecent),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn canonical_order_has_seventeen_unique_names() {
        let mut names: Vec<_> = FeatureName::ALL.iter().map(|n| n.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), FEATURE_COUNT);
    }

    #[rstest]
    #[case(FeatureCategory::Completeness, 7)]
    #[case(FeatureCategory::Richness, 3)]
    #[case(FeatureCategory::Context, 5)]
    #[case(FeatureCategory::Freshness, 2)]
    fn categories_partition_the_vector(#[case] category: FeatureCategory, #[case] size: usize) {
        let count = FeatureName::ALL
            .iter()
            .filter(|name| name.category() == category)
            .count();
        assert_eq!(count, size);
    }

    #[rstest]
    #[case("has_name", FeatureName::HasName)]
    #[case("insee_salary_median", FeatureName::MedianSalary)]
    #[case("poi_density_10km", FeatureName::NearbyCount)]
    #[case(" is_recent ", FeatureName::IsRecent)]
    fn parses_names_and_legacy_aliases(#[case] raw: &str, #[case] expected: FeatureName) {
        assert_eq!(raw.parse::<FeatureName>(), Ok(expected));
    }

    #[rstest]
    fn rejects_unknown_names() {
        assert!("popularity".parse::<FeatureName>().is_err());
    }

    #[rstest]
    fn builder_reports_every_missing_feature() {
        let mut builder = FeatureVectorBuilder::new();
        builder.flag(FeatureName::HasName, true);
        let err = builder.build().expect_err("incomplete vector");
        match err {
            FeatureVectorError::Missing(missing) => {
                assert_eq!(missing.len(), FEATURE_COUNT - 1);
                assert!(!missing.contains(&FeatureName::HasName));
            }
            other => panic!("expected Missing, found {other:?}"),
        }
    }

    #[rstest]
    fn builder_rejects_non_finite_values() {
        let err = FeatureVector::from_fn(|name| {
            if name == FeatureName::Population {
                f64::NAN
            } else {
                0.0
            }
        })
        .expect_err("NaN population");
        assert!(matches!(
            err,
            FeatureVectorError::NonFinite {
                name: FeatureName::Population,
                ..
            }
        ));
    }

    #[rstest]
    fn sorted_by_name_is_alphabetical() {
        let vector = FeatureVector::from_fn(|_| 0.0).expect("zero vector");
        let names: Vec<_> = vector.sorted_by_name().into_iter().map(|(n, _)| n).collect();
        let mut expected = names.clone();
        expected.sort_unstable();
        assert_eq!(names, expected);
        assert_eq!(names.first(), Some(&"days_since_update"));
    }

    #[cfg(feature = "serde")]
    #[rstest]
    fn serialises_as_named_map() {
        let vector = FeatureVector::from_fn(|name| {
            if name == FeatureName::NumImages { 8.0 } else { 0.0 }
        })
        .expect("vector");
        let json = serde_json::to_value(vector).expect("serialise");
        assert_eq!(json["num_images"], serde_json::json!(8.0));
        let back: FeatureVector = serde_json::from_value(json).expect("deserialise");
        assert_eq!(back, vector);
    }
}
