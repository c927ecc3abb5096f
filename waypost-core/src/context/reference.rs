//! Reference data backing spatial enrichment.

use geo::Coord;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::index::Located;
use crate::record::{Coordinates, ValidationError};

/// An administrative region with socio-economic indicators.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Region {
    /// Stable identifier, such as an INSEE commune code.
    pub region_id: String,
    /// Latitude of the region centroid.
    pub centroid_lat: f64,
    /// Longitude of the region centroid.
    pub centroid_lon: f64,
    /// Median monthly salary.
    pub median_salary: f64,
    /// Resident population.
    pub population: f64,
}

impl Located for Region {
    fn location(&self) -> Coord<f64> {
        Coord {
            x: self.centroid_lon,
            y: self.centroid_lat,
        }
    }
}

/// A previously collected record contributing to density counts.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct KnownRecord {
    /// Record identifier, used to exclude a record from its own count.
    pub id: String,
    /// WGS84 latitude.
    pub latitude: f64,
    /// WGS84 longitude.
    pub longitude: f64,
}

impl Located for KnownRecord {
    fn location(&self) -> Coord<f64> {
        Coord {
            x: self.longitude,
            y: self.latitude,
        }
    }
}

/// Regions and known records loaded together.
///
/// # Examples
///
/// ```
/// # #[cfg(feature = "serde")]
/// # {
/// use waypost_core::ReferenceTable;
///
/// let table: ReferenceTable = serde_json::from_str(r#"{
///     "regions": [{
///         "region_id": "74056",
///         "centroid_lat": 45.92,
///         "centroid_lon": 6.87,
///         "median_salary": 2450.0,
///         "population": 8600.0
///     }]
/// }"#).expect("valid table");
/// table.validate().expect("coordinates in range");
/// assert!(table.records.is_empty());
/// # }
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct ReferenceTable {
    /// Regions in table order; earlier entries win distance ties.
    pub regions: Vec<Region>,
    /// Known records for density counting.
    pub records: Vec<KnownRecord>,
}

/// A reference table entry with unusable values.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReferenceTableError {
    /// A region centroid lies outside the WGS84 range.
    #[error("region {region_id} has an invalid centroid: {source}")]
    RegionCentroid {
        /// Offending region.
        region_id: String,
        /// Coordinate failure.
        #[source]
        source: ValidationError,
    },
    /// A region indicator is NaN or infinite.
    #[error("region {region_id} has a non-finite {field}")]
    RegionIndicator {
        /// Offending region.
        region_id: String,
        /// Indicator name.
        field: &'static str,
    },
    /// A known record lies outside the WGS84 range.
    #[error("known record {id} has invalid coordinates: {source}")]
    RecordCoordinates {
        /// Offending record.
        id: String,
        /// Coordinate failure.
        #[source]
        source: ValidationError,
    },
}

impl ReferenceTable {
    /// Check every coordinate and indicator in the table.
    ///
    /// # Errors
    /// Returns the first [`ReferenceTableError`] encountered in table order.
    pub fn validate(&self) -> Result<(), ReferenceTableError> {
        for region in &self.regions {
            Coordinates::new(region.centroid_lat, region.centroid_lon).map_err(|source| {
                ReferenceTableError::RegionCentroid {
                    region_id: region.region_id.clone(),
                    source,
                }
            })?;
            for (field, value) in [
                ("median_salary", region.median_salary),
                ("population", region.population),
            ] {
                if !value.is_finite() {
                    return Err(ReferenceTableError::RegionIndicator {
                        region_id: region.region_id.clone(),
                        field,
                    });
                }
            }
        }
        for record in &self.records {
            Coordinates::new(record.latitude, record.longitude).map_err(|source| {
                ReferenceTableError::RecordCoordinates {
                    id: record.id.clone(),
                    source,
                }
            })?;
        }
        Ok(())
    }
}
