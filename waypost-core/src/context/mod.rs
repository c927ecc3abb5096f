//! Spatial enrichment of records from reference data.
//!
//! [`SpatialContextProvider`] answers two questions for a coordinate pair:
//! which region is nearest (for socio-economic indicators) and how many known
//! records lie nearby. Missing reference data is never an error; the provider
//! falls back to fixed defaults and reports [`ContextSource::Default`].

mod geodesic;
mod index;
mod reference;
#[cfg(feature = "serde")]
mod snapshot;

use std::fmt;

use log::debug;

pub use geodesic::{EARTH_RADIUS_KM, haversine_km, search_envelopes};
pub use index::{LinearIndex, Located, Neighbour, RTreeIndex, SpatialIndex};
pub use reference::{KnownRecord, ReferenceTable, ReferenceTableError, Region};
#[cfg(feature = "serde")]
pub use snapshot::{
    SNAPSHOT_MAGIC, SNAPSHOT_VERSION, SnapshotError, SnapshotWriteError, load_context_snapshot,
    write_context_snapshot,
};

use crate::record::Coordinates;

/// Median salary used when no region is close enough.
pub const DEFAULT_MEDIAN_SALARY: f64 = 2_000.0;
/// Population used when no region is close enough.
pub const DEFAULT_POPULATION: f64 = 10_000.0;
/// Density used when a record is extracted without any context.
pub const DEFAULT_NEARBY_COUNT: f64 = 50.0;
/// Default radius for density counting.
pub const DEFAULT_RADIUS_KM: f64 = 10.0;
/// Default search radius for the nearest region.
pub const DEFAULT_REGION_FALLBACK_KM: f64 = 100.0;

/// Where the indicators of a [`SpatialContext`] came from.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextSource {
    /// Indicators were taken from the nearest region.
    Region {
        /// Identifier of the matched region.
        region_id: String,
        /// Great-circle distance to its centroid.
        distance_km: f64,
    },
    /// No region was within reach; defaults were used.
    Default,
}

/// Enrichment values for a single location.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialContext {
    /// Median salary of the nearest region.
    pub median_salary: f64,
    /// Population of the nearest region.
    pub population: f64,
    /// Known records within the density radius.
    pub nearby_count: f64,
    /// Provenance of `median_salary` and `population`.
    pub source: ContextSource,
}

impl SpatialContext {
    /// Context built purely from defaults.
    #[must_use]
    pub const fn defaults() -> Self {
        Self {
            median_salary: DEFAULT_MEDIAN_SALARY,
            population: DEFAULT_POPULATION,
            nearby_count: DEFAULT_NEARBY_COUNT,
            source: ContextSource::Default,
        }
    }
}

/// Looks up regions and nearby records for coordinates.
///
/// # Examples
///
/// ```
/// use waypost_core::{ContextSource, Coordinates, ReferenceTable, Region, SpatialContextProvider};
///
/// let table = ReferenceTable {
///     regions: vec![Region {
///         region_id: "74056".into(),
///         centroid_lat: 45.92,
///         centroid_lon: 6.87,
///         median_salary: 2450.0,
///         population: 8600.0,
///     }],
///     records: Vec::new(),
/// };
/// let provider = SpatialContextProvider::from_table(table);
/// let here = Coordinates::new(45.85, 6.83).expect("valid");
/// let context = provider.enrich(here, 10.0, None);
/// assert_eq!(context.median_salary, 2450.0);
/// assert!(matches!(context.source, ContextSource::Region { .. }));
/// ```
pub struct SpatialContextProvider {
    regions: Box<dyn SpatialIndex<Region>>,
    records: Box<dyn SpatialIndex<KnownRecord>>,
    fallback_radius_km: f64,
}

impl fmt::Debug for SpatialContextProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpatialContextProvider")
            .field("regions", &self.regions.len())
            .field("records", &self.records.len())
            .field("fallback_radius_km", &self.fallback_radius_km)
            .finish()
    }
}

impl Default for SpatialContextProvider {
    fn default() -> Self {
        Self::from_table(ReferenceTable::default())
    }
}

impl SpatialContextProvider {
    /// Index `table` with R\*-trees.
    #[must_use]
    pub fn from_table(table: ReferenceTable) -> Self {
        Self::with_indices(
            Box::new(RTreeIndex::new(table.regions)),
            Box::new(RTreeIndex::new(table.records)),
        )
    }

    /// Build a provider over caller-supplied indices.
    #[must_use]
    pub const fn with_indices(
        regions: Box<dyn SpatialIndex<Region>>,
        records: Box<dyn SpatialIndex<KnownRecord>>,
    ) -> Self {
        Self {
            regions,
            records,
            fallback_radius_km: DEFAULT_REGION_FALLBACK_KM,
        }
    }

    /// Override how far to look for the nearest region.
    #[must_use]
    pub const fn with_fallback_radius(mut self, radius_km: f64) -> Self {
        self.fallback_radius_km = radius_km;
        self
    }

    /// Radius searched for the nearest region.
    #[must_use]
    pub const fn fallback_radius_km(&self) -> f64 {
        self.fallback_radius_km
    }

    /// Enrich a location using the provider's own fallback radius.
    ///
    /// Indicators come from the nearest region within the fallback radius or
    /// from defaults. `nearby_count` counts known records within `radius_km`
    /// other than `exclude_id`.
    #[must_use]
    pub fn enrich(
        &self,
        at: Coordinates,
        radius_km: f64,
        exclude_id: Option<&str>,
    ) -> SpatialContext {
        self.enrich_within(at, radius_km, self.fallback_radius_km, exclude_id)
    }

    /// Enrich a location, searching regions within `fallback_km`.
    #[must_use]
    pub fn enrich_within(
        &self,
        at: Coordinates,
        radius_km: f64,
        fallback_km: f64,
        exclude_id: Option<&str>,
    ) -> SpatialContext {
        let nearby = self.nearby_count(at, radius_km, exclude_id);
        let nearby_count = f64::from(u32::try_from(nearby).unwrap_or(u32::MAX));
        match self.nearest_region_within(at, fallback_km) {
            Some((region, distance_km)) => SpatialContext {
                median_salary: region.median_salary,
                population: region.population,
                nearby_count,
                source: ContextSource::Region {
                    region_id: region.region_id.clone(),
                    distance_km,
                },
            },
            None => {
                debug!(
                    "no region within {fallback_km} km of ({}, {}); using default indicators",
                    at.latitude(),
                    at.longitude()
                );
                SpatialContext {
                    nearby_count,
                    ..SpatialContext::defaults()
                }
            }
        }
    }

    /// Nearest region within the fallback radius and its distance.
    ///
    /// Equidistant regions resolve to the one listed first in the table.
    #[must_use]
    pub fn nearest_region(&self, at: Coordinates) -> Option<(&Region, f64)> {
        self.nearest_region_within(at, self.fallback_radius_km)
    }

    /// Nearest region within `fallback_km` and its distance.
    #[must_use]
    pub fn nearest_region_within(
        &self,
        at: Coordinates,
        fallback_km: f64,
    ) -> Option<(&Region, f64)> {
        self.regions
            .within_radius(at.as_coord(), fallback_km)
            .into_iter()
            .min_by(|a, b| {
                a.distance_km
                    .total_cmp(&b.distance_km)
                    .then(a.ordinal.cmp(&b.ordinal))
            })
            .map(|n| (n.item, n.distance_km))
    }

    /// Known records within `radius_km`, ignoring `exclude_id`.
    #[must_use]
    pub fn nearby_count(
        &self,
        at: Coordinates,
        radius_km: f64,
        exclude_id: Option<&str>,
    ) -> usize {
        self.records
            .within_radius(at.as_coord(), radius_km)
            .into_iter()
            .filter(|n| exclude_id.is_none_or(|id| n.item.id != id))
            .count()
    }
}
