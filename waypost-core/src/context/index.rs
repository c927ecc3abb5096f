//! Radius queries over located reference entries.
//!
//! [`SpatialIndex`] hides the lookup strategy from the context provider.
//! [`RTreeIndex`] prefilters with an R\*-tree over lon/lat envelopes and
//! refines with great-circle distance; [`LinearIndex`] scans every entry and
//! serves as the reference behaviour in tests.

use geo::Coord;
use rstar::{AABB, RTree, RTreeObject};

use super::geodesic::{haversine_km, search_envelopes};

/// An entry with a WGS84 position (`x = longitude`, `y = latitude`).
pub trait Located {
    /// Position of the entry.
    fn location(&self) -> Coord<f64>;
}

/// An entry found by a radius query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbour<'a, T> {
    /// Position of the entry in the table the index was built from.
    pub ordinal: usize,
    /// Great-circle distance from the query point in kilometres.
    pub distance_km: f64,
    /// The entry itself.
    pub item: &'a T,
}

/// Radius lookup over a static set of entries.
///
/// Results are ordered by [`Neighbour::ordinal`] so ties between equidistant
/// entries resolve to table order regardless of the indexing strategy.
pub trait SpatialIndex<T>: Send + Sync {
    /// All entries within `radius_km` (inclusive) of `centre`.
    fn within_radius(&self, centre: Coord<f64>, radius_km: f64) -> Vec<Neighbour<'_, T>>;

    /// Number of indexed entries.
    fn len(&self) -> usize;

    /// Whether the index holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Slot<T> {
    ordinal: usize,
    item: T,
}

impl<T: Located> RTreeObject for Slot<T> {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        let location = self.item.location();
        AABB::from_point([location.x, location.y])
    }
}

/// R\*-tree backed index.
pub struct RTreeIndex<T: Located> {
    tree: RTree<Slot<T>>,
}

impl<T: Located> RTreeIndex<T> {
    /// Bulk-load an index, remembering each entry's position in `items`.
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        let slots = items
            .into_iter()
            .enumerate()
            .map(|(ordinal, item)| Slot { ordinal, item })
            .collect();
        Self {
            tree: RTree::bulk_load(slots),
        }
    }
}

impl<T: Located + Send + Sync> SpatialIndex<T> for RTreeIndex<T> {
    fn within_radius(&self, centre: Coord<f64>, radius_km: f64) -> Vec<Neighbour<'_, T>> {
        let mut found: Vec<Neighbour<'_, T>> = search_envelopes(centre, radius_km)
            .iter()
            .flat_map(|envelope| self.tree.locate_in_envelope_intersecting(envelope))
            .filter_map(|slot| neighbour(slot.ordinal, &slot.item, centre, radius_km))
            .collect();
        found.sort_unstable_by_key(|n| n.ordinal);
        found.dedup_by_key(|n| n.ordinal);
        found
    }

    fn len(&self) -> usize {
        self.tree.size()
    }
}

/// Index that scans every entry on each query.
#[derive(Debug, Clone, Default)]
pub struct LinearIndex<T> {
    items: Vec<T>,
}

impl<T> LinearIndex<T> {
    /// Wrap `items` in table order.
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }
}

impl<T: Located + Send + Sync> SpatialIndex<T> for LinearIndex<T> {
    fn within_radius(&self, centre: Coord<f64>, radius_km: f64) -> Vec<Neighbour<'_, T>> {
        self.items
            .iter()
            .enumerate()
            .filter_map(|(ordinal, item)| neighbour(ordinal, item, centre, radius_km))
            .collect()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

fn neighbour<T: Located>(
    ordinal: usize,
    item: &T,
    centre: Coord<f64>,
    radius_km: f64,
) -> Option<Neighbour<'_, T>> {
    let distance_km = haversine_km(centre, item.location());
    (distance_km <= radius_km).then_some(Neighbour {
        ordinal,
        distance_km,
        item,
    })
}
