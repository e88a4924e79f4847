use crate::types::AggregatedCityRow;
use geo::HaversineDistance;
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde::Serialize;

// Wrapper for RTree indexing; coordinates are [lon, lat].
struct CityMarker {
    index: usize,
    position: [f64; 2],
}

impl RTreeObject for CityMarker {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

impl PointDistance for CityMarker {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.position[0] - point[0];
        let dy = self.position[1] - point[1];
        dx * dx + dy * dy
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NearestCity<'a> {
    pub row: &'a AggregatedCityRow,
    pub distance_km: f64,
}

/// Map markers indexed for hover lookups.
pub struct MarkerIndex<'a> {
    rows: &'a [AggregatedCityRow],
    tree: RTree<CityMarker>,
}

impl<'a> MarkerIndex<'a> {
    /// Rows without a location are skipped.
    pub fn build(rows: &'a [AggregatedCityRow]) -> Self {
        let markers = rows
            .iter()
            .enumerate()
            .filter_map(|(index, row)| {
                row.location.map(|p| CityMarker { index, position: [p.longitude, p.latitude] })
            })
            .collect();
        Self { rows, tree: RTree::bulk_load(markers) }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Closest marker in degree space, with its great-circle distance.
    /// `None` for coordinates that are not on the globe.
    pub fn nearest(&self, lat: f64, lon: f64) -> Option<NearestCity<'a>> {
        if !valid_coordinate(lat, lon) {
            return None;
        }
        let marker = self.tree.nearest_neighbor(&[lon, lat])?;
        let row = self.rows.get(marker.index)?;
        let location = row.location?;
        let meters = location.to_point().haversine_distance(&geo::Point::new(lon, lat));
        Some(NearestCity { row, distance_km: meters / 1000.0 })
    }
}

fn valid_coordinate(lat: f64, lon: f64) -> bool {
    lat.is_finite() && lon.is_finite() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)
}
