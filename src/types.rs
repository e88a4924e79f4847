use geo::Point;
use serde::Serialize;

/// One line of the sales dataset. Read-only after load.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesRecord {
    pub category: String,
    pub region: String,
    pub state: String,
    pub city: String,
    pub postal_code: String,
    pub sales: f64,
    pub profit: f64,
    pub discount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// geo uses (x, y) = (lon, lat).
    pub fn to_point(self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }
}

/// Sales summed per (state, city, postal code, category).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedCityRow {
    pub state: String,
    pub city: String,
    pub postal_code: String,
    pub category: String,
    pub sales: f64,
    pub location: Option<GeoPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateTotal {
    pub state: String,
    pub sales: f64,
}
