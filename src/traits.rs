//! Collaborator interfaces consumed by the trip planner.
//!
//! Geocoding, routing and nearby-place search are provided elsewhere; the
//! planner only depends on these traits. `osrm` and `nominatim` ship HTTP
//! implementations, tests and downstream services can plug in their own.

use serde::{Deserialize, Serialize};

use crate::error::{GeocodingError, RouteProviderError};
use crate::polyline::Polyline;

/// A point on the earth in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((lat, lng): (f64, f64)) -> Self {
        Self { lat, lng }
    }
}

/// Distance and travel time between two consecutive requested coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegSummary {
    pub distance_miles: f64,
    pub duration_secs: f64,
}

/// A path as returned by a routing provider, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRoute {
    pub geometry: Polyline,
    pub distance_miles: f64,
    pub duration_secs: f64,
    /// One entry per pair of consecutive requested coordinates, if known.
    pub legs: Vec<LegSummary>,
}

/// Resolves a free-form place name to coordinates.
pub trait GeocodingResolver: Send + Sync {
    fn resolve(&self, place: &str) -> Result<Coordinate, GeocodingError>;
}

/// Resolves an ordered list of coordinates to a drivable path.
pub trait RouteProvider: Send + Sync {
    fn route(&self, coordinates: &[Coordinate]) -> Result<RawRoute, RouteProviderError>;
}

/// A named place near a search point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiMatch {
    pub name: String,
    pub address: String,
    pub coordinate: Coordinate,
}

/// Finds fuel stations, rest areas and similar places near a coordinate.
pub trait PoiResolver: Send + Sync {
    /// Best match for `keyword` within roughly `radius_km` of `near`.
    /// `Ok(None)` means the provider answered and nothing matched.
    fn search(
        &self,
        keyword: &str,
        near: Coordinate,
        radius_km: f64,
    ) -> Result<Option<PoiMatch>, GeocodingError>;
}
