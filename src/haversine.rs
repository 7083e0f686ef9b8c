//! Great-circle geometry and the straight-line route estimator.
//!
//! Used when the routing provider is unavailable: ignores roads, but is
//! always available and never fails.

use crate::polyline::Polyline;
use crate::traits::{Coordinate, LegSummary, RawRoute};

/// Average driving speed assumption for time estimation.
pub const DEFAULT_SPEED_MPH: f64 = 50.0;

/// Earth radius in miles.
const EARTH_RADIUS_MILES: f64 = 3958.8;

/// Great-circle distance between two points in miles.
pub fn great_circle_miles(from: Coordinate, to: Coordinate) -> f64 {
    let lat1_rad = from.lat.to_radians();
    let lat2_rad = to.lat.to_radians();
    let delta_lat = (to.lat - from.lat).to_radians();
    let delta_lng = (to.lng - from.lng).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_MILES * c
}

/// Point at `fraction` (0.0..=1.0) of the way along the great circle.
pub fn intermediate(from: Coordinate, to: Coordinate, fraction: f64) -> Coordinate {
    let fraction = fraction.clamp(0.0, 1.0);
    let delta = great_circle_miles(from, to) / EARTH_RADIUS_MILES;
    if delta < 1e-12 {
        return from;
    }

    let (lat1, lng1) = (from.lat.to_radians(), from.lng.to_radians());
    let (lat2, lng2) = (to.lat.to_radians(), to.lng.to_radians());
    let a = ((1.0 - fraction) * delta).sin() / delta.sin();
    let b = (fraction * delta).sin() / delta.sin();

    let x = a * lat1.cos() * lng1.cos() + b * lat2.cos() * lng2.cos();
    let y = a * lat1.cos() * lng1.sin() + b * lat2.cos() * lng2.sin();
    let z = a * lat1.sin() + b * lat2.sin();

    Coordinate::new(
        z.atan2((x * x + y * y).sqrt()).to_degrees(),
        y.atan2(x).to_degrees(),
    )
}

pub const KM_PER_MILE: f64 = 1.609344;

/// Rough degrees of latitude per kilometer, also used for longitude.
const DEGREES_PER_KM: f64 = 0.009;

/// Axis-aligned box in degrees, used to bound nearby-place searches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Coordinate,
    pub max: Coordinate,
}

impl BoundingBox {
    /// Square of roughly `radius_km` in each direction around `center`.
    pub fn around(center: Coordinate, radius_km: f64) -> Self {
        let delta = DEGREES_PER_KM * radius_km;
        Self {
            min: Coordinate::new(center.lat - delta, center.lng - delta),
            max: Coordinate::new(center.lat + delta, center.lng + delta),
        }
    }

    pub fn contains(&self, point: Coordinate) -> bool {
        (self.min.lat..=self.max.lat).contains(&point.lat)
            && (self.min.lng..=self.max.lng).contains(&point.lng)
    }

    /// `lng,lat,lng,lat` corners, the order Nominatim's `viewbox` expects.
    pub fn to_viewbox(&self) -> String {
        format!(
            "{},{},{},{}",
            self.min.lng, self.min.lat, self.max.lng, self.max.lat
        )
    }
}

/// Straight-line route estimator.
///
/// Joins the requested coordinates with great-circle legs and assumes a
/// constant average speed.
#[derive(Debug, Clone)]
pub struct HaversineRouter {
    /// Assumed average driving speed in mph.
    pub speed_mph: f64,
}

impl Default for HaversineRouter {
    fn default() -> Self {
        Self {
            speed_mph: DEFAULT_SPEED_MPH,
        }
    }
}

impl HaversineRouter {
    pub fn new(speed_mph: f64) -> Self {
        Self { speed_mph }
    }

    /// Convert distance in miles to travel time in seconds.
    pub fn miles_to_seconds(&self, miles: f64) -> f64 {
        if self.speed_mph <= 0.0 {
            return 0.0;
        }
        (miles / self.speed_mph * 3600.0).round()
    }

    pub fn estimate(&self, coordinates: &[Coordinate]) -> RawRoute {
        let legs: Vec<LegSummary> = coordinates
            .windows(2)
            .map(|pair| {
                let miles = great_circle_miles(pair[0], pair[1]);
                LegSummary {
                    distance_miles: miles,
                    duration_secs: self.miles_to_seconds(miles),
                }
            })
            .collect();

        RawRoute {
            geometry: Polyline::new(coordinates.to_vec()),
            distance_miles: legs.iter().map(|leg| leg.distance_miles).sum(),
            duration_secs: legs.iter().map(|leg| leg.duration_secs).sum(),
            legs,
        }
    }
}
