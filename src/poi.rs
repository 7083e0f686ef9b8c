//! Named places for fuel and rest stops.
//!
//! Each fuel or rest stop is matched to a nearby fuel station or rest area.
//! Radii are widened one at a time and every keyword is tried at a radius
//! before moving on. A stop with no match keeps its generic label and is
//! flagged `poi_fallback`.

use serde::Serialize;
use tracing::debug;

use crate::cache::ResolutionCache;
use crate::config::PoiSearchConfig;
use crate::haversine::{great_circle_miles, KM_PER_MILE};
use crate::planner::{Stop, StopKind};
use crate::traits::Coordinate;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyPoi {
    pub name: String,
    pub address: String,
    pub location: Coordinate,
    /// Straight-line distance from the stop.
    pub distance_km: f64,
    /// Radius of the search that found it.
    pub search_radius_km: f64,
}

/// The first place found near `near` for a stop of `kind`.
pub fn locate(
    cache: &ResolutionCache,
    config: &PoiSearchConfig,
    kind: StopKind,
    near: Coordinate,
) -> Option<NearbyPoi> {
    let keywords = match kind {
        StopKind::Fuel => &config.fuel_keywords,
        StopKind::Rest => &config.rest_keywords,
        StopKind::Pickup | StopKind::Dropoff => return None,
    };

    for &radius_km in &config.radii_km {
        for keyword in keywords {
            if let Some(found) = cache.find_poi(keyword, near, radius_km) {
                return Some(NearbyPoi {
                    distance_km: great_circle_miles(near, found.coordinate) * KM_PER_MILE,
                    name: found.name,
                    address: found.address,
                    location: found.coordinate,
                    search_radius_km: radius_km,
                });
            }
        }
    }
    None
}

/// Attaches a nearby place to every fuel and rest stop.
pub fn name_stops(cache: &ResolutionCache, config: &PoiSearchConfig, stops: &mut [Stop]) {
    for stop in stops
        .iter_mut()
        .filter(|stop| matches!(stop.kind, StopKind::Fuel | StopKind::Rest))
    {
        stop.poi = locate(cache, config, stop.kind, stop.location);
        stop.poi_fallback = stop.poi.is_none();
        debug!(
            stop = %stop.label,
            poi = stop.poi.as_ref().map(|poi| poi.name.as_str()),
            "Stop place"
        );
    }
}
