//! Test fixtures for hos-planner.
//!
//! Provides:
//! - Real U.S. freight-corridor locations
//! - In-memory geocoders, routers and place search with call counting and
//!   injectable failures
//! - Planner builders with retry delays disabled

#![allow(dead_code)]

pub mod freight_locations;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use hos_planner::error::{FailureKind, GeocodingError, RouteProviderError};
use hos_planner::haversine::{great_circle_miles, BoundingBox};
use hos_planner::polyline::Polyline;
use hos_planner::retry::RetryPolicy;
use hos_planner::traits::{
    Coordinate, GeocodingResolver, LegSummary, PoiMatch, PoiResolver, RawRoute, RouteProvider,
};
use hos_planner::{PlannerConfig, ResolutionCache, TripPlanner, TripRequest};

pub use freight_locations::*;

pub const HOUR: i64 = 3600;

/// Installs a test subscriber once; `RUST_LOG` controls the output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, day)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

/// Default configuration, but retries happen without sleeping.
pub fn test_config() -> PlannerConfig {
    PlannerConfig {
        retry: RetryPolicy::immediate(3),
        ..PlannerConfig::default()
    }
}

pub fn planner(
    geocoder: Arc<dyn GeocodingResolver>,
    router: Arc<dyn RouteProvider>,
    config: PlannerConfig,
) -> TripPlanner {
    let cache = Arc::new(ResolutionCache::new(geocoder, router, &config));
    TripPlanner::new(cache, config)
}

pub fn planner_with_places(
    geocoder: Arc<dyn GeocodingResolver>,
    router: Arc<dyn RouteProvider>,
    places: Arc<dyn PoiResolver>,
    config: PlannerConfig,
) -> TripPlanner {
    let cache = ResolutionCache::new(geocoder, router, &config).with_poi_resolver(places);
    TripPlanner::new(Arc::new(cache), config)
}

pub fn request(
    current: &Location,
    pickup: &Location,
    dropoff: &Location,
    cycle_used_hours: f64,
    departure: NaiveDateTime,
) -> TripRequest {
    TripRequest {
        current_location: current.name.to_string(),
        pickup_location: pickup.name.to_string(),
        dropoff_location: dropoff.name.to_string(),
        current_cycle_used_hours: cycle_used_hours,
        departure,
    }
}

// ============================================================================
// Geocoders
// ============================================================================

/// Resolves a fixed set of place names; anything else is a permanent miss.
pub struct StaticGeocoder {
    places: HashMap<String, Coordinate>,
    delay: Duration,
    calls: AtomicU32,
    down: AtomicBool,
}

impl StaticGeocoder {
    pub fn new(locations: &[Location]) -> Self {
        Self {
            places: locations
                .iter()
                .map(|location| (location.name.to_string(), location.coordinate()))
                .collect(),
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
            down: AtomicBool::new(false),
        }
    }

    /// Every lookup blocks for `delay` first, so concurrent callers overlap.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// While down, every lookup fails transiently.
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GeocodingResolver for StaticGeocoder {
    fn resolve(&self, place: &str) -> Result<Coordinate, GeocodingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.down.load(Ordering::SeqCst) {
            return Err(GeocodingError::transient(place, "503 Service Unavailable"));
        }
        self.places
            .get(place)
            .copied()
            .ok_or_else(|| GeocodingError::permanent(place, "no match"))
    }
}

// ============================================================================
// Routers
// ============================================================================

/// Returns the given legs for any request; geometry is the requested
/// coordinates joined by straight lines.
pub struct LegRouter {
    legs: Vec<LegSummary>,
    calls: AtomicU32,
}

impl LegRouter {
    /// `legs` as `(miles, driving hours)` per consecutive coordinate pair.
    pub fn new(legs: &[(f64, f64)]) -> Self {
        Self {
            legs: legs
                .iter()
                .map(|&(miles, hours)| LegSummary {
                    distance_miles: miles,
                    duration_secs: hours * HOUR as f64,
                })
                .collect(),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RouteProvider for LegRouter {
    fn route(&self, coordinates: &[Coordinate]) -> Result<RawRoute, RouteProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(RawRoute {
            geometry: Polyline::new(coordinates.to_vec()),
            distance_miles: self.legs.iter().map(|leg| leg.distance_miles).sum(),
            duration_secs: self.legs.iter().map(|leg| leg.duration_secs).sum(),
            legs: self.legs.clone(),
        })
    }
}

/// Road-like routes: great-circle distance stretched by a circuity factor,
/// driven at a constant highway speed.
pub struct CorridorRouter {
    pub circuity: f64,
    pub speed_mph: f64,
}

impl Default for CorridorRouter {
    fn default() -> Self {
        Self {
            circuity: 1.2,
            speed_mph: 55.0,
        }
    }
}

impl RouteProvider for CorridorRouter {
    fn route(&self, coordinates: &[Coordinate]) -> Result<RawRoute, RouteProviderError> {
        let legs: Vec<LegSummary> = coordinates
            .windows(2)
            .map(|pair| {
                let miles = great_circle_miles(pair[0], pair[1]) * self.circuity;
                LegSummary {
                    distance_miles: miles,
                    duration_secs: (miles / self.speed_mph * HOUR as f64).round(),
                }
            })
            .collect();
        Ok(RawRoute {
            geometry: Polyline::new(coordinates.to_vec()),
            distance_miles: legs.iter().map(|leg| leg.distance_miles).sum(),
            duration_secs: legs.iter().map(|leg| leg.duration_secs).sum(),
            legs,
        })
    }
}

/// Fails the first `failures` calls with `kind`, then defers to `inner`.
pub struct FlakyRouter<R> {
    inner: R,
    kind: FailureKind,
    failures_left: AtomicU32,
    calls: AtomicU32,
}

impl<R> FlakyRouter<R> {
    pub fn new(inner: R, failures: u32, kind: FailureKind) -> Self {
        Self {
            inner,
            kind,
            failures_left: AtomicU32::new(failures),
            calls: AtomicU32::new(0),
        }
    }

    /// Never recovers.
    pub fn down(inner: R) -> Self {
        Self::new(inner, u32::MAX, FailureKind::Transient)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<R: RouteProvider> RouteProvider for FlakyRouter<R> {
    fn route(&self, coordinates: &[Coordinate]) -> Result<RawRoute, RouteProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(RouteProviderError {
                kind: self.kind,
                message: "upstream unavailable".to_string(),
            });
        }
        self.inner.route(coordinates)
    }
}

// ============================================================================
// Place search
// ============================================================================

/// Puts one named place `offset_km` north of every search point, found only
/// by `keyword` and only when the search box reaches it.
pub struct RoadsidePlaces {
    keyword: &'static str,
    name: &'static str,
    offset_km: f64,
    searches: Mutex<Vec<(String, f64)>>,
}

impl RoadsidePlaces {
    pub fn new(keyword: &'static str, name: &'static str, offset_km: f64) -> Self {
        Self {
            keyword,
            name,
            offset_km,
            searches: Mutex::new(Vec::new()),
        }
    }

    /// `(keyword, radius_km)` of every search, in order.
    pub fn searches(&self) -> Vec<(String, f64)> {
        self.searches.lock().unwrap().clone()
    }
}

impl PoiResolver for RoadsidePlaces {
    fn search(
        &self,
        keyword: &str,
        near: Coordinate,
        radius_km: f64,
    ) -> Result<Option<PoiMatch>, GeocodingError> {
        self.searches
            .lock()
            .unwrap()
            .push((keyword.to_string(), radius_km));
        let place = Coordinate::new(near.lat + self.offset_km / 111.2, near.lng);
        if keyword != self.keyword || !BoundingBox::around(near, radius_km).contains(place) {
            return Ok(None);
        }
        Ok(Some(PoiMatch {
            name: self.name.to_string(),
            address: format!("{}, United States", self.name),
            coordinate: place,
        }))
    }
}
