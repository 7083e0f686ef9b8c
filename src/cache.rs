//! Caching and request coalescing in front of the geocoder and router.
//!
//! # Architecture
//!
//! ```text
//! Trip A ─┐
//!         │                                         GeocodingResolver /
//! Trip B ─┼──► ResolutionCache ──► retry ──► one ──► RouteProvider
//!         │        │                 │       call
//! Trip C ─┘        │                 └── exhausted ──► FallbackPolicy
//!                  ▼
//!        [A, B, C all receive the same outcome]
//! ```
//!
//! A `ResolutionCache` is created once per service instance and shared
//! through an `Arc`. Each key has at most one resolution in flight: the
//! first caller runs it inside a `OnceCell`, everyone arriving meanwhile
//! blocks on the same cell and clones its outcome, success or failure.
//! Only provider-confirmed values are cached; estimates and failures are
//! retried by the next caller. Nearby-place searches share the same
//! machinery, and a confirmed "nothing there" is cached like any answer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::PlannerConfig;
use crate::error::TripError;
use crate::fallback::{FallbackPolicy, Resolution};
use crate::retry::{Attempt, RetryPolicy};
use crate::traits::{Coordinate, GeocodingResolver, PoiMatch, PoiResolver, RawRoute, RouteProvider};

type Outcome<V> = Result<Resolution<V>, TripError>;

/// Statistics for monitoring cache effectiveness.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from a fresh cache entry.
    pub hits: u64,
    /// Lookups that had to resolve.
    pub misses: u64,
    /// Lookups that waited for another caller's in-flight resolution.
    pub coalesced: u64,
    /// Calls made to the geocoder, router or place search, retries included.
    pub external_calls: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    external_calls: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            external_calls: self.external_calls.load(Ordering::Relaxed),
        }
    }
}

struct Entry<V> {
    value: V,
    stored_at: Instant,
}

/// One keyspace: confirmed values plus the resolutions currently running.
struct Keyed<V> {
    resolved: DashMap<String, Entry<V>>,
    in_flight: DashMap<String, Arc<OnceCell<Outcome<V>>>>,
    ttl: Duration,
}

impl<V: Clone> Keyed<V> {
    fn new(ttl: Duration) -> Self {
        Self {
            resolved: DashMap::new(),
            in_flight: DashMap::new(),
            ttl,
        }
    }

    fn fresh(&self, key: &str) -> Option<V> {
        self.resolved
            .get(key)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.value.clone())
    }

    /// Any value ever confirmed for `key`, however old.
    fn known(&self, key: &str) -> Option<V> {
        self.resolved.get(key).map(|entry| entry.value.clone())
    }

    fn get_or_resolve<F>(&self, key: &str, counters: &Counters, resolve: F) -> Outcome<V>
    where
        F: FnOnce() -> Outcome<V>,
    {
        if let Some(value) = self.fresh(key) {
            Counters::bump(&counters.hits);
            debug!(key, "Cache hit");
            return Ok(Resolution::Resolved(value));
        }

        // Clone the cell out so the map shard is not locked while resolving.
        let cell = self
            .in_flight
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .value()
            .clone();

        let mut leader = false;
        let outcome = cell
            .get_or_init(|| {
                leader = true;
                // A previous leader may have finished between our lookup and
                // registering the cell.
                if let Some(value) = self.fresh(key) {
                    Counters::bump(&counters.hits);
                    return Ok(Resolution::Resolved(value));
                }
                Counters::bump(&counters.misses);
                let outcome = resolve();
                if let Ok(Resolution::Resolved(value)) = &outcome {
                    self.resolved.insert(
                        key.to_string(),
                        Entry {
                            value: value.clone(),
                            stored_at: Instant::now(),
                        },
                    );
                }
                outcome
            })
            .clone();

        if leader {
            self.in_flight.remove_if(key, |_, current| Arc::ptr_eq(current, &cell));
        } else {
            Counters::bump(&counters.coalesced);
            debug!(key, "Coalesced with in-flight resolution");
        }
        outcome
    }

    fn len(&self) -> usize {
        self.resolved.len()
    }

    fn clear(&self) {
        self.resolved.clear();
    }
}

pub struct ResolutionCache {
    geocoder: Arc<dyn GeocodingResolver>,
    router: Arc<dyn RouteProvider>,
    poi_resolver: Option<Arc<dyn PoiResolver>>,
    retry: RetryPolicy,
    fallback: FallbackPolicy,
    places: Keyed<Coordinate>,
    routes: Keyed<RawRoute>,
    pois: Keyed<Option<PoiMatch>>,
    counters: Counters,
}

impl ResolutionCache {
    pub fn new(
        geocoder: Arc<dyn GeocodingResolver>,
        router: Arc<dyn RouteProvider>,
        config: &PlannerConfig,
    ) -> Self {
        let ttl = Duration::from_secs(config.cache_ttl_secs);
        Self {
            geocoder,
            router,
            poi_resolver: None,
            retry: config.retry.clone(),
            fallback: FallbackPolicy::new(&config.fallback),
            places: Keyed::new(ttl),
            routes: Keyed::new(ttl),
            pois: Keyed::new(ttl),
            counters: Counters::default(),
        }
    }

    /// Enables [`ResolutionCache::find_poi`]; without a resolver every
    /// search comes back empty.
    pub fn with_poi_resolver(mut self, resolver: Arc<dyn PoiResolver>) -> Self {
        self.poi_resolver = Some(resolver);
        self
    }

    /// Resolves a place name, retrying transient failures.
    ///
    /// Permanent geocoder failures are returned as-is. When retries run out,
    /// a previously known coordinate is reused as an estimate; a place that
    /// was never resolved fails with `PlanningError::Unresolvable`.
    pub fn geocode(&self, place: &str) -> Result<Resolution<Coordinate>, TripError> {
        let key = place_key(place);
        self.places.get_or_resolve(&key, &self.counters, || {
            let attempt = self.retry.run("geocode", |_| {
                Counters::bump(&self.counters.external_calls);
                self.geocoder.resolve(place)
            });
            match attempt {
                Attempt::Success { value, attempts } => {
                    debug!(place, attempts, "Geocoded");
                    Ok(Resolution::Resolved(value))
                }
                Attempt::Permanent { error, .. } => Err(error.into()),
                Attempt::Exhausted { error, attempts } => self
                    .fallback
                    .recover_place(self.places.known(&key), &error, attempts)
                    .map_err(TripError::from),
            }
        })
    }

    /// Routes through `coordinates` in order, falling back to a straight-line
    /// estimate when the router stays unavailable.
    pub fn route(&self, coordinates: &[Coordinate]) -> Result<Resolution<RawRoute>, TripError> {
        let key = route_key(coordinates);
        self.routes.get_or_resolve(&key, &self.counters, || {
            let attempt = self.retry.run("route", |_| {
                Counters::bump(&self.counters.external_calls);
                self.router.route(coordinates)
            });
            match attempt {
                Attempt::Success { value, attempts } => {
                    debug!(
                        points = value.geometry.len(),
                        miles = value.distance_miles,
                        attempts,
                        "Routed"
                    );
                    Ok(Resolution::Resolved(value))
                }
                Attempt::Permanent { error, .. } => Err(error.into()),
                Attempt::Exhausted { error, attempts } => {
                    Ok(self.fallback.recover_route(coordinates, &error, attempts))
                }
            }
        })
    }

    /// Searches for `keyword` within `radius_km` of `near`.
    ///
    /// A failed search is logged and reads as no match: a stop without a
    /// named place keeps its generic label, so it never fails a trip.
    pub fn find_poi(&self, keyword: &str, near: Coordinate, radius_km: f64) -> Option<PoiMatch> {
        let resolver = self.poi_resolver.as_ref()?;
        let key = poi_key(keyword, near, radius_km);
        let outcome = self.pois.get_or_resolve(&key, &self.counters, || {
            let attempt = self.retry.run("poi", |_| {
                Counters::bump(&self.counters.external_calls);
                resolver.search(keyword, near, radius_km)
            });
            match attempt {
                Attempt::Success { value, .. } => Ok(Resolution::Resolved(value)),
                Attempt::Permanent { error, .. } | Attempt::Exhausted { error, .. } => {
                    Err(error.into())
                }
            }
        });
        match outcome {
            Ok(found) => found.into_inner(),
            Err(err) => {
                warn!(keyword, radius_km, error = %err, "Place search failed");
                None
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }

    /// Number of cached places, routes and place searches.
    pub fn len(&self) -> usize {
        self.places.len() + self.routes.len() + self.pois.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.places.clear();
        self.routes.clear();
        self.pois.clear();
    }

    pub fn log_stats(&self) {
        let stats = self.stats();
        info!(
            hits = stats.hits,
            misses = stats.misses,
            coalesced = stats.coalesced,
            external_calls = stats.external_calls,
            cached = self.len(),
            "Resolution cache statistics"
        );
    }
}

/// Case-insensitive key with punctuation and spacing folded to `_`.
pub fn place_key(place: &str) -> String {
    format!("geocode_{}", fold(place))
}

/// Search coordinates are rounded to about 10 m so nearby repeats share a key.
pub fn poi_key(keyword: &str, near: Coordinate, radius_km: f64) -> String {
    format!(
        "poi_{}_{:.4},{:.4}_{}",
        fold(keyword),
        near.lat,
        near.lng,
        radius_km
    )
}

fn fold(text: &str) -> String {
    text.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

pub fn route_key(coordinates: &[Coordinate]) -> String {
    let joined = coordinates
        .iter()
        .map(|c| format!("{:.6},{:.6}", c.lat, c.lng))
        .collect::<Vec<_>>()
        .join(";");
    format!("route_{}", joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_key_normalization() {
        assert_eq!(place_key("Dallas, TX"), "geocode_dallas__tx");
        assert_eq!(place_key("  dallas, tx "), place_key("DALLAS, TX"));
        assert_ne!(place_key("Dallas, TX"), place_key("Dallas, GA"));
    }

    #[test]
    fn test_poi_key_includes_keyword_place_and_radius() {
        let here = Coordinate::new(35.19321, -101.74123);
        let nearby = Coordinate::new(35.19324, -101.74119);
        assert_eq!(poi_key("Truck Stop", here, 10.0), "poi_truck_stop_35.1932,-101.7412_10");
        assert_eq!(poi_key("truck stop", here, 10.0), poi_key("truck stop", nearby, 10.0));
        assert_ne!(poi_key("truck stop", here, 10.0), poi_key("truck stop", here, 20.0));
        assert_ne!(poi_key("truck stop", here, 10.0), poi_key("rest area", here, 10.0));
    }

    #[test]
    fn test_route_key_is_order_sensitive() {
        let a = Coordinate::new(32.7767, -96.7970);
        let b = Coordinate::new(29.7604, -95.3698);
        assert_ne!(route_key(&[a, b]), route_key(&[b, a]));
        assert_eq!(route_key(&[a, b]), route_key(&[a, b]));
    }
}
