//! Resolution cache: coalescing, expiry, retry and fallback.

mod fixtures;

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use fixtures::*;
use hos_planner::error::PlanningError;
use hos_planner::fallback::Resolution;
use hos_planner::planner::StopKind;
use hos_planner::{PlannerConfig, ResolutionCache, TripError};

fn cache_with(geocoder: Arc<StaticGeocoder>, config: &PlannerConfig) -> ResolutionCache {
    ResolutionCache::new(geocoder, Arc::new(CorridorRouter::default()), config)
}

fn expiring_config() -> PlannerConfig {
    PlannerConfig {
        cache_ttl_secs: 0,
        ..test_config()
    }
}

#[test]
fn test_concurrent_lookups_share_one_call() {
    init_tracing();
    let geocoder = Arc::new(StaticGeocoder::new(ALL).with_delay(Duration::from_millis(200)));
    let cache = Arc::new(cache_with(geocoder.clone(), &test_config()));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.geocode(DALLAS.name)
            })
        })
        .collect();

    for handle in handles {
        let result = handle.join().expect("thread panicked");
        assert_eq!(result, Ok(Resolution::Resolved(DALLAS.coordinate())));
    }

    let stats = cache.stats();
    assert_eq!(geocoder.calls(), 1);
    assert_eq!(stats.external_calls, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits + stats.coalesced, 7);
}

#[test]
fn test_concurrent_waiters_share_the_failure() {
    let geocoder = Arc::new(StaticGeocoder::new(ALL).with_delay(Duration::from_millis(100)));
    geocoder.set_down(true);
    let cache = Arc::new(cache_with(geocoder.clone(), &test_config()));
    let barrier = Arc::new(Barrier::new(4));

    let results: Vec<_> = (0..4)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.geocode(MEMPHIS.name)
            })
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|handle| handle.join().expect("thread panicked"))
        .collect();

    // One leader, three attempts; every waiter sees the same terminal error.
    assert_eq!(geocoder.calls(), 3);
    for result in &results {
        assert_eq!(result, &results[0]);
    }
    assert!(matches!(
        results[0],
        Err(TripError::Planning(PlanningError::Unresolvable { attempts: 3, .. }))
    ));
}

#[test]
fn test_fresh_entries_are_reused() {
    let geocoder = Arc::new(StaticGeocoder::new(ALL));
    let cache = cache_with(geocoder.clone(), &test_config());

    cache.geocode("Tulsa, OK").unwrap();
    cache.geocode("  tulsa, ok ").unwrap();

    assert_eq!(geocoder.calls(), 1);
    assert_eq!(cache.stats().hits, 1);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_expired_entries_are_resolved_again() {
    let geocoder = Arc::new(StaticGeocoder::new(ALL));
    let cache = cache_with(geocoder.clone(), &expiring_config());

    cache.geocode(TULSA.name).unwrap();
    cache.geocode(TULSA.name).unwrap();

    assert_eq!(geocoder.calls(), 2);
    assert_eq!(cache.stats().hits, 0);
    assert_eq!(cache.stats().misses, 2);
}

#[test]
fn test_outage_reuses_expired_coordinate_as_estimate() {
    let geocoder = Arc::new(StaticGeocoder::new(ALL));
    let cache = cache_with(geocoder.clone(), &expiring_config());

    assert_eq!(
        cache.geocode(ATLANTA.name),
        Ok(Resolution::Resolved(ATLANTA.coordinate()))
    );
    geocoder.set_down(true);
    assert_eq!(
        cache.geocode(ATLANTA.name),
        Ok(Resolution::Estimated(ATLANTA.coordinate()))
    );
    assert_eq!(geocoder.calls(), 4);
}

#[test]
fn test_outage_without_history_is_unresolvable() {
    let geocoder = Arc::new(StaticGeocoder::new(ALL));
    geocoder.set_down(true);
    let cache = cache_with(geocoder.clone(), &test_config());

    let err = cache.geocode(NEWARK.name).unwrap_err();
    assert!(matches!(
        err,
        TripError::Planning(PlanningError::Unresolvable { ref place, attempts: 3, .. })
            if place == NEWARK.name
    ));
}

#[test]
fn test_clear_forgets_everything() {
    let geocoder = Arc::new(StaticGeocoder::new(ALL));
    let cache = cache_with(geocoder.clone(), &test_config());

    cache.geocode(PHOENIX.name).unwrap();
    cache.route(&[PHOENIX.coordinate(), LOS_ANGELES.coordinate()]).unwrap();
    assert_eq!(cache.len(), 2);

    cache.clear();
    assert!(cache.is_empty());
    cache.geocode(PHOENIX.name).unwrap();
    assert_eq!(geocoder.calls(), 2);
}

#[test]
fn test_routes_are_cached_but_estimates_are_not() {
    let config = test_config();
    let router = Arc::new(LegRouter::new(&[(400.0, 7.0)]));
    let cache = ResolutionCache::new(Arc::new(StaticGeocoder::new(ALL)), router.clone(), &config);
    let coords = [PHOENIX.coordinate(), LOS_ANGELES.coordinate()];

    assert!(!cache.route(&coords).unwrap().is_estimated());
    cache.route(&coords).unwrap();
    assert_eq!(router.calls(), 1);

    let down = Arc::new(FlakyRouter::down(CorridorRouter::default()));
    let cache = ResolutionCache::new(Arc::new(StaticGeocoder::new(ALL)), down.clone(), &config);
    assert!(cache.route(&coords).unwrap().is_estimated());
    assert!(cache.route(&coords).unwrap().is_estimated());
    assert_eq!(down.calls(), 6);
    assert!(cache.is_empty());
}

#[test]
fn test_batch_planning_geocodes_each_place_once() {
    init_tracing();
    let geocoder = Arc::new(StaticGeocoder::new(ALL).with_delay(Duration::from_millis(20)));
    let planner = planner(
        geocoder.clone(),
        Arc::new(CorridorRouter::default()),
        test_config(),
    );

    let requests = vec![
        request(&DALLAS, &HOUSTON, &ATLANTA, 0.0, at(10, 6, 0)),
        request(&DALLAS, &OKLAHOMA_CITY, &CHICAGO, 12.0, at(10, 6, 0)),
        request(&HOUSTON, &DALLAS, &MEMPHIS, 30.0, at(10, 8, 0)),
        request(&TULSA, &OKLAHOMA_CITY, &DALLAS, 0.0, at(11, 5, 0)),
        request(&MEMPHIS, &ATLANTA, &CHICAGO, 45.0, at(11, 5, 0)),
        request(&CHICAGO, &INDIANAPOLIS, &NEWARK, 60.0, at(12, 22, 0)),
    ];
    let places: HashSet<&str> = requests
        .iter()
        .flat_map(|req| {
            [
                req.current_location.as_str(),
                req.pickup_location.as_str(),
                req.dropoff_location.as_str(),
            ]
        })
        .collect();

    let plans = planner.plan_batch(&requests);

    assert_eq!(plans.len(), requests.len());
    for plan in &plans {
        let plan = plan.as_ref().expect("plan");
        assert!(!plan.estimated);
    }
    assert_eq!(geocoder.calls() as usize, places.len());
}

#[test]
fn test_place_searches_are_cached_across_plans() {
    let places = Arc::new(RoadsidePlaces::new("truck stop", "Flying J Travel Center", 5.0));
    let planner = planner_with_places(
        Arc::new(StaticGeocoder::new(ALL)),
        Arc::new(CorridorRouter::default()),
        places.clone(),
        test_config(),
    );
    let req = request(&SEATTLE, &PORTLAND, &CHICAGO, 0.0, at(10, 6, 0));

    let first = planner.plan(&req).expect("plan");
    let searched = places.searches().len();
    assert!(searched > 0);

    let second = planner.plan(&req).expect("plan");
    assert_eq!(places.searches().len(), searched);
    assert_eq!(first, second);
    assert!(
        first
            .stops
            .iter()
            .filter(|stop| stop.kind == StopKind::Fuel)
            .all(|stop| stop.poi.as_ref().map(|poi| poi.search_radius_km) == Some(10.0))
    );
}
