//! Real U.S. freight-corridor locations for trip fixtures.
//!
//! City-center coordinates from OpenStreetMap. Names are what a dispatcher
//! would type into a trip request.

use hos_planner::traits::Coordinate;

/// A named location with coordinates.
#[derive(Debug, Clone)]
pub struct Location {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }
}

// ============================================================================
// I-35 / I-40 (south-central)
// ============================================================================

pub const DALLAS: Location = Location::new("Dallas, TX", 32.7767, -96.7970);
pub const HOUSTON: Location = Location::new("Houston, TX", 29.7604, -95.3698);
pub const OKLAHOMA_CITY: Location = Location::new("Oklahoma City, OK", 35.4676, -97.5164);
pub const TULSA: Location = Location::new("Tulsa, OK", 36.1540, -95.9928);
pub const AMARILLO: Location = Location::new("Amarillo, TX", 35.2220, -101.8313);
pub const ALBUQUERQUE: Location = Location::new("Albuquerque, NM", 35.0844, -106.6504);
pub const MEMPHIS: Location = Location::new("Memphis, TN", 35.1495, -90.0490);

// ============================================================================
// West coast and southwest
// ============================================================================

pub const LOS_ANGELES: Location = Location::new("Los Angeles, CA", 34.0522, -118.2437);
pub const PHOENIX: Location = Location::new("Phoenix, AZ", 33.4484, -112.0740);
pub const SEATTLE: Location = Location::new("Seattle, WA", 47.6062, -122.3321);
pub const PORTLAND: Location = Location::new("Portland, OR", 45.5152, -122.6784);

// ============================================================================
// Midwest and east
// ============================================================================

pub const CHICAGO: Location = Location::new("Chicago, IL", 41.8781, -87.6298);
pub const INDIANAPOLIS: Location = Location::new("Indianapolis, IN", 39.7684, -86.1581);
pub const ATLANTA: Location = Location::new("Atlanta, GA", 33.7490, -84.3880);
pub const MIAMI: Location = Location::new("Miami, FL", 25.7617, -80.1918);
pub const NEWARK: Location = Location::new("Newark, NJ", 40.7357, -74.1724);

pub const ALL: &[Location] = &[
    DALLAS,
    HOUSTON,
    OKLAHOMA_CITY,
    TULSA,
    AMARILLO,
    ALBUQUERQUE,
    MEMPHIS,
    LOS_ANGELES,
    PHOENIX,
    SEATTLE,
    PORTLAND,
    CHICAGO,
    INDIANAPOLIS,
    ATLANTA,
    MIAMI,
    NEWARK,
];
