//! hos-planner
//!
//! FMCSA hours-of-service stop insertion and duty-cycle simulation for
//! property-carrying truck trips: place pickup, fuel, rest and drop-off
//! stops along a route and produce per-day duty log sheets.

pub mod traits;
pub mod error;
pub mod config;
pub mod duty;
pub mod cycle;
pub mod simulator;
pub mod route;
pub mod planner;
pub mod logsheet;
pub mod poi;
pub mod trip;
pub mod retry;
pub mod fallback;
pub mod cache;
pub mod osrm;
pub mod nominatim;
pub mod haversine;
pub mod polyline;

pub use cache::{CacheStats, ResolutionCache};
pub use config::{HosLimits, PlannerConfig};
pub use error::TripError;
pub use trip::{TripPlan, TripPlanner, TripRequest};
