//! End-to-end planning for one trip request, or many in parallel.

use std::sync::Arc;

use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cache::ResolutionCache;
use crate::config::{HosLimits, PlannerConfig};
use crate::error::{TripError, ValidationError};
use crate::logsheet::{build_log_sheets, DailyLogSheet};
use crate::planner::{plan_stops, Stop, StopKind, StopLabels};
use crate::poi::name_stops;
use crate::polyline::Polyline;
use crate::route::Route;
use crate::simulator::HosSimulator;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRequest {
    pub current_location: String,
    pub pickup_location: String,
    pub dropoff_location: String,
    /// On-duty hours already used in the rolling cycle.
    pub current_cycle_used_hours: f64,
    pub departure: NaiveDateTime,
}

impl TripRequest {
    pub fn validate(&self, limits: &HosLimits) -> Result<(), ValidationError> {
        for (field, value) in [
            ("current_location", &self.current_location),
            ("pickup_location", &self.pickup_location),
            ("dropoff_location", &self.dropoff_location),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::EmptyLocation(field));
            }
        }

        let limit_hours = limits.cycle_limit_secs() as f64 / 3600.0;
        if !(0.0..limit_hours).contains(&self.current_cycle_used_hours) {
            return Err(ValidationError::CycleHoursOutOfRange {
                value: self.current_cycle_used_hours,
                limit_hours,
            });
        }
        Ok(())
    }
}

/// Cycle position when the drop-off is complete.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleSummary {
    /// On-duty hours in the rolling window ending on the arrival day.
    pub rolling_hours: f64,
    pub hours_remaining: f64,
    pub last_reset: Option<NaiveDateTime>,
    pub completed_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripPlan {
    pub total_distance_miles: f64,
    pub total_driving_secs: i64,
    pub route_geometry: Polyline,
    pub stops: Vec<Stop>,
    pub log_sheets: Vec<DailyLogSheet>,
    /// True when any location or the route came from a fallback estimate.
    pub estimated: bool,
    pub cycle: CycleSummary,
}

impl TripPlan {
    pub fn count(&self, kind: StopKind) -> usize {
        self.stops.iter().filter(|stop| stop.kind == kind).count()
    }
}

pub struct TripPlanner {
    cache: Arc<ResolutionCache>,
    config: PlannerConfig,
}

impl TripPlanner {
    pub fn new(cache: Arc<ResolutionCache>, config: PlannerConfig) -> Self {
        Self { cache, config }
    }

    pub fn cache(&self) -> &Arc<ResolutionCache> {
        &self.cache
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Plans a single trip: resolve the three locations, route through
    /// them, simulate the drive, name fuel and rest stops after nearby
    /// places, then cut the timeline into daily sheets.
    pub fn plan(&self, request: &TripRequest) -> Result<TripPlan, TripError> {
        request.validate(&self.config.hos)?;

        let current = self.cache.geocode(&request.current_location)?;
        let pickup = self.cache.geocode(&request.pickup_location)?;
        let dropoff = self.cache.geocode(&request.dropoff_location)?;
        let coordinates = [*current.value(), *pickup.value(), *dropoff.value()];

        let raw = self.cache.route(&coordinates)?;
        let estimated = current.is_estimated()
            || pickup.is_estimated()
            || dropoff.is_estimated()
            || raw.is_estimated();

        let route = Route::from_raw(
            raw.value(),
            &coordinates,
            self.config.fallback.waypoint_spacing_miles,
        )?;
        let sim = HosSimulator::new(
            self.config.hos.clone(),
            request.current_cycle_used_hours,
            request.departure,
            coordinates[0],
        )?;
        let labels = StopLabels {
            pickup: format!("Pickup at {}", request.pickup_location.trim()),
            dropoff: format!("Dropoff at {}", request.dropoff_location.trim()),
        };

        let stop_plan = plan_stops(&route, sim, &self.config.stops, &labels, estimated)?;
        let timeline = stop_plan.timeline;
        let mut stops = stop_plan.stops;
        name_stops(&self.cache, &self.config.poi, &mut stops);
        let log_sheets = build_log_sheets(&timeline.segments, &stops, &self.config.hos, estimated)?;

        let rolling_secs = timeline
            .state
            .rolling_secs(timeline.end.date(), self.config.hos.cycle_days);
        let cycle = CycleSummary {
            rolling_hours: rolling_secs as f64 / 3600.0,
            hours_remaining: (self.config.hos.cycle_limit_secs() - rolling_secs).max(0) as f64
                / 3600.0,
            last_reset: timeline.state.last_reset(),
            completed_at: timeline.end,
        };
        let total_driving_secs: i64 = log_sheets
            .iter()
            .map(|sheet| sheet.totals.driving_secs)
            .sum();

        let plan = TripPlan {
            total_distance_miles: route.total_miles(),
            total_driving_secs,
            route_geometry: route.geometry().clone(),
            stops,
            log_sheets,
            estimated,
            cycle,
        };

        info!(
            from = %request.current_location,
            to = %request.dropoff_location,
            miles = plan.total_distance_miles,
            stops = plan.stops.len(),
            rests = plan.count(StopKind::Rest),
            fuel = plan.count(StopKind::Fuel),
            days = plan.log_sheets.len(),
            estimated,
            "Trip planned"
        );
        Ok(plan)
    }

    /// Plans independent trips in parallel. Trips sharing locations share
    /// the cache, so each place is geocoded once.
    pub fn plan_batch(&self, requests: &[TripRequest]) -> Vec<Result<TripPlan, TripError>> {
        let plans: Vec<_> = requests.par_iter().map(|request| self.plan(request)).collect();
        self.cache.log_stats();
        plans
    }
}
