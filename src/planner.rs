//! Stop placement along a normalized route.

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::debug;

use crate::config::StopPolicy;
use crate::cycle::Rule;
use crate::error::PlanningError;
use crate::poi::NearbyPoi;
use crate::route::Route;
use crate::simulator::{Activity, ForcedRest, HosSimulator, Timeline};
use crate::traits::Coordinate;

/// Stops closer together than this are the same stop.
const SAME_PLACE_MILES: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopKind {
    Pickup,
    Fuel,
    Rest,
    Dropoff,
}

impl StopKind {
    /// Which kind names a stop when several events share one location.
    fn precedence(self) -> u8 {
        match self {
            StopKind::Pickup | StopKind::Dropoff => 3,
            StopKind::Rest => 2,
            StopKind::Fuel => 1,
        }
    }
}

/// A secondary event folded into a stop at the same location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopNote {
    pub kind: StopKind,
    pub label: String,
    pub rule: Option<Rule>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stop {
    pub kind: StopKind,
    pub label: String,
    pub location: Coordinate,
    /// Route distance from the trip origin.
    pub distance_miles: f64,
    pub arrival: NaiveDateTime,
    pub departure: NaiveDateTime,
    pub duration_secs: i64,
    /// For rest stops, the limit that mandated it.
    pub rule: Option<Rule>,
    pub notes: Vec<StopNote>,
    pub estimated: bool,
    /// Named fuel station or rest area near a fuel or rest stop.
    pub poi: Option<NearbyPoi>,
    /// A fuel or rest stop for which no named place was found.
    pub poi_fallback: bool,
}

/// Names used for the pickup and drop-off stops.
#[derive(Debug, Clone, PartialEq)]
pub struct StopLabels {
    pub pickup: String,
    pub dropoff: String,
}

impl Default for StopLabels {
    fn default() -> Self {
        Self {
            pickup: "Pickup".to_string(),
            dropoff: "Dropoff".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StopPlan {
    pub stops: Vec<Stop>,
    pub timeline: Timeline,
}

#[derive(Debug, Clone)]
struct Event {
    kind: StopKind,
    label: String,
    rule: Option<Rule>,
    location: Coordinate,
    distance_miles: f64,
    start: NaiveDateTime,
    end: NaiveDateTime,
}

struct PlannerState<'a> {
    sim: HosSimulator,
    policy: &'a StopPolicy,
    events: Vec<Event>,
    fuel_stops: usize,
    rest_stops: usize,
}

impl PlannerState<'_> {
    fn record_rest(&mut self, rest: ForcedRest, distance_miles: f64) {
        self.rest_stops += 1;
        debug!(
            rule = ?rest.rule,
            distance_miles,
            start = %rest.start,
            "Rest stop"
        );
        self.events.push(Event {
            kind: StopKind::Rest,
            label: format!("Rest stop #{} ({})", self.rest_stops, rest.rule.describe()),
            rule: Some(rest.rule),
            location: rest.location,
            distance_miles,
            start: rest.start,
            end: rest.end,
        });
    }

    fn record_activity(&mut self, kind: StopKind, label: String, activity: Activity, distance_miles: f64) {
        if let Some(rest) = activity.forced {
            self.record_rest(rest, distance_miles);
        }
        self.events.push(Event {
            kind,
            label,
            rule: None,
            location: self.sim.position(),
            distance_miles,
            start: activity.start,
            end: activity.end,
        });
    }

    /// Drives from the current position to `to`, honoring every forced rest.
    fn drive(
        &mut self,
        mut miles: f64,
        mut secs: i64,
        to: Coordinate,
        start_miles: f64,
    ) -> Result<(), PlanningError> {
        let mut travelled = start_miles;
        loop {
            let step = self.sim.advance(miles, secs, to);
            if let Some(rest) = step.forced {
                self.record_rest(rest, travelled);
            }
            if step.duration_secs == 0 && secs > 0 {
                return Err(PlanningError::DegenerateRoute(format!(
                    "no driving time available at {}",
                    self.sim.clock()
                )));
            }
            travelled += step.distance_miles;
            miles -= step.distance_miles;
            secs -= step.duration_secs;
            if secs <= 0 {
                return Ok(());
            }
        }
    }
}

/// Plans pickup, fuel, rest and drop-off stops along `route`.
///
/// The route's first anchor is the driver's current location, the second
/// the pickup, the last the drop-off.
pub fn plan_stops(
    route: &Route,
    sim: HosSimulator,
    policy: &StopPolicy,
    labels: &StopLabels,
    estimated: bool,
) -> Result<StopPlan, PlanningError> {
    let waypoints = route.waypoints();
    if waypoints.len() < 2 {
        return Err(PlanningError::DegenerateRoute(
            "route has fewer than two waypoints".to_string(),
        ));
    }
    let last = waypoints.len() - 1;
    let pickup = route.anchor(1).filter(|&index| index < last).ok_or_else(|| {
        PlanningError::DegenerateRoute("pickup coincides with the drop-off".to_string())
    })?;
    if waypoints[last].cumulative_miles <= waypoints[pickup].cumulative_miles {
        return Err(PlanningError::DegenerateRoute(
            "drop-off does not lie beyond the pickup".to_string(),
        ));
    }

    let mut state = PlannerState {
        sim,
        policy,
        events: Vec::new(),
        fuel_stops: 0,
        rest_stops: 0,
    };
    let mut since_fuel = 0.0;

    for index in 0..=last {
        let here = waypoints[index];
        if index > 0 {
            let prev = waypoints[index - 1];
            let miles = here.cumulative_miles - prev.cumulative_miles;
            // Rounding the cumulative values keeps the driven total exact.
            let secs = here.cumulative_secs.round() as i64 - prev.cumulative_secs.round() as i64;
            state.drive(miles, secs, here.coordinate, prev.cumulative_miles)?;
            since_fuel += miles;
        }

        if index == pickup {
            let activity = state.sim.perform_on_duty(state.policy.pickup_minutes * 60);
            state.record_activity(StopKind::Pickup, labels.pickup.clone(), activity, here.cumulative_miles);
        }

        if index < last {
            let next_leg = waypoints[index + 1].cumulative_miles - here.cumulative_miles;
            if since_fuel > 0.0 && since_fuel + next_leg > state.policy.fuel_range_miles {
                // A pending rest comes first; fueling follows it.
                if let Some(rest) = state.sim.rest_if_required() {
                    state.record_rest(rest, here.cumulative_miles);
                }
                state.fuel_stops += 1;
                let activity = state.sim.perform_on_duty(state.policy.fuel_minutes * 60);
                let label = format!("Fuel stop #{}", state.fuel_stops);
                state.record_activity(StopKind::Fuel, label, activity, here.cumulative_miles);
                since_fuel = 0.0;
            }
        } else {
            let activity = state.sim.perform_on_duty(state.policy.dropoff_minutes * 60);
            state.record_activity(StopKind::Dropoff, labels.dropoff.clone(), activity, here.cumulative_miles);
        }
    }

    let stops = fold_events(state.events, estimated);
    Ok(StopPlan {
        stops,
        timeline: state.sim.finish(),
    })
}

/// Merges events at the same route distance into a single stop.
///
/// The highest-precedence event names the stop (the earliest one on a
/// tie); the others are kept as notes with their own times.
fn fold_events(events: Vec<Event>, estimated: bool) -> Vec<Stop> {
    let mut groups: Vec<Vec<Event>> = Vec::new();
    for event in events {
        match groups.last_mut() {
            Some(group)
                if (event.distance_miles - group[0].distance_miles).abs() < SAME_PLACE_MILES =>
            {
                group.push(event)
            }
            _ => groups.push(vec![event]),
        }
    }

    groups
        .into_iter()
        .filter_map(|mut group| {
            let arrival = group.first()?.start;
            let departure = group.last()?.end;
            let primary_index = group
                .iter()
                .enumerate()
                .fold(0, |best, (i, event)| {
                    if event.kind.precedence() > group[best].kind.precedence() { i } else { best }
                });
            let primary = group.remove(primary_index);
            let notes = group
                .into_iter()
                .map(|event| StopNote {
                    kind: event.kind,
                    label: event.label,
                    rule: event.rule,
                    start: event.start,
                    end: event.end,
                })
                .collect();
            Some(Stop {
                kind: primary.kind,
                label: primary.label,
                location: primary.location,
                distance_miles: primary.distance_miles,
                arrival,
                departure,
                duration_secs: (departure - arrival).num_seconds(),
                rule: primary.rule,
                notes,
                estimated,
                poi: None,
                poi_fallback: false,
            })
        })
        .collect()
}
