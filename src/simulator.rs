//! Duty-status state machine.
//!
//! The simulator owns the clock, the driver's position and the
//! [`CycleState`]. Callers feed it route increments and on-duty activities;
//! it refuses to drive past any limit and inserts the mandated break,
//! daily reset or 34-hour restart before driving resumes.

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use tracing::debug;

use crate::config::HosLimits;
use crate::cycle::{CycleState, Rule};
use crate::duty::{DutySegment, DutyStatus};
use crate::error::PlanningError;
use crate::haversine::intermediate;
use crate::traits::Coordinate;

/// A non-driving segment the simulator inserted because a limit was hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForcedRest {
    pub rule: Rule,
    pub status: DutyStatus,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub location: Coordinate,
}

impl ForcedRest {
    pub fn duration_secs(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }

    pub fn segment(&self) -> DutySegment {
        DutySegment {
            status: self.status,
            start: self.start,
            end: self.end,
            start_location: self.location,
            end_location: self.location,
            distance_miles: 0.0,
        }
    }
}

/// Result of one [`HosSimulator::advance`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct Advance {
    /// Segments emitted by this call, in order.
    pub segments: Vec<DutySegment>,
    /// Mandated rest inserted before driving, if any.
    pub forced: Option<ForcedRest>,
    /// Distance actually driven; less than requested when a limit was reached.
    pub distance_miles: f64,
    pub duration_secs: i64,
}

/// Result of an on-duty, not-driving activity.
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    pub forced: Option<ForcedRest>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Everything a finished simulation produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    pub segments: Vec<DutySegment>,
    pub state: CycleState,
    pub end: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct HosSimulator {
    limits: HosLimits,
    state: CycleState,
    clock: NaiveDateTime,
    position: Coordinate,
    segments: Vec<DutySegment>,
    /// Distance covered in zero-time increments, credited to the next drive.
    carry_miles: f64,
}

impl HosSimulator {
    pub fn new(
        limits: HosLimits,
        cycle_used_hours: f64,
        start: NaiveDateTime,
        origin: Coordinate,
    ) -> Result<Self, PlanningError> {
        // Truncated so any value below the limit still reaches the restart path.
        let used_secs = (cycle_used_hours.max(0.0) * 3600.0).floor() as i64;
        if !cycle_used_hours.is_finite() || used_secs >= limits.cycle_limit_secs() {
            return Err(PlanningError::CycleExhausted {
                used_hours: cycle_used_hours,
                limit_hours: limits.cycle_limit_secs() as f64 / 3600.0,
            });
        }

        Ok(Self {
            state: CycleState::new(used_secs, start),
            limits,
            clock: start,
            position: origin,
            segments: Vec::new(),
            carry_miles: 0.0,
        })
    }

    pub fn clock(&self) -> NaiveDateTime {
        self.clock
    }

    pub fn position(&self) -> Coordinate {
        self.position
    }

    pub fn cycle(&self) -> &CycleState {
        &self.state
    }

    pub fn segments(&self) -> &[DutySegment] {
        &self.segments
    }

    pub fn query_remaining_driving_minutes(&self) -> i64 {
        let remaining = self.state.remaining(&self.limits, self.clock);
        remaining.driving.max(0) / 60
    }

    pub fn query_remaining_window_minutes(&self) -> i64 {
        let remaining = self.state.remaining(&self.limits, self.clock);
        remaining.window.max(0) / 60
    }

    pub fn query_cycle_hours_remaining(&self) -> f64 {
        let remaining = self.state.remaining(&self.limits, self.clock);
        remaining.cycle.max(0) as f64 / 3600.0
    }

    /// Drives toward `location`, `distance_miles` away and `duration_secs`
    /// of driving time.
    ///
    /// Driving stops at the first limit reached; the caller re-submits the
    /// unconsumed remainder. If a limit is already exhausted, the mandated
    /// rest is inserted first and reported in [`Advance::forced`].
    pub fn advance(&mut self, distance_miles: f64, duration_secs: i64, location: Coordinate) -> Advance {
        if duration_secs <= 0 {
            self.credit_zero_time(distance_miles, location);
            return Advance {
                segments: Vec::new(),
                forced: None,
                distance_miles,
                duration_secs: 0,
            };
        }

        let forced = self.rest_if_required();
        let (allowed, rule) = self.state.remaining(&self.limits, self.clock).drivable();
        let secs = allowed.min(duration_secs);
        let (miles, end_location) = if secs == duration_secs {
            (distance_miles, location)
        } else {
            let fraction = secs as f64 / duration_secs as f64;
            debug!(?rule, driven_secs = secs, "Driving limit reached mid-increment");
            (distance_miles * fraction, intermediate(self.position, location, fraction))
        };

        let start = self.clock;
        let carried = std::mem::take(&mut self.carry_miles);
        let driven = self.push_segment(DutyStatus::Driving, secs, end_location, miles + carried);
        self.state = self.state.drive(start, secs);

        let mut segments: Vec<DutySegment> = forced.iter().map(ForcedRest::segment).collect();
        segments.push(driven);

        Advance {
            segments,
            forced,
            distance_miles: miles,
            duration_secs: secs,
        }
    }

    /// Performs `secs` of on-duty, not-driving work at the current position.
    ///
    /// A daily reset or restart is inserted first when the work would not
    /// fit in the remaining window or cycle.
    pub fn perform_on_duty(&mut self, secs: i64) -> Activity {
        let remaining = self.state.remaining(&self.limits, self.clock);
        let forced = if remaining.cycle < secs {
            Some(self.insert_mandated(Rule::CycleLimit))
        } else if remaining.window < secs {
            Some(self.insert_mandated(Rule::WindowLimit))
        } else {
            None
        };

        let start = self.clock;
        if secs > 0 {
            self.push_segment(DutyStatus::OnDutyNotDriving, secs, self.position, 0.0);
            self.state = self.state.work(start, secs, &self.limits);
        }

        Activity {
            forced,
            start,
            end: self.clock,
        }
    }

    /// Inserts the mandated rest if driving is currently blocked.
    pub fn rest_if_required(&mut self) -> Option<ForcedRest> {
        self.state
            .remaining(&self.limits, self.clock)
            .blocking_rule()
            .map(|rule| self.insert_mandated(rule))
    }

    pub fn finish(mut self) -> Timeline {
        if self.carry_miles > 0.0 {
            if let Some(last) = self
                .segments
                .iter_mut()
                .rev()
                .find(|segment| segment.status == DutyStatus::Driving)
            {
                last.distance_miles += self.carry_miles;
            }
        }
        Timeline {
            segments: self.segments,
            state: self.state,
            end: self.clock,
        }
    }

    fn insert_mandated(&mut self, rule: Rule) -> ForcedRest {
        let status = rule.mandated_status(&self.limits);
        let secs = rule.mandated_secs(&self.limits);
        let start = self.clock;
        self.push_segment(status, secs, self.position, 0.0);
        self.state = self.state.rest(self.clock, secs, &self.limits);

        debug!(
            ?rule,
            ?status,
            start = %start,
            hours = secs as f64 / 3600.0,
            "Inserted mandated rest"
        );

        ForcedRest {
            rule,
            status,
            start,
            end: self.clock,
            location: self.position,
        }
    }

    fn credit_zero_time(&mut self, distance_miles: f64, location: Coordinate) {
        match self.segments.last_mut() {
            Some(last) if last.status == DutyStatus::Driving && last.end == self.clock => {
                last.distance_miles += distance_miles;
                last.end_location = location;
            }
            _ => self.carry_miles += distance_miles,
        }
        self.position = location;
    }

    /// Appends to the timeline, extending the previous segment when the
    /// status is unchanged. Returns the piece that was added.
    fn push_segment(
        &mut self,
        status: DutyStatus,
        secs: i64,
        end_location: Coordinate,
        miles: f64,
    ) -> DutySegment {
        let start = self.clock;
        let end = start + Duration::seconds(secs);
        let piece = DutySegment {
            status,
            start,
            end,
            start_location: self.position,
            end_location,
            distance_miles: miles,
        };
        match self.segments.last_mut() {
            Some(last) if last.status == status && last.end == start => {
                last.end = end;
                last.end_location = end_location;
                last.distance_miles += miles;
            }
            _ => self.segments.push(piece.clone()),
        }
        self.clock = end;
        self.position = end_location;
        piece
    }
}
