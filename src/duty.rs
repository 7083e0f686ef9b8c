//! Duty statuses and the segments of a driver's timeline.

use chrono::{Duration, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::traits::Coordinate;

/// The four ELD duty statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DutyStatus {
    OffDuty,
    SleeperBerth,
    Driving,
    OnDutyNotDriving,
}

impl DutyStatus {
    /// Driving and on-duty-not-driving count against the window and cycle.
    pub fn is_on_duty(self) -> bool {
        matches!(self, DutyStatus::Driving | DutyStatus::OnDutyNotDriving)
    }

    /// Off-duty and sleeper-berth time counts toward resets.
    pub fn is_rest(self) -> bool {
        !self.is_on_duty()
    }
}

/// A contiguous span of time spent in one duty status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DutySegment {
    pub status: DutyStatus,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub start_location: Coordinate,
    pub end_location: Coordinate,
    pub distance_miles: f64,
}

impl DutySegment {
    pub fn duration_secs(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }
}

/// The first midnight strictly after `at`.
pub fn next_midnight(at: NaiveDateTime) -> NaiveDateTime {
    let since_midnight = at.time().num_seconds_from_midnight() as i64;
    at - Duration::seconds(since_midnight) - Duration::nanoseconds(at.nanosecond() as i64)
        + Duration::days(1)
}
