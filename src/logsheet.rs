//! Calendar-day log sheets built from a finished duty timeline.
//!
//! Segments that cross midnight are clipped into one piece per day. Each
//! piece keeps its status and a share of the distance proportional to its
//! duration, so the per-day odometer always sums to the trip distance.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::debug;

use crate::config::HosLimits;
use crate::duty::{next_midnight, DutySegment, DutyStatus};
use crate::error::InvariantViolation;
use crate::haversine::intermediate;
use crate::planner::Stop;
use crate::traits::Coordinate;

/// Seconds spent in each duty status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatusTotals {
    pub off_duty_secs: i64,
    pub sleeper_secs: i64,
    pub driving_secs: i64,
    pub on_duty_secs: i64,
}

impl StatusTotals {
    fn add(&mut self, status: DutyStatus, secs: i64) {
        match status {
            DutyStatus::OffDuty => self.off_duty_secs += secs,
            DutyStatus::SleeperBerth => self.sleeper_secs += secs,
            DutyStatus::Driving => self.driving_secs += secs,
            DutyStatus::OnDutyNotDriving => self.on_duty_secs += secs,
        }
    }

    pub fn total_secs(&self) -> i64 {
        self.off_duty_secs + self.sleeper_secs + self.driving_secs + self.on_duty_secs
    }

    pub fn off_duty_hours(&self) -> f64 {
        hours(self.off_duty_secs)
    }

    pub fn sleeper_hours(&self) -> f64 {
        hours(self.sleeper_secs)
    }

    pub fn driving_hours(&self) -> f64 {
        hours(self.driving_secs)
    }

    pub fn on_duty_hours(&self) -> f64 {
        hours(self.on_duty_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Remark {
    pub time: NaiveDateTime,
    pub location: Coordinate,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyLogSheet {
    pub date: NaiveDate,
    pub segments: Vec<DutySegment>,
    pub totals: StatusTotals,
    /// Miles driven on this day.
    pub miles: f64,
    /// Where the driver was when the day's first segment began.
    pub origin: Coordinate,
    pub remarks: Vec<Remark>,
    pub estimated: bool,
}

impl DailyLogSheet {
    /// Time covered by the sheet's segments; 24h for every day but the
    /// first and last of a trip.
    pub fn covered_secs(&self) -> i64 {
        self.totals.total_secs()
    }
}

/// A clipped segment tagged with the duty window it belongs to.
struct Piece {
    segment: DutySegment,
    window: usize,
}

/// Partitions `segments` into calendar-day sheets and checks every day
/// against the per-window driving and on-duty limits.
///
/// Duty windows are separated by rest runs of at least the daily reset
/// length; a window may span two sheets, and two windows may share one.
pub fn build_log_sheets(
    segments: &[DutySegment],
    stops: &[Stop],
    limits: &HosLimits,
    estimated: bool,
) -> Result<Vec<DailyLogSheet>, InvariantViolation> {
    check_contiguous(segments)?;

    let mut days: BTreeMap<NaiveDate, Vec<Piece>> = BTreeMap::new();
    let mut window = 0;
    let mut rest_run = 0;
    for segment in segments {
        if segment.status.is_rest() {
            rest_run += segment.duration_secs();
        } else {
            if rest_run >= limits.daily_reset_secs() {
                window += 1;
            }
            rest_run = 0;
        }
        for piece in split_at_midnight(segment) {
            days.entry(piece.start.date())
                .or_default()
                .push(Piece { segment: piece, window });
        }
    }

    let mut sheets = Vec::with_capacity(days.len());
    for (date, pieces) in days {
        check_windows(date, &pieces, limits)?;

        let mut totals = StatusTotals::default();
        let mut miles = 0.0;
        for piece in &pieces {
            totals.add(piece.segment.status, piece.segment.duration_secs());
            miles += piece.segment.distance_miles;
        }

        let origin = pieces[0].segment.start_location;
        let first_start = pieces[0].segment.start;
        let mut remarks = Vec::new();
        if estimated {
            remarks.push(Remark {
                time: first_start,
                location: origin,
                note: "Route estimated from straight-line distance".to_string(),
            });
        }
        remarks.extend(
            stops
                .iter()
                .filter(|stop| stop.arrival.date() == date)
                .map(stop_remark),
        );

        debug!(
            %date,
            driving_hours = totals.driving_hours(),
            miles,
            "Log sheet"
        );

        sheets.push(DailyLogSheet {
            date,
            segments: pieces.into_iter().map(|piece| piece.segment).collect(),
            totals,
            miles,
            origin,
            remarks,
            estimated,
        });
    }
    Ok(sheets)
}

fn check_contiguous(segments: &[DutySegment]) -> Result<(), InvariantViolation> {
    if let Some(empty) = segments.iter().find(|segment| segment.end <= segment.start) {
        return Err(InvariantViolation::EmptySegment { at: empty.start });
    }
    match segments.windows(2).find(|pair| pair[0].end != pair[1].start) {
        Some(pair) => Err(InvariantViolation::Discontinuity { at: pair[0].end }),
        None => Ok(()),
    }
}

/// Driving and on-duty totals per duty window within one day.
fn check_windows(date: NaiveDate, pieces: &[Piece], limits: &HosLimits) -> Result<(), InvariantViolation> {
    let mut windows: BTreeMap<usize, (i64, i64)> = BTreeMap::new();
    for piece in pieces {
        let secs = piece.segment.duration_secs();
        let (driving, on_duty) = windows.entry(piece.window).or_default();
        match piece.segment.status {
            DutyStatus::Driving => {
                *driving += secs;
                *on_duty += secs;
            }
            DutyStatus::OnDutyNotDriving => *on_duty += secs,
            DutyStatus::OffDuty | DutyStatus::SleeperBerth => {}
        }
    }

    for (driving, on_duty) in windows.into_values() {
        if driving > limits.max_driving_secs() {
            return Err(InvariantViolation::DrivingLimit {
                date,
                hours: hours(driving),
                limit_hours: hours(limits.max_driving_secs()),
            });
        }
        if on_duty > limits.max_window_secs() {
            return Err(InvariantViolation::WindowLimit {
                date,
                hours: hours(on_duty),
                limit_hours: hours(limits.max_window_secs()),
            });
        }
    }
    Ok(())
}

fn split_at_midnight(segment: &DutySegment) -> Vec<DutySegment> {
    let total = segment.duration_secs();
    let mut pieces = Vec::new();
    let mut cursor = segment.start;
    let mut location = segment.start_location;
    let mut miles_left = segment.distance_miles;
    while cursor < segment.end {
        let cut = next_midnight(cursor);
        let (end, end_location, miles) = if cut < segment.end {
            let fraction = (cut - segment.start).num_seconds() as f64 / total as f64;
            let share = segment.distance_miles * (cut - cursor).num_seconds() as f64 / total as f64;
            let at = intermediate(segment.start_location, segment.end_location, fraction);
            (cut, at, share)
        } else {
            // The last piece takes the remainder so nothing is lost to rounding.
            (segment.end, segment.end_location, miles_left)
        };
        miles_left -= miles;
        pieces.push(DutySegment {
            status: segment.status,
            start: cursor,
            end,
            start_location: location,
            end_location,
            distance_miles: miles,
        });
        cursor = end;
        location = end_location;
    }
    pieces
}

fn stop_remark(stop: &Stop) -> Remark {
    let mut note = match &stop.poi {
        Some(poi) => format!("{} at {}", stop.label, poi.name),
        None => stop.label.clone(),
    };
    for folded in &stop.notes {
        note.push_str("; ");
        note.push_str(&folded.label);
    }
    Remark {
        time: stop.arrival,
        location: stop.location,
        note,
    }
}

fn hours(secs: i64) -> f64 {
    secs as f64 / 3600.0
}
