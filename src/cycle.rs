//! Hours-of-service counters and the pure rule transitions over them.
//!
//! Every transition takes the current [`CycleState`] by reference and
//! returns the next one; nothing here knows about routes or clocks beyond
//! the timestamps it is handed. The simulator decides which transition to
//! apply, these functions only encode what each one does to the counters.

use std::collections::VecDeque;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::config::HosLimits;
use crate::duty::{next_midnight, DutyStatus};

/// The limit that forced a non-driving segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    /// 8 hours of driving without a 30-minute interruption.
    Break,
    /// 11 hours of driving in the current duty window.
    DrivingLimit,
    /// 14 hours on duty in the current duty window.
    WindowLimit,
    /// 70 hours on duty in the rolling 8-day period.
    CycleLimit,
}

impl Rule {
    /// Status of the segment this rule mandates.
    pub fn mandated_status(self, limits: &HosLimits) -> DutyStatus {
        match self {
            Rule::Break | Rule::CycleLimit => DutyStatus::OffDuty,
            Rule::DrivingLimit | Rule::WindowLimit => limits.reset_status,
        }
    }

    /// Length of the segment this rule mandates.
    pub fn mandated_secs(self, limits: &HosLimits) -> i64 {
        match self {
            Rule::Break => limits.break_secs(),
            Rule::DrivingLimit | Rule::WindowLimit => limits.daily_reset_secs(),
            Rule::CycleLimit => limits.restart_secs(),
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Rule::Break => "30-minute break",
            Rule::DrivingLimit => "10-hour reset (11-hour driving limit)",
            Rule::WindowLimit => "10-hour reset (14-hour window)",
            Rule::CycleLimit => "34-hour restart (70-hour cycle)",
        }
    }
}

/// On-duty seconds recorded against one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DayTotal {
    pub date: NaiveDate,
    pub on_duty_secs: i64,
}

/// Seconds left before each limit binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Remaining {
    pub driving: i64,
    pub window: i64,
    pub before_break: i64,
    pub cycle: i64,
}

impl Remaining {
    /// Driving seconds permitted now, and the rule that will stop it.
    pub fn drivable(&self) -> (i64, Rule) {
        [
            (self.cycle, Rule::CycleLimit),
            (self.driving, Rule::DrivingLimit),
            (self.window, Rule::WindowLimit),
            (self.before_break, Rule::Break),
        ]
        .into_iter()
        .fold((i64::MAX, Rule::Break), |best, candidate| {
            if candidate.0 < best.0 { candidate } else { best }
        })
    }

    /// The rule whose mandated segment must come before any more driving.
    ///
    /// Larger resets clear the smaller counters, so a restart is preferred
    /// over a daily reset, and a daily reset over a break.
    pub fn blocking_rule(&self) -> Option<Rule> {
        if self.cycle <= 0 {
            Some(Rule::CycleLimit)
        } else if self.driving <= 0 {
            Some(Rule::DrivingLimit)
        } else if self.window <= 0 {
            Some(Rule::WindowLimit)
        } else if self.before_break <= 0 {
            Some(Rule::Break)
        } else {
            None
        }
    }
}

/// A driver's HOS counters.
///
/// Only the transitions below produce new states, so the simulator owning
/// a `CycleState` is the only thing that can move it forward.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleState {
    driving_secs: i64,
    window_secs: i64,
    driving_since_break_secs: i64,
    non_driving_run_secs: i64,
    off_duty_run_secs: i64,
    daily_totals: VecDeque<DayTotal>,
    last_reset: Option<NaiveDateTime>,
}

impl CycleState {
    /// A driver starting a fresh duty window with `prior_secs` already
    /// used in the cycle.
    ///
    /// The prior hours are booked on the day before `start`, which keeps
    /// them inside the rolling window for the next seven days.
    pub fn new(prior_secs: i64, start: NaiveDateTime) -> Self {
        let mut daily_totals = VecDeque::new();
        if prior_secs > 0 {
            daily_totals.push_back(DayTotal {
                date: start.date() - Duration::days(1),
                on_duty_secs: prior_secs,
            });
        }
        Self {
            driving_secs: 0,
            window_secs: 0,
            driving_since_break_secs: 0,
            non_driving_run_secs: 0,
            off_duty_run_secs: 0,
            daily_totals,
            last_reset: None,
        }
    }

    pub fn driving_secs(&self) -> i64 {
        self.driving_secs
    }

    pub fn window_secs(&self) -> i64 {
        self.window_secs
    }

    pub fn driving_since_break_secs(&self) -> i64 {
        self.driving_since_break_secs
    }

    pub fn last_reset(&self) -> Option<NaiveDateTime> {
        self.last_reset
    }

    pub fn daily_totals(&self) -> impl Iterator<Item = &DayTotal> {
        self.daily_totals.iter()
    }

    /// On-duty seconds in the `days` calendar days ending on `today`.
    pub fn rolling_secs(&self, today: NaiveDate, days: i64) -> i64 {
        let first = today - Duration::days(days.max(1) - 1);
        self.daily_totals
            .iter()
            .filter(|total| total.date >= first && total.date <= today)
            .map(|total| total.on_duty_secs)
            .sum()
    }

    pub fn remaining(&self, limits: &HosLimits, now: NaiveDateTime) -> Remaining {
        Remaining {
            driving: limits.max_driving_secs() - self.driving_secs,
            window: limits.max_window_secs() - self.window_secs,
            before_break: limits.driving_before_break_secs() - self.driving_since_break_secs,
            cycle: limits.cycle_limit_secs() - self.rolling_secs(now.date(), limits.cycle_days),
        }
    }

    /// `secs` of driving starting at `start`.
    pub fn drive(&self, start: NaiveDateTime, secs: i64) -> Self {
        let mut next = self.clone();
        next.driving_secs += secs;
        next.window_secs += secs;
        next.driving_since_break_secs += secs;
        next.non_driving_run_secs = 0;
        next.off_duty_run_secs = 0;
        next.book_on_duty(start, secs);
        next
    }

    /// `secs` on duty, not driving, starting at `start`.
    pub fn work(&self, start: NaiveDateTime, secs: i64, limits: &HosLimits) -> Self {
        let mut next = self.clone();
        next.window_secs += secs;
        next.non_driving_run_secs += secs;
        next.off_duty_run_secs = 0;
        next.book_on_duty(start, secs);
        if next.non_driving_run_secs >= limits.break_secs() {
            next.driving_since_break_secs = 0;
        }
        next
    }

    /// `secs` off duty or in the sleeper berth, ending at `end`.
    ///
    /// Applies whichever of break, daily reset and restart the accumulated
    /// run of rest now qualifies for.
    pub fn rest(&self, end: NaiveDateTime, secs: i64, limits: &HosLimits) -> Self {
        let mut next = self.clone();
        next.non_driving_run_secs += secs;
        next.off_duty_run_secs += secs;
        if next.off_duty_run_secs >= limits.restart_secs() {
            return next.restart(end);
        }
        if next.off_duty_run_secs >= limits.daily_reset_secs() {
            return next.daily_reset(end);
        }
        if next.non_driving_run_secs >= limits.break_secs() {
            next.driving_since_break_secs = 0;
        }
        next
    }

    /// A qualifying 10-hour rest: opens a fresh duty window.
    pub fn daily_reset(&self, at: NaiveDateTime) -> Self {
        let mut next = self.clone();
        next.driving_secs = 0;
        next.window_secs = 0;
        next.driving_since_break_secs = 0;
        next.last_reset = Some(at);
        next
    }

    /// A 34-hour restart: daily reset plus an empty rolling cycle.
    pub fn restart(&self, at: NaiveDateTime) -> Self {
        let mut next = self.daily_reset(at);
        next.daily_totals.clear();
        next
    }

    fn book_on_duty(&mut self, start: NaiveDateTime, secs: i64) {
        let end = start + Duration::seconds(secs);
        let mut cursor = start;
        while cursor < end {
            let cut = next_midnight(cursor).min(end);
            let chunk = (cut - cursor).num_seconds();
            let date = cursor.date();
            match self.daily_totals.back_mut() {
                Some(total) if total.date == date => total.on_duty_secs += chunk,
                _ => self.daily_totals.push_back(DayTotal {
                    date,
                    on_duty_secs: chunk,
                }),
            }
            cursor = cut;
        }
    }
}
