//! Error taxonomy for trip planning.
//!
//! Resolver and provider failures carry a [`FailureKind`] so the cache can
//! decide between retrying and surfacing them. Every error is `Clone`
//! because a single failed resolution is handed to all coalesced waiters.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use reqwest::StatusCode;
use serde::Serialize;

/// Whether a failed external call is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transient,
    Permanent,
}

impl FailureKind {
    /// Timeouts and connection failures are transient; anything else that
    /// reqwest reports (bad URL, undecodable body, ...) will not improve on retry.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            return FailureKind::Transient;
        }
        match err.status() {
            Some(status) => Self::from_status(status),
            None if err.is_request() => FailureKind::Transient,
            None => FailureKind::Permanent,
        }
    }

    pub fn from_status(status: StatusCode) -> Self {
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            FailureKind::Transient
        } else {
            FailureKind::Permanent
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Transient => write!(f, "transient"),
            FailureKind::Permanent => write!(f, "permanent"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("geocoding failed ({kind}) for `{place}`: {message}")]
pub struct GeocodingError {
    pub kind: FailureKind,
    pub place: String,
    pub message: String,
}

impl GeocodingError {
    pub fn transient(place: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transient,
            place: place.into(),
            message: message.into(),
        }
    }

    pub fn permanent(place: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Permanent,
            place: place.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("routing failed ({kind}): {message}")]
pub struct RouteProviderError {
    pub kind: FailureKind,
    pub message: String,
}

impl RouteProviderError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Permanent,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanningError {
    #[error("driver has used {used_hours:.2}h of a {limit_hours:.0}h cycle; no driving is possible")]
    CycleExhausted { used_hours: f64, limit_hours: f64 },
    #[error("route cannot hold the required stops: {0}")]
    DegenerateRoute(String),
    #[error("location `{place}` could not be resolved after {attempts} attempts: {message}")]
    Unresolvable {
        place: String,
        attempts: u32,
        message: String,
    },
}

/// A produced log sheet breaks a regulatory limit. Always a simulator defect.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("{date}: {hours:.2}h driving in one duty window exceeds the {limit_hours:.0}h limit")]
    DrivingLimit {
        date: NaiveDate,
        hours: f64,
        limit_hours: f64,
    },
    #[error("{date}: {hours:.2}h on duty in one duty window exceeds the {limit_hours:.0}h limit")]
    WindowLimit {
        date: NaiveDate,
        hours: f64,
        limit_hours: f64,
    },
    #[error("duty timeline is not contiguous at {at}")]
    Discontinuity { at: NaiveDateTime },
    #[error("duty segment starting at {at} has no duration")]
    EmptySegment { at: NaiveDateTime },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("current cycle hours must be within [0, {limit_hours}), got {value}")]
    CycleHoursOutOfRange { value: f64, limit_hours: f64 },
    #[error("{0} must not be empty")]
    EmptyLocation(&'static str),
}

/// Everything that can stop a trip from being planned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TripError {
    #[error(transparent)]
    Geocoding(#[from] GeocodingError),
    #[error(transparent)]
    RouteProvider(#[from] RouteProviderError),
    #[error(transparent)]
    Planning(#[from] PlanningError),
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}
