//! Planner configuration.
//!
//! `HosLimits` defaults to the FMCSA property-carrying figures. Everything
//! else (stop durations, fuel range, fallback speed) is policy and should be
//! confirmed per deployment.

use serde::Deserialize;

use crate::duty::DutyStatus;
use crate::haversine::DEFAULT_SPEED_MPH;
use crate::retry::RetryPolicy;

/// Regulatory limits, in minutes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HosLimits {
    /// Driving allowed within one duty window.
    pub max_driving_minutes: i64,
    /// On-duty time (driving + not driving) allowed within one duty window.
    pub max_window_minutes: i64,
    /// Cumulative driving that requires a break before driving again.
    pub driving_before_break_minutes: i64,
    pub break_minutes: i64,
    /// Consecutive off-duty time that starts a new duty window.
    pub daily_reset_minutes: i64,
    pub cycle_limit_minutes: i64,
    pub cycle_days: i64,
    /// Consecutive off-duty time that clears the rolling cycle.
    pub restart_minutes: i64,
    /// Status recorded for a mandated daily reset.
    pub reset_status: DutyStatus,
}

impl Default for HosLimits {
    fn default() -> Self {
        Self {
            max_driving_minutes: 11 * 60,
            max_window_minutes: 14 * 60,
            driving_before_break_minutes: 8 * 60,
            break_minutes: 30,
            daily_reset_minutes: 10 * 60,
            cycle_limit_minutes: 70 * 60,
            cycle_days: 8,
            restart_minutes: 34 * 60,
            reset_status: DutyStatus::OffDuty,
        }
    }
}

impl HosLimits {
    pub fn max_driving_secs(&self) -> i64 {
        self.max_driving_minutes * 60
    }

    pub fn max_window_secs(&self) -> i64 {
        self.max_window_minutes * 60
    }

    pub fn driving_before_break_secs(&self) -> i64 {
        self.driving_before_break_minutes * 60
    }

    pub fn break_secs(&self) -> i64 {
        self.break_minutes * 60
    }

    pub fn daily_reset_secs(&self) -> i64 {
        self.daily_reset_minutes * 60
    }

    pub fn cycle_limit_secs(&self) -> i64 {
        self.cycle_limit_minutes * 60
    }

    pub fn restart_secs(&self) -> i64 {
        self.restart_minutes * 60
    }
}

/// Durations and spacing of non-HOS stops.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StopPolicy {
    pub pickup_minutes: i64,
    pub dropoff_minutes: i64,
    pub fuel_minutes: i64,
    /// Maximum distance driven between fuel stops.
    pub fuel_range_miles: f64,
}

impl Default for StopPolicy {
    fn default() -> Self {
        Self {
            pickup_minutes: 60,
            dropoff_minutes: 60,
            fuel_minutes: 30,
            fuel_range_miles: 1000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub average_speed_mph: f64,
    /// Routes are densified so consecutive waypoints are never further apart.
    pub waypoint_spacing_miles: f64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            average_speed_mph: DEFAULT_SPEED_MPH,
            waypoint_spacing_miles: 25.0,
        }
    }
}

/// Search for a named fuel station or rest area at each fuel and rest stop.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PoiSearchConfig {
    pub fuel_keywords: Vec<String>,
    pub rest_keywords: Vec<String>,
    /// Tried in order; every keyword is tried at one radius before widening.
    pub radii_km: Vec<f64>,
}

impl Default for PoiSearchConfig {
    fn default() -> Self {
        let words =
            |list: &[&str]| -> Vec<String> { list.iter().map(|word| word.to_string()).collect() };
        Self {
            fuel_keywords: words(&["fuel", "gas station", "truck stop", "petrol station"]),
            rest_keywords: words(&["rest area", "truck rest area", "highway rest stop", "rest station"]),
            radii_km: vec![10.0, 20.0, 40.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub hos: HosLimits,
    pub stops: StopPolicy,
    pub fallback: FallbackConfig,
    pub retry: RetryPolicy,
    pub poi: PoiSearchConfig,
    /// How long a resolved location or route is reused.
    pub cache_ttl_secs: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            hos: HosLimits::default(),
            stops: StopPolicy::default(),
            fallback: FallbackConfig::default(),
            retry: RetryPolicy::default(),
            poi: PoiSearchConfig::default(),
            cache_ttl_secs: 24 * 60 * 60,
        }
    }
}

impl PlannerConfig {
    /// Loads a configuration from JSON; omitted fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
