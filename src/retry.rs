//! Bounded retry with jittered exponential backoff.

use std::fmt::Display;
use std::thread;
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;
use tracing::warn;

use crate::error::{FailureKind, GeocodingError, RouteProviderError};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Scale each delay by a random factor in [0.5, 1.0].
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
            jitter: true,
        }
    }
}

/// Errors that know whether retrying can help.
pub trait Classify {
    fn failure_kind(&self) -> FailureKind;
}

impl Classify for GeocodingError {
    fn failure_kind(&self) -> FailureKind {
        self.kind
    }
}

impl Classify for RouteProviderError {
    fn failure_kind(&self) -> FailureKind {
        self.kind
    }
}

/// How a retried operation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt<T, E> {
    Success { value: T, attempts: u32 },
    /// Every attempt failed transiently.
    Exhausted { error: E, attempts: u32 },
    Permanent { error: E, attempts: u32 },
}

impl RetryPolicy {
    /// A policy that never sleeps between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay_ms: 0,
            max_delay_ms: 0,
            jitter: false,
        }
    }

    /// Delay before the attempt following failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let millis = self
            .base_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_delay_ms);
        if self.jitter && millis > 0 {
            let factor = rand::thread_rng().gen_range(0.5..=1.0);
            Duration::from_millis((millis as f64 * factor) as u64)
        } else {
            Duration::from_millis(millis)
        }
    }

    /// Runs `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `op` receives the 1-based attempt number.
    pub fn run<T, E, F>(&self, label: &str, mut op: F) -> Attempt<T, E>
    where
        E: Classify + Display,
        F: FnMut(u32) -> Result<T, E>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => {
                    return Attempt::Success {
                        value,
                        attempts: attempt,
                    };
                }
                Err(error) if error.failure_kind() == FailureKind::Permanent => {
                    return Attempt::Permanent {
                        error,
                        attempts: attempt,
                    };
                }
                Err(error) if attempt >= max_attempts => {
                    warn!(label, attempts = attempt, %error, "Retries exhausted");
                    return Attempt::Exhausted {
                        error,
                        attempts: attempt,
                    };
                }
                Err(error) => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        label,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "Transient failure, retrying"
                    );
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                    attempt += 1;
                }
            }
        }
    }
}
