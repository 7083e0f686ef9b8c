//! Degraded resolution when external providers stay unavailable.

use tracing::warn;

use crate::config::FallbackConfig;
use crate::error::{GeocodingError, PlanningError, RouteProviderError};
use crate::haversine::HaversineRouter;
use crate::traits::{Coordinate, RawRoute};

/// A value from the external provider, or a degraded stand-in for one.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<T> {
    Resolved(T),
    Estimated(T),
}

impl<T> Resolution<T> {
    pub fn is_estimated(&self) -> bool {
        matches!(self, Resolution::Estimated(_))
    }

    pub fn value(&self) -> &T {
        match self {
            Resolution::Resolved(value) | Resolution::Estimated(value) => value,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Resolution::Resolved(value) | Resolution::Estimated(value) => value,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FallbackPolicy {
    router: HaversineRouter,
}

impl FallbackPolicy {
    pub fn new(config: &FallbackConfig) -> Self {
        Self {
            router: HaversineRouter::new(config.average_speed_mph),
        }
    }

    /// Straight-line route through coordinates that were already resolved.
    pub fn recover_route(
        &self,
        coordinates: &[Coordinate],
        error: &RouteProviderError,
        attempts: u32,
    ) -> Resolution<RawRoute> {
        warn!(
            attempts,
            %error,
            speed_mph = self.router.speed_mph,
            "Routing unavailable, estimating straight-line route"
        );
        Resolution::Estimated(self.router.estimate(coordinates))
    }

    /// Reuses a previously known coordinate for `place`.
    ///
    /// A place that was never resolved cannot be estimated.
    pub fn recover_place(
        &self,
        known: Option<Coordinate>,
        error: &GeocodingError,
        attempts: u32,
    ) -> Result<Resolution<Coordinate>, PlanningError> {
        match known {
            Some(coordinate) => {
                warn!(
                    place = %error.place,
                    attempts,
                    "Geocoder unavailable, reusing expired coordinate"
                );
                Ok(Resolution::Estimated(coordinate))
            }
            None => Err(PlanningError::Unresolvable {
                place: error.place.clone(),
                attempts,
                message: error.message.clone(),
            }),
        }
    }
}
