//! OSRM HTTP adapter for driving routes.

use serde::Deserialize;
use tracing::debug;

use crate::error::{FailureKind, RouteProviderError};
use crate::polyline::Polyline;
use crate::traits::{Coordinate, LegSummary, RawRoute, RouteProvider};

const METERS_PER_MILE: f64 = 1609.344;
/// OSRM encodes `geometries=polyline` at 1e-5 degrees.
const POLYLINE_PRECISION: u32 = 5;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "driving".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn url_for(&self, coordinates: &[Coordinate]) -> String {
        let coords = coordinates
            .iter()
            .map(|c| format!("{:.6},{:.6}", c.lng, c.lat))
            .collect::<Vec<_>>()
            .join(";");

        format!(
            "{}/route/v1/{}/{}?overview=full&geometries=polyline&steps=false",
            self.config.base_url.trim_end_matches('/'),
            self.config.profile,
            coords
        )
    }
}

impl RouteProvider for OsrmClient {
    fn route(&self, coordinates: &[Coordinate]) -> Result<RawRoute, RouteProviderError> {
        if coordinates.len() < 2 {
            return Err(RouteProviderError::permanent(
                "a route needs at least two coordinates",
            ));
        }

        let body = self
            .client
            .get(self.url_for(coordinates))
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<OsrmRouteResponse>())
            .map_err(|err| RouteProviderError {
                kind: FailureKind::from_reqwest(&err),
                message: err.to_string(),
            })?;

        debug!(code = %body.code, routes = body.routes.len(), "OSRM response");
        raw_route_from(body)
    }
}

fn raw_route_from(body: OsrmRouteResponse) -> Result<RawRoute, RouteProviderError> {
    if body.code != "Ok" {
        return Err(RouteProviderError::permanent(format!(
            "OSRM returned {}: {}",
            body.code,
            body.message.unwrap_or_default()
        )));
    }
    let route = body
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| RouteProviderError::permanent("OSRM returned no routes"))?;

    let geometry = Polyline::decode(&route.geometry, POLYLINE_PRECISION)
        .map_err(|err| RouteProviderError::permanent(err.to_string()))?;

    Ok(RawRoute {
        geometry,
        distance_miles: route.distance / METERS_PER_MILE,
        duration_secs: route.duration,
        legs: route
            .legs
            .into_iter()
            .map(|leg| LegSummary {
                distance_miles: leg.distance / METERS_PER_MILE,
                duration_secs: leg.duration,
            })
            .collect(),
    })
}

#[derive(Debug, Deserialize)]
struct OsrmRouteResponse {
    code: String,
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: String,
    /// Meters.
    distance: f64,
    /// Seconds.
    duration: f64,
    #[serde(default)]
    legs: Vec<OsrmLeg>,
}

#[derive(Debug, Deserialize)]
struct OsrmLeg {
    distance: f64,
    duration: f64,
}
