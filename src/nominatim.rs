//! Nominatim HTTP adapter for place-name geocoding and nearby-place search.

use serde::Deserialize;
use tracing::debug;

use crate::error::{FailureKind, GeocodingError};
use crate::haversine::BoundingBox;
use crate::traits::{Coordinate, GeocodingResolver, PoiMatch, PoiResolver};

/// Nominatim's usage policy rejects requests without an identifying agent.
const DEFAULT_USER_AGENT: &str = concat!("hos-planner/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NominatimConfig {
    pub base_url: String,
    pub user_agent: String,
    /// Comma-separated ISO 3166-1 alpha-2 codes; empty searches worldwide.
    pub country_codes: String,
    pub timeout_secs: u64,
}

impl Default for NominatimConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            country_codes: "us,ca".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NominatimClient {
    config: NominatimConfig,
    client: reqwest::blocking::Client,
}

impl NominatimClient {
    pub fn new(config: NominatimConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { config, client })
    }

    fn query_for(&self, text: &str) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("q", text.to_string()),
            ("format", "jsonv2".to_string()),
            ("limit", "1".to_string()),
        ];
        if !self.config.country_codes.is_empty() {
            query.push(("countrycodes", self.config.country_codes.clone()));
        }
        query
    }

    /// Search restricted to `bbox`, one result, duplicates removed.
    fn bounded_query_for(&self, keyword: &str, bbox: &BoundingBox) -> Vec<(&'static str, String)> {
        let mut query = self.query_for(keyword);
        query.push(("dedupe", "1".to_string()));
        query.push(("viewbox", bbox.to_viewbox()));
        query.push(("bounded", "1".to_string()));
        query
    }

    fn search_places(
        &self,
        subject: &str,
        query: &[(&'static str, String)],
    ) -> Result<Vec<NominatimPlace>, GeocodingError> {
        let url = format!("{}/search", self.config.base_url.trim_end_matches('/'));
        self.client
            .get(url)
            .query(query)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<Vec<NominatimPlace>>())
            .map_err(|err| GeocodingError {
                kind: FailureKind::from_reqwest(&err),
                place: subject.to_string(),
                message: err.to_string(),
            })
    }
}

impl GeocodingResolver for NominatimClient {
    fn resolve(&self, place: &str) -> Result<Coordinate, GeocodingError> {
        let hits = self.search_places(place, &self.query_for(place))?;
        let coordinate = first_coordinate(place, hits)?;
        debug!(place, lat = coordinate.lat, lng = coordinate.lng, "Nominatim match");
        Ok(coordinate)
    }
}

impl PoiResolver for NominatimClient {
    fn search(
        &self,
        keyword: &str,
        near: Coordinate,
        radius_km: f64,
    ) -> Result<Option<PoiMatch>, GeocodingError> {
        let bbox = BoundingBox::around(near, radius_km);
        let hits = self.search_places(keyword, &self.bounded_query_for(keyword, &bbox))?;
        let found = first_poi(keyword, hits)?;
        if let Some(poi) = &found {
            debug!(keyword, radius_km, name = %poi.name, "Nominatim place nearby");
        }
        Ok(found)
    }
}

fn first_coordinate(place: &str, hits: Vec<NominatimPlace>) -> Result<Coordinate, GeocodingError> {
    let hit = hits
        .into_iter()
        .next()
        .ok_or_else(|| GeocodingError::permanent(place, "no match"))?;
    hit.coordinate(place)
}

/// An empty result is an answer, not an error.
fn first_poi(keyword: &str, hits: Vec<NominatimPlace>) -> Result<Option<PoiMatch>, GeocodingError> {
    let Some(hit) = hits.into_iter().next() else {
        return Ok(None);
    };
    let coordinate = hit.coordinate(keyword)?;
    let name = hit
        .display_name
        .split(',')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();
    Ok(Some(PoiMatch {
        name,
        address: hit.display_name,
        coordinate,
    }))
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: String,
}

impl NominatimPlace {
    // Nominatim sends coordinates as strings.
    fn coordinate(&self, subject: &str) -> Result<Coordinate, GeocodingError> {
        match (self.lat.parse::<f64>(), self.lon.parse::<f64>()) {
            (Ok(lat), Ok(lng)) => Ok(Coordinate::new(lat, lng)),
            _ => Err(GeocodingError::permanent(
                subject,
                format!("unparseable coordinates `{}`, `{}`", self.lat, self.lon),
            )),
        }
    }
}
