//! Polyline representation for route geometries.
//!
//! Providers may hand back geometries in the compact encoded-polyline
//! format; decoding happens once at that boundary and the planner works on
//! plain coordinate sequences from then on.

use serde::{Deserialize, Serialize};

use crate::haversine::great_circle_miles;
use crate::traits::Coordinate;

/// A route geometry as decoded coordinates.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polyline {
    points: Vec<Coordinate>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("malformed encoded polyline at byte {offset}")]
pub struct PolylineDecodeError {
    pub offset: usize,
}

impl Polyline {
    pub fn new(points: Vec<Coordinate>) -> Self {
        Self { points }
    }

    /// Decodes an encoded polyline with the given precision (5 for OSRM's
    /// default `polyline`, 6 for `polyline6`).
    pub fn decode(encoded: &str, precision: u32) -> Result<Self, PolylineDecodeError> {
        let factor = 10f64.powi(precision as i32);
        let bytes = encoded.as_bytes();
        let mut points = Vec::new();
        let mut index = 0;
        let mut lat: i64 = 0;
        let mut lng: i64 = 0;

        while index < bytes.len() {
            lat += next_value(bytes, &mut index)?;
            lng += next_value(bytes, &mut index)?;
            points.push(Coordinate::new(lat as f64 / factor, lng as f64 / factor));
        }

        Ok(Self { points })
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    pub fn into_points(self) -> Vec<Coordinate> {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Great-circle length along the points, in miles.
    pub fn length_miles(&self) -> f64 {
        self.points
            .windows(2)
            .map(|pair| great_circle_miles(pair[0], pair[1]))
            .sum()
    }
}

fn next_value(bytes: &[u8], index: &mut usize) -> Result<i64, PolylineDecodeError> {
    let mut result: i64 = 0;
    let mut shift = 0;
    loop {
        let byte = *bytes
            .get(*index)
            .ok_or(PolylineDecodeError { offset: *index })?;
        if !(63..=126).contains(&byte) || shift > 60 {
            return Err(PolylineDecodeError { offset: *index });
        }
        *index += 1;
        let chunk = (byte - 63) as i64;
        result |= (chunk & 0x1f) << shift;
        shift += 5;
        if chunk < 0x20 {
            break;
        }
    }
    Ok(if result & 1 == 1 { !(result >> 1) } else { result >> 1 })
}
