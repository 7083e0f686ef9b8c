//! Route normalization.
//!
//! Providers return a geometry plus totals (and sometimes per-leg totals).
//! The planner needs ordered waypoints with cumulative distance and driving
//! time, dense enough to place stops, and the waypoint index of each
//! requested coordinate (origin, pickup, drop-off).

use serde::Serialize;

use crate::error::PlanningError;
use crate::haversine::{great_circle_miles, intermediate};
use crate::polyline::Polyline;
use crate::traits::{Coordinate, RawRoute};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Waypoint {
    pub coordinate: Coordinate,
    pub cumulative_miles: f64,
    pub cumulative_secs: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    waypoints: Vec<Waypoint>,
    anchors: Vec<usize>,
    geometry: Polyline,
}

impl Route {
    /// Normalizes `raw` for the requested `anchors`, inserting interpolated
    /// waypoints so no two consecutive waypoints are more than
    /// `max_spacing_miles` apart.
    pub fn from_raw(
        raw: &RawRoute,
        anchors: &[Coordinate],
        max_spacing_miles: f64,
    ) -> Result<Self, PlanningError> {
        if raw.geometry.len() < 2 {
            return Err(PlanningError::DegenerateRoute(format!(
                "geometry has {} point(s)",
                raw.geometry.len()
            )));
        }
        if anchors.len() < 2 {
            return Err(PlanningError::DegenerateRoute(
                "a route needs at least an origin and a destination".to_string(),
            ));
        }

        let points = densify(raw.geometry.points(), max_spacing_miles);
        let anchor_indices = locate_anchors(&points, anchors);

        let mut along = Vec::with_capacity(points.len());
        let mut total = 0.0;
        along.push(0.0);
        for pair in points.windows(2) {
            total += great_circle_miles(pair[0], pair[1]);
            along.push(total);
        }

        let legs_usable = raw.legs.len() == anchor_indices.len() - 1
            && raw
                .legs
                .iter()
                .all(|leg| leg.distance_miles.is_finite() && leg.duration_secs.is_finite());

        let mut waypoints: Vec<Waypoint> = points
            .iter()
            .map(|&coordinate| Waypoint {
                coordinate,
                cumulative_miles: 0.0,
                cumulative_secs: 0.0,
            })
            .collect();

        if legs_usable {
            let mut base_miles = 0.0;
            let mut base_secs = 0.0;
            for (leg, bounds) in raw.legs.iter().zip(anchor_indices.windows(2)) {
                let (from, to) = (bounds[0], bounds[1]);
                scale_span(
                    &mut waypoints[from..=to],
                    &along[from..=to],
                    (base_miles, base_secs),
                    (leg.distance_miles.max(0.0), leg.duration_secs.max(0.0)),
                );
                base_miles += leg.distance_miles.max(0.0);
                base_secs += leg.duration_secs.max(0.0);
            }
        } else {
            scale_span(
                &mut waypoints,
                &along,
                (0.0, 0.0),
                (raw.distance_miles.max(0.0), raw.duration_secs.max(0.0)),
            );
        }

        Ok(Self {
            waypoints,
            anchors: anchor_indices,
            geometry: raw.geometry.clone(),
        })
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    /// Waypoint index of the `n`th requested coordinate.
    pub fn anchor(&self, n: usize) -> Option<usize> {
        self.anchors.get(n).copied()
    }

    pub fn anchors(&self) -> &[usize] {
        &self.anchors
    }

    /// The provider's geometry, before densification.
    pub fn geometry(&self) -> &Polyline {
        &self.geometry
    }

    pub fn total_miles(&self) -> f64 {
        self.waypoints.last().map_or(0.0, |w| w.cumulative_miles)
    }

    pub fn total_secs(&self) -> f64 {
        self.waypoints.last().map_or(0.0, |w| w.cumulative_secs)
    }
}

fn densify(points: &[Coordinate], max_spacing_miles: f64) -> Vec<Coordinate> {
    let mut dense = Vec::with_capacity(points.len());
    dense.push(points[0]);
    for pair in points.windows(2) {
        let gap = great_circle_miles(pair[0], pair[1]);
        if max_spacing_miles > 0.0 && gap > max_spacing_miles {
            let pieces = (gap / max_spacing_miles).ceil() as usize;
            for step in 1..pieces {
                dense.push(intermediate(pair[0], pair[1], step as f64 / pieces as f64));
            }
        }
        dense.push(pair[1]);
    }
    dense
}

/// Index of the point nearest each anchor, searched forward so anchors stay
/// in order. The first and last anchors are pinned to the route ends.
fn locate_anchors(points: &[Coordinate], anchors: &[Coordinate]) -> Vec<usize> {
    let last = points.len() - 1;
    let mut indices = Vec::with_capacity(anchors.len());
    let mut from = 0;
    for (n, anchor) in anchors.iter().enumerate() {
        let index = if n == 0 {
            0
        } else if n == anchors.len() - 1 {
            last
        } else {
            (from..=last)
                .min_by(|&a, &b| {
                    great_circle_miles(points[a], *anchor)
                        .total_cmp(&great_circle_miles(points[b], *anchor))
                })
                .unwrap_or(from)
        };
        indices.push(index);
        from = index;
    }
    indices
}

/// Spreads `totals` over a span in proportion to great-circle progress.
fn scale_span(span: &mut [Waypoint], along: &[f64], base: (f64, f64), totals: (f64, f64)) {
    let start = along[0];
    let length = along[along.len() - 1] - start;
    let last = span.len() - 1;
    for (i, waypoint) in span.iter_mut().enumerate() {
        let fraction = if length > 0.0 {
            (along[i] - start) / length
        } else if i == last {
            1.0
        } else {
            0.0
        };
        waypoint.cumulative_miles = base.0 + totals.0 * fraction;
        waypoint.cumulative_secs = base.1 + totals.1 * fraction;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::LegSummary;

    const OKC: Coordinate = Coordinate::new(35.4676, -97.5164);
    const TULSA: Coordinate = Coordinate::new(36.1540, -95.9928);
    const DALLAS: Coordinate = Coordinate::new(32.7767, -96.7970);

    fn raw(points: Vec<Coordinate>, miles: f64, secs: f64, legs: Vec<LegSummary>) -> RawRoute {
        RawRoute {
            geometry: Polyline::new(points),
            distance_miles: miles,
            duration_secs: secs,
            legs,
        }
    }

    #[test]
    fn test_single_point_geometry_is_degenerate() {
        let err = Route::from_raw(&raw(vec![OKC], 0.0, 0.0, vec![]), &[OKC, DALLAS], 25.0)
            .unwrap_err();
        assert!(matches!(err, PlanningError::DegenerateRoute(_)));
    }

    #[test]
    fn test_totals_match_provider() {
        let route = Route::from_raw(
            &raw(vec![OKC, DALLAS], 206.0, 11_000.0, vec![]),
            &[OKC, DALLAS],
            25.0,
        )
        .unwrap();
        assert!((route.total_miles() - 206.0).abs() < 1e-9);
        assert!((route.total_secs() - 11_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_densified_spacing() {
        let route = Route::from_raw(
            &raw(vec![OKC, DALLAS], 206.0, 11_000.0, vec![]),
            &[OKC, DALLAS],
            25.0,
        )
        .unwrap();
        assert!(route.waypoints().len() >= 8);
        for pair in route.waypoints().windows(2) {
            assert!(great_circle_miles(pair[0].coordinate, pair[1].coordinate) <= 25.0 + 1e-6);
        }
    }

    #[test]
    fn test_cumulative_fields_non_decreasing() {
        let route = Route::from_raw(
            &raw(vec![TULSA, OKC, DALLAS], 310.0, 17_000.0, vec![]),
            &[TULSA, OKC, DALLAS],
            10.0,
        )
        .unwrap();
        for pair in route.waypoints().windows(2) {
            assert!(pair[1].cumulative_miles >= pair[0].cumulative_miles);
            assert!(pair[1].cumulative_secs >= pair[0].cumulative_secs);
        }
    }

    #[test]
    fn test_leg_totals_land_on_anchors() {
        let legs = vec![
            LegSummary {
                distance_miles: 106.0,
                duration_secs: 6_000.0,
            },
            LegSummary {
                distance_miles: 206.0,
                duration_secs: 11_000.0,
            },
        ];
        let route = Route::from_raw(
            &raw(vec![TULSA, OKC, DALLAS], 312.0, 17_000.0, legs),
            &[TULSA, OKC, DALLAS],
            25.0,
        )
        .unwrap();
        let pickup = route.anchor(1).unwrap();
        assert_eq!(route.waypoints()[pickup].coordinate, OKC);
        assert!((route.waypoints()[pickup].cumulative_miles - 106.0).abs() < 1e-9);
        assert!((route.waypoints()[pickup].cumulative_secs - 6_000.0).abs() < 1e-9);
        assert!((route.total_miles() - 312.0).abs() < 1e-9);
    }

    #[test]
    fn test_origin_equal_to_pickup() {
        let route = Route::from_raw(
            &raw(vec![OKC, OKC, DALLAS], 206.0, 11_000.0, vec![]),
            &[OKC, OKC, DALLAS],
            25.0,
        )
        .unwrap();
        let pickup = route.anchor(1).unwrap();
        assert_eq!(route.waypoints()[pickup].cumulative_miles, 0.0);
        assert_eq!(route.anchor(2), Some(route.waypoints().len() - 1));
    }
}
