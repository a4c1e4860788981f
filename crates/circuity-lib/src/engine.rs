//! Circuity engine: composes the geodesic calculator and routing client.

use std::time::Instant;

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::geo::{self, round_to, Coordinate, Units};
use crate::osrm::RoutingClient;

/// Result of a fresh circuity computation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CircuityOutcome {
    pub road_distance: f64,
    pub straight_distance: f64,
    pub circuity_factor: f64,
    pub efficiency_percent: f64,
    /// Wall-clock time for the whole computation, in whole milliseconds.
    pub calculation_time_ms: u64,
}

/// Compute road distance, straight-line distance, and their ratio.
///
/// The straight-line distance is cheap and local, so it is computed first;
/// the road distance requires a network round trip to the routing service.
/// Elapsed time brackets both steps.
pub fn compute(
    client: &RoutingClient,
    origin: Coordinate,
    destination: Coordinate,
    units: Units,
) -> Result<CircuityOutcome> {
    let started = Instant::now();

    let straight_distance = geo::straight_distance(origin, destination, units);
    let road_distance = client.road_distance(origin, destination, units)?;

    let (circuity_factor, efficiency_percent) = circuity_ratios(road_distance, straight_distance);
    let calculation_time_ms = started.elapsed().as_millis() as u64;

    debug!(
        road_distance,
        straight_distance, circuity_factor, calculation_time_ms, "computed circuity"
    );

    Ok(CircuityOutcome {
        road_distance,
        straight_distance,
        circuity_factor,
        efficiency_percent,
        calculation_time_ms,
    })
}

/// Derive the circuity factor (3dp) and efficiency percentage (2dp).
///
/// Zero-length routes would divide by zero; they are defined as perfectly
/// direct instead: factor 1.0, efficiency 100.0. Efficiency is conceptually
/// capped at 100% but not clamped here, since irregular routing data can
/// report a road shorter than the great circle.
pub fn circuity_ratios(road_distance: f64, straight_distance: f64) -> (f64, f64) {
    if road_distance == 0.0 || straight_distance == 0.0 {
        return (1.0, 100.0);
    }

    (
        round_to(road_distance / straight_distance, 3),
        round_to(straight_distance / road_distance * 100.0, 2),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratios_round_to_reported_precision() {
        let (factor, efficiency) = circuity_ratios(10.5, 8.3);
        assert_eq!(factor, 1.265);
        assert_eq!(efficiency, 79.05);
    }

    #[test]
    fn direct_route_has_factor_one() {
        let (factor, efficiency) = circuity_ratios(8.3, 8.3);
        assert_eq!(factor, 1.0);
        assert_eq!(efficiency, 100.0);
    }

    #[test]
    fn zero_road_distance_is_defined_as_direct() {
        let (factor, efficiency) = circuity_ratios(0.0, 0.0);
        assert_eq!(factor, 1.0);
        assert_eq!(efficiency, 100.0);
    }

    #[test]
    fn zero_straight_distance_is_defined_as_direct() {
        // Snapped endpoints can coincide while the road distance stays positive.
        let (factor, efficiency) = circuity_ratios(0.4, 0.0);
        assert_eq!(factor, 1.0);
        assert_eq!(efficiency, 100.0);
    }

    #[test]
    fn efficiency_above_hundred_is_not_clamped() {
        // Routing data irregularity: road shorter than the great circle.
        let (factor, efficiency) = circuity_ratios(7.0, 8.0);
        assert_eq!(factor, 0.875);
        assert_eq!(efficiency, 114.29);
    }
}
