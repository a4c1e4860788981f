//! Client for the external OSRM-compatible routing service.
//!
//! The client issues exactly one request per call with a bounded timeout and
//! performs no retries; retry policy, if any, belongs to the caller. Only the
//! aggregate route distance is requested; geometry, steps, and alternatives
//! are disabled to keep responses small.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::geo::{round_to, Coordinate, Units};

/// Per-request timeout for the availability probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Known-connected probe route: San Francisco to Oakland.
const PROBE_ORIGIN: Coordinate = Coordinate {
    lat: 37.7749,
    lng: -122.4194,
};
const PROBE_DESTINATION: Coordinate = Coordinate {
    lat: 37.8044,
    lng: -122.2711,
};

/// Connection settings for the routing service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingConfig {
    pub host: String,
    pub port: u16,
    /// Request timeout in seconds for route queries.
    pub timeout_secs: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5001,
            timeout_secs: 10,
        }
    }
}

impl RoutingConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// HTTP client for road distance queries.
///
/// Cheaply cloneable; the underlying connection pool is shared between clones.
#[derive(Debug, Clone)]
pub struct RoutingClient {
    base_url: String,
    client: Client,
}

impl RoutingClient {
    /// Build a client from connection settings.
    pub fn new(config: &RoutingConfig) -> Result<Self> {
        Self::with_base_url(config.base_url(), Duration::from_secs(config.timeout_secs))
    }

    /// Build a client against an explicit base URL.
    ///
    /// Used by tests to point the client at a local stub server.
    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent())
            .build()?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    /// Query the road distance between two coordinates.
    ///
    /// Converts the service's native meters into the requested units and
    /// rounds to 2 decimal places.
    pub fn road_distance(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        units: Units,
    ) -> Result<f64> {
        let url = route_url(&self.base_url, origin, destination);
        debug!(url = %url, "requesting road distance");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("overview", "false"),
                ("alternatives", "false"),
                ("steps", "false"),
            ])
            .send()
            .map_err(|err| Error::RoutingUnavailable {
                message: err.to_string(),
            })?;

        let body: RouteResponse = response.json().map_err(|err| Error::RoutingService {
            message: format!("malformed routing response: {err}"),
        })?;

        distance_from_response(&body, units)
    }

    /// Lightweight liveness probe against a fixed, known-connected route.
    ///
    /// Swallows every failure into `false`; used only for health reporting,
    /// never for correctness decisions.
    pub fn check_availability(&self) -> bool {
        let url = route_url(&self.base_url, PROBE_ORIGIN, PROBE_DESTINATION);
        let result = self
            .client
            .get(&url)
            .query(&[("overview", "false")])
            .timeout(PROBE_TIMEOUT)
            .send();

        match result {
            Ok(response) => response
                .json::<RouteResponse>()
                .map(|body| body.code == "Ok")
                .unwrap_or(false),
            Err(err) => {
                debug!(error = %err, "routing availability probe failed");
                false
            }
        }
    }
}

/// OSRM route endpoint response.
#[derive(Debug, Deserialize)]
struct RouteResponse {
    code: String,
    #[serde(default)]
    routes: Vec<RouteSummary>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RouteSummary {
    /// Route length in meters.
    distance: f64,
}

fn route_url(base_url: &str, origin: Coordinate, destination: Coordinate) -> String {
    // OSRM expects longitude before latitude in the coordinate pairs.
    format!(
        "{base_url}/route/v1/driving/{},{};{},{}",
        origin.lng, origin.lat, destination.lng, destination.lat
    )
}

fn distance_from_response(body: &RouteResponse, units: Units) -> Result<f64> {
    match body.code.as_str() {
        "Ok" => {}
        "NoRoute" => return Err(Error::NoRouteFound),
        other => {
            return Err(Error::RoutingService {
                message: body
                    .message
                    .clone()
                    .unwrap_or_else(|| format!("routing service returned code {other}")),
            })
        }
    }

    let route = body.routes.first().ok_or(Error::NoRouteFound)?;
    Ok(round_to(route.distance * units.meters_factor(), 2))
}

fn user_agent() -> String {
    format!("circuity-lib/{version}", version = env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(code: &str, distances: &[f64], message: Option<&str>) -> RouteResponse {
        RouteResponse {
            code: code.to_string(),
            routes: distances
                .iter()
                .map(|&distance| RouteSummary { distance })
                .collect(),
            message: message.map(String::from),
        }
    }

    #[test]
    fn route_url_orders_lng_before_lat() {
        let origin = Coordinate {
            lat: 37.7749,
            lng: -122.4194,
        };
        let destination = Coordinate {
            lat: 37.8044,
            lng: -122.2711,
        };
        let url = route_url("http://localhost:5001", origin, destination);
        assert_eq!(
            url,
            "http://localhost:5001/route/v1/driving/-122.4194,37.7749;-122.2711,37.8044"
        );
    }

    #[test]
    fn meters_convert_to_miles() {
        let body = response("Ok", &[1609.34], None);
        let distance = distance_from_response(&body, Units::Miles).unwrap();
        assert_eq!(distance, 1.0);
    }

    #[test]
    fn meters_convert_to_kilometers() {
        let body = response("Ok", &[12345.0], None);
        let distance = distance_from_response(&body, Units::Kilometers).unwrap();
        assert_eq!(distance, 12.35);
    }

    #[test]
    fn first_route_wins_when_multiple_returned() {
        let body = response("Ok", &[1000.0, 9999.0], None);
        let distance = distance_from_response(&body, Units::Kilometers).unwrap();
        assert_eq!(distance, 1.0);
    }

    #[test]
    fn no_route_code_maps_to_no_route_found() {
        let body = response("NoRoute", &[], Some("Impossible route between points"));
        assert!(matches!(
            distance_from_response(&body, Units::Miles),
            Err(Error::NoRouteFound)
        ));
    }

    #[test]
    fn empty_routes_maps_to_no_route_found() {
        let body = response("Ok", &[], None);
        assert!(matches!(
            distance_from_response(&body, Units::Miles),
            Err(Error::NoRouteFound)
        ));
    }

    #[test]
    fn error_code_carries_upstream_message() {
        let body = response("InvalidQuery", &[], Some("Query string malformed"));
        match distance_from_response(&body, Units::Miles) {
            Err(Error::RoutingService { message }) => {
                assert_eq!(message, "Query string malformed");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn error_code_without_message_names_the_code() {
        let body = response("TooBig", &[], None);
        match distance_from_response(&body, Units::Miles) {
            Err(Error::RoutingService { message }) => {
                assert!(message.contains("TooBig"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn default_config_base_url() {
        let config = RoutingConfig::default();
        assert_eq!(config.base_url(), "http://localhost:5001");
        assert_eq!(config.timeout_secs, 10);
    }
}
