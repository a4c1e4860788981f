//! RFC 9457 Problem Details for HTTP APIs.
//!
//! Provides structured error responses following the Problem Details standard.
//! See: <https://www.rfc-editor.org/rfc/rfc9457.html>

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use circuity_lib::Error as LibError;

/// Problem type URI for invalid request parameters.
pub const PROBLEM_INVALID_REQUEST: &str = "/problems/invalid-request";

/// Problem type URI for routes the routing service cannot find.
pub const PROBLEM_NO_ROUTE: &str = "/problems/no-route";

/// Problem type URI for an unreachable routing service.
pub const PROBLEM_ROUTING_UNAVAILABLE: &str = "/problems/routing-unavailable";

/// Problem type URI for upstream routing service errors.
pub const PROBLEM_ROUTING_UPSTREAM: &str = "/problems/routing-upstream";

/// Problem type URI for internal server errors.
pub const PROBLEM_INTERNAL_ERROR: &str = "/problems/internal-error";

/// RFC 9457 Problem Details response structure.
///
/// Provides a consistent format for error responses across all endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDetails {
    /// URI reference identifying the problem type (relative).
    #[serde(rename = "type")]
    pub type_uri: String,

    /// Short, human-readable summary of the problem.
    pub title: String,

    /// HTTP status code for this problem.
    pub status: u16,

    /// Human-readable explanation specific to this occurrence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// URI reference identifying the specific occurrence (e.g., request ID).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,

    /// Content type for this response (always "application/problem+json").
    pub content_type: String,
}

impl ProblemDetails {
    /// Create a new ProblemDetails with required fields.
    pub fn new(type_uri: impl Into<String>, title: impl Into<String>, status: StatusCode) -> Self {
        Self {
            type_uri: type_uri.into(),
            title: title.into(),
            status: status.as_u16(),
            detail: None,
            instance: None,
            content_type: "application/problem+json".to_string(),
        }
    }

    /// Add a detailed explanation of this specific problem occurrence.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Add the request identifier for tracing.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.instance = Some(request_id.into());
        self
    }

    /// Create a 400 Bad Request problem for invalid input.
    pub fn bad_request(detail: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(
            PROBLEM_INVALID_REQUEST,
            "Invalid Request",
            StatusCode::BAD_REQUEST,
        )
        .with_detail(detail)
        .with_request_id(request_id)
    }

    /// Create a 404 Not Found problem for unroutable point pairs.
    pub fn no_route(request_id: impl Into<String>) -> Self {
        Self::new(PROBLEM_NO_ROUTE, "No Route Found", StatusCode::NOT_FOUND)
            .with_detail("No viable road route exists between the requested points")
            .with_request_id(request_id)
    }

    /// Create a 503 Service Unavailable problem for an unreachable routing
    /// service.
    pub fn routing_unavailable(detail: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(
            PROBLEM_ROUTING_UNAVAILABLE,
            "Routing Service Unavailable",
            StatusCode::SERVICE_UNAVAILABLE,
        )
        .with_detail(detail)
        .with_request_id(request_id)
    }

    /// Create a 502 Bad Gateway problem carrying the upstream routing error.
    pub fn routing_upstream(detail: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(
            PROBLEM_ROUTING_UPSTREAM,
            "Routing Service Error",
            StatusCode::BAD_GATEWAY,
        )
        .with_detail(detail)
        .with_request_id(request_id)
    }

    /// Create a 500 Internal Server Error problem.
    pub fn internal_error(detail: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(
            PROBLEM_INTERNAL_ERROR,
            "Internal Error",
            StatusCode::INTERNAL_SERVER_ERROR,
        )
        .with_detail(detail)
        .with_request_id(request_id)
    }
}

impl std::fmt::Display for ProblemDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title, self.detail.as_deref().unwrap_or(""))
    }
}

impl std::error::Error for ProblemDetails {}

/// Implement IntoResponse for axum to return ProblemDetails as HTTP responses.
impl IntoResponse for ProblemDetails {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // Set the content-type header to application/problem+json
        let mut response = Json(&self).into_response();
        response.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/problem+json"),
        );

        *response.status_mut() = status;
        response
    }
}

impl IntoResponse for Box<ProblemDetails> {
    fn into_response(self) -> Response {
        (*self).into_response()
    }
}

/// Convert library errors to ProblemDetails.
///
/// The `request_id` must be provided separately since library errors don't
/// carry one.
pub fn from_lib_error(error: &LibError, request_id: &str) -> ProblemDetails {
    match error {
        LibError::NoRouteFound => ProblemDetails::no_route(request_id),
        LibError::RoutingUnavailable { message } => {
            ProblemDetails::routing_unavailable(message, request_id)
        }
        LibError::RoutingService { message } => {
            ProblemDetails::routing_upstream(message, request_id)
        }
        LibError::InvalidLatitude { .. }
        | LibError::InvalidLongitude { .. }
        | LibError::InvalidSortKey { .. }
        | LibError::InvalidPage { .. }
        | LibError::InvalidLimit { .. } => {
            ProblemDetails::bad_request(error.to_string(), request_id)
        }
        _ => ProblemDetails::internal_error(error.to_string(), request_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn problem_details_new() {
        let problem = ProblemDetails::new(PROBLEM_NO_ROUTE, "No Route Found", StatusCode::NOT_FOUND);
        assert_eq!(problem.type_uri, PROBLEM_NO_ROUTE);
        assert_eq!(problem.title, "No Route Found");
        assert_eq!(problem.status, 404);
        assert_eq!(problem.content_type, "application/problem+json");
    }

    #[test]
    fn problem_details_bad_request() {
        let problem = ProblemDetails::bad_request("Invalid JSON", "req-123");
        assert_eq!(problem.status, 400);
        assert_eq!(problem.instance.as_deref(), Some("req-123"));
        assert_eq!(problem.detail.as_deref(), Some("Invalid JSON"));
    }

    #[test]
    fn problem_details_serialization() {
        let problem = ProblemDetails::bad_request("Test error", "req-test");
        let json = serde_json::to_string(&problem).unwrap();

        assert!(json.contains("\"type\":\"/problems/invalid-request\""));
        assert!(json.contains("\"title\":\"Invalid Request\""));
        assert!(json.contains("\"status\":400"));
        assert!(json.contains("\"detail\":\"Test error\""));
        assert!(json.contains("\"instance\":\"req-test\""));
    }

    #[test]
    fn from_lib_error_no_route() {
        let problem = from_lib_error(&LibError::NoRouteFound, "req-1");
        assert_eq!(problem.type_uri, PROBLEM_NO_ROUTE);
        assert_eq!(problem.status, 404);
    }

    #[test]
    fn from_lib_error_routing_unavailable() {
        let error = LibError::RoutingUnavailable {
            message: "connection refused".to_string(),
        };
        let problem = from_lib_error(&error, "req-2");
        assert_eq!(problem.status, 503);
        assert!(problem.detail.as_deref().unwrap().contains("refused"));
    }

    #[test]
    fn from_lib_error_upstream_error_is_bad_gateway() {
        let error = LibError::RoutingService {
            message: "InvalidQuery".to_string(),
        };
        let problem = from_lib_error(&error, "req-3");
        assert_eq!(problem.status, 502);
    }

    #[test]
    fn from_lib_error_validation_variants_are_bad_requests() {
        let error = LibError::InvalidSortKey {
            value: "bogus".to_string(),
        };
        let problem = from_lib_error(&error, "req-4");
        assert_eq!(problem.status, 400);
        assert!(problem.detail.as_deref().unwrap().contains("bogus"));
    }
}
