//! Request types and validation for HTTP endpoints.
//!
//! Validation happens here, at the boundary: out-of-range coordinates,
//! oversized names, bad pagination, and unknown sort keys are rejected before
//! they reach the core.

use serde::{Deserialize, Serialize};

use circuity_lib::{HistoryQuery, Location, SortKey, Units, MAX_LOCATION_NAME_LEN};

use crate::problem::ProblemDetails;

/// Validation trait for request types.
///
/// Implementations should validate all fields and return a `ProblemDetails`
/// error for invalid input.
pub trait Validate {
    /// Validate the request, returning an error if invalid.
    ///
    /// The `request_id` is used to populate the `instance` field of any
    /// returned `ProblemDetails`.
    ///
    /// Returns a boxed `ProblemDetails` to avoid large `Result::Err` variants.
    fn validate(&self, request_id: &str) -> Result<(), Box<ProblemDetails>>;
}

/// Request for computing a circuity factor between two locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculateRequest {
    /// Starting location.
    pub origin: Location,

    /// Destination location.
    pub destination: Location,

    /// Distance units for the whole calculation.
    #[serde(default)]
    pub units: Units,
}

impl Validate for CalculateRequest {
    fn validate(&self, request_id: &str) -> Result<(), Box<ProblemDetails>> {
        for (field, location) in [("origin", &self.origin), ("destination", &self.destination)] {
            if let Err(error) = location.coordinate.validate() {
                return Err(Box::new(ProblemDetails::bad_request(
                    format!("Invalid '{field}': {error}"),
                    request_id,
                )));
            }

            if let Some(name) = &location.name {
                if name.chars().count() > MAX_LOCATION_NAME_LEN {
                    return Err(Box::new(ProblemDetails::bad_request(
                        format!(
                            "The '{field}.name' field must be at most {MAX_LOCATION_NAME_LEN} characters"
                        ),
                        request_id,
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Query parameters for the history endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryParams {
    /// 1-based page number.
    #[serde(default = "default_page")]
    pub page: u32,

    /// Page size, bounded to [1, 100].
    #[serde(default = "default_limit")]
    pub limit: u32,

    /// Case-insensitive substring filter over endpoint names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,

    /// Ordering key; kept as a raw string so unknown values can be rejected
    /// with a proper validation error instead of a deserialization failure.
    #[serde(default = "default_sort_by")]
    pub sort_by: String,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    50
}

fn default_sort_by() -> String {
    "newest".to_string()
}

impl Default for HistoryParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
            search: None,
            sort_by: default_sort_by(),
        }
    }
}

impl HistoryParams {
    /// Validate and convert into the core's history query.
    pub fn to_query(&self, request_id: &str) -> Result<HistoryQuery, Box<ProblemDetails>> {
        if self.page < 1 {
            return Err(Box::new(ProblemDetails::bad_request(
                "The 'page' parameter must be at least 1",
                request_id,
            )));
        }

        if self.limit < 1 || self.limit > 100 {
            return Err(Box::new(ProblemDetails::bad_request(
                "The 'limit' parameter must be between 1 and 100",
                request_id,
            )));
        }

        let sort = SortKey::parse(&self.sort_by)
            .map_err(|error| Box::new(ProblemDetails::bad_request(error.to_string(), request_id)))?;

        Ok(HistoryQuery {
            page: self.page,
            limit: self.limit,
            search: self.search.clone(),
            sort,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use circuity_lib::Coordinate;

    fn request(lat: f64, lng: f64, name: Option<&str>) -> CalculateRequest {
        CalculateRequest {
            origin: Location::new(Coordinate { lat, lng }, name.map(String::from)),
            destination: Location::new(
                Coordinate {
                    lat: 37.8044,
                    lng: -122.2711,
                },
                None,
            ),
            units: Units::Miles,
        }
    }

    #[test]
    fn valid_request_passes() {
        assert!(request(37.7749, -122.4194, Some("SF")).validate("req-1").is_ok());
    }

    #[test]
    fn out_of_range_latitude_is_rejected() {
        let problem = request(91.0, 0.0, None).validate("req-2").unwrap_err();
        assert_eq!(problem.status, 400);
        assert!(problem.detail.as_deref().unwrap().contains("origin"));
    }

    #[test]
    fn oversized_name_is_rejected() {
        let long_name = "x".repeat(MAX_LOCATION_NAME_LEN + 1);
        let problem = request(37.0, -122.0, Some(&long_name))
            .validate("req-3")
            .unwrap_err();
        assert_eq!(problem.status, 400);
        assert!(problem.detail.as_deref().unwrap().contains("name"));
    }

    #[test]
    fn name_at_limit_is_accepted() {
        let name = "x".repeat(MAX_LOCATION_NAME_LEN);
        assert!(request(37.0, -122.0, Some(&name)).validate("req-4").is_ok());
    }

    #[test]
    fn calculate_request_units_default_to_miles() {
        let parsed: CalculateRequest = serde_json::from_str(
            r#"{"origin":{"lat":1.0,"lng":2.0},"destination":{"lat":3.0,"lng":4.0}}"#,
        )
        .unwrap();
        assert_eq!(parsed.units, Units::Miles);
    }

    #[test]
    fn history_params_defaults() {
        let params = HistoryParams::default();
        let query = params.to_query("req-5").expect("defaults valid");
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, 50);
        assert_eq!(query.sort, SortKey::Newest);
        assert!(query.search.is_none());
    }

    #[test]
    fn history_params_reject_bad_pagination() {
        let zero_page = HistoryParams {
            page: 0,
            ..HistoryParams::default()
        };
        assert_eq!(zero_page.to_query("req-6").unwrap_err().status, 400);

        let big_limit = HistoryParams {
            limit: 101,
            ..HistoryParams::default()
        };
        assert_eq!(big_limit.to_query("req-7").unwrap_err().status, 400);
    }

    #[test]
    fn history_params_reject_unknown_sort_key() {
        let params = HistoryParams {
            sort_by: "bogus".to_string(),
            ..HistoryParams::default()
        };
        let problem = params.to_query("req-8").unwrap_err();
        assert_eq!(problem.status, 400);
        assert!(problem.detail.as_deref().unwrap().contains("bogus"));
    }
}
