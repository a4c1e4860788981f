use thiserror::Error;

/// Convenient result alias for the circuity library.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Raised when a latitude falls outside the valid range.
    #[error("latitude {value} is out of range [-90, 90]")]
    InvalidLatitude { value: f64 },

    /// Raised when a longitude falls outside the valid range.
    #[error("longitude {value} is out of range [-180, 180]")]
    InvalidLongitude { value: f64 },

    /// Raised when the routing service could not be reached or timed out.
    #[error("routing service unavailable: {message}")]
    RoutingUnavailable { message: String },

    /// Raised when the routing service found no viable route.
    #[error("no route found between the requested points")]
    NoRouteFound,

    /// Raised when the routing service responded with an application error.
    #[error("routing service error: {message}")]
    RoutingService { message: String },

    /// Raised when a history query uses an unrecognized sort key.
    #[error("unsupported sort key: {value}")]
    InvalidSortKey { value: String },

    /// Raised when a history query asks for a page below 1.
    #[error("history page must be at least 1, got {page}")]
    InvalidPage { page: u32 },

    /// Raised when a history query limit is outside [1, 100].
    #[error("history limit must be between 1 and 100, got {limit}")]
    InvalidLimit { limit: u32 },

    /// Wrapper for SQLite errors.
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// Wrapper for HTTP client errors.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
