//! Circuity factor HTTP microservice.
//!
//! This service computes the ratio of road travel distance to straight-line
//! distance between two geographic points, caches every result, and serves
//! historical statistics. Road distances come from an external OSRM-compatible
//! routing service; results are persisted in SQLite.
//!
//! # Endpoints
//!
//! - `POST /api/v1/calculate` - Compute (or serve from cache) a circuity factor
//! - `GET /api/v1/history` - Paginated, searchable calculation history
//! - `GET /api/v1/stats` - Aggregate statistics over all calculations
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe (database + routing connectivity)
//!
//! # Configuration
//!
//! - `CIRCUITY_DB_PATH` - Path to the SQLite database (default: circuity.db)
//! - `OSRM_HOST` - Routing service host (default: localhost)
//! - `OSRM_PORT` - Routing service port (default: 5001)
//! - `OSRM_TIMEOUT` - Routing request timeout in seconds (default: 10)
//! - `SERVICE_PORT` - HTTP port (default: 8080)
//! - `RUST_LOG` - Log level (default: info)
//! - `LOG_FORMAT` - Log format: json (default) or text

mod health;
mod logging;
mod problem;
mod request;
mod state;

use std::env;
use std::net::SocketAddr;

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use circuity_lib::{
    compute, CalculationRecord, CalculationStats, CalculationStore, HistoryPage, Location,
    RoutingClient, RoutingConfig, Units,
};

use crate::health::{health_live, health_ready};
use crate::logging::{init_logging, LoggingConfig};
use crate::problem::{from_lib_error, ProblemDetails};
use crate::request::{CalculateRequest, HistoryParams, Validate};
use crate::state::AppState;

/// Calculation response returned to the caller.
#[derive(Debug, Serialize)]
struct CalculateResponse {
    /// Requested origin, echoed back with its name.
    origin: Location,
    /// Requested destination, echoed back with its name.
    destination: Location,
    road_distance: f64,
    straight_distance: f64,
    circuity_factor: f64,
    efficiency_percent: f64,
    units: Units,
    calculation_time_ms: u64,
    /// Whether the result came from the cache.
    cached: bool,
}

impl CalculateResponse {
    /// Build a response from a cache hit. Distances come from the stored
    /// record; origin and destination echo the request so names are the
    /// caller's own.
    fn from_record(origin: Location, destination: Location, record: &CalculationRecord) -> Self {
        Self {
            origin,
            destination,
            road_distance: record.road_distance,
            straight_distance: record.straight_distance,
            circuity_factor: record.circuity_factor,
            efficiency_percent: record.efficiency_percent,
            units: record.units,
            calculation_time_ms: record.calculation_time_ms,
            cached: true,
        }
    }

    /// Build a response from a freshly computed outcome.
    fn fresh(
        origin: Location,
        destination: Location,
        units: Units,
        outcome: &circuity_lib::CircuityOutcome,
    ) -> Self {
        Self {
            origin,
            destination,
            road_distance: outcome.road_distance,
            straight_distance: outcome.straight_distance,
            circuity_factor: outcome.circuity_factor,
            efficiency_percent: outcome.efficiency_percent,
            units,
            calculation_time_ms: outcome.calculation_time_ms,
            cached: false,
        }
    }
}

/// History response with pagination metadata.
#[derive(Debug, Serialize)]
struct HistoryResponse {
    items: Vec<CalculationRecord>,
    total_count: u64,
    page: u32,
    limit: u32,
    total_pages: u32,
    has_next: bool,
    has_prev: bool,
}

impl HistoryResponse {
    fn new(history: HistoryPage, page: u32, limit: u32) -> Self {
        let total_pages = history.total_count.div_ceil(u64::from(limit)) as u32;
        Self {
            items: history.records,
            total_count: history.total_count,
            page,
            limit,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (reads LOG_FORMAT from environment)
    let logging_config = LoggingConfig::from_env().with_service("circuity");
    init_logging(&logging_config);

    // Load configuration from environment
    let db_path = env::var("CIRCUITY_DB_PATH").unwrap_or_else(|_| "circuity.db".to_string());
    let port: u16 = env::var("SERVICE_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let routing_config = RoutingConfig {
        host: env::var("OSRM_HOST").unwrap_or_else(|_| "localhost".to_string()),
        port: env::var("OSRM_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(5001),
        timeout_secs: env::var("OSRM_TIMEOUT")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(10),
    };

    info!(
        db_path = %db_path,
        port,
        routing = %routing_config.base_url(),
        "starting circuity service"
    );

    let store = CalculationStore::open(&db_path).map_err(|e| {
        error!(error = %e, path = %db_path, "failed to open calculation store");
        e
    })?;
    let routing = RoutingClient::new(&routing_config)?;
    let state = AppState::new(store, routing);

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(addr = %addr, "listening on");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the service router over the given state.
fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/calculate", post(calculate_handler))
        .route("/api/v1/history", get(history_handler))
        .route("/api/v1/stats", get(stats_handler))
        .route("/health/live", get(health_live))
        .route("/health/ready", get(health_ready))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Handle POST /api/v1/calculate requests.
///
/// Checks the direction-symmetric cache first; on a miss, computes a fresh
/// result and persists it before responding.
async fn calculate_handler(
    State(state): State<AppState>,
    Json(request): Json<CalculateRequest>,
) -> Result<Json<CalculateResponse>, Box<ProblemDetails>> {
    let request_id = generate_request_id();

    info!(
        request_id = %request_id,
        units = ?request.units,
        "handling calculate request"
    );

    request.validate(&request_id)?;

    let store = state.store();
    let routing = state.routing();
    let task_request_id = request_id.clone();

    let response = run_blocking(&request_id, move || {
        let CalculateRequest {
            origin,
            destination,
            units,
        } = request;

        if let Some(record) = store
            .find_cached(origin.coordinate, destination.coordinate, units)
            .map_err(|error| Box::new(from_lib_error(&error, &task_request_id)))?
        {
            debug!(request_id = %task_request_id, record_id = record.id, "cache hit");
            return Ok(CalculateResponse::from_record(origin, destination, &record));
        }

        let outcome = compute(&routing, origin.coordinate, destination.coordinate, units)
            .map_err(|error| Box::new(from_lib_error(&error, &task_request_id)))?;

        store
            .save(&origin, &destination, units, &outcome)
            .map_err(|error| Box::new(from_lib_error(&error, &task_request_id)))?;

        Ok(CalculateResponse::fresh(origin, destination, units, &outcome))
    })
    .await?;

    info!(
        request_id = %request_id,
        cached = response.cached,
        circuity_factor = response.circuity_factor,
        "calculate request complete"
    );

    Ok(Json(response))
}

/// Handle GET /api/v1/history requests.
async fn history_handler(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, Box<ProblemDetails>> {
    let request_id = generate_request_id();
    let query = params.to_query(&request_id)?;

    let store = state.store();
    let task_request_id = request_id.clone();
    let history = run_blocking(&request_id, move || {
        store
            .list_history(&query)
            .map_err(|error| Box::new(from_lib_error(&error, &task_request_id)))
    })
    .await?;

    debug!(
        request_id = %request_id,
        total_count = history.total_count,
        "history query complete"
    );

    Ok(Json(HistoryResponse::new(history, params.page, params.limit)))
}

/// Handle GET /api/v1/stats requests.
async fn stats_handler(
    State(state): State<AppState>,
) -> Result<Json<CalculationStats>, Box<ProblemDetails>> {
    let request_id = generate_request_id();

    let store = state.store();
    let task_request_id = request_id.clone();
    let stats = run_blocking(&request_id, move || {
        store
            .aggregate_stats()
            .map_err(|error| Box::new(from_lib_error(&error, &task_request_id)))
    })
    .await?;

    Ok(Json(stats))
}

/// Run a blocking store or routing operation off the async runtime.
async fn run_blocking<T, F>(request_id: &str, task: F) -> Result<T, Box<ProblemDetails>>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, Box<ProblemDetails>> + Send + 'static,
{
    match tokio::task::spawn_blocking(task).await {
        Ok(result) => result,
        Err(join_error) => Err(Box::new(ProblemDetails::internal_error(
            format!("blocking task failed: {join_error}"),
            request_id,
        ))),
    }
}

/// Generate a unique request ID for tracing.
fn generate_request_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();

    format!("req-{:x}", timestamp)
}
