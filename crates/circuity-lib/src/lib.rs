//! Circuity factor computation and caching.
//!
//! This crate exposes the core of the circuity service: great-circle distance
//! math, the client for the external OSRM routing service, the engine that
//! combines both into a full calculation, and the SQLite-backed store with its
//! direction-symmetric cache lookup and history queries. Higher-level
//! consumers (the HTTP service) should only depend on the types and functions
//! exported here instead of reimplementing behavior.

#![deny(warnings)]

pub mod engine;
pub mod error;
pub mod geo;
pub mod osrm;
pub mod store;

pub use engine::{circuity_ratios, compute, CircuityOutcome};
pub use error::{Error, Result};
pub use geo::{straight_distance, Coordinate, Location, Units, MAX_LOCATION_NAME_LEN};
pub use osrm::{RoutingClient, RoutingConfig};
pub use store::{
    CalculationRecord, CalculationStats, CalculationStore, HistoryPage, HistoryQuery, SortKey,
};
