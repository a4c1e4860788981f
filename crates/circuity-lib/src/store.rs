//! SQLite-backed store for calculation records.
//!
//! The store exclusively owns the persisted collection. Records are
//! append-only: they are inserted once by the calculation path and never
//! updated or merged. Cache lookups are direction-symmetric: a route saved
//! as A to B is a cache hit for B to A with the same units, with the forward
//! direction taking precedence as a documented tie-break. Concurrent misses
//! for the same route may each insert a row; duplicates are an accepted
//! tradeoff, not deduplicated at write time.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::CircuityOutcome;
use crate::error::{Error, Result};
use crate::geo::{round_to, Coordinate, Location, Units};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS calculations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    origin_lat REAL NOT NULL,
    origin_lng REAL NOT NULL,
    origin_name TEXT,
    destination_lat REAL NOT NULL,
    destination_lng REAL NOT NULL,
    destination_name TEXT,
    road_distance REAL NOT NULL,
    straight_distance REAL NOT NULL,
    circuity_factor REAL NOT NULL,
    efficiency_percent REAL NOT NULL,
    units TEXT NOT NULL,
    calculation_time_ms INTEGER NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_calculations_route
    ON calculations (origin_lat, origin_lng, destination_lat, destination_lng, units);
";

const RECORD_COLUMNS: &str = "id, origin_lat, origin_lng, origin_name, \
    destination_lat, destination_lng, destination_name, road_distance, \
    straight_distance, circuity_factor, efficiency_percent, units, \
    calculation_time_ms, created_at";

const SEARCH_FILTER: &str = "LOWER(COALESCE(origin_name, '')) LIKE ?1 \
    OR LOWER(COALESCE(destination_name, '')) LIKE ?1";

/// A persisted circuity calculation.
///
/// Coordinates are stored rounded to 6 decimal places so cache lookups can
/// use exact matching. Immutable after insert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalculationRecord {
    pub id: i64,
    pub origin: Location,
    pub destination: Location,
    pub road_distance: f64,
    pub straight_distance: f64,
    pub circuity_factor: f64,
    pub efficiency_percent: f64,
    pub units: Units,
    pub calculation_time_ms: u64,
    pub created_at: DateTime<Utc>,
}

/// Ordering key for history listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Most recent first.
    #[default]
    Newest,
    /// Oldest first.
    Oldest,
    /// Lowest circuity factor first.
    CircuityAsc,
    /// Highest circuity factor first.
    CircuityDesc,
}

impl SortKey {
    /// Parse a sort key from its wire representation.
    ///
    /// Unrecognized values are rejected, never silently defaulted.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "newest" => Ok(SortKey::Newest),
            "oldest" => Ok(SortKey::Oldest),
            "circuity_asc" => Ok(SortKey::CircuityAsc),
            "circuity_desc" => Ok(SortKey::CircuityDesc),
            other => Err(Error::InvalidSortKey {
                value: other.to_string(),
            }),
        }
    }

    /// SQL ordering clause. The id tie-break keeps pagination stable when
    /// records share a created_at timestamp or circuity factor.
    fn order_clause(self) -> &'static str {
        match self {
            SortKey::Newest => "created_at DESC, id DESC",
            SortKey::Oldest => "created_at ASC, id ASC",
            SortKey::CircuityAsc => "circuity_factor ASC, id ASC",
            SortKey::CircuityDesc => "circuity_factor DESC, id ASC",
        }
    }
}

/// Parameters for a paginated history listing.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryQuery {
    /// 1-based page number.
    pub page: u32,
    /// Page size, bounded to [1, 100].
    pub limit: u32,
    /// Case-insensitive substring match against either endpoint name.
    pub search: Option<String>,
    pub sort: SortKey,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 50,
            search: None,
            sort: SortKey::Newest,
        }
    }
}

/// One page of history records plus the pre-pagination match count.
#[derive(Debug, Clone)]
pub struct HistoryPage {
    pub records: Vec<CalculationRecord>,
    /// Total records matching the filter, before pagination.
    pub total_count: u64,
}

/// Aggregate statistics over every stored calculation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalculationStats {
    pub total_calculations: u64,
    pub average_circuity_factor: f64,
    pub average_efficiency_percent: f64,
}

/// Handle to the calculations database.
///
/// Cheaply cloneable; clones share one connection behind a mutex, so each
/// store operation sees a consistent snapshot.
#[derive(Clone)]
pub struct CalculationStore {
    connection: Arc<Mutex<Connection>>,
}

impl CalculationStore {
    /// Open (or create) the store at the given path.
    ///
    /// Schema creation is idempotent, so reopening an existing database is
    /// safe.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let connection = Connection::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "opening calculation store");
        Self::init(connection)
    }

    /// Open an in-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(connection: Connection) -> Result<Self> {
        connection.execute_batch(SCHEMA)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.connection.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Direction-symmetric cache lookup.
    ///
    /// Both requested coordinates are rounded to 6 decimals, then matched
    /// exactly against (origin, destination, units) and, failing that,
    /// against the swapped direction. The forward match takes precedence;
    /// within a direction the oldest record wins, so racing duplicate writes
    /// resolve deterministically.
    pub fn find_cached(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        units: Units,
    ) -> Result<Option<CalculationRecord>> {
        let origin = origin.rounded();
        let destination = destination.rounded();

        if let Some(record) = self.find_exact(origin, destination, units)? {
            return Ok(Some(record));
        }
        self.find_exact(destination, origin, units)
    }

    fn find_exact(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        units: Units,
    ) -> Result<Option<CalculationRecord>> {
        let connection = self.lock();
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM calculations \
             WHERE origin_lat = ?1 AND origin_lng = ?2 \
               AND destination_lat = ?3 AND destination_lng = ?4 \
               AND units = ?5 \
             ORDER BY id ASC LIMIT 1"
        );
        let mut stmt = connection.prepare(&sql)?;
        let record = stmt
            .query_row(
                params![
                    origin.lat,
                    origin.lng,
                    destination.lat,
                    destination.lng,
                    units.as_str()
                ],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Persist one calculation as an immutable record.
    ///
    /// Assigns the id and created_at timestamp. Never merges with or
    /// overwrites existing rows.
    pub fn save(
        &self,
        origin: &Location,
        destination: &Location,
        units: Units,
        outcome: &CircuityOutcome,
    ) -> Result<CalculationRecord> {
        let origin_coordinate = origin.coordinate.rounded();
        let destination_coordinate = destination.coordinate.rounded();
        let created_at = Utc::now();

        let connection = self.lock();
        connection.execute(
            "INSERT INTO calculations (
                origin_lat, origin_lng, origin_name,
                destination_lat, destination_lng, destination_name,
                road_distance, straight_distance,
                circuity_factor, efficiency_percent,
                units, calculation_time_ms, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                origin_coordinate.lat,
                origin_coordinate.lng,
                origin.name,
                destination_coordinate.lat,
                destination_coordinate.lng,
                destination.name,
                outcome.road_distance,
                outcome.straight_distance,
                outcome.circuity_factor,
                outcome.efficiency_percent,
                units.as_str(),
                outcome.calculation_time_ms as i64,
                created_at.to_rfc3339(),
            ],
        )?;
        let id = connection.last_insert_rowid();
        debug!(id, "saved calculation record");

        Ok(CalculationRecord {
            id,
            origin: Location::new(origin_coordinate, origin.name.clone()),
            destination: Location::new(destination_coordinate, destination.name.clone()),
            road_distance: outcome.road_distance,
            straight_distance: outcome.straight_distance,
            circuity_factor: outcome.circuity_factor,
            efficiency_percent: outcome.efficiency_percent,
            units,
            calculation_time_ms: outcome.calculation_time_ms,
            created_at,
        })
    }

    /// Paginated, filterable, sortable history listing.
    ///
    /// Returns the requested page plus the total count of records matching
    /// the filter so callers can derive total pages and has-next/has-prev.
    pub fn list_history(&self, query: &HistoryQuery) -> Result<HistoryPage> {
        if query.page < 1 {
            return Err(Error::InvalidPage { page: query.page });
        }
        if query.limit < 1 || query.limit > 100 {
            return Err(Error::InvalidLimit { limit: query.limit });
        }

        let pattern = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(|term| format!("%{}%", term.to_lowercase()));

        let offset = i64::from(query.page - 1) * i64::from(query.limit);
        let order = query.sort.order_clause();
        let connection = self.lock();

        match pattern {
            Some(pattern) => {
                let total_count: i64 = connection.query_row(
                    &format!("SELECT COUNT(*) FROM calculations WHERE {SEARCH_FILTER}"),
                    params![pattern],
                    |row| row.get(0),
                )?;

                let sql = format!(
                    "SELECT {RECORD_COLUMNS} FROM calculations \
                     WHERE {SEARCH_FILTER} \
                     ORDER BY {order} LIMIT ?2 OFFSET ?3"
                );
                let mut stmt = connection.prepare(&sql)?;
                let rows = stmt.query_map(
                    params![pattern, i64::from(query.limit), offset],
                    row_to_record,
                )?;
                let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;

                Ok(HistoryPage {
                    records,
                    total_count: total_count as u64,
                })
            }
            None => {
                let total_count: i64 =
                    connection.query_row("SELECT COUNT(*) FROM calculations", [], |row| {
                        row.get(0)
                    })?;

                let sql = format!(
                    "SELECT {RECORD_COLUMNS} FROM calculations \
                     ORDER BY {order} LIMIT ?1 OFFSET ?2"
                );
                let mut stmt = connection.prepare(&sql)?;
                let rows =
                    stmt.query_map(params![i64::from(query.limit), offset], row_to_record)?;
                let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;

                Ok(HistoryPage {
                    records,
                    total_count: total_count as u64,
                })
            }
        }
    }

    /// Aggregate statistics over the entire stored set, unfiltered.
    ///
    /// An empty store yields all zeros; this is a defined state, not an
    /// error.
    pub fn aggregate_stats(&self) -> Result<CalculationStats> {
        let connection = self.lock();
        let (count, avg_circuity, avg_efficiency): (i64, Option<f64>, Option<f64>) = connection
            .query_row(
                "SELECT COUNT(*), AVG(circuity_factor), AVG(efficiency_percent) \
                 FROM calculations",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;

        Ok(CalculationStats {
            total_calculations: count as u64,
            average_circuity_factor: round_to(avg_circuity.unwrap_or(0.0), 3),
            average_efficiency_percent: round_to(avg_efficiency.unwrap_or(0.0), 2),
        })
    }

    /// Connectivity check used by the readiness probe. Swallows all errors.
    pub fn ping(&self) -> bool {
        let connection = self.lock();
        connection
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .is_ok()
    }
}

impl std::fmt::Debug for CalculationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalculationStore").finish_non_exhaustive()
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<CalculationRecord> {
    let units_raw: String = row.get(11)?;
    let units = Units::parse(&units_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            11,
            Type::Text,
            format!("unknown units value: {units_raw}").into(),
        )
    })?;

    let created_at_raw: String = row.get(13)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(13, Type::Text, Box::new(err)))?
        .with_timezone(&Utc);

    let calculation_time_ms: i64 = row.get(12)?;

    Ok(CalculationRecord {
        id: row.get(0)?,
        origin: Location::new(
            Coordinate {
                lat: row.get(1)?,
                lng: row.get(2)?,
            },
            row.get(3)?,
        ),
        destination: Location::new(
            Coordinate {
                lat: row.get(4)?,
                lng: row.get(5)?,
            },
            row.get(6)?,
        ),
        road_distance: row.get(7)?,
        straight_distance: row.get(8)?,
        circuity_factor: row.get(9)?,
        efficiency_percent: row.get(10)?,
        units,
        calculation_time_ms: calculation_time_ms.max(0) as u64,
        created_at,
    })
}
