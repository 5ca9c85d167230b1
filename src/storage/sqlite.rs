use super::{LoadOutcome, ShipStore};
use crate::constants::ISO_DATE_FORMAT;
use crate::error::{StoreError, StoreResult};
use crate::types::{DateRangeSummary, EfficiencyByType, Ship, ShipEmission, ShipPatch};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rusqlite::{ffi, params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info};

const MIGRATION: &str = include_str!("../../migrations/001_create_ships.sql");

const SHIP_COLUMNS: &str = "id, name, ship_type, reporting_period, doc_issue_date, doc_expiry_date, \
     annual_average_co2_emissions, total_co2_emissions, technical_efficiency";

const INSERT_SHIP: &str = "INSERT INTO ships (name, ship_type, reporting_period, doc_issue_date, \
     doc_expiry_date, annual_average_co2_emissions, total_co2_emissions, technical_efficiency) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

/// SQLite-backed ship store.
///
/// A single connection behind a mutex; every operation runs to completion
/// while holding it, on the blocking thread pool.
pub struct SqliteShipStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteShipStore {
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        info!("Opened ship store at {}", path.display());
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(MIGRATION)?;
        debug!("Ship store migrations applied");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| StoreError::LockPoisoned)?;
            f(&mut conn)
        })
        .await?
    }

    fn query_ships(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> StoreResult<Vec<Ship>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, ShipRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(ShipRow::into_ship).collect()
    }

    fn fetch(conn: &Connection, id: i64) -> StoreResult<Option<Ship>> {
        let sql = format!("SELECT {SHIP_COLUMNS} FROM ships WHERE id = ?1");
        let row = conn.query_row(&sql, params![id], ShipRow::from_row).optional()?;
        row.map(ShipRow::into_ship).transpose()
    }
}

/// Column values as stored, before dates are decoded
struct ShipRow {
    id: i64,
    name: String,
    ship_type: String,
    reporting_period: Option<String>,
    doc_issue_date: Option<String>,
    doc_expiry_date: Option<String>,
    annual_average_co2_emissions: f64,
    total_co2_emissions: Option<f64>,
    technical_efficiency: f64,
}

impl ShipRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            ship_type: row.get(2)?,
            reporting_period: row.get(3)?,
            doc_issue_date: row.get(4)?,
            doc_expiry_date: row.get(5)?,
            annual_average_co2_emissions: row.get(6)?,
            total_co2_emissions: row.get(7)?,
            technical_efficiency: row.get(8)?,
        })
    }

    fn into_ship(self) -> StoreResult<Ship> {
        Ok(Ship {
            id: self.id,
            emission: ShipEmission {
                name: self.name,
                ship_type: self.ship_type,
                reporting_period: decode_date("reporting_period", self.reporting_period)?,
                doc_issue_date: decode_date("doc_issue_date", self.doc_issue_date)?,
                doc_expiry_date: decode_date("doc_expiry_date", self.doc_expiry_date)?,
                annual_average_co2_emissions: self.annual_average_co2_emissions,
                total_co2_emissions: self.total_co2_emissions,
                technical_efficiency: self.technical_efficiency,
            },
        })
    }
}

fn encode_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format(ISO_DATE_FORMAT).to_string())
}

fn decode_date(field: &'static str, value: Option<String>) -> StoreResult<Option<NaiveDate>> {
    match value {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(&s, ISO_DATE_FORMAT)
            .map(Some)
            .map_err(|_| StoreError::Corrupt { field, value: s }),
    }
}

/// Map a UNIQUE violation on `name` to `DuplicateName`; other constraint
/// failures stay database errors
fn name_conflict(err: rusqlite::Error, name: &str) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            StoreError::DuplicateName(name.to_string())
        }
        _ => StoreError::Sqlite(err),
    }
}

fn insert_ship(conn: &Connection, ship: &ShipEmission) -> StoreResult<i64> {
    conn.execute(
        INSERT_SHIP,
        params![
            ship.name,
            ship.ship_type,
            encode_date(ship.reporting_period),
            encode_date(ship.doc_issue_date),
            encode_date(ship.doc_expiry_date),
            ship.annual_average_co2_emissions,
            ship.total_co2_emissions,
            ship.technical_efficiency,
        ],
    )
    .map_err(|e| name_conflict(e, &ship.name))?;
    Ok(conn.last_insert_rowid())
}

#[async_trait]
impl ShipStore for SqliteShipStore {
    async fn count(&self) -> StoreResult<u64> {
        self.with_conn(move |conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM ships", [], |r| r.get(0))?;
            Ok(n as u64)
        })
        .await
    }

    async fn list(&self, skip: u64, limit: u64) -> StoreResult<Vec<Ship>> {
        self.with_conn(move |conn| {
            let sql = format!("SELECT {SHIP_COLUMNS} FROM ships ORDER BY id LIMIT ?1 OFFSET ?2");
            Self::query_ships(conn, &sql, params![limit as i64, skip as i64])
        })
        .await
    }

    async fn get(&self, id: i64) -> StoreResult<Option<Ship>> {
        self.with_conn(move |conn| Self::fetch(conn, id)).await
    }

    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Ship>> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            let sql = format!("SELECT {SHIP_COLUMNS} FROM ships WHERE name = ?1");
            Ok(Self::query_ships(conn, &sql, params![name])?.into_iter().next())
        })
        .await
    }

    async fn create(&self, ship: ShipEmission) -> StoreResult<Ship> {
        self.with_conn(move |conn| {
            let id = insert_ship(conn, &ship)?;
            debug!("Created ship {} with id {}", ship.name, id);
            Ok(Ship { id, emission: ship })
        })
        .await
    }

    async fn update(&self, id: i64, patch: ShipPatch) -> StoreResult<Option<Ship>> {
        self.with_conn(move |conn| {
            let Some(mut ship) = Self::fetch(conn, id)? else {
                return Ok(None);
            };
            patch.apply_to(&mut ship.emission);
            let e = &ship.emission;
            conn.execute(
                "UPDATE ships SET name = ?1, ship_type = ?2, reporting_period = ?3, \
                 doc_issue_date = ?4, doc_expiry_date = ?5, annual_average_co2_emissions = ?6, \
                 total_co2_emissions = ?7, technical_efficiency = ?8 WHERE id = ?9",
                params![
                    e.name,
                    e.ship_type,
                    encode_date(e.reporting_period),
                    encode_date(e.doc_issue_date),
                    encode_date(e.doc_expiry_date),
                    e.annual_average_co2_emissions,
                    e.total_co2_emissions,
                    e.technical_efficiency,
                    id,
                ],
            )
            .map_err(|err| name_conflict(err, &e.name))?;
            Ok(Some(ship))
        })
        .await
    }

    async fn delete(&self, id: i64) -> StoreResult<Option<Ship>> {
        self.with_conn(move |conn| {
            let Some(ship) = Self::fetch(conn, id)? else {
                return Ok(None);
            };
            conn.execute("DELETE FROM ships WHERE id = ?1", params![id])?;
            Ok(Some(ship))
        })
        .await
    }

    async fn type_exists(&self, ship_type: &str) -> StoreResult<bool> {
        let ship_type = ship_type.to_string();
        self.with_conn(move |conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM ships WHERE ship_type = ?1 LIMIT 1",
                    params![ship_type],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }

    async fn list_by_type(&self, ship_type: &str, skip: u64, limit: u64) -> StoreResult<Vec<Ship>> {
        let ship_type = ship_type.to_string();
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {SHIP_COLUMNS} FROM ships WHERE ship_type = ?1 ORDER BY id LIMIT ?2 OFFSET ?3"
            );
            Self::query_ships(conn, &sql, params![ship_type, limit as i64, skip as i64])
        })
        .await
    }

    async fn list_by_period(&self, period: NaiveDate, skip: u64, limit: u64) -> StoreResult<Vec<Ship>> {
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {SHIP_COLUMNS} FROM ships WHERE reporting_period = ?1 ORDER BY id LIMIT ?2 OFFSET ?3"
            );
            let period = period.format(ISO_DATE_FORMAT).to_string();
            Self::query_ships(conn, &sql, params![period, limit as i64, skip as i64])
        })
        .await
    }

    async fn efficiency_by_type(&self) -> StoreResult<Vec<EfficiencyByType>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT ship_type, AVG(technical_efficiency) FROM ships \
                 GROUP BY ship_type ORDER BY ship_type",
            )?;
            let rows = stmt
                .query_map([], |r| {
                    Ok(EfficiencyByType {
                        ship_type: r.get(0)?,
                        average_technical_efficiency: r.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn summary(&self, start: NaiveDate, end: NaiveDate) -> StoreResult<Option<DateRangeSummary>> {
        self.with_conn(move |conn| {
            // ISO text sorts chronologically
            let (count, total, per_distance, efficiency): (i64, f64, Option<f64>, Option<f64>) = conn
                .query_row(
                    "SELECT COUNT(*), COALESCE(SUM(total_co2_emissions), 0.0), \
                     AVG(annual_average_co2_emissions), AVG(technical_efficiency) \
                     FROM ships WHERE reporting_period BETWEEN ?1 AND ?2",
                    params![
                        start.format(ISO_DATE_FORMAT).to_string(),
                        end.format(ISO_DATE_FORMAT).to_string()
                    ],
                    |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
                )?;
            if count == 0 {
                return Ok(None);
            }
            Ok(Some(DateRangeSummary {
                start_date: start,
                end_date: end,
                total_co2_emissions: total,
                average_co2_emissions_per_distance: per_distance.unwrap_or_default(),
                average_technical_efficiency: efficiency.unwrap_or_default(),
            }))
        })
        .await
    }

    async fn bulk_load(&self, rows: &[ShipEmission], checksum: &str, source: &str) -> StoreResult<LoadOutcome> {
        let rows = rows.to_vec();
        let (checksum, source) = (checksum.to_string(), source.to_string());
        self.with_conn(move |conn| {
            // IMMEDIATE takes the write lock up front, so two loaders cannot
            // both see an empty marker table
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let previous: Option<(String, String)> = tx
                .query_row(
                    "SELECT checksum, loaded_at FROM data_loads ORDER BY id LIMIT 1",
                    [],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )
                .optional()?;
            if let Some((checksum, loaded_at)) = previous {
                return Ok(LoadOutcome::Skipped { checksum, loaded_at });
            }

            for row in &rows {
                if let Err(e) = insert_ship(&tx, row) {
                    error!("Bulk load aborted at ship {}: {}", row.name, e);
                    return Err(e);
                }
            }
            tx.execute(
                "INSERT INTO data_loads (checksum, source, row_count, loaded_at) VALUES (?1, ?2, ?3, ?4)",
                params![checksum, source, rows.len() as i64, Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;

            Ok(LoadOutcome::Loaded {
                rows: rows.len(),
                checksum,
            })
        })
        .await
    }
}
