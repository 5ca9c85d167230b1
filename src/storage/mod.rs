//! Record store for normalized ship emissions.
//!
//! The serving layer talks to a [`ShipStore`]; the only implementation is
//! SQLite-backed. Loading the interchange file is a separate, explicit step
//! that runs at most once per database.

pub mod sqlite;

use crate::error::StoreResult;
use crate::metrics;
use crate::pipeline::{file_checksum, read_interchange};
use crate::types::{DateRangeSummary, EfficiencyByType, Ship, ShipEmission, ShipPatch};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use std::path::Path;
use tracing::{info, instrument};

pub use sqlite::SqliteShipStore;

/// Result of a bulk load request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoadOutcome {
    Loaded { rows: usize, checksum: String },
    /// A load was already recorded; nothing was inserted
    Skipped { checksum: String, loaded_at: String },
}

#[async_trait]
pub trait ShipStore: Send + Sync {
    async fn count(&self) -> StoreResult<u64>;
    async fn list(&self, skip: u64, limit: u64) -> StoreResult<Vec<Ship>>;
    async fn get(&self, id: i64) -> StoreResult<Option<Ship>>;
    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Ship>>;

    /// Fails with `DuplicateName` if the name is taken
    async fn create(&self, ship: ShipEmission) -> StoreResult<Ship>;
    async fn update(&self, id: i64, patch: ShipPatch) -> StoreResult<Option<Ship>>;
    async fn delete(&self, id: i64) -> StoreResult<Option<Ship>>;

    async fn type_exists(&self, ship_type: &str) -> StoreResult<bool>;
    async fn list_by_type(&self, ship_type: &str, skip: u64, limit: u64) -> StoreResult<Vec<Ship>>;
    async fn list_by_period(&self, period: NaiveDate, skip: u64, limit: u64) -> StoreResult<Vec<Ship>>;

    async fn efficiency_by_type(&self) -> StoreResult<Vec<EfficiencyByType>>;
    /// `None` when no record's reporting period falls in the range
    async fn summary(&self, start: NaiveDate, end: NaiveDate) -> StoreResult<Option<DateRangeSummary>>;

    /// Insert every row in one transaction unless a load is already recorded
    async fn bulk_load(&self, rows: &[ShipEmission], checksum: &str, source: &str) -> StoreResult<LoadOutcome>;
}

/// Read an interchange file and bulk load it into `store`
#[instrument(skip(store))]
pub async fn load_interchange(store: &dyn ShipStore, path: &Path) -> StoreResult<LoadOutcome> {
    let checksum = file_checksum(path)?;
    let rows = read_interchange(path)?;
    let outcome = store
        .bulk_load(&rows, &checksum, &path.display().to_string())
        .await?;
    match &outcome {
        LoadOutcome::Loaded { rows, .. } => {
            metrics::store::rows_loaded(*rows);
            info!("Loaded {} ships from {}", rows, path.display());
        }
        LoadOutcome::Skipped { loaded_at, .. } => {
            metrics::store::load_skipped();
            info!("Data already loaded at {}, skipping", loaded_at);
        }
    }
    Ok(outcome)
}
