//! Prometheus metrics for the normalization pipeline and the record store.
//!
//! Recording functions are grouped by phase. Without an installed recorder
//! they are no-ops, so the batch commands and tests never need one.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use tracing::{info, warn};

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder once; later calls are no-ops.
pub fn init_metrics() {
    if HANDLE.get().is_some() {
        return;
    }
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if HANDLE.set(handle).is_ok() {
                info!("Prometheus recorder installed");
            }
        }
        Err(e) => {
            warn!("Prometheus recorder install failed (possibly already installed): {}", e);
        }
    }
}

/// Render the current snapshot in the Prometheus text format
pub fn render() -> Option<String> {
    HANDLE.get().map(|h| h.render())
}

pub mod pipeline {
    use metrics::{counter, histogram};

    pub fn rows_read(count: usize) {
        counter!("ship_pipeline_rows_read_total").increment(count as u64);
    }

    pub fn row_dropped(reason: &'static str) {
        counter!("ship_pipeline_rows_dropped_total", "reason" => reason).increment(1);
    }

    pub fn rows_written(count: usize) {
        counter!("ship_pipeline_rows_written_total").increment(count as u64);
    }

    pub fn missing_date() {
        counter!("ship_pipeline_missing_dates_total").increment(1);
    }

    pub fn run_duration(secs: f64) {
        histogram!("ship_pipeline_duration_seconds").record(secs);
    }
}

pub mod store {
    use metrics::counter;

    pub fn rows_loaded(count: usize) {
        counter!("ship_store_rows_loaded_total").increment(count as u64);
    }

    pub fn load_skipped() {
        counter!("ship_store_loads_skipped_total").increment(1);
    }

    pub fn record_created() {
        counter!("ship_store_records_created_total").increment(1);
    }

    pub fn record_deleted() {
        counter!("ship_store_records_deleted_total").increment(1);
    }
}
