use super::models::{
    has_iso_date_shape, DateRangeQuery, PageQuery, ShipIn, ShipList, ShipUpdate, SkipLimit,
};
use super::AppState;
use crate::constants::ISO_DATE_FORMAT;
use crate::error::ApiError;
use crate::metrics;
use crate::types::{DateRangeSummary, EfficiencyByType, Ship};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::NaiveDate;
use tracing::{debug, info};

type ApiResult<T> = Result<Json<T>, ApiError>;

fn ship_not_found() -> ApiError {
    ApiError::NotFound("Ship not found".to_string())
}

/// Liveness check with deployment metadata
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "environment": state.environment,
        "testing": state.testing,
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Prometheus text exposition
pub async fn prometheus() -> Result<String, ApiError> {
    metrics::render().ok_or_else(|| ApiError::NotFound("Metrics recorder not installed".to_string()))
}

pub async fn list_ships(
    State(state): State<AppState>,
    Query(paging): Query<SkipLimit>,
) -> ApiResult<ShipList> {
    let (skip, limit) = paging.bounds()?;
    let total = state.store.count().await?;
    let ships = state.store.list(skip, limit).await?;
    if ships.is_empty() {
        return Err(ApiError::NotFound("No ships found".to_string()));
    }
    Ok(Json(ShipList { total, ships }))
}

pub async fn get_ship(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Ship> {
    let ship = state.store.get(id).await?.ok_or_else(ship_not_found)?;
    Ok(Json(ship))
}

pub async fn create_ship(State(state): State<AppState>, Json(body): Json<ShipIn>) -> ApiResult<Ship> {
    let emission = body.into_emission()?;
    if state.store.find_by_name(&emission.name).await?.is_some() {
        return Err(ApiError::BadRequest(
            "Ship with this name already exists".to_string(),
        ));
    }
    // The UNIQUE constraint still catches a concurrent create of the same name
    let ship = state.store.create(emission).await?;
    metrics::store::record_created();
    info!("Created ship {} ({})", ship.id, ship.emission.name);
    Ok(Json(ship))
}

pub async fn update_ship(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ShipUpdate>,
) -> ApiResult<Ship> {
    let patch = body.into_patch()?;
    let ship = state.store.update(id, patch).await?.ok_or_else(ship_not_found)?;
    debug!("Updated ship {}", id);
    Ok(Json(ship))
}

pub async fn delete_ship(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Ship> {
    let ship = state.store.delete(id).await?.ok_or_else(ship_not_found)?;
    metrics::store::record_deleted();
    info!("Deleted ship {} ({})", id, ship.emission.name);
    Ok(Json(ship))
}

pub async fn ships_by_type(
    State(state): State<AppState>,
    Path(ship_type): Path<String>,
    Query(paging): Query<PageQuery>,
) -> ApiResult<Vec<Ship>> {
    let (offset, limit) = paging.bounds()?;
    if !state.store.type_exists(&ship_type).await? {
        return Err(ApiError::NotFound(
            "No ships found with the specified ship type".to_string(),
        ));
    }
    let ships = state.store.list_by_type(&ship_type, offset, limit).await?;
    Ok(Json(ships))
}

/// Only the shape of the period is validated; a well-shaped date that does
/// not exist simply matches nothing.
pub async fn ships_by_reporting_period(
    State(state): State<AppState>,
    Path(reporting_period): Path<String>,
    Query(paging): Query<SkipLimit>,
) -> ApiResult<Vec<Ship>> {
    if !has_iso_date_shape(&reporting_period) {
        return Err(ApiError::BadRequest(
            "Invalid reporting period format".to_string(),
        ));
    }
    let (skip, limit) = paging.bounds()?;
    let ships = match NaiveDate::parse_from_str(&reporting_period, ISO_DATE_FORMAT) {
        Ok(period) => state.store.list_by_period(period, skip, limit).await?,
        Err(_) => Vec::new(),
    };
    if ships.is_empty() && skip == 0 {
        return Err(ApiError::NotFound(
            "No ships found with the specified reporting period".to_string(),
        ));
    }
    Ok(Json(ships))
}

pub async fn efficiency_by_type(State(state): State<AppState>) -> ApiResult<Vec<EfficiencyByType>> {
    Ok(Json(state.store.efficiency_by_type().await?))
}

pub async fn date_range_summary(
    State(state): State<AppState>,
    Query(query): Query<DateRangeQuery>,
) -> ApiResult<DateRangeSummary> {
    let (start, end) = query.range()?;
    let summary = state.store.summary(start, end).await?.ok_or_else(|| {
        ApiError::NotFound("No ships found in the specified date range".to_string())
    })?;
    Ok(Json(summary))
}
