use crate::constants::{DEFAULT_PAGE_SIZE, ISO_DATE_FORMAT, MAX_PAGE_SIZE};
use crate::error::ApiError;
use crate::types::{Ship, ShipEmission, ShipPatch};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static ISO_DATE_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("valid regex"));

pub fn has_iso_date_shape(value: &str) -> bool {
    ISO_DATE_SHAPE.is_match(value)
}

/// Parse a `YYYY-MM-DD` request value, rejecting other shapes and impossible dates
pub fn parse_iso_date(field: &str, value: &str) -> Result<NaiveDate, ApiError> {
    if !has_iso_date_shape(value) {
        return Err(ApiError::BadRequest(format!(
            "Invalid {field} format, expected YYYY-MM-DD"
        )));
    }
    NaiveDate::parse_from_str(value, ISO_DATE_FORMAT)
        .map_err(|_| ApiError::BadRequest(format!("Invalid {field}: {value}")))
}

fn parse_optional_date(field: &str, value: Option<String>) -> Result<Option<NaiveDate>, ApiError> {
    value.map(|v| parse_iso_date(field, &v)).transpose()
}

/// Body of a create request
#[derive(Debug, Clone, Deserialize)]
pub struct ShipIn {
    pub name: String,
    pub ship_type: String,
    #[serde(default)]
    pub reporting_period: Option<String>,
    #[serde(default)]
    pub doc_issue_date: Option<String>,
    #[serde(default)]
    pub doc_expiry_date: Option<String>,
    pub annual_average_co2_emissions: f64,
    #[serde(default)]
    pub total_co2_emissions: Option<f64>,
    pub technical_efficiency: f64,
}

impl ShipIn {
    pub fn into_emission(self) -> Result<ShipEmission, ApiError> {
        Ok(ShipEmission {
            reporting_period: parse_optional_date("reporting_period", self.reporting_period)?,
            doc_issue_date: parse_optional_date("doc_issue_date", self.doc_issue_date)?,
            doc_expiry_date: parse_optional_date("doc_expiry_date", self.doc_expiry_date)?,
            name: self.name,
            ship_type: self.ship_type,
            annual_average_co2_emissions: self.annual_average_co2_emissions,
            total_co2_emissions: self.total_co2_emissions,
            technical_efficiency: self.technical_efficiency,
        })
    }
}

/// Body of an update request; absent or null fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShipUpdate {
    pub name: Option<String>,
    pub ship_type: Option<String>,
    pub reporting_period: Option<String>,
    pub doc_issue_date: Option<String>,
    pub doc_expiry_date: Option<String>,
    pub annual_average_co2_emissions: Option<f64>,
    pub total_co2_emissions: Option<f64>,
    pub technical_efficiency: Option<f64>,
}

impl ShipUpdate {
    pub fn into_patch(self) -> Result<ShipPatch, ApiError> {
        Ok(ShipPatch {
            reporting_period: parse_optional_date("reporting_period", self.reporting_period)?,
            doc_issue_date: parse_optional_date("doc_issue_date", self.doc_issue_date)?,
            doc_expiry_date: parse_optional_date("doc_expiry_date", self.doc_expiry_date)?,
            name: self.name,
            ship_type: self.ship_type,
            annual_average_co2_emissions: self.annual_average_co2_emissions,
            total_co2_emissions: self.total_co2_emissions,
            technical_efficiency: self.technical_efficiency,
        })
    }
}

/// `skip`/`limit` paging
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SkipLimit {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl SkipLimit {
    /// Validated `(skip, limit)`
    pub fn bounds(&self) -> Result<(u64, u64), ApiError> {
        let skip = self.skip.unwrap_or(0);
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE as i64);
        if skip < 0 {
            return Err(ApiError::BadRequest("skip must be >= 0".to_string()));
        }
        check_page_size("limit", limit)?;
        Ok((skip as u64, limit as u64))
    }
}

/// 1-based `page`/`page_size` paging
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl PageQuery {
    /// Validated `(offset, limit)`
    pub fn bounds(&self) -> Result<(u64, u64), ApiError> {
        let page = self.page.unwrap_or(1);
        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE as i64);
        if page < 1 {
            return Err(ApiError::BadRequest("page must be >= 1".to_string()));
        }
        check_page_size("page_size", page_size)?;
        let offset = (page as u64 - 1).saturating_mul(page_size as u64);
        Ok((offset, page_size as u64))
    }
}

fn check_page_size(name: &str, value: i64) -> Result<(), ApiError> {
    if value < 1 || value > MAX_PAGE_SIZE as i64 {
        return Err(ApiError::BadRequest(format!(
            "{name} must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct DateRangeQuery {
    pub start_date: String,
    pub end_date: String,
}

impl DateRangeQuery {
    pub fn range(&self) -> Result<(NaiveDate, NaiveDate), ApiError> {
        let start = parse_iso_date("start_date", &self.start_date)?;
        let end = parse_iso_date("end_date", &self.end_date)?;
        if start > end {
            return Err(ApiError::BadRequest(
                "start_date must not be after end_date".to_string(),
            ));
        }
        Ok((start, end))
    }
}

/// Response of the paginated listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipList {
    pub total: u64,
    pub ships: Vec<Ship>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_dates_need_shape_and_calendar() {
        assert!(parse_iso_date("d", "2019-12-31").is_ok());
        assert!(matches!(parse_iso_date("d", "2019-1-31"), Err(ApiError::BadRequest(_))));
        assert!(matches!(parse_iso_date("d", "31/12/2019"), Err(ApiError::BadRequest(_))));
        assert!(matches!(parse_iso_date("d", "2019-02-30"), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn paging_bounds() {
        assert_eq!(SkipLimit::default().bounds().unwrap(), (0, 1000));
        let bad = SkipLimit { skip: Some(-1), limit: None };
        assert!(bad.bounds().is_err());
        let too_big = SkipLimit { skip: None, limit: Some(1001) };
        assert!(too_big.bounds().is_err());

        let page = PageQuery { page: Some(3), page_size: Some(10) };
        assert_eq!(page.bounds().unwrap(), (20, 10));
        assert!(PageQuery { page: Some(0), page_size: None }.bounds().is_err());
    }

    #[test]
    fn update_with_bad_date_is_rejected() {
        let update = ShipUpdate {
            doc_issue_date: Some("yesterday".into()),
            ..Default::default()
        };
        assert!(matches!(update.into_patch(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn reversed_range_is_rejected() {
        let q = DateRangeQuery {
            start_date: "2020-01-01".into(),
            end_date: "2019-01-01".into(),
        };
        assert!(q.range().is_err());
    }
}
