use crate::constants::{LogicalField, ISO_DATE_FORMAT};
use crate::error::{PipelineError, Result};
use crate::pipeline::projector::ProjectedRow;
use crate::pipeline::source::Cell;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One fully normalized emission report line.
///
/// Field order is the interchange column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipEmission {
    pub name: String,
    pub ship_type: String,
    pub reporting_period: Option<NaiveDate>,
    pub doc_issue_date: Option<NaiveDate>,
    pub doc_expiry_date: Option<NaiveDate>,
    pub annual_average_co2_emissions: f64,
    pub total_co2_emissions: Option<f64>,
    pub technical_efficiency: f64,
}

impl ShipEmission {
    /// Type a row that has been through every normalizer.
    ///
    /// The two filtered numeric fields must already be numbers.
    pub fn from_projected(mut row: ProjectedRow) -> Result<Self> {
        let annual_average_co2_emissions =
            require_number(&row, LogicalField::AnnualAverageCo2Emissions)?;
        let technical_efficiency = require_number(&row, LogicalField::TechnicalEfficiency)?;
        let total_co2_emissions = match row.take(LogicalField::TotalCo2Emissions) {
            Cell::Number(n) => Some(n),
            Cell::Text(s) => s.trim().parse::<f64>().ok(),
            Cell::Empty => None,
        }
        .filter(|n| n.is_finite());

        Ok(Self {
            name: row.take(LogicalField::Name).to_text(),
            ship_type: row.take(LogicalField::ShipType).to_text(),
            reporting_period: iso_date(&row, LogicalField::ReportingPeriod),
            doc_issue_date: iso_date(&row, LogicalField::DocIssueDate),
            doc_expiry_date: iso_date(&row, LogicalField::DocExpiryDate),
            annual_average_co2_emissions,
            total_co2_emissions,
            technical_efficiency,
        })
    }

    pub fn missing_dates(&self) -> usize {
        [self.reporting_period, self.doc_issue_date, self.doc_expiry_date]
            .iter()
            .filter(|d| d.is_none())
            .count()
    }
}

fn require_number(row: &ProjectedRow, field: LogicalField) -> Result<f64> {
    match row.get(field) {
        Cell::Number(n) => Ok(*n),
        other => Err(PipelineError::Coercion {
            field: field.name(),
            value: other.to_text(),
            row: row.origin.to_string(),
        }),
    }
}

fn iso_date(row: &ProjectedRow, field: LogicalField) -> Option<NaiveDate> {
    row.get(field)
        .as_text()
        .and_then(|s| NaiveDate::parse_from_str(s, ISO_DATE_FORMAT).ok())
}

/// A persisted ship record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ship {
    pub id: i64,
    #[serde(flatten)]
    pub emission: ShipEmission,
}

/// Partial update of a ship record; `None` leaves the field unchanged
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShipPatch {
    pub name: Option<String>,
    pub ship_type: Option<String>,
    pub reporting_period: Option<NaiveDate>,
    pub doc_issue_date: Option<NaiveDate>,
    pub doc_expiry_date: Option<NaiveDate>,
    pub annual_average_co2_emissions: Option<f64>,
    pub total_co2_emissions: Option<f64>,
    pub technical_efficiency: Option<f64>,
}

impl ShipPatch {
    pub fn apply_to(self, ship: &mut ShipEmission) {
        if let Some(name) = self.name {
            ship.name = name;
        }
        if let Some(ship_type) = self.ship_type {
            ship.ship_type = ship_type;
        }
        if self.reporting_period.is_some() {
            ship.reporting_period = self.reporting_period;
        }
        if self.doc_issue_date.is_some() {
            ship.doc_issue_date = self.doc_issue_date;
        }
        if self.doc_expiry_date.is_some() {
            ship.doc_expiry_date = self.doc_expiry_date;
        }
        if let Some(v) = self.annual_average_co2_emissions {
            ship.annual_average_co2_emissions = v;
        }
        if self.total_co2_emissions.is_some() {
            ship.total_co2_emissions = self.total_co2_emissions;
        }
        if let Some(v) = self.technical_efficiency {
            ship.technical_efficiency = v;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyByType {
    pub ship_type: String,
    pub average_technical_efficiency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateRangeSummary {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_co2_emissions: f64,
    pub average_co2_emissions_per_distance: f64,
    pub average_technical_efficiency: f64,
}
