use super::{DropReason, FieldNormalizer, StageOutcome};
use crate::constants::{LogicalField, DATE_FIELDS, ISO_DATE_FORMAT, REPORT_DATE_FORMAT};
use crate::error::Result;
use crate::metrics;
use crate::pipeline::projector::ProjectedRow;
use crate::pipeline::source::Cell;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

static REPORT_DATE_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{2}/[0-9]{2}/[0-9]{4}$").expect("valid regex"));

/// Years that format as four digits
const YEARS: std::ops::RangeInclusive<i32> = 1..=9999;

/// December 31st of the year a period value names.
///
/// Whole numbers and integer text are accepted; fractional numbers are
/// truncated toward zero. Years outside `1..=9999` and anything else have
/// no date.
pub fn year_to_last_day(value: &Cell) -> Option<NaiveDate> {
    let year = match value {
        Cell::Number(n) if n.is_finite() => {
            let year = n.trunc();
            if year < *YEARS.start() as f64 || year > *YEARS.end() as f64 {
                return None;
            }
            year as i32
        }
        Cell::Text(s) => s.trim().parse::<i32>().ok()?,
        _ => return None,
    };
    if !YEARS.contains(&year) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, 12, 31)
}

/// True when `text` has the `DD/MM/YYYY` shape; the calendar is not checked
pub fn has_report_date_shape(text: &str) -> bool {
    REPORT_DATE_SHAPE.is_match(text)
}

/// Maps the reporting period to its year-end, written as `DD/MM/YYYY`
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportingPeriodNormalizer;

impl FieldNormalizer for ReportingPeriodNormalizer {
    fn name(&self) -> &'static str {
        "reporting_period"
    }

    fn apply(&self, mut row: ProjectedRow) -> Result<StageOutcome> {
        let field = LogicalField::ReportingPeriod;
        match year_to_last_day(row.get(field)) {
            Some(date) => {
                row.set(field, Cell::Text(date.format(REPORT_DATE_FORMAT).to_string()));
                Ok(StageOutcome::Keep(row))
            }
            None => Ok(StageOutcome::Drop(DropReason::UndefinedPeriod)),
        }
    }
}

/// Drops the whole row when the issue date text is not shaped `DD/MM/YYYY`
#[derive(Debug, Clone, Copy, Default)]
pub struct IssueDateFilter;

impl FieldNormalizer for IssueDateFilter {
    fn name(&self) -> &'static str {
        "doc_issue_date_filter"
    }

    fn apply(&self, mut row: ProjectedRow) -> Result<StageOutcome> {
        let field = LogicalField::DocIssueDate;
        let text = row.get(field).to_text();
        if !has_report_date_shape(&text) {
            return Ok(StageOutcome::Drop(DropReason::MalformedIssueDate));
        }
        row.set(field, Cell::Text(text));
        Ok(StageOutcome::Keep(row))
    }
}

/// Rewrites the three date columns from `DD/MM/YYYY` to ISO.
///
/// Earlier stages should have excluded anything unparsable, so a failure
/// here leaves the value missing and is logged rather than raised.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateFormatter;

impl FieldNormalizer for DateFormatter {
    fn name(&self) -> &'static str {
        "date_format"
    }

    fn apply(&self, mut row: ProjectedRow) -> Result<StageOutcome> {
        for field in DATE_FIELDS {
            let parsed = row
                .get(field)
                .as_text()
                .and_then(|s| NaiveDate::parse_from_str(s, REPORT_DATE_FORMAT).ok());
            match parsed {
                Some(date) => row.set(field, Cell::Text(date.format(ISO_DATE_FORMAT).to_string())),
                None => {
                    warn!(
                        row = %row.origin,
                        field = field.name(),
                        value = ?row.get(field),
                        "date did not parse after filtering, leaving it missing"
                    );
                    metrics::pipeline::missing_date();
                    row.set(field, Cell::Empty);
                }
            }
        }
        Ok(StageOutcome::Keep(row))
    }
}
