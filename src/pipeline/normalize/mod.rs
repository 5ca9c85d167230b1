//! Field normalizers: one transform or filter per logical column.
//!
//! Each stage takes ownership of a row and either hands it back (possibly
//! rewritten) or drops it with a reason. Errors are reserved for values that
//! should have been excluded by an earlier stage.

pub mod dates;
pub mod efficiency;
pub mod emissions;

use crate::error::Result;
use crate::pipeline::projector::ProjectedRow;
use serde::Serialize;
use std::fmt;

pub use dates::{DateFormatter, IssueDateFilter, ReportingPeriodNormalizer};
pub use efficiency::TechnicalEfficiencyNormalizer;
pub use emissions::AnnualEmissionsNormalizer;

/// Why a row was excluded from the normalized set
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// No decimal number in the technical efficiency text
    EfficiencyNotFound,
    /// Technical efficiency of exactly zero, meaning "not computable"
    ZeroEfficiency,
    /// Annual average emissions reported as a division by zero
    DivisionByZero,
    /// Reporting period is not a year
    UndefinedPeriod,
    /// Issue date is not shaped DD/MM/YYYY
    MalformedIssueDate,
}

impl DropReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DropReason::EfficiencyNotFound => "efficiency_not_found",
            DropReason::ZeroEfficiency => "zero_efficiency",
            DropReason::DivisionByZero => "division_by_zero",
            DropReason::UndefinedPeriod => "undefined_period",
            DropReason::MalformedIssueDate => "malformed_issue_date",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub enum StageOutcome {
    Keep(ProjectedRow),
    Drop(DropReason),
}

/// A single pipeline stage over projected rows
pub trait FieldNormalizer: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, row: ProjectedRow) -> Result<StageOutcome>;
}

/// The stages in the only order they may run.
///
/// Efficiency and emissions filtering come before anything reads those
/// numbers, and the issue date filter narrows the rows the final date
/// formatting sees.
pub fn standard_normalizers() -> Vec<Box<dyn FieldNormalizer>> {
    vec![
        Box::new(TechnicalEfficiencyNormalizer),
        Box::new(AnnualEmissionsNormalizer),
        Box::new(ReportingPeriodNormalizer),
        Box::new(IssueDateFilter),
        Box::new(DateFormatter),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_run_in_fixed_order() {
        let names: Vec<&str> = standard_normalizers().iter().map(|n| n.name()).collect();
        assert_eq!(
            names,
            vec![
                "technical_efficiency",
                "annual_average_co2_emissions",
                "reporting_period",
                "doc_issue_date_filter",
                "date_format",
            ]
        );
    }

    #[test]
    fn drop_reasons_render_snake_case() {
        assert_eq!(DropReason::DivisionByZero.to_string(), "division_by_zero");
        assert_eq!(DropReason::MalformedIssueDate.as_str(), "malformed_issue_date");
    }
}
