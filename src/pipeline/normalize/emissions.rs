use super::{DropReason, FieldNormalizer, StageOutcome};
use crate::constants::{LogicalField, DIVISION_BY_ZERO_SENTINEL};
use crate::error::{PipelineError, Result};
use crate::pipeline::projector::ProjectedRow;
use crate::pipeline::source::Cell;

/// Drops rows carrying the division-by-zero sentinel, then coerces the
/// annual average emissions to a float.
///
/// Once the sentinel is gone every value must coerce; anything else is a
/// hard error rather than a dropped row.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnnualEmissionsNormalizer;

impl FieldNormalizer for AnnualEmissionsNormalizer {
    fn name(&self) -> &'static str {
        "annual_average_co2_emissions"
    }

    fn apply(&self, mut row: ProjectedRow) -> Result<StageOutcome> {
        let field = LogicalField::AnnualAverageCo2Emissions;
        let value = match row.get(field) {
            Cell::Text(s) if s == DIVISION_BY_ZERO_SENTINEL => {
                return Ok(StageOutcome::Drop(DropReason::DivisionByZero))
            }
            Cell::Number(n) => *n,
            Cell::Text(s) => s.trim().parse::<f64>().map_err(|_| PipelineError::Coercion {
                field: field.name(),
                value: s.clone(),
                row: row.origin.to_string(),
            })?,
            Cell::Empty => {
                return Err(PipelineError::Coercion {
                    field: field.name(),
                    value: String::new(),
                    row: row.origin.to_string(),
                })
            }
        };
        // `parse` accepts NaN and infinities
        if !value.is_finite() {
            return Err(PipelineError::Coercion {
                field: field.name(),
                value: row.get(field).to_text(),
                row: row.origin.to_string(),
            });
        }
        row.set(field, Cell::Number(value));
        Ok(StageOutcome::Keep(row))
    }
}
