use super::{DropReason, FieldNormalizer, StageOutcome};
use crate::constants::LogicalField;
use crate::error::Result;
use crate::pipeline::projector::ProjectedRow;
use crate::pipeline::source::Cell;
use once_cell::sync::Lazy;
use regex::Regex;

static DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9]+\.[0-9]+)").expect("valid regex"));

/// First `digits.digits` number embedded in free text.
///
/// Expected grammar of the technical efficiency column is
/// `<index> (<decimal> <unit>)`, e.g. `EEDI (12.34 gCO₂/t·nm)`. Signs,
/// exponents and integers without a fractional part are not recognised, so
/// a format change surfaces here as rows without a value.
pub fn extract_decimal(text: &str) -> Option<f64> {
    DECIMAL
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Replaces the technical efficiency text with its number; rows without a
/// usable positive value are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct TechnicalEfficiencyNormalizer;

impl FieldNormalizer for TechnicalEfficiencyNormalizer {
    fn name(&self) -> &'static str {
        "technical_efficiency"
    }

    fn apply(&self, mut row: ProjectedRow) -> Result<StageOutcome> {
        let field = LogicalField::TechnicalEfficiency;
        let value = row.get(field).as_text().and_then(extract_decimal);
        match value {
            None => Ok(StageOutcome::Drop(DropReason::EfficiencyNotFound)),
            Some(v) if v == 0.0 => Ok(StageOutcome::Drop(DropReason::ZeroEfficiency)),
            Some(v) => {
                row.set(field, Cell::Number(v));
                Ok(StageOutcome::Keep(row))
            }
        }
    }
}
