use crate::constants::LogicalField;
use crate::error::{PipelineError, Result};
use crate::pipeline::source::{Cell, RawRowSet, RowOrigin};
use serde::Serialize;
use tracing::info;

/// A source row narrowed to the logical fields, in logical order
#[derive(Debug, Clone)]
pub struct ProjectedRow {
    pub origin: RowOrigin,
    cells: [Cell; 8],
}

impl ProjectedRow {
    pub fn new(origin: RowOrigin, cells: [Cell; 8]) -> Self {
        Self { origin, cells }
    }

    pub fn get(&self, field: LogicalField) -> &Cell {
        &self.cells[field as usize]
    }

    pub fn set(&mut self, field: LogicalField, value: Cell) {
        self.cells[field as usize] = value;
    }

    pub fn take(&mut self, field: LogicalField) -> Cell {
        std::mem::replace(&mut self.cells[field as usize], Cell::Empty)
    }
}

/// Keeps the fixed logical column set, rejecting sheets that lack any of it
#[derive(Debug, Clone, Copy, Default)]
pub struct ColumnProjector;

impl ColumnProjector {
    pub fn project(&self, set: RawRowSet) -> Result<Vec<ProjectedRow>> {
        let mut projected = Vec::with_capacity(set.row_count());

        for sheet in set.sheets {
            let mut indices = [0usize; 8];
            for field in LogicalField::ALL {
                let label = field.source_label();
                indices[field as usize] = sheet
                    .headers
                    .iter()
                    .position(|h| h == label)
                    .ok_or_else(|| PipelineError::Schema {
                        file: sheet.file.clone(),
                        label: label.to_string(),
                    })?;
            }

            for row in sheet.rows {
                let cells = indices.map(|i| row.cell(i).clone());
                projected.push(ProjectedRow::new(row.origin, cells));
            }
        }

        info!("Projected {} rows onto {} columns", projected.len(), LogicalField::ALL.len());
        Ok(projected)
    }
}

/// Share of empty cells in one logical column
#[derive(Debug, Clone, Serialize)]
pub struct ColumnProfile {
    pub field: &'static str,
    pub missing_percentage: f64,
}

pub fn column_profile(rows: &[ProjectedRow]) -> Vec<ColumnProfile> {
    LogicalField::ALL
        .iter()
        .map(|&field| {
            let missing = rows.iter().filter(|r| r.get(field).is_empty()).count();
            let missing_percentage = if rows.is_empty() {
                0.0
            } else {
                missing as f64 / rows.len() as f64 * 100.0
            };
            ColumnProfile {
                field: field.name(),
                missing_percentage,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::source::{RawRow, SourceSheet};

    fn full_headers() -> Vec<String> {
        let mut headers: Vec<String> = vec!["IMO Number".to_string()];
        // reversed to prove projection reorders columns
        headers.extend(LogicalField::ALL.iter().rev().map(|f| f.source_label().to_string()));
        headers
    }

    fn sheet(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> SourceSheet {
        SourceSheet {
            file: "2019.xlsx".into(),
            headers,
            rows: rows
                .into_iter()
                .enumerate()
                .map(|(i, cells)| RawRow {
                    origin: RowOrigin { file: "2019.xlsx".into(), row: 3 + i },
                    cells,
                })
                .collect(),
        }
    }

    #[test]
    fn projects_into_logical_order() {
        let mut cells = vec![Cell::Number(9_000_001.0)];
        cells.extend(LogicalField::ALL.iter().rev().map(|f| Cell::Text(f.name().to_string())));
        let set = RawRowSet { sheets: vec![sheet(full_headers(), vec![cells])] };

        let rows = ColumnProjector.project(set).unwrap();
        assert_eq!(rows.len(), 1);
        for field in LogicalField::ALL {
            assert_eq!(rows[0].get(field), &Cell::Text(field.name().to_string()));
        }
    }

    #[test]
    fn missing_label_is_a_schema_error() {
        let headers: Vec<String> = full_headers()
            .into_iter()
            .filter(|h| h != "Technical efficiency")
            .collect();
        let set = RawRowSet { sheets: vec![sheet(headers, vec![])] };

        match ColumnProjector.project(set) {
            Err(PipelineError::Schema { file, label }) => {
                assert_eq!(file, "2019.xlsx");
                assert_eq!(label, "Technical efficiency");
            }
            other => panic!("expected schema error, got {:?}", other.map(|r| r.len())),
        }
    }

    #[test]
    fn short_rows_project_as_empty() {
        let set = RawRowSet {
            sheets: vec![sheet(full_headers(), vec![vec![Cell::Number(1.0)]])],
        };
        let rows = ColumnProjector.project(set).unwrap();
        assert!(rows[0].get(LogicalField::Name).is_empty());
    }

    #[test]
    fn profile_reports_missing_share() {
        let origin = RowOrigin { file: "a.xlsx".into(), row: 3 };
        let mut filled = ProjectedRow::new(origin.clone(), Default::default());
        filled.set(LogicalField::Name, Cell::Text("AURORA".into()));
        let empty = ProjectedRow::new(origin, Default::default());

        let profile = column_profile(&[filled, empty]);
        assert_eq!(profile[0].field, "name");
        assert_eq!(profile[0].missing_percentage, 50.0);
        assert_eq!(profile[1].missing_percentage, 100.0);
    }
}
