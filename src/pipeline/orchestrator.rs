use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::metrics;
use crate::pipeline::normalize::{standard_normalizers, DropReason, FieldNormalizer, StageOutcome};
use crate::pipeline::projector::{column_profile, ColumnProfile, ColumnProjector, ProjectedRow};
use crate::pipeline::sink;
use crate::pipeline::source::{RawRowSet, RowOrigin, SourceReader};
use crate::types::ShipEmission;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// A row excluded by a filter stage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedRow {
    pub file: String,
    pub row: usize,
    pub reason: DropReason,
}

impl DroppedRow {
    fn new(origin: &RowOrigin, reason: DropReason) -> Self {
        Self {
            file: origin.file.clone(),
            row: origin.row,
            reason,
        }
    }
}

/// In-memory result of normalizing one combined row set
#[derive(Debug, Clone)]
pub struct Normalized {
    pub rows: Vec<ShipEmission>,
    pub dropped: Vec<DroppedRow>,
    pub profile: Vec<ColumnProfile>,
}

impl Normalized {
    pub fn drop_counts(&self) -> BTreeMap<DropReason, usize> {
        let mut counts = BTreeMap::new();
        for d in &self.dropped {
            *counts.entry(d.reason).or_insert(0) += 1;
        }
        counts
    }
}

/// Summary of a full run, from source directory to interchange file
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub files_read: usize,
    pub rows_read: usize,
    pub rows_written: usize,
    pub drop_counts: BTreeMap<DropReason, usize>,
    pub dropped: Vec<DroppedRow>,
    pub missing_dates: usize,
    pub column_profile: Vec<ColumnProfile>,
    pub output_file: PathBuf,
    pub checksum: String,
}

/// Reads, projects and normalizes report spreadsheets, then writes the
/// interchange file. Stages run one after another over the whole row set.
pub struct Pipeline {
    reader: SourceReader,
    projector: ColumnProjector,
    normalizers: Vec<Box<dyn FieldNormalizer>>,
}

impl Pipeline {
    pub fn new(reader: SourceReader) -> Self {
        Self {
            reader,
            projector: ColumnProjector,
            normalizers: standard_normalizers(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(SourceReader::new(config.extension.clone(), config.header_row))
    }

    /// Project and normalize a combined row set.
    ///
    /// Fails on schema and coercion errors; filtered rows are reported in
    /// `dropped` rather than failing the run.
    pub fn normalize(&self, raw: RawRowSet) -> Result<Normalized> {
        let mut rows = self.projector.project(raw)?;
        let profile = column_profile(&rows);
        for p in &profile {
            info!("{:>30}: {:5.1}% missing", p.field, p.missing_percentage);
        }

        let mut dropped = Vec::new();
        for stage in &self.normalizers {
            let before = rows.len();
            rows = Self::run_stage(stage.as_ref(), rows, &mut dropped)?;
            info!(
                stage = stage.name(),
                kept = rows.len(),
                dropped = before - rows.len(),
                "stage finished"
            );
        }

        let rows = rows
            .into_iter()
            .map(ShipEmission::from_projected)
            .collect::<Result<Vec<_>>>()?;
        Ok(Normalized {
            rows,
            dropped,
            profile,
        })
    }

    fn run_stage(
        stage: &dyn FieldNormalizer,
        rows: Vec<ProjectedRow>,
        dropped: &mut Vec<DroppedRow>,
    ) -> Result<Vec<ProjectedRow>> {
        let mut kept = Vec::with_capacity(rows.len());
        for row in rows {
            let origin = row.origin.clone();
            match stage.apply(row)? {
                StageOutcome::Keep(row) => kept.push(row),
                StageOutcome::Drop(reason) => {
                    metrics::pipeline::row_dropped(reason.as_str());
                    dropped.push(DroppedRow::new(&origin, reason));
                }
            }
        }
        Ok(kept)
    }

    /// Full run: read `data_dir`, normalize, write `output`.
    ///
    /// Nothing is written unless every step succeeds.
    #[instrument(skip(self), fields(run_id = tracing::field::Empty))]
    pub fn run(&self, data_dir: &Path, output: &Path) -> Result<PipelineReport> {
        let run_id = Uuid::new_v4();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));
        let started = Instant::now();
        info!("Starting normalization of {}", data_dir.display());

        let raw = self.reader.read_dir(data_dir)?;
        let files_read = raw.sheets.len();
        let rows_read = raw.row_count();
        metrics::pipeline::rows_read(rows_read);
        if rows_read == 0 {
            return Err(PipelineError::NoSourceRows(data_dir.to_path_buf()));
        }

        let normalized = self.normalize(raw)?;
        if normalized.rows.is_empty() {
            warn!("Every row was filtered out; writing a header-only file");
        }

        let checksum = sink::write_interchange(&normalized.rows, output)?;
        metrics::pipeline::rows_written(normalized.rows.len());
        metrics::pipeline::run_duration(started.elapsed().as_secs_f64());

        let drop_counts = normalized.drop_counts();
        for (reason, count) in &drop_counts {
            info!("Dropped {} rows: {}", count, reason);
        }
        info!(
            "Data successfully processed: {} of {} rows written",
            normalized.rows.len(),
            rows_read
        );

        Ok(PipelineReport {
            run_id,
            files_read,
            rows_read,
            rows_written: normalized.rows.len(),
            drop_counts,
            missing_dates: normalized.rows.iter().map(ShipEmission::missing_dates).sum(),
            dropped: normalized.dropped,
            column_profile: normalized.profile,
            output_file: output.to_path_buf(),
            checksum,
        })
    }
}

/// Write dropped rows as `file,row,reason` CSV
pub fn write_drop_log(dropped: &[DroppedRow], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for d in dropped {
        writer.serialize(d)?;
    }
    writer.flush().map_err(|e| PipelineError::io(path, e))?;
    Ok(())
}
