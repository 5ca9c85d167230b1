use crate::constants::LogicalField;
use crate::error::{PipelineError, Result};
use crate::types::ShipEmission;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Write the normalized rows as CSV, replacing whatever is at `path`.
///
/// Rows go to a sibling temp file that is renamed into place, so a failed
/// write never leaves a partial interchange file behind. Returns the
/// SHA-256 of the written file.
pub fn write_interchange(rows: &[ShipEmission], path: &Path) -> Result<String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }
    let tmp = temp_path(path);

    let written = write_rows(rows, &tmp);
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path).map_err(|e| PipelineError::io(path, e))?;

    let checksum = file_checksum(path)?;
    info!("Wrote {} rows to {} (sha256 {})", rows.len(), path.display(), checksum);
    Ok(checksum)
}

fn write_rows(rows: &[ShipEmission], path: &Path) -> Result<()> {
    // Header is written by hand so an empty set still carries it
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_path(path)?;
    writer.write_record(LogicalField::ALL.iter().map(|f| f.name()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().map_err(|e| PipelineError::io(path, e))?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Read an interchange file back into rows, checking its header first
pub fn read_interchange(path: &Path) -> Result<Vec<ShipEmission>> {
    let mut reader = csv::ReaderBuilder::new().from_path(path)?;

    let headers = reader.headers()?.clone();
    let file = path.display().to_string();
    for (i, field) in LogicalField::ALL.iter().enumerate() {
        if headers.get(i) != Some(field.name()) {
            return Err(PipelineError::Schema {
                file,
                label: field.name().to_string(),
            });
        }
    }

    let rows = reader
        .deserialize()
        .collect::<std::result::Result<Vec<ShipEmission>, csv::Error>>()?;
    info!("Read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Hex SHA-256 of a file's contents
pub fn file_checksum(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| PipelineError::io(path, e))?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_rows() -> Vec<ShipEmission> {
        vec![
            ShipEmission {
                name: "AURORA".into(),
                ship_type: "Bulk carrier".into(),
                reporting_period: NaiveDate::from_ymd_opt(2018, 12, 31),
                doc_issue_date: NaiveDate::from_ymd_opt(2019, 6, 30),
                doc_expiry_date: NaiveDate::from_ymd_opt(2019, 12, 31),
                annual_average_co2_emissions: 211.47,
                total_co2_emissions: Some(10431.2),
                technical_efficiency: 0.1 + 0.2,
            },
            ShipEmission {
                name: "BOREAS, II".into(),
                ship_type: "Ro-pax ship".into(),
                reporting_period: NaiveDate::from_ymd_opt(2019, 12, 31),
                doc_issue_date: None,
                doc_expiry_date: None,
                annual_average_co2_emissions: 1e-7,
                total_co2_emissions: None,
                technical_efficiency: 12.34,
            },
        ]
    }

    #[test]
    fn writes_header_and_iso_dates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("output.csv");
        write_interchange(&sample_rows(), &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "name,ship_type,reporting_period,doc_issue_date,doc_expiry_date,\
             annual_average_co2_emissions,total_co2_emissions,technical_efficiency"
        );
        assert!(lines.next().unwrap().starts_with("AURORA,Bulk carrier,2018-12-31,2019-06-30,2019-12-31,"));
        assert!(lines.next().unwrap().starts_with("\"BOREAS, II\",Ro-pax ship,2019-12-31,,,"));
        assert!(!dir.path().join("out").join("output.csv.tmp").exists());
    }

    #[test]
    fn read_back_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.csv");
        let rows = sample_rows();
        write_interchange(&rows, &path).unwrap();

        let read = read_interchange(&path).unwrap();
        assert_eq!(read, rows);
    }

    #[test]
    fn empty_set_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.csv");
        write_interchange(&[], &path).unwrap();
        assert!(read_interchange(&path).unwrap().is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 1);
    }

    #[test]
    fn overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.csv");
        fs::write(&path, "stale content that is much longer than the new file\n".repeat(100)).unwrap();
        let checksum = write_interchange(&sample_rows()[..1], &path).unwrap();
        assert_eq!(read_interchange(&path).unwrap().len(), 1);
        assert_eq!(checksum, file_checksum(&path).unwrap());
    }

    #[test]
    fn foreign_header_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.csv");
        fs::write(&path, "Name,Ship type\nAURORA,Tanker\n").unwrap();
        let err = read_interchange(&path).unwrap_err();
        assert!(matches!(err, PipelineError::Schema { label, .. } if label == "name"));
    }
}
