use crate::error::{PipelineError, Result};
use calamine::{open_workbook_auto, Data, Range, Reader};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A spreadsheet cell reduced to the shapes the pipeline distinguishes
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    fn from_data(data: &Data) -> Self {
        match data {
            Data::Empty | Data::Error(_) => Cell::Empty,
            Data::String(s) if s.is_empty() => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Float(f) => Cell::Number(*f),
            Data::Bool(b) => Cell::Text(if *b { "True" } else { "False" }.to_string()),
            Data::DateTime(dt) => Cell::Text(format!("{}", dt)),
            Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Textual rendering; empty cells become an empty string
    pub fn to_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => n.to_string(),
        }
    }
}

/// Where a row came from, for drop diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowOrigin {
    pub file: String,
    /// 0-based row in the worksheet
    pub row: usize,
}

impl fmt::Display for RowOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.row)
    }
}

/// One spreadsheet line after the header, cells aligned to the sheet headers
#[derive(Debug, Clone)]
pub struct RawRow {
    pub origin: RowOrigin,
    pub cells: Vec<Cell>,
}

static EMPTY_CELL: Cell = Cell::Empty;

impl RawRow {
    pub fn cell(&self, index: usize) -> &Cell {
        self.cells.get(index).unwrap_or(&EMPTY_CELL)
    }
}

#[derive(Debug, Clone)]
pub struct SourceSheet {
    pub file: String,
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

/// All sheets read from a directory, in file-name order
#[derive(Debug, Clone, Default)]
pub struct RawRowSet {
    pub sheets: Vec<SourceSheet>,
}

impl RawRowSet {
    pub fn row_count(&self) -> usize {
        self.sheets.iter().map(|s| s.rows.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }
}

/// Reads every report spreadsheet in a directory from a fixed header row
#[derive(Debug, Clone)]
pub struct SourceReader {
    extension: String,
    header_row: usize,
}

impl SourceReader {
    pub fn new(extension: impl Into<String>, header_row: usize) -> Self {
        Self {
            extension: extension.into(),
            header_row,
        }
    }

    /// Spreadsheet files directly under `dir`, sorted by file name
    pub fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(dir).map_err(|e| PipelineError::io(dir, e))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| PipelineError::io(dir, e))?.path();
            let matches = path.is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(self.extension.as_str());
            if matches {
                files.push(path);
            }
        }
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        info!("Found {} .{} files in {}", files.len(), self.extension, dir.display());
        Ok(files)
    }

    /// Read and concatenate every spreadsheet under `dir`.
    ///
    /// An empty directory yields an empty set; deciding whether that is
    /// acceptable is left to the caller.
    pub fn read_dir(&self, dir: &Path) -> Result<RawRowSet> {
        let files = self.list_files(dir)?;
        let mut set = RawRowSet::default();
        for path in &files {
            set.sheets.push(self.read_file(path)?);
        }
        info!("Combined {} files into {} rows", files.len(), set.row_count());
        Ok(set)
    }

    /// Read the first worksheet of one file
    pub fn read_file(&self, path: &Path) -> Result<SourceSheet> {
        info!("Reading {}", path.display());
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let mut workbook = open_workbook_auto(path).map_err(|source| PipelineError::Spreadsheet {
            path: path.to_path_buf(),
            source,
        })?;
        let range = match workbook.worksheet_range_at(0) {
            Some(range) => range.map_err(|source| PipelineError::Spreadsheet {
                path: path.to_path_buf(),
                source,
            })?,
            None => {
                return Err(PipelineError::HeaderRowMissing {
                    file,
                    row: self.header_row,
                })
            }
        };

        self.sheet_from_range(file, &range)
    }

    fn sheet_from_range(&self, file: String, range: &Range<Data>) -> Result<SourceSheet> {
        // Ranges start at the first used cell, header_row is a sheet row
        let first_row = range.start().map(|(r, _)| r as usize).unwrap_or(0);
        let header_offset = match self.header_row.checked_sub(first_row) {
            Some(offset) if offset < range.height() => offset,
            _ => {
                return Err(PipelineError::HeaderRowMissing {
                    file,
                    row: self.header_row,
                })
            }
        };

        let mut rows = range.rows().skip(header_offset);
        let headers: Vec<String> = match rows.next() {
            Some(header) => header
                .iter()
                .enumerate()
                .map(|(i, c)| match Cell::from_data(c) {
                    Cell::Empty => format!("Unnamed: {i}"),
                    cell => cell.to_text(),
                })
                .collect(),
            None => {
                return Err(PipelineError::HeaderRowMissing {
                    file,
                    row: self.header_row,
                })
            }
        };

        let mut data_rows = Vec::new();
        for (i, row) in rows.enumerate() {
            let cells: Vec<Cell> = row.iter().map(Cell::from_data).collect();
            if cells.iter().all(Cell::is_empty) {
                continue;
            }
            data_rows.push(RawRow {
                origin: RowOrigin {
                    file: file.clone(),
                    row: self.header_row + 1 + i,
                },
                cells,
            });
        }
        debug!("{}: {} columns, {} rows", file, headers.len(), data_rows.len());

        Ok(SourceSheet {
            file,
            headers,
            rows: data_rows,
        })
    }
}
