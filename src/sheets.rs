//! Year-labelled tabular sources for the measurement loader.
//!
//! A source hands out one [`Table`] per sheet name. Workbooks are read with
//! calamine; a directory of `<sheet>.csv` files is accepted as well.

use crate::error::DataLoadError;
use crate::types::{Cell, Table};
use calamine::{open_workbook_auto, Data, Reader, Sheets};
use csv::ReaderBuilder;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::debug;

pub trait SheetSource {
    /// Returns `Ok(None)` when the source has no sheet with this exact name.
    fn read_sheet(&mut self, name: &str) -> Result<Option<Table>, DataLoadError>;
}

pub fn open_source(path: &Path) -> Result<Box<dyn SheetSource>, DataLoadError> {
    if path.is_dir() {
        return Ok(Box::new(CsvDirectorySource::new(path)));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .ok_or_else(|| DataLoadError::UnsupportedFormat(path.to_path_buf()))?;

    match extension.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(Box::new(WorkbookSource::open(path)?)),
        _ => Err(DataLoadError::UnsupportedFormat(path.to_path_buf())),
    }
}

pub struct WorkbookSource {
    workbook: Sheets<BufReader<File>>,
}

impl WorkbookSource {
    pub fn open(path: &Path) -> Result<Self, DataLoadError> {
        let workbook = open_workbook_auto(path)
            .map_err(|e| DataLoadError::Workbook(format!("{:?}: {}", path, e)))?;
        Ok(Self { workbook })
    }
}

impl SheetSource for WorkbookSource {
    fn read_sheet(&mut self, name: &str) -> Result<Option<Table>, DataLoadError> {
        if !self.workbook.sheet_names().iter().any(|s| s == name) {
            return Ok(None);
        }
        let range = self
            .workbook
            .worksheet_range(name)
            .map_err(|e| DataLoadError::Workbook(format!("sheet '{}': {}", name, e)))?;

        let mut rows = range.rows();
        let headers = match rows.next() {
            Some(header_row) => header_row.iter().map(|c| c.to_string()).collect(),
            None => Vec::new(),
        };
        let rows: Vec<Vec<Cell>> = rows.map(|row| row.iter().map(to_cell).collect()).collect();
        debug!("Read {} rows from sheet '{}'", rows.len(), name);

        Ok(Some(Table { headers, rows }))
    }
}

fn to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::String(s) => Cell::Text(s.clone()),
        other => Cell::Text(other.to_string()),
    }
}

/// A directory holding one `<sheet>.csv` per sheet.
pub struct CsvDirectorySource {
    dir: PathBuf,
}

impl CsvDirectorySource {
    pub fn new(dir: &Path) -> Self {
        Self { dir: dir.to_path_buf() }
    }
}

impl SheetSource for CsvDirectorySource {
    fn read_sheet(&mut self, name: &str) -> Result<Option<Table>, DataLoadError> {
        let path = self.dir.join(format!("{}.csv", name));
        if !path.is_file() {
            return Ok(None);
        }
        let file = File::open(&path).map_err(|source| DataLoadError::Io { path: path.clone(), source })?;
        let mut rdr = ReaderBuilder::new().flexible(true).from_reader(file);
        let headers = rdr.headers()?.iter().map(|h| h.to_string()).collect();

        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result?;
            rows.push(
                record
                    .iter()
                    .map(|field| {
                        if field.trim().is_empty() {
                            Cell::Empty
                        } else {
                            Cell::Text(field.to_string())
                        }
                    })
                    .collect(),
            );
        }
        debug!("Read {} rows from {:?}", rows.len(), path);

        Ok(Some(Table { headers, rows }))
    }
}
