//! Spreadsheet input.
//!
//! Reads the first worksheet of a workbook and turns every data row into a
//! [`Record`] keyed by the header row. The format (xlsx, xlsm, xlsb, xls, ods)
//! is detected from the payload, not the file extension.
//!
//! Cell values are not typed. Strings pass through, whole-number floats are
//! printed without a trailing `.0` (so a numeric `2024` column reads as
//! `"2024"`), date cells read as ISO 8601 (`2024-01-01`, or
//! `2024-01-01T09:30:00` when a time is set), and everything else uses
//! calamine's display form. Empty cells are left out of the record and fully
//! blank rows are dropped.
//!
//! [`Row::from_record`] is the only validation: `school`, `major` and `image`
//! must be present and non-empty.

use calamine::{Data, ExcelDateTime, Reader, open_workbook_auto_from_rs};
use chrono::Timelike;
use std::collections::BTreeMap;
use std::io::Cursor;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("not a readable spreadsheet: {0}")]
    Parse(#[from] calamine::Error),
    #[error("workbook has no worksheets")]
    NoSheets,
}

/// One spreadsheet row, keyed by header name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    /// 1-based position among the data rows (header excluded, blank rows skipped).
    pub index: usize,
    fields: BTreeMap<String, String>,
}

impl Record {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.fields.insert(key.to_string(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A record that passed the presence check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub index: usize,
    pub school: String,
    pub major: String,
    /// File name of the photo, matched exactly against the asset index.
    pub image: String,
}

/// The required column that was missing or empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingField(pub &'static str);

impl Row {
    pub fn from_record(record: &Record) -> Result<Self, MissingField> {
        let field = |name: &'static str| {
            record
                .get(name)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or(MissingField(name))
        };
        Ok(Self {
            index: record.index,
            school: field("school")?,
            major: field("major")?,
            image: field("image")?,
        })
    }
}

/// Parse a spreadsheet payload into records from its first worksheet.
pub fn read_table(bytes: &[u8]) -> Result<Vec<Record>, TableError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let range = workbook.worksheet_range_at(0).ok_or(TableError::NoSheets)??;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(Vec::new());
    };
    let headers: Vec<Option<String>> = header_row.iter().map(cell_text).collect();

    let mut records = Vec::new();
    for cells in rows {
        let mut record = Record::new(records.len() + 1);
        for (header, cell) in headers.iter().zip(cells) {
            let (Some(header), Some(value)) = (header, cell_text(cell)) else {
                continue;
            };
            // First column wins when a header is repeated.
            record.fields.entry(header.clone()).or_insert(value);
        }
        if !record.is_empty() {
            records.push(record);
        }
    }

    tracing::debug!(rows = records.len(), "read spreadsheet");
    Ok(records)
}

/// Text of a cell, or `None` for an empty cell.
fn cell_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::Empty => return None,
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => excel_date_text(dt),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

/// ISO form of an Excel serial date. Durations keep the serial value.
fn excel_date_text(dt: &ExcelDateTime) -> String {
    match dt.as_datetime() {
        Some(at) if dt.is_datetime() && at.time().num_seconds_from_midnight() == 0 => {
            at.date().to_string()
        }
        Some(at) if dt.is_datetime() => at.format("%Y-%m-%dT%H:%M:%S").to_string(),
        _ => dt.to_string(),
    }
}
