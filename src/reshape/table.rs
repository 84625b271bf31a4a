//! Wide scan-table loading and normalization.
//!
//! A contour file is delimited text with a **two-row header**: the first row
//! carries top-level group labels (parameter-pair identifiers like
//! `gamma1-gamma2`), the second row carries sub-labels (`X`, `Y`, ...).
//! Spreadsheet exports leave repeated group labels blank after the first
//! column of a group, so blank top-level labels are forward-filled from the
//! nearest preceding non-blank label.
//!
//! Design goals:
//! - **Strict header schema** (clear errors, no partial loads)
//! - **Cell-level tolerance**: a cell that does not parse as a finite number
//!   is treated as missing, and missing cells drop rows later, per pair
//! - **Deterministic behavior** (column order is file order)

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::error::AppError;

/// One physical column of the wide table, after forward-filling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanColumn {
    /// Top-level group label (`p1-p2`). Empty if the file starts with blank
    /// labels before any group.
    pub group: String,
    /// Sub-label within the group (`X`, `Y`, ...).
    pub sub: String,
}

/// A loaded contour file: labeled columns plus numeric-or-missing cells.
#[derive(Debug, Clone)]
pub struct WideScanTable {
    columns: Vec<ScanColumn>,
    rows: Vec<Vec<Option<f64>>>,
}

impl WideScanTable {
    /// Load a contour file from disk.
    pub fn load(path: &Path, delimiter: u8, decimal: char) -> Result<Self, AppError> {
        if !path.exists() {
            return Err(AppError::file_not_found(format!(
                "Contour file '{}' does not exist.",
                path.display()
            )));
        }
        let file = File::open(path).map_err(|e| {
            AppError::io(format!(
                "Failed to open contour file '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_reader(file, delimiter, decimal)
    }

    /// Parse a contour file from any reader.
    pub fn from_reader(rdr: impl Read, delimiter: u8, decimal: char) -> Result<Self, AppError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(rdr);

        let mut records = reader.records();

        let top = next_header_record(&mut records, "top-level")?;
        let sub = next_header_record(&mut records, "sub-label")?;

        let columns = build_columns(&top, &sub);
        if columns.is_empty() {
            return Err(AppError::schema(
                "Contour file has no columns in its header rows.",
            ));
        }

        let mut rows = Vec::new();
        for result in records {
            let record =
                result.map_err(|e| AppError::io(format!("Failed to read contour row: {e}")))?;
            let mut row: Vec<Option<f64>> = record
                .iter()
                .map(|cell| parse_cell(cell, decimal))
                .collect();
            // Short rows behave as if the trailing cells were empty; extra
            // unlabeled cells are dropped.
            row.resize(columns.len(), None);
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[ScanColumn] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Option<f64>>] {
        &self.rows
    }

    /// Top-level group labels, deduplicated, in column order.
    pub fn group_labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = Vec::new();
        for col in &self.columns {
            if !col.group.is_empty() && labels.last() != Some(&col.group.as_str()) {
                labels.push(&col.group);
            }
        }
        labels
    }

    pub fn has_group(&self, label: &str) -> bool {
        self.columns.iter().any(|c| c.group == label)
    }

    /// Index of the first column with the given group and sub-label.
    pub fn column_index(&self, group: &str, sub: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.group == group && c.sub == sub)
    }
}

fn next_header_record(
    records: &mut csv::StringRecordsIter<'_, impl Read>,
    which: &str,
) -> Result<StringRecord, AppError> {
    match records.next() {
        Some(Ok(record)) => Ok(record),
        Some(Err(e)) => Err(AppError::io(format!(
            "Failed to read {which} header row: {e}"
        ))),
        None => Err(AppError::schema(format!(
            "Contour file is missing its {which} header row (two header rows required)."
        ))),
    }
}

/// Pair the two header rows into columns, forward-filling blank top labels.
///
/// The forward fill is a linear scan carrying the last non-blank label, so it
/// only depends on column order (not on any tabular-library convention).
fn build_columns(top: &StringRecord, sub: &StringRecord) -> Vec<ScanColumn> {
    let width = top.len().max(sub.len());
    let mut columns = Vec::with_capacity(width);
    let mut current = String::new();

    for idx in 0..width {
        let label = clean_label(top.get(idx).unwrap_or(""));
        if !label.is_empty() {
            current = label.to_string();
        }
        columns.push(ScanColumn {
            group: current.clone(),
            sub: clean_label(sub.get(idx).unwrap_or("")).to_string(),
        });
    }

    columns
}

fn clean_label(label: &str) -> &str {
    // Excel and other tools sometimes emit UTF-8 CSVs with a BOM prefix on
    // the first header cell. If we don't strip it, the first group label
    // never matches any parameter pair.
    label.trim().trim_start_matches('\u{feff}')
}

/// Parse one data cell. Anything that is not a finite number is missing.
fn parse_cell(cell: &str, decimal: char) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
        return None;
    }
    let normalized: std::borrow::Cow<'_, str> = if decimal == '.' {
        cell.into()
    } else {
        cell.replace(decimal, ".").into()
    };
    let v = normalized.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}
