//! The contour reshaper: 2D pairwise scans → one long-format table.
//!
//! A contour file stores one 2D likelihood scan per parameter pair, side by
//! side under `p1-p2` group labels. Downstream tools want a single table with
//! one column per model parameter: for each scan, the two scanned parameters
//! come from the grid and every other parameter is pinned at its best-fit
//! value, with a `scan` tag recording which pair the row came from.
//!
//! The whole operation is one synchronous pass: load → validate → transform →
//! write. Any structural defect aborts before the output file is created, so
//! a failed run never leaves a partial table behind.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::spectrum::ScanSource;

pub mod table;

pub use table::{ScanColumn, WideScanTable};

/// Resolved inputs for one conversion run.
#[derive(Debug, Clone)]
pub struct ReshapeOptions {
    pub contour_file: PathBuf,
    pub outfile_path: PathBuf,
    /// Cell delimiter for both input and output.
    pub delimiter: char,
    /// Decimal character of the input (output always uses `.`).
    pub decimal: char,
}

/// One output row: parameter values in canonical order plus the scan tag.
#[derive(Debug, Clone, PartialEq)]
pub struct LongRow {
    pub values: Vec<f64>,
    pub scan: String,
}

/// The long-format output table.
#[derive(Debug, Clone)]
pub struct LongTable {
    /// Column names, excluding the trailing `scan` column.
    pub parameters: Vec<String>,
    pub rows: Vec<LongRow>,
}

/// Result of a conversion, for logging and for tests.
#[derive(Debug, Clone)]
pub struct ReshapeReport {
    pub table: LongTable,
    /// Chosen group label per parameter pair, in enumeration order.
    pub scans: Vec<String>,
    /// Labels that were present in both `p1-p2` and `p2-p1` form (resolved
    /// to `p1-p2`, reported as warnings).
    pub ambiguous: Vec<String>,
}

/// Run the full conversion: load the contour file, build the long table, and
/// write it to `opts.outfile_path`.
pub fn process_2d_scan_contour(
    opts: &ReshapeOptions,
    source: &dyn ScanSource,
) -> Result<ReshapeReport, AppError> {
    let contour_path = expand_user(&opts.contour_file);
    let outfile_path = expand_user(&opts.outfile_path);
    let delimiter = delimiter_byte(opts.delimiter)?;

    info!("Reading contour data from {}", contour_path.display());
    let wide = WideScanTable::load(&contour_path, delimiter, opts.decimal)?;
    debug!("Columns in contour file: {:?}", wide.columns());

    let report = build_long_table(&wide, source)?;
    info!(
        "Processed table shape: ({}, {}), columns: {:?} + scan",
        report.table.rows.len(),
        report.table.parameters.len() + 1,
        report.table.parameters
    );

    info!("Saving processed contour data to {}", outfile_path.display());
    write_long_table(&outfile_path, &report.table, delimiter)?;
    info!("Done.");

    Ok(report)
}

/// Build the long-format table from a loaded wide table.
///
/// Pairs are enumerated as combinations over the source's parameter order,
/// two at a time without repetition. The whole pair set is validated before
/// any slice is built, so a missing pair aborts with nothing produced.
pub fn build_long_table(
    wide: &WideScanTable,
    source: &dyn ScanSource,
) -> Result<ReshapeReport, AppError> {
    let params = source.parameter_names();
    if params.len() < 2 {
        return Err(AppError::schema(format!(
            "Spectrum has {} parameter(s); at least 2 are required for pairwise scans.",
            params.len()
        )));
    }
    let best_fit = source.best_fit();

    let pairs: Vec<(&String, &String)> = combinations(params);

    // Validate every pair up front: a pair with neither column variant is a
    // hard stop before any slice is built.
    for (p1, p2) in &pairs {
        let fwd = format!("{p1}-{p2}");
        let rev = format!("{p2}-{p1}");
        if !wide.has_group(&fwd) && !wide.has_group(&rev) {
            return Err(AppError::schema(format!(
                "None of required columns '{fwd}'/'{rev}' found in the contour file."
            )));
        }
    }

    let mut rows = Vec::new();
    let mut scans = Vec::with_capacity(pairs.len());
    let mut ambiguous = Vec::new();

    for (p1, p2) in &pairs {
        let fwd = format!("{p1}-{p2}");
        let rev = format!("{p2}-{p1}");

        let has_fwd = wide.has_group(&fwd);
        let has_rev = wide.has_group(&rev);
        if has_fwd && has_rev {
            warn!("Both columns '{fwd}' and '{rev}' found. Using '{fwd}'.");
            ambiguous.push(fwd.clone());
        }

        // First-found wins: the forward label takes precedence.
        let (scan_key, x_param, y_param) = if has_fwd {
            (fwd, p1.as_str(), p2.as_str())
        } else {
            (rev, p2.as_str(), p1.as_str())
        };

        let x_idx = wide.column_index(&scan_key, "X").ok_or_else(|| {
            AppError::schema(format!("Scan group '{scan_key}' has no 'X' sub-column."))
        })?;
        let y_idx = wide.column_index(&scan_key, "Y").ok_or_else(|| {
            AppError::schema(format!("Scan group '{scan_key}' has no 'Y' sub-column."))
        })?;

        for row in wide.rows() {
            // Grid points with a missing coordinate carry no information for
            // this pair.
            let (Some(x), Some(y)) = (row[x_idx], row[y_idx]) else {
                continue;
            };

            let mut values = Vec::with_capacity(params.len());
            for p in params {
                let v = if p == x_param {
                    x
                } else if p == y_param {
                    y
                } else {
                    *best_fit.get(p).ok_or_else(|| {
                        AppError::lookup(format!("No best-fit value for parameter '{p}'."))
                    })?
                };
                values.push(v);
            }

            rows.push(LongRow {
                values,
                scan: scan_key.clone(),
            });
        }

        scans.push(scan_key);
    }

    Ok(ReshapeReport {
        table: LongTable {
            parameters: params.to_vec(),
            rows,
        },
        scans,
        ambiguous,
    })
}

/// Write a long table as delimited text: single header row, no row index.
pub fn write_long_table(path: &Path, table: &LongTable, delimiter: u8) -> Result<(), AppError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|e| {
            AppError::io(format!(
                "Failed to create output file '{}': {e}",
                path.display()
            ))
        })?;

    let mut header: Vec<&str> = table.parameters.iter().map(String::as_str).collect();
    header.push("scan");
    writer
        .write_record(&header)
        .map_err(|e| AppError::io(format!("Failed to write output header: {e}")))?;

    for row in &table.rows {
        let mut record: Vec<String> = row.values.iter().map(f64::to_string).collect();
        record.push(row.scan.clone());
        writer
            .write_record(&record)
            .map_err(|e| AppError::io(format!("Failed to write output row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::io(format!("Failed to flush output file: {e}")))
}

/// Unordered pairs in parameter order (`[A,B,C]` → `A-B`, `A-C`, `B-C`).
fn combinations(params: &[String]) -> Vec<(&String, &String)> {
    let mut pairs = Vec::with_capacity(params.len() * (params.len().saturating_sub(1)) / 2);
    for (i, p1) in params.iter().enumerate() {
        for p2 in &params[i + 1..] {
            pairs.push((p1, p2));
        }
    }
    pairs
}

/// Expand a leading `~` to the user's home directory.
///
/// Paths like `~/scans/contour.csv` are common in analysis notes; without
/// expansion they would be created literally relative to the working
/// directory.
pub fn expand_user(path: &Path) -> PathBuf {
    let Some(s) = path.to_str() else {
        return path.to_path_buf();
    };
    let Some(home) = std::env::var_os("HOME") else {
        return path.to_path_buf();
    };
    if s == "~" {
        return PathBuf::from(home);
    }
    if let Some(rest) = s.strip_prefix("~/") {
        return PathBuf::from(home).join(rest);
    }
    path.to_path_buf()
}

/// The `csv` crate wants a single-byte delimiter.
pub fn delimiter_byte(delimiter: char) -> Result<u8, AppError> {
    u8::try_from(delimiter).map_err(|_| {
        AppError::schema(format!(
            "Delimiter '{delimiter}' is not a single-byte character."
        ))
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs;

    use super::*;
    use crate::error::ErrorKind;

    struct FakeSource {
        names: Vec<String>,
        best: BTreeMap<String, f64>,
    }

    impl FakeSource {
        fn abc() -> Self {
            Self {
                names: vec!["A".to_string(), "B".to_string(), "C".to_string()],
                best: BTreeMap::from([
                    ("A".to_string(), 1.0),
                    ("B".to_string(), 2.0),
                    ("C".to_string(), 3.0),
                ]),
            }
        }
    }

    impl ScanSource for FakeSource {
        fn parameter_names(&self) -> &[String] {
            &self.names
        }

        fn best_fit(&self) -> &BTreeMap<String, f64> {
            &self.best
        }
    }

    fn wide(text: &str) -> WideScanTable {
        WideScanTable::from_reader(text.as_bytes(), b',', '.').unwrap()
    }

    #[test]
    fn fills_best_fit_and_tags_scan() {
        let table = wide(concat!(
            "A-B,,A-C,,C-B,\n",
            "X,Y,X,Y,X,Y\n",
            "0.1,0.2,0.7,0.8,0.5,0.6\n",
        ));
        let report = build_long_table(&table, &FakeSource::abc()).unwrap();

        assert_eq!(report.table.parameters, ["A", "B", "C"]);
        assert_eq!(report.scans, ["A-B", "A-C", "C-B"]);
        assert!(report.ambiguous.is_empty());

        let rows = &report.table.rows;
        assert_eq!(rows.len(), 3);
        // A-B: C pinned at best fit.
        assert_eq!(rows[0].values, [0.1, 0.2, 3.0]);
        assert_eq!(rows[0].scan, "A-B");
        // A-C: B pinned at best fit.
        assert_eq!(rows[1].values, [0.7, 2.0, 0.8]);
        assert_eq!(rows[1].scan, "A-C");
        // C-B (reversed): X is C, Y is B, A pinned at best fit.
        assert_eq!(rows[2].values, [1.0, 0.6, 0.5]);
        assert_eq!(rows[2].scan, "C-B");
    }

    #[test]
    fn rows_with_missing_coordinates_are_dropped() {
        let table = wide(concat!(
            "A-B,,A-C,,B-C,\n",
            "X,Y,X,Y,X,Y\n",
            "0.1,0.2,0.7,0.8,0.5,0.6\n",
            "0.3,NaN,0.9,1.0,,\n",
        ));
        let report = build_long_table(&table, &FakeSource::abc()).unwrap();

        // Output row count per pair = non-missing grid rows in that pair.
        let count = |scan: &str| {
            report
                .table
                .rows
                .iter()
                .filter(|r| r.scan == scan)
                .count()
        };
        assert_eq!(count("A-B"), 1);
        assert_eq!(count("A-C"), 2);
        assert_eq!(count("B-C"), 1);

        // Every output row is fully populated.
        for row in &report.table.rows {
            assert_eq!(row.values.len(), 3);
            assert!(row.values.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn prefers_forward_label_and_reports_ambiguity() {
        let table = wide(concat!(
            "A-B,,B-A,,A-C,,B-C,\n",
            "X,Y,X,Y,X,Y,X,Y\n",
            "0.1,0.2,9.0,9.0,0.3,0.4,0.5,0.6\n",
        ));
        let report = build_long_table(&table, &FakeSource::abc()).unwrap();

        assert_eq!(report.ambiguous, ["A-B"]);
        let ab: Vec<_> = report
            .table
            .rows
            .iter()
            .filter(|r| r.scan == "A-B")
            .collect();
        assert_eq!(ab.len(), 1);
        assert_eq!(ab[0].values, [0.1, 0.2, 3.0]);
        assert!(report.table.rows.iter().all(|r| r.scan != "B-A"));
    }

    #[test]
    fn missing_pair_aborts_before_any_slice() {
        // A-B present, C-B present (reversed), but A-C missing in both forms.
        let table = wide(concat!(
            "A-B,,C-B,\n",
            "X,Y,X,Y\n",
            "0.1,0.2,0.5,0.6\n",
        ));
        let err = build_long_table(&table, &FakeSource::abc()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert!(err.to_string().contains("A-C"), "{err}");
    }

    #[test]
    fn fewer_than_two_parameters_is_a_schema_error() {
        let source = FakeSource {
            names: vec!["A".to_string()],
            best: BTreeMap::from([("A".to_string(), 1.0)]),
        };
        let table = wide("A-B,\nX,Y\n0.1,0.2\n");
        let err = build_long_table(&table, &source).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn group_without_xy_subcolumns_is_a_schema_error() {
        let source = FakeSource {
            names: vec!["A".to_string(), "B".to_string()],
            best: BTreeMap::from([("A".to_string(), 1.0), ("B".to_string(), 2.0)]),
        };
        let table = wide("A-B,\nX,Z\n0.1,0.2\n");
        let err = build_long_table(&table, &source).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert!(err.to_string().contains("'Y'"), "{err}");
    }

    #[test]
    fn process_writes_csv_without_row_index() {
        let dir = tempfile::tempdir().unwrap();
        let contour = dir.path().join("scan.csv");
        fs::write(
            &contour,
            "A-B,,A-C,,B-C,\nX,Y,X,Y,X,Y\n0.1,0.2,0.7,0.8,0.5,0.6\n",
        )
        .unwrap();
        let outfile = dir.path().join("long.csv");

        let opts = ReshapeOptions {
            contour_file: contour,
            outfile_path: outfile.clone(),
            delimiter: ',',
            decimal: '.',
        };
        let report = process_2d_scan_contour(&opts, &FakeSource::abc()).unwrap();
        assert_eq!(report.table.rows.len(), 3);

        let written = fs::read_to_string(&outfile).unwrap();
        let mut lines = written.lines();
        assert_eq!(lines.next(), Some("A,B,C,scan"));
        assert_eq!(lines.next(), Some("0.1,0.2,3,A-B"));
        assert_eq!(lines.next(), Some("0.7,2,0.8,A-C"));
        assert_eq!(lines.next(), Some("1,0.5,0.6,B-C"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn failed_validation_writes_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let contour = dir.path().join("scan.csv");
        fs::write(&contour, "A-B,,C-B,\nX,Y,X,Y\n0.1,0.2,0.5,0.6\n").unwrap();
        let outfile = dir.path().join("long.csv");

        let opts = ReshapeOptions {
            contour_file: contour,
            outfile_path: outfile.clone(),
            delimiter: ',',
            decimal: '.',
        };
        let err = process_2d_scan_contour(&opts, &FakeSource::abc()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert!(!outfile.exists());
    }

    #[test]
    fn missing_contour_file_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let opts = ReshapeOptions {
            contour_file: dir.path().join("absent.csv"),
            outfile_path: dir.path().join("long.csv"),
            delimiter: ',',
            decimal: '.',
        };
        let err = process_2d_scan_contour(&opts, &FakeSource::abc()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
    }

    #[test]
    fn semicolon_delimiter_with_comma_decimal_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let contour = dir.path().join("scan.csv");
        fs::write(&contour, "A-B;\nX;Y\n0,1;0,2\n").unwrap();
        let outfile = dir.path().join("long.csv");

        let source = FakeSource {
            names: vec!["A".to_string(), "B".to_string()],
            best: BTreeMap::from([("A".to_string(), 1.0), ("B".to_string(), 2.0)]),
        };
        let opts = ReshapeOptions {
            contour_file: contour,
            outfile_path: outfile.clone(),
            delimiter: ';',
            decimal: ',',
        };
        process_2d_scan_contour(&opts, &source).unwrap();

        let written = fs::read_to_string(&outfile).unwrap();
        assert_eq!(written.lines().next(), Some("A;B;scan"));
        assert_eq!(written.lines().nth(1), Some("0.1;0.2;A-B"));
    }

    #[test]
    fn expand_user_handles_tilde_prefix() {
        let Ok(home) = std::env::var("HOME") else {
            return;
        };
        assert_eq!(
            expand_user(Path::new("~/scans/c.csv")),
            PathBuf::from(&home).join("scans/c.csv")
        );
        assert_eq!(expand_user(Path::new("plain.csv")), PathBuf::from("plain.csv"));
    }
}
