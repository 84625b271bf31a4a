//! Summary-file loading and spectrum resolution.
//!
//! The summary file (`measurements.json`) is the registry of published
//! diffuse-flux measurements: a name → record map. A copy ships embedded in
//! the binary so the converter works without any setup; external summary
//! files can be loaded for unreleased fits.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use serde::Deserialize;

use crate::error::AppError;
use crate::spectrum::model::{ContourFileRef, ShapeKind, Spectrum};

/// Summary file bundled with the crate.
const EMBEDDED_SUMMARY: &str = include_str!("../../data/measurements.json");

/// Raw summary-file record, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct SpectrumRecord {
    pub journal: String,
    pub year: u16,
    pub shape: ShapeKind,
    pub parameter_names: Vec<String>,
    pub best_fit: BTreeMap<String, f64>,
    pub e0_gev: f64,
    pub energy_range_gev: [f64; 2],
    #[serde(default)]
    pub contour_files: Vec<ContourFileRef>,
}

/// Loaded summary file: spectrum name → record.
#[derive(Debug, Clone)]
pub struct Summary {
    entries: BTreeMap<String, SpectrumRecord>,
}

impl Summary {
    /// Load the embedded summary file.
    pub fn load_summary_file() -> Result<Self, AppError> {
        Self::from_json(EMBEDDED_SUMMARY)
    }

    /// Parse a summary file from JSON text.
    pub fn from_json(text: &str) -> Result<Self, AppError> {
        let entries: BTreeMap<String, SpectrumRecord> = serde_json::from_str(text)
            .map_err(|e| AppError::schema(format!("Invalid summary file: {e}")))?;
        Ok(Self { entries })
    }

    /// Load a summary file from disk.
    pub fn from_path(path: &Path) -> Result<Self, AppError> {
        let file = File::open(path).map_err(|e| {
            AppError::io(format!(
                "Failed to open summary file '{}': {e}",
                path.display()
            ))
        })?;
        let entries: BTreeMap<String, SpectrumRecord> = serde_json::from_reader(file)
            .map_err(|e| {
                AppError::schema(format!(
                    "Invalid summary file '{}': {e}",
                    path.display()
                ))
            })?;
        Ok(Self { entries })
    }

    /// Names of all available spectra, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Resolve a spectrum by name, validating its record.
    pub fn resolve(&self, name: &str) -> Result<Spectrum, AppError> {
        let record = self.entries.get(name).ok_or_else(|| {
            AppError::lookup(format!(
                "Spectrum name '{name}' not found in measurements."
            ))
        })?;

        Spectrum::from_record(name, record)
    }
}
