//! Spectrum shapes and flux evaluation.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - resolved from the summary file (`registry`)
//! - consumed read-only by the contour reshaper
//! - evaluated on arbitrary parameter points for contour plotting

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::spectrum::registry::SpectrumRecord;

/// Functional form of a diffuse-flux spectrum.
///
/// Each shape implies a fixed parameter vocabulary; the summary file's
/// `parameter_names` must cover at least these names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    /// `phi(E) = norm * (E / E0)^-gamma`
    SinglePowerLaw,
    /// `phi(E) = norm * (E / Eb)^-gamma1` below the break energy `Eb`,
    /// `norm * (E / Eb)^-gamma2` above it, with `Eb = 10^log10_ebreak` GeV.
    BrokenPowerLaw,
}

impl ShapeKind {
    pub fn required_parameters(self) -> &'static [&'static str] {
        match self {
            ShapeKind::SinglePowerLaw => &["norm", "gamma"],
            ShapeKind::BrokenPowerLaw => &["norm", "gamma1", "gamma2", "log10_ebreak"],
        }
    }
}

/// Shape parameters extracted from a name → value map.
///
/// Extracting once up front keeps flux evaluation free of map lookups and
/// turns a missing parameter into a single, well-placed error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShapeParams {
    SinglePowerLaw {
        norm: f64,
        gamma: f64,
    },
    BrokenPowerLaw {
        norm: f64,
        gamma1: f64,
        gamma2: f64,
        log10_ebreak: f64,
    },
}

impl ShapeParams {
    /// Extract the shape's parameters from `values`, failing on any missing name.
    pub fn from_map(
        shape: ShapeKind,
        spectrum_name: &str,
        values: &BTreeMap<String, f64>,
    ) -> Result<Self, AppError> {
        let get = |name: &str| -> Result<f64, AppError> {
            values.get(name).copied().ok_or_else(|| {
                AppError::lookup(format!(
                    "Spectrum '{spectrum_name}' has no value for parameter '{name}'."
                ))
            })
        };

        Ok(match shape {
            ShapeKind::SinglePowerLaw => ShapeParams::SinglePowerLaw {
                norm: get("norm")?,
                gamma: get("gamma")?,
            },
            ShapeKind::BrokenPowerLaw => ShapeParams::BrokenPowerLaw {
                norm: get("norm")?,
                gamma1: get("gamma1")?,
                gamma2: get("gamma2")?,
                log10_ebreak: get("log10_ebreak")?,
            },
        })
    }

    /// Differential flux at `e_gev`, with pivot energy `e0_gev` (used by the
    /// single power law only; the broken power law pivots at its break).
    pub fn flux(&self, e0_gev: f64, e_gev: f64) -> f64 {
        match *self {
            ShapeParams::SinglePowerLaw { norm, gamma } => norm * (e_gev / e0_gev).powf(-gamma),
            ShapeParams::BrokenPowerLaw {
                norm,
                gamma1,
                gamma2,
                log10_ebreak,
            } => {
                let ebreak = 10f64.powf(log10_ebreak);
                let gamma = if e_gev < ebreak { gamma1 } else { gamma2 };
                norm * (e_gev / ebreak).powf(-gamma)
            }
        }
    }
}

/// Reference to a confidence-level contour table (long format, as produced
/// by the reshaper).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContourFileRef {
    /// Confidence level in percent (e.g. `68.0`).
    pub cl: f64,
    pub path: PathBuf,
}

/// Read-only view of a spectrum as the contour reshaper sees it.
///
/// The reshaper consumes exactly these two accessors, so tests can substitute
/// synthetic parameter sets without touching the registry.
pub trait ScanSource {
    /// Parameter names in their canonical (output column) order.
    fn parameter_names(&self) -> &[String];
    /// Best-fit value per parameter name.
    fn best_fit(&self) -> &BTreeMap<String, f64>;
}

/// A published diffuse-flux measurement, resolved from the summary file.
#[derive(Debug, Clone)]
pub struct Spectrum {
    name: String,
    journal: String,
    year: u16,
    shape: ShapeKind,
    parameter_names: Vec<String>,
    best_fit: BTreeMap<String, f64>,
    best_fit_params: ShapeParams,
    e0_gev: f64,
    energy_range_gev: (f64, f64),
    contour_files: Vec<ContourFileRef>,
}

impl Spectrum {
    /// Build a validated spectrum from a raw summary-file record.
    ///
    /// Validation: every listed parameter has a best-fit value, the shape's
    /// required parameters are all listed, and the energy range is a
    /// non-empty positive interval.
    pub fn from_record(name: &str, record: &SpectrumRecord) -> Result<Self, AppError> {
        for p in &record.parameter_names {
            if !record.best_fit.contains_key(p) {
                return Err(AppError::lookup(format!(
                    "Spectrum '{name}' has no best-fit value for parameter '{p}'."
                )));
            }
        }
        for required in record.shape.required_parameters() {
            if !record.parameter_names.iter().any(|p| p == required) {
                return Err(AppError::schema(format!(
                    "Spectrum '{name}' ({:?}) is missing required parameter '{required}'.",
                    record.shape
                )));
            }
        }

        let [lo, hi] = record.energy_range_gev;
        if !(lo.is_finite() && hi.is_finite()) || lo <= 0.0 || hi <= lo {
            return Err(AppError::schema(format!(
                "Spectrum '{name}' has an invalid energy range [{lo}, {hi}] GeV."
            )));
        }
        if !record.e0_gev.is_finite() || record.e0_gev <= 0.0 {
            return Err(AppError::schema(format!(
                "Spectrum '{name}' has an invalid pivot energy {} GeV.",
                record.e0_gev
            )));
        }

        let best_fit_params = ShapeParams::from_map(record.shape, name, &record.best_fit)?;

        Ok(Self {
            name: name.to_string(),
            journal: record.journal.clone(),
            year: record.year,
            shape: record.shape,
            parameter_names: record.parameter_names.clone(),
            best_fit: record.best_fit.clone(),
            best_fit_params,
            e0_gev: record.e0_gev,
            energy_range_gev: (lo, hi),
            contour_files: record.contour_files.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Citation string, used as the plot legend label.
    pub fn journal(&self) -> &str {
        &self.journal
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn shape(&self) -> ShapeKind {
        self.shape
    }

    pub fn e0_gev(&self) -> f64 {
        self.e0_gev
    }

    /// Energy range `(lo, hi)` in GeV over which the measurement is valid.
    pub fn energy_range_gev(&self) -> (f64, f64) {
        self.energy_range_gev
    }

    pub fn contour_files(&self) -> &[ContourFileRef] {
        &self.contour_files
    }

    /// Best-fit differential flux at `e_gev`.
    pub fn flux(&self, e_gev: f64) -> f64 {
        self.best_fit_params.flux(self.e0_gev, e_gev)
    }

    /// Differential flux at `e_gev` for an arbitrary parameter point, e.g. a
    /// row of a confidence-level contour table.
    pub fn flux_with(&self, values: &BTreeMap<String, f64>, e_gev: f64) -> Result<f64, AppError> {
        let params = ShapeParams::from_map(self.shape, &self.name, values)?;
        Ok(params.flux(self.e0_gev, e_gev))
    }
}

impl ScanSource for Spectrum {
    fn parameter_names(&self) -> &[String] {
        &self.parameter_names
    }

    fn best_fit(&self) -> &BTreeMap<String, f64> {
        &self.best_fit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bpl_fit() -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("norm".to_string(), 1.8e-18),
            ("gamma1".to_string(), 1.75),
            ("gamma2".to_string(), 2.6),
            ("log10_ebreak".to_string(), 4.9),
        ])
    }

    #[test]
    fn single_power_law_flux_at_pivot_is_norm() {
        let params = ShapeParams::SinglePowerLaw {
            norm: 1.44e-18,
            gamma: 2.37,
        };
        let f = params.flux(1e5, 1e5);
        assert!((f - 1.44e-18).abs() < 1e-30);
    }

    #[test]
    fn broken_power_law_is_continuous_at_break() {
        let params = ShapeParams::from_map(ShapeKind::BrokenPowerLaw, "bpl", &bpl_fit()).unwrap();
        let ebreak = 10f64.powf(4.9);
        let below = params.flux(1e5, ebreak * (1.0 - 1e-9));
        let above = params.flux(1e5, ebreak * (1.0 + 1e-9));
        assert!((below - above).abs() / above < 1e-6);
    }

    fn record(
        shape: ShapeKind,
        parameter_names: &[&str],
        best_fit: BTreeMap<String, f64>,
    ) -> SpectrumRecord {
        SpectrumRecord {
            journal: "unpublished".to_string(),
            year: 2024,
            shape,
            parameter_names: parameter_names.iter().map(|s| s.to_string()).collect(),
            best_fit,
            e0_gev: 1e5,
            energy_range_gev: [1e4, 1e7],
            contour_files: Vec::new(),
        }
    }

    #[test]
    fn missing_best_fit_entry_is_a_lookup_error() {
        let rec = record(
            ShapeKind::SinglePowerLaw,
            &["norm", "gamma"],
            BTreeMap::from([("norm".to_string(), 1e-18)]),
        );
        let err = Spectrum::from_record("bad", &rec).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Lookup);
    }

    #[test]
    fn shape_parameter_not_listed_is_a_schema_error() {
        let rec = record(
            ShapeKind::BrokenPowerLaw,
            &["norm"],
            BTreeMap::from([("norm".to_string(), 1e-18)]),
        );
        let err = Spectrum::from_record("bad", &rec).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Schema);
    }
}
