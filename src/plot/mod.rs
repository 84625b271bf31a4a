//! Spectrum and confidence-contour rendering.
//!
//! Renders the best-fit flux curve of each spectrum plus, where contour
//! tables are available, the min/max flux envelope spanned by the contour's
//! parameter points, drawn as a translucent band. Output is an SVG file, so
//! the module works headless (CI smoke tests, batch reports).
//!
//! The chart is intentionally data-driven: all sampling and envelope
//! computation happens before any Plotters call, which keeps the drawing
//! code small and the math testable on its own.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use plotters::prelude::*;
use tracing::debug;

use crate::error::AppError;
use crate::spectrum::{ScanSource, Spectrum};

/// Rendering options.
#[derive(Debug, Clone)]
pub struct PlotOptions {
    pub width: u32,
    pub height: u32,
    /// Plot `E^s * flux(E)` instead of the bare flux; `s = 2` is the
    /// conventional choice for diffuse-flux figures.
    pub energy_scaling: f64,
    /// Base directory against which relative contour-file paths are resolved.
    pub base_dir: Option<PathBuf>,
    /// Sample count per curve (log-spaced in energy).
    pub samples: usize,
}

impl Default for PlotOptions {
    fn default() -> Self {
        Self {
            width: 960,
            height: 640,
            energy_scaling: 2.0,
            base_dir: None,
            samples: 200,
        }
    }
}

/// A sampled flux curve plus its confidence bands, ready to draw.
struct SpectrumSeries {
    label: String,
    curve: Vec<(f64, f64)>,
    /// `(cl, upper-then-lower polygon ring)` per contour table.
    bands: Vec<(f64, Vec<(f64, f64)>)>,
}

/// Render all spectra (best-fit curves + confidence bands) into an SVG file.
pub fn render_spectra_svg(
    path: &Path,
    spectra: &[Spectrum],
    opts: &PlotOptions,
) -> Result<(), AppError> {
    if spectra.is_empty() {
        return Err(AppError::schema("No spectra to plot."));
    }

    let mut series = Vec::with_capacity(spectra.len());
    for s in spectra {
        series.push(build_series(s, opts)?);
    }

    let (x_range, y_range) = data_bounds(&series)?;
    debug!(
        "Plot bounds: E in [{:.3e}, {:.3e}], y in [{:.3e}, {:.3e}]",
        x_range.0, x_range.1, y_range.0, y_range.1
    );

    let root = SVGBackend::new(path, (opts.width, opts.height)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption("Diffuse neutrino flux", ("sans-serif", 22))
        .set_label_area_size(LabelAreaPosition::Left, 70)
        .set_label_area_size(LabelAreaPosition::Bottom, 45)
        .build_cartesian_2d(
            (x_range.0..x_range.1).log_scale(),
            (y_range.0..y_range.1).log_scale(),
        )
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_desc("Energy (GeV)")
        .y_desc(y_axis_label(opts.energy_scaling))
        .x_label_formatter(&|v| format!("{v:.0e}"))
        .y_label_formatter(&|v| format!("{v:.1e}"))
        .draw()
        .map_err(plot_err)?;

    for (i, s) in series.iter().enumerate() {
        let color = Palette99::pick(i);

        for (cl, ring) in &s.bands {
            // Band opacity scales with the confidence level.
            let alpha = (cl / 100.0) * 0.35;
            chart
                .draw_series(std::iter::once(Polygon::new(
                    ring.clone(),
                    color.mix(alpha).filled(),
                )))
                .map_err(plot_err)?;
        }

        let line_color = color.to_rgba();
        chart
            .draw_series(LineSeries::new(
                s.curve.iter().copied(),
                line_color.stroke_width(2),
            ))
            .map_err(plot_err)?
            .label(s.label.clone())
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 18, y)], line_color.stroke_width(2))
            });
    }

    chart
        .configure_series_labels()
        .border_style(&BLACK)
        .background_style(&WHITE.mix(0.8))
        .draw()
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    Ok(())
}

/// Sample one spectrum's best-fit curve and its contour-table envelopes.
fn build_series(spectrum: &Spectrum, opts: &PlotOptions) -> Result<SpectrumSeries, AppError> {
    let (lo, hi) = spectrum.energy_range_gev();
    let energies = log_space(lo, hi, opts.samples.max(2));
    let s = opts.energy_scaling;

    let curve: Vec<(f64, f64)> = energies
        .iter()
        .map(|&e| (e, e.powf(s) * spectrum.flux(e)))
        .collect();

    let mut bands = Vec::new();
    for contour in spectrum.contour_files() {
        let contour_path = resolve_path(&contour.path, opts.base_dir.as_deref());
        let rows = read_contour_rows(&contour_path, spectrum.parameter_names())?;
        if rows.is_empty() {
            continue;
        }

        let mut upper = Vec::with_capacity(energies.len());
        let mut lower = Vec::with_capacity(energies.len());
        for &e in &energies {
            let mut min = f64::INFINITY;
            let mut max = f64::NEG_INFINITY;
            for row in &rows {
                let f = e.powf(s) * spectrum.flux_with(row, e)?;
                min = min.min(f);
                max = max.max(f);
            }
            upper.push((e, max));
            lower.push((e, min));
        }

        // Closed ring: upper edge left-to-right, lower edge right-to-left.
        let mut ring = upper;
        ring.extend(lower.into_iter().rev());
        bands.push((contour.cl, ring));
    }

    Ok(SpectrumSeries {
        label: spectrum.journal().to_string(),
        curve,
        bands,
    })
}

/// Read a long-format contour table into one parameter map per row.
///
/// The table is the reshaper's output: a single header row with all
/// parameter names (plus the `scan` tag, ignored here), `.`-decimal values.
pub fn read_contour_rows(
    path: &Path,
    parameter_names: &[String],
) -> Result<Vec<BTreeMap<String, f64>>, AppError> {
    if !path.exists() {
        return Err(AppError::file_not_found(format!(
            "Contour table '{}' does not exist.",
            path.display()
        )));
    }
    let file = File::open(path).map_err(|e| {
        AppError::io(format!(
            "Failed to open contour table '{}': {e}",
            path.display()
        ))
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| {
            AppError::io(format!(
                "Failed to read contour table headers '{}': {e}",
                path.display()
            ))
        })?
        .clone();

    let mut indices = Vec::with_capacity(parameter_names.len());
    for name in parameter_names {
        let idx = headers.iter().position(|h| h == name).ok_or_else(|| {
            AppError::schema(format!(
                "Contour table '{}' has no '{name}' column.",
                path.display()
            ))
        })?;
        indices.push(idx);
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record =
            result.map_err(|e| AppError::io(format!("Failed to read contour table row: {e}")))?;
        let mut row = BTreeMap::new();
        for (name, &idx) in parameter_names.iter().zip(&indices) {
            let cell = record.get(idx).unwrap_or("");
            let value = cell.parse::<f64>().map_err(|_| {
                AppError::schema(format!(
                    "Contour table '{}' has a non-numeric '{name}' value '{cell}'.",
                    path.display()
                ))
            })?;
            row.insert(name.clone(), value);
        }
        rows.push(row);
    }

    Ok(rows)
}

/// `n` log-spaced samples over `[lo, hi]`.
fn log_space(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    let (l0, l1) = (lo.ln(), hi.ln());
    (0..n)
        .map(|i| {
            let u = i as f64 / (n as f64 - 1.0);
            (l0 + u * (l1 - l0)).exp()
        })
        .collect()
}

/// Global finite bounds over all curves and bands, padded for log axes.
fn data_bounds(series: &[SpectrumSeries]) -> Result<((f64, f64), (f64, f64)), AppError> {
    let mut x_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;

    let mut visit = |&(x, y): &(f64, f64)| {
        if x.is_finite() && y.is_finite() && y > 0.0 {
            x_min = x_min.min(x);
            x_max = x_max.max(x);
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }
    };

    for s in series {
        s.curve.iter().for_each(&mut visit);
        for (_, ring) in &s.bands {
            ring.iter().for_each(&mut visit);
        }
    }

    if !(x_min.is_finite() && x_max.is_finite() && y_min.is_finite() && y_max.is_finite()) {
        return Err(AppError::schema(
            "No finite, positive flux values to plot.",
        ));
    }

    Ok(((x_min / 1.2, x_max * 1.2), (y_min / 2.0, y_max * 2.0)))
}

fn resolve_path(path: &Path, base_dir: Option<&Path>) -> PathBuf {
    match base_dir {
        Some(base) if path.is_relative() => base.join(path),
        _ => path.to_path_buf(),
    }
}

fn y_axis_label(energy_scaling: f64) -> String {
    if energy_scaling == 0.0 {
        "Flux (GeV^-1 cm^-2 s^-1 sr^-1)".to_string()
    } else {
        format!("E^{energy_scaling} x Flux (GeV^{} cm^-2 s^-1 sr^-1)", energy_scaling - 1.0)
    }
}

fn plot_err(e: impl std::fmt::Display) -> AppError {
    AppError::io(format!("Failed to render plot: {e}"))
}
