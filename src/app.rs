//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - initializes logging
//! - resolves the spectrum against the summary file
//! - runs the contour conversion

use clap::Parser;

use crate::cli::Cli;
use crate::error::AppError;
use crate::reshape::{self, ReshapeOptions};
use crate::spectrum::Summary;

/// Entry point for the `fluxc` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.loglevel.to_tracing())
        .with_target(false)
        .init();

    let summary = Summary::load_summary_file()?;
    let spectrum = summary.resolve(&cli.spectrum_name)?;

    let opts = ReshapeOptions {
        contour_file: cli.contour_file,
        outfile_path: cli.outfile_path,
        delimiter: cli.delimiter,
        decimal: cli.decimal,
    };
    reshape::process_2d_scan_contour(&opts, &spectrum)?;

    Ok(())
}
