//! Command-line parsing for the 2D-scan contour converter.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! reshaping/registry code. The tool is a one-shot batch converter, so the
//! CLI is flat: three positionals plus a handful of format knobs.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Convert a 2D likelihood-scan contour file into a long-format table.
///
/// The input must be a delimited file with a two-row header whose top-level
/// labels name parameter pairs (`<param1>-<param2>`), each with `X`/`Y`
/// sub-columns. The output has one column per spectrum parameter plus a
/// `scan` tag.
#[derive(Debug, Parser)]
#[command(name = "fluxc", version, about = "Diffuse-flux 2D scan contour converter")]
pub struct Cli {
    /// Path to the contour file.
    pub contour_file: PathBuf,

    /// Name of the spectrum (as in measurements.json).
    pub spectrum_name: String,

    /// Path to save the processed file.
    pub outfile_path: PathBuf,

    /// Delimiter used in the contour file.
    #[arg(long, default_value_t = ',')]
    pub delimiter: char,

    /// Decimal character used in the contour file.
    #[arg(long, default_value_t = '.')]
    pub decimal: char,

    /// Logging verbosity.
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub loglevel: LogLevel,
}

/// Log verbosity, named after the conventional severity ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    #[value(name = "DEBUG")]
    Debug,
    #[value(name = "INFO")]
    Info,
    #[value(name = "WARNING")]
    Warning,
    #[value(name = "ERROR")]
    Error,
    #[value(name = "CRITICAL")]
    Critical,
}

impl LogLevel {
    /// Map onto `tracing`'s level set (`CRITICAL` has no direct equivalent
    /// and collapses onto `ERROR`).
    pub fn to_tracing(self) -> tracing::Level {
        match self {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warning => tracing::Level::WARN,
            LogLevel::Error | LogLevel::Critical => tracing::Level::ERROR,
        }
    }
}
