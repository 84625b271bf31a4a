//! `diffuse-flux` library crate.
//!
//! The binary (`fluxc`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - modules are reusable (e.g., notebooks, future analysis pipelines)
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod error;
pub mod plot;
pub mod reshape;
pub mod spectrum;
