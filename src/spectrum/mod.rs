//! Spectrum registry and flux model.
//!
//! - summary-file loading + name resolution (`registry`)
//! - spectrum shapes, best-fit parameters, flux evaluation (`model`)

pub mod model;
pub mod registry;

pub use model::*;
pub use registry::*;
