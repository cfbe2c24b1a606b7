//! Post-processing core for scanning-DOAS volcano monitoring networks.
//!
//! Raw scans are evaluated and quality-gated by the dispatcher, then combined
//! into plume altitudes and wind directions (geometry), wind speeds (dual
//! beam) and finally SO2 mass fluxes. Wind and plume-height facts flow
//! between the stages through the meteorology stores.

pub mod config;
pub mod dual_beam;
pub mod flux;
pub mod geometry;
pub mod math;
pub mod meteorology;
pub mod prelude;
pub mod processing;
pub mod report;
pub mod scan;
pub mod telemetry;

pub use prelude::{ConfigurationError, Estimate, ProcessingError, ProcessingResult, TimeInterval};
