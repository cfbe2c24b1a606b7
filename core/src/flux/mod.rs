//! Mass flux of a gas through the scan surface of one instrument.

pub mod calculator;
pub mod formula;
pub mod quality;

pub use calculator::{FluxCalculator, FluxResult};
pub use formula::{FluxConditions, FluxPoint};
pub use quality::QualityFlag;
