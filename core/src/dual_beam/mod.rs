//! Wind speed from the time lag between two beams looking at the same plume.

pub mod calculator;
pub mod correlation;
pub mod series;

pub use calculator::{beam_distance, DualBeamCalculator, WindSpeedResult};
pub use correlation::{correlate, estimate_lag, CorrelationPoint, LagEstimate, Orientation};
pub use series::MeasurementSeries;
