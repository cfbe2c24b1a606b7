//! Plume altitude and wind direction from the plume centres of flux scans.

pub mod calculator;
pub mod triangulation;

pub use calculator::{PlumeSolution, Sighting};
pub use triangulation::{
    CentreObservation, GeometryCalculationKind, GeometryResult, GeometryTriangulator,
};
