//! Closed-form flux integrals over one scan.
//!
//! Columns are slant columns in molecules/cm²; `gas_factor` turns them into
//! kg/m². Heights are metres above the instrument, wind speed in m/s, wind
//! direction in degrees the wind blows from. The result is in kg/s.

use crate::config::setup::ScannerGeometry;
use crate::math::geo::wrap_degrees;
use crate::prelude::{ProcessingError, ProcessingResult};
use nalgebra::Vector2;

/// Viewing directions within this many degrees of the horizon are left out.
const HORIZON_MARGIN_DEG: f64 = 0.5;

/// One good spectrum entering the integral.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FluxPoint {
    pub angle: f64,
    pub angle2: f64,
    pub column: f64,
}

/// Wind and plume geometry shared by every point of a scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FluxConditions {
    pub offset: f64,
    pub plume_height: f64,
    pub wind_speed: f64,
    pub wind_direction: f64,
    pub gas_factor: f64,
}

/// Flux through a flat scan plane perpendicular to `compass`.
///
/// Vertical columns `(S - offset) cos a` are integrated over the horizontal
/// distance `h |tan a2 - tan a1|` between neighbouring spectra, then projected
/// onto the wind with `|cos(direction - compass)|`.
pub fn flat_flux(points: &[FluxPoint], compass: f64, conditions: &FluxConditions) -> ProcessingResult<f64> {
    let usable: Vec<&FluxPoint> = points
        .iter()
        .filter(|p| (p.angle.abs() - 90.0).abs() >= HORIZON_MARGIN_DEG)
        .collect();
    let wind_factor = (conditions.wind_direction - compass).to_radians().cos().abs();

    let mut sum = 0.0;
    for pair in usable.windows(2) {
        let (a1, a2) = (pair[0].angle.to_radians(), pair[1].angle.to_radians());
        let vcd1 = (pair[0].column - conditions.offset) * a1.cos();
        let vcd2 = (pair[1].column - conditions.offset) * a2.cos();
        let distance = conditions.plume_height * (a2.tan() - a1.tan());
        sum += distance * 0.5 * (vcd1 + vcd2);
    }
    Ok(sum.abs() * conditions.gas_factor * wind_factor * conditions.wind_speed)
}

/// Flux for scanners whose viewing directions are not confined to one vertical plane.
///
/// Each direction is followed up to the plume height; neighbouring crossing
/// points span a segment whose width across the plume's direction of travel
/// weights the mean vertical column of the two spectra.
pub fn cone_flux(
    points: &[FluxPoint],
    geometry: &ScannerGeometry,
    conditions: &FluxConditions,
) -> ProcessingResult<f64> {
    let min_up = HORIZON_MARGIN_DEG.to_radians().sin();
    let crossings: Vec<(Vector2<f64>, f64)> = points
        .iter()
        .filter_map(|p| {
            let d = geometry.viewing_direction(p.angle, p.angle2);
            (d.z >= min_up).then(|| {
                let at = Vector2::new(d.x, d.y) * (conditions.plume_height / d.z);
                (at, (p.column - conditions.offset) * d.z)
            })
        })
        .collect();

    let travel = wrap_degrees(conditions.wind_direction + 180.0).to_radians();
    let (ts, tc) = travel.sin_cos();
    let mut sum = 0.0;
    for pair in crossings.windows(2) {
        let segment = pair[1].0 - pair[0].0;
        let width = segment.x * tc - segment.y * ts;
        sum += width * 0.5 * (pair[0].1 + pair[1].1);
    }
    Ok(sum.abs() * conditions.gas_factor * conditions.wind_speed)
}

/// Picks the integral matching the scanner and checks there is enough data.
pub fn integrate(
    points: &[FluxPoint],
    geometry: &ScannerGeometry,
    conditions: &FluxConditions,
    min_points: usize,
) -> ProcessingResult<f64> {
    if points.len() < min_points {
        return Err(ProcessingError::InsufficientData(format!(
            "{} good spectra, {} required for a flux",
            points.len(),
            min_points
        )));
    }
    if conditions.plume_height <= 0.0 {
        return Err(ProcessingError::DegenerateGeometry(
            "plume is not above the instrument".into(),
        ));
    }
    match geometry {
        ScannerGeometry::Flat { compass, .. } => flat_flux(points, *compass, conditions),
        ScannerGeometry::Conical { .. } | ScannerGeometry::Heidelberg => {
            cone_flux(points, geometry, conditions)
        }
    }
}
