//! Closed-form plume geometry.
//!
//! Positions are east/north/up metres relative to the plume source. The plume is
//! modelled as a horizontal line leaving the source at some height `z`; each
//! instrument contributes the ray through the centre of the plume in its scan.

use crate::math::geo::{bearing_of, wrap_degrees};
use nalgebra::{Vector2, Vector3};

/// Rays closer to the horizon than this never reach a plume above the instrument.
const MIN_UPWARD_COMPONENT: f64 = 1e-6;

/// Ray from an instrument through the plume centre it observed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sighting {
    pub origin: Vector3<f64>,
    pub direction: Vector3<f64>,
}

impl Sighting {
    pub fn new(origin: Vector3<f64>, direction: Vector3<f64>) -> Self {
        Self { origin, direction }
    }

    fn looks_up(&self) -> bool {
        self.direction.z > MIN_UPWARD_COMPONENT
    }

    /// Horizontal position where the ray crosses height `z`, as `A + B z`.
    fn horizontal_line(&self) -> (Vector2<f64>, Vector2<f64>) {
        let slope = Vector2::new(self.direction.x, self.direction.y) / self.direction.z;
        let anchor = Vector2::new(self.origin.x, self.origin.y) - slope * self.origin.z;
        (anchor, slope)
    }

    /// Where the ray reaches height `z`, if it gets there going upwards.
    pub fn at_height(&self, z: f64) -> Option<Vector2<f64>> {
        if !self.looks_up() || z <= self.origin.z {
            return None;
        }
        let (anchor, slope) = self.horizontal_line();
        Some(anchor + slope * z)
    }
}

/// Height of the plume above the source and the bearing it travels towards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlumeSolution {
    pub height: f64,
    /// Degrees clockwise from north, direction of travel.
    pub bearing: f64,
}

impl PlumeSolution {
    /// Wind direction in the "blowing from" convention.
    pub fn wind_direction(&self) -> f64 {
        wrap_degrees(self.bearing + 180.0)
    }
}

/// Finds the lowest height at which both rays meet one line through the source.
///
/// At height `z` the rays cross the horizontal plane at `Q1(z)` and `Q2(z)`;
/// both lie on the plume line when `Q1 x Q2 = 0`, a polynomial of degree two in
/// `z`. Roots below either instrument, or putting the two crossings on opposite
/// sides of the source, are discarded.
pub fn triangulate(first: &Sighting, second: &Sighting) -> Option<PlumeSolution> {
    if !first.looks_up() || !second.looks_up() {
        return None;
    }
    let (a1, b1) = first.horizontal_line();
    let (a2, b2) = second.horizontal_line();
    let cross = |u: &Vector2<f64>, v: &Vector2<f64>| u.x * v.y - u.y * v.x;
    let c0 = cross(&a1, &a2);
    let c1 = cross(&a1, &b2) + cross(&b1, &a2);
    let c2 = cross(&b1, &b2);

    let mut candidates = polynomial_roots(c0, c1, c2);
    candidates.sort_by(|a, b| a.total_cmp(b));
    candidates.into_iter().find_map(|z| {
        let q1 = first.at_height(z)?;
        let q2 = second.at_height(z)?;
        if q1.norm() <= f64::EPSILON || q2.norm() <= f64::EPSILON || q1.dot(&q2) <= 0.0 {
            return None;
        }
        let downwind = q1 + q2;
        Some(PlumeSolution {
            height: z,
            bearing: bearing_of(downwind.x, downwind.y),
        })
    })
}

/// Plume bearing seen by a single ray, given the plume height above the source.
pub fn bearing_at_height(sighting: &Sighting, height: f64) -> Option<PlumeSolution> {
    let q = sighting.at_height(height)?;
    if q.norm() <= f64::EPSILON {
        return None;
    }
    Some(PlumeSolution {
        height,
        bearing: bearing_of(q.x, q.y),
    })
}

/// Real roots of `c0 + c1 z + c2 z^2`.
fn polynomial_roots(c0: f64, c1: f64, c2: f64) -> Vec<f64> {
    if c2.abs() <= f64::EPSILON * (c0.abs() + c1.abs()) {
        if c1.abs() <= f64::EPSILON {
            return Vec::new();
        }
        return vec![-c0 / c1];
    }
    let discriminant = c1 * c1 - 4.0 * c2 * c0;
    if discriminant < 0.0 {
        return Vec::new();
    }
    let q = -0.5 * (c1 + c1.signum() * discriminant.sqrt());
    if q == 0.0 {
        return vec![0.0];
    }
    vec![q / c2, c0 / q]
}
