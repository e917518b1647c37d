//! # Centripetal compensation
//!
//! On a curved segment the robot needs a force towards the centre of the
//! curve to stay on it, `mass * curvature * speed^2`. The compensator adds
//! that force times the centripetal scaling as power along the left normal of
//! the path tangent, so a heavier robot gets a larger correction. Curvature is
//! signed (positive turning left) so the correction always points to the
//! concave side.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::Serialize;

// Internal
use super::params::DynamicsModel;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CentripetalCompensator {
    /// Power per unit of centripetal force
    scaling: f64,

    mass_kg: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl CentripetalCompensator {
    pub fn new(dynamics: &DynamicsModel) -> Self {
        Self {
            scaling: dynamics.centripetal_scaling,
            mass_kg: dynamics.mass_kg,
        }
    }

    /// Field frame correction for travelling at `speed` along a section with
    /// the given curvature and unit tangent.
    pub fn correction(&self, speed: f64, curvature: f64, tangent: &Vector2<f64>) -> Vector2<f64> {
        if curvature == 0.0 || speed == 0.0 {
            return Vector2::zeros();
        }

        let left = Vector2::new(-tangent[1], tangent[0]);
        left * (self.scaling * self.mass_kg * curvature * speed.powi(2))
    }
}
