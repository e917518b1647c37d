//! # Feedforward model
//!
//! Predicts the power the drivetrain needs from the measured coasting
//! behaviour of the robot.
//!
//! With no power applied the robot decelerates at its zero power
//! acceleration, scaled by the multiplier. That deceleration sets the speed
//! from which the robot can still stop in a given distance.
//!
//! Holding a speed takes power in proportion to it: full power sustains the
//! top speed for a direction (`x_movement`/`y_movement` combined through the
//! direction of travel), so the steady state power is
//! `multiplier * v / v_max`. Mass does not appear here, as drag and drive
//! force both scale with it; it enters through the centripetal correction.
//!
//! All directions passed in here are in the robot frame.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::Serialize;

// Internal
use super::params::DynamicsModel;
use util::maths::sign;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FeedforwardModel {
    x_movement: f64,
    y_movement: f64,

    /// Magnitude of the forward zero power deceleration
    forward_decel: f64,

    /// Magnitude of the lateral zero power deceleration
    lateral_decel: f64,

    multiplier: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FeedforwardModel {
    pub fn new(dynamics: &DynamicsModel) -> Self {
        Self {
            x_movement: dynamics.x_movement,
            y_movement: dynamics.y_movement,
            forward_decel: dynamics.forward_zero_power_accel.abs(),
            lateral_decel: dynamics.lateral_zero_power_accel.abs(),
            multiplier: dynamics.zero_power_accel_multiplier,
        }
    }

    /// Modelled braking deceleration along a direction, or `None` if the
    /// direction is zero.
    pub fn braking_decel(&self, direction: &Vector2<f64>) -> Option<f64> {
        let u = unit(direction)?;
        Some(self.multiplier * (self.forward_decel * u[0].powi(2) + self.lateral_decel * u[1].powi(2)))
    }

    /// Top speed at full power along a direction, or `None` if the direction
    /// is zero.
    pub fn max_velocity(&self, direction: &Vector2<f64>) -> Option<f64> {
        let u = unit(direction)?;
        Some(1.0 / ((u[0] / self.x_movement).powi(2) + (u[1] / self.y_movement).powi(2)).sqrt())
    }

    /// The speed from which the robot can still brake to rest in `distance`.
    ///
    /// The result has the sign of `distance`, so overshooting the end gives
    /// a velocity back towards it.
    pub fn stopping_velocity(&self, distance: f64, direction: &Vector2<f64>) -> f64 {
        match self.braking_decel(direction) {
            Some(a) => sign(distance) * (2.0 * a * distance.abs()).sqrt(),
            None => 0.0,
        }
    }

    /// Power needed to hold `velocity` against drag along `direction`.
    ///
    /// Zero velocity always needs exactly zero power.
    pub fn steady_state_power(&self, velocity: f64, direction: &Vector2<f64>) -> f64 {
        if velocity == 0.0 {
            return 0.0;
        }

        match self.max_velocity(direction) {
            Some(v_max) => self.multiplier * velocity / v_max,
            None => 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn unit(v: &Vector2<f64>) -> Option<Vector2<f64>> {
    let n = v.norm();
    if n > 0.0 && n.is_finite() {
        Some(v / n)
    }
    else {
        None
    }
}
