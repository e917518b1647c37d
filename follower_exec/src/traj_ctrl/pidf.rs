//! # PIDF controllers
//!
//! The feedback law used by all three trajectory control axes:
//!
//! `out = k_p*e + k_i*integral(e) + k_d*de/dt + k_f*target + k_static*sign(e)`
//!
//! The controller is driven by the timestamp of the pose sample rather than
//! the wall clock, so that a simulated or replayed run behaves exactly like a
//! live one.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use super::params::AxisParams;
use util::maths::sign;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Time steps smaller than this produce no derivative and no integral.
///
/// Units: seconds
pub const MIN_DT_S: f64 = 1e-6;

/// The magnitude of the actuator range, the integral term is never allowed to
/// contribute more than this.
const SATURATION: f64 = 1.0;

/// Half width of the band around the switch threshold over which the primary
/// and secondary outputs are blended, as a fraction of the threshold.
pub const SWITCH_BLEND_FRACTION: f64 = 0.25;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Gains for a PIDF controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidfCoeffs {
    /// Proportional gain
    pub k_p: f64,

    /// Integral gain
    pub k_i: f64,

    /// Derivative gain
    pub k_d: f64,

    /// Feedforward gain, applied to the target rather than the error
    #[serde(default)]
    pub k_f: f64,

    /// Static friction gain, applied to the sign of the error
    #[serde(default)]
    pub k_static: f64,

    /// Low pass factor for the derivative, in [0, 1). Zero disables the
    /// filter.
    #[serde(default)]
    pub d_filter: f64,
}

/// A PIDF controller
#[derive(Debug, Clone, Serialize)]
pub struct PidfController {
    coeffs: PidfCoeffs,

    /// The integral accumulation
    integral: f64,

    /// Filtered derivative from the previous update
    deriv: f64,

    /// Previous error
    prev_error: Option<f64>,

    /// Time of the previous update
    prev_time_s: Option<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The gain set arrangement for one control axis, fixed at construction.
#[derive(Debug, Clone, Serialize)]
pub enum AxisController {
    /// Only the primary gains are used.
    Single(PidfController),

    /// Switch to the secondary gains while the error magnitude is below
    /// `switch`.
    ///
    /// Near the threshold the two outputs are blended linearly in the error
    /// magnitude, so the output is continuous across the switch.
    ///
    /// Both controllers are updated on every cycle so that neither has stale
    /// integral or derivative state when it takes over.
    Switched {
        primary: PidfController,
        secondary: PidfController,
        switch: f64,
    },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidfCoeffs {
    /// Create a new set of gains without static or derivative filter terms.
    pub const fn new(k_p: f64, k_i: f64, k_d: f64, k_f: f64) -> Self {
        Self {
            k_p,
            k_i,
            k_d,
            k_f,
            k_static: 0.0,
            d_filter: 0.0,
        }
    }

    /// Set the derivative low pass factor.
    pub const fn with_d_filter(mut self, d_filter: f64) -> Self {
        self.d_filter = d_filter;
        self
    }

    /// True if every gain is a finite number.
    pub fn is_finite(&self) -> bool {
        [self.k_p, self.k_i, self.k_d, self.k_f, self.k_static, self.d_filter]
            .iter()
            .all(|v| v.is_finite())
    }
}

impl PidfController {
    /// Create a new controller with the given gains.
    pub fn new(coeffs: PidfCoeffs) -> Self {
        Self {
            coeffs,
            integral: 0.0,
            deriv: 0.0,
            prev_error: None,
            prev_time_s: None,
        }
    }

    pub fn coeffs(&self) -> &PidfCoeffs {
        &self.coeffs
    }

    /// The current integral accumulation.
    pub fn integral(&self) -> f64 {
        self.integral
    }

    /// Clear all accumulated state, as if the controller had just been
    /// created.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.deriv = 0.0;
        self.prev_error = None;
        self.prev_time_s = None;
    }

    /// Get the value of the controller for the given error and target at the
    /// given time.
    ///
    /// On the first update, or if less than `MIN_DT_S` has elapsed since the
    /// last one, there is no derivative and the integral isn't accumulated.
    pub fn update(&mut self, error: f64, target: f64, time_s: f64) -> f64 {
        let dt = self.prev_time_s.map(|t0| time_s - t0);

        match (dt, self.prev_error) {
            (Some(dt), Some(prev_error)) if dt > MIN_DT_S => {
                self.integral += error * dt;

                // Limit the integral so that its contribution can't exceed
                // saturation on its own.
                if self.coeffs.k_i != 0.0 {
                    let limit = SATURATION / self.coeffs.k_i.abs();
                    self.integral = self.integral.max(-limit).min(limit);
                }

                let raw = (error - prev_error) / dt;
                let f = self.coeffs.d_filter;
                self.deriv = f * self.deriv + (1.0 - f) * raw;
            }
            _ => self.deriv = 0.0,
        }

        self.prev_error = Some(error);
        self.prev_time_s = Some(time_s);

        let c = &self.coeffs;
        c.k_p * error
            + c.k_i * self.integral
            + c.k_d * self.deriv
            + c.k_f * target
            + c.k_static * sign(error)
    }
}

impl AxisController {
    /// Build the controller for an axis from its parameters.
    ///
    /// The secondary gains are only used if they're enabled.
    pub fn from_params(params: &AxisParams) -> Self {
        if params.use_secondary {
            AxisController::Switched {
                primary: PidfController::new(params.primary),
                secondary: PidfController::new(params.secondary),
                switch: params.switch,
            }
        }
        else {
            AxisController::Single(PidfController::new(params.primary))
        }
    }

    pub fn update(&mut self, error: f64, target: f64, time_s: f64) -> f64 {
        match self {
            AxisController::Single(c) => c.update(error, target, time_s),
            AxisController::Switched {
                primary,
                secondary,
                switch,
            } => {
                let p = primary.update(error, target, time_s);
                let s = secondary.update(error, target, time_s);
                let w = secondary_weight(error, *switch);

                w * s + (1.0 - w) * p
            }
        }
    }

    pub fn reset(&mut self) {
        match self {
            AxisController::Single(c) => c.reset(),
            AxisController::Switched {
                primary, secondary, ..
            } => {
                primary.reset();
                secondary.reset();
            }
        }
    }

    /// The integral of the primary controller.
    pub fn integral(&self) -> f64 {
        match self {
            AxisController::Single(c) => c.integral(),
            AxisController::Switched { primary, .. } => primary.integral(),
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Share of the output taken from the secondary gains, 1 well below the
/// switch, 0 well above it and linear across the blend band.
fn secondary_weight(error: f64, switch: f64) -> f64 {
    let half_band = switch * SWITCH_BLEND_FRACTION;
    let lower = switch - half_band;

    1.0 - ((error.abs() - lower) / (2.0 * half_band)).max(0.0).min(1.0)
}
