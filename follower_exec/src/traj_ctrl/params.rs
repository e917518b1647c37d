//! Trajectory control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use super::pidf::PidfCoeffs;
use crate::loc::LocSource;
use crate::loco_ctrl::{DriveSignature, LocoCtrlError};
use util::time::millis_to_seconds;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the path follower.
///
/// `Params::default()` holds the tuned values for the competition robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Params {
    /// The localiser fitted to the robot
    pub localizer: LocSource,

    pub drive_signature: DriveSignature,

    pub dynamics: DynamicsModel,

    /// Gains for the translational (cross track) error
    pub translational: AxisParams,

    /// Gains for the heading error
    pub heading: AxisParams,

    /// Gains for the along track velocity error
    pub drive: AxisParams,

    /// End of path constraints
    pub constraints: DriveConstraints,

    /// Scale applied to every wheel power, in (0, 1].
    #[serde(default = "default_max_power")]
    pub max_power: f64,

    /// Number of consecutive sensor faults tolerated before the chain is
    /// abandoned.
    #[serde(default = "default_max_consecutive_sensor_faults")]
    pub max_consecutive_sensor_faults: u32,
}

/// Measured response of the drivetrain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DynamicsModel {
    /// Units: kilograms
    pub mass_kg: f64,

    /// Forward speed at full power.
    ///
    /// Units: inches/second
    pub x_movement: f64,

    /// Strafe speed at full power.
    ///
    /// Units: inches/second
    pub y_movement: f64,

    /// Deceleration when coasting forwards with zero power, negative.
    ///
    /// Units: inches/second^2
    pub forward_zero_power_accel: f64,

    /// Deceleration when coasting sideways with zero power, negative.
    ///
    /// Units: inches/second^2
    pub lateral_zero_power_accel: f64,

    /// Multiplier on the zero power deceleration, larger values brake later
    /// and harder.
    pub zero_power_accel_multiplier: f64,

    /// Power per unit of centripetal force, `mass * curvature * speed^2`.
    pub centripetal_scaling: f64,
}

/// Gains for one control axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisParams {
    pub primary: PidfCoeffs,

    /// If false the secondary gains are never evaluated.
    #[serde(default)]
    pub use_secondary: bool,

    pub secondary: PidfCoeffs,

    /// Error magnitude below which the secondary gains take over.
    pub switch: f64,
}

/// Constraints which must all be met for a segment to be complete.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriveConstraints {
    /// Units: milliseconds
    pub timeout_ms: f64,

    /// Minimum parametric progress
    pub t_value: f64,

    /// Maximum speed.
    ///
    /// Units: inches/second
    pub velocity: f64,

    /// Maximum distance to the end of the segment.
    ///
    /// Units: inches
    pub translational: f64,

    /// Maximum heading error.
    ///
    /// Units: radians
    pub heading_rad: f64,

    /// When the timeout starts counting.
    #[serde(default)]
    pub timeout_origin: TimeoutOrigin,

    /// Longest time a segment may take from entry, whatever the timeout
    /// origin. Stops a robot that can never reach the end of a segment from
    /// following it forever.
    ///
    /// Units: milliseconds
    #[serde(default = "default_segment_timeout_ms")]
    pub segment_timeout_ms: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The event from which the segment timeout is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeoutOrigin {
    /// The segment was entered
    SegmentStart,

    /// Parametric progress first met the `t_value` constraint
    ParametricEnd,
}

/// Errors in the follower configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Mass must be positive, found {0}")]
    InvalidMass(f64),

    #[error("Zero power acceleration for the {axis} axis must be negative, found {value}")]
    InvalidZeroPowerAccel { axis: &'static str, value: f64 },

    #[error("Zero power acceleration multiplier must be positive, found {0}")]
    InvalidMultiplier(f64),

    #[error("Centripetal scaling must be non-negative, found {0}")]
    InvalidCentripetalScaling(f64),

    #[error("The {0} axis gains contain non-finite values")]
    NonFiniteGains(&'static str),

    #[error("The {axis} axis derivative filter must be in [0, 1), found {value}")]
    InvalidDerivativeFilter { axis: &'static str, value: f64 },

    #[error("The {axis} axis switch threshold must be positive, found {value}")]
    InvalidSwitch { axis: &'static str, value: f64 },

    #[error("The {name} constraint must be positive, found {value}")]
    InvalidConstraint { name: &'static str, value: f64 },

    #[error("At least one sensor fault must be tolerated")]
    InvalidSensorFaultLimit,

    #[error("Invalid drivetrain configuration: {0}")]
    Drivetrain(#[from] LocoCtrlError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Check the parameters are usable.
    ///
    /// Drivetrain settings (motor names, movement limits, maximum power) are
    /// checked when the mixer is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.dynamics.validate()?;

        for (name, axis) in [
            ("translational", &self.translational),
            ("heading", &self.heading),
            ("drive", &self.drive),
        ]
        .iter()
        {
            axis.validate(*name)?;
        }

        self.constraints.validate()?;

        if self.max_consecutive_sensor_faults == 0 {
            return Err(ConfigError::InvalidSensorFaultLimit);
        }

        Ok(())
    }
}

impl DynamicsModel {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.mass_kg > 0.0 && self.mass_kg.is_finite()) {
            return Err(ConfigError::InvalidMass(self.mass_kg));
        }

        for (axis, value) in [
            ("forward", self.forward_zero_power_accel),
            ("lateral", self.lateral_zero_power_accel),
        ]
        .iter()
        {
            if !(*value < 0.0 && value.is_finite()) {
                return Err(ConfigError::InvalidZeroPowerAccel {
                    axis: *axis,
                    value: *value,
                });
            }
        }

        if !(self.zero_power_accel_multiplier > 0.0 && self.zero_power_accel_multiplier.is_finite())
        {
            return Err(ConfigError::InvalidMultiplier(self.zero_power_accel_multiplier));
        }

        if !(self.centripetal_scaling >= 0.0 && self.centripetal_scaling.is_finite()) {
            return Err(ConfigError::InvalidCentripetalScaling(self.centripetal_scaling));
        }

        Ok(())
    }
}

impl AxisParams {
    fn validate(&self, axis: &'static str) -> Result<(), ConfigError> {
        let mut sets = vec![&self.primary];
        if self.use_secondary {
            sets.push(&self.secondary);

            if !(self.switch > 0.0 && self.switch.is_finite()) {
                return Err(ConfigError::InvalidSwitch {
                    axis,
                    value: self.switch,
                });
            }
        }

        for c in sets {
            if !c.is_finite() {
                return Err(ConfigError::NonFiniteGains(axis));
            }
            if !(c.d_filter >= 0.0 && c.d_filter < 1.0) {
                return Err(ConfigError::InvalidDerivativeFilter {
                    axis,
                    value: c.d_filter,
                });
            }
        }

        Ok(())
    }
}

impl DriveConstraints {
    /// The timeout in seconds.
    pub fn timeout_s(&self) -> f64 {
        millis_to_seconds(self.timeout_ms)
    }

    /// The segment timeout in seconds.
    pub fn segment_timeout_s(&self) -> f64 {
        millis_to_seconds(self.segment_timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("timeout", self.timeout_ms),
            ("t value", self.t_value),
            ("velocity", self.velocity),
            ("translational", self.translational),
            ("heading", self.heading_rad),
            ("segment timeout", self.segment_timeout_ms),
        ]
        .iter()
        {
            if !(*value > 0.0 && value.is_finite()) {
                return Err(ConfigError::InvalidConstraint {
                    name: *name,
                    value: *value,
                });
            }
        }

        if self.t_value > 1.0 {
            return Err(ConfigError::InvalidConstraint {
                name: "t value",
                value: self.t_value,
            });
        }

        Ok(())
    }
}

impl Default for Params {
    fn default() -> Self {
        Self {
            localizer: LocSource::Pinpoint,
            drive_signature: DriveSignature::default(),
            dynamics: DynamicsModel {
                mass_kg: 11.2,
                x_movement: 82.502272993526,
                y_movement: 67.042469589951,
                forward_zero_power_accel: -34.452164496463,
                lateral_zero_power_accel: -64.90269827005,
                zero_power_accel_multiplier: 1.0,
                centripetal_scaling: 0.000027,
            },
            translational: AxisParams {
                primary: PidfCoeffs::new(0.15, 0.0, 0.01, 0.0),
                use_secondary: false,
                secondary: PidfCoeffs::new(0.1, 0.0, 0.01, 0.0),
                switch: 3.0,
            },
            heading: AxisParams {
                primary: PidfCoeffs::new(1.5, 0.0, 0.1, 0.0),
                use_secondary: false,
                secondary: PidfCoeffs::new(2.0, 0.0, 0.1, 0.0),
                // pi / 20
                switch: 0.15707963267948966,
            },
            drive: AxisParams {
                primary: PidfCoeffs::new(0.01, 0.0, 0.000012, 0.0).with_d_filter(0.6),
                use_secondary: false,
                secondary: PidfCoeffs::new(0.1, 0.0, 0.0, 0.0).with_d_filter(0.6),
                switch: 20.0,
            },
            constraints: DriveConstraints {
                timeout_ms: 500.0,
                t_value: 0.995,
                velocity: 0.1,
                translational: 0.1,
                heading_rad: 0.007,
                timeout_origin: TimeoutOrigin::default(),
                segment_timeout_ms: default_segment_timeout_ms(),
            },
            max_power: default_max_power(),
            max_consecutive_sensor_faults: default_max_consecutive_sensor_faults(),
        }
    }
}

impl Default for TimeoutOrigin {
    fn default() -> Self {
        TimeoutOrigin::ParametricEnd
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn default_max_power() -> f64 {
    1.0
}

fn default_max_consecutive_sensor_faults() -> u32 {
    3
}

fn default_segment_timeout_ms() -> f64 {
    10_000.0
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_params_file_matches_default() {
        let params: Params =
            toml::from_str(include_str!("../../../params/follower.toml")).unwrap();

        assert_eq!(params, Params::default());
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut p = Params::default();
        p.dynamics.mass_kg = 0.0;
        assert_eq!(p.validate(), Err(ConfigError::InvalidMass(0.0)));

        let mut p = Params::default();
        p.dynamics.lateral_zero_power_accel = 3.0;
        assert_eq!(
            p.validate(),
            Err(ConfigError::InvalidZeroPowerAccel {
                axis: "lateral",
                value: 3.0
            })
        );

        let mut p = Params::default();
        p.drive.primary.d_filter = 1.0;
        assert_eq!(
            p.validate(),
            Err(ConfigError::InvalidDerivativeFilter {
                axis: "drive",
                value: 1.0
            })
        );

        // A broken secondary set only matters if it's enabled
        let mut p = Params::default();
        p.heading.secondary.k_p = std::f64::NAN;
        assert!(p.validate().is_ok());
        p.heading.use_secondary = true;
        assert_eq!(p.validate(), Err(ConfigError::NonFiniteGains("heading")));

        let mut p = Params::default();
        p.constraints.t_value = 1.5;
        assert!(p.validate().is_err());

        let mut p = Params::default();
        p.constraints.segment_timeout_ms = -1.0;
        assert_eq!(
            p.validate(),
            Err(ConfigError::InvalidConstraint {
                name: "segment timeout",
                value: -1.0
            })
        );

        let mut p = Params::default();
        p.max_consecutive_sensor_faults = 0;
        assert_eq!(p.validate(), Err(ConfigError::InvalidSensorFaultLimit));
    }
}
