//! # Locomotion control module
//!
//! Locomotion control turns a robot-frame drive demand (axial, lateral and
//! turn power) into the four wheel powers of the mecanum drivetrain. The
//! mixer normalises the powers so that no wheel exceeds the actuator range
//! without changing the direction of the demand, then applies the polarity of
//! each motor from the drive signature.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod calc_mecanum;
mod cmd;
mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use cmd::*;
pub use params::*;
pub use state::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// The number of wheels on the robot.
pub const NUM_WHEELS: usize = 4;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors in the locomotion configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LocoCtrlError {
    #[error("The motor name for the {0} wheel is empty")]
    EmptyMotorName(Wheel),

    #[error("The motor name \"{0}\" is used for more than one wheel")]
    DuplicateMotorName(String),

    #[error("Movement limits must be positive and finite, found x = {0}, y = {1}")]
    InvalidMovement(f64, f64),

    #[error("Maximum power must be in (0, 1], found {0}")]
    InvalidMaxPower(f64),
}
