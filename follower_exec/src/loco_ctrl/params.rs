//! Parameters structure for LocoCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// Internal
use super::{LocoCtrlError, Wheel, NUM_WHEELS};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Identity and polarity of the four drive motors.
///
/// The signature is fixed at startup, the polarity of each motor is applied
/// to every power command sent to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveSignature {
    pub left_front: MotorConfig,
    pub left_rear: MotorConfig,
    pub right_front: MotorConfig,
    pub right_rear: MotorConfig,
}

/// A single drive motor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorConfig {
    /// Name of the motor in the hardware map
    pub name: String,

    pub direction: Direction,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Direction in which a motor turns for a positive power.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Reverse,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Direction {
    /// The sign applied to powers sent to a motor with this direction.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Forward => 1.0,
            Direction::Reverse => -1.0,
        }
    }
}

impl DriveSignature {
    /// The motors in wheel order (LF, LR, RF, RR).
    pub fn motors(&self) -> [&MotorConfig; NUM_WHEELS] {
        [
            &self.left_front,
            &self.left_rear,
            &self.right_front,
            &self.right_rear,
        ]
    }

    /// Sign of each wheel in wheel order.
    pub fn polarity(&self) -> [f64; NUM_WHEELS] {
        let mut polarity = [1.0; NUM_WHEELS];
        for (p, m) in polarity.iter_mut().zip(self.motors().iter()) {
            *p = m.direction.sign();
        }
        polarity
    }

    /// Check that each motor is named, and that no name is used twice.
    pub fn validate(&self) -> Result<(), LocoCtrlError> {
        let mut seen = HashSet::new();

        for (wheel, motor) in Wheel::ALL.iter().zip(self.motors().iter()) {
            if motor.name.trim().is_empty() {
                return Err(LocoCtrlError::EmptyMotorName(*wheel));
            }
            if !seen.insert(motor.name.as_str()) {
                return Err(LocoCtrlError::DuplicateMotorName(motor.name.clone()));
            }
        }

        Ok(())
    }
}

impl Default for DriveSignature {
    fn default() -> Self {
        let motor = |name: &str, direction| MotorConfig {
            name: name.into(),
            direction,
        };

        Self {
            left_front: motor("frontLeftMotor", Direction::Forward),
            left_rear: motor("backLeftMotor", Direction::Reverse),
            right_front: motor("frontRightMotor", Direction::Forward),
            right_rear: motor("backRightMotor", Direction::Forward),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_signature() {
        let sig = DriveSignature::default();
        assert_eq!(sig.polarity(), [1.0, -1.0, 1.0, 1.0]);
        assert!(sig.validate().is_ok());
    }

    #[test]
    fn test_signature_validation() {
        let mut sig = DriveSignature::default();
        sig.right_rear.name = "  ".into();
        assert_eq!(sig.validate(), Err(LocoCtrlError::EmptyMotorName(Wheel::RightRear)));

        let mut sig = DriveSignature::default();
        sig.right_rear.name = sig.left_front.name.clone();
        assert_eq!(
            sig.validate(),
            Err(LocoCtrlError::DuplicateMotorName("frontLeftMotor".into()))
        );
    }
}
