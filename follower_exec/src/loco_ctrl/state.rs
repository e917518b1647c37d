//! Implementations for the LocoCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, trace};
use serde::Serialize;
use std::convert::Infallible;

// Internal
use super::{
    calc_mecanum::normalise, DriveDemand, DriveSignature, LocoCtrlError, WheelPowers, NUM_WHEELS,
};
use util::module::State;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Locomotion control module state
#[derive(Debug, Clone)]
pub struct LocoCtrl {
    /// Ratio of forward to strafe top speed
    pub(crate) strafe_ratio: f64,

    /// Scale applied to every wheel after normalisation
    max_power: f64,

    /// Sign of each wheel, from the drive signature
    polarity: [f64; NUM_WHEELS],
}

/// Status report for LocoCtrl processing.
#[derive(Clone, Copy, Default, Serialize, Debug, PartialEq)]
pub struct StatusReport {
    /// True if the demand exceeded the actuator range and was scaled down
    pub saturated: bool,

    /// Largest wheel magnitude before normalisation
    pub raw_max_power: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LocoCtrl {
    /// Create a new mixer.
    ///
    /// `x_movement` and `y_movement` are the forward and strafe top speeds of
    /// the robot at full power, `max_power` scales every output.
    pub fn new(
        signature: &DriveSignature,
        x_movement: f64,
        y_movement: f64,
        max_power: f64,
    ) -> Result<Self, LocoCtrlError> {
        signature.validate()?;

        let valid = |v: f64| v.is_finite() && v > 0.0;
        if !valid(x_movement) || !valid(y_movement) {
            return Err(LocoCtrlError::InvalidMovement(x_movement, y_movement));
        }

        if !(max_power > 0.0 && max_power <= 1.0) {
            return Err(LocoCtrlError::InvalidMaxPower(max_power));
        }

        Ok(Self {
            strafe_ratio: x_movement / y_movement,
            max_power,
            polarity: signature.polarity(),
        })
    }
}

impl State for LocoCtrl {
    type InputData = DriveDemand;
    type OutputData = WheelPowers;
    type StatusReport = StatusReport;
    type ProcError = Infallible;

    /// Mix a drive demand into wheel powers.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let mut powers = self.calc_mecanum(input_data);

        let mut report = StatusReport {
            saturated: false,
            raw_max_power: powers.iter().fold(0.0, |m: f64, p| m.max(p.abs())),
        };

        report.saturated = normalise(&mut powers);
        if report.saturated {
            debug!(
                "Wheel powers saturated (max {:.3}), scaling down",
                report.raw_max_power
            );
        }

        for (p, sign) in powers.iter_mut().zip(self.polarity.iter()) {
            *p *= self.max_power * sign;
        }

        let output = WheelPowers::from_array(powers);
        trace!("LocoCtrl output: {:?}", output);

        Ok((output, report))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::loco_ctrl::{Direction, Wheel};

    const X_MOVEMENT: f64 = 82.502272993526;
    const Y_MOVEMENT: f64 = 67.042469589951;

    fn all_forward() -> DriveSignature {
        let mut sig = DriveSignature::default();
        sig.left_rear.direction = Direction::Forward;
        sig
    }

    fn mix(ctrl: &mut LocoCtrl, demand: DriveDemand) -> (WheelPowers, StatusReport) {
        match ctrl.proc(&demand) {
            Ok(r) => r,
            Err(e) => match e {},
        }
    }

    #[test]
    fn test_forward_demand() {
        let mut ctrl = LocoCtrl::new(&all_forward(), X_MOVEMENT, Y_MOVEMENT, 1.0).unwrap();
        let (out, report) = mix(&mut ctrl, DriveDemand::new(0.5, 0.0, 0.0));

        assert_eq!(out.to_array(), [0.5; NUM_WHEELS]);
        assert!(!report.saturated);

        let (out, _) = mix(&mut ctrl, DriveDemand::default());
        assert!(out.is_zero());
    }

    #[test]
    fn test_single_wheel_polarity_inversion() {
        let mut plain = LocoCtrl::new(&all_forward(), X_MOVEMENT, Y_MOVEMENT, 1.0).unwrap();

        let mut sig = all_forward();
        sig.left_rear.direction = Direction::Reverse;
        let mut inverted = LocoCtrl::new(&sig, X_MOVEMENT, Y_MOVEMENT, 1.0).unwrap();

        let demand = DriveDemand::new(0.7, 0.0, 0.0);
        let (a, _) = mix(&mut plain, demand);
        let (b, _) = mix(&mut inverted, demand);

        for wheel in Wheel::ALL.iter() {
            if *wheel == Wheel::LeftRear {
                assert_eq!(b.get(*wheel), -a.get(*wheel));
            }
            else {
                assert_eq!(b.get(*wheel), a.get(*wheel));
            }
        }
    }

    #[test]
    fn test_saturation_preserves_direction() {
        let mut ctrl = LocoCtrl::new(&all_forward(), X_MOVEMENT, Y_MOVEMENT, 1.0).unwrap();
        let demand = DriveDemand::new(1.2, 0.4, -0.3);

        let raw = ctrl.calc_mecanum(&demand);
        let (out, report) = mix(&mut ctrl, demand);
        let out = out.to_array();

        assert!(report.saturated);
        assert!((out.iter().fold(0.0, |m: f64, p| m.max(p.abs())) - 1.0).abs() < 1e-12);
        for i in 0..NUM_WHEELS {
            assert!((out[i] * report.raw_max_power - raw[i]).abs() < 1e-9);
        }
    }

    #[test]
    fn test_strafe_and_turn_mixing() {
        let mut ctrl = LocoCtrl::new(&all_forward(), X_MOVEMENT, Y_MOVEMENT, 0.5).unwrap();

        // Pure strafe left: front left and rear right run backwards
        let (out, _) = mix(&mut ctrl, DriveDemand::new(0.0, 0.2, 0.0));
        let l = 0.2 * X_MOVEMENT / Y_MOVEMENT * 0.5;
        let expected = [-l, l, l, -l];
        for (o, e) in out.to_array().iter().zip(expected.iter()) {
            assert!((o - e).abs() < 1e-12);
        }

        // Turning anticlockwise runs the right side forwards
        let (out, _) = mix(&mut ctrl, DriveDemand::new(0.0, 0.0, 0.4));
        assert_eq!(out.to_array(), [-0.2, -0.2, 0.2, 0.2]);
    }

    #[test]
    fn test_invalid_config() {
        let sig = DriveSignature::default();
        assert_eq!(
            LocoCtrl::new(&sig, X_MOVEMENT, Y_MOVEMENT, 0.0).unwrap_err(),
            LocoCtrlError::InvalidMaxPower(0.0)
        );
        assert_eq!(
            LocoCtrl::new(&sig, X_MOVEMENT, -1.0, 1.0).unwrap_err(),
            LocoCtrlError::InvalidMovement(X_MOVEMENT, -1.0)
        );
    }
}
