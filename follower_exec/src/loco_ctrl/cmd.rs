//! Commands passed into and out of LocoCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;
use std::fmt;

// Internal
use super::NUM_WHEELS;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A demand on the drivetrain in the robot frame.
///
/// All values are normalised powers, X is forward, Y is left and the turn is
/// anticlockwise positive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct DriveDemand {
    pub axial: f64,
    pub lateral: f64,
    pub turn: f64,
}

/// Power for each of the four wheels, in [-1, 1].
///
/// The four powers are always produced and written together.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct WheelPowers {
    pub left_front: f64,
    pub left_rear: f64,
    pub right_front: f64,
    pub right_rear: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The wheels of the robot, in the order used for all arrays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wheel {
    LeftFront,
    LeftRear,
    RightFront,
    RightRear,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Wheel {
    pub const ALL: [Wheel; NUM_WHEELS] = [
        Wheel::LeftFront,
        Wheel::LeftRear,
        Wheel::RightFront,
        Wheel::RightRear,
    ];
}

impl fmt::Display for Wheel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Wheel::LeftFront => "left front",
            Wheel::LeftRear => "left rear",
            Wheel::RightFront => "right front",
            Wheel::RightRear => "right rear",
        };
        write!(f, "{}", name)
    }
}

impl DriveDemand {
    pub fn new(axial: f64, lateral: f64, turn: f64) -> Self {
        Self {
            axial,
            lateral,
            turn,
        }
    }
}

impl WheelPowers {
    /// All wheels stopped.
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn from_array(p: [f64; NUM_WHEELS]) -> Self {
        Self {
            left_front: p[0],
            left_rear: p[1],
            right_front: p[2],
            right_rear: p[3],
        }
    }

    pub fn to_array(&self) -> [f64; NUM_WHEELS] {
        [
            self.left_front,
            self.left_rear,
            self.right_front,
            self.right_rear,
        ]
    }

    pub fn get(&self, wheel: Wheel) -> f64 {
        match wheel {
            Wheel::LeftFront => self.left_front,
            Wheel::LeftRear => self.left_rear,
            Wheel::RightFront => self.right_front,
            Wheel::RightRear => self.right_rear,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.to_array().iter().all(|p| *p == 0.0)
    }
}
