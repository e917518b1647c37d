//! # Simulated robot
//!
//! A simple model of a mecanum robot used to exercise the follower without
//! hardware. It stands in for both the localiser (as a `PoseSource`) and the
//! motors (as a `DriveActuator`).
//!
//! The model is kinematic with a first order lag: the wheel powers set a
//! demanded body velocity through the forward kinematics of the drivetrain,
//! and the actual velocity approaches it with the configured response time.
//! Motor polarity from the drive signature is undone here, as the real motors
//! would, so a wiring mistake in the signature shows up as the robot driving
//! the wrong way.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use log::trace;
use nalgebra::{Rotation2, Vector2};
use serde::{Deserialize, Serialize};

// Internal
use crate::{
    control_loop::DriveActuator,
    loc::{Pose, PoseSnapshot, PoseSource, Velocity},
    loco_ctrl::{DriveSignature, WheelPowers, NUM_WHEELS},
};
use util::maths::wrap_pi;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters of the simulated robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimParams {
    /// Period between simulation steps.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// Time constant of the velocity response.
    ///
    /// Units: seconds
    pub response_time_s: f64,

    /// Forward speed at full power.
    ///
    /// Units: inches/second
    pub x_movement: f64,

    /// Strafe speed at full power.
    ///
    /// Units: inches/second
    pub y_movement: f64,

    /// Turn rate at full turn power.
    ///
    /// Units: radians/second
    pub max_turn_rate_rads: f64,

    /// If false the pose samples carry no velocity, so it must be derived
    /// from consecutive poses.
    #[serde(default = "default_report_velocity")]
    pub report_velocity: bool,

    /// Pose of the robot at the start of the simulation.
    pub start_pose: Pose,

    /// Periods during which the localiser provides no data.
    #[serde(default)]
    pub dropouts: Vec<Dropout>,
}

/// A period in which no pose samples are available.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dropout {
    pub start_s: f64,
    pub end_s: f64,
}

#[derive(Debug, Clone)]
pub struct SimRobot {
    params: SimParams,

    /// Sign of each motor
    polarity: [f64; NUM_WHEELS],

    pose: Pose,

    /// Field frame velocity
    velocity: Velocity,

    time_s: f64,

    /// Last powers written by the controller
    powers: WheelPowers,

    /// Number of writes received
    num_writes: u64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for SimParams {
    fn default() -> Self {
        Self {
            cycle_period_s: 0.01,
            response_time_s: 0.05,
            x_movement: 82.502272993526,
            y_movement: 67.042469589951,
            max_turn_rate_rads: 4.0,
            report_velocity: true,
            start_pose: Pose::default(),
            dropouts: Vec::new(),
        }
    }
}

impl Dropout {
    pub fn contains(&self, time_s: f64) -> bool {
        time_s >= self.start_s && time_s < self.end_s
    }
}

impl SimRobot {
    /// Create a new simulated robot at the start pose in the parameters.
    pub fn new(params: &SimParams, signature: &DriveSignature) -> Self {
        Self {
            params: params.clone(),
            polarity: signature.polarity(),
            pose: params.start_pose,
            velocity: Velocity::default(),
            time_s: 0.0,
            powers: WheelPowers::zero(),
            num_writes: 0,
        }
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn velocity(&self) -> Velocity {
        self.velocity
    }

    pub fn time_s(&self) -> f64 {
        self.time_s
    }

    /// The powers most recently written to the motors.
    pub fn powers(&self) -> WheelPowers {
        self.powers
    }

    pub fn num_writes(&self) -> u64 {
        self.num_writes
    }

    /// Advance the simulation by one cycle period.
    pub fn step(&mut self) {
        let dt_s = self.params.cycle_period_s;
        self.step_by(dt_s)
    }

    /// Advance the simulation by `dt_s` seconds.
    pub fn step_by(&mut self, dt_s: f64) {
        // Powers as seen by the wheels once the motor direction is applied
        let mut w = self.powers.to_array();
        for (p, sign) in w.iter_mut().zip(self.polarity.iter()) {
            *p *= sign;
        }
        let [lf, lr, rf, rr] = w;

        // Forward kinematics, the inverse of the mixer
        let body = Vector2::new(
            (lf + lr + rf + rr) / 4.0 * self.params.x_movement,
            (-lf + lr + rf - rr) / 4.0 * self.params.y_movement,
        );
        let omega_dem = (-lf - lr + rf + rr) / 4.0 * self.params.max_turn_rate_rads;
        let field = Rotation2::new(self.pose.heading_rad) * body;

        let alpha = if self.params.response_time_s > 0.0 {
            (dt_s / self.params.response_time_s).min(1.0)
        }
        else {
            1.0
        };

        self.velocity.vx += (field[0] - self.velocity.vx) * alpha;
        self.velocity.vy += (field[1] - self.velocity.vy) * alpha;
        self.velocity.omega_rads += (omega_dem - self.velocity.omega_rads) * alpha;

        self.pose.x += self.velocity.vx * dt_s;
        self.pose.y += self.velocity.vy * dt_s;
        self.pose.heading_rad = wrap_pi(self.pose.heading_rad + self.velocity.omega_rads * dt_s);
        self.time_s += dt_s;

        trace!(
            "Sim t = {:.3}: pose ({:.3}, {:.3}, {:.4})",
            self.time_s,
            self.pose.x,
            self.pose.y,
            self.pose.heading_rad
        );
    }
}

impl PoseSource for SimRobot {
    fn sample(&mut self) -> Option<PoseSnapshot> {
        if self.params.dropouts.iter().any(|d| d.contains(self.time_s)) {
            return None;
        }

        Some(PoseSnapshot {
            pose: self.pose,
            velocity: if self.params.report_velocity {
                Some(self.velocity)
            }
            else {
                None
            },
            time_s: self.time_s,
        })
    }
}

impl DriveActuator for SimRobot {
    fn write(&mut self, powers: &WheelPowers) {
        self.powers = *powers;
        self.num_writes += 1;
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn default_report_velocity() -> bool {
    true
}
