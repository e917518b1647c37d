//! # Localisation module
//!
//! This module defines the pose and velocity of the robot and the narrow
//! interface through which the external localiser (odometry pods, optical
//! tracker, or the simulation) provides them.
//!
//! The localiser itself is not part of this software. `LocMgr` takes the raw
//! snapshots it produces, rejects anything missing, stale or non-finite, and
//! derives a velocity from consecutive poses when the localiser doesn't
//! provide one. The result is a `RobotState` which is owned by the control
//! loop for exactly one cycle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// Internal
use util::maths::{get_ang_dist, wrap_pi};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The pose of the robot on the field.
///
/// Positions are in field units (inches for the tuned parameters), the heading
/// is the angle to the field's +X axis, anticlockwise positive, normalised to
/// (-pi, pi].
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub heading_rad: f64,
}

/// Velocity of the robot in the field frame.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Velocity {
    /// Field X velocity
    pub vx: f64,

    /// Field Y velocity
    pub vy: f64,

    /// Angular rate, anticlockwise positive
    pub omega_rads: f64,
}

/// A single sample from the localiser.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseSnapshot {
    pub pose: Pose,

    /// Velocity measured by the localiser, or `None` if it only reports
    /// position.
    pub velocity: Option<Velocity>,

    /// Time the sample was taken at.
    ///
    /// Units: seconds, on the same clock as every other sample.
    pub time_s: f64,
}

/// Validated state of the robot for one control cycle.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Default)]
pub struct RobotState {
    pub pose: Pose,
    pub velocity: Velocity,
    pub time_s: f64,
}

/// Provides an interface for the localisation system of the robot.
#[derive(Debug, Clone, Default)]
pub struct LocMgr {
    /// The last valid state, used for staleness checks and velocity
    /// derivation.
    last: Option<RobotState>,
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A source of robot poses.
///
/// Implementations must not block, if no new data is available `None` shall
/// be returned.
pub trait PoseSource {
    fn sample(&mut self) -> Option<PoseSnapshot>;
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The localiser backend fitted to the robot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocSource {
    /// Two dead wheels read by a pinpoint odometry computer with built in IMU
    Pinpoint,
    ThreeWheel,
    /// Two dead wheels and the hub IMU
    TwoWheel,
    DriveEncoders,
    /// Optical tracking sensor
    Otos,
    Simulated,
}

/// A fault in the data provided by the pose source.
#[derive(Debug, Copy, Clone, PartialEq, thiserror::Error)]
pub enum SensorFault {
    #[error("The pose source provided no data")]
    NoData,

    #[error("The pose sample at {time_s} s is not newer than the last sample at {last_time_s} s")]
    Stale { time_s: f64, last_time_s: f64 },

    #[error("The pose sample contains non-finite values")]
    NonFinite,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    /// Create a new pose, normalising the heading.
    pub fn new(x: f64, y: f64, heading_rad: f64) -> Self {
        Self {
            x,
            y,
            heading_rad: wrap_pi(heading_rad),
        }
    }

    /// Position of the robot as a vector.
    pub fn position(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    /// Unit vector pointing in the direction the robot is facing.
    pub fn forward(&self) -> Vector2<f64> {
        Vector2::new(self.heading_rad.cos(), self.heading_rad.sin())
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.heading_rad.is_finite()
    }
}

impl Velocity {
    pub fn new(vx: f64, vy: f64, omega_rads: f64) -> Self {
        Self { vx, vy, omega_rads }
    }

    /// The linear part of the velocity.
    pub fn linear(&self) -> Vector2<f64> {
        Vector2::new(self.vx, self.vy)
    }

    /// Magnitude of the linear velocity.
    pub fn speed(&self) -> f64 {
        self.vx.hypot(self.vy)
    }

    pub fn is_finite(&self) -> bool {
        self.vx.is_finite() && self.vy.is_finite() && self.omega_rads.is_finite()
    }
}

impl LocSource {
    /// True if this executable can drive the source. Only the simulated robot
    /// is available off the robot.
    pub fn is_simulated(&self) -> bool {
        *self == LocSource::Simulated
    }
}

impl LocMgr {
    /// The last valid state accepted by the manager.
    pub fn last(&self) -> Option<&RobotState> {
        self.last.as_ref()
    }

    /// Validate a new snapshot and build the state for this cycle.
    ///
    /// A rejected snapshot leaves the previous state untouched so that
    /// velocity derivation picks up again once valid data returns.
    pub fn update(&mut self, snapshot: Option<&PoseSnapshot>) -> Result<RobotState, SensorFault> {
        let snapshot = snapshot.ok_or(SensorFault::NoData)?;

        if !snapshot.pose.is_finite()
            || !snapshot.time_s.is_finite()
            || !snapshot.velocity.map_or(true, |v| v.is_finite())
        {
            return Err(SensorFault::NonFinite);
        }

        if let Some(last) = self.last {
            if snapshot.time_s <= last.time_s {
                return Err(SensorFault::Stale {
                    time_s: snapshot.time_s,
                    last_time_s: last.time_s,
                });
            }
        }

        let pose = Pose::new(snapshot.pose.x, snapshot.pose.y, snapshot.pose.heading_rad);

        // Use the measured velocity if there is one, otherwise difference the
        // last two poses. With no previous pose assume we're stationary.
        let velocity = match (snapshot.velocity, self.last) {
            (Some(v), _) => v,
            (None, Some(last)) => {
                let dt = snapshot.time_s - last.time_s;
                Velocity {
                    vx: (pose.x - last.pose.x) / dt,
                    vy: (pose.y - last.pose.y) / dt,
                    omega_rads: get_ang_dist(last.pose.heading_rad, pose.heading_rad) / dt,
                }
            }
            (None, None) => Velocity::default(),
        };

        let state = RobotState {
            pose,
            velocity,
            time_s: snapshot.time_s,
        };
        self.last = Some(state);

        Ok(state)
    }
}
