//! # Trajectory controllers module
//!
//! This module provides the controllers used by the follower, including their
//! error calculations.
//!
//! Three loops act on the robot:
//!
//! - Translational: the error from the robot to the closest point on the
//!   path, with the along track part removed while the robot is part way
//!   along the segment. The PIDF acts on the error magnitude and its output is
//!   applied along the error direction.
//! - Heading: the shortest angle from the robot heading to the target heading.
//! - Drive: the error between the velocity from which the robot could still
//!   brake to a stop at the end of the segment and its actual velocity along
//!   the path, plus the feedforward power to sustain that velocity.
//!
//! The translational, drive and centripetal contributions are summed in the
//! field frame, then rotated into the robot frame to give the drive demand.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use nalgebra::{Rotation2, Vector2};
use serde::Serialize;

// Internal
use super::{
    centripetal::CentripetalCompensator, feedforward::FeedforwardModel, pidf::AxisController,
    Params,
};
use crate::{loc::RobotState, loco_ctrl::DriveDemand, path::Path};
use util::maths::get_ang_dist;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Errors between the robot and a path segment on one cycle.
#[derive(Debug, Clone, Copy)]
pub struct SegmentErrors {
    /// Parametric progress of the closest point on the path
    pub t: f64,

    /// Unit tangent at `t`, field frame
    pub tangent: Vector2<f64>,

    /// Signed curvature at `t`
    pub curvature: f64,

    /// Vector from the robot to the point it's correcting towards, field
    /// frame
    pub translational: Vector2<f64>,

    /// Target heading minus robot heading, wrapped to (-pi, pi]
    pub heading_rad: f64,

    /// Distance left to travel along the path. Negative once the robot has
    /// passed the end.
    pub remaining: f64,

    /// Straight line distance to the end point
    pub dist_to_end: f64,
}

/// Outputs of the individual loops, for the status report.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct LoopOutputs {
    pub translational_power: f64,
    pub heading_power: f64,
    pub drive_power: f64,
    pub drive_target_velocity: f64,
    pub centripetal_power: f64,
}

/// The trajectory controllers
#[derive(Debug, Clone, Serialize)]
pub struct TrajControllers {
    /// Translational error controller
    translational: AxisController,

    /// Heading error controller
    heading: AxisController,

    /// Path velocity controller
    drive: AxisController,

    feedforward: FeedforwardModel,
    centripetal: CentripetalCompensator,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SegmentErrors {
    /// Calculate the errors to a path segment.
    ///
    /// `t` must be the parametric progress of the closest point to the robot.
    pub fn following(path: &Path, t: f64, state: &RobotState) -> Self {
        let position = state.pose.position();
        let tangent = path.tangent(t);

        // Part way along the segment only the cross track error is
        // corrected, the drive loop handles the along track part.
        let mut translational = path.point(t) - position;
        if t > 0.0 && t < 1.0 {
            translational -= tangent * translational.dot(&tangent);
        }

        let end = path.end_point();
        let remaining = if t < 1.0 {
            path.length() * (1.0 - t)
        }
        else {
            (end - position).dot(&path.tangent(1.0))
        };

        Self {
            t,
            tangent,
            curvature: path.curvature(t),
            translational,
            heading_rad: get_ang_dist(state.pose.heading_rad, path.target_heading(t)),
            remaining,
            dist_to_end: (end - position).norm(),
        }
    }

    /// Calculate the errors to the end pose of a path.
    pub fn holding(path: &Path, state: &RobotState) -> Self {
        let position = state.pose.position();
        let end = path.end_point();

        Self {
            t: 1.0,
            tangent: path.tangent(1.0),
            curvature: 0.0,
            translational: end - position,
            heading_rad: get_ang_dist(state.pose.heading_rad, path.end_heading()),
            remaining: 0.0,
            dist_to_end: (end - position).norm(),
        }
    }
}

impl TrajControllers {
    /// Create a new instance of the controllers from the parameters
    pub fn new(params: &Params) -> Self {
        Self {
            translational: AxisController::from_params(&params.translational),
            heading: AxisController::from_params(&params.heading),
            drive: AxisController::from_params(&params.drive),
            feedforward: FeedforwardModel::new(&params.dynamics),
            centripetal: CentripetalCompensator::new(&params.dynamics),
        }
    }

    /// Clear the state of every controller.
    pub fn reset(&mut self) {
        self.translational.reset();
        self.heading.reset();
        self.drive.reset();
    }

    /// Integral accumulations of the translational, heading and drive
    /// controllers.
    pub fn integrals(&self) -> [f64; 3] {
        [
            self.translational.integral(),
            self.heading.integral(),
            self.drive.integral(),
        ]
    }

    /// Get the drive demand for the errors on this cycle.
    ///
    /// If `drive` is false only the translational and heading loops act, which
    /// is used to hold the robot at the end of a chain.
    pub fn get_drive_demand(
        &mut self,
        errors: &SegmentErrors,
        state: &RobotState,
        drive: bool,
    ) -> (DriveDemand, LoopOutputs) {
        let time_s = state.time_s;
        let mut outputs = LoopOutputs::default();

        // Translational
        let trans_mag = errors.translational.norm();
        outputs.translational_power = self.translational.update(trans_mag, 0.0, time_s);
        let mut field = if trans_mag > 0.0 {
            errors.translational / trans_mag * outputs.translational_power
        }
        else {
            Vector2::zeros()
        };

        // Heading
        outputs.heading_power = self.heading.update(errors.heading_rad, 0.0, time_s);

        if drive {
            // Direction of travel in the robot frame, needed as the robot is
            // faster and brakes differently forwards than sideways.
            let robot_tangent = Rotation2::new(-state.pose.heading_rad) * errors.tangent;

            let target_velocity = self
                .feedforward
                .stopping_velocity(errors.remaining, &robot_tangent);
            let path_velocity = state.velocity.linear().dot(&errors.tangent);

            outputs.drive_target_velocity = target_velocity;
            outputs.drive_power = self.drive.update(
                target_velocity - path_velocity,
                target_velocity,
                time_s,
            ) + self
                .feedforward
                .steady_state_power(target_velocity, &robot_tangent);

            let centripetal = self.centripetal.correction(
                state.velocity.speed(),
                errors.curvature,
                &errors.tangent,
            );
            outputs.centripetal_power = centripetal.norm();

            field += errors.tangent * outputs.drive_power + centripetal;
        }

        let robot = Rotation2::new(-state.pose.heading_rad) * field;

        trace!(
            "TrajCtrl loops: trans {:.4}, head {:.4}, drive {:.4} (v* {:.2})",
            outputs.translational_power,
            outputs.heading_power,
            outputs.drive_power,
            outputs.drive_target_velocity
        );

        (
            DriveDemand::new(robot[0], robot[1], outputs.heading_power),
            outputs,
        )
    }
}
