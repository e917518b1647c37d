//! # Control loop
//!
//! Runs one follower cycle at a time against a robot: sample the pose, run
//! the follower, write the four wheel powers. Cycles never overlap, and the
//! emergency stop flag is only looked at between them, so the motors always
//! receive a complete set of powers.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::warn;
use std::{
    convert::Infallible,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

// Internal
use crate::{
    loc::PoseSource,
    loco_ctrl::WheelPowers,
    traj_ctrl::{CompletionReason, FollowState, Follower, InputData, StatusReport},
};
use util::module::State;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// The motors of the robot.
///
/// All four powers are written in one call. Implementations must not block.
pub trait DriveActuator {
    fn write(&mut self, powers: &WheelPowers);
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct ControlLoop<R> {
    follower: Follower,
    robot: R,
    stop: Arc<AtomicBool>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The result of one control cycle.
#[derive(Debug, Clone, Copy)]
pub enum CycleOutcome {
    /// Following, holding, or idle.
    Continue(StatusReport),

    /// The chain has finished and the robot is not holding its end pose.
    Finished(CompletionReason, StatusReport),

    /// The emergency stop was raised, zero power has been written and the
    /// loop must not run again.
    Stopped,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<R> ControlLoop<R>
where
    R: PoseSource + DriveActuator,
{
    pub fn new(follower: Follower, robot: R) -> Self {
        Self {
            follower,
            robot,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The emergency stop flag, which may be raised from any thread.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn follower(&self) -> &Follower {
        &self.follower
    }

    pub fn follower_mut(&mut self) -> &mut Follower {
        &mut self.follower
    }

    pub fn robot(&self) -> &R {
        &self.robot
    }

    pub fn robot_mut(&mut self) -> &mut R {
        &mut self.robot
    }

    /// Run a single cycle.
    pub fn run_cycle(&mut self) -> CycleOutcome {
        if self.stop.load(Ordering::SeqCst) {
            warn!("Emergency stop, zeroing all wheels");
            self.robot.write(&WheelPowers::zero());
            self.follower.abort();
            return CycleOutcome::Stopped;
        }

        let input = InputData {
            snapshot: self.robot.sample(),
        };

        let (powers, report) = match self.follower.proc(&input) {
            Ok(r) => r,
            Err(e) => {
                let e: Infallible = e;
                match e {}
            }
        };

        self.robot.write(&powers);

        match self.follower.state() {
            FollowState::Done(reason) => CycleOutcome::Finished(reason, report),
            _ => CycleOutcome::Continue(report),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::loc::Pose;
    use crate::path::{HeadingInterp, Path, PathChain};
    use crate::sim::{SimParams, SimRobot};
    use crate::traj_ctrl::Params;
    use nalgebra::Vector2;

    fn control_loop() -> ControlLoop<SimRobot> {
        let params = Params::default();
        let mut follower = Follower::new(&params).unwrap();
        let robot = SimRobot::new(&SimParams::default(), &params.drive_signature);

        let path = Path::line(
            Vector2::zeros(),
            Vector2::new(100.0, 0.0),
            HeadingInterp::Constant { heading_rad: 0.0 },
        )
        .unwrap();
        follower.follow(PathChain::from(path), false).unwrap();

        ControlLoop::new(follower, robot)
    }

    #[test]
    fn test_runs_to_completion() {
        let mut cl = control_loop();

        let mut outcome = None;
        for _ in 0..1000 {
            match cl.run_cycle() {
                CycleOutcome::Continue(_) => cl.robot_mut().step(),
                CycleOutcome::Finished(reason, _) => {
                    outcome = Some(reason);
                    break;
                }
                CycleOutcome::Stopped => panic!("Unexpected stop"),
            }
        }

        assert_eq!(outcome, Some(CompletionReason::Converged));
        assert!(cl.robot().pose().x > 99.9);
        assert!(cl.robot().powers().is_zero());
    }

    #[test]
    fn test_emergency_stop() {
        let mut cl = control_loop();
        let stop = cl.stop_flag();

        for _ in 0..20 {
            cl.run_cycle();
            cl.robot_mut().step();
        }
        assert!(!cl.robot().powers().is_zero());
        let writes = cl.robot().num_writes();

        // Raised from another thread mid run
        std::thread::spawn(move || stop.store(true, Ordering::SeqCst))
            .join()
            .unwrap();

        assert!(matches!(cl.run_cycle(), CycleOutcome::Stopped));
        assert!(cl.robot().powers().is_zero());
        assert_eq!(cl.robot().num_writes(), writes + 1);
        assert_eq!(
            cl.follower().state(),
            FollowState::Done(CompletionReason::Aborted)
        );
        assert_ne!(cl.robot().pose(), Pose::default());
    }
}
