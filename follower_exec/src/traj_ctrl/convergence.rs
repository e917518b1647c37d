//! # Convergence evaluation
//!
//! Decides when the robot has finished the current segment. A segment is
//! converged when the parametric progress, distance to the end point, heading
//! error and speed are all within the drive constraints on the same cycle. If
//! that doesn't happen within the timeout the segment is forced to complete
//! with a distinct reason so the caller can tell the two apart.
//!
//! The timeout counts either from segment entry or from the progress first
//! reaching `t_value`. Independently of that, no segment may last longer than
//! `segment_timeout_ms` from entry, so a robot which stalls short of the end
//! still completes.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
use super::params::{DriveConstraints, TimeoutOrigin};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Quantities the evaluator looks at on each cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvergenceInput {
    /// Parametric progress along the segment
    pub t: f64,

    /// Distance from the robot to the end point of the segment
    pub dist_to_end: f64,

    /// Heading error, radians
    pub heading_error_rad: f64,

    /// Linear speed of the robot
    pub speed: f64,

    /// Time of the pose sample, seconds
    pub time_s: f64,
}

#[derive(Debug, Clone)]
pub struct ConvergenceEvaluator {
    constraints: DriveConstraints,

    /// Time of the first evaluation on this segment
    start_time_s: Option<f64>,

    /// Time at which the progress constraint was first met
    t_end_time_s: Option<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// State of the follower.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum FollowState {
    /// No path loaded
    Idle,

    /// Following the given segment of the chain
    Following { segment: usize },

    /// The chain is complete, the end pose is being held
    Holding(CompletionReason),

    /// The chain is complete
    Done(CompletionReason),
}

/// Flat version of `FollowState` for status reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FollowPhase {
    Idle,
    Following,
    Holding,
    Done,
}

/// Why a segment or chain completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompletionReason {
    /// All constraints were met
    Converged,

    /// The constraints were not met before the timeout
    Timeout,

    /// Too many consecutive cycles without valid pose data
    SensorFault,

    /// Stopped by the caller
    Aborted,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FollowState {
    pub fn phase(&self) -> FollowPhase {
        match self {
            FollowState::Idle => FollowPhase::Idle,
            FollowState::Following { .. } => FollowPhase::Following,
            FollowState::Holding(_) => FollowPhase::Holding,
            FollowState::Done(_) => FollowPhase::Done,
        }
    }

    /// The completion reason, if the chain has completed.
    pub fn reason(&self) -> Option<CompletionReason> {
        match self {
            FollowState::Holding(r) | FollowState::Done(r) => Some(*r),
            _ => None,
        }
    }

    /// True once the chain is complete, whether or not the end is being held.
    pub fn is_complete(&self) -> bool {
        self.reason().is_some()
    }
}

impl Default for FollowPhase {
    fn default() -> Self {
        FollowPhase::Idle
    }
}

impl ConvergenceEvaluator {
    pub fn new(constraints: DriveConstraints) -> Self {
        Self {
            constraints,
            start_time_s: None,
            t_end_time_s: None,
        }
    }

    /// Forget all timing, ready for a new segment.
    pub fn reset(&mut self) {
        self.start_time_s = None;
        self.t_end_time_s = None;
    }

    /// True if every constraint holds for this input.
    pub fn constraints_met(&self, input: &ConvergenceInput) -> bool {
        let c = &self.constraints;

        input.t >= c.t_value
            && input.dist_to_end <= c.translational
            && input.heading_error_rad.abs() <= c.heading_rad
            && input.speed <= c.velocity
    }

    /// Seconds elapsed since the timeout started counting, if it has.
    pub fn timeout_elapsed_s(&self, time_s: f64) -> Option<f64> {
        let origin = match self.constraints.timeout_origin {
            TimeoutOrigin::SegmentStart => self.start_time_s,
            TimeoutOrigin::ParametricEnd => self.t_end_time_s,
        };

        origin.map(|t0| time_s - t0)
    }

    /// Evaluate one cycle, returning the reason the segment has completed or
    /// `None` if it's still in progress.
    pub fn evaluate(&mut self, input: &ConvergenceInput) -> Option<CompletionReason> {
        if self.start_time_s.is_none() {
            self.start_time_s = Some(input.time_s);
        }

        if self.t_end_time_s.is_none() && input.t >= self.constraints.t_value {
            self.t_end_time_s = Some(input.time_s);
        }

        if self.constraints_met(input) {
            return Some(CompletionReason::Converged);
        }

        let timed_out = match self.timeout_elapsed_s(input.time_s) {
            Some(e) => e > self.constraints.timeout_s(),
            None => false,
        };
        let segment_timed_out = match self.start_time_s {
            Some(t0) => input.time_s - t0 > self.constraints.segment_timeout_s(),
            None => false,
        };

        if timed_out || segment_timed_out {
            Some(CompletionReason::Timeout)
        }
        else {
            None
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::traj_ctrl::Params;

    fn input(t: f64, dist_to_end: f64, heading_error_rad: f64, speed: f64, time_s: f64) -> ConvergenceInput {
        ConvergenceInput {
            t,
            dist_to_end,
            heading_error_rad,
            speed,
            time_s,
        }
    }

    #[test]
    fn test_converged_needs_all_constraints() {
        let mut eval = ConvergenceEvaluator::new(Params::default().constraints);

        assert_eq!(eval.evaluate(&input(0.99, 0.05, 0.0, 0.0, 0.0)), None);
        assert_eq!(eval.evaluate(&input(1.0, 0.2, 0.0, 0.0, 0.01)), None);
        assert_eq!(eval.evaluate(&input(1.0, 0.05, -0.01, 0.0, 0.02)), None);
        assert_eq!(eval.evaluate(&input(1.0, 0.05, 0.0, 0.2, 0.03)), None);
        assert_eq!(
            eval.evaluate(&input(0.996, 0.05, -0.005, 0.05, 0.04)),
            Some(CompletionReason::Converged)
        );
    }

    #[test]
    fn test_timeout_from_parametric_end() {
        let mut eval = ConvergenceEvaluator::new(Params::default().constraints);

        // A long way from the end the short timeout doesn't apply
        assert_eq!(eval.evaluate(&input(0.5, 50.0, 0.1, 10.0, 0.0)), None);
        assert_eq!(eval.evaluate(&input(0.6, 40.0, 0.1, 10.0, 5.0)), None);

        // Heading never settles once at the end
        let mut time_s = 6.0;
        let mut reason = None;
        while reason.is_none() && time_s < 8.0 {
            reason = eval.evaluate(&input(1.0, 0.01, 0.1, 0.0, time_s));
            time_s += 0.01;
        }

        assert_eq!(reason, Some(CompletionReason::Timeout));
        assert!(time_s - 6.0 > 0.5 && time_s - 6.0 < 0.53);
    }

    #[test]
    fn test_segment_timeout_short_of_the_end() {
        let constraints = Params::default().constraints;
        let mut eval = ConvergenceEvaluator::new(constraints);

        // Stuck half way along, progress never reaches t_value
        assert_eq!(eval.evaluate(&input(0.5, 50.0, 0.0, 0.0, 1.0)), None);
        assert_eq!(eval.evaluate(&input(0.5, 50.0, 0.0, 0.0, 10.9)), None);
        assert_eq!(eval.timeout_elapsed_s(10.9), None);
        assert_eq!(
            eval.evaluate(&input(0.5, 50.0, 0.0, 0.0, 11.01)),
            Some(CompletionReason::Timeout)
        );
    }

    #[test]
    fn test_timeout_from_segment_start() {
        let mut constraints = Params::default().constraints;
        constraints.timeout_origin = TimeoutOrigin::SegmentStart;
        let mut eval = ConvergenceEvaluator::new(constraints);

        assert_eq!(eval.evaluate(&input(0.0, 100.0, 0.0, 0.0, 3.0)), None);
        assert_eq!(eval.evaluate(&input(0.1, 90.0, 0.0, 30.0, 3.5)), None);
        assert_eq!(
            eval.evaluate(&input(0.2, 80.0, 0.0, 30.0, 3.51)),
            Some(CompletionReason::Timeout)
        );

        // After a reset the clock starts again
        eval.reset();
        assert_eq!(eval.evaluate(&input(0.2, 80.0, 0.0, 30.0, 3.6)), None);
    }

    #[test]
    fn test_follow_state() {
        assert!(!FollowState::Idle.is_complete());
        assert!(!FollowState::Following { segment: 2 }.is_complete());
        assert_eq!(
            FollowState::Holding(CompletionReason::Timeout).reason(),
            Some(CompletionReason::Timeout)
        );
        assert_eq!(
            FollowState::Done(CompletionReason::Aborted).phase(),
            FollowPhase::Done
        );
    }
}
