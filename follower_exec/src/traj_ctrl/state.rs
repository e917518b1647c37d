//! Trajectory control module state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use serde::Serialize;
use std::convert::Infallible;

// Internal
use super::*;
use crate::{
    loc::{LocMgr, PoseSnapshot, RobotState, SensorFault},
    loco_ctrl::{LocoCtrl, WheelPowers},
    path::{Path, PathChain},
};
use util::module::State;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The path follower.
///
/// Built once from the parameters, then given path chains to follow with
/// [`Follower::follow`]. [`State::proc`] must be called once per control
/// cycle and always returns a set of wheel powers.
#[derive(Debug, Clone)]
pub struct Follower {
    params: Params,

    loc: LocMgr,

    /// Controller objects used to calculate drive demands
    controllers: TrajControllers,

    evaluator: ConvergenceEvaluator,

    loco_ctrl: LocoCtrl,

    /// The chain being followed or held
    chain: Option<PathChain>,

    /// If true hold the end pose of the chain once it completes
    hold_end: bool,

    state: FollowState,

    /// Parametric progress on the previous cycle, used to seed the closest
    /// point search
    closest_t: f64,

    /// Output of the previous cycle
    last_output: WheelPowers,

    consecutive_faults: u32,
}

/// Input data to the module
#[derive(Debug, Copy, Clone, Default)]
pub struct InputData {
    /// The latest sample from the pose source, or `None` if there wasn't one
    pub snapshot: Option<PoseSnapshot>,
}

/// The status report containing various error flags and monitoring quantities.
#[derive(Debug, Copy, Clone, Default, Serialize)]
pub struct StatusReport {
    pub time_s: f64,

    pub phase: FollowPhase,
    pub reason: Option<CompletionReason>,
    pub segment: Option<usize>,

    /// Pose and speed of the robot, from the last valid sample
    pub x: f64,
    pub y: f64,
    pub heading_rad: f64,
    pub speed: f64,

    /// Parametric progress along the segment
    pub t: f64,

    /// Magnitude of the translational error
    pub translational_error: f64,
    pub heading_error_rad: f64,
    pub dist_to_end: f64,

    pub drive_target_velocity: f64,
    pub translational_power: f64,
    pub heading_power: f64,
    pub drive_power: f64,

    /// True if the wheel powers had to be scaled down
    pub saturated: bool,

    /// True if the pose sample on this cycle was rejected
    pub sensor_fault: bool,

    pub left_front: f64,
    pub left_rear: f64,
    pub right_front: f64,
    pub right_rear: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TrajCtrlError {
    #[error("Invalid follower parameters: {0}")]
    InvalidParams(#[from] ConfigError),

    /// A chain is already loaded. This error occurs when attempting to start
    /// a new chain before the current one has finished.
    #[error("A path chain is already being followed")]
    SequenceAlreadyLoaded,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for Follower {
    type InputData = InputData;
    type OutputData = WheelPowers;
    type StatusReport = StatusReport;
    type ProcError = Infallible;

    /// Process trajectory control.
    ///
    /// Processing involves:
    ///  1. Validating the pose sample, handling any sensor fault.
    ///  1. Checking whether the current segment has converged, moving on to
    ///     the next one if it has.
    ///  1. Calculating the wheel powers for the current state.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let mut report = StatusReport::default();

        let update = self.loc.update(input_data.snapshot.as_ref());

        // Nothing to do without a chain. Pose data is still consumed so that
        // velocity derivation is ready when a chain arrives.
        if !self.is_active() {
            self.consecutive_faults = 0;
            self.last_output = WheelPowers::zero();
            self.fill_state(&mut report, update.ok().as_ref());
            return Ok((self.last_output, report));
        }

        let robot = match update {
            Ok(r) => {
                self.consecutive_faults = 0;
                r
            }
            Err(fault) => {
                let output = self.handle_sensor_fault(fault);
                report.sensor_fault = true;
                self.fill_state(&mut report, self.loc.last());
                fill_output(&mut report, &output);
                return Ok((output, report));
            }
        };

        // Check convergence on the current segment. Its errors drive this
        // cycle unless the segment completes.
        let mut target = None;
        if let FollowState::Following { segment } = self.state {
            if let Some(path) = self.segment_path(segment) {
                let errors = self.following_errors(&path, &robot);

                let conv = ConvergenceInput {
                    t: errors.t,
                    dist_to_end: errors.dist_to_end,
                    heading_error_rad: errors.heading_rad,
                    speed: robot.velocity.speed(),
                    time_s: robot.time_s,
                };

                match self.evaluator.evaluate(&conv) {
                    Some(reason) => self.complete_segment(segment, reason),
                    None => target = Some((errors, true)),
                }
            }
        }

        // After a completion calculate the demand for whatever state we're now in
        let target = match target {
            Some(t) => Some(t),
            None => match self.state {
                FollowState::Following { segment } => self
                    .segment_path(segment)
                    .map(|path| (self.following_errors(&path, &robot), true)),
                FollowState::Holding(_) => self
                    .chain
                    .as_ref()
                    .map(|c| (SegmentErrors::holding(c.last(), &robot), false)),
                FollowState::Idle | FollowState::Done(_) => None,
            },
        };

        let output = match target {
            Some((errors, drive)) => {
                let (demand, loops) = self.controllers.get_drive_demand(&errors, &robot, drive);
                let (output, loco_report) = self.loco_ctrl.proc(&demand)?;

                report.t = errors.t;
                report.translational_error = errors.translational.norm();
                report.heading_error_rad = errors.heading_rad;
                report.dist_to_end = errors.dist_to_end;
                report.drive_target_velocity = loops.drive_target_velocity;
                report.translational_power = loops.translational_power;
                report.heading_power = loops.heading_power;
                report.drive_power = loops.drive_power;
                report.saturated = loco_report.saturated;

                output
            }
            None => WheelPowers::zero(),
        };

        self.last_output = output;
        self.fill_state(&mut report, Some(&robot));
        fill_output(&mut report, &output);

        Ok((output, report))
    }
}

impl Follower {
    /// Create a new follower from the parameters.
    pub fn new(params: &Params) -> Result<Self, TrajCtrlError> {
        params.validate()?;

        let loco_ctrl = LocoCtrl::new(
            &params.drive_signature,
            params.dynamics.x_movement,
            params.dynamics.y_movement,
            params.max_power,
        )
        .map_err(ConfigError::from)?;

        Ok(Self {
            params: params.clone(),
            loc: LocMgr::default(),
            controllers: TrajControllers::new(params),
            evaluator: ConvergenceEvaluator::new(params.constraints),
            loco_ctrl,
            chain: None,
            hold_end: false,
            state: FollowState::Idle,
            closest_t: 0.0,
            last_output: WheelPowers::zero(),
            consecutive_faults: 0,
        })
    }

    pub fn state(&self) -> FollowState {
        self.state
    }

    pub fn controllers(&self) -> &TrajControllers {
        &self.controllers
    }

    /// Begin following a chain of paths.
    ///
    /// Following starts on the next call to `proc`. A new chain may be loaded
    /// while idle, done or holding the end of a previous chain, but not while
    /// a chain is being followed. To stop a chain early call `abort`.
    ///
    /// If `hold_end` is true the robot keeps correcting onto the end pose of
    /// the last path once the chain completes.
    pub fn follow(&mut self, chain: PathChain, hold_end: bool) -> Result<(), TrajCtrlError> {
        if let FollowState::Following { .. } = self.state {
            return Err(TrajCtrlError::SequenceAlreadyLoaded);
        }

        info!(
            "Following a chain of {} path(s){}",
            chain.len(),
            if hold_end { ", holding the end" } else { "" }
        );

        self.chain = Some(chain);
        self.hold_end = hold_end;
        self.consecutive_faults = 0;
        self.enter_segment(0);

        Ok(())
    }

    /// Abandon the current chain.
    ///
    /// The follower is done with reason `Aborted` and outputs zero power
    /// from then on.
    pub fn abort(&mut self) {
        if self.is_active() {
            warn!("Aborting path chain in state {:?}", self.state);
            self.finish(CompletionReason::Aborted);
        }
    }

    fn is_active(&self) -> bool {
        matches!(
            self.state,
            FollowState::Following { .. } | FollowState::Holding(_)
        )
    }

    fn segment_path(&self, segment: usize) -> Option<Path> {
        self.chain.as_ref().and_then(|c| c.get(segment)).cloned()
    }

    /// Errors against a path being followed, advancing the closest point.
    fn following_errors(&mut self, path: &Path, robot: &RobotState) -> SegmentErrors {
        let t = path.closest_t(&robot.pose.position(), self.closest_t);
        self.closest_t = t;
        SegmentErrors::following(path, t, robot)
    }

    /// Start following a segment with all controller state cleared.
    fn enter_segment(&mut self, segment: usize) {
        debug!("Entering segment {}", segment);

        self.controllers.reset();
        self.evaluator.reset();
        self.closest_t = 0.0;
        self.state = FollowState::Following { segment };
    }

    fn complete_segment(&mut self, segment: usize, reason: CompletionReason) {
        match reason {
            CompletionReason::Converged => info!("Segment {} converged", segment),
            _ => warn!("Segment {} ended with {:?}", segment, reason),
        }

        let num_segments = self.chain.as_ref().map_or(0, |c| c.len());

        if segment + 1 < num_segments {
            self.enter_segment(segment + 1);
        }
        else if self.hold_end {
            info!("Chain complete, holding end pose");
            self.controllers.reset();
            self.state = FollowState::Holding(reason);
        }
        else {
            info!("Chain complete");
            self.finish(reason);
        }
    }

    fn finish(&mut self, reason: CompletionReason) {
        self.chain = None;
        self.controllers.reset();
        self.last_output = WheelPowers::zero();
        self.state = FollowState::Done(reason);
    }

    /// Decide the output for a cycle with no valid pose.
    ///
    /// The first faulty cycle repeats the last output, further faults output
    /// zero power, and once the limit is exceeded the chain is abandoned.
    fn handle_sensor_fault(&mut self, fault: SensorFault) -> WheelPowers {
        self.consecutive_faults += 1;

        if self.consecutive_faults == 1 {
            debug!("Sensor fault ({}), holding last output", fault);
            self.last_output
        }
        else if self.consecutive_faults <= self.params.max_consecutive_sensor_faults {
            warn!(
                "Sensor fault ({}), {} in a row, stopping wheels",
                fault, self.consecutive_faults
            );
            self.last_output = WheelPowers::zero();
            self.last_output
        }
        else {
            warn!(
                "Sensor fault ({}), {} in a row, abandoning chain",
                fault, self.consecutive_faults
            );
            self.finish(CompletionReason::SensorFault);
            self.last_output
        }
    }

    fn fill_state(&self, report: &mut StatusReport, robot: Option<&RobotState>) {
        report.phase = self.state.phase();
        report.reason = self.state.reason();
        report.segment = match self.state {
            FollowState::Following { segment } => Some(segment),
            _ => None,
        };

        if let Some(r) = robot {
            report.time_s = r.time_s;
            report.x = r.pose.x;
            report.y = r.pose.y;
            report.heading_rad = r.pose.heading_rad;
            report.speed = r.velocity.speed();
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn fill_output(report: &mut StatusReport, output: &WheelPowers) {
    report.left_front = output.left_front;
    report.left_rear = output.left_rear;
    report.right_front = output.right_front;
    report.right_rear = output.right_rear;
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::control_loop::DriveActuator;
    use crate::loc::{Pose, PoseSource};
    use crate::path::{CircularArc, Curve, HeadingInterp, Line};
    use crate::sim::{Dropout, SimParams, SimRobot};
    use crate::traj_ctrl::params::TimeoutOrigin;
    use nalgebra::Vector2;
    use std::f64::consts::FRAC_PI_2;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    fn line(x0: f64, y0: f64, x1: f64, y1: f64) -> Path {
        Path::line(
            Vector2::new(x0, y0),
            Vector2::new(x1, y1),
            HeadingInterp::Constant { heading_rad: 0.0 },
        )
        .unwrap()
    }

    fn setup(params: &Params, sim_params: SimParams) -> (Follower, SimRobot) {
        (
            Follower::new(params).unwrap(),
            SimRobot::new(&sim_params, &params.drive_signature),
        )
    }

    fn cycle(f: &mut Follower, sim: &mut SimRobot) -> (WheelPowers, StatusReport) {
        let input = InputData {
            snapshot: sim.sample(),
        };
        let (out, report) = match f.proc(&input) {
            Ok(r) => r,
            Err(e) => match e {},
        };
        sim.write(&out);
        (out, report)
    }

    /// Run until done, returning the pose at the start of each cycle along
    /// with its output and report.
    fn run_to_done(
        f: &mut Follower,
        sim: &mut SimRobot,
        max_cycles: usize,
    ) -> Vec<(Pose, WheelPowers, StatusReport)> {
        let mut log = vec![];

        for _ in 0..max_cycles {
            let pose = sim.pose();
            let (out, report) = cycle(f, sim);
            log.push((pose, out, report));

            if let FollowState::Done(_) = f.state() {
                break;
            }
            sim.step();
        }

        log
    }

    #[test]
    fn test_straight_path() {
        let params = Params::default();
        let (mut f, mut sim) = setup(&params, SimParams::default());

        f.follow(line(0.0, 0.0, 100.0, 0.0).into(), false).unwrap();
        let log = run_to_done(&mut f, &mut sim, 2000);

        assert_eq!(f.state(), FollowState::Done(CompletionReason::Converged));

        let end = sim.pose();
        assert!(end.x >= 99.9);
        assert!(end.heading_rad.abs() <= 0.007);
        assert!(sim.velocity().speed() <= 0.1);

        // Done within the timeout of reaching the end of the path
        let t_end_s = log
            .iter()
            .find(|(_, _, r)| r.t >= 0.995)
            .map(|(_, _, r)| r.time_s)
            .unwrap();
        let done_s = log.last().unwrap().2.time_s;
        assert!(done_s - t_end_s <= 0.5);

        // The robot closes on the end without backing off until it's there
        let dists: Vec<f64> = log
            .iter()
            .map(|(p, _, _)| (Vector2::new(100.0, 0.0) - p.position()).norm())
            .collect();
        for w in dists.windows(2) {
            if w[0] <= 0.1 {
                break;
            }
            assert!(w[1] <= w[0] + 1e-9);
        }

        let xs: Vec<f64> = log
            .iter()
            .map(|(p, _, _)| p.x)
            .take_while(|x| *x < 99.9)
            .collect();
        assert!(xs.windows(2).all(|w| w[1] >= w[0]));

        // Zero power once done
        assert!(log.last().unwrap().1.is_zero());
    }

    #[test]
    fn test_cross_track_error_decreases() {
        let params = Params::default();
        let sim_params = SimParams {
            start_pose: Pose::new(0.0, 5.0, 0.0),
            ..SimParams::default()
        };
        let (mut f, mut sim) = setup(&params, sim_params);

        f.follow(line(0.0, 0.0, 100.0, 0.0).into(), false).unwrap();
        let log = run_to_done(&mut f, &mut sim, 2000);

        assert_eq!(f.state(), FollowState::Done(CompletionReason::Converged));

        let errors: Vec<f64> = log
            .iter()
            .filter(|(_, _, r)| r.phase == FollowPhase::Following && r.t < 1.0)
            .map(|(_, _, r)| r.translational_error)
            .collect();
        assert!(errors.len() > 10);
        assert!((errors[0] - 5.0).abs() < 1e-9);
        assert!(errors.windows(2).all(|w| w[1] <= w[0] + 1e-9));
    }

    #[test]
    fn test_derived_velocity() {
        let params = Params::default();
        let sim_params = SimParams {
            report_velocity: false,
            ..SimParams::default()
        };
        let (mut f, mut sim) = setup(&params, sim_params);

        f.follow(line(0.0, 0.0, 60.0, 0.0).into(), false).unwrap();
        run_to_done(&mut f, &mut sim, 2000);

        assert_eq!(f.state(), FollowState::Done(CompletionReason::Converged));
        assert!((sim.pose().x - 60.0).abs() <= 0.1);
    }

    #[test]
    fn test_timeout_from_segment_start() {
        let mut params = Params::default();
        params.constraints.timeout_origin = TimeoutOrigin::SegmentStart;

        // A robot that can't move never meets any constraint
        let sim_params = SimParams {
            x_movement: 0.0,
            y_movement: 0.0,
            max_turn_rate_rads: 0.0,
            ..SimParams::default()
        };
        let (mut f, mut sim) = setup(&params, sim_params);

        f.follow(line(0.0, 0.0, 100.0, 0.0).into(), false).unwrap();
        let log = run_to_done(&mut f, &mut sim, 2000);

        assert_eq!(f.state(), FollowState::Done(CompletionReason::Timeout));
        let done_s = log.last().unwrap().2.time_s;
        assert!(done_s > 0.5 && done_s < 0.52);
    }

    #[test]
    fn test_stalled_robot_times_out_with_defaults() {
        let params = Params::default();

        // Never gets near the end, so the short timeout never starts
        let sim_params = SimParams {
            x_movement: 0.0,
            y_movement: 0.0,
            max_turn_rate_rads: 0.0,
            ..SimParams::default()
        };
        let (mut f, mut sim) = setup(&params, sim_params);

        f.follow(line(0.0, 0.0, 100.0, 0.0).into(), false).unwrap();
        let log = run_to_done(&mut f, &mut sim, 2000);

        assert_eq!(f.state(), FollowState::Done(CompletionReason::Timeout));
        assert!(log.iter().all(|(_, _, r)| r.t < params.constraints.t_value));

        let done_s = log.last().unwrap().2.time_s;
        let limit_s = params.constraints.segment_timeout_s();
        assert!(done_s > limit_s && done_s < limit_s + 0.02);
    }

    #[test]
    fn test_timeout_from_parametric_end() {
        let params = Params::default();

        // At the end of the path but unable to fix the heading
        let sim_params = SimParams {
            max_turn_rate_rads: 0.0,
            start_pose: Pose::new(100.0, 0.0, 0.1),
            ..SimParams::default()
        };
        let (mut f, mut sim) = setup(&params, sim_params);

        f.follow(line(0.0, 0.0, 100.0, 0.0).into(), false).unwrap();
        let log = run_to_done(&mut f, &mut sim, 2000);

        assert_eq!(f.state(), FollowState::Done(CompletionReason::Timeout));
        let done_s = log.last().unwrap().2.time_s;
        assert!(done_s > 0.5 && done_s < 0.52);
    }

    #[test]
    fn test_integrals_reset_between_segments() {
        let mut params = Params::default();
        params.translational.primary.k_i = 0.001;
        params.heading.primary.k_i = 0.001;
        params.drive.primary.k_i = 0.001;

        let sim_params = SimParams {
            start_pose: Pose::new(0.0, 2.0, 0.1),
            ..SimParams::default()
        };
        let (mut f, mut sim) = setup(&params, sim_params);

        let chain =
            PathChain::new(vec![line(0.0, 0.0, 48.0, 0.0), line(48.0, 0.0, 48.0, 36.0)]).unwrap();
        f.follow(chain, false).unwrap();

        let mut prev_integrals = f.controllers().integrals();
        let mut transitions = 0;

        for _ in 0..3000 {
            let (_, report) = cycle(&mut f, &mut sim);

            if report.segment == Some(1) && transitions == 0 {
                transitions += 1;

                assert!(prev_integrals.iter().all(|i| *i != 0.0));
                assert_eq!(f.controllers().integrals(), [0.0; 3]);
                assert!(report.t < 0.1);
            }

            if f.state().is_complete() {
                break;
            }

            prev_integrals = f.controllers().integrals();
            sim.step();
        }

        assert_eq!(transitions, 1);
        assert!(f.state().is_complete());
    }

    /// A line which counts the closest point searches made on it.
    #[derive(Debug)]
    struct CountedLine {
        line: Line,
        searches: Arc<AtomicUsize>,
    }

    impl Curve for CountedLine {
        fn point(&self, t: f64) -> Vector2<f64> {
            self.line.point(t)
        }
        fn derivative(&self, t: f64) -> Vector2<f64> {
            self.line.derivative(t)
        }
        fn second_derivative(&self, t: f64) -> Vector2<f64> {
            self.line.second_derivative(t)
        }
        fn length(&self) -> f64 {
            self.line.length()
        }
        fn closest_t(&self, point: &Vector2<f64>, hint: f64) -> f64 {
            self.searches.fetch_add(1, Ordering::SeqCst);
            self.line.closest_t(point, hint)
        }
    }

    fn counted_line(x0: f64, y0: f64, x1: f64, y1: f64) -> (Path, Arc<AtomicUsize>) {
        let searches = Arc::new(AtomicUsize::new(0));
        let curve = CountedLine {
            line: Line::new(Vector2::new(x0, y0), Vector2::new(x1, y1)),
            searches: searches.clone(),
        };
        let path = Path::new(curve, HeadingInterp::Constant { heading_rad: 0.0 }).unwrap();
        (path, searches)
    }

    #[test]
    fn test_one_closest_point_search_per_cycle() {
        let params = Params::default();
        let (mut f, mut sim) = setup(&params, SimParams::default());

        let (first, first_searches) = counted_line(0.0, 0.0, 48.0, 0.0);
        let (second, second_searches) = counted_line(48.0, 0.0, 48.0, 36.0);
        f.follow(PathChain::new(vec![first, second]).unwrap(), false).unwrap();

        for n in 1..=10 {
            cycle(&mut f, &mut sim);
            sim.step();
            assert_eq!(first_searches.load(Ordering::SeqCst), n);
        }
        assert_eq!(second_searches.load(Ordering::SeqCst), 0);

        let log = run_to_done(&mut f, &mut sim, 3000);
        assert_eq!(f.state(), FollowState::Done(CompletionReason::Converged));

        // The cycle moving onto the second line searches both, every other
        // cycle searches only the line being followed
        let transitions = log
            .windows(2)
            .filter(|w| w[0].2.segment == Some(0) && w[1].2.segment != Some(0))
            .count();
        assert_eq!(transitions, 1);
        assert_eq!(
            first_searches.load(Ordering::SeqCst) + second_searches.load(Ordering::SeqCst),
            10 + log.len() + 1
        );
    }

    #[test]
    fn test_short_sensor_dropout() {
        let params = Params::default();
        let sim_params = SimParams {
            dropouts: vec![Dropout {
                start_s: 0.505,
                end_s: 0.525,
            }],
            ..SimParams::default()
        };
        let (mut f, mut sim) = setup(&params, sim_params);

        f.follow(line(0.0, 0.0, 100.0, 0.0).into(), false).unwrap();
        let log = run_to_done(&mut f, &mut sim, 2000);

        let first = log.iter().position(|(_, _, r)| r.sensor_fault).unwrap();
        assert_eq!(log.iter().filter(|(_, _, r)| r.sensor_fault).count(), 2);

        // First fault repeats the last output, the second stops the wheels
        assert!(!log[first - 1].1.is_zero());
        assert_eq!(log[first].1, log[first - 1].1);
        assert!(log[first + 1].1.is_zero());
        assert!(!log[first + 2].2.sensor_fault);
        assert!(!log[first + 2].1.is_zero());

        assert_eq!(f.state(), FollowState::Done(CompletionReason::Converged));
    }

    #[test]
    fn test_persistent_sensor_fault() {
        let params = Params::default();
        let sim_params = SimParams {
            dropouts: vec![Dropout {
                start_s: 0.505,
                end_s: 0.605,
            }],
            ..SimParams::default()
        };
        let (mut f, mut sim) = setup(&params, sim_params);

        f.follow(line(0.0, 0.0, 100.0, 0.0).into(), false).unwrap();
        let log = run_to_done(&mut f, &mut sim, 2000);

        assert_eq!(f.state(), FollowState::Done(CompletionReason::SensorFault));

        let faults: Vec<_> = log.iter().filter(|(_, _, r)| r.sensor_fault).collect();
        assert_eq!(faults.len(), params.max_consecutive_sensor_faults as usize + 1);
        assert!(faults[1..].iter().all(|(_, out, _)| out.is_zero()));
    }

    #[test]
    fn test_hold_end() {
        let params = Params::default();
        let (mut f, mut sim) = setup(&params, SimParams::default());

        f.follow(line(0.0, 0.0, 24.0, 0.0).into(), true).unwrap();

        let mut held = 0;
        for _ in 0..2000 {
            cycle(&mut f, &mut sim);
            if let FollowState::Holding(reason) = f.state() {
                assert_eq!(reason, CompletionReason::Converged);
                held += 1;
                if held > 200 {
                    break;
                }
            }
            sim.step();
        }

        assert!(held > 200);
        assert!((Vector2::new(24.0, 0.0) - sim.pose().position()).norm() <= 0.1);

        // A new chain can be loaded while holding, but not while following
        f.follow(line(24.0, 0.0, 48.0, 0.0).into(), false).unwrap();
        assert_eq!(f.state(), FollowState::Following { segment: 0 });
        assert!(matches!(
            f.follow(line(0.0, 0.0, 1.0, 0.0).into(), false),
            Err(TrajCtrlError::SequenceAlreadyLoaded)
        ));
    }

    #[test]
    fn test_abort() {
        let params = Params::default();
        let (mut f, mut sim) = setup(&params, SimParams::default());

        f.follow(line(0.0, 0.0, 100.0, 0.0).into(), false).unwrap();
        for _ in 0..10 {
            cycle(&mut f, &mut sim);
            sim.step();
        }

        f.abort();
        assert_eq!(f.state(), FollowState::Done(CompletionReason::Aborted));

        let (out, report) = cycle(&mut f, &mut sim);
        assert!(out.is_zero());
        assert_eq!(report.reason, Some(CompletionReason::Aborted));
    }

    #[test]
    fn test_arc() {
        let params = Params::default();
        let (mut f, mut sim) = setup(&params, SimParams::default());

        let arc = CircularArc::from_start(Vector2::zeros(), 0.0, 24.0, FRAC_PI_2);
        f.follow(
            Path::new(arc, HeadingInterp::Tangential).unwrap().into(),
            false,
        )
        .unwrap();
        let log = run_to_done(&mut f, &mut sim, 2000);

        assert_eq!(f.state(), FollowState::Done(CompletionReason::Converged));
        assert!((Vector2::new(24.0, 24.0) - sim.pose().position()).norm() <= 0.1);
        assert!((sim.pose().heading_rad - FRAC_PI_2).abs() <= 0.007);

        let max_error = log
            .iter()
            .map(|(_, _, r)| r.translational_error)
            .fold(0.0, f64::max);
        assert!(max_error < 1.0);
    }

    #[test]
    fn test_idle() {
        let params = Params::default();
        let (mut f, _) = setup(&params, SimParams::default());

        for _ in 0..10 {
            let (out, report) = match f.proc(&InputData::default()) {
                Ok(r) => r,
                Err(e) => match e {},
            };
            assert!(out.is_zero());
            assert_eq!(report.phase, FollowPhase::Idle);
        }
        assert_eq!(f.state(), FollowState::Idle);

        // Abort does nothing without a chain
        f.abort();
        assert_eq!(f.state(), FollowState::Idle);
    }

    #[test]
    fn test_invalid_params() {
        let mut params = Params::default();
        params.drive_signature.left_rear.name = params.drive_signature.left_front.name.clone();
        assert!(matches!(
            Follower::new(&params),
            Err(TrajCtrlError::InvalidParams(ConfigError::Drivetrain(_)))
        ));

        let mut params = Params::default();
        params.max_power = 1.5;
        assert!(Follower::new(&params).is_err());
    }
}
