//! Main follower executable entry point.
//!
//! # Architecture
//!
//! The executable drives the path follower against the simulated mecanum robot:
//!
//!     - Load the follower, simulation and route parameters
//!     - Build the path chain and start following it
//!     - Main loop:
//!         - Control loop cycle (pose sampling, trajectory control, locomotion control, wheel
//!           power write)
//!         - Archive the status report
//!         - Step the simulation
//!         - Cycle management
//!     - Save a summary of the run into the session
//!
//! # Modules
//!
//! All cyclic modules (e.g. `traj_ctrl`) shall provide a public struct implementing the
//! `util::module::State` trait.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{info, warn};
use serde::Serialize;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};
use structopt::StructOpt;

// Internal
use follower_lib::{
    control_loop::{ControlLoop, CycleOutcome},
    loc::Pose,
    path::{PathChain, RouteSpec},
    sim::{SimParams, SimRobot},
    traj_ctrl::{CompletionReason, FollowPhase, Follower, Params, StatusReport},
    CYCLE_LOG_TARGETS,
};
use util::{
    archive::Archiver,
    logger::{logger_init, LevelFilter, LogLevels},
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Longest allowed control cycle.
const MAX_CYCLE_PERIOD_S: f64 = 0.02;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Follow a route with the simulated mecanum robot.
#[derive(Debug, StructOpt)]
#[structopt(name = "follower_exec")]
struct Opts {
    /// Follower parameter file, relative to the params directory
    #[structopt(long, default_value = "follower.toml")]
    params: String,

    /// Simulated robot parameter file, relative to the params directory
    #[structopt(long, default_value = "sim.toml")]
    sim: String,

    /// Route file, relative to the params directory
    #[structopt(long, default_value = "route.toml")]
    route: String,

    /// Control cycle period in seconds, overriding the one in the simulation parameters
    #[structopt(long)]
    cycle_period_s: Option<f64>,

    /// Pace the loop in real time rather than running as fast as possible
    #[structopt(long)]
    realtime: bool,

    /// Number of cycles after which the emergency stop is raised
    #[structopt(long, default_value = "6000")]
    max_cycles: u64,

    /// How long to hold the end of the route, if the route holds its end, before stopping
    #[structopt(long, default_value = "2.0")]
    hold_s: f64,

    /// Log the controller, locomotion and simulation state on every cycle
    #[structopt(long)]
    trace: bool,
}

/// Summary of a run, saved into the session directory.
#[derive(Debug, Serialize)]
struct RunSummary {
    num_cycles: u64,

    /// How the route completed, or `None` if it didn't
    completion: Option<CompletionReason>,

    /// True if the run was ended by the emergency stop
    stopped: bool,

    final_pose: Pose,
    sim_time_s: f64,
    num_saturated_cycles: u64,
    num_sensor_fault_cycles: u64,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("follower_exec", "sessions")
        .wrap_err("Failed to create the session")?;

    // Initialise logger, per cycle output only when asked for
    let levels = LogLevels {
        min_level: LevelFilter::Debug,
        cycle_targets: CYCLE_LOG_TARGETS,
        cycle_level: if opts.trace {
            LevelFilter::Trace
        }
        else {
            LevelFilter::Info
        },
    };
    logger_init(&levels, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Mecanum Path Follower Executable\n");
    info!("Options: {:?}", opts);
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let params: Params =
        util::params::load(&opts.params).wrap_err("Could not load follower params")?;

    let mut sim_params: SimParams =
        util::params::load(&opts.sim).wrap_err("Could not load simulation params")?;

    if let Some(period) = opts.cycle_period_s {
        sim_params.cycle_period_s = period;
    }
    if !(sim_params.cycle_period_s > 0.0 && sim_params.cycle_period_s <= MAX_CYCLE_PERIOD_S) {
        return Err(eyre!(
            "The cycle period must be in (0, {}] s, found {} s",
            MAX_CYCLE_PERIOD_S,
            sim_params.cycle_period_s
        ));
    }

    let route: RouteSpec = util::params::load(&opts.route).wrap_err("Could not load the route")?;

    if !params.localizer.is_simulated() {
        warn!(
            "The {:?} localiser is configured but only the simulated robot is available, \
             poses will come from the simulation",
            params.localizer
        );
    }

    info!("Parameters loaded");

    // ---- INITIALISE MODULES ----

    let chain = PathChain::from_route_spec(&route).wrap_err("The route is invalid")?;
    info!(
        "Route of {} segment(s), ending at {:?}",
        chain.len(),
        chain.last().end_point()
    );

    let mut follower = Follower::new(&params).wrap_err("Failed to initialise the follower")?;
    follower
        .follow(chain, route.hold_end)
        .wrap_err("Failed to start following the route")?;

    let robot = SimRobot::new(&sim_params, &params.drive_signature);

    let mut control_loop = ControlLoop::new(follower, robot);
    let stop = control_loop.stop_flag();

    let mut archiver = Archiver::from_path(&session, "follower.csv")
        .wrap_err("Failed to create the follower archive")?;

    info!("Module initialisation complete\n");

    // ---- MAIN LOOP ----

    info!("Beginning main loop\n");

    let cycle_period = Duration::from_secs_f64(sim_params.cycle_period_s);
    let mut summary = RunSummary {
        num_cycles: 0,
        completion: None,
        stopped: false,
        final_pose: control_loop.robot().pose(),
        sim_time_s: 0.0,
        num_saturated_cycles: 0,
        num_sensor_fault_cycles: 0,
    };
    let mut hold_start_s = None;

    loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // ---- CONTROL ----

        let report = match control_loop.run_cycle() {
            CycleOutcome::Continue(report) => report,
            CycleOutcome::Finished(reason, report) => {
                info!("Route complete: {:?}", reason);
                summary.completion = Some(reason);
                record(&mut summary, &mut archiver, &report);
                break;
            }
            CycleOutcome::Stopped => {
                summary.stopped = true;
                break;
            }
        };

        record(&mut summary, &mut archiver, &report);

        // Once holding, keep going for the hold duration then stop
        if report.phase == FollowPhase::Holding {
            if summary.completion.is_none() {
                info!("Route complete: {:?}, holding the end", report.reason);
                summary.completion = report.reason;
            }

            let start = *hold_start_s.get_or_insert(report.time_s);
            if report.time_s - start >= opts.hold_s {
                info!("Hold time elapsed, stopping");
                stop.store(true, Ordering::SeqCst);
            }
        }

        if summary.num_cycles >= opts.max_cycles && !stop.load(Ordering::SeqCst) {
            warn!("Cycle limit of {} reached, stopping", opts.max_cycles);
            stop.store(true, Ordering::SeqCst);
        }

        // ---- SIMULATION ----

        control_loop.robot_mut().step();

        // ---- CYCLE MANAGEMENT ----

        if opts.realtime {
            let cycle_dur = Instant::now() - cycle_start_instant;

            match cycle_period.checked_sub(cycle_dur) {
                Some(d) => thread::sleep(d),
                None => warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - cycle_period.as_secs_f64()
                ),
            }
        }
    }

    // ---- SHUTDOWN ----

    summary.final_pose = control_loop.robot().pose();
    summary.sim_time_s = control_loop.robot().time_s();

    info!(
        "Finished after {} cycles ({:.02} s), final pose {:?}",
        summary.num_cycles, summary.sim_time_s, summary.final_pose
    );

    session
        .save_json("summary.json", &summary)
        .wrap_err("Failed to save the run summary")?;

    info!("End of execution");

    Ok(())
}

/// Archive a cycle's status report and count it in the summary.
fn record(summary: &mut RunSummary, archiver: &mut Archiver, report: &StatusReport) {
    summary.num_cycles += 1;

    if report.saturated {
        summary.num_saturated_cycles += 1;
    }
    if report.sensor_fault {
        summary.num_sensor_fault_cycles += 1;
    }

    if let Err(e) = archiver.serialise(report) {
        warn!("Could not archive the status report: {}", e);
    }
}
