//! # Follower library.
//!
//! This library allows other crates in the workspace, the executable and the benchmarks to access
//! the items defined inside the follower crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Control loop - samples the pose, runs the follower and writes the wheel powers once per cycle
pub mod control_loop;

/// Localisation module - validates the poses provided by the localiser
pub mod loc;

/// Locomotion control module - mixes drive demands into the four mecanum wheel powers
pub mod loco_ctrl;

/// Paths - the curves the robot follows and the chains they are grouped into
pub mod path;

/// Simulated mecanum robot used by the executable, the tests and the benchmarks
pub mod sim;

/// Trajectory control module - keeps the robot on the given path
pub mod traj_ctrl;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Modules which log on every control cycle, filtered at their own level by the executable
pub const CYCLE_LOG_TARGETS: &[&str] = &[
    "follower_lib::traj_ctrl::controllers",
    "follower_lib::loco_ctrl",
    "follower_lib::sim",
];
