//! # Trajectory control module
//!
//! Trajectory control keeps the robot on the target path and brings it to
//! rest at the end. Each cycle the pose of the robot is compared against the
//! current path segment to find three errors:
//!
//! - the translational error to the closest point on the path,
//! - the heading error to the target heading at that point,
//! - the velocity error along the path, against the speed from which the
//!   robot can still brake to a stop at the end of the segment.
//!
//! A PIDF loop acts on each error. The drive loop is backed by a feedforward
//! model of the drivetrain, and a centripetal term keeps the robot from
//! sliding off the outside of curves. The combined demand is mixed into
//! wheel powers by `loco_ctrl`.
//!
//! A segment completes when the convergence evaluator is satisfied or times
//! out, at which point the next segment in the chain starts with all
//! controller state cleared.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod centripetal;
pub mod controllers;
pub mod convergence;
pub mod feedforward;
pub mod params;
pub mod pidf;
pub mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use controllers::*;
pub use convergence::*;
pub use params::{ConfigError, Params};
pub use pidf::{AxisController, PidfCoeffs, PidfController};
pub use state::*;
