//! # Path
//!
//! This module defines the interface between the follower and the paths it
//! follows.
//!
//! Path geometry is produced elsewhere, all the follower needs is a parametric
//! [`Curve`] over `t` in `[0, 1]` which can report its point, derivatives and
//! length. A [`Path`] pairs a curve with the heading the robot should hold
//! along it, and a [`PathChain`] is the ordered list of paths making up one
//! follow command.
//!
//! Straight lines and circular arcs are provided here since they are all the
//! executable's route files need. Any other curve can be followed by
//! implementing [`Curve`].

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, sync::Arc};

// Internal
use util::maths::{get_ang_dist, wrap_pi};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Paths shorter than this are rejected, the tangent of a path this short is
/// dominated by numerical noise.
pub const MIN_PATH_LENGTH: f64 = 1e-6;

/// Number of evenly spaced samples used to seed the generic closest point
/// search.
const CLOSEST_T_COARSE_SAMPLES: usize = 16;

/// Maximum number of Newton refinement steps for the closest point search.
const CLOSEST_T_MAX_ITERS: usize = 10;

/// Newton refinement stops once the step in `t` is below this value.
const CLOSEST_T_TOLERANCE: f64 = 1e-9;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A parametric curve in the field frame, parameterised by `t` in `[0, 1]`.
pub trait Curve: Debug + Send + Sync {
    /// Point on the curve at `t`.
    fn point(&self, t: f64) -> Vector2<f64>;

    /// First derivative of the curve with respect to `t`.
    fn derivative(&self, t: f64) -> Vector2<f64>;

    /// Second derivative of the curve with respect to `t`.
    fn second_derivative(&self, t: f64) -> Vector2<f64>;

    /// Arc length of the whole curve.
    fn length(&self) -> f64;

    /// Signed curvature at `t`, positive when the curve turns anticlockwise.
    fn curvature(&self, t: f64) -> f64 {
        let d = self.derivative(t);
        let dd = self.second_derivative(t);
        let speed = d.norm();

        if speed < MIN_PATH_LENGTH {
            return 0.0;
        }

        (d[0] * dd[1] - d[1] * dd[0]) / speed.powi(3)
    }

    /// Find the parameter of the point on the curve closest to `point`.
    ///
    /// `hint` is the value found on the previous cycle. The default
    /// implementation seeds a Newton search on `(P(t) - p) . P'(t) = 0` from
    /// the best of the hint and a coarse set of samples.
    fn closest_t(&self, point: &Vector2<f64>, hint: f64) -> f64 {
        let dist_sq = |t: f64| (self.point(t) - point).norm_squared();

        let mut best_t = hint.max(0.0).min(1.0);
        let mut best_dist = dist_sq(best_t);

        for i in 0..=CLOSEST_T_COARSE_SAMPLES {
            let t = i as f64 / CLOSEST_T_COARSE_SAMPLES as f64;
            let d = dist_sq(t);
            if d < best_dist {
                best_t = t;
                best_dist = d;
            }
        }

        let mut t = best_t;
        for _ in 0..CLOSEST_T_MAX_ITERS {
            let offset = self.point(t) - point;
            let d = self.derivative(t);
            let f = offset.dot(&d);
            let df = d.norm_squared() + offset.dot(&self.second_derivative(t));

            if df.abs() < std::f64::EPSILON {
                break;
            }

            let next = (t - f / df).max(0.0).min(1.0);
            let step = (next - t).abs();
            t = next;

            if step < CLOSEST_T_TOLERANCE {
                break;
            }
        }

        // Newton can walk away from the seed on strongly curved sections, so
        // only keep the refined value if it is actually closer.
        if dist_sq(t) <= best_dist {
            t
        }
        else {
            best_t
        }
    }
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A straight line between two points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub start: Vector2<f64>,
    pub end: Vector2<f64>,
}

/// An arc of a circle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircularArc {
    pub center: Vector2<f64>,
    pub radius: f64,

    /// Angle from the centre to the start point.
    pub start_angle_rad: f64,

    /// Angle swept by the arc, positive for an anticlockwise arc.
    pub sweep_rad: f64,
}

/// A path the robot can follow: a curve plus the heading to hold along it.
#[derive(Debug, Clone)]
pub struct Path {
    curve: Arc<dyn Curve>,
    heading: HeadingInterp,
}

/// An ordered sequence of paths followed as a single command.
#[derive(Debug, Clone)]
pub struct PathChain {
    paths: Vec<Path>,
}

/// Description of a route, as loaded from a route file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSpec {
    /// If true the robot keeps correcting onto the end pose of the last
    /// segment once it is reached.
    #[serde(default)]
    pub hold_end: bool,

    pub segments: Vec<PathSpec>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// How the target heading varies along a path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HeadingInterp {
    /// Hold a fixed heading.
    Constant { heading_rad: f64 },

    /// Turn from `start_rad` to `end_rad` in proportion to progress, taking
    /// the shortest direction.
    Linear { start_rad: f64, end_rad: f64 },

    /// Face along the path.
    Tangential,
}

/// A single segment in a route file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PathSpec {
    Line {
        start: [f64; 2],
        end: [f64; 2],
        heading: HeadingInterp,
    },
    Arc {
        start: [f64; 2],
        start_heading_rad: f64,
        radius: f64,
        sweep_rad: f64,
        heading: HeadingInterp,
    },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PathError {
    #[error("The path has zero length")]
    ZeroLength,

    #[error("The path contains non-finite values")]
    NonFinite,

    #[error("Attempted to create a path chain from an empty sequence")]
    EmptySequence,

    #[error("Arc radius must be positive, found {0}")]
    InvalidRadius(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Line {
    pub fn new(start: Vector2<f64>, end: Vector2<f64>) -> Self {
        Self { start, end }
    }
}

impl Curve for Line {
    fn point(&self, t: f64) -> Vector2<f64> {
        self.start + (self.end - self.start) * t
    }

    fn derivative(&self, _t: f64) -> Vector2<f64> {
        self.end - self.start
    }

    fn second_derivative(&self, _t: f64) -> Vector2<f64> {
        Vector2::zeros()
    }

    fn length(&self) -> f64 {
        (self.end - self.start).norm()
    }

    fn curvature(&self, _t: f64) -> f64 {
        0.0
    }

    fn closest_t(&self, point: &Vector2<f64>, _hint: f64) -> f64 {
        let dir = self.end - self.start;
        let len_sq = dir.norm_squared();

        if len_sq == 0.0 {
            return 0.0;
        }

        ((point - self.start).dot(&dir) / len_sq).max(0.0).min(1.0)
    }
}

impl CircularArc {
    /// Build an arc which starts at `start` travelling along `start_heading_rad`.
    ///
    /// A positive sweep turns left (anticlockwise), a negative sweep right.
    pub fn from_start(
        start: Vector2<f64>,
        start_heading_rad: f64,
        radius: f64,
        sweep_rad: f64,
    ) -> Self {
        // Unit vector to the left of the direction of travel
        let left = Vector2::new(-start_heading_rad.sin(), start_heading_rad.cos());
        let side = if sweep_rad >= 0.0 { 1.0 } else { -1.0 };

        let center = start + left * radius * side;
        let start_angle_rad = wrap_pi(start_heading_rad - side * std::f64::consts::FRAC_PI_2);

        Self {
            center,
            radius,
            start_angle_rad,
            sweep_rad,
        }
    }

    fn angle_at(&self, t: f64) -> f64 {
        self.start_angle_rad + self.sweep_rad * t
    }
}

impl Curve for CircularArc {
    fn point(&self, t: f64) -> Vector2<f64> {
        let a = self.angle_at(t);
        self.center + Vector2::new(a.cos(), a.sin()) * self.radius
    }

    fn derivative(&self, t: f64) -> Vector2<f64> {
        let a = self.angle_at(t);
        Vector2::new(-a.sin(), a.cos()) * self.radius * self.sweep_rad
    }

    fn second_derivative(&self, t: f64) -> Vector2<f64> {
        let a = self.angle_at(t);
        Vector2::new(a.cos(), a.sin()) * (-self.radius * self.sweep_rad.powi(2))
    }

    fn length(&self) -> f64 {
        self.radius * self.sweep_rad.abs()
    }

    fn curvature(&self, _t: f64) -> f64 {
        if self.sweep_rad == 0.0 {
            0.0
        }
        else {
            self.sweep_rad.signum() / self.radius
        }
    }

    fn closest_t(&self, point: &Vector2<f64>, hint: f64) -> f64 {
        let offset = point - self.center;

        // At the centre every point is equally close
        if offset.norm() < MIN_PATH_LENGTH || self.sweep_rad == 0.0 {
            return hint.max(0.0).min(1.0);
        }

        // Measure the angle relative to the middle of the arc so that points
        // beyond either end clamp to the nearer end.
        let mid_angle = self.angle_at(0.5);
        let rel = get_ang_dist(mid_angle, offset[1].atan2(offset[0]));

        (0.5 + rel / self.sweep_rad).max(0.0).min(1.0)
    }
}

impl HeadingInterp {
    /// Target heading at `t` given the path tangent at `t`.
    pub fn heading_at(&self, t: f64, tangent: &Vector2<f64>) -> f64 {
        match *self {
            HeadingInterp::Constant { heading_rad } => wrap_pi(heading_rad),
            HeadingInterp::Linear { start_rad, end_rad } => {
                wrap_pi(start_rad + get_ang_dist(start_rad, end_rad) * t)
            }
            HeadingInterp::Tangential => tangent[1].atan2(tangent[0]),
        }
    }
}

impl Path {
    /// Create a new path, checking the curve is usable.
    pub fn new<C: Curve + 'static>(curve: C, heading: HeadingInterp) -> Result<Self, PathError> {
        let length = curve.length();

        if !length.is_finite()
            || !is_finite_vec(&curve.point(0.0))
            || !is_finite_vec(&curve.point(1.0))
        {
            return Err(PathError::NonFinite);
        }

        if length < MIN_PATH_LENGTH {
            return Err(PathError::ZeroLength);
        }

        Ok(Self {
            curve: Arc::new(curve),
            heading,
        })
    }

    /// A straight line path.
    pub fn line(
        start: Vector2<f64>,
        end: Vector2<f64>,
        heading: HeadingInterp,
    ) -> Result<Self, PathError> {
        Self::new(Line::new(start, end), heading)
    }

    /// Convert from a [`PathSpec`] into a new path.
    pub fn from_path_spec(spec: &PathSpec) -> Result<Self, PathError> {
        match *spec {
            PathSpec::Line { start, end, heading } => Self::line(
                Vector2::new(start[0], start[1]),
                Vector2::new(end[0], end[1]),
                heading,
            ),
            PathSpec::Arc {
                start,
                start_heading_rad,
                radius,
                sweep_rad,
                heading,
            } => {
                if !(radius > 0.0) {
                    return Err(PathError::InvalidRadius(radius));
                }

                Self::new(
                    CircularArc::from_start(
                        Vector2::new(start[0], start[1]),
                        start_heading_rad,
                        radius,
                        sweep_rad,
                    ),
                    heading,
                )
            }
        }
    }

    pub fn point(&self, t: f64) -> Vector2<f64> {
        self.curve.point(t)
    }

    /// Unit tangent at `t`, or zero if the curve is stationary there.
    pub fn tangent(&self, t: f64) -> Vector2<f64> {
        let d = self.curve.derivative(t);
        let n = d.norm();

        if n < MIN_PATH_LENGTH {
            Vector2::zeros()
        }
        else {
            d / n
        }
    }

    pub fn curvature(&self, t: f64) -> f64 {
        self.curve.curvature(t)
    }

    pub fn length(&self) -> f64 {
        self.curve.length()
    }

    pub fn closest_t(&self, point: &Vector2<f64>, hint: f64) -> f64 {
        self.curve.closest_t(point, hint)
    }

    /// Target heading at `t`.
    pub fn target_heading(&self, t: f64) -> f64 {
        self.heading.heading_at(t, &self.curve.derivative(t))
    }

    pub fn end_point(&self) -> Vector2<f64> {
        self.curve.point(1.0)
    }

    pub fn end_heading(&self) -> f64 {
        self.target_heading(1.0)
    }
}

impl PathChain {
    pub fn new(paths: Vec<Path>) -> Result<Self, PathError> {
        if paths.is_empty() {
            return Err(PathError::EmptySequence);
        }

        Ok(Self { paths })
    }

    /// Build a chain from a route file description.
    pub fn from_route_spec(route: &RouteSpec) -> Result<Self, PathError> {
        let paths = route
            .segments
            .iter()
            .map(Path::from_path_spec)
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(paths)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn get(&self, index: usize) -> Option<&Path> {
        self.paths.get(index)
    }

    pub fn last(&self) -> &Path {
        // A chain is never empty, see `new`
        &self.paths[self.paths.len() - 1]
    }
}

impl From<Path> for PathChain {
    fn from(path: Path) -> Self {
        Self { paths: vec![path] }
    }
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

fn is_finite_vec(v: &Vector2<f64>) -> bool {
    v[0].is_finite() && v[1].is_finite()
}
