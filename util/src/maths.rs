//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::{Float, FloatConst};

/// Sign of a value, with zero (of either sign) mapping to zero.
///
/// `Float::signum` returns `1` for `+0.0`, which would turn a zero error into
/// a full static-friction kick.
pub fn sign<T>(value: T) -> T
where
    T: Float
{
    if value == T::zero() {
        T::zero()
    }
    else {
        value.signum()
    }
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
/// 
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()` if `lhs` is much smaller than `rhs.abs()` in
/// magnitude and `lhs < 0.0`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}

/// Wrap an angle into the range (-pi, pi].
pub fn wrap_pi<T>(angle: T) -> T
where
    T: Float + FloatConst
{
    let pi_t: T = T::PI();
    let tau_t: T = pi_t + pi_t;

    // rem_euclid gives [0, 2pi), shifting by pi first gives [-pi, pi), which
    // is then flipped at the lower bound.
    let wrapped = rem_euclid(angle + pi_t, tau_t) - pi_t;

    if wrapped <= -pi_t {
        wrapped + tau_t
    }
    else {
        wrapped
    }
}

/// Get the signed shortest angular distance to travel from `from` to `to`.
///
/// Positive distances are anticlockwise (right hand rule about Z+).
pub fn get_ang_dist<T>(from: T, to: T) -> T
where
    T: Float + FloatConst
{
    wrap_pi(to - from)
}

#[cfg(test)]
mod test {
    use super::*;

    const PI: f64 = std::f64::consts::PI;
    const TAU: f64 = std::f64::consts::TAU;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_wrap_pi() {
        assert!(approx(wrap_pi(0f64), 0.0));
        assert!(approx(wrap_pi(PI), PI));
        assert!(approx(wrap_pi(-PI), PI));
        assert!(approx(wrap_pi(TAU + 1.0), 1.0));
        assert!(approx(wrap_pi(-TAU - 1.0), -1.0));
        assert!(approx(wrap_pi(3.0 * PI / 2.0), -PI / 2.0));
    }

    #[test]
    fn test_get_ang_dist() {
        assert!(approx(get_ang_dist(1f64, 2f64), 1.0));
        assert!(approx(get_ang_dist(2f64, 1f64), -1.0));
        assert!(approx(get_ang_dist(0f64, TAU), 0.0));
        assert!(approx(get_ang_dist(PI - 0.1, -PI + 0.1), 0.2));
        assert!(approx(get_ang_dist(-PI + 0.1, PI - 0.1), -0.2));
    }

    #[test]
    fn test_sign() {
        assert_eq!(sign(0f64), 0.0);
        assert_eq!(sign(-0f64), 0.0);
        assert_eq!(sign(-3.2f64), -1.0);
        assert_eq!(sign(0.001f64), 1.0);
    }
}
