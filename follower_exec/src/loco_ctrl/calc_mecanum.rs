//! Mecanum inverse kinematics

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use super::{DriveDemand, LocoCtrl, NUM_WHEELS};

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LocoCtrl {
    /// Calculate the raw (unnormalised, unsigned) wheel powers for a demand.
    ///
    /// Wheel order is LF, LR, RF, RR. The lateral demand is scaled up by the
    /// ratio of forward to strafe top speed since the rollers lose more to
    /// slip when strafing.
    pub(crate) fn calc_mecanum(&self, demand: &DriveDemand) -> [f64; NUM_WHEELS] {
        let a = demand.axial;
        let l = demand.lateral * self.strafe_ratio;
        let r = demand.turn;

        [a - l - r, a + l - r, a + l + r, a - l + r]
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Scale the powers down so none exceeds unit magnitude.
///
/// All wheels are divided by the same factor so the ratios between them are
/// kept. Returns true if scaling was needed.
pub(crate) fn normalise(powers: &mut [f64; NUM_WHEELS]) -> bool {
    let max = powers.iter().fold(0.0, |m: f64, p| m.max(p.abs()));

    if max > 1.0 {
        for p in powers.iter_mut() {
            *p /= max;
        }
        true
    }
    else {
        false
    }
}
