//! Tracking error monitoring

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;
use util::maths::wrap_pi;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Tracking errors of a planar vehicle relative to its desired pose.
#[derive(Debug, Default, Copy, Clone, Serialize)]
pub struct StatusReport {
    /// Error across the desired heading, positive to the left.
    ///
    /// Units: meters
    pub lat_error_m: f64,

    /// Error along the desired heading, positive ahead of the target.
    ///
    /// Units: meters
    pub long_error_m: f64,

    /// Heading error wrapped into `[-pi, pi)`.
    ///
    /// Units: radians
    pub head_error_rad: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl StatusReport {
    /// Compute the errors of the pose `(x, y, theta)` against the desired pose
    /// `(xd, yd, thetad)`.
    pub fn from_poses(pose: [f64; 3], desired: [f64; 3]) -> Self {
        let (ex, ey) = (pose[0] - desired[0], pose[1] - desired[1]);
        let (s, c) = desired[2].sin_cos();

        Self {
            lat_error_m: -s * ex + c * ey,
            long_error_m: c * ex + s * ey,
            head_error_rad: wrap_pi(pose[2] - desired[2])
        }
    }
}
