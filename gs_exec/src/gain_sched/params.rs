//! Parameters structure for the gain schedule

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;
use util::maths::linspace;

use super::InterpMethod;
use crate::lqr::LqrWeights;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the gain schedule design.
#[derive(Debug, Clone, Deserialize)]
pub struct Params {

    // ---- GRID ----

    /// Desired speeds at which gains are designed.
    ///
    /// Units: meters/second
    pub speeds_ms: Vec<f64>,

    /// Lowest desired heading of the grid.
    ///
    /// Units: radians
    pub heading_min_rad: f64,

    /// Highest desired heading of the grid.
    ///
    /// Units: radians
    pub heading_max_rad: f64,

    /// Number of evenly spaced headings between the limits, inclusive.
    pub num_headings: usize,

    // ---- WEIGHTS ----

    /// Diagonal of the LQR state weight.
    pub q_diag: Vec<f64>,

    /// Diagonal of the LQR input weight.
    pub r_diag: Vec<f64>,

    // ---- INTERPOLATION ----

    pub method: InterpMethod,

    /// Controller input signals forming the scheduling point, in axis order.
    pub schedule_on: Vec<String>
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Values along each grid axis, speed first.
    pub fn grid_axes(&self) -> Vec<Vec<f64>> {
        vec![
            self.speeds_ms.clone(),
            linspace(self.heading_min_rad, self.heading_max_rad, self.num_headings)
        ]
    }

    pub fn weights(&self) -> LqrWeights {
        LqrWeights::from_diagonals(&self.q_diag, &self.r_diag)
    }
}
