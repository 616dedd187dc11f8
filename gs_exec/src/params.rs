//! # Executable Parameters
//!
//! Parameters for the gain-scheduled tracking executable, loaded from
//! `gs_exec.toml`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use crate::{gain_sched, plant::VehicleParams, sim, traj_gen};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct GsExecParams {
    #[serde(default)]
    pub vehicle: VehicleParams,

    pub gain_sched: gain_sched::Params,

    pub traj_gen: traj_gen::Params,

    pub sim: sim::Params,

    pub initial_state: InitialState
}

/// Initial pose of the vehicle.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct InitialState {
    /// Units: meters
    pub x_m: f64,

    /// Units: meters
    pub y_m: f64,

    /// Units: radians
    pub theta_rad: f64
}

impl InitialState {
    pub fn to_vec(&self) -> Vec<f64> {
        vec![self.x_m, self.y_m, self.theta_rad]
    }
}
