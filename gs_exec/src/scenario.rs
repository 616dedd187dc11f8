//! # Kinematic car tracking scenario
//!
//! Builds the closed loop of a trajectory generator, the gain-scheduled
//! tracking controller and the kinematic car:
//!
//! ```text
//! trajgen --(xd, yd, thetad, vd, deltad)--> ctrl --(v, delta)--> vehicle
//!                                            ^                      |
//!                                            +----(x, y, theta)-----+
//! ```

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::sync::Arc;
use log::info;
use nalgebra::DVector;

// Internal
use crate::block::Block;
use crate::gain_sched::{self, GainSchedError, GainTable, SchedulingGrid};
use crate::interconnect::{Interconnect, InterconnectError};
use crate::params::GsExecParams;
use crate::plant::{vehicle, KinematicCar, PlantError};
use crate::sim::SimTrace;
use crate::traj_ctrl::{SignalLabels, StatusReport, TrajCtrlError, TrajTrackingBlock};
use crate::traj_gen::{self, TrajGenError};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Name of the tracking controller block.
pub const CTRL_BLOCK_NAME: &str = "ctrl";

/// Signals exposed by the closed loop.
pub const OUTPUT_NAMES: [&str; 8] = ["x", "y", "theta", "xd", "yd", "thetad", "v", "delta"];

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A fully built closed loop, ready to simulate.
pub struct Scenario {
    pub car: KinematicCar,
    pub table: Arc<GainTable>,
    pub system: Interconnect,
    pub x0: DVector<f64>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("Could not build the vehicle: {0}")]
    Plant(#[from] PlantError),

    #[error("Could not build the gain schedule: {0}")]
    GainSched(#[from] GainSchedError),

    #[error("Could not build the tracking controller: {0}")]
    TrajCtrl(#[from] TrajCtrlError),

    #[error("Could not build the trajectory generator: {0}")]
    TrajGen(#[from] TrajGenError),

    #[error("Could not wire the closed loop: {0}")]
    Interconnect(#[from] InterconnectError)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Build the car, design the gain table and wire the closed loop.
pub fn build(params: &GsExecParams) -> Result<Scenario, ScenarioError> {
    let car = KinematicCar::new(params.vehicle)?;

    let table = Arc::new(design_table(&car, &params.gain_sched)?);

    let traj = traj_gen::from_params(&params.traj_gen, params.vehicle.wheelbase_m)?;
    let system = closed_loop(&car, table.clone(), &params.gain_sched, traj)?;

    // Only the vehicle carries state
    let x0 = DVector::from_vec(params.initial_state.to_vec());

    Ok(Scenario { car, table, system, x0 })
}

/// Design the gain table of the car over the configured grid.
pub fn design_table(
    car: &KinematicCar,
    params: &gain_sched::Params
) -> Result<GainTable, GainSchedError> {
    let points = SchedulingGrid::rectangular(&params.grid_axes())?;
    info!("Designing {} gains", points.len());

    GainTable::design(car, points, &params.weights())
}

/// Wire the trajectory generator, the tracking controller and the car.
pub fn closed_loop(
    car: &KinematicCar,
    table: Arc<GainTable>,
    params: &gain_sched::Params,
    traj: Box<dyn Block>
) -> Result<Interconnect, ScenarioError> {
    let labels = SignalLabels::with_desired_suffix(
        &vehicle::STATE_NAMES,
        &vehicle::INPUT_NAMES
    );

    let ctrl = TrajTrackingBlock::from_table(
        CTRL_BLOCK_NAME,
        labels,
        table,
        params.method,
        &params.schedule_on
    )?;

    Ok(Interconnect::new(
        "closed_loop",
        vec![traj, Box::new(ctrl) as Box<dyn Block>, Box::new(car.clone())],
        &[] as &[&str],
        &OUTPUT_NAMES
    )?)
}

/// Tracking errors at the end of a closed-loop trace.
pub fn final_report(trace: &SimTrace) -> Option<StatusReport> {
    let get = |name: &str| trace.final_output(name);

    Some(StatusReport::from_poses(
        [get("x")?, get("y")?, get("theta")?],
        [get("xd")?, get("yd")?, get("thetad")?]
    ))
}

/// Tracking errors at every sample of a closed-loop trace.
pub fn tracking_reports(trace: &SimTrace) -> Option<Vec<StatusReport>> {
    let series: Vec<Vec<f64>> = ["x", "y", "theta", "xd", "yd", "thetad"]
        .iter()
        .map(|name| trace.output_series(name))
        .collect::<Option<_>>()?;

    Some((0..trace.len())
        .map(|i| StatusReport::from_poses(
            [series[0][i], series[1][i], series[2][i]],
            [series[3][i], series[4][i], series[5][i]]
        ))
        .collect())
}
