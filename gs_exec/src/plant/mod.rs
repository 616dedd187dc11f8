//! # Plant models
//!
//! A plant is a continuous-time nonlinear system `x' = f(x, u)`. Plants that
//! can be gain scheduled also map a scheduling point to the operating point
//! about which they are linearised.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod vehicle;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::DVector;
use serde::Serialize;

// Internal
use crate::gain_sched::SchedulingPoint;
pub use vehicle::{KinematicCar, Params as VehicleParams};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A state and input pair about which a plant is linearised.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperatingPoint {
    pub x0: DVector<f64>,
    pub u0: DVector<f64>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with plant models.
#[derive(Debug, thiserror::Error)]
pub enum PlantError {
    #[error("Expected a scheduling point with {expected} dimensions, found {found}")]
    SchedulingDimension {
        expected: usize,
        found: usize
    },

    #[error("The operating point is outside the model's valid region: {0}")]
    InvalidOperatingPoint(String),

    #[error("Invalid plant parameters: {0}")]
    InvalidParams(String)
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A continuous-time nonlinear system.
pub trait Plant: Sync {
    /// Number of states.
    fn num_states(&self) -> usize;

    /// Number of inputs.
    fn num_inputs(&self) -> usize;

    /// The state derivative `f(x, u)`.
    ///
    /// Callers must pass vectors of length `num_states` and `num_inputs`.
    fn dynamics(&self, x: &DVector<f64>, u: &DVector<f64>) -> DVector<f64>;
}

/// A plant whose linearisation point is implied by a scheduling point.
pub trait Scheduled: Plant {
    /// Number of scheduling variables the plant expects.
    fn num_scheduling_vars(&self) -> usize;

    /// The operating point implied by the scheduling point.
    fn operating_point(&self, point: &SchedulingPoint) -> Result<OperatingPoint, PlantError>;
}
