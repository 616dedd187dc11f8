//! # Kinematic car
//!
//! A bicycle model of a car driven by a forward speed and a front-wheel
//! steering angle. The reference point is the centre of the rear axle.
//!
//! ```text
//! x'     = cos(theta) v
//! y'     = sin(theta) v
//! theta' = (v / wheelbase) tan(delta)
//! ```
//!
//! The steering angle is saturated at `max_steer_rad` before it reaches the
//! dynamics.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

// Internal
use super::{OperatingPoint, Plant, PlantError, Scheduled};
use crate::block::{Block, BlockError, BlockSchema};
use crate::gain_sched::SchedulingPoint;
use util::maths::clamp;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// State signal names.
pub const STATE_NAMES: [&str; 3] = ["x", "y", "theta"];

/// Input signal names.
pub const INPUT_NAMES: [&str; 2] = ["v", "delta"];

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the kinematic car.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct Params {
    /// Distance between the front and rear axles.
    ///
    /// Units: meters
    pub wheelbase_m: f64,

    /// Steering angle saturation limit (symmetric).
    ///
    /// Units: radians
    pub max_steer_rad: f64
}

/// Kinematic car model.
#[derive(Debug, Clone)]
pub struct KinematicCar {
    params: Params,
    schema: BlockSchema
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            wheelbase_m: 3.0,
            max_steer_rad: 0.5
        }
    }
}

impl KinematicCar {
    /// Create a new car from the parameters.
    pub fn new(params: Params) -> Result<Self, PlantError> {
        if !(params.wheelbase_m > 0.0) || !params.wheelbase_m.is_finite() {
            return Err(PlantError::InvalidParams(
                format!("wheelbase must be positive, found {}", params.wheelbase_m)
            ))
        }
        if !(params.max_steer_rad > 0.0) || !params.max_steer_rad.is_finite() {
            return Err(PlantError::InvalidParams(
                format!("steering limit must be positive, found {}", params.max_steer_rad)
            ))
        }

        let schema = BlockSchema::new(
            INPUT_NAMES.iter().copied(),
            STATE_NAMES.iter().copied(),
            STATE_NAMES.iter().copied()
        ).map_err(|e| PlantError::InvalidParams(e.to_string()))?;

        debug!("KinematicCar created with {:?}", params);

        Ok(Self { params, schema })
    }

    pub fn params(&self) -> &Params {
        &self.params
    }
}

impl Plant for KinematicCar {
    fn num_states(&self) -> usize {
        STATE_NAMES.len()
    }

    fn num_inputs(&self) -> usize {
        INPUT_NAMES.len()
    }

    fn dynamics(&self, x: &DVector<f64>, u: &DVector<f64>) -> DVector<f64> {
        let theta = x[2];
        let v = u[0];
        let delta = clamp(&u[1], &-self.params.max_steer_rad, &self.params.max_steer_rad);

        DVector::from_vec(vec![
            theta.cos() * v,
            theta.sin() * v,
            (v / self.params.wheelbase_m) * delta.tan()
        ])
    }
}

impl Scheduled for KinematicCar {
    fn num_scheduling_vars(&self) -> usize {
        2
    }

    /// Scheduling point `(vd, thetad)` maps to a straight drive at speed `vd`
    /// with heading `thetad`, from the origin.
    fn operating_point(&self, point: &SchedulingPoint) -> Result<OperatingPoint, PlantError> {
        if point.dim() != self.num_scheduling_vars() {
            return Err(PlantError::SchedulingDimension {
                expected: self.num_scheduling_vars(),
                found: point.dim()
            })
        }

        let speed_ms = point[0];
        let heading_rad = point[1];

        Ok(OperatingPoint {
            x0: DVector::from_vec(vec![0.0, 0.0, heading_rad]),
            u0: DVector::from_vec(vec![speed_ms, 0.0])
        })
    }
}

impl Block for KinematicCar {
    fn name(&self) -> &str {
        "vehicle"
    }

    fn schema(&self) -> &BlockSchema {
        &self.schema
    }

    fn direct_feedthrough(&self) -> bool {
        false
    }

    fn derivative(
        &self,
        _t: f64,
        x: &DVector<f64>,
        u: &DVector<f64>
    ) -> Result<DVector<f64>, BlockError> {
        self.schema.check(self.name(), x, u)?;
        Ok(self.dynamics(x, u))
    }

    fn output(
        &self,
        _t: f64,
        x: &DVector<f64>,
        u: &DVector<f64>
    ) -> Result<DVector<f64>, BlockError> {
        self.schema.check(self.name(), x, u)?;
        Ok(x.clone())
    }
}
