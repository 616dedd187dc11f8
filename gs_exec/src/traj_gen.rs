//! # Trajectory generators
//!
//! Blocks with no states and no inputs which produce the desired state and
//! feedforward input of the kinematic car as functions of time.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;
use nalgebra::DVector;
use serde::Deserialize;

// Internal
use crate::block::{Block, BlockError, BlockSchema};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Name of every trajectory generator block.
pub const BLOCK_NAME: &str = "trajgen";

/// Output signal names, desired state then desired input.
pub const OUTPUT_NAMES: [&str; 5] = ["xd", "yd", "thetad", "vd", "deltad"];

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Constant speed along a straight line through `(0, y0)`.
#[derive(Debug, Clone)]
pub struct StraightLine {
    vref_ms: f64,
    y0_m: f64,
    heading_rad: f64,
    schema: BlockSchema
}

/// Constant speed around a circle starting at the origin facing `+x`.
///
/// A positive radius turns left. The desired heading grows without bound, so
/// the heading grid of a gain schedule limits how far around the arc the
/// schedule is meaningful.
#[derive(Debug, Clone)]
pub struct CircularArc {
    vref_ms: f64,
    radius_m: f64,
    steer_rad: f64,
    schema: BlockSchema
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Parameters selecting and configuring a trajectory generator.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Params {
    StraightLine {
        /// Units: meters/second
        vref_ms: f64,

        /// Units: meters
        #[serde(default)]
        y0_m: f64,

        /// Units: radians
        #[serde(default)]
        heading_rad: f64
    },

    CircularArc {
        /// Units: meters/second
        vref_ms: f64,

        /// Units: meters
        radius_m: f64
    }
}

/// Errors building a trajectory generator.
#[derive(Debug, thiserror::Error)]
pub enum TrajGenError {
    #[error("Trajectory parameter {name} is invalid: {value}")]
    InvalidParam {
        name: &'static str,
        value: f64
    },

    #[error("Invalid block schema: {0}")]
    Schema(#[from] BlockError)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl StraightLine {
    pub fn new(vref_ms: f64, y0_m: f64, heading_rad: f64) -> Result<Self, TrajGenError> {
        check_finite("vref_ms", vref_ms)?;
        check_finite("y0_m", y0_m)?;
        check_finite("heading_rad", heading_rad)?;

        Ok(Self {
            vref_ms,
            y0_m,
            heading_rad,
            schema: schema()?
        })
    }
}

impl CircularArc {
    /// Create a new arc, with the steering feedforward for a car of the given
    /// wheelbase.
    pub fn new(vref_ms: f64, radius_m: f64, wheelbase_m: f64) -> Result<Self, TrajGenError> {
        check_finite("vref_ms", vref_ms)?;
        check_finite("radius_m", radius_m)?;
        check_finite("wheelbase_m", wheelbase_m)?;
        if radius_m == 0.0 {
            return Err(TrajGenError::InvalidParam { name: "radius_m", value: radius_m })
        }

        Ok(Self {
            vref_ms,
            radius_m,
            steer_rad: (wheelbase_m / radius_m).atan(),
            schema: schema()?
        })
    }
}

impl Block for StraightLine {
    fn name(&self) -> &str {
        BLOCK_NAME
    }

    fn schema(&self) -> &BlockSchema {
        &self.schema
    }

    fn direct_feedthrough(&self) -> bool {
        false
    }

    fn output(
        &self,
        t: f64,
        x: &DVector<f64>,
        u: &DVector<f64>
    ) -> Result<DVector<f64>, BlockError> {
        self.schema.check(BLOCK_NAME, x, u)?;

        let s = self.vref_ms * t;

        Ok(DVector::from_vec(vec![
            s * self.heading_rad.cos(),
            self.y0_m + s * self.heading_rad.sin(),
            self.heading_rad,
            self.vref_ms,
            0.0
        ]))
    }
}

impl Block for CircularArc {
    fn name(&self) -> &str {
        BLOCK_NAME
    }

    fn schema(&self) -> &BlockSchema {
        &self.schema
    }

    fn direct_feedthrough(&self) -> bool {
        false
    }

    fn output(
        &self,
        t: f64,
        x: &DVector<f64>,
        u: &DVector<f64>
    ) -> Result<DVector<f64>, BlockError> {
        self.schema.check(BLOCK_NAME, x, u)?;

        let theta = self.vref_ms * t / self.radius_m;

        Ok(DVector::from_vec(vec![
            self.radius_m * theta.sin(),
            self.radius_m * (1.0 - theta.cos()),
            theta,
            self.vref_ms,
            self.steer_rad
        ]))
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Build the generator described by the parameters.
pub fn from_params(params: &Params, wheelbase_m: f64) -> Result<Box<dyn Block>, TrajGenError> {
    debug!("Building trajectory generator from {:?}", params);

    Ok(match *params {
        Params::StraightLine { vref_ms, y0_m, heading_rad } =>
            Box::new(StraightLine::new(vref_ms, y0_m, heading_rad)?),
        Params::CircularArc { vref_ms, radius_m } =>
            Box::new(CircularArc::new(vref_ms, radius_m, wheelbase_m)?)
    })
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn schema() -> Result<BlockSchema, BlockError> {
    BlockSchema::new(
        Vec::<String>::new(),
        OUTPUT_NAMES.iter().copied(),
        Vec::<String>::new()
    )
}

fn check_finite(name: &'static str, value: f64) -> Result<(), TrajGenError> {
    if !value.is_finite() {
        return Err(TrajGenError::InvalidParam { name, value })
    }
    Ok(())
}
