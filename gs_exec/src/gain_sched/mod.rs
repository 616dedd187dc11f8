//! # Gain scheduling
//!
//! A gain table maps scheduling points to regulator gains. The interpolator
//! produces a gain for any query point, and the feedback law combines that
//! gain with the tracking error:
//!
//! ```text
//! u = ud - K(mu) (x - xd)
//! ```

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod feedback;
mod gain_table;
mod interp;
mod params;
mod point;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use feedback::*;
pub use gain_table::*;
pub use interp::*;
pub use params::*;
pub use point::*;

use crate::linearise::LineariseError;
use crate::lqr::LqrError;
use crate::plant::PlantError;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur while building or querying a gain schedule.
#[derive(Debug, thiserror::Error)]
pub enum GainSchedError {
    #[error("A gain table must contain at least one entry")]
    EmptyTable,

    #[error("Grid axis {0} has no values")]
    EmptyAxis(usize),

    #[error("Scheduling point contains a non-finite value: {0:?}")]
    NonFinitePoint(Vec<f64>),

    #[error("Got {points} scheduling points but {gains} gains")]
    EntryCount {
        points: usize,
        gains: usize
    },

    #[error("Entry {index} has a point of dimension {found}, expected {expected}")]
    PointDimension {
        index: usize,
        expected: usize,
        found: usize
    },

    #[error("Entry {index} has a gain of shape {found:?}, expected {expected:?}")]
    GainShape {
        index: usize,
        expected: (usize, usize),
        found: (usize, usize)
    },

    #[error("Entry {index} duplicates the point of entry {first}")]
    DuplicatePoint {
        index: usize,
        first: usize
    },

    #[error("Entry {0} has a non-finite gain")]
    NonFiniteGain(usize),

    #[error("Linear interpolation requires the points to form a rectangular grid")]
    NotRectangularGrid,

    #[error("Unknown interpolation method \"{0}\"")]
    UnknownMethod(String),

    #[error("Query has dimension {found}, the table has dimension {expected}")]
    QueryDimension {
        expected: usize,
        found: usize
    },

    #[error("Query contains a non-finite value")]
    NonFiniteQuery,

    #[error("The {signal} vector has {found} elements, expected {expected}")]
    SignalDimension {
        signal: &'static str,
        expected: usize,
        found: usize
    },

    #[error("Gain design failed at entry {index}, point {point:?}: {source}")]
    Design {
        index: usize,
        point: Vec<f64>,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>
    }
}

/// Errors from the design of a single gain.
#[derive(Debug, thiserror::Error)]
pub enum DesignError {
    #[error("Could not find the operating point: {0}")]
    Plant(#[from] PlantError),

    #[error("Could not linearise the plant: {0}")]
    Linearise(#[from] LineariseError),

    #[error("LQR design failed: {0}")]
    Lqr(#[from] LqrError)
}
