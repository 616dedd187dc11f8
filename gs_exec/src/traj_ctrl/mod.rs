//! # Trajectory control module
//!
//! Wraps the gain-scheduled feedback law as a stateless block which can be
//! wired into an interconnect alongside a plant and a trajectory generator.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod labels;
mod report;
mod tracking;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use labels::*;
pub use report::*;
pub use tracking::*;

use crate::block::BlockError;
use crate::gain_sched::GainSchedError;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur while building a trajectory tracking block.
#[derive(Debug, thiserror::Error)]
pub enum TrajCtrlError {
    #[error("Invalid block schema: {0}")]
    Schema(#[from] BlockError),

    #[error("Invalid gain schedule: {0}")]
    GainSched(#[from] GainSchedError),

    #[error("Expected {expected} {what} labels to match the gains, found {found}")]
    LabelCount {
        what: &'static str,
        expected: usize,
        found: usize
    },

    #[error("Scheduling on {found} signals but the table has dimension {expected}")]
    ScheduleDimension {
        expected: usize,
        found: usize
    },

    #[error("Scheduling signal \"{0}\" is not an input of the block")]
    UnknownScheduleSignal(String),

    #[error("Scheduling signal \"{0}\" is listed more than once")]
    DuplicateScheduleSignal(String)
}
