//! Trajectory tracking block

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::collections::HashSet;
use std::sync::Arc;
use log::debug;
use nalgebra::{DMatrix, DVector};

// Internal
use super::{SignalLabels, TrajCtrlError};
use crate::block::{Block, BlockError, BlockSchema};
use crate::gain_sched::{
    GainInterpolator,
    GainSchedFeedback,
    GainTable,
    InterpMethod,
    SchedulingPoint,
    TrackingState
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A stateless block computing `u = ud - K(mu) (x - xd)`.
///
/// The scheduling point `mu` is assembled from a fixed list of the block's
/// input signals.
#[derive(Debug, Clone)]
pub struct TrajTrackingBlock {
    name: String,
    schema: BlockSchema,
    feedback: GainSchedFeedback,

    /// Input indices forming the scheduling point.
    schedule_indices: Vec<usize>
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TrajTrackingBlock {
    /// Create a new tracking block around the feedback law.
    pub fn new<S: AsRef<str>>(
        name: &str,
        labels: SignalLabels,
        feedback: GainSchedFeedback,
        schedule_on: &[S]
    ) -> Result<Self, TrajCtrlError> {
        let n = feedback.num_states();
        let m = feedback.num_inputs();

        check_labels("state", n, &labels.states)?;
        check_labels("desired state", n, &labels.desired_states)?;
        check_labels("desired input", m, &labels.desired_inputs)?;
        check_labels("output", m, &labels.outputs)?;

        let schema = BlockSchema::new(
            labels.inputs(),
            labels.outputs.iter().cloned(),
            Vec::<String>::new()
        )?;

        let dim = feedback.interpolator().table().point_dim();
        if schedule_on.len() != dim {
            return Err(TrajCtrlError::ScheduleDimension {
                expected: dim,
                found: schedule_on.len()
            })
        }

        let mut seen = HashSet::new();
        let mut schedule_indices = Vec::with_capacity(dim);

        for signal in schedule_on.iter().map(|s| s.as_ref()) {
            if !seen.insert(signal) {
                return Err(TrajCtrlError::DuplicateScheduleSignal(signal.to_string()))
            }

            let index = schema
                .input_index(signal)
                .ok_or_else(|| TrajCtrlError::UnknownScheduleSignal(signal.to_string()))?;
            schedule_indices.push(index);
        }

        debug!(
            "TrajTrackingBlock \"{}\" created, scheduled on inputs {:?}",
            name, schedule_indices
        );

        Ok(Self {
            name: name.to_string(),
            schema,
            feedback,
            schedule_indices
        })
    }

    /// Create a tracking block interpolating the given table.
    pub fn from_table<S: AsRef<str>>(
        name: &str,
        labels: SignalLabels,
        table: Arc<GainTable>,
        method: InterpMethod,
        schedule_on: &[S]
    ) -> Result<Self, TrajCtrlError> {
        let interp = GainInterpolator::new(table, method)?;
        Self::new(name, labels, GainSchedFeedback::new(interp), schedule_on)
    }

    /// Create a tracking block from paired points and gains, with the
    /// interpolation method given by name (`"linear"` or `"nearest"`).
    pub fn from_entries<S: AsRef<str>>(
        name: &str,
        labels: SignalLabels,
        points: Vec<SchedulingPoint>,
        gains: Vec<DMatrix<f64>>,
        method: &str,
        schedule_on: &[S]
    ) -> Result<Self, TrajCtrlError> {
        let method: InterpMethod = method.parse()?;
        let table = GainTable::new(points, gains)?;
        Self::from_table(name, labels, Arc::new(table), method, schedule_on)
    }
}

impl Block for TrajTrackingBlock {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &BlockSchema {
        &self.schema
    }

    fn output(
        &self,
        _t: f64,
        x: &DVector<f64>,
        u: &DVector<f64>
    ) -> Result<DVector<f64>, BlockError> {
        self.schema.check(&self.name, x, u)?;

        let n = self.feedback.num_states();
        let m = self.feedback.num_inputs();
        let u = u.as_slice();

        let mu: Vec<f64> = self.schedule_indices.iter().map(|&i| u[i]).collect();

        let state = TrackingState {
            x: &u[..n],
            xd: &u[n..2 * n],
            ud: &u[2 * n..2 * n + m],
            mu: &mu
        };

        self.feedback.evaluate(&state).map_err(|e| BlockError::EvalFailed {
            block: self.name.clone(),
            reason: e.to_string()
        })
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn check_labels(
    what: &'static str,
    expected: usize,
    labels: &[String]
) -> Result<(), TrajCtrlError> {
    if labels.len() != expected {
        return Err(TrajCtrlError::LabelCount {
            what,
            expected,
            found: labels.len()
        })
    }
    Ok(())
}
