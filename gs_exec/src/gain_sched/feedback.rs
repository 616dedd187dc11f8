//! Gain-scheduled feedback law

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{DMatrix, DVector};

// Internal
use super::{GainInterpolator, GainSchedError};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Inputs to a single evaluation of the feedback law.
#[derive(Debug, Clone, Copy)]
pub struct TrackingState<'a> {
    /// Current state.
    pub x: &'a [f64],

    /// Desired state.
    pub xd: &'a [f64],

    /// Desired (feedforward) input.
    pub ud: &'a [f64],

    /// Scheduling point.
    pub mu: &'a [f64]
}

/// Computes `u = ud - K(mu) (x - xd)`.
#[derive(Debug, Clone)]
pub struct GainSchedFeedback {
    interp: GainInterpolator
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl GainSchedFeedback {
    pub fn new(interp: GainInterpolator) -> Self {
        Self { interp }
    }

    pub fn interpolator(&self) -> &GainInterpolator {
        &self.interp
    }

    /// Number of states, the column count of the gains.
    pub fn num_states(&self) -> usize {
        self.interp.table().gain_shape().1
    }

    /// Number of control inputs, the row count of the gains.
    pub fn num_inputs(&self) -> usize {
        self.interp.table().gain_shape().0
    }

    /// Evaluate the feedback law.
    pub fn evaluate(&self, state: &TrackingState) -> Result<DVector<f64>, GainSchedError> {
        let k = self.interp.interpolate(state.mu)?;
        apply_gain(&k, state.x, state.xd, state.ud)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Apply a fixed gain, `u = ud - K (x - xd)`.
pub fn apply_gain(
    k: &DMatrix<f64>,
    x: &[f64],
    xd: &[f64],
    ud: &[f64]
) -> Result<DVector<f64>, GainSchedError> {
    let (m, n) = k.shape();

    check_len("x", n, x.len())?;
    check_len("xd", n, xd.len())?;
    check_len("ud", m, ud.len())?;

    let err = DVector::from_iterator(n, x.iter().zip(xd.iter()).map(|(a, b)| a - b));

    Ok(DVector::from_column_slice(ud) - k * err)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn check_len(signal: &'static str, expected: usize, found: usize) -> Result<(), GainSchedError> {
    if expected != found {
        return Err(GainSchedError::SignalDimension { signal, expected, found })
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use crate::gain_sched::{GainTable, InterpMethod, SchedulingPoint};
    use approx::assert_relative_eq;

    fn feedback() -> GainSchedFeedback {
        let table = GainTable::new(
            vec![
                SchedulingPoint::new(vec![0.0]).unwrap(),
                SchedulingPoint::new(vec![1.0]).unwrap()
            ],
            vec![
                DMatrix::from_row_slice(2, 3, &[1.0, 0.0, 0.0, 0.0, 1.0, 2.0]),
                DMatrix::from_row_slice(2, 3, &[3.0, 0.0, 0.0, 0.0, 3.0, 4.0])
            ]
        ).unwrap();

        GainSchedFeedback::new(
            GainInterpolator::new(Arc::new(table), InterpMethod::Linear).unwrap()
        )
    }

    #[test]
    fn test_zero_error_returns_feedforward() {
        let fb = feedback();
        let ud = [10.3, -0.07];

        let u = fb.evaluate(&TrackingState {
            x: &[1.25, -3.5, 0.4],
            xd: &[1.25, -3.5, 0.4],
            ud: &ud,
            mu: &[0.37]
        }).unwrap();

        assert_eq!(u.as_slice(), &ud);
    }

    #[test]
    fn test_feedback() {
        let fb = feedback();
        assert_eq!(fb.num_states(), 3);
        assert_eq!(fb.num_inputs(), 2);

        // K(0.5) = [[2, 0, 0], [0, 2, 3]]
        let u = fb.evaluate(&TrackingState {
            x: &[1.0, 0.5, 0.1],
            xd: &[0.0, 0.0, 0.0],
            ud: &[5.0, 0.0],
            mu: &[0.5]
        }).unwrap();

        assert_relative_eq!(u, DVector::from_vec(vec![3.0, -1.3]), epsilon = 1e-12);
    }

    #[test]
    fn test_dimension_errors() {
        let fb = feedback();

        let r = fb.evaluate(&TrackingState {
            x: &[1.0, 0.5],
            xd: &[0.0, 0.0, 0.0],
            ud: &[5.0, 0.0],
            mu: &[0.5]
        });
        assert!(matches!(r, Err(GainSchedError::SignalDimension { signal: "x", .. })));

        let r = fb.evaluate(&TrackingState {
            x: &[1.0, 0.5, 0.0],
            xd: &[0.0, 0.0, 0.0],
            ud: &[5.0],
            mu: &[0.5]
        });
        assert!(matches!(r, Err(GainSchedError::SignalDimension { signal: "ud", .. })));

        let r = fb.evaluate(&TrackingState {
            x: &[1.0, 0.5, 0.0],
            xd: &[0.0, 0.0, 0.0],
            ud: &[5.0, 0.0],
            mu: &[0.5, 1.0]
        });
        assert!(matches!(r, Err(GainSchedError::QueryDimension { .. })));
    }
}
