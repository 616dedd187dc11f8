//! # Numerical linearisation
//!
//! Approximates the Jacobians of a plant's dynamics about an operating point
//! using central finite differences:
//!
//! ```text
//! A[:, j] = (f(x0 + eps e_j, u0) - f(x0 - eps e_j, u0)) / (2 eps)
//! B[:, j] = (f(x0, u0 + eps e_j) - f(x0, u0 - eps e_j)) / (2 eps)
//! ```

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use nalgebra::{DMatrix, DVector};

// Internal
use crate::plant::{OperatingPoint, Plant};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Default perturbation used for the finite differences.
pub const DEFAULT_EPS: f64 = 1e-6;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// State and input matrices of a linearised plant, `dx' = A dx + B du`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    pub a: DMatrix<f64>,
    pub b: DMatrix<f64>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur during linearisation.
#[derive(Debug, thiserror::Error)]
pub enum LineariseError {
    #[error("Operating point state has {found} elements, the plant has {expected} states")]
    StateDimension {
        expected: usize,
        found: usize
    },

    #[error("Operating point input has {found} elements, the plant has {expected} inputs")]
    InputDimension {
        expected: usize,
        found: usize
    },

    #[error("Finite difference step must be positive and finite, found {0}")]
    InvalidStep(f64),

    #[error("The dynamics are not finite at the operating point")]
    NonFinite
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Linearise the plant about the operating point.
pub fn linearise<P>(
    plant: &P,
    op: &OperatingPoint,
    eps: f64
) -> Result<LinearModel, LineariseError>
where
    P: Plant + ?Sized
{
    let n = plant.num_states();
    let m = plant.num_inputs();

    if op.x0.len() != n {
        return Err(LineariseError::StateDimension { expected: n, found: op.x0.len() })
    }
    if op.u0.len() != m {
        return Err(LineariseError::InputDimension { expected: m, found: op.u0.len() })
    }
    if !(eps > 0.0) || !eps.is_finite() {
        return Err(LineariseError::InvalidStep(eps))
    }

    let mut a = DMatrix::zeros(n, n);
    let mut b = DMatrix::zeros(n, m);

    for j in 0..n {
        let col = central_diff(eps, |h| {
            let mut x = op.x0.clone();
            x[j] += h;
            plant.dynamics(&x, &op.u0)
        });
        a.set_column(j, &col);
    }

    for j in 0..m {
        let col = central_diff(eps, |h| {
            let mut u = op.u0.clone();
            u[j] += h;
            plant.dynamics(&op.x0, &u)
        });
        b.set_column(j, &col);
    }

    if a.iter().chain(b.iter()).any(|v| !v.is_finite()) {
        return Err(LineariseError::NonFinite)
    }

    trace!("Linearised about x0 = {:?}, u0 = {:?}:\n    A = {}    B = {}",
        op.x0.as_slice(), op.u0.as_slice(), a, b);

    Ok(LinearModel { a, b })
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn central_diff<F>(eps: f64, f: F) -> DVector<f64>
where
    F: Fn(f64) -> DVector<f64>
{
    (f(eps) - f(-eps)) / (2.0 * eps)
}
