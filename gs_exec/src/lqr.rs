//! # Linear-quadratic regulator
//!
//! Solves the continuous-time LQR problem for `x' = A x + B u` with cost
//! `integral(x^T Q x + u^T R u) dt`. The gain is `K = R^-1 B^T S` where `S`
//! solves the continuous algebraic Riccati equation (CARE)
//!
//! ```text
//! A^T S + S A - S B R^-1 B^T S + Q = 0
//! ```
//!
//! The CARE is solved with the matrix sign function of the Hamiltonian
//!
//! ```text
//! H = [  A  -B R^-1 B^T ]
//!     [ -Q  -A^T        ]
//! ```
//!
//! computed by the determinant-scaled Newton iteration
//! `Z <- (c Z + Z^-1 / c) / 2`, `c = |det Z|^(-1/2n)`. With `W = sign(H)`
//! the stabilising solution satisfies
//!
//! ```text
//! [ W12     ] S = - [ W11 + I ]
//! [ W22 + I ]       [ W21     ]
//! ```
//!
//! which is solved in the least squares sense. If `H` has an eigenvalue on
//! the imaginary axis (the pair is not stabilisable or not detectable) the
//! iteration hits a singular matrix and the design fails.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, trace};
use nalgebra::{Complex, DMatrix};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Maximum number of sign function iterations.
const MAX_SIGN_ITERATIONS: usize = 100;

/// Relative change below which the sign iteration is converged.
const SIGN_TOLERANCE: f64 = 1e-11;

/// Relative tolerance on the symmetry of the weighting matrices.
const SYMMETRY_TOLERANCE: f64 = 1e-10;

/// Iteration limit for the closed-loop eigenvalue computation.
const MAX_SCHUR_ITERATIONS: usize = 10_000;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// State and input weighting matrices.
#[derive(Debug, Clone, PartialEq)]
pub struct LqrWeights {
    /// State weight, `n x n`, symmetric positive semi-definite.
    pub q: DMatrix<f64>,

    /// Input weight, `m x m`, symmetric positive definite.
    pub r: DMatrix<f64>
}

/// The result of an LQR design.
#[derive(Debug, Clone)]
pub struct LqrSolution {
    /// State feedback gain, `u = -K x`.
    pub k: DMatrix<f64>,

    /// Stabilising solution of the CARE.
    pub s: DMatrix<f64>,

    /// Eigenvalues of `A - B K`.
    pub poles: Vec<Complex<f64>>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Reasons an LQR design can fail.
#[derive(Debug, thiserror::Error)]
pub enum LqrError {
    #[error("Matrix {name} has shape {found:?}, expected {expected:?}")]
    Dimension {
        name: &'static str,
        expected: (usize, usize),
        found: (usize, usize)
    },

    #[error("The state weight Q is not symmetric")]
    QNotSymmetric,

    #[error("The input weight R is not symmetric positive definite")]
    RNotPositiveDefinite,

    #[error(
        "The Hamiltonian matrix is singular, the system is not stabilisable \
         or not detectable through Q"
    )]
    SingularHamiltonian,

    #[error("The sign function iteration did not converge in {0} iterations")]
    NotConverged(usize),

    #[error("The Riccati solution could not be recovered: {0}")]
    Recovery(&'static str),

    #[error("The closed loop is not stable (max real part {0})")]
    NotStabilising(f64),

    #[error("The design produced non-finite values")]
    NonFinite
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LqrWeights {
    /// Build diagonal weights.
    pub fn from_diagonals(q_diag: &[f64], r_diag: &[f64]) -> Self {
        Self {
            q: DMatrix::from_diagonal(&nalgebra::DVector::from_column_slice(q_diag)),
            r: DMatrix::from_diagonal(&nalgebra::DVector::from_column_slice(r_diag))
        }
    }
}

impl LqrSolution {
    /// The largest real part of the closed-loop poles.
    pub fn max_pole_real(&self) -> f64 {
        self.poles
            .iter()
            .map(|p| p.re)
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Design a continuous-time LQR for the pair `(A, B)`.
pub fn lqr(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    weights: &LqrWeights
) -> Result<LqrSolution, LqrError> {
    let n = a.nrows();
    let m = b.ncols();

    check_shape("A", a, (n, n))?;
    check_shape("B", b, (n, m))?;
    check_shape("Q", &weights.q, (n, n))?;
    check_shape("R", &weights.r, (m, m))?;

    if a.iter().chain(b.iter()).chain(weights.q.iter()).chain(weights.r.iter())
        .any(|v| !v.is_finite())
    {
        return Err(LqrError::NonFinite)
    }

    if !is_symmetric(&weights.q) {
        return Err(LqrError::QNotSymmetric)
    }
    if !is_symmetric(&weights.r) {
        return Err(LqrError::RNotPositiveDefinite)
    }
    let r_inv = match weights.r.clone().cholesky() {
        Some(c) => c.inverse(),
        None => return Err(LqrError::RNotPositiveDefinite)
    };

    // ---- HAMILTONIAN ----

    let g = b * &r_inv * b.transpose();

    let mut h = DMatrix::zeros(2 * n, 2 * n);
    h.view_mut((0, 0), (n, n)).copy_from(a);
    h.view_mut((0, n), (n, n)).copy_from(&(-&g));
    h.view_mut((n, 0), (n, n)).copy_from(&(-&weights.q));
    h.view_mut((n, n), (n, n)).copy_from(&(-a.transpose()));

    // ---- SIGN FUNCTION ----

    let w = matrix_sign(h)?;

    // ---- RECOVER S ----

    let identity = DMatrix::<f64>::identity(n, n);
    let w11 = w.view((0, 0), (n, n)).clone_owned();
    let w12 = w.view((0, n), (n, n)).clone_owned();
    let w21 = w.view((n, 0), (n, n)).clone_owned();
    let w22 = w.view((n, n), (n, n)).clone_owned();

    let mut lhs = DMatrix::zeros(2 * n, n);
    lhs.view_mut((0, 0), (n, n)).copy_from(&w12);
    lhs.view_mut((n, 0), (n, n)).copy_from(&(w22 + &identity));

    let mut rhs = DMatrix::zeros(2 * n, n);
    rhs.view_mut((0, 0), (n, n)).copy_from(&(-(w11 + &identity)));
    rhs.view_mut((n, 0), (n, n)).copy_from(&(-w21));

    let svd = lhs.svd(true, true);
    let sv_max = svd.singular_values.max();
    let sv_min = svd.singular_values.min();
    if !(sv_min > sv_max * f64::EPSILON * (2 * n) as f64) {
        return Err(LqrError::SingularHamiltonian)
    }
    let s = svd.solve(&rhs, f64::EPSILON).map_err(LqrError::Recovery)?;

    // Remove any asymmetry introduced by round-off
    let s = (&s + s.transpose()) * 0.5;

    // ---- GAIN AND CLOSED LOOP ----

    let k = &r_inv * b.transpose() * &s;

    if k.iter().chain(s.iter()).any(|v| !v.is_finite()) {
        return Err(LqrError::NonFinite)
    }

    let a_cl = a - b * &k;
    let poles: Vec<Complex<f64>> = match a_cl.try_schur(f64::EPSILON, MAX_SCHUR_ITERATIONS) {
        Some(schur) => schur.complex_eigenvalues().iter().copied().collect(),
        None => return Err(LqrError::NonFinite)
    };

    let solution = LqrSolution { k, s, poles };

    let max_re = solution.max_pole_real();
    if !(max_re < 0.0) {
        return Err(LqrError::NotStabilising(max_re))
    }

    trace!("CARE residual norm: {:e}", care_residual(a, &g, &weights.q, &solution.s));
    debug!("LQR design complete, slowest closed-loop pole real part {:.4}", max_re);

    Ok(solution)
}

/// The residual `A^T S + S A - S G S + Q` of a CARE solution, with
/// `G = B R^-1 B^T`, as a Frobenius norm.
pub fn care_residual(
    a: &DMatrix<f64>,
    g: &DMatrix<f64>,
    q: &DMatrix<f64>,
    s: &DMatrix<f64>
) -> f64 {
    (a.transpose() * s + s * a - s * g * s + q).norm()
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// The matrix sign function by scaled Newton iteration.
fn matrix_sign(mut z: DMatrix<f64>) -> Result<DMatrix<f64>, LqrError> {
    let dim = z.nrows() as f64;

    for i in 0..MAX_SIGN_ITERATIONS {
        let lu = z.clone().lu();

        let det = lu.determinant();
        let z_inv = match lu.try_inverse() {
            Some(inv) => inv,
            None => return Err(LqrError::SingularHamiltonian)
        };
        if det == 0.0 || z_inv.iter().any(|v| !v.is_finite()) {
            return Err(LqrError::SingularHamiltonian)
        }

        // Determinant scaling, dropped if it over or underflows
        let mut c = det.abs().powf(-1.0 / dim);
        if !c.is_finite() || c == 0.0 {
            c = 1.0;
        }

        let z_next = (&z * c + z_inv / c) * 0.5;
        let change = (&z_next - &z).norm();
        z = z_next;

        if change <= SIGN_TOLERANCE * z.norm() {
            trace!("Sign iteration converged after {} iterations", i + 1);
            return Ok(z)
        }
    }

    Err(LqrError::NotConverged(MAX_SIGN_ITERATIONS))
}

fn check_shape(
    name: &'static str,
    mat: &DMatrix<f64>,
    expected: (usize, usize)
) -> Result<(), LqrError> {
    if mat.shape() != expected {
        return Err(LqrError::Dimension {
            name,
            expected,
            found: mat.shape()
        })
    }

    Ok(())
}

fn is_symmetric(mat: &DMatrix<f64>) -> bool {
    (mat - mat.transpose()).norm() <= SYMMETRY_TOLERANCE * mat.norm().max(1.0)
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_scalar() {
        // x' = u, Q = R = 1 gives S = K = 1
        let a = DMatrix::from_element(1, 1, 0.0);
        let b = DMatrix::from_element(1, 1, 1.0);
        let sol = lqr(&a, &b, &LqrWeights::from_diagonals(&[1.0], &[1.0])).unwrap();

        assert_relative_eq!(sol.k[(0, 0)], 1.0, epsilon = 1e-9);
        assert_relative_eq!(sol.s[(0, 0)], 1.0, epsilon = 1e-9);
        assert_relative_eq!(sol.poles[0].re, -1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_double_integrator() {
        // Q = I, R = 1 gives K = [1, sqrt(3)]
        let a = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 0.0, 0.0]);
        let b = DMatrix::from_row_slice(2, 1, &[0.0, 1.0]);
        let weights = LqrWeights::from_diagonals(&[1.0, 1.0], &[1.0]);

        let sol = lqr(&a, &b, &weights).unwrap();

        assert_relative_eq!(sol.k[(0, 0)], 1.0, epsilon = 1e-8);
        assert_relative_eq!(sol.k[(0, 1)], 3f64.sqrt(), epsilon = 1e-8);

        let g = &b * weights.r.clone().try_inverse().unwrap() * b.transpose();
        assert!(care_residual(&a, &g, &weights.q, &sol.s) < 1e-8);
        assert!(sol.max_pole_real() < 0.0);
    }

    #[test]
    fn test_two_input_integrator() {
        // Reference solution from MATLAB's icare
        let a = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 0.0, 0.0]);
        let b = DMatrix::from_row_slice(2, 2, &[0.0, 0.0, 1.0, 1.0]);
        let weights = LqrWeights::from_diagonals(&[1.0, 1.0], &[1.0, 1.0]);

        let sol = lqr(&a, &b, &weights).unwrap();

        let expected = DMatrix::from_row_slice(2, 2, &[
            1.553773974030038, std::f64::consts::FRAC_1_SQRT_2,
            std::f64::consts::FRAC_1_SQRT_2, 1.098684113467811
        ]);
        assert_relative_eq!(sol.s, expected, epsilon = 1e-8);
    }

    #[test]
    fn test_unstabilisable() {
        // Unstable mode the input cannot reach
        let a = DMatrix::from_element(1, 1, 1.0);
        let b = DMatrix::from_element(1, 1, 0.0);
        let res = lqr(&a, &b, &LqrWeights::from_diagonals(&[1.0], &[1.0]));
        assert!(res.is_err(), "Expected the design to fail, got {:?}", res);
    }

    #[test]
    fn test_uncontrollable_integrator() {
        // Marginal mode the input cannot reach, eigenvalue on the imaginary
        // axis of the Hamiltonian
        let a = DMatrix::from_row_slice(2, 2, &[0.0, 0.0, 0.0, 0.0]);
        let b = DMatrix::from_row_slice(2, 1, &[1.0, 0.0]);
        let res = lqr(&a, &b, &LqrWeights::from_diagonals(&[1.0, 1.0], &[1.0]));
        assert!(matches!(res, Err(LqrError::SingularHamiltonian)), "got {:?}", res);
    }

    #[test]
    fn test_bad_weights() {
        let a = DMatrix::from_element(1, 1, 0.0);
        let b = DMatrix::from_element(1, 1, 1.0);

        let res = lqr(&a, &b, &LqrWeights::from_diagonals(&[1.0], &[0.0]));
        assert!(matches!(res, Err(LqrError::RNotPositiveDefinite)));

        let res = lqr(&a, &b, &LqrWeights::from_diagonals(&[1.0, 1.0], &[1.0]));
        assert!(matches!(res, Err(LqrError::Dimension { name: "Q", .. })));

        let weights = LqrWeights {
            q: DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.0, 1.0]),
            r: DMatrix::from_element(1, 1, 1.0)
        };
        let a = DMatrix::zeros(2, 2);
        let b = DMatrix::from_row_slice(2, 1, &[0.0, 1.0]);
        assert!(matches!(lqr(&a, &b, &weights), Err(LqrError::QNotSymmetric)));
    }
}
