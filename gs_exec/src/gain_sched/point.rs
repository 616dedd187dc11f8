//! Scheduling points and grids

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::fmt;
use std::ops::Index;
use serde::Serialize;

// Internal
use super::GainSchedError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A vector of finite scheduling variables.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SchedulingPoint(Vec<f64>);

/// Builder for sets of scheduling points.
pub struct SchedulingGrid;

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SchedulingPoint {
    /// Create a new point, failing if any value is not finite.
    pub fn new(values: Vec<f64>) -> Result<Self, GainSchedError> {
        if values.iter().any(|v| !v.is_finite()) {
            return Err(GainSchedError::NonFinitePoint(values))
        }

        Ok(Self(values))
    }

    /// The zero-dimensional point, used by constant-gain tables.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Number of scheduling variables in the point.
    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

impl Index<usize> for SchedulingPoint {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.0[index]
    }
}

impl fmt::Display for SchedulingPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, ")")
    }
}

impl SchedulingGrid {
    /// Build the Cartesian product of the given axis values.
    ///
    /// The first axis varies slowest, so for axes `[[a, b], [1, 2]]` the
    /// points are `(a, 1), (a, 2), (b, 1), (b, 2)`.
    pub fn rectangular(axes: &[Vec<f64>]) -> Result<Vec<SchedulingPoint>, GainSchedError> {
        for (axis, values) in axes.iter().enumerate() {
            if values.is_empty() {
                return Err(GainSchedError::EmptyAxis(axis))
            }
        }

        let mut points = vec![Vec::with_capacity(axes.len())];

        for values in axes {
            points = points
                .into_iter()
                .flat_map(|prefix| values.iter().map(move |&v| {
                    let mut p = prefix.clone();
                    p.push(v);
                    p
                }))
                .collect();
        }

        points.into_iter().map(SchedulingPoint::new).collect()
    }
}
