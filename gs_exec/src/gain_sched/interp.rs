//! Gain interpolation

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use log::debug;
use nalgebra::DMatrix;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

// Internal
use super::{GainSchedError, GainTable, RectGrid};
use util::maths::{clamp, lin_map, norm};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Produces a gain for any query point of a table's dimension.
#[derive(Debug, Clone)]
pub struct GainInterpolator {
    table: Arc<GainTable>,
    method: InterpMethod
}

/// Position of a clamped query coordinate along one grid axis.
#[derive(Debug, Clone, Copy)]
struct AxisBracket {
    low: usize,
    upp: usize,
    alpha: f64
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Interpolation methods.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpMethod {
    /// Multilinear interpolation over a rectangular grid, clamped to the grid
    /// bounds.
    Linear,

    /// Gain of the Euclidean-nearest table point.
    Nearest
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FromStr for InterpMethod {
    type Err = GainSchedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linear" => Ok(InterpMethod::Linear),
            "nearest" => Ok(InterpMethod::Nearest),
            _ => Err(GainSchedError::UnknownMethod(s.to_string()))
        }
    }
}

impl fmt::Display for InterpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterpMethod::Linear => write!(f, "linear"),
            InterpMethod::Nearest => write!(f, "nearest")
        }
    }
}

impl GainInterpolator {
    /// Create a new interpolator over the table.
    ///
    /// Linear interpolation requires the table to form a rectangular grid.
    pub fn new(table: Arc<GainTable>, method: InterpMethod) -> Result<Self, GainSchedError> {
        if method == InterpMethod::Linear && table.len() > 1 && table.grid().is_none() {
            return Err(GainSchedError::NotRectangularGrid)
        }

        debug!("GainInterpolator created: {} over {} entries", method, table.len());

        Ok(Self { table, method })
    }

    pub fn table(&self) -> &GainTable {
        &self.table
    }

    /// The gain at the query point.
    pub fn interpolate(&self, query: &[f64]) -> Result<DMatrix<f64>, GainSchedError> {
        let expected = self.table.point_dim();
        if query.len() != expected {
            return Err(GainSchedError::QueryDimension { expected, found: query.len() })
        }
        if query.iter().any(|v| !v.is_finite()) {
            return Err(GainSchedError::NonFiniteQuery)
        }

        if self.table.len() == 1 {
            return Ok(self.table.gains()[0].clone())
        }

        match (self.method, self.table.grid()) {
            (InterpMethod::Linear, Some(grid)) => Ok(self.multilinear(grid, query)),
            (InterpMethod::Linear, None) => Err(GainSchedError::NotRectangularGrid),
            (InterpMethod::Nearest, _) => Ok(self.nearest(query))
        }
    }

    fn multilinear(&self, grid: &RectGrid, query: &[f64]) -> DMatrix<f64> {
        let brackets: Vec<AxisBracket> = grid.axes()
            .iter()
            .zip(query.iter())
            .map(|(axis, &q)| AxisBracket::new(axis, q))
            .collect();

        let (m, n) = self.table.gain_shape();
        let mut gain = DMatrix::zeros(m, n);
        let mut node = vec![0; brackets.len()];

        // Visit each corner of the enclosing cell
        for corner in 0..(1usize << brackets.len()) {
            let mut weight = 1.0;

            for (d, b) in brackets.iter().enumerate() {
                if corner & (1 << d) == 0 {
                    weight *= 1.0 - b.alpha;
                    node[d] = b.low;
                }
                else {
                    weight *= b.alpha;
                    node[d] = b.upp;
                }
            }

            if weight == 0.0 {
                continue
            }

            gain += &self.table.gains()[grid.entry(&node)] * weight;
        }

        gain
    }

    fn nearest(&self, query: &[f64]) -> DMatrix<f64> {
        let (index, _) = self.table.points()
            .iter()
            .enumerate()
            .min_by_key(|(_, p)| {
                OrderedFloat(norm(p.as_slice(), query).unwrap_or(f64::INFINITY))
            })
            .unwrap_or((0, &self.table.points()[0]));

        self.table.gains()[index].clone()
    }
}

impl AxisBracket {
    fn new(axis: &[f64], q: f64) -> Self {
        let last = axis.len() - 1;
        if last == 0 {
            return Self { low: 0, upp: 0, alpha: 0.0 }
        }

        let q = clamp(&q, &axis[0], &axis[last]);
        let upp = axis.partition_point(|v| *v <= q).max(1).min(last);
        let low = upp - 1;

        Self {
            low,
            upp,
            alpha: lin_map((axis[low], axis[upp]), (0.0, 1.0), q)
        }
    }
}
