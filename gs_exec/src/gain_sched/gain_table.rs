//! Gain table construction

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::collections::HashMap;
use log::{debug, info};
use nalgebra::DMatrix;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Serialize, Serializer, ser::SerializeStruct};

// Internal
use super::{DesignError, GainSchedError, SchedulingPoint};
use crate::linearise::{linearise, DEFAULT_EPS};
use crate::lqr::{lqr, LqrWeights};
use crate::plant::Scheduled;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An immutable set of (scheduling point, gain) entries.
#[derive(Debug, Clone)]
pub struct GainTable {
    points: Vec<SchedulingPoint>,
    gains: Vec<DMatrix<f64>>,
    grid: Option<RectGrid>
}

/// The rectangular grid layout of a table, if its points form one.
#[derive(Debug, Clone, PartialEq)]
pub struct RectGrid {
    /// Sorted unique values along each axis.
    axes: Vec<Vec<f64>>,

    /// Row-major strides of the flat grid index.
    strides: Vec<usize>,

    /// Maps a flat grid index to the table entry at that node.
    entries: Vec<usize>
}

/// Serialisable view of a single table entry.
#[derive(Serialize)]
struct EntryRecord<'a> {
    point: &'a [f64],
    gain: Vec<Vec<f64>>
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl GainTable {
    /// Create a new table from matching lists of points and gains.
    ///
    /// Fails if the table is empty, if point dimensions or gain shapes
    /// differ, if any point is repeated or if any gain is not finite.
    pub fn new(
        points: Vec<SchedulingPoint>,
        gains: Vec<DMatrix<f64>>
    ) -> Result<Self, GainSchedError> {
        if points.len() != gains.len() {
            return Err(GainSchedError::EntryCount {
                points: points.len(),
                gains: gains.len()
            })
        }
        if points.is_empty() {
            return Err(GainSchedError::EmptyTable)
        }

        let dim = points[0].dim();
        let shape = gains[0].shape();

        let mut seen: HashMap<Vec<OrderedFloat<f64>>, usize> = HashMap::new();

        for (index, (point, gain)) in points.iter().zip(gains.iter()).enumerate() {
            if point.dim() != dim {
                return Err(GainSchedError::PointDimension {
                    index,
                    expected: dim,
                    found: point.dim()
                })
            }
            if gain.shape() != shape {
                return Err(GainSchedError::GainShape {
                    index,
                    expected: shape,
                    found: gain.shape()
                })
            }
            if gain.iter().any(|v| !v.is_finite()) {
                return Err(GainSchedError::NonFiniteGain(index))
            }
            if let Some(&first) = seen.get(&ordered_key(point)) {
                return Err(GainSchedError::DuplicatePoint { index, first })
            }
            seen.insert(ordered_key(point), index);
        }

        let grid = RectGrid::detect(&points);

        match grid {
            Some(ref g) => info!(
                "Gain table built: {} entries of {}x{} gains on a {:?} grid",
                points.len(), shape.0, shape.1, g.shape()
            ),
            None => info!(
                "Gain table built: {} scattered entries of {}x{} gains",
                points.len(), shape.0, shape.1
            )
        }

        Ok(Self { points, gains, grid })
    }

    /// A table holding a single gain, returned for every query.
    pub fn constant(gain: DMatrix<f64>) -> Result<Self, GainSchedError> {
        Self::new(vec![SchedulingPoint::empty()], vec![gain])
    }

    /// Build a table by evaluating `design` at each point.
    ///
    /// Points are designed in parallel. If any design fails the first failing
    /// entry, in point order, is reported and no table is produced.
    pub fn from_fn<F, E>(
        points: Vec<SchedulingPoint>,
        design: F
    ) -> Result<Self, GainSchedError>
    where
        F: Fn(&SchedulingPoint) -> Result<DMatrix<f64>, E> + Sync,
        E: std::error::Error + Send + Sync + 'static
    {
        if points.is_empty() {
            return Err(GainSchedError::EmptyTable)
        }

        let results: Vec<Result<DMatrix<f64>, E>> = points
            .par_iter()
            .map(|p| design(p))
            .collect();

        let mut gains = Vec::with_capacity(points.len());

        for (index, (point, result)) in points.iter().zip(results).enumerate() {
            match result {
                Ok(k) => {
                    debug!("Designed gain {} at {}: {}", index, point, k);
                    gains.push(k)
                },
                Err(e) => return Err(GainSchedError::Design {
                    index,
                    point: point.as_slice().to_vec(),
                    source: Box::new(e)
                })
            }
        }

        Self::new(points, gains)
    }

    /// Design an LQR gain for the plant at each point, with fixed weights.
    pub fn design<P>(
        plant: &P,
        points: Vec<SchedulingPoint>,
        weights: &LqrWeights
    ) -> Result<Self, GainSchedError>
    where
        P: Scheduled + ?Sized
    {
        Self::from_fn(points, |p| design_gain(plant, p, weights))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Dimension of the table's scheduling points.
    pub fn point_dim(&self) -> usize {
        self.points[0].dim()
    }

    /// Shape `(m, n)` of the table's gains.
    pub fn gain_shape(&self) -> (usize, usize) {
        self.gains[0].shape()
    }

    pub fn points(&self) -> &[SchedulingPoint] {
        &self.points
    }

    pub fn gains(&self) -> &[DMatrix<f64>] {
        &self.gains
    }

    /// The grid layout, if the points form a full rectangular grid.
    pub fn grid(&self) -> Option<&RectGrid> {
        self.grid.as_ref()
    }

    /// Index of the entry with exactly the given point.
    pub fn find(&self, point: &[f64]) -> Option<usize> {
        self.points.iter().position(|p| p.as_slice() == point)
    }
}

impl Serialize for GainTable {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer
    {
        let entries: Vec<EntryRecord> = self.points
            .iter()
            .zip(self.gains.iter())
            .map(|(p, k)| EntryRecord {
                point: p.as_slice(),
                gain: k.row_iter().map(|r| r.iter().copied().collect()).collect()
            })
            .collect();

        let mut s = serializer.serialize_struct("GainTable", 2)?;
        s.serialize_field("grid_shape", &self.grid.as_ref().map(|g| g.shape()))?;
        s.serialize_field("entries", &entries)?;
        s.end()
    }
}

impl RectGrid {
    /// Detect whether the points form the Cartesian product of their unique
    /// per-axis values. Points are assumed unique and of equal dimension.
    fn detect(points: &[SchedulingPoint]) -> Option<Self> {
        let dim = points[0].dim();

        let axes: Vec<Vec<f64>> = (0..dim)
            .map(|d| {
                let mut values: Vec<OrderedFloat<f64>> = points
                    .iter()
                    .map(|p| OrderedFloat(p[d]))
                    .collect();
                values.sort();
                values.dedup();
                values.into_iter().map(|v| v.0).collect()
            })
            .collect();

        let num_nodes: usize = axes.iter().map(|a| a.len()).product();
        if num_nodes != points.len() {
            return None
        }

        let mut strides = vec![1; dim];
        for d in (0..dim.saturating_sub(1)).rev() {
            strides[d] = strides[d + 1] * axes[d + 1].len();
        }

        // Unique points and a matching node count make this map a bijection
        let mut entries = vec![0; num_nodes];
        for (i, p) in points.iter().enumerate() {
            let mut flat = 0;
            for d in 0..dim {
                let idx = axes[d]
                    .binary_search_by(|v| OrderedFloat(*v).cmp(&OrderedFloat(p[d])))
                    .ok()?;
                flat += idx * strides[d];
            }
            entries[flat] = i;
        }

        Some(Self { axes, strides, entries })
    }

    pub fn axes(&self) -> &[Vec<f64>] {
        &self.axes
    }

    /// Number of nodes along each axis.
    pub fn shape(&self) -> Vec<usize> {
        self.axes.iter().map(|a| a.len()).collect()
    }

    /// The table entry at the given per-axis node indices.
    pub fn entry(&self, node: &[usize]) -> usize {
        let flat: usize = node.iter().zip(self.strides.iter()).map(|(i, s)| i * s).sum();
        self.entries[flat]
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Design the LQR gain of the plant linearised at a single scheduling point.
pub fn design_gain<P>(
    plant: &P,
    point: &SchedulingPoint,
    weights: &LqrWeights
) -> Result<DMatrix<f64>, DesignError>
where
    P: Scheduled + ?Sized
{
    let op = plant.operating_point(point)?;
    let lin = linearise(plant, &op, DEFAULT_EPS)?;
    let sol = lqr(&lin.a, &lin.b, weights)?;

    Ok(sol.k)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn ordered_key(point: &SchedulingPoint) -> Vec<OrderedFloat<f64>> {
    point.as_slice().iter().map(|&v| OrderedFloat(v)).collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::gain_sched::SchedulingGrid;
    use crate::plant::{KinematicCar, VehicleParams};

    fn pt(v: &[f64]) -> SchedulingPoint {
        SchedulingPoint::new(v.to_vec()).unwrap()
    }

    fn k(v: f64) -> DMatrix<f64> {
        DMatrix::from_element(1, 2, v)
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            GainTable::new(vec![], vec![]),
            Err(GainSchedError::EmptyTable)
        ));
        assert!(matches!(
            GainTable::new(vec![pt(&[0.0])], vec![]),
            Err(GainSchedError::EntryCount { points: 1, gains: 0 })
        ));
        assert!(matches!(
            GainTable::new(vec![pt(&[0.0]), pt(&[1.0, 2.0])], vec![k(0.0), k(1.0)]),
            Err(GainSchedError::PointDimension { index: 1, expected: 1, found: 2 })
        ));
        assert!(matches!(
            GainTable::new(vec![pt(&[0.0]), pt(&[1.0])], vec![k(0.0), DMatrix::zeros(2, 2)]),
            Err(GainSchedError::GainShape { index: 1, .. })
        ));
        assert!(matches!(
            GainTable::new(vec![pt(&[0.0]), pt(&[1.0]), pt(&[0.0])], vec![k(0.0), k(1.0), k(2.0)]),
            Err(GainSchedError::DuplicatePoint { index: 2, first: 0 })
        ));
        assert!(matches!(
            GainTable::new(vec![pt(&[0.0])], vec![k(f64::NAN)]),
            Err(GainSchedError::NonFiniteGain(0))
        ));
    }

    #[test]
    fn test_grid_detection() {
        let points = SchedulingGrid::rectangular(&[
            vec![2.0, 10.0, 20.0],
            vec![-1.0, 1.0]
        ]).unwrap();
        let gains = (0..points.len()).map(|i| k(i as f64)).collect();

        let table = GainTable::new(points, gains).unwrap();
        let grid = table.grid().unwrap();
        assert_eq!(grid.shape(), vec![3, 2]);
        assert_eq!(grid.entry(&[0, 0]), 0);
        assert_eq!(grid.entry(&[1, 1]), 3);
        assert_eq!(grid.entry(&[2, 0]), 4);

        // Reordered points still form a grid
        let table = GainTable::new(
            vec![pt(&[1.0, 1.0]), pt(&[0.0, 0.0]), pt(&[1.0, 0.0]), pt(&[0.0, 1.0])],
            vec![k(0.0), k(1.0), k(2.0), k(3.0)]
        ).unwrap();
        let grid = table.grid().unwrap();
        assert_eq!(grid.entry(&[0, 0]), 1);
        assert_eq!(grid.entry(&[0, 1]), 3);
        assert_eq!(grid.entry(&[1, 0]), 2);
        assert_eq!(grid.entry(&[1, 1]), 0);

        // A missing node means scattered
        let table = GainTable::new(
            vec![pt(&[0.0, 0.0]), pt(&[1.0, 0.0]), pt(&[0.0, 1.0])],
            vec![k(0.0), k(1.0), k(2.0)]
        ).unwrap();
        assert!(table.grid().is_none());
    }

    #[test]
    fn test_constant() {
        let table = GainTable::constant(k(4.0)).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.point_dim(), 0);
        assert_eq!(table.gain_shape(), (1, 2));
        assert_eq!(table.grid().unwrap().shape(), Vec::<usize>::new());
    }

    #[test]
    fn test_from_fn_reports_first_failure() {
        let points = SchedulingGrid::rectangular(&[vec![0.0, 1.0, 2.0, 3.0]]).unwrap();

        let result = GainTable::from_fn(points, |p| {
            if p[0] >= 2.0 {
                Err(GainSchedError::NonFiniteQuery)
            }
            else {
                Ok(k(p[0]))
            }
        });

        match result {
            Err(GainSchedError::Design { index: 2, point, .. }) => assert_eq!(point, vec![2.0]),
            r => panic!("Expected a design error at entry 2, got {:?}", r)
        }
    }

    #[test]
    fn test_design_zero_speed_fails() {
        let car = KinematicCar::new(VehicleParams::default()).unwrap();
        let weights = LqrWeights::from_diagonals(&[1.0, 1.0, 1.0], &[1.0, 1.0]);

        // At zero speed the heading is uncontrollable
        let points = SchedulingGrid::rectangular(&[vec![0.0, 10.0], vec![0.0]]).unwrap();

        match GainTable::design(&car, points, &weights) {
            Err(GainSchedError::Design { index: 0, .. }) => (),
            r => panic!("Expected a design error at entry 0, got {:?}", r)
        }
    }

    #[test]
    fn test_serialise() {
        let table = GainTable::new(
            vec![pt(&[0.0]), pt(&[1.0])],
            vec![
                DMatrix::from_row_slice(1, 2, &[1.0, 2.0]),
                DMatrix::from_row_slice(1, 2, &[3.0, 4.0])
            ]
        ).unwrap();

        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["grid_shape"], serde_json::json!([2]));
        assert_eq!(json["entries"][1]["point"], serde_json::json!([1.0]));
        assert_eq!(json["entries"][1]["gain"], serde_json::json!([[3.0, 4.0]]));
    }
}
