//! # Fixed-step simulation
//!
//! Integrates a block with the classic fourth order Runge-Kutta method and
//! records its state and outputs at every step.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info};
use nalgebra::DVector;
use serde::Deserialize;

// Internal
use crate::block::{Block, BlockError};
use util::archive::{ArchiveError, Archived, Archiver};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for a simulation run.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Params {
    /// Final time, the run starts at zero.
    ///
    /// Units: seconds
    pub t_final_s: f64,

    /// Maximum integration step. The step actually used divides the horizon
    /// into a whole number of steps.
    ///
    /// Units: seconds
    pub dt_s: f64
}

/// The recorded history of a simulation.
#[derive(Debug, Clone)]
pub struct SimTrace {
    pub state_names: Vec<String>,
    pub output_names: Vec<String>,
    pub times: Vec<f64>,
    pub states: Vec<DVector<f64>>,
    pub outputs: Vec<DVector<f64>>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur during simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("Time step must be positive and finite, found {0}")]
    InvalidStep(f64),

    #[error("Final time must be positive and finite, found {0}")]
    InvalidHorizon(f64),

    #[error("Initial state has {found} elements, the system has {expected} states")]
    StateDimension {
        expected: usize,
        found: usize
    },

    #[error("External input at t = {t} has {found} elements, the system has {expected} inputs")]
    InputDimension {
        t: f64,
        expected: usize,
        found: usize
    },

    #[error("State became non-finite at t = {0}")]
    NonFinite(f64),

    #[error("Block evaluation failed at t = {t}: {source}")]
    Block {
        t: f64,
        #[source]
        source: BlockError
    }
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimTrace {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// The time history of the named output.
    pub fn output_series(&self, name: &str) -> Option<Vec<f64>> {
        let i = self.output_names.iter().position(|n| n == name)?;
        Some(self.outputs.iter().map(|y| y[i]).collect())
    }

    /// The last recorded value of the named output.
    pub fn final_output(&self, name: &str) -> Option<f64> {
        let i = self.output_names.iter().position(|n| n == name)?;
        self.outputs.last().map(|y| y[i])
    }
}

impl Archived for SimTrace {
    fn write(&mut self, archiver: &mut Archiver) -> Result<(), ArchiveError> {
        let header: Vec<&str> = std::iter::once("t")
            .chain(self.state_names.iter().map(|s| s.as_str()))
            .chain(self.output_names.iter().map(|s| s.as_str()))
            .collect();
        archiver.write_header(&header)?;

        let mut row = Vec::with_capacity(header.len());
        for ((t, x), y) in self.times.iter().zip(self.states.iter()).zip(self.outputs.iter()) {
            row.clear();
            row.push(*t);
            row.extend(x.iter());
            row.extend(y.iter());
            archiver.write_row(&row)?;
        }

        archiver.flush()
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Simulate the system from `x0` with the external inputs given as a
/// function of time.
///
/// The outputs are evaluated once per recorded sample, including the initial
/// and final times.
pub fn simulate<B, F>(
    system: &B,
    params: &Params,
    x0: &DVector<f64>,
    inputs: F
) -> Result<SimTrace, SimError>
where
    B: Block + ?Sized,
    F: Fn(f64) -> DVector<f64>
{
    if !(params.dt_s > 0.0) || !params.dt_s.is_finite() {
        return Err(SimError::InvalidStep(params.dt_s))
    }
    if !(params.t_final_s > 0.0) || !params.t_final_s.is_finite() {
        return Err(SimError::InvalidHorizon(params.t_final_s))
    }

    let schema = system.schema();
    if x0.len() != schema.num_states() {
        return Err(SimError::StateDimension {
            expected: schema.num_states(),
            found: x0.len()
        })
    }

    // Ratios within rounding of a whole number do not gain an extra step
    let n_steps = ((params.t_final_s / params.dt_s) * (1.0 - 1e-12)).ceil().max(1.0) as usize;
    let dt = params.t_final_s / n_steps as f64;

    info!(
        "Simulating \"{}\" for {} s in {} steps of {} s",
        system.name(), params.t_final_s, n_steps, dt
    );

    let mut trace = SimTrace {
        state_names: schema.states().to_vec(),
        output_names: schema.outputs().to_vec(),
        times: Vec::with_capacity(n_steps + 1),
        states: Vec::with_capacity(n_steps + 1),
        outputs: Vec::with_capacity(n_steps + 1)
    };

    let input_at = |t: f64| -> Result<DVector<f64>, SimError> {
        let u = inputs(t);
        if u.len() != schema.num_inputs() {
            return Err(SimError::InputDimension {
                t,
                expected: schema.num_inputs(),
                found: u.len()
            })
        }
        Ok(u)
    };

    let mut x = x0.clone();

    for i_step in 0..=n_steps {
        let alpha = i_step as f64 / n_steps as f64;
        let t = alpha * params.t_final_s;

        if x.iter().any(|v| !v.is_finite()) {
            return Err(SimError::NonFinite(t))
        }

        let u = input_at(t)?;
        let y = system.output(t, &x, &u).map_err(|source| SimError::Block { t, source })?;

        trace.times.push(t);
        trace.states.push(x.clone());
        trace.outputs.push(y);

        if i_step < n_steps {
            x = rk4_step(system, dt, t, &x, &input_at)?;
        }
    }

    debug!("Simulation complete, final state {:?}", x.as_slice());

    Ok(trace)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn rk4_step<B, F>(
    system: &B,
    dt: f64,
    t: f64,
    x: &DVector<f64>,
    input_at: &F
) -> Result<DVector<f64>, SimError>
where
    B: Block + ?Sized,
    F: Fn(f64) -> Result<DVector<f64>, SimError>
{
    let f = |t: f64, x: &DVector<f64>| -> Result<DVector<f64>, SimError> {
        let u = input_at(t)?;
        system.derivative(t, x, &u).map_err(|source| SimError::Block { t, source })
    };

    let t_mid = t + 0.5 * dt;
    let k1 = f(t, x)?;
    let k2 = f(t_mid, &(x + &k1 * (0.5 * dt)))?;
    let k3 = f(t_mid, &(x + &k2 * (0.5 * dt)))?;
    let k4 = f(t + dt, &(x + &k3 * dt))?;

    Ok(x + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (dt / 6.0))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::block::BlockSchema;
    use crate::interconnect::Interconnect;
    use crate::plant::{KinematicCar, VehicleParams};
    use approx::assert_relative_eq;

    /// Undamped unit oscillator, `q'' = -q`.
    struct Oscillator {
        schema: BlockSchema
    }

    impl Block for Oscillator {
        fn name(&self) -> &str { "osc" }
        fn schema(&self) -> &BlockSchema { &self.schema }
        fn direct_feedthrough(&self) -> bool { false }

        fn derivative(&self, _t: f64, x: &DVector<f64>, _u: &DVector<f64>)
            -> Result<DVector<f64>, BlockError>
        {
            Ok(DVector::from_vec(vec![x[1], -x[0]]))
        }

        fn output(&self, _t: f64, x: &DVector<f64>, _u: &DVector<f64>)
            -> Result<DVector<f64>, BlockError>
        {
            Ok(DVector::from_vec(vec![x[0]]))
        }
    }

    fn oscillator() -> Oscillator {
        Oscillator {
            schema: BlockSchema::new(Vec::<String>::new(), vec!["q"], vec!["q", "v"]).unwrap()
        }
    }

    #[test]
    fn test_rk4_accuracy() {
        let params = Params { t_final_s: 2.0, dt_s: 0.01 };
        let trace = simulate(
            &oscillator(),
            &params,
            &DVector::from_vec(vec![1.0, 0.0]),
            |_| DVector::zeros(0)
        ).unwrap();

        assert_eq!(trace.len(), 201);
        assert_eq!(trace.times[0], 0.0);
        assert_eq!(*trace.times.last().unwrap(), 2.0);

        let q = trace.output_series("q").unwrap();
        for (t, q) in trace.times.iter().zip(q.iter()) {
            assert_relative_eq!(*q, t.cos(), epsilon = 1e-8);
        }
    }

    #[test]
    fn test_step_divides_horizon() {
        let params = Params { t_final_s: 1.0, dt_s: 0.3 };
        let trace = simulate(
            &oscillator(),
            &params,
            &DVector::from_vec(vec![1.0, 0.0]),
            |_| DVector::zeros(0)
        ).unwrap();

        assert_eq!(trace.len(), 5);
        assert_relative_eq!(trace.times[1], 0.25, epsilon = 1e-15);
        assert_eq!(*trace.times.last().unwrap(), 1.0);
    }

    #[test]
    fn test_external_inputs() {
        let car = KinematicCar::new(VehicleParams::default()).unwrap();
        let sys = Interconnect::new(
            "open_loop",
            vec![Box::new(car) as Box<dyn Block>],
            &["v", "delta"],
            &["x", "y"]
        ).unwrap();

        assert_eq!(sys.schema().inputs(), &["v".to_string(), "delta".to_string()]);

        let trace = simulate(
            &sys,
            &Params { t_final_s: 3.0, dt_s: 0.1 },
            &DVector::from_vec(vec![0.0, 1.0, 0.0]),
            |t| DVector::from_vec(vec![2.0 + t, 0.0])
        ).unwrap();

        // x = 2 t + t^2 / 2
        assert_relative_eq!(trace.final_output("x").unwrap(), 10.5, epsilon = 1e-9);
        assert_relative_eq!(trace.final_output("y").unwrap(), 1.0, epsilon = 1e-12);
        assert_eq!(trace.state_names[0], "vehicle.x");
    }

    #[test]
    fn test_errors() {
        let osc = oscillator();
        let x0 = DVector::from_vec(vec![1.0, 0.0]);
        let no_input = |_: f64| DVector::<f64>::zeros(0);

        assert!(matches!(
            simulate(&osc, &Params { t_final_s: 1.0, dt_s: 0.0 }, &x0, no_input),
            Err(SimError::InvalidStep(_))
        ));
        assert!(matches!(
            simulate(&osc, &Params { t_final_s: -1.0, dt_s: 0.1 }, &x0, no_input),
            Err(SimError::InvalidHorizon(_))
        ));
        assert!(matches!(
            simulate(&osc, &Params { t_final_s: 1.0, dt_s: 0.1 }, &DVector::zeros(3), no_input),
            Err(SimError::StateDimension { expected: 2, found: 3 })
        ));
        assert!(matches!(
            simulate(&osc, &Params { t_final_s: 1.0, dt_s: 0.1 }, &x0, |_| DVector::zeros(1)),
            Err(SimError::InputDimension { expected: 0, found: 1, .. })
        ));
    }

    #[test]
    fn test_archive() {
        let mut trace = SimTrace {
            state_names: vec!["vehicle.x".to_string()],
            output_names: vec!["x".to_string()],
            times: vec![0.0, 0.5],
            states: vec![DVector::from_vec(vec![1.0]), DVector::from_vec(vec![2.0])],
            outputs: vec![DVector::from_vec(vec![1.0]), DVector::from_vec(vec![2.0])]
        };

        let path = std::env::temp_dir().join("gs_exec_sim_test_archive.csv");
        {
            let mut arch = Archiver::from_file_path(&path).unwrap();
            trace.write(&mut arch).unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "t,vehicle.x,x\n0,1,1\n0.5,2,2\n");

        std::fs::remove_file(path).ok();
    }
}
