//! End-to-end tests of gain scheduling on the kinematic car.

use std::f64::consts::PI;
use std::sync::Arc;

use approx::assert_relative_eq;
use nalgebra::{DMatrix, DVector};

use gs_lib::{
    block::{Block, BlockError, BlockSchema},
    gain_sched::{design_gain, GainInterpolator, GainTable, InterpMethod, SchedulingGrid, SchedulingPoint},
    interconnect::InterconnectError,
    lqr::LqrWeights,
    plant::{KinematicCar, VehicleParams},
    scenario::{self, ScenarioError},
    sim,
    traj_ctrl::StatusReport,
    traj_gen::{CircularArc, StraightLine}
};
use util::maths::linspace;

fn schedule_params() -> gs_lib::gain_sched::Params {
    util::params::from_str(r#"
        speeds_ms = [2.0, 10.0, 20.0]
        heading_min_rad = -3.141592653589793
        heading_max_rad = 3.141592653589793
        num_headings = 4
        q_diag = [1.0, 1.0, 1.0]
        r_diag = [1.0, 1.0]
        method = "linear"
        schedule_on = ["vd", "thetad"]
    "#).unwrap()
}

/// A straight-line generator which publishes its steering feedforward as
/// `delta_d` rather than `deltad`.
struct MisnamedTraj {
    schema: BlockSchema
}

impl Block for MisnamedTraj {
    fn name(&self) -> &str {
        "trajgen"
    }

    fn schema(&self) -> &BlockSchema {
        &self.schema
    }

    fn direct_feedthrough(&self) -> bool {
        false
    }

    fn output(&self, t: f64, _x: &DVector<f64>, _u: &DVector<f64>)
        -> Result<DVector<f64>, BlockError>
    {
        Ok(DVector::from_vec(vec![10.0 * t, 0.0, 0.0, 10.0, 0.0]))
    }
}

fn car() -> KinematicCar {
    KinematicCar::new(VehicleParams::default()).unwrap()
}

#[test]
fn grid_query_matches_direct_design() {
    let car = car();
    let weights = LqrWeights::from_diagonals(&[1.0, 1.0, 1.0], &[1.0, 1.0]);

    let headings = linspace(-PI, PI, 4);
    let points = SchedulingGrid::rectangular(&[vec![2.0, 10.0, 20.0], headings.clone()]).unwrap();
    let table = Arc::new(GainTable::design(&car, points, &weights).unwrap());

    assert_eq!(table.len(), 12);
    assert_eq!(table.grid().unwrap().shape(), vec![3, 4]);

    // The node at speed 10, heading pi/3
    let query = [10.0, headings[2]];
    assert_relative_eq!(query[1], PI / 3.0, epsilon = 1e-12);

    let interp = GainInterpolator::new(table.clone(), InterpMethod::Linear).unwrap();
    let scheduled = interp.interpolate(&query).unwrap();

    let direct = design_gain(&car, &SchedulingPoint::new(query.to_vec()).unwrap(), &weights)
        .unwrap();

    assert_eq!(scheduled.shape(), (2, 3));
    assert_relative_eq!(scheduled, direct, epsilon = 1e-9);
}

#[test]
fn gains_rotate_with_heading() {
    let car = car();
    let table = scenario::design_table(&car, &schedule_params()).unwrap();

    // Q = I is invariant under rotation, so each gain is the straight-ahead
    // regulator of the longitudinal and lateral errors rotated by the heading.
    // The lateral loop gives [1, sqrt(1 + 2 L)], independent of speed.
    let k_theta = (1.0 + 2.0 * car.params().wheelbase_m).sqrt();

    for (p, k) in table.points().iter().zip(table.gains().iter()) {
        let (s, c) = p[1].sin_cos();
        let expected = DMatrix::from_row_slice(2, 3, &[
            c, s, 0.0,
            -s, c, k_theta
        ]);
        assert_relative_eq!(*k, expected, epsilon = 1e-6);
    }
}

#[test]
fn closed_loop_tracks_straight_line() {
    let car = car();
    let params = schedule_params();
    let table = Arc::new(scenario::design_table(&car, &params).unwrap());

    let traj = Box::new(StraightLine::new(10.0, 0.0, 0.0).unwrap());
    let system = scenario::closed_loop(&car, table, &params, traj).unwrap();

    assert_eq!(system.schema().num_inputs(), 0);
    assert_eq!(system.schema().num_states(), 3);

    let trace = sim::simulate(
        &system,
        &sim::Params { t_final_s: 15.0, dt_s: 0.01 },
        &DVector::from_vec(vec![0.0, -1.0, 0.0]),
        |_| DVector::zeros(0)
    ).unwrap();

    let y0 = &trace.outputs[0];
    let initial = StatusReport::from_poses([y0[0], y0[1], y0[2]], [y0[3], y0[4], y0[5]]);
    assert_relative_eq!(initial.lat_error_m, -1.0, epsilon = 1e-12);

    let last = scenario::final_report(&trace).unwrap();
    assert!(last.lat_error_m.abs() < 0.05, "lateral error {}", last.lat_error_m);
    assert!(last.long_error_m.abs() < 0.05, "longitudinal error {}", last.long_error_m);
    assert!(last.head_error_rad.abs() < 0.05, "heading error {}", last.head_error_rad);

    let reports = scenario::tracking_reports(&trace).unwrap();
    assert_eq!(reports.len(), trace.len());
    assert_relative_eq!(reports[0].lat_error_m, -1.0, epsilon = 1e-12);
    assert_eq!(reports.last().unwrap().lat_error_m, last.lat_error_m);

    // Controller outputs stay finite
    let delta = trace.output_series("delta").unwrap();
    assert!(delta.iter().all(|d| d.is_finite()));
}

#[test]
fn closed_loop_on_arc_is_finite() {
    let car = car();
    let mut params = schedule_params();
    params.method = InterpMethod::Nearest;
    let table = Arc::new(scenario::design_table(&car, &params).unwrap());

    let traj = Box::new(CircularArc::new(5.0, 30.0, car.params().wheelbase_m).unwrap());
    let system = scenario::closed_loop(&car, table, &params, traj).unwrap();

    let trace = sim::simulate(
        &system,
        &sim::Params { t_final_s: 5.0, dt_s: 0.01 },
        &DVector::from_vec(vec![0.0, 0.0, 0.0]),
        |_| DVector::zeros(0)
    ).unwrap();

    assert!(trace.states.iter().all(|x| x.iter().all(|v| v.is_finite())));
}

#[test]
fn misnamed_signal_fails_wiring() {
    let car = car();
    let params = schedule_params();
    let table = Arc::new(scenario::design_table(&car, &params).unwrap());

    let traj = Box::new(MisnamedTraj {
        schema: BlockSchema::new(
            Vec::<String>::new(),
            vec!["xd", "yd", "thetad", "vd", "delta_d"],
            Vec::<String>::new()
        ).unwrap()
    });

    match scenario::closed_loop(&car, table, &params, traj) {
        Err(ScenarioError::Interconnect(InterconnectError::UnconnectedInput { signal, block })) => {
            assert_eq!(signal, "deltad");
            assert_eq!(block, scenario::CTRL_BLOCK_NAME);
        },
        r => panic!("Expected an unconnected input, got {:?}", r.err())
    }
}
