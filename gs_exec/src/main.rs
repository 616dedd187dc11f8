//! Main gain-scheduled tracking executable entry point.
//!
//! # Architecture
//!
//! The execution consists of:
//!
//!     - Initialise the session and logging
//!     - Load the parameters
//!     - Design the gain table across the scheduling grid
//!     - Wire the trajectory generator, tracking controller and vehicle
//!     - Simulate the closed loop
//!     - Archive the trace, the tracking errors and the gain table to the
//!       session
//!
//! An optional single argument gives the path of the parameter file, which
//! otherwise defaults to `params/gs_exec.toml` under the software root.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use std::env;
use color_eyre::{Report, eyre::{WrapErr, eyre}};
use nalgebra::DVector;

// Internal
use gs_lib::{params::GsExecParams, scenario, sim};
use util::{
    archive::{Archived, Archiver},
    logger::{logger_init, LevelFilter},
    session::Session
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Default parameter file, relative to the params directory.
const PARAMS_FILE: &str = "gs_exec.toml";

/// Lateral error above which the run is reported as not converged.
const LAT_ERROR_WARN_LIMIT_M: f64 = 0.1;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {

    // ---- EARLY INITIALISATION ----

    color_eyre::install()?;

    // Initialise session
    let session = Session::new(
        "gs_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // Pending saves are flushed by the exit even when a stage fails
    let result = run(&session);

    session.exit();

    result
}

/// Run every stage of the execution within the session.
fn run(session: &Session) -> Result<(), Report> {

    // Initialise logger
    logger_init(LevelFilter::Debug, session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Gain-Scheduled Tracking Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let args: Vec<String> = env::args().collect();

    debug!("CLI arguments: {:?}", args);

    let params: GsExecParams = match args.len() {
        1 => util::params::load(PARAMS_FILE)
            .wrap_err("Could not load exec params")?,
        2 => {
            info!("Loading parameters from \"{}\"", &args[1]);
            util::params::load_path(&args[1])
                .wrap_err("Could not load exec params")?
        },
        _ => return Err(eyre!(
            "Expected either zero or one argument, found {}", args.len() - 1
        ))
    };

    info!("Exec parameters loaded");
    debug!("{:#?}", params);

    // ---- BUILD SCENARIO ----

    let scen = scenario::build(&params)
        .wrap_err("Failed to build the closed loop")?;

    info!(
        "Gain table designed with {} entries on the {:?} grid\n",
        scen.table.len(),
        scen.table.grid().map(|g| g.shape())
    );

    session.save("gain_table.json", (*scen.table).clone());

    // ---- SIMULATE ----

    let mut trace = sim::simulate(
        &scen.system,
        &params.sim,
        &scen.x0,
        |_| DVector::zeros(0)
    ).wrap_err("Simulation failed")?;

    info!("Simulation complete, {} samples recorded", trace.len());

    // ---- ARCHIVE ----

    let mut arch = Archiver::from_path(session, "trace.csv")
        .wrap_err("Failed to create the trace archive")?;
    trace.write(&mut arch)
        .wrap_err("Failed to write the trace archive")?;

    if let Some(reports) = scenario::tracking_reports(&trace) {
        let mut arch = Archiver::from_path(session, "tracking_errors.csv")
            .wrap_err("Failed to create the tracking error archive")?;
        for r in reports {
            arch.serialise(r)
                .wrap_err("Failed to write the tracking error archive")?;
        }
    }

    // ---- REPORT ----

    match scenario::final_report(&trace) {
        Some(r) => {
            info!(
                "Final tracking errors: lateral {:.4} m, longitudinal {:.4} m, heading {:.4} rad",
                r.lat_error_m, r.long_error_m, r.head_error_rad
            );

            if r.lat_error_m.abs() > LAT_ERROR_WARN_LIMIT_M {
                warn!(
                    "Lateral error {:.4} m exceeds {} m at the end of the run",
                    r.lat_error_m, LAT_ERROR_WARN_LIMIT_M
                );
            }
        },
        None => warn!("Trace does not contain the tracking signals")
    }

    Ok(())
}
