//! # Gain-scheduled tracking library.
//!
//! This library allows other crates in the workspace, and the integration
//! tests, to access the items defined inside the gain scheduling crate.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

/// Blocks - named input/output units with an explicit signal schema
pub mod block;

/// Gain scheduling - gain tables, interpolation and the feedback law
pub mod gain_sched;

/// Interconnection - wires blocks into a composite by signal name
pub mod interconnect;

/// Linearisation - finite difference Jacobians of a plant
pub mod linearise;

/// LQR - continuous-time linear quadratic regulator design
pub mod lqr;

/// Executable parameters
pub mod params;

/// Plant models, including the kinematic car
pub mod plant;

/// Closed-loop kinematic car tracking scenario
pub mod scenario;

/// Simulation - fixed step RK4 integration of a block
pub mod sim;

/// Trajectory control - the gain-scheduled tracking block
pub mod traj_ctrl;

/// Trajectory generators - desired state and feedforward input over time
pub mod traj_gen;
