//! Trajectory optimization for constrained multibody systems by direct
//! transcription.
//!
//! A trajectory is sampled at `N` instants separated by variable time steps.
//! Every sample's positions, velocities, inputs and constraint forces are
//! decision variables, and adjacent samples are tied together by the plant's
//! dynamics discretized with backward Euler. The resulting nonlinear program
//! is handed to an [`NlpSolver`](dirtran_core::NlpSolver), SQP by default.
//!
//! The building blocks, from the bottom up:
//!
//! - [`KinematicsCache`] / [`KinematicsCacheWithV`]: memoize plant
//!   kinematics between evaluations at the same point
//! - [`GeneralizedConstraintForce`]: map multipliers to generalized forces,
//!   such as [`PositionConstraintForce`] and [`JointLimitForce`]
//! - [`DirectTranscriptionConstraint`]: the dynamics defect of one interval
//! - [`DirectTranscription`]: the whole program, from variables and costs
//!   through solving and reading back the solution
//!
//! # Example
//!
//! Swing a pendulum from hanging to horizontal with the least effort.
//!
//! ```no_run
//! use std::f64::consts::FRAC_PI_2;
//!
//! use dirtran_core::linalg;
//! use dirtran_plants::Pendulum;
//! use dirtran_trajopt::DirectTranscription;
//!
//! # fn main() -> Result<(), dirtran_trajopt::Error> {
//! let plant = Pendulum::default();
//! let mut program = DirectTranscription::new(&plant, 11, 0.01, 0.1)?;
//!
//! let q = program.generalized_positions().clone();
//! let v = program.generalized_velocities().clone();
//! program.add_bounding_box_constraint(-FRAC_PI_2, -FRAC_PI_2, q.column(0).iter())?;
//! program.add_bounding_box_constraint(0.0, 0.0, q.column(10).iter())?;
//! program.add_bounding_box_constraint(0.0, 0.0, v.column(0).iter())?;
//! program.add_bounding_box_constraint(0.0, 0.0, v.column(10).iter())?;
//! program.add_running_cost(|sample| linalg::squared_norm(&sample.u))?;
//!
//! program.compile()?;
//! let status = program.solve()?;
//! println!("{status:?}: u = {}", program.get_solution(program.inputs())?);
//! # Ok(())
//! # }
//! ```

mod cache;
mod constraint;
mod error;
mod force;
mod program;
mod transcription;
mod variables;

pub use cache::{KinematicsCache, KinematicsCacheWithV};
pub use constraint::{Constraint, LinearConstraint};
pub use error::Error;
pub use force::{GeneralizedConstraintForce, JointLimitForce, PositionConstraintForce};
pub use program::{DirectTranscription, Phase, Sample};
pub use transcription::{DirectTranscriptionConstraint, InputLayout, TranscriptionInput};
pub use variables::{LinearExpression, SolutionValue, Variable};
