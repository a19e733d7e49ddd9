//! Core traits and types for direct-transcription trajectory optimization.
//!
//! This crate defines the shared abstractions that plants, solvers, and the
//! transcription layer build on:
//!
//! - [`Scalar`] — the numeric capability every dynamics computation is
//!   written against, implemented by `f64` and the forward-mode [`Dual`]
//! - [`MultibodyPlant`] — a mechanical system providing mass matrix, bias
//!   forces, actuation and position constraint terms
//! - [`NonlinearProgram`] — a smooth NLP with exact first derivatives
//! - [`NlpSolver`] — a backend that solves a [`NonlinearProgram`]
//! - [`Observer`] — receives solver events and optionally returns control actions

pub mod linalg;
mod observer;
mod plant;
pub mod problems;
mod scalar;
mod solver;

pub use observer::{Borrowed, Observer};
pub use plant::MultibodyPlant;
pub use problems::nonlinear::{ConstraintEvaluation, CostEvaluation};
pub use problems::{Bounds, NonlinearProgram};
pub use scalar::{Dual, Scalar, gradient, jacobian, seed, values};
pub use solver::{NlpSolution, NlpSolver, SolutionStatus};
