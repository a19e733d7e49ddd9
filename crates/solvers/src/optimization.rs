//! Solvers for nonlinear programs — minimizing a smooth cost subject to
//! bounds and smooth constraints.
//!
//! A [`NonlinearProgram`] exposes its cost, constraints and their first
//! derivatives at a point `x`. Solvers in this module drive `x` toward a
//! feasible local minimum.
//!
//! # Solvers
//!
//! - [`sqp`] — sequential quadratic programming with a quasi-Newton Hessian
//!   and an l1 exact-penalty line search
//!
//! [`NonlinearProgram`]: dirtran_core::NonlinearProgram

mod evaluate;

pub use evaluate::{EvalError, Evaluation, evaluate};

pub mod sqp;
