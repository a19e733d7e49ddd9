//! Nonlinear programming backends for dirtran.
//!
//! # Modules
//!
//! - [`optimization`] — solvers for smooth constrained programs described by
//!   [`NonlinearProgram`]
//!
//! [`NonlinearProgram`]: dirtran_core::NonlinearProgram

pub mod optimization;
