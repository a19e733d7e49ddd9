//! Capability traits for cross-solver observers.
//!
//! These traits abstract over solver-specific event and action types, enabling
//! observers to work generically across different solvers.
//!
//! # Event traits
//!
//! - [`HasObjective`] — events that carry an objective value
//! - [`HasConstraintViolation`] — events that carry a constraint violation
//!
//! # Action traits
//!
//! - [`CanStopEarly`] — actions that can signal early termination
//!
//! # Example
//!
//! ```rust
//! use dirtran_core::Observer;
//! use dirtran_observers::traits::{CanStopEarly, HasConstraintViolation, HasObjective};
//!
//! /// Stops once the iterate is feasible and the cost is below a target.
//! struct GoodEnough {
//!     target: f64,
//!     tolerance: f64,
//! }
//!
//! impl<E, A> Observer<E, A> for GoodEnough
//! where
//!     E: HasObjective + HasConstraintViolation,
//!     A: CanStopEarly,
//! {
//!     fn observe(&mut self, event: &E) -> Option<A> {
//!         let feasible = event.constraint_violation() <= self.tolerance;
//!         (feasible && event.objective() <= self.target).then(A::stop_early)
//!     }
//! }
//! ```

use dirtran_solvers::optimization::sqp;

/// An event that carries an objective value.
pub trait HasObjective {
    /// Returns the objective for this event.
    ///
    /// Returns `f64::NAN` when the event carries no objective.
    fn objective(&self) -> f64;
}

/// An event that carries a constraint violation.
pub trait HasConstraintViolation {
    /// Returns the largest constraint violation for this event.
    ///
    /// Returns `f64::NAN` when the event carries no violation.
    fn constraint_violation(&self) -> f64;
}

/// An action type that can signal early termination.
pub trait CanStopEarly {
    /// Returns the action that stops the solver early.
    fn stop_early() -> Self;
}

// --- sqp::Event ---

impl HasObjective for sqp::Event<'_> {
    fn objective(&self) -> f64 {
        match self {
            sqp::Event::Iterated { objective, .. } => *objective,
            sqp::Event::PenaltyIncreased { .. }
            | sqp::Event::SubproblemFailed { .. }
            | sqp::Event::LineSearchFailed { .. } => f64::NAN,
        }
    }
}

impl HasConstraintViolation for sqp::Event<'_> {
    fn constraint_violation(&self) -> f64 {
        match self {
            sqp::Event::Iterated {
                constraint_violation,
                ..
            } => *constraint_violation,
            sqp::Event::PenaltyIncreased { .. }
            | sqp::Event::SubproblemFailed { .. }
            | sqp::Event::LineSearchFailed { .. } => f64::NAN,
        }
    }
}

// --- CanStopEarly impls ---

impl CanStopEarly for sqp::Action {
    fn stop_early() -> Self {
        Self::StopEarly
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::DVector;

    use super::*;

    #[test]
    fn only_iterations_carry_values() {
        let x = DVector::from_vec(vec![1.0]);
        let iterated = sqp::Event::Iterated {
            iter: 3,
            x: &x,
            objective: 2.5,
            constraint_violation: 1e-3,
            step_norm: 0.1,
            step_length: 1.0,
            penalty: 10.0,
        };
        let failed = sqp::Event::LineSearchFailed { iter: 4, x: &x };

        assert_eq!(iterated.objective(), 2.5);
        assert_eq!(iterated.constraint_violation(), 1e-3);
        assert!(failed.objective().is_nan());
        assert!(failed.constraint_violation().is_nan());
        assert_eq!(sqp::Action::stop_early(), sqp::Action::StopEarly);
    }
}
