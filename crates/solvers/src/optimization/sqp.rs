//! Sequential quadratic programming for smooth constrained programs.
//!
//! # Algorithm
//!
//! Each major iteration builds a quadratic model of the Lagrangian around the
//! current iterate and solves it, with linearized constraints, for a step.
//! Three safeguards make the iteration globally convergent:
//!
//! - **Elastic subproblems**: constraint rows get nonnegative slacks priced at
//!   the merit penalty `ρ`, so every QP is feasible even when the
//!   linearization is inconsistent. The QPs are solved with Clarabel.
//! - **l1 exact-penalty merit**: steps are accepted by backtracking until
//!   `f(x) + ρ·‖viol(g(x))‖₁` falls sufficiently below the largest merit of
//!   the last few iterates (a non-monotone Armijo test). A rejected full step
//!   gets one second-order correction first.
//! - **Penalty escalation**: the slacks cap every QP multiplier at `ρ`. When a
//!   multiplier comes within 10% of the cap, `ρ` grows tenfold and the QP is
//!   solved again, at most once per major iteration and up to a configured
//!   maximum. A step that vanishes without reducing the linearized violation
//!   also raises `ρ`.
//!
//! The Lagrangian Hessian is approximated with damped BFGS, which stays
//! positive definite without second derivatives from the program.
//!
//! The iteration stops with [`SolutionStatus::SolutionFound`] once the
//! constraint violation is within tolerance and either the QP step is small
//! relative to `x` or the Lagrangian gradient, estimated with the QP
//! multipliers, is within the optimality tolerance.
//!
//! # Observer Events
//!
//! The solver emits [`Event::Iterated`] for every accepted step, plus
//! [`Event::PenaltyIncreased`], [`Event::SubproblemFailed`] and
//! [`Event::LineSearchFailed`] as they happen. Observers can return
//! [`Action::StopEarly`] from any event to stop with the current iterate.
//!
//! [`SolutionStatus::SolutionFound`]: dirtran_core::SolutionStatus::SolutionFound

mod action;
mod config;
mod error;
mod event;
mod hessian;
mod qp;
mod search;


pub use action::Action;
pub use config::{Config, ConfigError};
pub use error::Error;
pub use event::Event;

use dirtran_core::{Borrowed, NlpSolution, NlpSolver, NonlinearProgram, Observer};

use search::search;

/// Solves a nonlinear program with SQP, starting from its initial guess.
///
/// The observer receives [`Event`]s as described in the [module docs](self).
/// Failing to converge is reported through [`NlpSolution::status`].
///
/// # Errors
///
/// Returns an error if the program fails to evaluate, returns values of the
/// wrong size, or is non-finite at the initial guess.
pub fn solve<P, Obs>(program: &mut P, config: &Config, observer: Obs) -> Result<NlpSolution, Error>
where
    P: NonlinearProgram,
    Obs: for<'a> Observer<Event<'a>, Action>,
{
    search(program, config, observer)
}

/// Solves a nonlinear program with SQP without observer support.
///
/// This is a convenience wrapper around [`solve`] that uses a no-op observer.
///
/// # Errors
///
/// Returns an error under the same conditions as [`solve`].
pub fn solve_unobserved<P: NonlinearProgram>(
    program: &mut P,
    config: &Config,
) -> Result<NlpSolution, Error> {
    solve(program, config, ())
}

/// An SQP solver usable wherever an [`NlpSolver`] is expected.
///
/// The solver owns its observer, so state an observer accumulates over a
/// solve can be read back with [`Sqp::observer`].
#[derive(Debug, Clone, Default)]
pub struct Sqp<Obs = ()> {
    config: Config,
    observer: Obs,
}

impl Sqp {
    /// Creates a solver with the given config and no observer.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            observer: (),
        }
    }
}

impl<Obs> Sqp<Obs> {
    /// Replaces the observer.
    #[must_use]
    pub fn with_observer<O>(self, observer: O) -> Sqp<O> {
        Sqp {
            config: self.config,
            observer,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn observer(&self) -> &Obs {
        &self.observer
    }

    #[must_use]
    pub fn into_observer(self) -> Obs {
        self.observer
    }
}

impl<Obs> NlpSolver for Sqp<Obs>
where
    Obs: for<'a> Observer<Event<'a>, Action>,
{
    type Error = Error;

    fn solve<P: NonlinearProgram>(&mut self, program: &mut P) -> Result<NlpSolution, Error> {
        search(program, &self.config, Borrowed(&mut self.observer))
    }
}
