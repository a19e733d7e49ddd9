use nalgebra::DVector;

use crate::NonlinearProgram;

/// Indicates how an NLP solve ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionStatus {
    /// A point satisfying the optimality and feasibility tolerances was found.
    SolutionFound,

    /// Reached the iteration limit without converging.
    IterationLimit,

    /// Converged to a point that violates the constraints.
    InfeasibleConstraints,

    /// A subproblem could not be solved and no progress was possible.
    SubproblemFailed,

    /// No acceptable step was found along the search direction.
    LineSearchFailed,

    /// Stopped early due to an observer decision.
    StoppedByObserver,
}

impl SolutionStatus {
    /// Returns `true` only for [`SolutionStatus::SolutionFound`].
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::SolutionFound)
    }
}

/// The result of an NLP solve.
///
/// A solution is returned for every status, holding the last iterate; callers
/// inspect `status` before trusting it.
#[derive(Debug, Clone)]
pub struct NlpSolution {
    /// Final solver status.
    pub status: SolutionStatus,

    /// Final iterate.
    pub x: DVector<f64>,

    /// Cost at `x`.
    pub objective: f64,

    /// Largest constraint or bound violation at `x`.
    pub constraint_violation: f64,

    /// Iteration count when the solver finished.
    pub iters: usize,
}

/// A backend capable of solving a [`NonlinearProgram`].
pub trait NlpSolver {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Solves the program starting from its initial guess.
    ///
    /// Failing to converge is reported through [`NlpSolution::status`], not as
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the program cannot be evaluated or the solver is
    /// misconfigured.
    fn solve<P: NonlinearProgram>(&mut self, program: &mut P) -> Result<NlpSolution, Self::Error>;
}
