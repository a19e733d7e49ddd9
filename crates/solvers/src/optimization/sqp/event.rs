use nalgebra::DVector;

/// Events emitted by the SQP solver.
///
/// Every event carries the major iteration it belongs to. Observers can
/// return [`Action::StopEarly`](super::Action::StopEarly) from any event.
#[derive(Debug)]
pub enum Event<'a> {
    /// A step was accepted and the iterate moved.
    Iterated {
        /// The major iteration that produced this iterate.
        iter: usize,

        /// The new iterate.
        x: &'a DVector<f64>,

        /// Cost at `x`.
        objective: f64,

        /// Largest constraint violation at `x`.
        constraint_violation: f64,

        /// Infinity norm of the full QP step.
        step_norm: f64,

        /// Fraction of the QP step that was taken.
        step_length: f64,

        /// Current merit penalty weight.
        penalty: f64,
    },

    /// The merit penalty was raised, either because a QP multiplier reached
    /// it or because the step stalled short of feasibility.
    PenaltyIncreased {
        iter: usize,

        /// The new penalty weight.
        penalty: f64,
    },

    /// The QP subproblem could not be solved.
    SubproblemFailed {
        iter: usize,

        /// Solver-reported reason.
        reason: &'a str,
    },

    /// No sufficient decrease of the merit was found along the QP step.
    LineSearchFailed {
        iter: usize,

        /// The iterate the line search started from.
        x: &'a DVector<f64>,
    },
}

impl Event<'_> {
    /// Returns the major iteration this event belongs to.
    #[must_use]
    pub fn iter(&self) -> usize {
        match self {
            Self::Iterated { iter, .. }
            | Self::PenaltyIncreased { iter, .. }
            | Self::SubproblemFailed { iter, .. }
            | Self::LineSearchFailed { iter, .. } => *iter,
        }
    }
}
