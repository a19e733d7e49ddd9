use dirtran_core::Observer;

use crate::traits::{HasConstraintViolation, HasObjective};

/// Records the objective and constraint violation of every iteration.
///
/// Events that carry neither value (failures, penalty updates) are skipped.
/// Wrap a `&mut History` in [`Borrowed`] to read the record after a solve.
///
/// [`Borrowed`]: dirtran_core::Borrowed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    objectives: Vec<f64>,
    violations: Vec<f64>,
}

impl History {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded objectives, one per iteration.
    #[must_use]
    pub fn objectives(&self) -> &[f64] {
        &self.objectives
    }

    /// Returns the recorded constraint violations, one per iteration.
    #[must_use]
    pub fn violations(&self) -> &[f64] {
        &self.violations
    }

    /// Returns the number of recorded iterations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objectives.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objectives.is_empty()
    }
}

impl<E, A> Observer<E, A> for History
where
    E: HasObjective + HasConstraintViolation,
{
    fn observe(&mut self, event: &E) -> Option<A> {
        let objective = event.objective();
        let violation = event.constraint_violation();
        if !(objective.is_nan() && violation.is_nan()) {
            self.objectives.push(objective);
            self.violations.push(violation);
        }
        None
    }
}
