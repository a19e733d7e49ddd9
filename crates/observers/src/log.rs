use dirtran_core::Observer;
use dirtran_solvers::optimization::sqp;
use tracing::{debug, info, warn};

/// Forwards solver events to `tracing`.
///
/// Accepted SQP iterations are logged at `info` level (or `debug` when
/// constructed with [`LogObserver::quiet`]). Penalty increases are `debug`,
/// and subproblem and line search failures are `warn`. The observer never
/// returns an action.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver {
    quiet: bool,
}

impl LogObserver {
    /// Creates an observer that logs every iteration at `info` level.
    #[must_use]
    pub fn new() -> Self {
        Self { quiet: false }
    }

    /// Creates an observer that logs iterations at `debug` level.
    #[must_use]
    pub fn quiet() -> Self {
        Self { quiet: true }
    }
}

impl Observer<sqp::Event<'_>, sqp::Action> for LogObserver {
    fn observe(&mut self, event: &sqp::Event<'_>) -> Option<sqp::Action> {
        match *event {
            sqp::Event::Iterated {
                iter,
                objective,
                constraint_violation,
                step_norm,
                step_length,
                penalty,
                ..
            } => {
                if self.quiet {
                    debug!(
                        iter,
                        objective,
                        constraint_violation,
                        step_norm,
                        step_length,
                        penalty,
                        "sqp iteration"
                    );
                } else {
                    info!(
                        iter,
                        objective,
                        constraint_violation,
                        step_norm,
                        step_length,
                        penalty,
                        "sqp iteration"
                    );
                }
            }
            sqp::Event::PenaltyIncreased { iter, penalty } => {
                debug!(iter, penalty, "sqp penalty increased");
            }
            sqp::Event::SubproblemFailed { iter, reason } => {
                warn!(iter, reason, "sqp subproblem failed");
            }
            sqp::Event::LineSearchFailed { iter, .. } => {
                warn!(iter, "sqp line search failed");
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::DVector;

    use super::*;

    #[test]
    fn never_acts() {
        let x = DVector::from_vec(vec![0.0, 1.0]);
        let mut observer = LogObserver::quiet();

        let events = [
            sqp::Event::Iterated {
                iter: 1,
                x: &x,
                objective: 1.0,
                constraint_violation: 0.0,
                step_norm: 0.5,
                step_length: 1.0,
                penalty: 10.0,
            },
            sqp::Event::PenaltyIncreased {
                iter: 2,
                penalty: 100.0,
            },
            sqp::Event::SubproblemFailed {
                iter: 2,
                reason: "MaxIterations",
            },
            sqp::Event::LineSearchFailed { iter: 3, x: &x },
        ];

        for event in &events {
            assert_eq!(observer.observe(event), None);
        }
    }
}
