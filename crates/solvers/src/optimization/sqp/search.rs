use std::collections::VecDeque;

use dirtran_core::{Bounds, NlpSolution, NonlinearProgram, Observer, SolutionStatus};
use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

use crate::optimization::{Evaluation, evaluate};

use super::{
    Action, Config, Error, Event,
    hessian::Hessian,
    qp::{Step, Subproblem},
};

/// Fraction of `ρ` a QP multiplier has to reach before the penalty is raised.
///
/// Elastic slacks cap every multiplier at `ρ`, so a multiplier at the cap
/// means the slacks are carrying part of the linearization.
const MULTIPLIER_MARGIN: f64 = 0.9;

/// Core SQP iteration.
///
/// Each major iteration solves an elastic QP for a step, raises the merit
/// penalty at most once if a QP multiplier reached it, then backtracks along
/// the step until the l1 merit falls sufficiently below the largest recent
/// merit.
pub(super) fn search<P, Obs>(
    program: &mut P,
    config: &Config,
    mut observer: Obs,
) -> Result<NlpSolution, Error>
where
    P: NonlinearProgram,
    Obs: for<'a> Observer<Event<'a>, Action>,
{
    let n = program.num_variables();
    let m = program.num_constraints();
    let variable_bounds = program.variable_bounds();
    let constraint_bounds = program.constraint_bounds();
    check("variable bounds", n, variable_bounds.len())?;
    check("constraint bounds", m, constraint_bounds.len())?;

    let guess = program.initial_guess();
    check("initial guess", n, guess.len())?;

    let mut current = evaluate(program, variable_bounds.clamp(&guess))?;
    if !current.is_finite() {
        return Err(Error::NonFinite { iter: 0 });
    }

    let bounds = ProblemBounds {
        variables: &variable_bounds,
        constraints: &constraint_bounds,
    };
    let mut hessian = Hessian::new(n);
    let mut penalty = config.initial_penalty();
    let mut recent = RecentMerits::new(config.merit_memory());
    recent.push(&current, &constraint_bounds);

    for iter in 1..=config.max_iters() {
        let outcome = next_step(
            &current,
            &bounds,
            &mut hessian,
            &mut penalty,
            config,
            iter,
            &mut observer,
        );
        let step = match outcome {
            StepOutcome::Step(step) => step,
            StepOutcome::Stop(status) => {
                return Ok(into_solution(current, status, iter - 1, &constraint_bounds));
            }
        };

        let step_norm = step.direction.amax();
        let vanished = step_norm <= config.step_tol() * (1.0 + current.x.amax());
        let feasible = current.max_violation(&constraint_bounds) <= config.feasibility_tol();
        if feasible && (vanished || is_stationary(&step, hessian.matrix(), config)) {
            let status = SolutionStatus::SolutionFound;
            return Ok(into_solution(current, status, iter - 1, &constraint_bounds));
        }

        if vanished && !reduces_violation(&current, &step, &constraint_bounds) {
            let status = if penalty >= config.max_penalty() {
                warn!(iter, penalty, "stalled at an infeasible point");
                SolutionStatus::InfeasibleConstraints
            } else {
                penalty = raise(penalty, config);
                debug!(iter, penalty, "step vanished before feasibility, increasing penalty");
                let event = Event::PenaltyIncreased { iter, penalty };
                if let Some(Action::StopEarly) = observer.observe(&event) {
                    SolutionStatus::StoppedByObserver
                } else {
                    continue;
                }
            };
            return Ok(into_solution(current, status, iter - 1, &constraint_bounds));
        }

        let merit = Merit {
            penalty,
            reference: recent.largest(penalty),
        };
        let searched = line_search(
            program,
            &current,
            &step,
            hessian.matrix(),
            &bounds,
            &merit,
            config,
        )?;
        match searched {
            Some((trial, step_length)) => {
                let s = &trial.x - &current.x;
                let y = trial.lagrangian_gradient(&step.multipliers)
                    - current.lagrangian_gradient(&step.multipliers);
                hessian.update(&s, &y);
                current = trial;
                recent.push(&current, &constraint_bounds);

                let event = Event::Iterated {
                    iter,
                    x: &current.x,
                    objective: current.cost.value,
                    constraint_violation: current.max_violation(&constraint_bounds),
                    step_norm,
                    step_length,
                    penalty,
                };
                if let Some(Action::StopEarly) = observer.observe(&event) {
                    let status = SolutionStatus::StoppedByObserver;
                    return Ok(into_solution(current, status, iter, &constraint_bounds));
                }
            }
            None => {
                warn!(iter, penalty, "line search failed");
                let event = Event::LineSearchFailed { iter, x: &current.x };
                let stop = matches!(observer.observe(&event), Some(Action::StopEarly));
                let status = if stop {
                    SolutionStatus::StoppedByObserver
                } else if hessian.is_fresh() {
                    SolutionStatus::LineSearchFailed
                } else {
                    hessian.reset();
                    continue;
                };
                return Ok(into_solution(current, status, iter - 1, &constraint_bounds));
            }
        }
    }

    Ok(into_solution(
        current,
        SolutionStatus::IterationLimit,
        config.max_iters(),
        &constraint_bounds,
    ))
}

struct ProblemBounds<'a> {
    variables: &'a Bounds,
    constraints: &'a Bounds,
}

enum StepOutcome {
    Step(Step),
    Stop(SolutionStatus),
}

/// The merit target of one line search.
struct Merit {
    penalty: f64,

    /// Largest recent merit under `penalty`.
    reference: f64,
}

/// Cost and l1 violation of the last few accepted iterates.
///
/// Merits are rebuilt from these with whatever penalty is current, so the
/// reference stays consistent after the penalty is raised.
struct RecentMerits {
    capacity: usize,
    entries: VecDeque<(f64, f64)>,
}

impl RecentMerits {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    fn push(&mut self, evaluation: &Evaluation, bounds: &Bounds) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries
            .push_back((evaluation.cost.value, evaluation.violation(bounds)));
    }

    fn largest(&self, penalty: f64) -> f64 {
        self.entries
            .iter()
            .map(|(cost, violation)| cost + penalty * violation)
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

/// Solves the QP subproblem for the next step.
///
/// If a multiplier of the solved QP reached `MULTIPLIER_MARGIN·ρ`, the
/// penalty is raised tenfold and the QP is solved once more. A failed
/// subproblem resets the Hessian approximation and retries once.
fn next_step<Obs>(
    current: &Evaluation,
    bounds: &ProblemBounds<'_>,
    hessian: &mut Hessian,
    penalty: &mut f64,
    config: &Config,
    iter: usize,
    observer: &mut Obs,
) -> StepOutcome
where
    Obs: for<'a> Observer<Event<'a>, Action>,
{
    let mut raised = false;

    loop {
        let subproblem = Subproblem {
            hessian: hessian.matrix(),
            gradient: &current.cost.gradient,
            jacobian: &current.constraints.jacobian,
            offset: &current.constraints.values,
            constraint_bounds: bounds.constraints,
            x: &current.x,
            variable_bounds: bounds.variables,
            penalty: *penalty,
        };

        match subproblem.solve() {
            Ok(step) => {
                let multiplier = largest(&step.multipliers);
                if raised
                    || *penalty >= config.max_penalty()
                    || multiplier < MULTIPLIER_MARGIN * *penalty
                {
                    return StepOutcome::Step(step);
                }

                raised = true;
                *penalty = raise(*penalty, config);
                debug!(
                    iter,
                    penalty = *penalty,
                    multiplier,
                    "QP multiplier reached the penalty, increasing it"
                );
                let event = Event::PenaltyIncreased {
                    iter,
                    penalty: *penalty,
                };
                if let Some(Action::StopEarly) = observer.observe(&event) {
                    return StepOutcome::Stop(SolutionStatus::StoppedByObserver);
                }
            }
            Err(reason) => {
                warn!(iter, %reason, "QP subproblem failed");
                let event = Event::SubproblemFailed {
                    iter,
                    reason: &reason,
                };
                if let Some(Action::StopEarly) = observer.observe(&event) {
                    return StepOutcome::Stop(SolutionStatus::StoppedByObserver);
                }
                if hessian.is_fresh() {
                    return StepOutcome::Stop(SolutionStatus::SubproblemFailed);
                }
                hessian.reset();
            }
        }
    }
}

/// Backtracks along `step` until the l1 merit falls sufficiently below the
/// reference merit.
///
/// If the full step is rejected, one second-order correction is tried: the
/// QP is re-solved with the constraints relinearized around the trial point,
/// which counters the Maratos effect near a solution.
///
/// Trial points with non-finite values are treated as rejected.
fn line_search<P: NonlinearProgram>(
    program: &mut P,
    current: &Evaluation,
    step: &Step,
    hessian: &DMatrix<f64>,
    bounds: &ProblemBounds<'_>,
    merit: &Merit,
    config: &Config,
) -> Result<Option<(Evaluation, f64)>, Error> {
    let penalty = merit.penalty;
    let predicted = -current.cost.gradient.dot(&step.direction)
        + penalty
            * (current.violation(bounds.constraints)
                - linearized_violation(current, &step.direction, bounds.constraints));
    let decrease = config.armijo() * predicted.max(0.0);

    let accepts = |trial: &Evaluation, alpha: f64| {
        trial.is_finite()
            && trial.merit(bounds.constraints, penalty) <= merit.reference - alpha * decrease
    };

    let mut alpha = 1.0;
    let mut corrected = false;
    while alpha >= config.min_step_fraction() {
        let trial_x = bounds.variables.clamp(&(&current.x + &step.direction * alpha));
        let trial = evaluate(program, trial_x)?;
        if accepts(&trial, alpha) {
            return Ok(Some((trial, alpha)));
        }

        if !corrected && !bounds.constraints.is_empty() && trial.is_finite() {
            corrected = true;
            let offset =
                &trial.constraints.values - &current.constraints.jacobian * &step.direction;
            let correction = Subproblem {
                hessian,
                gradient: &current.cost.gradient,
                jacobian: &current.constraints.jacobian,
                offset: &offset,
                constraint_bounds: bounds.constraints,
                x: &current.x,
                variable_bounds: bounds.variables,
                penalty,
            }
            .solve();

            if let Ok(corrected_step) = correction {
                let soc_x = bounds.variables.clamp(&(&current.x + &corrected_step.direction));
                let soc = evaluate(program, soc_x)?;
                if accepts(&soc, 1.0) {
                    return Ok(Some((soc, 1.0)));
                }
            }
        }

        alpha *= 0.5;
    }

    Ok(None)
}

/// Returns `true` if the Lagrangian gradient is within the optimality
/// tolerance.
///
/// At the QP solution `∇f + Jᵀμ + ν = −B·d`, where `ν` prices the variable
/// bounds, so `B·d` measures stationarity with the QP's multiplier estimates.
fn is_stationary(step: &Step, hessian: &DMatrix<f64>, config: &Config) -> bool {
    let residual = largest(&(hessian * &step.direction));
    residual <= config.optimality_tol() * (1.0 + largest(&step.multipliers))
}

/// Returns `true` if the step at least halves the linearized l1 violation.
fn reduces_violation(current: &Evaluation, step: &Step, bounds: &Bounds) -> bool {
    linearized_violation(current, &step.direction, bounds) <= 0.5 * current.violation(bounds)
}

/// Returns the l1 violation of the linearized constraints `g + J·d`.
fn linearized_violation(current: &Evaluation, direction: &DVector<f64>, bounds: &Bounds) -> f64 {
    bounds.violation(&(&current.constraints.values + &current.constraints.jacobian * direction))
}

/// Returns the infinity norm of `v`, or zero if `v` is empty.
fn largest(v: &DVector<f64>) -> f64 {
    v.iter().fold(0.0, |acc: f64, value| acc.max(value.abs()))
}

fn raise(penalty: f64, config: &Config) -> f64 {
    (penalty * 10.0).min(config.max_penalty())
}

fn check(what: &'static str, expected: usize, actual: usize) -> Result<(), Error> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::DimensionMismatch {
            what,
            expected,
            actual,
        })
    }
}

fn into_solution(
    current: Evaluation,
    status: SolutionStatus,
    iters: usize,
    constraint_bounds: &Bounds,
) -> NlpSolution {
    NlpSolution {
        status,
        objective: current.cost.value,
        constraint_violation: current.max_violation(constraint_bounds),
        x: current.x,
        iters,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluation(cost: f64, violation: f64) -> Evaluation {
        Evaluation {
            x: DVector::zeros(1),
            cost: dirtran_core::CostEvaluation {
                value: cost,
                gradient: DVector::zeros(1),
            },
            constraints: dirtran_core::ConstraintEvaluation {
                values: DVector::from_vec(vec![violation]),
                jacobian: DMatrix::zeros(1, 1),
            },
        }
    }

    #[test]
    fn recent_merits_reprice_with_the_current_penalty() {
        let bounds = Bounds::zeros(1);
        let mut recent = RecentMerits::new(2);

        recent.push(&evaluation(1.0, 0.5), &bounds);
        recent.push(&evaluation(2.0, 0.0), &bounds);
        assert_eq!(recent.largest(1.0), 2.0);
        assert_eq!(recent.largest(10.0), 6.0);

        // The oldest entry drops out once the memory is full.
        recent.push(&evaluation(0.5, 0.0), &bounds);
        assert_eq!(recent.largest(10.0), 2.0);
    }

    #[test]
    fn largest_of_empty_vector_is_zero() {
        assert_eq!(largest(&DVector::zeros(0)), 0.0);
        assert_eq!(largest(&DVector::from_vec(vec![-3.0, 2.0])), 3.0);
    }
}
