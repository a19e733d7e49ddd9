use dirtran_core::{Bounds, ConstraintEvaluation, CostEvaluation, NonlinearProgram};
use nalgebra::DVector;
use thiserror::Error;

/// The result of evaluating a nonlinear program at a given `x`.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub x: DVector<f64>,

    pub cost: CostEvaluation,

    pub constraints: ConstraintEvaluation,
}

/// Errors that can occur when evaluating a nonlinear program.
#[derive(Debug, Error)]
pub enum EvalError<PE> {
    /// The program failed to evaluate its cost or constraints.
    #[error("program error")]
    Program(#[source] PE),

    /// The program returned values of the wrong size.
    #[error("{what} has {actual} entries, expected {expected}")]
    Dimension {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Evaluates the cost and constraints of a program, with derivatives.
///
/// # Errors
///
/// Returns an error if the program fails, or if any returned vector or
/// Jacobian does not match the program's declared dimensions.
pub fn evaluate<P: NonlinearProgram>(
    program: &mut P,
    x: DVector<f64>,
) -> Result<Evaluation, EvalError<P::Error>> {
    let n = program.num_variables();
    let m = program.num_constraints();

    let cost = program.cost(&x).map_err(EvalError::Program)?;
    check("cost gradient", n, cost.gradient.len())?;

    let constraints = program.constraints(&x).map_err(EvalError::Program)?;
    check("constraint values", m, constraints.values.len())?;
    check("constraint Jacobian rows", m, constraints.jacobian.nrows())?;
    check("constraint Jacobian columns", n, constraints.jacobian.ncols())?;

    Ok(Evaluation {
        x,
        cost,
        constraints,
    })
}

fn check<PE>(what: &'static str, expected: usize, actual: usize) -> Result<(), EvalError<PE>> {
    if expected == actual {
        Ok(())
    } else {
        Err(EvalError::Dimension {
            what,
            expected,
            actual,
        })
    }
}

impl Evaluation {
    /// Returns `true` if every value and derivative is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.cost.value.is_finite()
            && self.cost.gradient.iter().all(|v| v.is_finite())
            && self.constraints.values.iter().all(|v| v.is_finite())
            && self.constraints.jacobian.iter().all(|v| v.is_finite())
    }

    /// Returns the l1 constraint violation.
    #[must_use]
    pub fn violation(&self, bounds: &Bounds) -> f64 {
        bounds.violation(&self.constraints.values)
    }

    /// Returns the largest single-row constraint violation.
    #[must_use]
    pub fn max_violation(&self, bounds: &Bounds) -> f64 {
        bounds.max_violation(&self.constraints.values)
    }

    /// Returns the l1 exact-penalty merit `f(x) + ρ·‖viol(g(x))‖₁`.
    #[must_use]
    pub fn merit(&self, bounds: &Bounds, penalty: f64) -> f64 {
        self.cost.value + penalty * self.violation(bounds)
    }

    /// Returns `∇f(x) + J(x)ᵀμ`.
    #[must_use]
    pub fn lagrangian_gradient(&self, multipliers: &DVector<f64>) -> DVector<f64> {
        &self.cost.gradient + self.constraints.jacobian.tr_mul(multipliers)
    }
}
