use nalgebra::{DMatrix, DVector};

/// Elementwise lower and upper bounds.
///
/// Unbounded sides use `f64::NEG_INFINITY` / `f64::INFINITY`. A row with
/// equal bounds is an equality.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    pub lower: DVector<f64>,
    pub upper: DVector<f64>,
}

impl Bounds {
    /// Creates bounds from lower and upper vectors.
    ///
    /// # Panics
    ///
    /// Panics if the vectors differ in length.
    #[must_use]
    pub fn new(lower: DVector<f64>, upper: DVector<f64>) -> Self {
        assert_eq!(lower.len(), upper.len(), "bound vectors differ in length");
        Self { lower, upper }
    }

    /// Creates `n` unbounded rows.
    #[must_use]
    pub fn unbounded(n: usize) -> Self {
        Self {
            lower: DVector::from_element(n, f64::NEG_INFINITY),
            upper: DVector::from_element(n, f64::INFINITY),
        }
    }

    /// Creates `n` equality rows with right-hand side zero.
    #[must_use]
    pub fn zeros(n: usize) -> Self {
        Self {
            lower: DVector::zeros(n),
            upper: DVector::zeros(n),
        }
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lower.len()
    }

    /// Returns `true` if there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    /// Returns `true` if row `i` is an equality.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_equality(&self, i: usize) -> bool {
        self.lower[i] == self.upper[i]
    }

    /// Returns the l1 violation of `values` with respect to these bounds.
    ///
    /// # Panics
    ///
    /// Panics if `values` has a different length than the bounds.
    #[must_use]
    pub fn violation(&self, values: &DVector<f64>) -> f64 {
        assert_eq!(values.len(), self.len(), "bounds length mismatch");
        values
            .iter()
            .zip(self.lower.iter().zip(self.upper.iter()))
            .map(|(&g, (&lo, &hi))| (lo - g).max(0.0) + (g - hi).max(0.0))
            .sum()
    }

    /// Returns the largest single-row violation of `values`.
    ///
    /// # Panics
    ///
    /// Panics if `values` has a different length than the bounds.
    #[must_use]
    pub fn max_violation(&self, values: &DVector<f64>) -> f64 {
        assert_eq!(values.len(), self.len(), "bounds length mismatch");
        values
            .iter()
            .zip(self.lower.iter().zip(self.upper.iter()))
            .map(|(&g, (&lo, &hi))| (lo - g).max(g - hi).max(0.0))
            .fold(0.0, f64::max)
    }

    /// Projects `x` onto the bounds.
    #[must_use]
    pub fn clamp(&self, x: &DVector<f64>) -> DVector<f64> {
        DVector::from_fn(x.len(), |i, _| x[i].max(self.lower[i]).min(self.upper[i]))
    }
}

/// A cost value together with its gradient.
#[derive(Debug, Clone, PartialEq)]
pub struct CostEvaluation {
    pub value: f64,
    pub gradient: DVector<f64>,
}

/// Constraint values together with their Jacobian.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintEvaluation {
    pub values: DVector<f64>,
    pub jacobian: DMatrix<f64>,
}

/// Defines a smooth nonlinear program for a gradient-based solver.
///
/// ```text
/// minimize    f(x)
/// subject to  x_lower ≤ x    ≤ x_upper
///             g_lower ≤ g(x) ≤ g_upper
/// ```
///
/// Programs supply exact first derivatives. Evaluation takes `&mut self`
/// because programs commonly memoize expensive intermediate results between
/// calls at the same `x`.
pub trait NonlinearProgram {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the number of decision variables.
    fn num_variables(&self) -> usize;

    /// Returns the number of constraint rows in `g`.
    fn num_constraints(&self) -> usize;

    /// Returns the bounds on the decision variables.
    fn variable_bounds(&self) -> Bounds;

    /// Returns the bounds on the constraint rows.
    fn constraint_bounds(&self) -> Bounds;

    /// Returns the point the solver starts from.
    fn initial_guess(&self) -> DVector<f64>;

    /// Evaluates the cost and its gradient.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the cost cannot be evaluated at `x`.
    fn cost(&mut self, x: &DVector<f64>) -> Result<CostEvaluation, Self::Error>;

    /// Evaluates the constraints and their Jacobian.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the constraints cannot be evaluated at `x`.
    fn constraints(&mut self, x: &DVector<f64>) -> Result<ConstraintEvaluation, Self::Error>;
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn violation_sums_both_sides() {
        let bounds = Bounds::new(
            DVector::from_vec(vec![0.0, f64::NEG_INFINITY, 1.0]),
            DVector::from_vec(vec![0.0, 2.0, f64::INFINITY]),
        );
        let values = DVector::from_vec(vec![0.5, 3.0, -1.0]);

        assert_relative_eq!(bounds.violation(&values), 0.5 + 1.0 + 2.0);
        assert_relative_eq!(bounds.max_violation(&values), 2.0);
        assert!(bounds.is_equality(0));
        assert!(!bounds.is_equality(1));
    }

    #[test]
    fn clamp_projects_into_box() {
        let bounds = Bounds::new(
            DVector::from_vec(vec![0.0, -1.0]),
            DVector::from_vec(vec![1.0, f64::INFINITY]),
        );

        let clamped = bounds.clamp(&DVector::from_vec(vec![2.0, -5.0]));

        assert_eq!(clamped, DVector::from_vec(vec![1.0, -1.0]));
    }
}
