//! Decision variable handles and affine expressions over them.

use std::ops::{Add, Mul, Neg, Sub};

use dirtran_core::Scalar;
use nalgebra::{DMatrix, DVector};

/// A handle to one decision variable of a program.
///
/// Handles are plain indices into the program's decision vector and are only
/// meaningful for the program that created them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable(usize);

impl Variable {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the position of this variable in the decision vector.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// An affine expression `c + Σ aᵢ·xᵢ` in decision variables.
///
/// Expressions are built with the usual operators:
///
/// ```
/// # use dirtran_trajopt::{LinearExpression, Variable};
/// # fn example(h: &[Variable]) -> LinearExpression {
/// // The trajectory duration minus one second.
/// LinearExpression::sum(h.iter().copied()) - 1.0
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinearExpression {
    constant: f64,
    terms: Vec<(Variable, f64)>,
}

impl LinearExpression {
    /// Returns the sum of the given variables.
    pub fn sum(variables: impl IntoIterator<Item = Variable>) -> Self {
        Self {
            constant: 0.0,
            terms: variables.into_iter().map(|var| (var, 1.0)).collect(),
        }
    }

    #[must_use]
    pub fn constant(&self) -> f64 {
        self.constant
    }

    /// Returns the `(variable, coefficient)` terms.
    ///
    /// A variable may appear in more than one term.
    #[must_use]
    pub fn terms(&self) -> &[(Variable, f64)] {
        &self.terms
    }

    /// Evaluates the expression at a full decision vector.
    ///
    /// # Panics
    ///
    /// Panics if a variable's index is out of range for `x`.
    #[must_use]
    pub fn evaluate<T: Scalar>(&self, x: &DVector<T>) -> T {
        self.terms
            .iter()
            .fold(T::from_f64(self.constant), |acc, (var, coeff)| {
                acc + x[var.index()].clone() * *coeff
            })
    }

    fn scaled(mut self, factor: f64) -> Self {
        self.constant *= factor;
        for (_, coeff) in &mut self.terms {
            *coeff *= factor;
        }
        self
    }
}

impl From<Variable> for LinearExpression {
    fn from(var: Variable) -> Self {
        Self {
            constant: 0.0,
            terms: vec![(var, 1.0)],
        }
    }
}

impl From<f64> for LinearExpression {
    fn from(constant: f64) -> Self {
        Self {
            constant,
            terms: Vec::new(),
        }
    }
}

impl<R: Into<LinearExpression>> Add<R> for LinearExpression {
    type Output = Self;

    fn add(mut self, rhs: R) -> Self {
        let rhs = rhs.into();
        self.constant += rhs.constant;
        self.terms.extend(rhs.terms);
        self
    }
}

impl<R: Into<LinearExpression>> Sub<R> for LinearExpression {
    type Output = Self;

    fn sub(self, rhs: R) -> Self {
        self + rhs.into().scaled(-1.0)
    }
}

impl Mul<f64> for LinearExpression {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        self.scaled(rhs)
    }
}

impl Neg for LinearExpression {
    type Output = Self;

    fn neg(self) -> Self {
        self.scaled(-1.0)
    }
}

impl<R: Into<LinearExpression>> Add<R> for Variable {
    type Output = LinearExpression;

    fn add(self, rhs: R) -> LinearExpression {
        LinearExpression::from(self) + rhs
    }
}

impl<R: Into<LinearExpression>> Sub<R> for Variable {
    type Output = LinearExpression;

    fn sub(self, rhs: R) -> LinearExpression {
        LinearExpression::from(self) - rhs
    }
}

impl Mul<f64> for Variable {
    type Output = LinearExpression;

    fn mul(self, rhs: f64) -> LinearExpression {
        LinearExpression::from(self) * rhs
    }
}

impl Mul<Variable> for f64 {
    type Output = LinearExpression;

    fn mul(self, rhs: Variable) -> LinearExpression {
        LinearExpression::from(rhs) * self
    }
}

impl Neg for Variable {
    type Output = LinearExpression;

    fn neg(self) -> LinearExpression {
        -LinearExpression::from(self)
    }
}

/// Something whose value can be read from a decision vector.
pub trait SolutionValue {
    type Output;

    /// Returns every variable the value is read from.
    fn variables(&self) -> Vec<Variable>;

    /// Returns the value at the decision vector `x`.
    ///
    /// Every index in [`variables`](Self::variables) must be in range for `x`.
    fn value_in(&self, x: &DVector<f64>) -> Self::Output;
}

impl SolutionValue for Variable {
    type Output = f64;

    fn variables(&self) -> Vec<Variable> {
        vec![*self]
    }

    fn value_in(&self, x: &DVector<f64>) -> f64 {
        x[self.index()]
    }
}

impl SolutionValue for LinearExpression {
    type Output = f64;

    fn variables(&self) -> Vec<Variable> {
        self.terms.iter().map(|(var, _)| *var).collect()
    }

    fn value_in(&self, x: &DVector<f64>) -> f64 {
        self.evaluate(x)
    }
}

impl SolutionValue for DVector<Variable> {
    type Output = DVector<f64>;

    fn variables(&self) -> Vec<Variable> {
        self.iter().copied().collect()
    }

    fn value_in(&self, x: &DVector<f64>) -> DVector<f64> {
        self.map(|var| x[var.index()])
    }
}

impl SolutionValue for DMatrix<Variable> {
    type Output = DMatrix<f64>;

    fn variables(&self) -> Vec<Variable> {
        self.iter().copied().collect()
    }

    fn value_in(&self, x: &DVector<f64>) -> DMatrix<f64> {
        self.map(|var| x[var.index()])
    }
}

impl<const N: usize> SolutionValue for [Variable; N] {
    type Output = [f64; N];

    fn variables(&self) -> Vec<Variable> {
        self.to_vec()
    }

    fn value_in(&self, x: &DVector<f64>) -> [f64; N] {
        self.map(|var| x[var.index()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operators_build_affine_expressions() {
        let (a, b) = (Variable::new(0), Variable::new(2));
        let x = DVector::from_vec(vec![3.0, 10.0, -1.0]);

        let expr = 2.0 * a - b * 4.0 + 1.5;

        assert_eq!(expr.constant(), 1.5);
        assert_eq!(expr.terms(), &[(a, 2.0), (b, -4.0)]);
        assert_eq!(expr.value_in(&x), 6.0 + 4.0 + 1.5);
        assert_eq!((-(a + b)).value_in(&x), -2.0);
    }

    #[test]
    fn repeated_variables_accumulate() {
        let a = Variable::new(1);
        let x = DVector::from_vec(vec![0.0, 2.0]);

        let expr = LinearExpression::sum([a, a]) - a * 0.5;

        assert_eq!(expr.value_in(&x), 3.0);
    }

    #[test]
    fn handles_project_onto_a_decision_vector() {
        let x = DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0]);
        let column = DVector::from_fn(2, |i, _| Variable::new(2 * i));
        let matrix = DMatrix::from_fn(2, 2, |i, j| Variable::new(i + 2 * j));

        assert_eq!(column.value_in(&x), DVector::from_vec(vec![1.0, 3.0]));
        assert_eq!(matrix.value_in(&x), DMatrix::from_row_slice(2, 2, &[1.0, 3.0, 2.0, 4.0]));
        assert_eq!([Variable::new(3), Variable::new(0)].value_in(&x), [4.0, 1.0]);
    }
}
