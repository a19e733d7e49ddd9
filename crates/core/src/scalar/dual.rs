use std::ops::{Add, Div, Mul, Neg, Sub};

use nalgebra::{DMatrix, DVector};

use super::Scalar;

/// A forward-mode dual number with a dense gradient.
///
/// A `Dual` carries a primal value together with its derivatives with respect
/// to a fixed set of seeded inputs. Arithmetic propagates derivatives with the
/// usual chain rules:
///
/// ```text
/// d(a + b) = da + db
/// d(a · b) = b·da + a·db
/// d(a / b) = (b·da − a·db) / b²
/// d(sin a) = cos a · da
/// ```
///
/// Constants have an empty gradient, which acts as a zero vector of whatever
/// length the other operand has. This lets constants be created without
/// knowing the number of seeded inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct Dual {
    value: f64,
    grad: DVector<f64>,
}

impl Dual {
    /// Creates a constant with no derivative information.
    #[must_use]
    pub fn constant(value: f64) -> Self {
        Self {
            value,
            grad: DVector::zeros(0),
        }
    }

    /// Creates the `index`-th of `n` independent variables.
    ///
    /// # Panics
    ///
    /// Panics if `index >= n`.
    #[must_use]
    pub fn variable(value: f64, index: usize, n: usize) -> Self {
        assert!(index < n, "variable index {index} out of range for {n} inputs");
        let mut grad = DVector::zeros(n);
        grad[index] = 1.0;
        Self { value, grad }
    }

    /// Creates a dual number from an explicit value and gradient.
    #[must_use]
    pub fn new(value: f64, grad: DVector<f64>) -> Self {
        Self { value, grad }
    }

    /// Returns the gradient, which is empty for constants.
    #[must_use]
    pub fn grad(&self) -> &DVector<f64> {
        &self.grad
    }

    /// Returns the gradient padded to length `n`.
    ///
    /// # Panics
    ///
    /// Panics if the gradient is non-empty and its length differs from `n`.
    #[must_use]
    pub fn grad_or_zeros(&self, n: usize) -> DVector<f64> {
        if self.grad.is_empty() {
            DVector::zeros(n)
        } else {
            assert_eq!(self.grad.len(), n, "gradient length mismatch");
            self.grad.clone()
        }
    }

    /// Returns `ca·a + cb·b`, treating an empty gradient as zero.
    fn combine(a: &DVector<f64>, ca: f64, b: &DVector<f64>, cb: f64) -> DVector<f64> {
        match (a.is_empty(), b.is_empty()) {
            (true, true) => DVector::zeros(0),
            (false, true) => a * ca,
            (true, false) => b * cb,
            (false, false) => {
                debug_assert_eq!(a.len(), b.len(), "dual gradients differ in length");
                a * ca + b * cb
            }
        }
    }

    /// Applies a scalar function with known derivative `slope` at `self`.
    fn chain(&self, value: f64, slope: f64) -> Self {
        Self {
            value,
            grad: &self.grad * slope,
        }
    }
}

impl Scalar for Dual {
    fn from_f64(value: f64) -> Self {
        Self::constant(value)
    }

    fn value(&self) -> f64 {
        self.value
    }

    #[allow(clippy::float_cmp)]
    fn same_as(&self, other: &Self) -> bool {
        self.value == other.value && self.grad == other.grad
    }

    fn sin(&self) -> Self {
        self.chain(self.value.sin(), self.value.cos())
    }

    fn cos(&self) -> Self {
        self.chain(self.value.cos(), -self.value.sin())
    }

    fn sqrt(&self) -> Self {
        let root = self.value.sqrt();
        self.chain(root, 0.5 / root)
    }

    fn powi(&self, n: i32) -> Self {
        let slope = if n == 0 {
            0.0
        } else {
            f64::from(n) * self.value.powi(n - 1)
        };
        self.chain(self.value.powi(n), slope)
    }
}

impl Add for Dual {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            value: self.value + rhs.value,
            grad: Self::combine(&self.grad, 1.0, &rhs.grad, 1.0),
        }
    }
}

impl Sub for Dual {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            value: self.value - rhs.value,
            grad: Self::combine(&self.grad, 1.0, &rhs.grad, -1.0),
        }
    }
}

impl Mul for Dual {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self {
            value: self.value * rhs.value,
            grad: Self::combine(&self.grad, rhs.value, &rhs.grad, self.value),
        }
    }
}

impl Div for Dual {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        let inv = 1.0 / rhs.value;
        Self {
            value: self.value * inv,
            grad: Self::combine(&self.grad, inv, &rhs.grad, -self.value * inv * inv),
        }
    }
}

impl Neg for Dual {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            value: -self.value,
            grad: -self.grad,
        }
    }
}

impl Add<f64> for Dual {
    type Output = Self;

    fn add(self, rhs: f64) -> Self {
        Self {
            value: self.value + rhs,
            grad: self.grad,
        }
    }
}

impl Sub<f64> for Dual {
    type Output = Self;

    fn sub(self, rhs: f64) -> Self {
        Self {
            value: self.value - rhs,
            grad: self.grad,
        }
    }
}

impl Mul<f64> for Dual {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self {
            value: self.value * rhs,
            grad: self.grad * rhs,
        }
    }
}

impl Div<f64> for Dual {
    type Output = Self;

    fn div(self, rhs: f64) -> Self {
        Self {
            value: self.value / rhs,
            grad: self.grad / rhs,
        }
    }
}

/// Seeds every entry of `x` as an independent variable.
///
/// The result has an identity Jacobian with respect to `x`.
#[must_use]
pub fn seed(x: &DVector<f64>) -> DVector<Dual> {
    let n = x.len();
    DVector::from_fn(n, |i, _| Dual::variable(x[i], i, n))
}

/// Extracts primal values.
#[must_use]
pub fn values(y: &DVector<Dual>) -> DVector<f64> {
    DVector::from_fn(y.len(), |i, _| y[i].value)
}

/// Stacks the gradients of `y` into an `y.len() × n` Jacobian.
#[must_use]
pub fn jacobian(y: &DVector<Dual>, n: usize) -> DMatrix<f64> {
    let mut jac = DMatrix::zeros(y.len(), n);
    for (row, entry) in y.iter().enumerate() {
        if !entry.grad.is_empty() {
            jac.row_mut(row).copy_from(&entry.grad.transpose());
        }
    }
    jac
}

/// Returns the gradient of a scalar result with respect to `n` inputs.
#[must_use]
pub fn gradient(y: &Dual, n: usize) -> DVector<f64> {
    y.grad_or_zeros(n)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn product_rule() {
        let x = Dual::variable(3.0, 0, 2);
        let y = Dual::variable(-2.0, 1, 2);

        let z = x * y;

        assert_relative_eq!(z.value(), -6.0);
        assert_relative_eq!(z.grad()[0], -2.0);
        assert_relative_eq!(z.grad()[1], 3.0);
    }

    #[test]
    fn quotient_rule() {
        let x = Dual::variable(1.0, 0, 2);
        let y = Dual::variable(4.0, 1, 2);

        let z = x / y;

        assert_relative_eq!(z.value(), 0.25);
        assert_relative_eq!(z.grad()[0], 0.25);
        assert_relative_eq!(z.grad()[1], -1.0 / 16.0);
    }

    #[test]
    fn constants_broadcast_as_zero_gradient() {
        let x = Dual::variable(2.0, 0, 3);
        let c = Dual::constant(5.0);

        let sum = c.clone() + x.clone();
        let product = c * x;

        assert_eq!(sum.grad(), &DVector::from_vec(vec![1.0, 0.0, 0.0]));
        assert_eq!(product.grad(), &DVector::from_vec(vec![5.0, 0.0, 0.0]));
    }

    #[test]
    fn trig_chain_rule() {
        let x = Dual::variable(0.3, 0, 1);

        let y = x.sin() * x.cos();

        // d/dx (sin x cos x) = cos 2x
        assert_relative_eq!(y.value(), 0.3_f64.sin() * 0.3_f64.cos());
        assert_relative_eq!(y.grad()[0], (0.6_f64).cos(), epsilon = 1e-14);
    }

    #[test]
    fn powi_and_sqrt() {
        let x = Dual::variable(4.0, 0, 1);

        assert_relative_eq!(x.powi(3).grad()[0], 48.0);
        assert_relative_eq!(x.sqrt().grad()[0], 0.25);
        assert_relative_eq!(x.powi(0).grad()[0], 0.0);
    }

    #[test]
    fn seeded_identity_jacobian() {
        let x = DVector::from_vec(vec![1.0, 2.0, 3.0]);

        let jac = jacobian(&seed(&x), 3);

        assert_eq!(jac, DMatrix::identity(3, 3));
        assert_eq!(values(&seed(&x)), x);
    }

    #[test]
    fn same_as_compares_derivatives() {
        let a = Dual::variable(1.0, 0, 2);
        let b = Dual::variable(1.0, 1, 2);

        assert!(a.same_as(&a.clone()));
        assert!(!a.same_as(&b));
    }
}
