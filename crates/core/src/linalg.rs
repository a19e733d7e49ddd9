//! Dense vector and matrix arithmetic over any [`Scalar`].
//!
//! `nalgebra`'s operators require its own numeric trait tower, which a
//! derivative-carrying scalar does not implement. These helpers cover the
//! handful of operations the dynamics pipeline needs using only element
//! access, so the same code runs on `f64` and [`Dual`](crate::Dual).

use nalgebra::{DMatrix, DVector};

use crate::Scalar;

/// Lifts a constant vector into the scalar type.
#[must_use]
pub fn lift<T: Scalar>(x: &DVector<f64>) -> DVector<T> {
    DVector::from_fn(x.len(), |i, _| T::from_f64(x[i]))
}

/// Lifts a constant matrix into the scalar type.
#[must_use]
pub fn lift_matrix<T: Scalar>(a: &DMatrix<f64>) -> DMatrix<T> {
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| T::from_f64(a[(i, j)]))
}

/// Returns primal values of a vector.
#[must_use]
pub fn value_of<T: Scalar>(x: &DVector<T>) -> DVector<f64> {
    DVector::from_fn(x.len(), |i, _| x[i].value())
}

/// Returns a vector of zeros.
#[must_use]
pub fn zeros<T: Scalar>(n: usize) -> DVector<T> {
    DVector::from_element(n, T::zero())
}

/// Returns `a + b`.
///
/// # Panics
///
/// Panics if the lengths differ.
#[must_use]
pub fn add<T: Scalar>(a: &DVector<T>, b: &DVector<T>) -> DVector<T> {
    assert_eq!(a.len(), b.len(), "vector length mismatch");
    DVector::from_fn(a.len(), |i, _| a[i].clone() + b[i].clone())
}

/// Returns `a - b`.
///
/// # Panics
///
/// Panics if the lengths differ.
#[must_use]
pub fn sub<T: Scalar>(a: &DVector<T>, b: &DVector<T>) -> DVector<T> {
    assert_eq!(a.len(), b.len(), "vector length mismatch");
    DVector::from_fn(a.len(), |i, _| a[i].clone() - b[i].clone())
}

/// Returns `s · a` for a scalar `s`.
#[must_use]
pub fn scale<T: Scalar>(s: &T, a: &DVector<T>) -> DVector<T> {
    DVector::from_fn(a.len(), |i, _| s.clone() * a[i].clone())
}

/// Accumulates `a` into `acc`.
///
/// # Panics
///
/// Panics if the lengths differ.
pub fn add_assign<T: Scalar>(acc: &mut DVector<T>, a: &DVector<T>) {
    assert_eq!(acc.len(), a.len(), "vector length mismatch");
    for (target, value) in acc.iter_mut().zip(a.iter()) {
        *target = target.clone() + value.clone();
    }
}

/// Returns the dot product `aᵀb`.
///
/// # Panics
///
/// Panics if the lengths differ.
#[must_use]
pub fn dot<T: Scalar>(a: &DVector<T>, b: &DVector<T>) -> T {
    assert_eq!(a.len(), b.len(), "vector length mismatch");
    a.iter()
        .zip(b.iter())
        .fold(T::zero(), |acc, (x, y)| acc + x.clone() * y.clone())
}

/// Returns `‖a‖²`.
#[must_use]
pub fn squared_norm<T: Scalar>(a: &DVector<T>) -> T {
    dot(a, a)
}

/// Returns `A·x`.
///
/// # Panics
///
/// Panics if `A` has a different number of columns than `x` has entries.
#[must_use]
pub fn mat_vec<T: Scalar>(a: &DMatrix<T>, x: &DVector<T>) -> DVector<T> {
    assert_eq!(a.ncols(), x.len(), "matrix-vector dimension mismatch");
    DVector::from_fn(a.nrows(), |i, _| {
        (0..a.ncols()).fold(T::zero(), |acc, j| acc + a[(i, j)].clone() * x[j].clone())
    })
}

/// Returns `Aᵀ·x`.
///
/// # Panics
///
/// Panics if `A` has a different number of rows than `x` has entries.
#[must_use]
pub fn mat_tr_vec<T: Scalar>(a: &DMatrix<T>, x: &DVector<T>) -> DVector<T> {
    assert_eq!(a.nrows(), x.len(), "matrix-vector dimension mismatch");
    DVector::from_fn(a.ncols(), |j, _| {
        (0..a.nrows()).fold(T::zero(), |acc, i| acc + a[(i, j)].clone() * x[i].clone())
    })
}

/// Returns `A·x` for a constant matrix `A`.
///
/// # Panics
///
/// Panics if `A` has a different number of columns than `x` has entries.
#[must_use]
pub fn const_mat_vec<T: Scalar>(a: &DMatrix<f64>, x: &DVector<T>) -> DVector<T> {
    assert_eq!(a.ncols(), x.len(), "matrix-vector dimension mismatch");
    DVector::from_fn(a.nrows(), |i, _| {
        (0..a.ncols())
            .filter(|&j| a[(i, j)] != 0.0)
            .fold(T::zero(), |acc, j| acc + x[j].clone() * a[(i, j)])
    })
}

/// Concatenates vectors end to end.
#[must_use]
pub fn concat<T: Scalar>(parts: &[&DVector<T>]) -> DVector<T> {
    let len = parts.iter().map(|p| p.len()).sum();
    DVector::from_iterator(len, parts.iter().flat_map(|p| p.iter().cloned()))
}

/// Copies `len` entries of `x` starting at `start`.
///
/// # Panics
///
/// Panics if the range is out of bounds.
#[must_use]
pub fn segment<T: Scalar>(x: &DVector<T>, start: usize, len: usize) -> DVector<T> {
    assert!(start + len <= x.len(), "segment out of bounds");
    DVector::from_fn(len, |i, _| x[start + i].clone())
}
