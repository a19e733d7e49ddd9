use nalgebra::{DMatrix, DVector};

/// Damped BFGS approximation of the Lagrangian Hessian.
///
/// Powell's damping keeps the approximation positive definite even when the
/// curvature condition `sᵀy > 0` fails, so every QP subproblem stays
/// strictly convex in the step.
pub(super) struct Hessian {
    matrix: DMatrix<f64>,
    fresh: bool,
}

impl Hessian {
    pub(super) fn new(n: usize) -> Self {
        Self {
            matrix: DMatrix::identity(n, n),
            fresh: true,
        }
    }

    pub(super) fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Returns `true` if no update has been applied since the last reset.
    pub(super) fn is_fresh(&self) -> bool {
        self.fresh
    }

    pub(super) fn reset(&mut self) {
        let n = self.matrix.nrows();
        self.matrix = DMatrix::identity(n, n);
        self.fresh = true;
    }

    /// Applies a damped BFGS update for step `s` and gradient change `y`.
    ///
    /// The first update after a reset rescales the identity by `yᵀy / sᵀy`
    /// so the initial curvature matches the problem.
    pub(super) fn update(&mut self, s: &DVector<f64>, y: &DVector<f64>) {
        let ss = s.norm_squared();
        if ss <= f64::EPSILON * f64::EPSILON {
            return;
        }

        let sy = s.dot(y);
        if self.fresh && sy > 0.0 {
            self.matrix *= y.norm_squared() / sy;
        }

        let bs = &self.matrix * s;
        let sbs = s.dot(&bs);
        if sbs <= 0.0 || !sbs.is_finite() {
            return;
        }

        let theta = if sy >= 0.2 * sbs {
            1.0
        } else {
            0.8 * sbs / (sbs - sy)
        };
        let r = y * theta + &bs * (1.0 - theta);
        let sr = s.dot(&r);
        if sr <= 0.0 || !sr.is_finite() {
            return;
        }

        self.matrix -= &bs * bs.transpose() / sbs;
        self.matrix += &r * r.transpose() / sr;

        // Keep exact symmetry for the upper-triangular QP encoding.
        self.matrix = (&self.matrix + self.matrix.transpose()) * 0.5;
        self.fresh = false;
    }
}
