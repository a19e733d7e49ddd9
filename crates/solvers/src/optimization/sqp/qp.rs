//! Elastic QP subproblems.
//!
//! Around an iterate `x` the SQP step `d` solves
//!
//! ```text
//! minimize    ½ dᵀBd + ∇fᵀd + ρ·Σ t
//! subject to  g_lower − t ≤ c + J·d ≤ g_upper + t,   t ≥ 0
//!             x_lower ≤ x + d ≤ x_upper
//! ```
//!
//! where `c` is `g(x)` for a regular step. The slacks `t` make every
//! subproblem feasible and turn its objective into the l1 merit model, so the
//! step is a descent direction for the merit with the same penalty `ρ`.
//!
//! Clarabel solves `min ½zᵀPz + qᵀz` subject to `Az + s = b` with `s` in a
//! product of cones. Equality rows go into a zero cone first, then every
//! inequality row `a·z ≤ b` into a nonnegative cone.

use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettings, DefaultSolver, IPSolver, SolverStatus,
    SupportedConeT::{self, NonnegativeConeT, ZeroConeT},
};
use dirtran_core::Bounds;
use nalgebra::{DMatrix, DVector};

/// The quadratic model of the merit function around an iterate.
pub(super) struct Subproblem<'a> {
    pub hessian: &'a DMatrix<f64>,
    pub gradient: &'a DVector<f64>,
    pub jacobian: &'a DMatrix<f64>,

    /// Constant term `c` of the linearized constraints.
    pub offset: &'a DVector<f64>,

    pub constraint_bounds: &'a Bounds,
    pub x: &'a DVector<f64>,
    pub variable_bounds: &'a Bounds,
    pub penalty: f64,
}

/// A solved subproblem.
pub(super) struct Step {
    pub direction: DVector<f64>,

    /// Constraint multipliers `μ` with `∇f + Jᵀμ + Bd = 0` on free variables.
    pub multipliers: DVector<f64>,
}

/// One row of `A·z (+ s) = b`, tagged with the constraint it linearizes.
struct Row {
    coefficients: DVector<f64>,
    rhs: f64,
    multiplier: Option<(usize, f64)>,
}

impl Subproblem<'_> {
    /// Solves the subproblem.
    ///
    /// # Errors
    ///
    /// Returns a description of the failure if Clarabel rejects the problem
    /// or ends without a solution.
    pub(super) fn solve(&self) -> Result<Step, String> {
        let n = self.x.len();
        let m = self.offset.len();
        let num_slacks = (0..m).map(|i| self.slacks_for(i)).sum::<usize>();
        let nz = n + num_slacks;

        let (zero_rows, cone_rows) = self.rows(nz);
        if zero_rows.is_empty() && cone_rows.is_empty() {
            return self.solve_unconstrained();
        }

        let mut p = DMatrix::<f64>::zeros(nz, nz);
        p.view_mut((0, 0), (n, n)).copy_from(self.hessian);

        let mut q = vec![self.penalty; nz];
        q[..n].copy_from_slice(self.gradient.as_slice());

        let rows: Vec<&Row> = zero_rows.iter().chain(cone_rows.iter()).collect();
        let a = DMatrix::from_fn(rows.len(), nz, |r, c| rows[r].coefficients[c]);
        let b: Vec<f64> = rows.iter().map(|row| row.rhs).collect();

        let mut cones: Vec<SupportedConeT<f64>> = Vec::with_capacity(2);
        if !zero_rows.is_empty() {
            cones.push(ZeroConeT(zero_rows.len()));
        }
        if !cone_rows.is_empty() {
            cones.push(NonnegativeConeT(cone_rows.len()));
        }

        let settings: DefaultSettings<f64> = DefaultSettings {
            verbose: false,
            max_iter: 200,
            ..DefaultSettings::default()
        };

        let mut solver = DefaultSolver::new(
            &dmatrix_to_csc_upper_tri(&p),
            &q,
            &dmatrix_to_csc(&a),
            &b,
            &cones,
            settings,
        )
        .map_err(|e| format!("{e:?}"))?;
        solver.solve();

        let solution = &solver.solution;
        if !matches!(
            solution.status,
            SolverStatus::Solved | SolverStatus::AlmostSolved
        ) {
            return Err(format!("{:?}", solution.status));
        }

        let direction = DVector::from_column_slice(&solution.x[..n]);
        let mut multipliers = DVector::zeros(m);
        for (row, dual) in rows.iter().zip(solution.z.iter()) {
            if let Some((i, sign)) = row.multiplier {
                multipliers[i] += sign * dual;
            }
        }

        Ok(Step {
            direction,
            multipliers,
        })
    }

    /// Returns the number of elastic slacks constraint row `i` needs.
    fn slacks_for(&self, i: usize) -> usize {
        let bounds = self.constraint_bounds;
        if bounds.is_equality(i) {
            2
        } else {
            usize::from(bounds.lower[i].is_finite()) + usize::from(bounds.upper[i].is_finite())
        }
    }

    /// Builds the zero-cone and nonnegative-cone rows.
    fn rows(&self, nz: usize) -> (Vec<Row>, Vec<Row>) {
        let n = self.x.len();
        let mut zero_rows = Vec::new();
        let mut cone_rows = Vec::new();

        let linearized = |i: usize, sign: f64| {
            let mut coefficients = DVector::zeros(nz);
            for j in 0..n {
                coefficients[j] = sign * self.jacobian[(i, j)];
            }
            coefficients
        };

        let mut slack = n;
        for i in 0..self.offset.len() {
            let (lower, upper) = (self.constraint_bounds.lower[i], self.constraint_bounds.upper[i]);
            let c = self.offset[i];

            if self.constraint_bounds.is_equality(i) {
                // J·d − t⁺ + t⁻ = lower − c
                let mut coefficients = linearized(i, 1.0);
                coefficients[slack] = -1.0;
                coefficients[slack + 1] = 1.0;
                zero_rows.push(Row {
                    coefficients,
                    rhs: lower - c,
                    multiplier: Some((i, 1.0)),
                });
                slack += 2;
                continue;
            }

            if lower.is_finite() {
                // −J·d − t ≤ c − lower
                let mut coefficients = linearized(i, -1.0);
                coefficients[slack] = -1.0;
                cone_rows.push(Row {
                    coefficients,
                    rhs: c - lower,
                    multiplier: Some((i, -1.0)),
                });
                slack += 1;
            }
            if upper.is_finite() {
                // J·d − t ≤ upper − c
                let mut coefficients = linearized(i, 1.0);
                coefficients[slack] = -1.0;
                cone_rows.push(Row {
                    coefficients,
                    rhs: upper - c,
                    multiplier: Some((i, 1.0)),
                });
                slack += 1;
            }
        }

        for s in n..nz {
            cone_rows.push(unit_row(nz, s, -1.0, 0.0));
        }

        for j in 0..n {
            let (lower, upper) = (self.variable_bounds.lower[j], self.variable_bounds.upper[j]);
            let x = self.x[j];
            if self.variable_bounds.is_equality(j) {
                zero_rows.push(unit_row(nz, j, 1.0, upper - x));
                continue;
            }
            if upper.is_finite() {
                cone_rows.push(unit_row(nz, j, 1.0, upper - x));
            }
            if lower.is_finite() {
                cone_rows.push(unit_row(nz, j, -1.0, x - lower));
            }
        }

        (zero_rows, cone_rows)
    }

    /// Solves `B·d = −∇f` when nothing constrains the step.
    fn solve_unconstrained(&self) -> Result<Step, String> {
        let cholesky = self
            .hessian
            .clone()
            .cholesky()
            .ok_or_else(|| "Hessian approximation is not positive definite".to_string())?;

        Ok(Step {
            direction: -cholesky.solve(self.gradient),
            multipliers: DVector::zeros(self.offset.len()),
        })
    }
}

fn unit_row(nz: usize, column: usize, coefficient: f64, rhs: f64) -> Row {
    let mut coefficients = DVector::zeros(nz);
    coefficients[column] = coefficient;
    Row {
        coefficients,
        rhs,
        multiplier: None,
    }
}

/// Converts a dense matrix to Clarabel's compressed sparse column format.
fn dmatrix_to_csc(m: &DMatrix<f64>) -> CscMatrix<f64> {
    let (nrows, ncols) = m.shape();
    let mut colptr = vec![0usize; ncols + 1];
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();

    for j in 0..ncols {
        for i in 0..nrows {
            let v = m[(i, j)];
            if v != 0.0 {
                rowval.push(i);
                nzval.push(v);
            }
        }
        colptr[j + 1] = rowval.len();
    }

    CscMatrix::new(nrows, ncols, colptr, rowval, nzval)
}

/// Converts the upper triangle of a symmetric dense matrix to CSC format.
fn dmatrix_to_csc_upper_tri(m: &DMatrix<f64>) -> CscMatrix<f64> {
    let n = m.ncols();
    let mut colptr = vec![0usize; n + 1];
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();

    for j in 0..n {
        for i in 0..=j {
            let v = m[(i, j)];
            if v != 0.0 {
                rowval.push(i);
                nzval.push(v);
            }
        }
        colptr[j + 1] = rowval.len();
    }

    CscMatrix::new(n, n, colptr, rowval, nzval)
}
