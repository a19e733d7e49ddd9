//! The backward-Euler defect between two adjacent samples.
//!
//! For an interval of length `h` from sample `l` to sample `r`, the
//! constraint input is
//!
//! ```text
//! [h, q_l, v_l, q_r, v_r, u_r, params_1, …, params_K]
//! ```
//!
//! and the residual, zero when the samples obey the dynamics, is
//!
//! ```text
//! e_pos = q_r − q_l − h·v_r
//! e_vel = M(q_r)·(v_r − v_l) − h·(B·u_r + Σₖ Fₖ(q_r, params_k) − c(q_r, v_r))
//! ```
//!
//! where each `Fₖ` is a registered [`GeneralizedConstraintForce`].

use dirtran_core::{MultibodyPlant, Scalar, linalg};
use nalgebra::{DMatrix, DVector};

use crate::{
    cache::KinematicsCacheWithV,
    error::{Error, check_len},
    force::GeneralizedConstraintForce,
};

/// Sizes of the blocks in a transcription constraint input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputLayout {
    pub nq: usize,
    pub nv: usize,
    pub nu: usize,
    /// Length of each evaluator's parameter block, in registration order.
    pub params: Vec<usize>,
}

impl InputLayout {
    /// Returns the total input length.
    #[must_use]
    pub fn len(&self) -> usize {
        1 + 2 * self.nq + 2 * self.nv + self.nu + self.params.iter().sum::<usize>()
    }

    /// Returns `true` if the input would hold only the time step.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 1
    }
}

/// The named blocks of a transcription constraint input.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionInput<T> {
    pub h: T,
    pub q_l: DVector<T>,
    pub v_l: DVector<T>,
    pub q_r: DVector<T>,
    pub v_r: DVector<T>,
    pub u_r: DVector<T>,
    pub params: Vec<DVector<T>>,
}

impl<T: Scalar> TranscriptionInput<T> {
    /// Returns the layout this input packs into.
    #[must_use]
    pub fn layout(&self) -> InputLayout {
        InputLayout {
            nq: self.q_l.len(),
            nv: self.v_l.len(),
            nu: self.u_r.len(),
            params: self.params.iter().map(DVector::len).collect(),
        }
    }

    /// Packs the blocks into a single input vector.
    #[must_use]
    pub fn compose(&self) -> DVector<T> {
        let h = DVector::from_element(1, self.h.clone());
        let mut parts = vec![&h, &self.q_l, &self.v_l, &self.q_r, &self.v_r, &self.u_r];
        parts.extend(self.params.iter());
        linalg::concat(&parts)
    }

    /// Splits an input vector into its blocks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if `x` does not have
    /// `layout.len()` entries.
    pub fn decompose(x: &DVector<T>, layout: &InputLayout) -> Result<Self, Error> {
        check_len("transcription input", layout.len(), x.len())?;

        let mut offset = 1;
        let mut next = |len: usize| {
            let block = linalg::segment(x, offset, len);
            offset += len;
            block
        };

        let q_l = next(layout.nq);
        let v_l = next(layout.nv);
        let q_r = next(layout.nq);
        let v_r = next(layout.nv);
        let u_r = next(layout.nu);
        let params = layout.params.iter().map(|&len| next(len)).collect();

        Ok(Self {
            h: x[0].clone(),
            q_l,
            v_l,
            q_r,
            v_r,
            u_r,
            params,
        })
    }
}

/// The implicit-Euler dynamics defect of one interval.
///
/// Kinematics at `(q_r, v_r)` are computed once per evaluation and shared by
/// the mass matrix, bias forces and every registered force evaluator.
pub struct DirectTranscriptionConstraint<'a, P: MultibodyPlant, T: Scalar> {
    plant: &'a P,
    cache: KinematicsCacheWithV<'a, P, T>,
    evaluators: Vec<Box<dyn GeneralizedConstraintForce<P, T> + 'a>>,
    layout: InputLayout,
    actuation: DMatrix<f64>,
}

impl<'a, P: MultibodyPlant, T: Scalar> DirectTranscriptionConstraint<'a, P, T> {
    /// Creates the constraint with no force evaluators.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PositionVelocityMismatch`] if the plant has a
    /// different number of positions and velocities.
    pub fn new(plant: &'a P) -> Result<Self, Error> {
        let (nq, nv) = (plant.num_positions(), plant.num_velocities());
        if nq != nv {
            return Err(Error::PositionVelocityMismatch { nq, nv });
        }

        Ok(Self {
            plant,
            cache: KinematicsCacheWithV::new(plant),
            evaluators: Vec::new(),
            layout: InputLayout {
                nq,
                nv,
                nu: plant.num_actuators(),
                params: Vec::new(),
            },
            actuation: plant.actuation_matrix(),
        })
    }

    /// Registers a force evaluator and appends its parameters to the input.
    ///
    /// # Errors
    ///
    /// Returns the evaluator's error if it does not fit the plant, for example
    /// a joint limit on a velocity the plant does not have.
    pub fn add_generalized_constraint_force_evaluator(
        &mut self,
        evaluator: Box<dyn GeneralizedConstraintForce<P, T> + 'a>,
    ) -> Result<(), Error> {
        evaluator.check_plant(self.plant)?;
        self.layout.params.push(evaluator.num_params());
        self.evaluators.push(evaluator);
        Ok(())
    }

    #[must_use]
    pub fn layout(&self) -> &InputLayout {
        &self.layout
    }

    #[must_use]
    pub fn num_inputs(&self) -> usize {
        self.layout.len()
    }

    #[must_use]
    pub fn num_outputs(&self) -> usize {
        self.layout.nq + self.layout.nv
    }

    /// Packs named blocks into an input vector for [`eval`](Self::eval).
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if any block has the wrong size.
    pub fn composite_eval_input(&self, input: &TranscriptionInput<T>) -> Result<DVector<T>, Error> {
        let layout = &self.layout;
        check_len("q_l", layout.nq, input.q_l.len())?;
        check_len("v_l", layout.nv, input.v_l.len())?;
        check_len("q_r", layout.nq, input.q_r.len())?;
        check_len("v_r", layout.nv, input.v_r.len())?;
        check_len("u_r", layout.nu, input.u_r.len())?;
        check_len("parameter blocks", layout.params.len(), input.params.len())?;
        for (&expected, block) in layout.params.iter().zip(&input.params) {
            check_len("evaluator parameters", expected, block.len())?;
        }
        Ok(input.compose())
    }

    /// Evaluates the residual `[e_pos; e_vel]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if `x` has the wrong length or an
    /// evaluator returns a force of the wrong size.
    pub fn eval(&mut self, x: &DVector<T>) -> Result<DVector<T>, Error> {
        let input = TranscriptionInput::decompose(x, &self.layout)?;
        let kinematics = self.cache.compute(&input.q_r, &input.v_r);

        let mut forces = linalg::const_mat_vec(&self.actuation, &input.u_r);
        for (evaluator, params) in self.evaluators.iter().zip(&input.params) {
            let force = evaluator.eval(self.plant, kinematics, params);
            check_len("generalized force", self.layout.nv, force.len())?;
            linalg::add_assign(&mut forces, &force);
        }
        let net = linalg::sub(&forces, &self.plant.bias_forces(kinematics));
        let mass = self.plant.mass_matrix(kinematics);

        let e_pos = linalg::sub(
            &linalg::sub(&input.q_r, &input.q_l),
            &linalg::scale(&input.h, &input.v_r),
        );
        let e_vel = linalg::sub(
            &linalg::mat_vec(&mass, &linalg::sub(&input.v_r, &input.v_l)),
            &linalg::scale(&input.h, &net),
        );

        Ok(linalg::concat(&[&e_pos, &e_vel]))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use dirtran_core::{Dual, jacobian, seed, values};
    use dirtran_plants::{FourBar, Pendulum};

    use super::*;
    use crate::force::PositionConstraintForce;

    fn linspaced(n: usize, from: f64, to: f64) -> DVector<f64> {
        if n == 1 {
            return DVector::from_element(1, from);
        }
        DVector::from_fn(n, |i, _| from + (to - from) * i as f64 / (n - 1) as f64)
    }

    fn four_bar_input() -> TranscriptionInput<f64> {
        TranscriptionInput {
            h: 0.1,
            q_l: linspaced(3, 0.0, 1.0),
            v_l: linspaced(3, 0.0, 2.0),
            q_r: linspaced(3, -1.0, 1.0),
            v_r: linspaced(3, -2.0, 3.0),
            u_r: linspaced(1, 2.0, 3.0),
            params: vec![linspaced(2, 3.0, 5.0)],
        }
    }

    fn four_bar_constraint<T: Scalar>(
        plant: &FourBar,
    ) -> DirectTranscriptionConstraint<'_, FourBar, T> {
        let mut constraint = DirectTranscriptionConstraint::new(plant).expect("nq == nv");
        let force = PositionConstraintForce::new(plant);
        constraint
            .add_generalized_constraint_force_evaluator(Box::new(force))
            .expect("fits the plant");
        constraint
    }

    #[test]
    fn compose_and_decompose_are_inverse() {
        let input = four_bar_input();

        let packed = input.compose();
        let unpacked = TranscriptionInput::decompose(&packed, &input.layout()).expect("sized");

        assert_eq!(packed.len(), 1 + 3 + 3 + 3 + 3 + 1 + 2);
        assert_eq!(packed[0], 0.1);
        assert_eq!(unpacked, input);
    }

    #[test]
    fn matches_hand_assembled_residual() {
        let plant = FourBar::default();
        let mut constraint = four_bar_constraint::<f64>(&plant);
        let input = four_bar_input();

        let x = constraint.composite_eval_input(&input).expect("sized");
        let residual = constraint.eval(&x).expect("evaluates");

        let kinematics = plant.compute_kinematics(&input.q_r, Some(&input.v_r));
        let mass = plant.mass_matrix(&kinematics);
        let bias = plant.bias_forces(&kinematics);
        let jacobian = plant.position_constraint_jacobian(&kinematics);
        let forces = plant.actuation_matrix() * &input.u_r + jacobian.transpose() * &input.params[0];
        let e_pos = &input.q_r - &input.q_l - &input.v_r * input.h;
        let e_vel = mass * (&input.v_r - &input.v_l) - (forces - bias) * input.h;

        assert_eq!(residual.len(), 6);
        assert_relative_eq!(residual.rows(0, 3).into_owned(), e_pos, epsilon = 1e-12);
        assert_relative_eq!(residual.rows(3, 3).into_owned(), e_vel, epsilon = 1e-10);
    }

    #[test]
    fn implicit_euler_step_has_zero_residual() {
        // One backward-Euler step of a torqued pendulum.
        let plant = Pendulum::default();
        let (h, q_l, v_l, u) = (0.05, 0.3, -0.2, 1.5);
        let mut constraint = DirectTranscriptionConstraint::<_, f64>::new(&plant).expect("nq == nv");

        // Solve v_r from m·l²·(v_r − v_l) = h·(u − m·g·l·cos(q_l + h·v_r)) by
        // fixed-point iteration, which contracts for small h.
        let (m, l, g) = (1.0, 1.0, 9.81);
        let mut v_r = v_l;
        for _ in 0..200 {
            let q_r = q_l + h * v_r;
            v_r = v_l + h * (u - m * g * l * q_r.cos()) / (m * l * l);
        }
        let q_r = q_l + h * v_r;

        let input = TranscriptionInput {
            h,
            q_l: DVector::from_element(1, q_l),
            v_l: DVector::from_element(1, v_l),
            q_r: DVector::from_element(1, q_r),
            v_r: DVector::from_element(1, v_r),
            u_r: DVector::from_element(1, u),
            params: vec![],
        };
        let residual = constraint.eval(&input.compose()).expect("evaluates");

        assert_relative_eq!(residual, DVector::<f64>::zeros(2), epsilon = 1e-12);
    }

    #[test]
    fn constrained_step_has_zero_residual() {
        // One backward-Euler step of the four-bar from rest. The loop force
        // λ_r is found together with v_r by Newton's method, with the rocker
        // tip held still (J(q_r)·v_r = 0) to close the system.
        let plant = FourBar::default();
        let (h, u) = (0.02, DVector::from_element(1, 2.0));
        let q_l = plant.closed_configuration(0.3).expect("reachable");
        let v_l = DVector::zeros(3);
        let mut dual_constraint = four_bar_constraint::<Dual>(&plant);

        let mut step_equations = |z: &DVector<f64>| {
            let z = seed(z);
            let v_r = z.rows(0, 3).into_owned();
            let q_r = linalg::add(&linalg::lift(&q_l), &linalg::scale(&Dual::constant(h), &v_r));
            let input = TranscriptionInput {
                h: Dual::constant(h),
                q_l: linalg::lift(&q_l),
                v_l: linalg::lift(&v_l),
                q_r: q_r.clone(),
                v_r: v_r.clone(),
                u_r: linalg::lift(&u),
                params: vec![z.rows(3, 2).into_owned()],
            };
            let dynamics = dual_constraint.eval(&input.compose()).expect("evaluates");
            let kinematics = plant.compute_kinematics(&q_r, None);
            let tip_velocity =
                linalg::mat_vec(&plant.position_constraint_jacobian(&kinematics), &v_r);

            let y = linalg::concat(&[&dynamics.rows(3, 3).into_owned(), &tip_velocity]);
            (values(&y), jacobian(&y, 5))
        };

        let mut z = DVector::<f64>::zeros(5);
        for _ in 0..50 {
            let (residual, jacobian) = step_equations(&z);
            if residual.amax() < 1e-13 {
                break;
            }
            z -= jacobian.lu().solve(&residual).expect("nonsingular");
        }

        let v_r = z.rows(0, 3).into_owned();
        let lambda_r = z.rows(3, 2).into_owned();
        assert!(lambda_r.amax() > 1e-3, "the loop force carries load");

        let input = TranscriptionInput {
            h,
            q_l: q_l.clone(),
            v_l,
            q_r: &q_l + &v_r * h,
            v_r,
            u_r: u,
            params: vec![lambda_r],
        };
        let mut constraint = four_bar_constraint::<f64>(&plant);
        let residual = constraint.eval(&input.compose()).expect("evaluates");

        assert_relative_eq!(residual, DVector::<f64>::zeros(6), epsilon = 1e-9);
    }

    #[test]
    fn dual_jacobian_matches_finite_differences() {
        let plant = FourBar::default();
        let mut values_constraint = four_bar_constraint::<f64>(&plant);
        let mut dual_constraint = four_bar_constraint::<Dual>(&plant);
        let x = four_bar_input().compose();
        let n = x.len();

        let exact = jacobian(&dual_constraint.eval(&seed(&x)).expect("evaluates"), n);
        let at_x = values_constraint.eval(&x).expect("evaluates");

        let step = 1e-6;
        for j in 0..n {
            let mut shifted = x.clone();
            shifted[j] += step;
            let column = (values_constraint.eval(&shifted).expect("evaluates") - &at_x) / step;
            assert_relative_eq!(exact.column(j).into_owned(), column, epsilon = 1e-4);
        }
        assert_relative_eq!(
            values(&dual_constraint.eval(&seed(&x)).expect("evaluates")),
            at_x,
            epsilon = 1e-12
        );
    }

    #[test]
    fn wrong_sizes_are_rejected() {
        let plant = FourBar::default();
        let mut constraint = four_bar_constraint::<f64>(&plant);
        let mut input = four_bar_input();
        input.params[0] = DVector::zeros(3);

        assert!(matches!(
            constraint.composite_eval_input(&input),
            Err(Error::DimensionMismatch {
                expected: 2,
                actual: 3,
                ..
            })
        ));
        assert!(matches!(
            constraint.eval(&DVector::zeros(4)),
            Err(Error::DimensionMismatch {
                expected: 16,
                actual: 4,
                ..
            })
        ));
    }
}
