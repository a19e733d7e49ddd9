use dirtran_core::{MultibodyPlant, Scalar};
use nalgebra::{DMatrix, DVector};

use crate::chain::{ChainKinematics, Link, PlanarChain};

/// An actuated simple pendulum with no position constraints.
///
/// The pendulum angle is measured from the +x axis, so it hangs at rest at
/// `q = −π/2`.
#[derive(Debug, Clone, PartialEq)]
pub struct Pendulum {
    chain: PlanarChain,
}

impl Default for Pendulum {
    /// A 1 kg point mass on a 1 m massless rod under standard gravity.
    fn default() -> Self {
        Self::new(Link::point_mass(1.0, 1.0), 9.81)
    }
}

impl Pendulum {
    #[must_use]
    pub fn new(link: Link, gravity: f64) -> Self {
        Self {
            chain: PlanarChain::new(vec![link], gravity),
        }
    }
}

impl MultibodyPlant for Pendulum {
    type Kinematics<T: Scalar> = ChainKinematics<T>;

    fn num_positions(&self) -> usize {
        1
    }

    fn num_velocities(&self) -> usize {
        1
    }

    fn num_actuators(&self) -> usize {
        1
    }

    fn num_position_constraints(&self) -> usize {
        0
    }

    fn compute_kinematics<T: Scalar>(
        &self,
        q: &DVector<T>,
        v: Option<&DVector<T>>,
    ) -> ChainKinematics<T> {
        ChainKinematics::new(q, v)
    }

    fn mass_matrix<T: Scalar>(&self, kinematics: &ChainKinematics<T>) -> DMatrix<T> {
        self.chain.mass_matrix(kinematics)
    }

    fn bias_forces<T: Scalar>(&self, kinematics: &ChainKinematics<T>) -> DVector<T> {
        self.chain.bias_forces(kinematics)
    }

    fn actuation_matrix(&self) -> DMatrix<f64> {
        DMatrix::identity(1, 1)
    }

    fn position_constraint_jacobian<T: Scalar>(
        &self,
        _kinematics: &ChainKinematics<T>,
    ) -> DMatrix<T> {
        DMatrix::from_element(0, 1, T::zero())
    }

    fn position_constraints<T: Scalar>(&self, _kinematics: &ChainKinematics<T>) -> DVector<T> {
        DVector::from_element(0, T::zero())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    use super::*;

    #[test]
    fn hanging_pendulum_is_at_rest() {
        let plant = Pendulum::default();
        let q = DVector::from_vec(vec![-FRAC_PI_2]);

        let kin = plant.compute_kinematics(&q, None);

        assert_relative_eq!(plant.bias_forces(&kin)[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(plant.mass_matrix(&kin)[(0, 0)], 1.0);
    }

    #[test]
    fn horizontal_pendulum_feels_full_gravity_torque() {
        let plant = Pendulum::new(Link::point_mass(2.0, 0.5), 10.0);
        let q = DVector::from_vec(vec![0.0]);

        let kin = plant.compute_kinematics(&q, Some(&DVector::from_vec(vec![3.0])));

        // Centripetal acceleration is radial, so it exerts no joint torque.
        assert_relative_eq!(plant.bias_forces(&kin)[0], 0.5 * 10.0 * 2.0, epsilon = 1e-12);
        assert_eq!(plant.position_constraints(&kin).len(), 0);
        assert_eq!(plant.position_constraint_jacobian(&kin).shape(), (0, 1));
    }
}
