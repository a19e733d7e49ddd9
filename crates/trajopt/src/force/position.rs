use dirtran_core::{MultibodyPlant, Scalar, linalg};
use nalgebra::DVector;

use super::GeneralizedConstraintForce;

/// The force `Jᵀλ` that keeps a plant on its position constraints.
///
/// Consumes one multiplier per position constraint. The multipliers carry no
/// sign restriction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionConstraintForce {
    num_constraints: usize,
}

impl PositionConstraintForce {
    /// Creates the evaluator for `plant`'s position constraints.
    #[must_use]
    pub fn new<P: MultibodyPlant>(plant: &P) -> Self {
        Self {
            num_constraints: plant.num_position_constraints(),
        }
    }
}

impl<P: MultibodyPlant, T: Scalar> GeneralizedConstraintForce<P, T> for PositionConstraintForce {
    fn num_params(&self) -> usize {
        self.num_constraints
    }

    fn eval(&self, plant: &P, kinematics: &P::Kinematics<T>, params: &DVector<T>) -> DVector<T> {
        let jacobian = plant.position_constraint_jacobian(kinematics);
        linalg::mat_tr_vec(&jacobian, params)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use dirtran_plants::FourBar;
    use nalgebra::DVector;

    use super::*;

    #[test]
    fn transposed_jacobian_times_multipliers() {
        let plant = FourBar::default();
        let q = plant.closed_configuration(0.4).expect("reachable");
        let kinematics = plant.compute_kinematics(&q, None);
        let lambda = DVector::from_vec(vec![2.0, -1.0]);
        let force = PositionConstraintForce::new(&plant);

        let generalized =
            GeneralizedConstraintForce::<FourBar, f64>::eval(&force, &plant, &kinematics, &lambda);

        let jacobian = plant.position_constraint_jacobian(&kinematics);
        assert_eq!(
            GeneralizedConstraintForce::<FourBar, f64>::num_params(&force),
            2
        );
        assert_relative_eq!(generalized, jacobian.transpose() * lambda, epsilon = 1e-12);
    }
}
