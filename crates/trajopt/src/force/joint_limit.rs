use dirtran_core::{MultibodyPlant, Scalar, linalg};
use nalgebra::DVector;

use crate::Error;

use super::GeneralizedConstraintForce;

/// The force that holds one velocity coordinate inside its joint limits.
///
/// Parameters are `[λ_lower, λ_upper]`, the multipliers of the lower and
/// upper limit. The force `λ_lower − λ_upper` acts only on coordinate `dof`,
/// pushing away from whichever limit is active.
///
/// This type only maps multipliers to a force. Keeping them nonnegative and
/// complementary to the limit gaps is up to the program that owns them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointLimitForce {
    dof: usize,
    lower: f64,
    upper: f64,
}

impl JointLimitForce {
    #[must_use]
    pub fn new(dof: usize, lower: f64, upper: f64) -> Self {
        Self { dof, lower, upper }
    }

    /// Returns the velocity index the force acts on.
    #[must_use]
    pub fn dof(&self) -> usize {
        self.dof
    }

    #[must_use]
    pub fn lower(&self) -> f64 {
        self.lower
    }

    #[must_use]
    pub fn upper(&self) -> f64 {
        self.upper
    }
}

impl<P: MultibodyPlant, T: Scalar> GeneralizedConstraintForce<P, T> for JointLimitForce {
    fn num_params(&self) -> usize {
        2
    }

    fn check_plant(&self, plant: &P) -> Result<(), Error> {
        let len = plant.num_velocities();
        if self.dof < len {
            Ok(())
        } else {
            Err(Error::IndexOutOfRange {
                what: "joint limit dof",
                index: self.dof,
                len,
            })
        }
    }

    fn eval(&self, plant: &P, _kinematics: &P::Kinematics<T>, params: &DVector<T>) -> DVector<T> {
        let mut force = linalg::zeros(plant.num_velocities());
        force[self.dof] = params[0].clone() - params[1].clone();
        force
    }
}

#[cfg(test)]
mod tests {
    use dirtran_plants::FourBar;

    use super::*;

    #[test]
    fn acts_on_a_single_coordinate() {
        let plant = FourBar::default();
        let q = DVector::zeros(3);
        let kinematics = plant.compute_kinematics::<f64>(&q, None);
        let force = JointLimitForce::new(1, -1.0, 1.0);

        let params = DVector::from_vec(vec![0.5, 2.0]);

        let generalized =
            GeneralizedConstraintForce::<FourBar, f64>::eval(&force, &plant, &kinematics, &params);

        assert_eq!(generalized, DVector::from_vec(vec![0.0, -1.5, 0.0]));
    }

    #[test]
    fn dof_must_be_a_plant_velocity() {
        let plant = FourBar::default();

        let inside = JointLimitForce::new(2, -1.0, 1.0);
        let outside = JointLimitForce::new(3, -1.0, 1.0);

        assert!(GeneralizedConstraintForce::<FourBar, f64>::check_plant(&inside, &plant).is_ok());
        assert!(matches!(
            GeneralizedConstraintForce::<FourBar, f64>::check_plant(&outside, &plant),
            Err(Error::IndexOutOfRange {
                index: 3,
                len: 3,
                ..
            })
        ));
    }
}
