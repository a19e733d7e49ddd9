//! Generalized forces from constraint multipliers.
//!
//! A [`GeneralizedConstraintForce`] maps a block of multiplier parameters to a
//! generalized force on the plant, evaluated at kinematics the transcription
//! constraint has already computed. Forces from every registered evaluator are
//! summed into the right-hand side of the equations of motion.

mod joint_limit;
mod position;

pub use joint_limit::JointLimitForce;
pub use position::PositionConstraintForce;

use dirtran_core::{MultibodyPlant, Scalar};
use nalgebra::DVector;

use crate::Error;

/// Maps multiplier parameters to a generalized force in `R^nv`.
///
/// Implementations are generic over the scalar so the same mapping yields
/// values (`f64`) and exact Jacobians ([`Dual`](dirtran_core::Dual)).
pub trait GeneralizedConstraintForce<P: MultibodyPlant, T: Scalar> {
    /// Returns the number of parameters this evaluator consumes.
    fn num_params(&self) -> usize;

    /// Checks that the evaluator fits `plant`, before it is registered.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first index or size that does not fit.
    fn check_plant(&self, _plant: &P) -> Result<(), Error> {
        Ok(())
    }

    /// Evaluates the generalized force.
    ///
    /// `params` always has [`num_params`](Self::num_params) entries.
    fn eval(&self, plant: &P, kinematics: &P::Kinematics<T>, params: &DVector<T>) -> DVector<T>;
}
