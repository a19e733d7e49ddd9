use nalgebra::{DMatrix, DVector};

use crate::Scalar;

/// A multibody system that provides the dynamics terms used by transcription.
///
/// A plant describes a mechanical system with `nq` generalized positions,
/// `nv` generalized velocities, `nu` actuators, and `nc` holonomic
/// (position) constraints such as closed kinematic loops. Its equations of
/// motion are
///
/// ```text
/// M(q)·v̇ + c(q, v) = B·u + J(q)ᵀ·λ
/// ```
///
/// Evaluation happens in two steps. First, [`compute_kinematics`] turns a
/// configuration into a plant-specific [`Kinematics`] value holding the
/// expensive intermediate quantities (transforms, Jacobians). The remaining
/// methods then read from that value, so several terms can be evaluated at the
/// same configuration for the cost of a single kinematics pass.
///
/// All configuration-dependent methods are generic over [`Scalar`] so that
/// they can be evaluated with derivative-carrying scalars.
///
/// [`compute_kinematics`]: MultibodyPlant::compute_kinematics
/// [`Kinematics`]: MultibodyPlant::Kinematics
pub trait MultibodyPlant {
    /// Configuration-dependent intermediate state.
    type Kinematics<T: Scalar>;

    /// Returns the number of generalized positions `nq`.
    fn num_positions(&self) -> usize;

    /// Returns the number of generalized velocities `nv`.
    fn num_velocities(&self) -> usize;

    /// Returns the number of actuators `nu`.
    fn num_actuators(&self) -> usize;

    /// Returns the number of position constraints `nc`.
    fn num_position_constraints(&self) -> usize;

    /// Computes kinematics at `q`, and at `v` when velocities are given.
    ///
    /// Kinematics computed without velocities treat `v` as zero, so
    /// velocity-dependent terms of [`bias_forces`] vanish.
    ///
    /// [`bias_forces`]: MultibodyPlant::bias_forces
    fn compute_kinematics<T: Scalar>(
        &self,
        q: &DVector<T>,
        v: Option<&DVector<T>>,
    ) -> Self::Kinematics<T>;

    /// Returns the `nv × nv` mass matrix `M(q)`.
    fn mass_matrix<T: Scalar>(&self, kinematics: &Self::Kinematics<T>) -> DMatrix<T>;

    /// Returns the bias term `c(q, v)`: Coriolis, centrifugal and gravity forces.
    fn bias_forces<T: Scalar>(&self, kinematics: &Self::Kinematics<T>) -> DVector<T>;

    /// Returns the constant `nv × nu` actuation matrix `B`.
    fn actuation_matrix(&self) -> DMatrix<f64>;

    /// Returns the `nc × nv` position constraint Jacobian `J(q)`.
    fn position_constraint_jacobian<T: Scalar>(
        &self,
        kinematics: &Self::Kinematics<T>,
    ) -> DMatrix<T>;

    /// Returns the position constraint residual `φ(q)`, zero when satisfied.
    fn position_constraints<T: Scalar>(&self, kinematics: &Self::Kinematics<T>) -> DVector<T>;
}
