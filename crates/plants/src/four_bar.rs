use dirtran_core::{MultibodyPlant, Scalar};
use nalgebra::{DMatrix, DVector};

use crate::chain::{ChainKinematics, Link, PlanarChain};

/// A planar four-bar linkage modeled as a closed kinematic loop.
///
/// The crank, coupler and rocker form a three-link serial chain pinned to the
/// ground at the origin. The rocker's tip is pinned to a second ground pivot
/// at `(ground_length, 0)`, which closes the loop with two position
/// constraints:
///
/// ```text
/// φ(q) = tip(q) − (ground_length, 0) = 0
/// ```
///
/// The crank joint is actuated. So `nq = nv = 3`, `nu = 1`, `nc = 2`.
#[derive(Debug, Clone, PartialEq)]
pub struct FourBar {
    chain: PlanarChain,
    ground_length: f64,
}

impl Default for FourBar {
    /// A crank–rocker linkage made of uniform rods under standard gravity.
    fn default() -> Self {
        Self::new(
            [Link::rod(1.0, 1.0), Link::rod(2.0, 2.0), Link::rod(2.0, 2.0)],
            2.0,
            9.81,
        )
    }
}

impl FourBar {
    /// Creates a four-bar linkage from crank, coupler and rocker links.
    #[must_use]
    pub fn new(links: [Link; 3], ground_length: f64, gravity: f64) -> Self {
        Self {
            chain: PlanarChain::new(links.to_vec(), gravity),
            ground_length,
        }
    }

    /// Returns the distance between the two ground pivots.
    #[must_use]
    pub fn ground_length(&self) -> f64 {
        self.ground_length
    }

    /// Returns a configuration that closes the loop for a given crank angle.
    ///
    /// The coupler/rocker joint is placed on the left side of the line from
    /// the crank tip to the ground pivot. Returns `None` if the loop cannot be
    /// closed at this crank angle.
    #[must_use]
    pub fn closed_configuration(&self, crank_angle: f64) -> Option<DVector<f64>> {
        let [crank, coupler, rocker] = [0, 1, 2].map(|k| self.chain.links()[k].length);

        let (px, py) = (crank * crank_angle.cos(), crank * crank_angle.sin());
        let (dx, dy) = (self.ground_length - px, -py);
        let dist = dx.hypot(dy);
        if dist == 0.0 || dist > coupler + rocker || dist < (coupler - rocker).abs() {
            return None;
        }

        // Intersect the circle of radius `coupler` about the crank tip with
        // the circle of radius `rocker` about the ground pivot.
        let along = (coupler * coupler - rocker * rocker + dist * dist) / (2.0 * dist);
        let across = (coupler * coupler - along * along).max(0.0).sqrt();
        let cx = px + (along * dx - across * dy) / dist;
        let cy = py + (along * dy + across * dx) / dist;

        let coupler_angle = (cy - py).atan2(cx - px);
        let rocker_angle = (-cy).atan2(self.ground_length - cx);

        Some(DVector::from_vec(vec![
            crank_angle,
            coupler_angle - crank_angle,
            rocker_angle - coupler_angle,
        ]))
    }
}

impl MultibodyPlant for FourBar {
    type Kinematics<T: Scalar> = ChainKinematics<T>;

    fn num_positions(&self) -> usize {
        3
    }

    fn num_velocities(&self) -> usize {
        3
    }

    fn num_actuators(&self) -> usize {
        1
    }

    fn num_position_constraints(&self) -> usize {
        2
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
        DMatrix::from_column_slice(3, 1, &[1.0, 0.0, 0.0])
    }

    fn position_constraint_jacobian<T: Scalar>(
        &self,
        kinematics: &ChainKinematics<T>,
    ) -> DMatrix<T> {
        self.chain.tip_jacobian(kinematics)
    }

    fn position_constraints<T: Scalar>(&self, kinematics: &ChainKinematics<T>) -> DVector<T> {
        let (x, y) = self.chain.tip_position(kinematics);
        DVector::from_vec(vec![x - self.ground_length, y])
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use dirtran_core::{jacobian, seed};

    use super::*;

    #[test]
    fn closed_configuration_satisfies_loop() {
        let plant = FourBar::default();

        for crank_angle in [0.0, 0.5, std::f64::consts::FRAC_PI_2, 2.0] {
            let q = plant
                .closed_configuration(crank_angle)
                .expect("default linkage closes for every crank angle");
            let kin = plant.compute_kinematics(&q, None);

            let phi = plant.position_constraints(&kin);

            assert_relative_eq!(phi, DVector::<f64>::zeros(2), epsilon = 1e-12);
        }
    }

    #[test]
    fn unreachable_crank_angle_is_rejected() {
        let plant = FourBar::new(
            [Link::rod(3.0, 1.0), Link::rod(0.5, 1.0), Link::rod(0.5, 1.0)],
            1.0,
            9.81,
        );

        assert!(plant.closed_configuration(std::f64::consts::PI).is_none());
    }

    #[test]
    fn constraint_jacobian_is_derivative_of_residual() {
        let plant = FourBar::default();
        let q = DVector::from_vec(vec![0.2, 1.1, -0.6]);

        let dual_kin = plant.compute_kinematics(&seed(&q), None);
        let exact = jacobian(&plant.position_constraints(&dual_kin), 3);

        let kin = plant.compute_kinematics(&q, None);
        assert_relative_eq!(plant.position_constraint_jacobian(&kin), exact, epsilon = 1e-12);
    }

    #[test]
    fn dimensions() {
        let plant = FourBar::default();
        let zeros = DVector::<f64>::zeros(3);
        let kin = plant.compute_kinematics(&zeros, Some(&zeros));

        assert_eq!(plant.mass_matrix(&kin).shape(), (3, 3));
        assert_eq!(plant.bias_forces(&kin).len(), 3);
        assert_eq!(plant.actuation_matrix().shape(), (3, 1));
        assert_eq!(plant.position_constraint_jacobian(&kin).shape(), (2, 3));
    }
}
