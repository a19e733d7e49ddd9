//! Planar serial chains of rigid links connected by revolute joints.
//!
//! Link `k` is attached to the end of link `k - 1` (link 0 to the ground
//! pivot at the origin). Generalized coordinates are relative joint angles, so
//! the absolute angle of link `k` is `θ_k = q_0 + … + q_k`, measured from the
//! +x axis. Gravity acts along −y.
//!
//! The equations of motion follow from projecting Newton–Euler onto the joint
//! space. With `Jₖ` the Jacobian of link `k`'s center of mass,
//!
//! ```text
//! M = Σₖ mₖ·JₖᵀJₖ + Iₖ·SₖᵀSₖ
//! c = Σₖ mₖ·Jₖᵀ·(J̇ₖ·v + g)
//! ```
//!
//! where `Sₖ` selects the joints up to and including `k`. In the plane `Sₖ` is
//! constant, so rotational inertia contributes nothing to `c`.

use dirtran_core::{Scalar, linalg};
use nalgebra::{DMatrix, DVector};

/// A uniform or non-uniform rigid link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Link {
    /// Joint-to-joint length.
    pub length: f64,

    /// Mass.
    pub mass: f64,

    /// Distance from the proximal joint to the center of mass.
    pub com: f64,

    /// Rotational inertia about the center of mass.
    pub inertia: f64,
}

impl Link {
    /// Creates a slender uniform rod.
    #[must_use]
    pub fn rod(length: f64, mass: f64) -> Self {
        Self {
            length,
            mass,
            com: 0.5 * length,
            inertia: mass * length * length / 12.0,
        }
    }

    /// Creates a massless link with a point mass at its tip.
    #[must_use]
    pub fn point_mass(length: f64, mass: f64) -> Self {
        Self {
            length,
            mass,
            com: length,
            inertia: 0.0,
        }
    }
}

/// Kinematic state of a planar chain at one configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainKinematics<T> {
    pub q: DVector<T>,
    pub v: DVector<T>,
    cos: Vec<T>,
    sin: Vec<T>,
    rates: Vec<T>,
}

impl<T: Scalar> ChainKinematics<T> {
    /// Computes absolute link angles and rates.
    pub(crate) fn new(q: &DVector<T>, v: Option<&DVector<T>>) -> Self {
        let n = q.len();
        let v = v.cloned().unwrap_or_else(|| linalg::zeros(n));
        assert_eq!(v.len(), n, "velocity length mismatch");

        let mut angle = T::zero();
        let mut rate = T::zero();
        let mut cos = Vec::with_capacity(n);
        let mut sin = Vec::with_capacity(n);
        let mut rates = Vec::with_capacity(n);
        for k in 0..n {
            angle = angle + q[k].clone();
            rate = rate + v[k].clone();
            cos.push(angle.cos());
            sin.push(angle.sin());
            rates.push(rate.clone());
        }

        Self {
            q: q.clone(),
            v,
            cos,
            sin,
            rates,
        }
    }

    /// Returns the cosine of link `k`'s absolute angle.
    #[must_use]
    pub fn cos(&self, k: usize) -> &T {
        &self.cos[k]
    }

    /// Returns the sine of link `k`'s absolute angle.
    #[must_use]
    pub fn sin(&self, k: usize) -> &T {
        &self.sin[k]
    }
}

/// A planar serial chain.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanarChain {
    links: Vec<Link>,
    gravity: f64,
}

impl PlanarChain {
    #[must_use]
    pub fn new(links: Vec<Link>, gravity: f64) -> Self {
        Self { links, gravity }
    }

    #[must_use]
    pub fn num_links(&self) -> usize {
        self.links.len()
    }

    #[must_use]
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Returns the 2 × n Jacobian of a point at distance `offset` along link
    /// `k`, as its x and y rows.
    fn point_jacobian<T: Scalar>(
        &self,
        kin: &ChainKinematics<T>,
        k: usize,
        offset: f64,
    ) -> (Vec<T>, Vec<T>) {
        let n = self.num_links();
        let mut jx = vec![T::zero(); n];
        let mut jy = vec![T::zero(); n];

        // Column m accumulates the contributions of every link from m to k.
        for m in 0..=k {
            let mut x = T::zero();
            let mut y = T::zero();
            for j in m..=k {
                let arm = if j == k { offset } else { self.links[j].length };
                x = x - kin.sin[j].clone() * arm;
                y = y + kin.cos[j].clone() * arm;
            }
            jx[m] = x;
            jy[m] = y;
        }
        (jx, jy)
    }

    /// Returns `J̇·v` for a point at distance `offset` along link `k`.
    fn point_bias_acceleration<T: Scalar>(
        &self,
        kin: &ChainKinematics<T>,
        k: usize,
        offset: f64,
    ) -> (T, T) {
        let mut ax = T::zero();
        let mut ay = T::zero();
        for j in 0..=k {
            let arm = if j == k { offset } else { self.links[j].length };
            let w2 = kin.rates[j].clone() * kin.rates[j].clone();
            ax = ax - kin.cos[j].clone() * w2.clone() * arm;
            ay = ay - kin.sin[j].clone() * w2 * arm;
        }
        (ax, ay)
    }

    /// Returns the joint-space mass matrix.
    pub fn mass_matrix<T: Scalar>(&self, kin: &ChainKinematics<T>) -> DMatrix<T> {
        let n = self.num_links();
        let mut mass = DMatrix::from_element(n, n, T::zero());
        for (k, link) in self.links.iter().enumerate() {
            let (jx, jy) = self.point_jacobian(kin, k, link.com);
            for a in 0..=k {
                for b in 0..=k {
                    let translational =
                        (jx[a].clone() * jx[b].clone() + jy[a].clone() * jy[b].clone()) * link.mass;
                    mass[(a, b)] = mass[(a, b)].clone() + translational + link.inertia;
                }
            }
        }
        mass
    }

    /// Returns the Coriolis, centrifugal and gravity forces.
    pub fn bias_forces<T: Scalar>(&self, kin: &ChainKinematics<T>) -> DVector<T> {
        let n = self.num_links();
        let mut bias = linalg::zeros::<T>(n);
        for (k, link) in self.links.iter().enumerate() {
            let (jx, jy) = self.point_jacobian(kin, k, link.com);
            let (ax, ay) = self.point_bias_acceleration(kin, k, link.com);
            let fx = ax * link.mass;
            let fy = (ay + self.gravity) * link.mass;
            for a in 0..=k {
                bias[a] = bias[a].clone() + jx[a].clone() * fx.clone() + jy[a].clone() * fy.clone();
            }
        }
        bias
    }

    /// Returns the position of the chain's distal tip.
    pub fn tip_position<T: Scalar>(&self, kin: &ChainKinematics<T>) -> (T, T) {
        let mut x = T::zero();
        let mut y = T::zero();
        for (j, link) in self.links.iter().enumerate() {
            x = x + kin.cos[j].clone() * link.length;
            y = y + kin.sin[j].clone() * link.length;
        }
        (x, y)
    }

    /// Returns the 2 × n Jacobian of the chain's distal tip.
    pub fn tip_jacobian<T: Scalar>(&self, kin: &ChainKinematics<T>) -> DMatrix<T> {
        let last = self.num_links() - 1;
        let (jx, jy) = self.point_jacobian(kin, last, self.links[last].length);
        DMatrix::from_fn(2, self.num_links(), |row, col| {
            if row == 0 {
                jx[col].clone()
            } else {
                jy[col].clone()
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use dirtran_core::{jacobian, seed};

    use super::*;

    fn double_pendulum() -> PlanarChain {
        PlanarChain::new(vec![Link::rod(1.0, 2.0), Link::rod(0.5, 1.0)], 9.81)
    }

    #[test]
    fn single_rod_matches_closed_form() {
        let chain = PlanarChain::new(vec![Link::rod(2.0, 3.0)], 9.81);
        let q = DVector::from_vec(vec![0.4]);
        let kin = ChainKinematics::new(&q, Some(&DVector::from_vec(vec![1.5])));

        // About the pivot: I = m l² / 3; gravity torque m g (l/2) cos θ.
        assert_relative_eq!(chain.mass_matrix(&kin)[(0, 0)], 4.0, epsilon = 1e-12);
        assert_relative_eq!(
            chain.bias_forces(&kin)[0],
            3.0 * 9.81 * 1.0 * 0.4_f64.cos(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn mass_matrix_is_symmetric_positive_definite() {
        let chain = double_pendulum();
        let kin = ChainKinematics::new(&DVector::from_vec(vec![0.3, -1.1]), None);

        let mass = chain.mass_matrix(&kin);

        assert_relative_eq!(mass.clone(), mass.transpose(), epsilon = 1e-12);
        assert!(mass.cholesky().is_some());
    }

    #[test]
    fn tip_jacobian_matches_autodiff() {
        let chain = double_pendulum();
        let q = DVector::from_vec(vec![0.7, 0.2]);

        let dual_q = seed(&q);
        let kin = ChainKinematics::new(&dual_q, None);
        let (x, y) = chain.tip_position(&kin);
        let exact = jacobian(&DVector::from_vec(vec![x, y]), 2);

        let analytic = chain.tip_jacobian(&ChainKinematics::new(&q, None));

        assert_relative_eq!(analytic, exact, epsilon = 1e-12);
    }

    #[test]
    fn bias_matches_mass_matrix_derivative() {
        // For a planar chain, cᵥ(q, v) = Ṁv − ½ ∂(vᵀMv)/∂q. Check the
        // velocity-dependent part against derivatives of M from autodiff.
        let chain = double_pendulum();
        let q = DVector::from_vec(vec![0.3, 0.9]);
        let v = DVector::from_vec(vec![1.2, -0.4]);

        let dual_q = seed(&q);
        let dual_mass = chain.mass_matrix(&ChainKinematics::new(&dual_q, None));
        let dm: Vec<DMatrix<f64>> = (0..2)
            .map(|i| DMatrix::from_fn(2, 2, |r, c| dual_mass[(r, c)].grad_or_zeros(2)[i]))
            .collect();

        let mdot = &dm[0] * v[0] + &dm[1] * v[1];
        let half_grad =
            DVector::from_fn(2, |i, _| 0.5 * (v.transpose() * &dm[i] * &v)[(0, 0)]);
        let expected = mdot * &v - half_grad;

        let with_v = chain.bias_forces(&ChainKinematics::new(&q, Some(&v)));
        let without_v = chain.bias_forces(&ChainKinematics::new(&q, None));

        assert_relative_eq!(with_v - without_v, expected, epsilon = 1e-10);
    }
}
