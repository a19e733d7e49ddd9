//! Single-slot memoization of plant kinematics.
//!
//! Every constraint that needs kinematics owns its own cache. Exclusive
//! `&mut self` access keeps a cache from being shared between constraints
//! that may be evaluated independently.

use dirtran_core::{MultibodyPlant, Scalar};
use nalgebra::DVector;

/// Caches kinematics computed at a configuration `q`.
///
/// Velocity-dependent terms of the cached kinematics are zero.
pub struct KinematicsCache<'a, P: MultibodyPlant, T: Scalar> {
    plant: &'a P,
    entry: Option<Entry<P::Kinematics<T>, T>>,
}

/// Caches kinematics computed at a state `(q, v)`.
pub struct KinematicsCacheWithV<'a, P: MultibodyPlant, T: Scalar> {
    plant: &'a P,
    entry: Option<Entry<P::Kinematics<T>, T>>,
}

struct Entry<K, T> {
    q: DVector<T>,
    v: Option<DVector<T>>,
    kinematics: K,
}

impl<K, T: Scalar> Entry<K, T> {
    fn matches(&self, q: &DVector<T>, v: Option<&DVector<T>>) -> bool {
        same_key(&self.q, q)
            && match (&self.v, v) {
                (Some(cached), Some(v)) => same_key(cached, v),
                (None, None) => true,
                _ => false,
            }
    }
}

fn same_key<T: Scalar>(a: &DVector<T>, b: &DVector<T>) -> bool {
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.same_as(y))
}

impl<'a, P: MultibodyPlant, T: Scalar> KinematicsCache<'a, P, T> {
    #[must_use]
    pub fn new(plant: &'a P) -> Self {
        Self { plant, entry: None }
    }

    /// Returns kinematics at `q`, computing them only on a cache miss.
    pub fn compute(&mut self, q: &DVector<T>) -> &P::Kinematics<T> {
        let entry = match self.entry.take() {
            Some(entry) if entry.matches(q, None) => entry,
            _ => Entry {
                q: q.clone(),
                v: None,
                kinematics: self.plant.compute_kinematics(q, None),
            },
        };
        &self.entry.insert(entry).kinematics
    }

    /// Returns `true` if kinematics at `q` are already stored.
    #[must_use]
    pub fn is_cached(&self, q: &DVector<T>) -> bool {
        self.entry.as_ref().is_some_and(|entry| entry.matches(q, None))
    }

    /// Clears the cached kinematics.
    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    #[must_use]
    pub fn plant(&self) -> &'a P {
        self.plant
    }
}

impl<'a, P: MultibodyPlant, T: Scalar> KinematicsCacheWithV<'a, P, T> {
    #[must_use]
    pub fn new(plant: &'a P) -> Self {
        Self { plant, entry: None }
    }

    /// Returns kinematics at `(q, v)`, computing them only on a cache miss.
    pub fn compute(&mut self, q: &DVector<T>, v: &DVector<T>) -> &P::Kinematics<T> {
        let entry = match self.entry.take() {
            Some(entry) if entry.matches(q, Some(v)) => entry,
            _ => Entry {
                q: q.clone(),
                v: Some(v.clone()),
                kinematics: self.plant.compute_kinematics(q, Some(v)),
            },
        };
        &self.entry.insert(entry).kinematics
    }

    /// Returns `true` if kinematics at `(q, v)` are already stored.
    #[must_use]
    pub fn is_cached(&self, q: &DVector<T>, v: &DVector<T>) -> bool {
        self.entry
            .as_ref()
            .is_some_and(|entry| entry.matches(q, Some(v)))
    }

    /// Clears the cached kinematics.
    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    #[must_use]
    pub fn plant(&self) -> &'a P {
        self.plant
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use dirtran_core::{Dual, seed};
    use nalgebra::DMatrix;

    use super::*;

    /// A one-dof plant that counts kinematics passes.
    #[derive(Default)]
    struct Counting {
        passes: Cell<usize>,
    }

    impl MultibodyPlant for Counting {
        type Kinematics<T: Scalar> = (DVector<T>, DVector<T>);

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
        ) -> (DVector<T>, DVector<T>) {
            self.passes.set(self.passes.get() + 1);
            let v = v.cloned().unwrap_or_else(|| dirtran_core::linalg::zeros(q.len()));
            (q.clone(), v)
        }

        fn mass_matrix<T: Scalar>(&self, _: &(DVector<T>, DVector<T>)) -> DMatrix<T> {
            DMatrix::from_element(1, 1, T::from_f64(1.0))
        }

        fn bias_forces<T: Scalar>(&self, _: &(DVector<T>, DVector<T>)) -> DVector<T> {
            dirtran_core::linalg::zeros(1)
        }

        fn actuation_matrix(&self) -> DMatrix<f64> {
            DMatrix::identity(1, 1)
        }

        fn position_constraint_jacobian<T: Scalar>(
            &self,
            _: &(DVector<T>, DVector<T>),
        ) -> DMatrix<T> {
            DMatrix::from_element(0, 1, T::zero())
        }

        fn position_constraints<T: Scalar>(&self, _: &(DVector<T>, DVector<T>)) -> DVector<T> {
            dirtran_core::linalg::zeros(0)
        }
    }

    fn vector(values: &[f64]) -> DVector<f64> {
        DVector::from_column_slice(values)
    }

    #[test]
    fn repeated_state_hits_the_cache() {
        let plant = Counting::default();
        let mut cache = KinematicsCacheWithV::new(&plant);
        let (q, v) = (vector(&[0.5]), vector(&[1.0]));

        assert!(!cache.is_cached(&q, &v));
        let first = cache.compute(&q, &v).clone();
        let second = cache.compute(&q, &v).clone();

        assert_eq!(plant.passes.get(), 1);
        assert_eq!(first, second);
        assert!(cache.is_cached(&q, &v));
    }

    #[test]
    fn new_state_recomputes() {
        let plant = Counting::default();
        let mut cache = KinematicsCacheWithV::new(&plant);

        let _ = cache.compute(&vector(&[0.5]), &vector(&[1.0]));
        let (q, v) = cache.compute(&vector(&[0.5]), &vector(&[2.0])).clone();

        assert_eq!(plant.passes.get(), 2);
        assert_eq!(q, vector(&[0.5]));
        assert_eq!(v, vector(&[2.0]));
        assert!(!cache.is_cached(&vector(&[0.5]), &vector(&[1.0])));
    }

    #[test]
    fn invalidate_forces_a_recompute() {
        let plant = Counting::default();
        let mut cache = KinematicsCache::new(&plant);
        let q = vector(&[0.5]);

        let _ = cache.compute(&q);
        cache.invalidate();
        assert!(!cache.is_cached(&q));
        let _ = cache.compute(&q);

        assert_eq!(plant.passes.get(), 2);
    }

    #[test]
    fn dual_keys_include_derivatives() {
        let plant = Counting::default();
        let mut cache = KinematicsCache::<_, Dual>::new(&plant);
        let x = vector(&[0.5, 0.5]);
        let seeded = seed(&x);
        let first = DVector::from_element(1, seeded[0].clone());
        let second = DVector::from_element(1, seeded[1].clone());

        let _ = cache.compute(&first);
        let _ = cache.compute(&first);
        assert_eq!(plant.passes.get(), 1);

        // Same value, different derivative: the cached result would be wrong.
        let _ = cache.compute(&second);
        assert_eq!(plant.passes.get(), 2);
    }
}
