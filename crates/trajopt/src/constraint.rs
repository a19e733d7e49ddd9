//! Differentiable vector constraints bound to decision variables.
//!
//! A [`Constraint`] is a vector function `g(z)` with bounds `lower ≤ g(z) ≤
//! upper`, evaluated on dual numbers so its Jacobian comes out of the same
//! call. A program binds each constraint to the variables that form `z`.

use dirtran_core::{Bounds, Dual, MultibodyPlant, linalg};
use nalgebra::{DMatrix, DVector};

use crate::{
    cache::KinematicsCache, error::Error, transcription::DirectTranscriptionConstraint,
    variables::Variable,
};

/// A bounded vector function of a fixed number of inputs.
pub trait Constraint {
    /// Returns the number of inputs the constraint is evaluated at.
    fn num_inputs(&self) -> usize;

    /// Returns the row bounds, one entry per output.
    fn bounds(&self) -> Bounds;

    /// Evaluates the constraint.
    ///
    /// The derivatives of the outputs are read from the returned duals.
    ///
    /// # Errors
    ///
    /// Returns an error if the constraint cannot be evaluated at `z`.
    fn eval(&mut self, z: &DVector<Dual>) -> Result<DVector<Dual>, Error>;

    /// Returns the number of outputs.
    fn num_outputs(&self) -> usize {
        self.bounds().len()
    }
}

/// A constraint together with the variables it is evaluated at.
pub(crate) struct Binding<'a> {
    pub(crate) constraint: Box<dyn Constraint + 'a>,
    pub(crate) variables: Vec<Variable>,
}

/// Rows `lower ≤ A·z ≤ upper`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    coefficients: DMatrix<f64>,
    bounds: Bounds,
}

impl LinearConstraint {
    /// Creates linear rows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if the bounds do not have one row
    /// per coefficient row.
    pub fn new(coefficients: DMatrix<f64>, bounds: Bounds) -> Result<Self, Error> {
        crate::error::check_len("linear constraint bounds", coefficients.nrows(), bounds.len())?;
        Ok(Self {
            coefficients,
            bounds,
        })
    }
}

impl Constraint for LinearConstraint {
    fn num_inputs(&self) -> usize {
        self.coefficients.ncols()
    }

    fn bounds(&self) -> Bounds {
        self.bounds.clone()
    }

    fn eval(&mut self, z: &DVector<Dual>) -> Result<DVector<Dual>, Error> {
        Ok(linalg::const_mat_vec(&self.coefficients, z))
    }
}

/// Complementarity between a joint's limit gaps and its limit multipliers.
///
/// Inputs are `[q, λ_lower, λ_upper]`. With `q` kept inside the limits and
/// both multipliers nonnegative, the rows
///
/// ```text
/// (q − lower)·λ_lower ≤ 0
/// (upper − q)·λ_upper ≤ 0
/// ```
///
/// hold exactly when each multiplier vanishes away from its limit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct JointLimitComplementarity {
    pub(crate) lower: f64,
    pub(crate) upper: f64,
}

impl Constraint for JointLimitComplementarity {
    fn num_inputs(&self) -> usize {
        3
    }

    fn bounds(&self) -> Bounds {
        Bounds::new(
            DVector::from_element(2, f64::NEG_INFINITY),
            DVector::zeros(2),
        )
    }

    fn eval(&mut self, z: &DVector<Dual>) -> Result<DVector<Dual>, Error> {
        let q = z[0].clone();
        let lower_gap = q.clone() - self.lower;
        let upper_gap = -(q - self.upper);
        Ok(DVector::from_vec(vec![
            lower_gap * z[1].clone(),
            upper_gap * z[2].clone(),
        ]))
    }
}

/// The plant's position constraints `φ(q) = 0` at one sample.
pub(crate) struct PositionConstraint<'a, P: MultibodyPlant> {
    cache: KinematicsCache<'a, P, Dual>,
}

impl<'a, P: MultibodyPlant> PositionConstraint<'a, P> {
    pub(crate) fn new(plant: &'a P) -> Self {
        Self {
            cache: KinematicsCache::new(plant),
        }
    }
}

impl<P: MultibodyPlant> Constraint for PositionConstraint<'_, P> {
    fn num_inputs(&self) -> usize {
        self.cache.plant().num_positions()
    }

    fn bounds(&self) -> Bounds {
        Bounds::zeros(self.cache.plant().num_position_constraints())
    }

    fn eval(&mut self, q: &DVector<Dual>) -> Result<DVector<Dual>, Error> {
        let plant = self.cache.plant();
        let kinematics = self.cache.compute(q);
        Ok(plant.position_constraints(kinematics))
    }
}

/// Pins the transcription defect of one interval to zero.
pub(crate) struct Dynamics<'a, P: MultibodyPlant> {
    pub(crate) transcription: DirectTranscriptionConstraint<'a, P, Dual>,
}

impl<P: MultibodyPlant> Constraint for Dynamics<'_, P> {
    fn num_inputs(&self) -> usize {
        self.transcription.num_inputs()
    }

    fn bounds(&self) -> Bounds {
        Bounds::zeros(self.transcription.num_outputs())
    }

    fn eval(&mut self, z: &DVector<Dual>) -> Result<DVector<Dual>, Error> {
        self.transcription.eval(z)
    }
}
