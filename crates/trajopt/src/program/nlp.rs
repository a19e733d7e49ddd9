use dirtran_core::{
    Bounds, ConstraintEvaluation, CostEvaluation, Dual, MultibodyPlant, NonlinearProgram, Scalar,
    gradient, linalg, seed,
};
use nalgebra::{DMatrix, DVector};

use crate::{
    error::{Error, check_len},
    variables::Variable,
};

use super::{CostFn, DirectTranscription, Sample};

impl<P: MultibodyPlant> NonlinearProgram for DirectTranscription<'_, P> {
    type Error = Error;

    fn num_variables(&self) -> usize {
        Self::num_variables(self)
    }

    fn num_constraints(&self) -> usize {
        Self::num_constraints(self)
    }

    fn variable_bounds(&self) -> Bounds {
        Bounds::new(
            DVector::from_column_slice(&self.lower),
            DVector::from_column_slice(&self.upper),
        )
    }

    fn constraint_bounds(&self) -> Bounds {
        let bounds: Vec<Bounds> = self
            .constraints
            .iter()
            .map(|binding| binding.constraint.bounds())
            .collect();
        let lower: Vec<&DVector<f64>> = bounds.iter().map(|b| &b.lower).collect();
        let upper: Vec<&DVector<f64>> = bounds.iter().map(|b| &b.upper).collect();
        Bounds::new(linalg::concat(&lower), linalg::concat(&upper))
    }

    fn initial_guess(&self) -> DVector<f64> {
        DVector::from_column_slice(&self.guess)
    }

    /// Evaluates the running costs with the trapezoidal rule plus the final
    /// costs.
    ///
    /// Each sample's cost is differentiated with respect to that sample's
    /// variables only, and the result is scattered into the full gradient.
    fn cost(&mut self, x: &DVector<f64>) -> Result<CostEvaluation, Error> {
        check_len("decision vector", self.num_variables, x.len())?;
        let mut value = 0.0;
        let mut grad = DVector::zeros(self.num_variables);

        if !self.running_costs.is_empty() {
            let samples: Vec<_> = (0..self.num_samples)
                .map(|i| self.sample_cost(&self.running_costs, i, x))
                .collect();

            for (i, h_var) in self.h.iter().enumerate() {
                let h = x[h_var.index()];
                let (left, right) = (&samples[i], &samples[i + 1]);
                value += 0.5 * h * (left.value + right.value);
                grad[h_var.index()] += 0.5 * (left.value + right.value);
                left.scatter(0.5 * h, &mut grad);
                right.scatter(0.5 * h, &mut grad);
            }
        }

        if !self.final_costs.is_empty() {
            let last = self.sample_cost(&self.final_costs, self.num_samples - 1, x);
            value += last.value;
            last.scatter(1.0, &mut grad);
        }

        Ok(CostEvaluation {
            value,
            gradient: grad,
        })
    }

    /// Evaluates every bound constraint at its own variables.
    fn constraints(&mut self, x: &DVector<f64>) -> Result<ConstraintEvaluation, Error> {
        check_len("decision vector", self.num_variables, x.len())?;
        let m = Self::num_constraints(self);
        let mut values = DVector::zeros(m);
        let mut jacobian = DMatrix::zeros(m, self.num_variables);

        let mut row = 0;
        for binding in &mut self.constraints {
            let local = gather(x, &binding.variables);
            let outputs = binding.constraint.eval(&seed(&local))?;
            check_len("constraint outputs", binding.constraint.num_outputs(), outputs.len())?;

            for (offset, output) in outputs.iter().enumerate() {
                values[row + offset] = output.value();
                let local_grad = gradient(output, local.len());
                for (var, partial) in binding.variables.iter().zip(local_grad.iter()) {
                    jacobian[(row + offset, var.index())] += partial;
                }
            }
            row += outputs.len();
        }

        Ok(ConstraintEvaluation { values, jacobian })
    }
}

/// A sample cost and its gradient with respect to that sample's variables.
struct SampleCost {
    value: f64,
    gradient: DVector<f64>,
    variables: Vec<Variable>,
}

impl SampleCost {
    /// Adds `weight · ∇g` into the full gradient.
    fn scatter(&self, weight: f64, grad: &mut DVector<f64>) {
        for (var, partial) in self.variables.iter().zip(self.gradient.iter()) {
            grad[var.index()] += weight * partial;
        }
    }
}

impl<P: MultibodyPlant> DirectTranscription<'_, P> {
    fn sample_cost(&self, costs: &[CostFn<'_>], i: usize, x: &DVector<f64>) -> SampleCost {
        let mut variables: Vec<Variable> = self.q.column(i).iter().copied().collect();
        variables.extend(self.v.column(i).iter());
        variables.extend(self.u.column(i).iter());

        let local = seed(&gather(x, &variables));
        let (nq, nv) = (self.q.nrows(), self.v.nrows());
        let sample = Sample {
            q: linalg::segment(&local, 0, nq),
            v: linalg::segment(&local, nq, nv),
            u: linalg::segment(&local, nq + nv, self.u.nrows()),
        };

        let total = costs
            .iter()
            .fold(Dual::constant(0.0), |acc, cost| acc + cost(&sample));

        SampleCost {
            value: total.value(),
            gradient: gradient(&total, variables.len()),
            variables,
        }
    }
}

fn gather(x: &DVector<f64>, variables: &[Variable]) -> DVector<f64> {
    DVector::from_iterator(variables.len(), variables.iter().map(|var| x[var.index()]))
}
