//! The multiple-shooting program over a time-sampled trajectory.

mod nlp;

use dirtran_core::{Bounds, Dual, MultibodyPlant, NlpSolution, NlpSolver, SolutionStatus};
use dirtran_solvers::optimization::sqp;
use nalgebra::{DMatrix, DVector};
use tracing::{debug, info, warn};

use crate::{
    constraint::{
        Binding, Constraint, Dynamics, JointLimitComplementarity, LinearConstraint,
        PositionConstraint,
    },
    error::{Error, check_len},
    force::{GeneralizedConstraintForce, JointLimitForce, PositionConstraintForce},
    transcription::DirectTranscriptionConstraint,
    variables::{LinearExpression, SolutionValue, Variable},
};

/// The state and input at one sample, as seen by a cost.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample<T> {
    pub q: DVector<T>,
    pub v: DVector<T>,
    pub u: DVector<T>,
}

/// Where a [`DirectTranscription`] is in its lifecycle.
///
/// Structure can only change while `Building`. [`DirectTranscription::compile`]
/// moves to `Compiled`, and every solve moves to `Solved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Building,
    Compiled,
    Solved,
}

type CostFn<'a> = Box<dyn Fn(&Sample<Dual>) -> Dual + 'a>;
type ForceEvaluator<'a, P> = Box<dyn GeneralizedConstraintForce<P, Dual> + 'a>;

/// A trajectory optimization transcribed with backward Euler.
///
/// The trajectory is sampled at `N` instants separated by `N − 1` variable
/// time steps. Every sample carries positions, velocities, inputs and
/// position-constraint forces, and every interval is tied to the plant's
/// dynamics by a [`DirectTranscriptionConstraint`] once the program is
/// compiled.
///
/// The decision vector is laid out as
///
/// ```text
/// [h | q | v | u | λ | extra]
/// ```
///
/// with the sample blocks stored column by column and `extra` holding
/// variables added later, such as joint limit multipliers.
pub struct DirectTranscription<'a, P: MultibodyPlant> {
    plant: &'a P,
    num_samples: usize,
    num_variables: usize,

    h: DVector<Variable>,
    q: DMatrix<Variable>,
    v: DMatrix<Variable>,
    u: DMatrix<Variable>,
    lambda: DMatrix<Variable>,

    lower: Vec<f64>,
    upper: Vec<f64>,
    guess: Vec<f64>,

    force_evaluators: Vec<Vec<(ForceEvaluator<'a, P>, DVector<Variable>)>>,
    constraints: Vec<Binding<'a>>,
    running_costs: Vec<CostFn<'a>>,
    final_costs: Vec<CostFn<'a>>,

    phase: Phase,
    solution: Option<NlpSolution>,
}

impl<'a, P: MultibodyPlant> DirectTranscription<'a, P> {
    /// Creates a program with `num_samples` samples and time steps bounded by
    /// `[min_time_step, max_time_step]`.
    ///
    /// Every variable starts unbounded with an initial guess of zero, except
    /// the time steps, which start at the middle of their bounds.
    ///
    /// # Errors
    ///
    /// Returns an error if there are fewer than two samples, if the time step
    /// bounds are not finite with `0 < min ≤ max`, or if the plant has a
    /// different number of positions and velocities.
    pub fn new(
        plant: &'a P,
        num_samples: usize,
        min_time_step: f64,
        max_time_step: f64,
    ) -> Result<Self, Error> {
        if num_samples < 2 {
            return Err(Error::InvalidSampleCount(num_samples));
        }
        let valid_steps = min_time_step.is_finite()
            && max_time_step.is_finite()
            && min_time_step > 0.0
            && min_time_step <= max_time_step;
        if !valid_steps {
            return Err(Error::InvalidTimeStepBounds {
                h_min: min_time_step,
                h_max: max_time_step,
            });
        }
        let (nq, nv) = (plant.num_positions(), plant.num_velocities());
        if nq != nv {
            return Err(Error::PositionVelocityMismatch { nq, nv });
        }

        let num_intervals = num_samples - 1;
        let mut count = 0;
        let h = allocate(&mut count, num_intervals, 1).column(0).into_owned();
        let q = allocate(&mut count, nq, num_samples);
        let v = allocate(&mut count, nv, num_samples);
        let u = allocate(&mut count, plant.num_actuators(), num_samples);
        let lambda = allocate(&mut count, plant.num_position_constraints(), num_samples);

        let mut lower = vec![f64::NEG_INFINITY; count];
        let mut upper = vec![f64::INFINITY; count];
        let mut guess = vec![0.0; count];
        for var in &h {
            lower[var.index()] = min_time_step;
            upper[var.index()] = max_time_step;
            guess[var.index()] = 0.5 * (min_time_step + max_time_step);
        }

        Ok(Self {
            plant,
            num_samples,
            num_variables: count,
            h,
            q,
            v,
            u,
            lambda,
            lower,
            upper,
            guess,
            force_evaluators: (0..num_intervals).map(|_| Vec::new()).collect(),
            constraints: Vec::new(),
            running_costs: Vec::new(),
            final_costs: Vec::new(),
            phase: Phase::Building,
            solution: None,
        })
    }

    #[must_use]
    pub fn plant(&self) -> &'a P {
        self.plant
    }

    #[must_use]
    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    #[must_use]
    pub fn num_intervals(&self) -> usize {
        self.num_samples - 1
    }

    #[must_use]
    pub fn num_variables(&self) -> usize {
        self.num_variables
    }

    /// Returns the number of constraint rows added so far.
    ///
    /// Dynamics rows are only counted once the program is compiled.
    #[must_use]
    pub fn num_constraints(&self) -> usize {
        self.constraints
            .iter()
            .map(|binding| binding.constraint.num_outputs())
            .sum()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the status of the last solve, if any.
    #[must_use]
    pub fn status(&self) -> Option<SolutionStatus> {
        self.solution.as_ref().map(|solution| solution.status)
    }

    /// Returns the full result of the last solve, if any.
    #[must_use]
    pub fn solution(&self) -> Option<&NlpSolution> {
        self.solution.as_ref()
    }

    /// Returns the `N − 1` time step variables.
    #[must_use]
    pub fn time_steps(&self) -> &DVector<Variable> {
        &self.h
    }

    /// Returns the `nq × N` position variables, one column per sample.
    #[must_use]
    pub fn generalized_positions(&self) -> &DMatrix<Variable> {
        &self.q
    }

    /// Returns the `nv × N` velocity variables, one column per sample.
    #[must_use]
    pub fn generalized_velocities(&self) -> &DMatrix<Variable> {
        &self.v
    }

    /// Returns the `nu × N` input variables, one column per sample.
    ///
    /// The input at sample `i` acts over the interval ending at `i`, so the
    /// first column does not enter the dynamics.
    #[must_use]
    pub fn inputs(&self) -> &DMatrix<Variable> {
        &self.u
    }

    /// Returns the input variables at sample `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfRange`] if `index >= N`.
    pub fn input(&self, index: usize) -> Result<DVector<Variable>, Error> {
        self.check_sample(index)?;
        Ok(self.u.column(index).into_owned())
    }

    /// Returns the `nc × N` position constraint force multipliers.
    ///
    /// Like the inputs, the multipliers at sample `i` act over the interval
    /// ending at `i`, so the first column does not enter the dynamics.
    #[must_use]
    pub fn position_constraint_forces(&self) -> &DMatrix<Variable> {
        &self.lambda
    }

    /// Returns the total duration `Σ hᵢ` as an expression.
    #[must_use]
    pub fn duration(&self) -> LinearExpression {
        LinearExpression::sum(self.h.iter().copied())
    }

    /// Bounds every variable in `vars` to `[lower, upper]`.
    ///
    /// The new bounds are intersected with any bounds already in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the program is compiled, a variable does not belong
    /// to it, or the bounds (alone or intersected) are empty.
    pub fn add_bounding_box_constraint<'v>(
        &mut self,
        lower: f64,
        upper: f64,
        vars: impl IntoIterator<Item = &'v Variable>,
    ) -> Result<(), Error> {
        self.ensure_building()?;
        check_bounds(lower, upper)?;

        let vars: Vec<Variable> = vars.into_iter().copied().collect();
        for &var in &vars {
            self.check_variable(var)?;
            let i = var.index();
            check_bounds(self.lower[i].max(lower), self.upper[i].min(upper))?;
        }
        for var in vars {
            let i = var.index();
            self.lower[i] = self.lower[i].max(lower);
            self.upper[i] = self.upper[i].min(upper);
        }
        Ok(())
    }

    /// Adds `lower ≤ expr ≤ upper`.
    ///
    /// # Errors
    ///
    /// Returns an error if the program is compiled, a variable does not belong
    /// to it, or the bounds are empty.
    pub fn add_linear_constraint(
        &mut self,
        expr: &LinearExpression,
        lower: f64,
        upper: f64,
    ) -> Result<(), Error> {
        check_bounds(lower, upper)?;
        let variables: Vec<Variable> = expr.terms().iter().map(|&(var, _)| var).collect();
        let coefficients = DMatrix::from_iterator(
            1,
            variables.len(),
            expr.terms().iter().map(|&(_, coeff)| coeff),
        );
        let bounds = Bounds::new(
            DVector::from_element(1, lower - expr.constant()),
            DVector::from_element(1, upper - expr.constant()),
        );
        self.add_constraint(LinearConstraint::new(coefficients, bounds)?, &variables)
    }

    /// Adds `lower ≤ Σ hᵢ ≤ upper`.
    ///
    /// # Errors
    ///
    /// Returns an error if the program is compiled or the bounds are empty.
    pub fn add_duration_bounds(&mut self, lower: f64, upper: f64) -> Result<(), Error> {
        let duration = self.duration();
        self.add_linear_constraint(&duration, lower, upper)
    }

    /// Forces every time step to take the same value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyCompiled`] if the program is compiled.
    pub fn add_equal_time_intervals_constraints(&mut self) -> Result<(), Error> {
        self.ensure_building()?;
        let n = self.num_intervals();
        if n < 2 {
            return Ok(());
        }

        let coefficients = DMatrix::from_fn(n - 1, n, |row, col| {
            if col == row {
                1.0
            } else if col == row + 1 {
                -1.0
            } else {
                0.0
            }
        });
        let constraint = LinearConstraint::new(coefficients, Bounds::zeros(n - 1))?;
        let variables: Vec<Variable> = self.h.iter().copied().collect();
        self.add_constraint(constraint, &variables)
    }

    /// Enforces the plant's position constraints `φ(q) = 0` at a sample.
    ///
    /// # Errors
    ///
    /// Returns an error if the program is compiled or `sample >= N`.
    pub fn add_position_constraint(&mut self, sample: usize) -> Result<(), Error> {
        self.check_sample(sample)?;
        let variables: Vec<Variable> = self.q.column(sample).iter().copied().collect();
        self.add_constraint(PositionConstraint::new(self.plant), &variables)
    }

    /// Adds a general constraint evaluated at `variables`.
    ///
    /// # Errors
    ///
    /// Returns an error if the program is compiled, a variable does not belong
    /// to it, or the constraint expects a different number of inputs.
    pub fn add_constraint<C: Constraint + 'a>(
        &mut self,
        constraint: C,
        variables: &[Variable],
    ) -> Result<(), Error> {
        self.ensure_building()?;
        check_len("constraint inputs", constraint.num_inputs(), variables.len())?;
        for &var in variables {
            self.check_variable(var)?;
        }

        self.constraints.push(Binding {
            constraint: Box::new(constraint),
            variables: variables.to_vec(),
        });
        Ok(())
    }

    /// Adds `∫ g(q, v, u) dt` to the cost.
    ///
    /// The integral is approximated with the trapezoidal rule,
    /// `Σᵢ hᵢ·(g(sampleᵢ) + g(sampleᵢ₊₁)) / 2`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyCompiled`] if the program is compiled.
    pub fn add_running_cost<F>(&mut self, cost: F) -> Result<(), Error>
    where
        F: Fn(&Sample<Dual>) -> Dual + 'a,
    {
        self.ensure_building()?;
        self.running_costs.push(Box::new(cost));
        Ok(())
    }

    /// Adds `g(q, v, u)` at the last sample to the cost.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyCompiled`] if the program is compiled.
    pub fn add_final_cost<F>(&mut self, cost: F) -> Result<(), Error>
    where
        F: Fn(&Sample<Dual>) -> Dual + 'a,
    {
        self.ensure_building()?;
        self.final_costs.push(Box::new(cost));
        Ok(())
    }

    /// Adds a force to the dynamics of one interval.
    ///
    /// The force acts at the interval's right sample. Its parameters become
    /// new unbounded variables with a zero initial guess, which are returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the program is compiled, the interval is out of
    /// range, or the evaluator does not fit the plant.
    pub fn add_generalized_constraint_force(
        &mut self,
        interval: usize,
        evaluator: ForceEvaluator<'a, P>,
    ) -> Result<DVector<Variable>, Error> {
        self.ensure_building()?;
        self.check_interval(interval)?;
        evaluator.check_plant(self.plant)?;

        let params = self.new_variables(evaluator.num_params(), f64::NEG_INFINITY, f64::INFINITY);
        self.force_evaluators[interval].push((evaluator, params.clone()));
        Ok(params)
    }

    /// Keeps one joint inside `[lower, upper]` with implicit limit forces.
    ///
    /// At the right sample of `interval`, position `joint` is bounded to the
    /// limits and velocity `dof` receives the force `λ_lower − λ_upper`. The
    /// two multipliers are nonnegative and complementary to the limit gaps,
    /// so each one can only push while its limit is active.
    ///
    /// Returns the multiplier variables `[λ_lower, λ_upper]`.
    ///
    /// # Errors
    ///
    /// Returns an error if the program is compiled, an index is out of range,
    /// or the limits are not finite with `lower ≤ upper`.
    pub fn add_joint_limit_implicit_constraint(
        &mut self,
        interval: usize,
        joint: usize,
        dof: usize,
        lower: f64,
        upper: f64,
    ) -> Result<[Variable; 2], Error> {
        self.ensure_building()?;
        self.check_interval(interval)?;
        check_index("joint", joint, self.plant.num_positions())?;
        check_index("dof", dof, self.plant.num_velocities())?;
        if !(lower.is_finite() && upper.is_finite()) {
            return Err(Error::InvalidBounds { lower, upper });
        }
        check_bounds(lower, upper)?;

        let q = self.q[(joint, interval + 1)];
        self.add_bounding_box_constraint(lower, upper, [q].iter())?;

        let force = JointLimitForce::new(dof, lower, upper);
        let params = self.add_generalized_constraint_force(interval, Box::new(force))?;
        let lambda = [params[0], params[1]];
        self.add_bounding_box_constraint(0.0, f64::INFINITY, lambda.iter())?;

        let complementarity = JointLimitComplementarity { lower, upper };
        self.add_constraint(complementarity, &[q, lambda[0], lambda[1]])?;

        debug!(interval, joint, dof, lower, upper, "added joint limit");
        Ok(lambda)
    }

    /// Sets the initial guess of `vars` to `values`.
    ///
    /// Allowed in every phase, so a solved program can be warm started.
    ///
    /// # Errors
    ///
    /// Returns an error if the counts differ or a variable does not belong to
    /// the program.
    pub fn set_initial_guess<'v>(
        &mut self,
        vars: impl IntoIterator<Item = &'v Variable>,
        values: &[f64],
    ) -> Result<(), Error> {
        let vars: Vec<Variable> = vars.into_iter().copied().collect();
        check_len("initial guess values", vars.len(), values.len())?;
        for &var in &vars {
            self.check_variable(var)?;
        }
        for (var, &value) in vars.iter().zip(values) {
            self.guess[var.index()] = value;
        }
        Ok(())
    }

    /// Ties every interval to the plant's dynamics and freezes the structure.
    ///
    /// Each interval gets a [`DirectTranscriptionConstraint`] with the
    /// position constraint force first (when the plant has position
    /// constraints), followed by the interval's registered forces.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyCompiled`] if called twice.
    pub fn compile(&mut self) -> Result<(), Error> {
        self.ensure_building()?;

        let has_loops = self.plant.num_position_constraints() > 0;
        for interval in 0..self.num_intervals() {
            let (l, r) = (interval, interval + 1);
            let mut transcription = DirectTranscriptionConstraint::new(self.plant)?;
            let mut variables = vec![self.h[interval]];
            variables.extend(self.q.column(l).iter());
            variables.extend(self.v.column(l).iter());
            variables.extend(self.q.column(r).iter());
            variables.extend(self.v.column(r).iter());
            variables.extend(self.u.column(r).iter());

            if has_loops {
                let force = PositionConstraintForce::new(self.plant);
                transcription.add_generalized_constraint_force_evaluator(Box::new(force))?;
                variables.extend(self.lambda.column(r).iter());
            }
            for (evaluator, params) in std::mem::take(&mut self.force_evaluators[interval]) {
                transcription.add_generalized_constraint_force_evaluator(evaluator)?;
                variables.extend(params.iter());
            }

            self.constraints.push(Binding {
                constraint: Box::new(Dynamics { transcription }),
                variables,
            });
        }

        self.phase = Phase::Compiled;
        info!(
            samples = self.num_samples,
            variables = self.num_variables,
            constraints = self.num_constraints(),
            "compiled direct transcription"
        );
        Ok(())
    }

    /// Solves the program with the default SQP solver.
    ///
    /// # Errors
    ///
    /// See [`solve_with`](Self::solve_with).
    pub fn solve(&mut self) -> Result<SolutionStatus, Error> {
        self.solve_with(&mut sqp::Sqp::new(sqp::Config::default()))
    }

    /// Solves the program with `solver`, starting from the initial guess.
    ///
    /// The solution is stored whatever the status, so a failed solve can
    /// still be inspected with [`get_solution`](Self::get_solution).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotCompiled`] before [`compile`](Self::compile), or
    /// [`Error::Solver`] if the solver fails outright.
    pub fn solve_with<S: NlpSolver>(&mut self, solver: &mut S) -> Result<SolutionStatus, Error> {
        if self.phase == Phase::Building {
            return Err(Error::NotCompiled);
        }

        let solution = solver
            .solve(self)
            .map_err(|err| Error::Solver(Box::new(err)))?;
        let status = solution.status;
        if status.is_success() {
            info!(
                iters = solution.iters,
                objective = solution.objective,
                "trajectory optimization converged"
            );
        } else {
            warn!(
                ?status,
                iters = solution.iters,
                violation = solution.constraint_violation,
                "trajectory optimization did not converge"
            );
        }

        self.solution = Some(solution);
        self.phase = Phase::Solved;
        Ok(status)
    }

    /// Reads the value of variables or expressions from the last solution.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSolved`] if the program has not been solved, or
    /// [`Error::IndexOutOfRange`] if `expr` reads a variable this program
    /// does not have.
    pub fn get_solution<S: SolutionValue + ?Sized>(&self, expr: &S) -> Result<S::Output, Error> {
        let solution = self.solution.as_ref().ok_or(Error::NotSolved)?;
        for var in expr.variables() {
            self.check_variable(var)?;
        }
        Ok(expr.value_in(&solution.x))
    }

    /// Returns the time of every sample in the last solution, starting at zero.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSolved`] if the program has not been solved.
    pub fn sample_times(&self) -> Result<DVector<f64>, Error> {
        let steps = self.get_solution(&self.h)?;
        let mut times = DVector::zeros(self.num_samples);
        for (i, h) in steps.iter().enumerate() {
            times[i + 1] = times[i] + h;
        }
        Ok(times)
    }

    /// Appends `count` variables with shared bounds and a zero guess.
    fn new_variables(&mut self, count: usize, lower: f64, upper: f64) -> DVector<Variable> {
        let start = self.num_variables;
        self.num_variables += count;
        self.lower.resize(self.num_variables, lower);
        self.upper.resize(self.num_variables, upper);
        self.guess.resize(self.num_variables, 0.0);
        DVector::from_fn(count, |i, _| Variable::new(start + i))
    }

    fn ensure_building(&self) -> Result<(), Error> {
        match self.phase {
            Phase::Building => Ok(()),
            Phase::Compiled | Phase::Solved => Err(Error::AlreadyCompiled),
        }
    }

    fn check_interval(&self, interval: usize) -> Result<(), Error> {
        let num_intervals = self.num_intervals();
        if interval < num_intervals {
            Ok(())
        } else {
            Err(Error::IntervalOutOfRange {
                interval,
                num_intervals,
            })
        }
    }

    fn check_sample(&self, sample: usize) -> Result<(), Error> {
        check_index("sample", sample, self.num_samples)
    }

    fn check_variable(&self, var: Variable) -> Result<(), Error> {
        check_index("variable", var.index(), self.num_variables)
    }
}

/// Allocates a `rows × cols` block of consecutive variables, column by column.
fn allocate(count: &mut usize, rows: usize, cols: usize) -> DMatrix<Variable> {
    let start = *count;
    *count += rows * cols;
    DMatrix::from_fn(rows, cols, |i, j| Variable::new(start + i + rows * j))
}

fn check_index(what: &'static str, index: usize, len: usize) -> Result<(), Error> {
    if index < len {
        Ok(())
    } else {
        Err(Error::IndexOutOfRange { what, index, len })
    }
}

fn check_bounds(lower: f64, upper: f64) -> Result<(), Error> {
    if lower <= upper {
        Ok(())
    } else {
        Err(Error::InvalidBounds { lower, upper })
    }
}
