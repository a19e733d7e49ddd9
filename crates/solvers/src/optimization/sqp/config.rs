use thiserror::Error;

/// Configuration for the SQP solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    max_iters: usize,
    feasibility_tol: f64,
    optimality_tol: f64,
    step_tol: f64,
    initial_penalty: f64,
    max_penalty: f64,
    armijo: f64,
    min_step_fraction: f64,
    merit_memory: usize,
}

/// Errors that can occur when validating an SQP solver config.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("feasibility_tol must be finite and positive")]
    FeasibilityTol,

    #[error("optimality_tol must be finite and positive")]
    OptimalityTol,

    #[error("step_tol must be finite and positive")]
    StepTol,

    #[error("initial_penalty must be finite and positive")]
    InitialPenalty,

    #[error("max_penalty must be finite and at least initial_penalty")]
    MaxPenalty,

    #[error("armijo must lie in (0, 0.5)")]
    Armijo,

    #[error("min_step_fraction must lie in (0, 1)")]
    MinStepFraction,

    #[error("merit_memory must be at least 1")]
    MeritMemory,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_iters: 500,
            feasibility_tol: 1e-6,
            optimality_tol: 1e-6,
            step_tol: 1e-6,
            initial_penalty: 10.0,
            max_penalty: 1e6,
            armijo: 1e-4,
            min_step_fraction: 1e-10,
            merit_memory: 5,
        }
    }
}

impl Config {
    /// Creates a new config with validated tolerances.
    ///
    /// The optimality tolerance, penalty and line search parameters take
    /// their default values.
    ///
    /// # Errors
    ///
    /// Returns an error if any tolerance is non-positive or non-finite.
    pub fn new(max_iters: usize, feasibility_tol: f64, step_tol: f64) -> Result<Self, ConfigError> {
        if !is_positive(feasibility_tol) {
            return Err(ConfigError::FeasibilityTol);
        }
        if !is_positive(step_tol) {
            return Err(ConfigError::StepTol);
        }

        Ok(Self {
            max_iters,
            feasibility_tol,
            step_tol,
            ..Self::default()
        })
    }

    /// Returns a copy with a different iteration limit.
    #[must_use]
    pub fn with_max_iters(self, max_iters: usize) -> Self {
        Self { max_iters, ..self }
    }

    /// Returns a copy with a different optimality tolerance.
    ///
    /// # Errors
    ///
    /// Returns an error if `optimality_tol` is non-positive or non-finite.
    pub fn with_optimality_tol(self, optimality_tol: f64) -> Result<Self, ConfigError> {
        if !is_positive(optimality_tol) {
            return Err(ConfigError::OptimalityTol);
        }

        Ok(Self {
            optimality_tol,
            ..self
        })
    }

    /// Returns a copy with different merit penalty limits.
    ///
    /// # Errors
    ///
    /// Returns an error if `initial` is non-positive or non-finite, or if
    /// `max` is non-finite or smaller than `initial`.
    pub fn with_penalty(self, initial: f64, max: f64) -> Result<Self, ConfigError> {
        if !is_positive(initial) {
            return Err(ConfigError::InitialPenalty);
        }
        if !max.is_finite() || max < initial {
            return Err(ConfigError::MaxPenalty);
        }

        Ok(Self {
            initial_penalty: initial,
            max_penalty: max,
            ..self
        })
    }

    /// Returns a copy with different backtracking line search parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if `armijo` is outside `(0, 0.5)` or
    /// `min_step_fraction` is outside `(0, 1)`.
    pub fn with_line_search(self, armijo: f64, min_step_fraction: f64) -> Result<Self, ConfigError> {
        if !(armijo > 0.0 && armijo < 0.5) {
            return Err(ConfigError::Armijo);
        }
        if !(min_step_fraction > 0.0 && min_step_fraction < 1.0) {
            return Err(ConfigError::MinStepFraction);
        }

        Ok(Self {
            armijo,
            min_step_fraction,
            ..self
        })
    }

    /// Returns a copy that compares trial merits against the largest of the
    /// last `merit_memory` accepted iterates.
    ///
    /// A memory of 1 makes the line search monotone.
    ///
    /// # Errors
    ///
    /// Returns an error if `merit_memory` is zero.
    pub fn with_merit_memory(self, merit_memory: usize) -> Result<Self, ConfigError> {
        if merit_memory == 0 {
            return Err(ConfigError::MeritMemory);
        }

        Ok(Self {
            merit_memory,
            ..self
        })
    }

    /// Returns the maximum number of major iterations.
    #[must_use]
    pub fn max_iters(&self) -> usize {
        self.max_iters
    }

    /// Returns the largest constraint violation accepted at a solution.
    #[must_use]
    pub fn feasibility_tol(&self) -> f64 {
        self.feasibility_tol
    }

    /// Returns the largest Lagrangian gradient accepted at a solution,
    /// relative to `1 + ‖μ‖∞`.
    #[must_use]
    pub fn optimality_tol(&self) -> f64 {
        self.optimality_tol
    }

    /// Returns the relative step size below which the iteration stops.
    #[must_use]
    pub fn step_tol(&self) -> f64 {
        self.step_tol
    }

    /// Returns the starting weight of the constraint violation in the merit.
    #[must_use]
    pub fn initial_penalty(&self) -> f64 {
        self.initial_penalty
    }

    /// Returns the largest merit penalty before declaring infeasibility.
    #[must_use]
    pub fn max_penalty(&self) -> f64 {
        self.max_penalty
    }

    /// Returns the sufficient decrease fraction for the Armijo condition.
    #[must_use]
    pub fn armijo(&self) -> f64 {
        self.armijo
    }

    /// Returns the smallest step fraction tried before the line search fails.
    #[must_use]
    pub fn min_step_fraction(&self) -> f64 {
        self.min_step_fraction
    }

    /// Returns how many recent merits the line search compares against.
    #[must_use]
    pub fn merit_memory(&self) -> usize {
        self.merit_memory
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_tolerances() {
        assert_eq!(Config::new(10, 0.0, 1e-6), Err(ConfigError::FeasibilityTol));
        assert_eq!(Config::new(10, 1e-8, f64::NAN), Err(ConfigError::StepTol));
    }

    #[test]
    fn setters_revalidate() {
        let config = Config::default();

        assert_eq!(config.with_penalty(-1.0, 10.0), Err(ConfigError::InitialPenalty));
        assert_eq!(config.with_penalty(10.0, 1.0), Err(ConfigError::MaxPenalty));
        assert_eq!(config.with_line_search(0.5, 0.1), Err(ConfigError::Armijo));
        assert_eq!(config.with_line_search(0.1, 1.0), Err(ConfigError::MinStepFraction));
        assert_eq!(config.with_optimality_tol(0.0), Err(ConfigError::OptimalityTol));
        assert_eq!(config.with_merit_memory(0), Err(ConfigError::MeritMemory));

        let tuned = config
            .with_max_iters(20)
            .with_penalty(1.0, 100.0)
            .expect("valid penalty");
        assert_eq!(tuned.max_iters(), 20);
        assert_eq!(tuned.max_penalty(), 100.0);
        assert_eq!(tuned.step_tol(), config.step_tol());
        assert_eq!(tuned.merit_memory(), config.merit_memory());
    }
}
