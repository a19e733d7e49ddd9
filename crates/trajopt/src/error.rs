/// Errors that can occur while building, compiling or solving a trajectory
/// optimization.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("at least 2 time samples are required, got {0}")]
    InvalidSampleCount(usize),

    #[error("time step bounds must satisfy 0 < h_min <= h_max, got [{h_min}, {h_max}]")]
    InvalidTimeStepBounds { h_min: f64, h_max: f64 },

    #[error("interval {interval} is out of range for {num_intervals} intervals")]
    IntervalOutOfRange {
        interval: usize,
        num_intervals: usize,
    },

    #[error("{what} index {index} is out of range for length {len}")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("invalid bounds [{lower}, {upper}]")]
    InvalidBounds { lower: f64, upper: f64 },

    #[error("{what} has {actual} entries, expected {expected}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("plant has {nq} positions but {nv} velocities")]
    PositionVelocityMismatch { nq: usize, nv: usize },

    #[error("the program is already compiled")]
    AlreadyCompiled,

    #[error("the program must be compiled first")]
    NotCompiled,

    #[error("no solution is available")]
    NotSolved,

    #[error("solver error: {0}")]
    Solver(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Returns `DimensionMismatch` unless `actual == expected`.
pub(crate) fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<(), Error> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::DimensionMismatch {
            what,
            expected,
            actual,
        })
    }
}
