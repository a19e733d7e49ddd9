pub mod nonlinear;

pub use nonlinear::{Bounds, NonlinearProgram};
