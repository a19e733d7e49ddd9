//! Reference multibody plants.
//!
//! Each plant implements [`dirtran_core::MultibodyPlant`] generically over
//! [`dirtran_core::Scalar`], so its dynamics can be differentiated exactly.

mod chain;
mod four_bar;
mod pendulum;

pub use chain::{ChainKinematics, Link, PlanarChain};
pub use four_bar::FourBar;
pub use pendulum::Pendulum;
