//! Reusable observers for dirtran solvers.
//!
//! This crate provides [`Observer`] implementations and capability traits that
//! work across solvers.
//!
//! # Modules
//!
//! - [`traits`] — Capability traits for cross-solver observers
//!   ([`HasObjective`], [`HasConstraintViolation`], [`CanStopEarly`])
//!
//! # Observers
//!
//! - [`LogObserver`] — forwards every event as a `tracing` event
//! - [`History`] — records objective and constraint violation per iteration
//!
//! [`Observer`]: dirtran_core::Observer
//! [`HasObjective`]: traits::HasObjective
//! [`HasConstraintViolation`]: traits::HasConstraintViolation
//! [`CanStopEarly`]: traits::CanStopEarly

mod history;
mod log;
pub mod traits;

pub use history::History;
pub use log::LogObserver;
