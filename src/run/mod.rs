// src/run/mod.rs

//! Running a graph of simulations.
//!
//! - `setup.rs`: what one simulation run needs (paths, parameters, launcher).
//! - `restart.rs`: seeding `_restart_<n>` directories from earlier output.
//! - `orchestrator.rs`: the wave loop.

pub mod orchestrator;
pub mod restart;
pub mod setup;

pub use orchestrator::{Orchestrator, RunOptions, RunReport};
pub use restart::prepare_restart;
pub use setup::RunSetup;
