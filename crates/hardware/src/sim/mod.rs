//! Scenario-driven simulation.
//!
//! Provides the scenario file format, scripted input stimulus, and the
//! simulator loop that drives a testbed through a scenario.

/// Scenario files and core register programs.
pub mod scenario;

/// Simulation loop and statistics collection.
pub mod simulator;

/// Scripted input edges.
pub mod stimulus;

pub use scenario::Scenario;
pub use simulator::Simulator;
