//! Entangler controller model.
//!
//! This crate implements a tick-accurate model of the pulse-sequencing and
//! heralding controller used to generate remote entanglement between two
//! trapped-ion nodes, with the following:
//! 1. **Core:** Register file, cycle sequencer, gated input sampler and herald matcher.
//! 2. **Synchronization:** Master/slave handshake over a registered inter-core link.
//! 3. **Protocol:** 5-bit register addressing in the Legacy, Standard and Extended revisions.
//! 4. **SoC:** Register-mapped device wrapper and a two-core testbed.
//! 5. **Simulation:** Scenario files, scripted stimulus, configuration and statistics.

/// Common types and constants (bit fields, protocol limits, errors).
pub mod common;
/// Build-time configuration (defaults, protocol revisions, handshake timing).
pub mod config;
/// Entangler core (registers, sequencer, sampler, herald matcher, sync).
pub mod core;
/// Scenario loading, stimulus and the simulation loop.
pub mod sim;
/// Simulated hardware (device trait, entangler device, link, testbed).
pub mod soc;
/// Simulation statistics collection and reporting.
pub mod stats;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// One complete controller core.
pub use crate::core::EntanglerCore;
/// Scenario description; load with `Scenario::from_file`.
pub use crate::sim::Scenario;
/// Scenario runner; construct with `Simulator::new`.
pub use crate::sim::Simulator;
/// Two-core testbed.
pub use crate::soc::Testbed;
