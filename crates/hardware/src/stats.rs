//! Simulation statistics collection and reporting.
//!
//! This module summarizes a scenario run. It provides:
//! 1. **Summary:** Simulated ticks, host time and simulation rate.
//! 2. **Per-core results:** Role, exit reason and the final register image.
//! 3. **Activity:** Cycle boundaries, output duty and dropped register accesses.
//!
//! Reports serialize to JSON for machine consumption and print as a table.

use std::time::Instant;

use serde::Serialize;

use crate::common::constants::MAX_OUTPUT_CHANNELS;
use crate::core::registers::{Role, StatusSnapshot};
use crate::core::sequencer::ExitReason;
use crate::soc::testbed::Side;

/// Results for one core.
#[derive(Debug, Clone, Serialize)]
pub struct CoreReport {
    /// Side of the link the core sits on.
    pub side: Side,
    /// Role selected by the core's Config register.
    pub role: Role,
    /// Exit reason of the last sequence, if one finished.
    pub outcome: Option<ExitReason>,
    /// Tick on which the last sequence finished.
    pub finished_at: Option<u64>,
    /// Final published status image.
    pub status: StatusSnapshot,
    /// Run writes applied.
    pub runs_written: u32,
    /// Cycle boundaries crossed over the whole simulation.
    pub boundaries: u64,
    /// Ticks each output channel was asserted.
    pub output_ticks: [u64; MAX_OUTPUT_CHANNELS],
    /// Register accesses the device dropped.
    pub dropped_accesses: u64,
}

impl CoreReport {
    /// Creates an empty report for a core.
    pub fn new(side: Side, role: Role) -> Self {
        Self {
            side,
            role,
            outcome: None,
            finished_at: None,
            status: StatusSnapshot::default(),
            runs_written: 0,
            boundaries: 0,
            output_ticks: [0; MAX_OUTPUT_CHANNELS],
            dropped_accesses: 0,
        }
    }
}

/// Results of a scenario run.
#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    #[serde(skip)]
    start_time: Instant,
    /// Scenario label.
    pub scenario: String,
    /// Ticks simulated.
    pub ticks: u64,
    /// The tick budget ran out while a core was still active.
    pub budget_exhausted: bool,
    /// Per-core results, master first.
    pub cores: Vec<CoreReport>,
}

impl Default for RunStats {
    fn default() -> Self {
        Self {
            start_time: Instant::now(),
            scenario: String::new(),
            ticks: 0,
            budget_exhausted: false,
            cores: Vec::new(),
        }
    }
}

impl RunStats {
    /// Creates empty statistics for a scenario.
    pub fn new(scenario: &str) -> Self {
        Self {
            scenario: scenario.to_owned(),
            ..Self::default()
        }
    }

    /// Report of the core on `side`.
    pub fn core(&self, side: Side) -> Option<&CoreReport> {
        self.cores.iter().find(|c| c.side == side)
    }

    /// Mutable report of the core on `side`.
    pub fn core_mut(&mut self, side: Side) -> Option<&mut CoreReport> {
        self.cores.iter_mut().find(|c| c.side == side)
    }

    /// Prints all statistics to stdout.
    pub fn print(&self) {
        let seconds = self.start_time.elapsed().as_secs_f64().max(f64::EPSILON);
        let khz = (self.ticks as f64 / seconds) / 1000.0;
        println!("\n==========================================================");
        println!("ENTANGLER SIMULATION STATISTICS");
        println!("==========================================================");
        println!("scenario                 {}", self.scenario);
        println!("host_seconds             {:.4} s", seconds);
        println!("sim_ticks                {}", self.ticks);
        println!("sim_freq                 {:.2} kHz", khz);
        println!("budget_exhausted         {}", self.budget_exhausted);

        for core in &self.cores {
            let s = &core.status;
            let ticks = self.ticks.max(1) as f64;
            println!("----------------------------------------------------------");
            println!("CORE {} ({})", core.side.device_name(), core.role);
            match core.outcome {
                Some(reason) => println!("  outcome                {reason}"),
                None if s.refused => println!("  outcome                refused ({:?})", s.fault),
                None => println!("  outcome                none"),
            }
            if let Some(t) = core.finished_at {
                println!("  finished_at            {t}");
            }
            println!("  status                 {:#06b}", s.status_word());
            println!("  n_cycles               {}", s.n_cycles);
            println!("  n_triggers             {}", s.n_triggers);
            println!("  run_result             {:#06x}", s.run_result);
            println!("  time_remaining         {}", s.time_remaining);
            println!("  runs_written           {}", core.runs_written);
            println!("  boundaries             {}", core.boundaries);
            for (i, &on) in core.output_ticks.iter().enumerate().filter(|(_, on)| **on > 0) {
                println!(
                    "  output{i}.active         {} ({:.2}%)",
                    on,
                    (on as f64 / ticks) * 100.0
                );
            }
            println!(
                "  timestamps             g0={} g1={} g2={} g3={} ref={}",
                s.timestamps.0[0],
                s.timestamps.0[1],
                s.timestamps.0[2],
                s.timestamps.0[3],
                s.timestamps.0[4]
            );
            if core.dropped_accesses > 0 {
                println!("  dropped_accesses       {}", core.dropped_accesses);
            }
        }
        println!("==========================================================");
    }
}
