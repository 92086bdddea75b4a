//! Simulator: owns the testbed and the scenario script side-by-side.
//!
//! Register programs are applied through the device register interface before
//! the first tick; Run writes are applied just before the tick they are
//! scheduled for. The loop stops once every scheduled Run has been written and
//! no core is armed or running, or when the tick budget is spent.

use crate::config::GeneralConfig;
use crate::core::registers::RegisterAddress;
use crate::sim::scenario::{RunWrite, Scenario};
use crate::sim::stimulus::Stimulus;
use crate::soc::testbed::{Side, Testbed, TickEvents};
use crate::stats::{CoreReport, RunStats};

/// Top-level simulator: testbed + stimulus + pending Run writes.
#[derive(Debug)]
pub struct Simulator {
    testbed: Testbed,
    stimulus: Stimulus,
    pending: Vec<(Side, RunWrite)>,
    general: GeneralConfig,
    run_address: u64,
    stats: RunStats,
}

impl Simulator {
    /// Builds the testbed for a scenario and writes each core's configuration.
    pub fn new(scenario: &Scenario) -> Self {
        let revision = scenario.config.protocol.revision;
        let sides: Vec<Side> = scenario.programs().map(|(side, _)| side).collect();
        let mut testbed = Testbed::with_cores(&scenario.config, &sides);
        let mut stats = RunStats::new(&scenario.name);
        let mut pending = Vec::new();

        for (side, program) in scenario.programs() {
            for (address, word) in program.register_writes(revision) {
                let _ = testbed.write_register(side, address, word);
            }
            pending.extend(program.run_writes().into_iter().map(|r| (side, r)));
            stats.cores.push(CoreReport::new(side, program.role));
        }
        pending.sort_by_key(|(side, r)| (r.at, *side == Side::Slave));
        tracing::info!(
            scenario = %scenario.name,
            cores = sides.len(),
            runs = pending.len(),
            ?revision,
            "scenario loaded"
        );

        Self {
            testbed,
            stimulus: scenario.stimulus.clone(),
            pending,
            general: scenario.config.general.clone(),
            run_address: u64::from(RegisterAddress::Run.address(revision)),
            stats,
        }
    }

    /// Advances the simulation by one tick.
    pub fn tick(&mut self) -> TickEvents {
        let now = self.testbed.now();
        let due = self.pending.iter().take_while(|(_, r)| r.at <= now).count();
        for (side, run) in self.pending.drain(..due) {
            tracing::debug!(%side, tick = now, max_run_time = run.max_run_time, "run write");
            let _ = self.testbed.write_register(side, self.run_address, run.max_run_time);
            if let Some(report) = self.stats.core_mut(side) {
                report.runs_written += 1;
            }
        }

        let stimulus = &self.stimulus;
        let events = self.testbed.tick(|side| stimulus.edges_at(now, side));

        for side in Side::ALL {
            let Some(device) = self.testbed.device(side) else {
                continue;
            };
            let Some(report) = self.stats.core_mut(side) else {
                continue;
            };
            let outputs = device.outputs();
            for (ticks, &on) in report.output_ticks.iter_mut().zip(outputs.as_slice()) {
                *ticks += u64::from(on);
            }
            if device.crossed_boundary() {
                report.boundaries += 1;
                if self.general.trace_cycles {
                    tracing::info!(%side, tick = now, n_cycles = device.status().n_cycles, "cycle");
                }
            }
            if events.done(side) {
                report.outcome = device.last_exit();
                report.finished_at = Some(now);
            }
        }
        events
    }

    /// Runs until every core is idle with no Run writes left, or the tick budget is spent.
    pub fn run(&mut self) -> &RunStats {
        while !self.is_finished() {
            if self.testbed.now() >= self.general.max_ticks {
                tracing::warn!(max_ticks = self.general.max_ticks, "tick budget exhausted");
                self.stats.budget_exhausted = true;
                break;
            }
            let _ = self.tick();
        }
        self.collect();
        &self.stats
    }

    /// Whether nothing is left to simulate.
    pub fn is_finished(&self) -> bool {
        self.pending.is_empty() && !self.testbed.any_active()
    }

    fn collect(&mut self) {
        self.stats.ticks = self.testbed.now();
        for side in Side::ALL {
            let Some(device) = self.testbed.device(side) else {
                continue;
            };
            if let Some(report) = self.stats.core_mut(side) {
                report.status = *device.status();
                report.dropped_accesses = device.dropped_accesses();
            }
        }
    }

    /// The simulated hardware.
    pub const fn testbed(&self) -> &Testbed {
        &self.testbed
    }

    /// Mutable simulated hardware, for injecting extra register traffic.
    pub fn testbed_mut(&mut self) -> &mut Testbed {
        &mut self.testbed
    }

    /// Statistics gathered so far.
    pub const fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Consumes the simulator, returning final statistics.
    pub fn into_stats(mut self) -> RunStats {
        self.collect();
        self.stats
    }
}
