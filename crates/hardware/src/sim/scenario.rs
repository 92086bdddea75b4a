//! Scenario files.
//!
//! A scenario describes a complete experiment: build-time [`Config`], the
//! register program of each core, and the input stimulus. Programs are applied
//! through the register boundary exactly as a host driver would write them, so
//! a scenario exercises the same paths as real register traffic.
//!
//! ```json
//! {
//!   "config": { "protocol": { "revision": "Standard" } },
//!   "master": {
//!     "role": "master",
//!     "cycle_length": 100,
//!     "outputs": [{ "start": 10, "end": 20 }],
//!     "gates": [{ "start": 30, "end": 40 }],
//!     "heralds": [1],
//!     "runs": [{ "at": 0, "max_run_time": 10000 }]
//!   },
//!   "stimulus": [{ "kind": "at", "tick": 135, "channel": 0 }]
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::common::constants::{HERALD_SLOTS, MAX_CYCLE_LENGTH, TIME_MASK};
use crate::common::error::{ChannelKind, ConfigError, SimError};
use crate::config::{Config, ProtocolRevision};
use crate::core::registers::{CoreConfig, HeraldSet, RegisterAddress, Role, TimingWindow};
use crate::sim::stimulus::{EdgeSpec, Stimulus, Target};
use crate::soc::testbed::Side;

/// `[start, end)` window as written in a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct WindowSpec {
    /// First active tick; 0 disables the channel.
    pub start: u32,
    /// First inactive tick.
    pub end: u32,
}

/// A Run register write at a given tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RunWrite {
    /// Tick before which the write is applied.
    #[serde(default)]
    pub at: u64,
    /// Timeout bound written to the Run register.
    pub max_run_time: u32,
}

/// Register program of one core.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CoreProgram {
    /// Synchronization role.
    pub role: Role,
    /// Enable bit of the Config register.
    #[serde(default = "CoreProgram::default_enable")]
    pub enable: bool,
    /// Cycle length in ticks. Zero is accepted and makes every Run refuse.
    pub cycle_length: u32,
    /// Output windows, channel 0 first.
    #[serde(default)]
    pub outputs: Vec<WindowSpec>,
    /// Gate windows, channel 0 first.
    #[serde(default)]
    pub gates: Vec<WindowSpec>,
    /// Herald patterns, enabled in slots 0.. in order.
    #[serde(default)]
    pub heralds: Vec<u8>,
    /// Run writes in any order.
    pub runs: Vec<RunWrite>,
}

impl CoreProgram {
    fn default_enable() -> bool {
        true
    }

    /// Checks the program fits the register protocol of `revision`.
    ///
    /// # Errors
    ///
    /// Returns the first field that cannot be encoded.
    pub fn validate(&self, name: &'static str, revision: ProtocolRevision) -> Result<(), ConfigError> {
        if self.cycle_length > u32::from(MAX_CYCLE_LENGTH) {
            return Err(ConfigError::CycleLength(self.cycle_length));
        }
        let channels = [
            (ChannelKind::Output, &self.outputs, revision.output_channels()),
            (ChannelKind::Gate, &self.gates, revision.gate_channels()),
        ];
        for (kind, windows, available) in channels {
            check_windows(kind, windows, available, self.cycle_length)?;
        }
        if self.heralds.len() > HERALD_SLOTS {
            return Err(ConfigError::TooManyHeralds(self.heralds.len()));
        }
        if let Some(&p) = self.heralds.iter().find(|&&p| p > 0xF) {
            return Err(ConfigError::HeraldPattern(p));
        }
        if self.runs.is_empty() {
            return Err(ConfigError::NoRuns(name));
        }
        Ok(())
    }

    /// Configuration writes for `revision`, in the order a driver issues them.
    ///
    /// Run writes are not included; see [`CoreProgram::run_writes`].
    pub fn register_writes(&self, revision: ProtocolRevision) -> Vec<(u64, u32)> {
        let reg = |r: RegisterAddress| u64::from(r.address(revision));
        let mut writes = vec![
            (
                reg(RegisterAddress::Config),
                CoreConfig::for_role(self.role, self.enable).to_word(),
            ),
            (reg(RegisterAddress::CycleLength), self.cycle_length & TIME_MASK),
            (
                reg(RegisterAddress::Heralds),
                HeraldSet::from_patterns(&self.heralds).to_word(revision.herald_layout()),
            ),
        ];
        for (i, w) in self.outputs.iter().enumerate() {
            writes.push((reg(RegisterAddress::Output(i)), window_word(w)));
        }
        for (i, w) in self.gates.iter().enumerate() {
            writes.push((reg(RegisterAddress::Gate(i)), window_word(w)));
        }
        writes
    }

    /// Run writes sorted by tick.
    pub fn run_writes(&self) -> Vec<RunWrite> {
        let mut runs = self.runs.clone();
        runs.sort_by_key(|r| r.at);
        runs
    }
}

fn window_word(w: &WindowSpec) -> u32 {
    TimingWindow::new(w.start as u16, w.end as u16).to_word()
}

fn check_windows(
    kind: ChannelKind,
    windows: &[WindowSpec],
    available: usize,
    cycle_length: u32,
) -> Result<(), ConfigError> {
    if windows.len() > available {
        return Err(ConfigError::TooManyWindows {
            kind,
            given: windows.len(),
            available,
        });
    }
    for (index, w) in windows.iter().enumerate() {
        if let Some(value) = [w.start, w.end].into_iter().find(|&v| v > TIME_MASK) {
            return Err(ConfigError::WindowEdge { kind, index, value });
        }
        // Zero cycle length is refused at Run instead.
        if cycle_length > 0 && w.end > cycle_length {
            return Err(ConfigError::WindowPastCycle {
                kind,
                index,
                end: w.end,
                cycle_length,
            });
        }
    }
    Ok(())
}

/// A complete experiment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Scenario {
    /// Label used in reports.
    #[serde(default)]
    pub name: String,
    /// Build-time configuration.
    #[serde(default)]
    pub config: Config,
    /// Program of the master-side core.
    #[serde(default)]
    pub master: Option<CoreProgram>,
    /// Program of the slave-side core.
    #[serde(default)]
    pub slave: Option<CoreProgram>,
    /// Input edges.
    #[serde(default)]
    pub stimulus: Stimulus,
}

impl Scenario {
    /// Parses and validates a scenario.
    ///
    /// # Errors
    ///
    /// [`SimError::Json`] for malformed input, [`SimError::Config`] for programs
    /// the register protocol cannot express.
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        let scenario: Self = serde_json::from_str(json)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Reads, parses and validates a scenario file.
    ///
    /// # Errors
    ///
    /// As [`Scenario::from_json`], plus [`SimError::Io`] when the file cannot be read.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| SimError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut scenario = Self::from_json(&json)?;
        if scenario.name.is_empty() {
            scenario.name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
        }
        Ok(scenario)
    }

    /// Checks every program and the stimulus.
    ///
    /// # Errors
    ///
    /// The first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let revision = self.config.protocol.revision;
        if self.master.is_none() && self.slave.is_none() {
            return Err(ConfigError::EmptyScenario);
        }
        if let Some(p) = &self.master {
            p.validate("master", revision)?;
        }
        if let Some(p) = &self.slave {
            p.validate("slave", revision)?;
        }
        self.stimulus.validate()
    }

    /// Programs by side, master first.
    pub fn programs(&self) -> impl Iterator<Item = (Side, &CoreProgram)> {
        [(Side::Master, &self.master), (Side::Slave, &self.slave)]
            .into_iter()
            .filter_map(|(side, p)| p.as_ref().map(|p| (side, p)))
    }

    /// Built-in two-core experiment.
    ///
    /// Both cores arm at tick 0 and start cycling in lock-step at tick 3. Gates
    /// 0 and 1 fire together in cycle 5, which matches the herald `0b0011`, so
    /// both cores report HERALDED with six completed cycles. Gate 0 alone fires
    /// in cycle 2, which matches nothing.
    pub fn demo() -> Self {
        let program = |role, max_run_time| CoreProgram {
            role,
            enable: true,
            cycle_length: 100,
            outputs: vec![
                WindowSpec { start: 10, end: 20 },
                WindowSpec { start: 50, end: 55 },
            ],
            gates: vec![
                WindowSpec { start: 30, end: 40 },
                WindowSpec { start: 30, end: 40 },
            ],
            heralds: vec![0b0011],
            runs: vec![RunWrite { at: 0, max_run_time }],
        };
        let first_cycle = 3;
        let at = |cycle: u64, cycle_time: u64, channel| EdgeSpec::At {
            tick: first_cycle + cycle * 100 + cycle_time,
            channel,
            target: Target::Both,
        };

        Self {
            name: "demo".to_owned(),
            config: Config::default(),
            master: Some(program(Role::Master, 10_000)),
            slave: Some(program(Role::Slave, 20_000)),
            stimulus: Stimulus::new(vec![
                EdgeSpec::Periodic {
                    start: first_cycle + 5,
                    period: 100,
                    count: None,
                    channel: 4,
                    target: Target::Both,
                },
                at(2, 32, 0),
                at(5, 33, 0),
                at(5, 36, 1),
                at(5, 38, 1),
            ]),
        }
    }
}
