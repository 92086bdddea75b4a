//! Register file and register protocol.
//!
//! The register file owns the persisted configuration (control bits, cycle
//! length, heralds and timing windows) and the published status image. Internally
//! everything is kept as plain validated structures; the bit-packed layout only
//! exists in the `from_word`/`to_word` conversions used at the boundary.
//!
//! # Memory Map
//!
//! Addresses are 5 bits wide, bits `[4:3]` select the bank:
//!
//! * `0x00`: Config (W): bit 0 enable, bit 1 is_master, bit 2 standalone
//! * `0x01`: Run (W): max run time in ticks; the write (re)starts a sequence
//! * `0x02`: CycleLength (W): 14-bit tick count
//! * `0x03`: Heralds (W): four 4-bit patterns and their enables
//! * `0x08..`: TimingWindow (W): `{t_start:14, t_end:14}`, outputs then gates
//! * `0x10`: Status (R): bit 0 running, bit 1 heralded, bit 2 timed out, bit 3 refused
//! * `0x11`: NCycles (R)
//! * `0x12`: TimeRemaining (R)
//! * `0x13`: NTriggers (R)
//! * `0x14`: RunResult (R): herald match bits, or `0x3FFF` on timeout
//! * `0x15`: Fault (R)
//! * `0x18..0x1C`: Timestamps (R): gates 0..3, then the reference channel

use serde::{Deserialize, Serialize};

use crate::common::bits::{bit, field, insert};
use crate::common::constants::{
    GATE_CHANNELS, HERALD_PATTERN_BITS, HERALD_SLOTS, INACTIVE_START, MAX_OUTPUT_CHANNELS,
    MONITORED_CHANNELS, REGISTER_SPACE, TIME_BITS, TIME_MASK,
};
use crate::common::error::RegisterError;
use crate::config::{HeraldLayout, ProtocolRevision};
use crate::core::sampler::TimestampCapture;
use crate::core::sequencer::Program;

/// Synchronization role selected by the control bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Drives the shared trigger.
    Master,
    /// Follows the master's trigger.
    Slave,
    /// No partner; synchronization bypassed.
    Standalone,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Master => f.write_str("master"),
            Self::Slave => f.write_str("slave"),
            Self::Standalone => f.write_str("standalone"),
        }
    }
}

/// Control bits written to the Config register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoreConfig {
    /// Allow the core to drive its outputs and accept Run writes.
    pub enable: bool,
    /// Act as the synchronization master.
    pub is_master: bool,
    /// Ignore the partner entirely.
    pub standalone: bool,
}

impl CoreConfig {
    /// Unpacks the Config register word.
    pub const fn from_word(word: u32) -> Self {
        Self {
            enable: bit(word, 0),
            is_master: bit(word, 1),
            standalone: bit(word, 2),
        }
    }

    /// Packs into the Config register word.
    pub const fn to_word(self) -> u32 {
        (self.enable as u32) | (self.is_master as u32) << 1 | (self.standalone as u32) << 2
    }

    /// Control bits selecting `role`.
    pub const fn for_role(role: Role, enable: bool) -> Self {
        Self {
            enable,
            is_master: matches!(role, Role::Master),
            standalone: matches!(role, Role::Standalone),
        }
    }

    /// Synchronization role implied by the control bits. Standalone wins over is_master.
    pub const fn role(self) -> Role {
        if self.standalone {
            Role::Standalone
        } else if self.is_master {
            Role::Master
        } else {
            Role::Slave
        }
    }
}

/// `[t_start, t_end)` interval of cycle time, in ticks.
///
/// A window whose start is 0 never asserts: tick 0 of every cycle is reserved
/// for the cycle restart, so valid starts are `1..=16383`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimingWindow {
    /// First tick (inclusive) the channel is active.
    pub t_start: u16,
    /// First tick (exclusive) the channel is inactive again.
    pub t_end: u16,
}

impl TimingWindow {
    /// A window that never asserts.
    pub const INACTIVE: Self = Self {
        t_start: INACTIVE_START,
        t_end: 0,
    };

    /// Creates a window, truncating both edges to 14 bits.
    pub const fn new(t_start: u16, t_end: u16) -> Self {
        Self {
            t_start: t_start & TIME_MASK as u16,
            t_end: t_end & TIME_MASK as u16,
        }
    }

    /// Unpacks a TimingWindow register word (start in the low field).
    pub const fn from_word(word: u32) -> Self {
        Self {
            t_start: field(word, 0, TIME_BITS) as u16,
            t_end: field(word, TIME_BITS, TIME_BITS) as u16,
        }
    }

    /// Packs into a TimingWindow register word.
    pub const fn to_word(self) -> u32 {
        insert(self.t_start as u32, TIME_BITS, TIME_BITS, self.t_end as u32)
    }

    /// Whether the window can ever assert.
    pub const fn is_active(self) -> bool {
        self.t_start != INACTIVE_START && self.t_start < self.t_end
    }

    /// Whether `cycle_time` falls inside the window.
    #[inline]
    pub const fn contains(self, cycle_time: u16) -> bool {
        self.t_start != INACTIVE_START && self.t_start <= cycle_time && cycle_time < self.t_end
    }
}

/// One herald slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeraldPattern {
    /// Required input pattern, gate channel 0 in the least-significant bit.
    pub pattern: u8,
    /// Disabled slots never match.
    pub enabled: bool,
}

impl HeraldPattern {
    /// An enabled slot matching `pattern` (truncated to 4 bits).
    pub const fn enabled(pattern: u8) -> Self {
        Self {
            pattern: pattern & 0xF,
            enabled: true,
        }
    }
}

/// The fixed set of herald slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeraldSet {
    /// Slots in priority order; lower index wins when several match.
    pub slots: [HeraldPattern; HERALD_SLOTS],
}

impl HeraldSet {
    /// Builds a set with the given patterns enabled in slots `0..patterns.len()`.
    ///
    /// Patterns beyond the fourth are ignored.
    pub fn from_patterns(patterns: &[u8]) -> Self {
        let mut set = Self::default();
        for (slot, &p) in set.slots.iter_mut().zip(patterns) {
            *slot = HeraldPattern::enabled(p);
        }
        set
    }

    /// Unpacks the Heralds register word using the revision's layout.
    pub fn from_word(word: u32, layout: HeraldLayout) -> Self {
        let mut set = Self::default();
        for (i, slot) in set.slots.iter_mut().enumerate() {
            let i = i as u32;
            *slot = match layout {
                HeraldLayout::Grouped => HeraldPattern {
                    pattern: field(word, HERALD_PATTERN_BITS * i, HERALD_PATTERN_BITS) as u8,
                    enabled: bit(word, 16 + i),
                },
                HeraldLayout::Interleaved => HeraldPattern {
                    pattern: field(word, 5 * i, HERALD_PATTERN_BITS) as u8,
                    enabled: bit(word, 5 * i + 4),
                },
            };
        }
        set
    }

    /// Packs into the Heralds register word using the revision's layout.
    pub fn to_word(&self, layout: HeraldLayout) -> u32 {
        self.slots.iter().enumerate().fold(0, |word, (i, slot)| {
            let i = i as u32;
            let pattern = (slot.pattern & 0xF) as u32;
            let enabled = slot.enabled as u32;
            match layout {
                HeraldLayout::Grouped => {
                    let word = insert(word, HERALD_PATTERN_BITS * i, HERALD_PATTERN_BITS, pattern);
                    insert(word, 16 + i, 1, enabled)
                }
                HeraldLayout::Interleaved => insert(word, 5 * i, 5, pattern | enabled << 4),
            }
        })
    }

    /// Number of enabled slots.
    pub fn enabled_count(&self) -> usize {
        self.slots.iter().filter(|s| s.enabled).count()
    }
}

/// Register decoded from a 5-bit address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterAddress {
    /// Control bits.
    Config,
    /// Run command (write-triggered).
    Run,
    /// Cycle length.
    CycleLength,
    /// Herald patterns and enables.
    Heralds,
    /// Timing window of an output channel.
    Output(usize),
    /// Timing window of an input-gating channel.
    Gate(usize),
    /// Status flags.
    Status,
    /// Completed cycle count.
    NCycles,
    /// Ticks left before the active timeout bound.
    TimeRemaining,
    /// Cycles in which the reference input fired.
    NTriggers,
    /// Herald match bits or the timeout marker.
    RunResult,
    /// Reason the last Run was refused.
    Fault,
    /// Latched timestamp of a monitored channel.
    Timestamp(usize),
}

impl RegisterAddress {
    /// Decodes an address for the given protocol revision.
    ///
    /// # Errors
    ///
    /// [`RegisterError::OutOfRange`] above 5 bits, [`RegisterError::Unmapped`]
    /// for holes in the map.
    pub fn decode(address: u64, revision: ProtocolRevision) -> Result<Self, RegisterError> {
        if address >= REGISTER_SPACE {
            return Err(RegisterError::OutOfRange(address));
        }
        let raw = address as u8;
        let index = (raw & 0b111) as usize;
        let outputs = revision.output_channels();

        let decoded = match raw >> 3 {
            0b00 => match index {
                0 => Some(Self::Config),
                1 => Some(Self::Run),
                2 => Some(Self::CycleLength),
                3 => Some(Self::Heralds),
                _ => None,
            },
            0b01 if index < outputs => Some(Self::Output(index)),
            0b01 if index - outputs < GATE_CHANNELS => Some(Self::Gate(index - outputs)),
            0b01 => None,
            0b10 => match index {
                0 => Some(Self::Status),
                1 => Some(Self::NCycles),
                2 => Some(Self::TimeRemaining),
                3 => Some(Self::NTriggers),
                4 => Some(Self::RunResult),
                5 => Some(Self::Fault),
                _ => None,
            },
            _ if index < MONITORED_CHANNELS => Some(Self::Timestamp(index)),
            _ => None,
        };
        decoded.ok_or(RegisterError::Unmapped(raw))
    }

    /// Address of this register in the given revision.
    pub const fn address(self, revision: ProtocolRevision) -> u8 {
        match self {
            Self::Config => 0x00,
            Self::Run => 0x01,
            Self::CycleLength => 0x02,
            Self::Heralds => 0x03,
            Self::Output(i) => 0x08 + i as u8,
            Self::Gate(i) => 0x08 + (revision.output_channels() + i) as u8,
            Self::Status => 0x10,
            Self::NCycles => 0x11,
            Self::TimeRemaining => 0x12,
            Self::NTriggers => 0x13,
            Self::RunResult => 0x14,
            Self::Fault => 0x15,
            Self::Timestamp(i) => 0x18 + i as u8,
        }
    }

    /// Banks 00 and 01 are write-only, banks 10 and 11 read-only.
    pub const fn is_writable(self) -> bool {
        matches!(
            self,
            Self::Config | Self::Run | Self::CycleLength | Self::Heralds | Self::Output(_) | Self::Gate(_)
        )
    }
}

/// Why a Run write did not start a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Fault {
    /// The last Run write was accepted.
    #[default]
    None,
    /// Cycle length register holds zero.
    ZeroCycleLength,
    /// The enable bit is clear.
    NotEnabled,
}

impl Fault {
    /// Value reported by the Fault register.
    pub const fn code(self) -> u32 {
        match self {
            Self::None => 0,
            Self::ZeroCycleLength => 1,
            Self::NotEnabled => 2,
        }
    }
}

/// A Run register write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunCommand {
    /// Timeout bound in ticks.
    pub max_run_time: u32,
}

/// Status image published by the sequencer once per tick.
///
/// Reads always come from this image, so they observe either the last
/// completed sequence or the running one, never a mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatusSnapshot {
    /// ARMED or RUNNING.
    pub running: bool,
    /// Last sequence ended on a herald match.
    pub heralded: bool,
    /// Last sequence ended on a timeout.
    pub timed_out: bool,
    /// Last Run write was refused.
    pub refused: bool,
    /// Completed cycles, 14-bit wrapping.
    pub n_cycles: u16,
    /// Ticks left before the active bound.
    pub time_remaining: u32,
    /// Cycles with a reference edge, 14-bit wrapping.
    pub n_triggers: u16,
    /// RunResult register value.
    pub run_result: u32,
    /// Refusal reason.
    pub fault: Fault,
    /// Timestamps latched at the last exit.
    pub timestamps: TimestampCapture,
}

impl StatusSnapshot {
    /// Packs the Status register word.
    pub const fn status_word(&self) -> u32 {
        (self.running as u32)
            | (self.heralded as u32) << 1
            | (self.timed_out as u32) << 2
            | (self.refused as u32) << 3
    }
}

/// Persisted configuration and published status of one core.
#[derive(Debug, Clone)]
pub struct RegisterFile {
    revision: ProtocolRevision,
    config: CoreConfig,
    cycle_length: u16,
    heralds: HeraldSet,
    outputs: [TimingWindow; MAX_OUTPUT_CHANNELS],
    gates: [TimingWindow; GATE_CHANNELS],
    status: StatusSnapshot,
}

impl RegisterFile {
    /// Creates a register file with everything cleared.
    pub fn new(revision: ProtocolRevision) -> Self {
        Self {
            revision,
            config: CoreConfig::default(),
            cycle_length: 0,
            heralds: HeraldSet::default(),
            outputs: [TimingWindow::INACTIVE; MAX_OUTPUT_CHANNELS],
            gates: [TimingWindow::INACTIVE; GATE_CHANNELS],
            status: StatusSnapshot::default(),
        }
    }

    /// Protocol revision this file decodes addresses for.
    pub const fn revision(&self) -> ProtocolRevision {
        self.revision
    }

    /// Applies a register write.
    ///
    /// Returns the run command when the Run register was written; every other
    /// write only updates persisted state, which the sequencer picks up at the
    /// next sequence start.
    ///
    /// # Errors
    ///
    /// Fails for undecodable addresses and read-only registers.
    pub fn write(&mut self, address: u64, word: u32) -> Result<Option<RunCommand>, RegisterError> {
        let reg = RegisterAddress::decode(address, self.revision)?;
        match reg {
            RegisterAddress::Config => self.config = CoreConfig::from_word(word),
            RegisterAddress::Run => return Ok(Some(RunCommand { max_run_time: word })),
            RegisterAddress::CycleLength => self.cycle_length = field(word, 0, TIME_BITS) as u16,
            RegisterAddress::Heralds => {
                self.heralds = HeraldSet::from_word(word, self.revision.herald_layout());
            }
            RegisterAddress::Output(i) => self.outputs[i] = TimingWindow::from_word(word),
            RegisterAddress::Gate(i) => self.gates[i] = TimingWindow::from_word(word),
            _ => return Err(RegisterError::ReadOnly(address as u8)),
        }
        Ok(None)
    }

    /// Reads a status or timestamp register.
    ///
    /// # Errors
    ///
    /// Fails for undecodable addresses and write-only registers.
    pub fn read(&self, address: u64) -> Result<u32, RegisterError> {
        let s = &self.status;
        let word = match RegisterAddress::decode(address, self.revision)? {
            RegisterAddress::Status => s.status_word(),
            RegisterAddress::NCycles => s.n_cycles as u32,
            RegisterAddress::TimeRemaining => s.time_remaining,
            RegisterAddress::NTriggers => s.n_triggers as u32,
            RegisterAddress::RunResult => s.run_result,
            RegisterAddress::Fault => s.fault.code(),
            RegisterAddress::Timestamp(i) => s.timestamps.0[i] as u32,
            _ => return Err(RegisterError::WriteOnly(address as u8)),
        };
        Ok(word)
    }

    /// Freezes the persisted configuration into a program for a new sequence.
    ///
    /// # Errors
    ///
    /// Returns the [`Fault`] to report when the core must not start.
    pub fn snapshot(&self, run: RunCommand) -> Result<Program, Fault> {
        if !self.config.enable {
            return Err(Fault::NotEnabled);
        }
        if self.cycle_length == 0 {
            return Err(Fault::ZeroCycleLength);
        }
        let mut outputs = [TimingWindow::INACTIVE; MAX_OUTPUT_CHANNELS];
        let count = self.revision.output_channels();
        outputs[..count].copy_from_slice(&self.outputs[..count]);
        Ok(Program {
            role: self.config.role(),
            cycle_length: self.cycle_length,
            max_run_time: run.max_run_time,
            outputs,
            output_count: count,
            gates: self.gates,
            heralds: self.heralds,
        })
    }

    /// Replaces the published status image.
    pub fn publish(&mut self, status: StatusSnapshot) {
        self.status = status;
    }

    /// Currently published status.
    pub const fn status(&self) -> &StatusSnapshot {
        &self.status
    }

    /// Persisted control bits.
    pub const fn config(&self) -> CoreConfig {
        self.config
    }

    /// Persisted cycle length.
    pub const fn cycle_length(&self) -> u16 {
        self.cycle_length
    }

    /// Persisted herald set.
    pub const fn heralds(&self) -> &HeraldSet {
        &self.heralds
    }

    /// Persisted window of an output channel.
    pub fn output_window(&self, channel: usize) -> Option<TimingWindow> {
        self.outputs[..self.revision.output_channels()].get(channel).copied()
    }

    /// Persisted window of a gate channel.
    pub fn gate_window(&self, channel: usize) -> Option<TimingWindow> {
        self.gates.get(channel).copied()
    }
}
