//! Configuration system for the entangler model.
//!
//! This module defines the parameters that are fixed when a core is built, as
//! opposed to the run-time state written through registers. It provides:
//! 1. **Defaults:** Baseline handshake timing and simulation budget.
//! 2. **Structures:** Hierarchical config for the protocol, synchronization and general settings.
//! 3. **Enums:** Register protocol revisions and their herald packing layouts.
//!
//! Configuration is supplied as the `config` section of a JSON scenario, or use
//! `Config::default()`.

use serde::{Deserialize, Serialize};

use crate::common::constants::{GATE_CHANNELS, MAX_OUTPUT_CHANNELS};

/// Default configuration constants.
mod defaults {
    /// Ticks the master holds the trigger line high when starting a run.
    ///
    /// The slave requires the same number of consecutive high samples before it
    /// accepts the edge, which both debounces the line and lines up the first
    /// RUNNING tick on both sides.
    pub const TRIGGER_HOLD_TICKS: u32 = 2;

    /// Ticks a partner may stay silent past a cycle boundary before the run is
    /// abandoned with a timeout.
    pub const SYNC_GRACE_TICKS: u32 = 8;

    /// Upper bound on simulated ticks for a scenario (1 ms of represented time).
    pub const MAX_TICKS: u64 = 1_000_000;
}

/// Register protocol revision.
///
/// Revisions differ in the number of output channels (which shifts the gate
/// window addresses) and in where the herald enable bits live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub enum ProtocolRevision {
    /// First layout: three outputs, each herald slot packed as `[pattern:4 | enable:1]`.
    Legacy,
    /// Three outputs (0x8–0xA), gates at 0xB–0xE, enables grouped at bits 16..20.
    #[default]
    Standard,
    /// Four outputs (0x8–0xB), gates at 0xC–0xF, enables grouped at bits 16..20.
    Extended,
}

/// Placement of herald enable bits in the Heralds register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeraldLayout {
    /// Slot `i` occupies bits `5i..5i+5`: pattern in the low four bits, enable on top.
    Interleaved,
    /// Patterns at bits `4i..4i+4`, enable for slot `i` at bit `16 + i`.
    Grouped,
}

impl ProtocolRevision {
    /// Number of output channels.
    pub const fn output_channels(self) -> usize {
        match self {
            Self::Legacy | Self::Standard => 3,
            Self::Extended => MAX_OUTPUT_CHANNELS,
        }
    }

    /// Number of input-gating channels (the same in every revision).
    pub const fn gate_channels(self) -> usize {
        GATE_CHANNELS
    }

    /// Herald register packing.
    pub const fn herald_layout(self) -> HeraldLayout {
        match self {
            Self::Legacy => HeraldLayout::Interleaved,
            Self::Standard | Self::Extended => HeraldLayout::Grouped,
        }
    }
}

/// Root configuration type.
///
/// # Examples
///
/// ```
/// use entangler_core::config::{Config, ProtocolRevision};
///
/// let json = r#"{
///     "protocol": { "revision": "Extended" },
///     "sync": { "grace_ticks": 16 }
/// }"#;
///
/// let config: Config = serde_json::from_str(json).unwrap();
/// assert_eq!(config.protocol.revision, ProtocolRevision::Extended);
/// assert_eq!(config.sync.grace_ticks, 16);
/// assert_eq!(config.sync.trigger_hold_ticks, 2);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// General simulation settings
    #[serde(default)]
    pub general: GeneralConfig,
    /// Register protocol selection
    #[serde(default)]
    pub protocol: ProtocolConfig,
    /// Master/slave handshake timing
    #[serde(default)]
    pub sync: SyncConfig,
}

/// General simulation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    /// Hard stop for the simulation loop, in ticks
    #[serde(default = "GeneralConfig::default_max_ticks")]
    pub max_ticks: u64,

    /// Emit a trace event at every cycle boundary
    #[serde(default)]
    pub trace_cycles: bool,
}

impl GeneralConfig {
    fn default_max_ticks() -> u64 {
        defaults::MAX_TICKS
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            max_ticks: defaults::MAX_TICKS,
            trace_cycles: false,
        }
    }
}

/// Register protocol selection.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ProtocolConfig {
    /// Register layout revision
    #[serde(default)]
    pub revision: ProtocolRevision,
}

/// Master/slave handshake timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SyncConfig {
    /// Width of the start trigger pulse, and the slave's debounce length
    #[serde(default = "SyncConfig::default_trigger_hold")]
    pub trigger_hold_ticks: u32,

    /// Silence tolerated from the partner before timing out
    #[serde(default = "SyncConfig::default_grace")]
    pub grace_ticks: u32,
}

impl SyncConfig {
    fn default_trigger_hold() -> u32 {
        defaults::TRIGGER_HOLD_TICKS
    }

    fn default_grace() -> u32 {
        defaults::SYNC_GRACE_TICKS
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            trigger_hold_ticks: defaults::TRIGGER_HOLD_TICKS,
            grace_ticks: defaults::SYNC_GRACE_TICKS,
        }
    }
}
