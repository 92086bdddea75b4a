//! Error types.
//!
//! Errors stop at the register boundary. The device wrapper follows the usual
//! MMIO contract: invalid writes are dropped, invalid reads return zero, and run
//! refusal is reported through the Status and Fault registers. The types here
//! serve the layers around that boundary:
//! 1. **Address decoding:** [`RegisterError`] explains why an access was dropped.
//! 2. **Program validation:** [`ConfigError`] rejects programs that cannot be
//!    expressed in the register protocol.
//! 3. **Scenario loading:** [`SimError`] wraps I/O and JSON failures.

use thiserror::Error;

/// Reasons a register access cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegisterError {
    /// The address does not fit in the 5-bit register space.
    #[error("address {0:#x} is outside the 5-bit register space")]
    OutOfRange(u64),

    /// The address is inside the space but has no register in this revision.
    #[error("address {0:#04x} is not mapped")]
    Unmapped(u8),

    /// A read targeted a write-only register.
    #[error("address {0:#04x} is write-only")]
    WriteOnly(u8),

    /// A write targeted a read-only register.
    #[error("address {0:#04x} is read-only")]
    ReadOnly(u8),
}

/// Kind of channel a timing window belongs to, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Digital output channel.
    Output,
    /// Input-gating channel.
    Gate,
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Output => f.write_str("output"),
            Self::Gate => f.write_str("gate"),
        }
    }
}

/// A core program that cannot be expressed in the register protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Cycle length wider than 14 bits.
    #[error("cycle length {0} does not fit in 14 bits")]
    CycleLength(u32),

    /// A window edge does not fit in 14 bits.
    #[error("{kind} window {index}: edge {value} does not fit in 14 bits")]
    WindowEdge {
        /// Output or gate.
        kind: ChannelKind,
        /// Logical channel index.
        index: usize,
        /// Offending value.
        value: u32,
    },

    /// A window ends after the cycle it belongs to.
    #[error("{kind} window {index}: end {end} is past the cycle length {cycle_length}")]
    WindowPastCycle {
        /// Output or gate.
        kind: ChannelKind,
        /// Logical channel index.
        index: usize,
        /// Window end.
        end: u32,
        /// Program cycle length.
        cycle_length: u32,
    },

    /// More windows than the protocol revision has channels.
    #[error("{given} {kind} windows given, revision has {available}")]
    TooManyWindows {
        /// Output or gate.
        kind: ChannelKind,
        /// Number supplied.
        given: usize,
        /// Number the revision supports.
        available: usize,
    },

    /// A herald pattern wider than 4 bits.
    #[error("herald pattern {0:#x} is wider than 4 bits")]
    HeraldPattern(u8),

    /// More than four herald patterns.
    #[error("at most 4 herald patterns are supported, got {0}")]
    TooManyHeralds(usize),

    /// A stimulus refers to a channel that is not monitored.
    #[error("stimulus channel {0} is outside 0..5")]
    StimulusChannel(u8),

    /// A periodic stimulus with a period of zero.
    #[error("periodic stimulus needs a period of at least 1")]
    StimulusPeriod,

    /// A program without any Run write never starts.
    #[error("program for {0} has no run commands")]
    NoRuns(&'static str),

    /// Neither a master nor a slave program was supplied.
    #[error("scenario contains no core programs")]
    EmptyScenario,
}

/// Failures while loading or preparing a simulation.
#[derive(Debug, Error)]
pub enum SimError {
    /// The scenario file could not be read.
    #[error("failed to read scenario {path}: {source}")]
    Io {
        /// Path that was being read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The scenario is not valid JSON for the expected schema.
    #[error("invalid scenario: {0}")]
    Json(#[from] serde_json::Error),

    /// The scenario parsed but describes an invalid program.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
