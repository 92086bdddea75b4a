//! Widths, limits and sentinel values shared across the core.
//!
//! Everything here is fixed by the register protocol; configurable parameters
//! live in [`crate::config`].

/// Width in bits of every time value (window edges, cycle length, timestamps).
pub const TIME_BITS: u32 = 14;

/// Mask selecting a 14-bit time field.
pub const TIME_MASK: u32 = (1 << TIME_BITS) - 1;

/// Largest representable cycle length, in ticks.
pub const MAX_CYCLE_LENGTH: u16 = TIME_MASK as u16;

/// Mask applied to the completed-cycle and trigger counters (they wrap at 2^14).
pub const COUNTER_MASK: u16 = TIME_MASK as u16;

/// Window start value that marks a channel as permanently inactive.
pub const INACTIVE_START: u16 = 0;

/// Number of herald pattern slots.
pub const HERALD_SLOTS: usize = 4;

/// Width of a herald pattern (one bit per gated input).
pub const HERALD_PATTERN_BITS: u32 = 4;

/// Number of input-gating channels.
pub const GATE_CHANNELS: usize = 4;

/// Upper bound on output channels across all protocol revisions.
pub const MAX_OUTPUT_CHANNELS: usize = 4;

/// Number of monitored input channels: the gated inputs plus the reference.
pub const MONITORED_CHANNELS: usize = GATE_CHANNELS + 1;

/// Logical index of the reference input (the cycle's timing pulse).
pub const REFERENCE_CHANNEL: usize = GATE_CHANNELS;

/// Number of address bits in the register space.
pub const ADDRESS_BITS: u32 = 5;

/// Size of the register space in words.
pub const REGISTER_SPACE: u64 = 1 << ADDRESS_BITS;

/// RunResult value reported after a timeout.
pub const TIMEOUT_RESULT: u32 = 0x3FFF;
