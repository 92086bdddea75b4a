//! Common utilities and types used throughout the entangler core.
//!
//! This module provides the building blocks shared by every component:
//! 1. **Constants:** Field widths, channel counts and sentinel values fixed by the protocol.
//! 2. **Bit fields:** Helpers for packing and unpacking register words.
//! 3. **Error Handling:** Address decode, program validation and scenario loading errors.

/// Bit-field helpers for register words.
pub mod bits;

/// Protocol constants.
pub mod constants;

/// Error types.
pub mod error;

pub use constants::{COUNTER_MASK, GATE_CHANNELS, HERALD_SLOTS, MONITORED_CHANNELS, TIME_MASK};
pub use error::{ChannelKind, ConfigError, RegisterError, SimError};
