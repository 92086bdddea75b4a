//! Timestamp sampler.
//!
//! One detector per gated input plus one for the reference input. A gated
//! detector fires on the first rising edge that lands inside its window and
//! records the cycle time; later edges in the same cycle are ignored until the
//! sampler is cleared at the next cycle start. The reference detector records
//! the first edge of the cycle irrespective of any window.

use serde::Serialize;

use crate::common::constants::{GATE_CHANNELS, MONITORED_CHANNELS, REFERENCE_CHANNEL};
use crate::core::registers::TimingWindow;

/// Rising edges seen on the monitored inputs during one tick.
///
/// Bit `i` is logical input `i`; bits 0..4 are the gated inputs and bit 4 the
/// reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputEdges(pub u8);

impl InputEdges {
    /// No edges.
    pub const NONE: Self = Self(0);

    /// Edges on the given logical channels.
    pub fn on(channels: &[usize]) -> Self {
        Self(
            channels
                .iter()
                .filter(|&&c| c < MONITORED_CHANNELS)
                .fold(0, |acc, &c| acc | 1 << c),
        )
    }

    /// Whether channel `channel` rose this tick.
    #[inline]
    pub const fn rose(self, channel: usize) -> bool {
        channel < MONITORED_CHANNELS && (self.0 >> channel) & 1 != 0
    }

    /// Merges two edge sets.
    #[must_use]
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Timestamps latched when a sequence exits.
///
/// Order is gates 0..3, then the reference channel. A zero means no edge was
/// accepted on that channel during the final cycle. Gate windows never contain
/// cycle time 0, so this is unambiguous for gates; a reference edge at cycle
/// time 0 also latches 0, though NTriggers still counts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TimestampCapture(pub [u16; MONITORED_CHANNELS]);

#[derive(Debug, Clone, Copy, Default)]
struct Detector {
    triggered: bool,
    timestamp: u16,
}

impl Detector {
    fn accept(&mut self, cycle_time: u16) {
        if !self.triggered {
            self.triggered = true;
            self.timestamp = cycle_time;
        }
    }
}

/// Per-cycle input detectors.
#[derive(Debug, Clone, Default)]
pub struct TimestampSampler {
    gates: [Detector; GATE_CHANNELS],
    reference: Detector,
}

impl TimestampSampler {
    /// Creates a cleared sampler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets all edges; called at the start of every cycle.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Feeds one tick of input edges at the given cycle time.
    pub fn sample(&mut self, cycle_time: u16, windows: &[TimingWindow; GATE_CHANNELS], edges: InputEdges) {
        for (channel, (detector, window)) in self.gates.iter_mut().zip(windows).enumerate() {
            if edges.rose(channel) && window.contains(cycle_time) {
                detector.accept(cycle_time);
            }
        }
        if edges.rose(REFERENCE_CHANNEL) {
            self.reference.accept(cycle_time);
        }
    }

    /// Gate detectors that fired this cycle, gate 0 in the least-significant bit.
    pub fn pattern(&self) -> u8 {
        self.gates
            .iter()
            .enumerate()
            .fold(0, |acc, (i, d)| acc | (d.triggered as u8) << i)
    }

    /// Whether the reference input fired this cycle.
    pub const fn reference_seen(&self) -> bool {
        self.reference.triggered
    }

    /// Current timestamps in register order.
    pub fn capture(&self) -> TimestampCapture {
        let mut ts = [0; MONITORED_CHANNELS];
        for (slot, d) in ts.iter_mut().zip(self.gates.iter().chain(std::iter::once(&self.reference))) {
            *slot = if d.triggered { d.timestamp } else { 0 };
        }
        TimestampCapture(ts)
    }
}
