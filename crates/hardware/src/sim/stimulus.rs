//! Scripted input stimulus.
//!
//! A stimulus is a list of rising edges on the monitored input channels, either
//! at one absolute tick or repeating with a fixed period. Ticks are counted from
//! the start of the simulation, so periodic edges with `period` equal to the
//! cycle length land at the same cycle time in every cycle once the cores are
//! synchronized.

use serde::{Deserialize, Serialize};

use crate::common::constants::MONITORED_CHANNELS;
use crate::common::error::ConfigError;
use crate::core::sampler::InputEdges;
use crate::soc::testbed::Side;

/// Which cores see an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// Only the master-side core.
    Master,
    /// Only the slave-side core.
    Slave,
    /// Both cores.
    #[default]
    Both,
}

impl Target {
    /// Whether the core on `side` sees edges aimed at this target.
    pub const fn includes(self, side: Side) -> bool {
        matches!(
            (self, side),
            (Self::Both, _) | (Self::Master, Side::Master) | (Self::Slave, Side::Slave)
        )
    }
}

/// One scripted edge source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EdgeSpec {
    /// A single rising edge.
    At {
        /// Absolute tick.
        tick: u64,
        /// Logical input channel; 0..4 are gated, 4 is the reference.
        channel: u8,
        /// Receiving cores.
        #[serde(default)]
        target: Target,
    },
    /// A rising edge every `period` ticks from `start`.
    Periodic {
        /// First tick.
        start: u64,
        /// Distance between edges, at least 1.
        period: u64,
        /// Number of edges; unbounded when absent.
        #[serde(default)]
        count: Option<u64>,
        /// Logical input channel.
        channel: u8,
        /// Receiving cores.
        #[serde(default)]
        target: Target,
    },
}

impl EdgeSpec {
    fn channel(&self) -> u8 {
        match *self {
            Self::At { channel, .. } | Self::Periodic { channel, .. } => channel,
        }
    }

    fn fires(&self, now: u64, side: Side) -> bool {
        match *self {
            Self::At { tick, target, .. } => target.includes(side) && now == tick,
            Self::Periodic {
                start,
                period,
                count,
                target,
                ..
            } => {
                if !target.includes(side) || now < start || period == 0 {
                    return false;
                }
                let offset = now - start;
                offset % period == 0 && count.is_none_or(|n| offset / period < n)
            }
        }
    }
}

/// Edge script for a whole simulation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Stimulus {
    edges: Vec<EdgeSpec>,
}

impl Stimulus {
    /// Creates a stimulus from edge sources.
    pub fn new(edges: Vec<EdgeSpec>) -> Self {
        Self { edges }
    }

    /// Adds an edge source.
    pub fn push(&mut self, edge: EdgeSpec) {
        self.edges.push(edge);
    }

    /// Edge sources in declaration order.
    pub fn edges(&self) -> &[EdgeSpec] {
        &self.edges
    }

    /// Checks every source refers to a monitored channel and repeats.
    ///
    /// # Errors
    ///
    /// [`ConfigError::StimulusChannel`] or [`ConfigError::StimulusPeriod`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        for edge in &self.edges {
            if usize::from(edge.channel()) >= MONITORED_CHANNELS {
                return Err(ConfigError::StimulusChannel(edge.channel()));
            }
            if let EdgeSpec::Periodic { period: 0, .. } = edge {
                return Err(ConfigError::StimulusPeriod);
            }
        }
        Ok(())
    }

    /// Edges the core on `side` sees during tick `now`.
    pub fn edges_at(&self, now: u64, side: Side) -> InputEdges {
        self.edges
            .iter()
            .filter(|e| e.fires(now, side))
            .fold(InputEdges::NONE, |acc, e| {
                acc.with(InputEdges::on(&[usize::from(e.channel())]))
            })
    }
}
