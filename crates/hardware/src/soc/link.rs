//! Inter-core link.
//!
//! Models the dedicated wires between the master and slave cores. Every line
//! has exactly one driver and is registered: what a core drives during tick
//! `n` is visible to its partner during tick `n + 1`.

use crate::core::sync::LinkLines;

/// Registered link between a master and a slave core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Link {
    to_master: LinkLines,
    to_slave: LinkLines,
}

impl Link {
    /// Creates a link with every line low.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the lines driven during the current tick.
    ///
    /// Only the lines each side owns are forwarded: `ready` from the slave,
    /// everything else from the master.
    pub fn latch(&mut self, master: &LinkLines, slave: &LinkLines) {
        self.to_slave = LinkLines {
            ready: false,
            ..*master
        };
        self.to_master = LinkLines {
            ready: slave.ready,
            ..LinkLines::default()
        };
    }

    /// Lines the master observes this tick.
    pub const fn to_master(&self) -> LinkLines {
        self.to_master
    }

    /// Lines the slave observes this tick.
    pub const fn to_slave(&self) -> LinkLines {
        self.to_slave
    }
}
