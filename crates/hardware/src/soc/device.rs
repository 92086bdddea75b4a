//! Register-mapped entangler device.
//!
//! Wraps an [`EntanglerCore`] behind the [`Device`] trait. This is the register
//! boundary: decode failures are logged and absorbed here, so the host only
//! ever sees dropped writes and zero reads.
//!
//! # Memory Map
//!
//! Register `n` of the 5-bit register space lives at byte offset `4 * n`.
//! Unaligned offsets are dropped.

use crate::common::constants::REGISTER_SPACE;
use crate::config::Config;
use crate::core::EntanglerCore;
use crate::core::registers::StatusSnapshot;
use crate::core::sampler::InputEdges;
use crate::core::sequencer::{ExitReason, OutputLevels};
use crate::core::sync::LinkLines;
use crate::soc::traits::Device;

/// Byte distance between consecutive registers.
pub const REGISTER_STRIDE: u64 = 4;

/// An entangler core mapped at a base address.
#[derive(Debug)]
pub struct EntanglerDevice {
    name: String,
    base_addr: u64,
    core: EntanglerCore,
    edges: InputEdges,
    partner: LinkLines,
    last_exit: Option<ExitReason>,
    boundary: bool,
    dropped_accesses: u64,
}

impl EntanglerDevice {
    /// Creates a device.
    ///
    /// # Arguments
    ///
    /// * `name` - Name used in logs and reports (e.g., `"MASTER"`).
    /// * `base_addr` - Base address of the register window.
    /// * `config` - Build-time configuration (protocol revision, handshake timing).
    pub fn new(name: &str, base_addr: u64, config: &Config) -> Self {
        Self {
            name: name.to_owned(),
            base_addr,
            core: EntanglerCore::new(config),
            edges: InputEdges::NONE,
            partner: LinkLines::default(),
            last_exit: None,
            boundary: false,
            dropped_accesses: 0,
        }
    }

    /// Latches the inputs for the next tick.
    ///
    /// # Arguments
    ///
    /// * `edges` - Rising edges on the monitored inputs during the tick.
    /// * `partner` - Link lines driven by the partner core, as registered by the link.
    pub fn drive_inputs(&mut self, edges: InputEdges, partner: LinkLines) {
        self.edges = edges;
        self.partner = partner;
    }

    /// Link lines this device drives.
    pub const fn link_out(&self) -> LinkLines {
        self.core.link()
    }

    /// Output levels of the last tick.
    pub const fn outputs(&self) -> OutputLevels {
        self.core.outputs()
    }

    /// Published status image.
    pub const fn status(&self) -> &StatusSnapshot {
        self.core.status()
    }

    /// Exit reason reported on the most recent done strobe.
    pub const fn last_exit(&self) -> Option<ExitReason> {
        self.last_exit
    }

    /// Whether the last tick crossed a cycle boundary.
    pub const fn crossed_boundary(&self) -> bool {
        self.boundary
    }

    /// Register accesses dropped since construction.
    pub const fn dropped_accesses(&self) -> u64 {
        self.dropped_accesses
    }

    /// Underlying core.
    pub const fn core(&self) -> &EntanglerCore {
        &self.core
    }

    /// Mutable access to the underlying core.
    pub fn core_mut(&mut self) -> &mut EntanglerCore {
        &mut self.core
    }

    fn register(&mut self, offset: u64) -> Option<u64> {
        if offset % REGISTER_STRIDE != 0 {
            tracing::warn!(device = %self.name, offset, "unaligned register access dropped");
            self.dropped_accesses += 1;
            return None;
        }
        Some(offset / REGISTER_STRIDE)
    }
}

impl Device for EntanglerDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn address_range(&self) -> (u64, u64) {
        (self.base_addr, REGISTER_SPACE * REGISTER_STRIDE)
    }

    /// Reads a register; undecodable and write-only registers read as zero.
    fn read_u32(&mut self, offset: u64) -> u32 {
        let Some(address) = self.register(offset) else {
            return 0;
        };
        match self.core.read(address) {
            Ok(word) => word,
            Err(e) => {
                tracing::warn!(device = %self.name, error = %e, "register read dropped");
                self.dropped_accesses += 1;
                0
            }
        }
    }

    /// Writes a register; undecodable and read-only registers ignore the write.
    fn write_u32(&mut self, offset: u64, val: u32) {
        let Some(address) = self.register(offset) else {
            return;
        };
        tracing::trace!(device = %self.name, address, val, "register write");
        if let Err(e) = self.core.write(address, val) {
            tracing::warn!(device = %self.name, error = %e, "register write dropped");
            self.dropped_accesses += 1;
        }
    }

    /// Advances the core one tick with the latched inputs.
    ///
    /// Returns `true` on the tick the sequence finished.
    fn tick(&mut self) -> bool {
        let out = self.core.tick(self.edges, &self.partner);
        self.edges = InputEdges::NONE;
        self.boundary = out.boundary;
        if let Some(exit) = out.exit {
            self.last_exit = Some(exit);
            true
        } else {
            false
        }
    }
}
