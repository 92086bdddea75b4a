//! Two-core testbed.
//!
//! This module assembles the simulated hardware: up to two entangler devices
//! joined by a registered [`Link`]. It performs:
//! 1. **Assembly:** Places a core on the master side, the slave side, or both.
//! 2. **Host access:** Routes register reads and writes to one side.
//! 3. **Clocking:** Ticks both cores with their input edges, then latches the link.
//!
//! Which side a core sits on only decides which link lines it drives; its role
//! is still selected by its own Config register.

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::core::sampler::InputEdges;
use crate::soc::device::{EntanglerDevice, REGISTER_STRIDE};
use crate::soc::link::Link;
use crate::soc::traits::Device;

/// Base address of the master-side device.
pub const MASTER_BASE: u64 = 0x1000_0000;
/// Base address of the slave-side device.
pub const SLAVE_BASE: u64 = 0x1000_1000;

/// End of the link a core is wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Drives trigger, success, timeout and the cycle mark.
    Master,
    /// Drives ready.
    Slave,
}

impl Side {
    /// Both sides, master first.
    pub const ALL: [Self; 2] = [Self::Master, Self::Slave];

    /// Upper-case device name.
    pub const fn device_name(self) -> &'static str {
        match self {
            Self::Master => "MASTER",
            Self::Slave => "SLAVE",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Master => f.write_str("master"),
            Self::Slave => f.write_str("slave"),
        }
    }
}

/// Sides whose device raised its done strobe during a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickEvents {
    /// Master-side sequence finished.
    pub master_done: bool,
    /// Slave-side sequence finished.
    pub slave_done: bool,
}

impl TickEvents {
    /// Whether the device on `side` finished.
    pub const fn done(&self, side: Side) -> bool {
        match side {
            Side::Master => self.master_done,
            Side::Slave => self.slave_done,
        }
    }
}

/// Up to two entangler devices and the link between them.
#[derive(Debug, Default)]
pub struct Testbed {
    master: Option<EntanglerDevice>,
    slave: Option<EntanglerDevice>,
    link: Link,
    now: u64,
}

impl Testbed {
    /// Creates an empty testbed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a testbed with a core on each of the given sides.
    ///
    /// # Arguments
    ///
    /// * `config` - Build-time configuration shared by every core.
    /// * `sides` - Sides to populate; duplicates are ignored.
    pub fn with_cores(config: &Config, sides: &[Side]) -> Self {
        let mut bed = Self::new();
        for &side in sides {
            if bed.device(side).is_none() {
                bed.attach(side, config);
            }
        }
        bed
    }

    /// Places a fresh core on `side`, replacing any core already there.
    pub fn attach(&mut self, side: Side, config: &Config) {
        let base = match side {
            Side::Master => MASTER_BASE,
            Side::Slave => SLAVE_BASE,
        };
        let device = EntanglerDevice::new(side.device_name(), base, config);
        tracing::debug!(%side, base = format_args!("{base:#x}"), "core attached");
        match side {
            Side::Master => self.master = Some(device),
            Side::Slave => self.slave = Some(device),
        }
    }

    /// Device on `side`, if populated.
    pub const fn device(&self, side: Side) -> Option<&EntanglerDevice> {
        match side {
            Side::Master => self.master.as_ref(),
            Side::Slave => self.slave.as_ref(),
        }
    }

    /// Mutable device on `side`, if populated.
    pub fn device_mut(&mut self, side: Side) -> Option<&mut EntanglerDevice> {
        match side {
            Side::Master => self.master.as_mut(),
            Side::Slave => self.slave.as_mut(),
        }
    }

    /// Writes a register of the core on `side`.
    ///
    /// # Returns
    ///
    /// `false` when no core sits on that side.
    pub fn write_register(&mut self, side: Side, address: u64, word: u32) -> bool {
        match self.device_mut(side) {
            Some(device) => {
                device.write_u32(address * REGISTER_STRIDE, word);
                true
            }
            None => false,
        }
    }

    /// Reads a register of the core on `side`; `None` when no core sits there.
    pub fn read_register(&mut self, side: Side, address: u64) -> Option<u32> {
        self.device_mut(side)
            .map(|device| device.read_u32(address * REGISTER_STRIDE))
    }

    /// Advances both cores by one tick.
    ///
    /// # Arguments
    ///
    /// * `edges` - Input edges for the core on each side during this tick.
    pub fn tick(&mut self, mut edges: impl FnMut(Side) -> InputEdges) -> TickEvents {
        let to_master = self.link.to_master();
        let to_slave = self.link.to_slave();
        let mut events = TickEvents::default();

        if let Some(master) = self.master.as_mut() {
            master.drive_inputs(edges(Side::Master), to_master);
            events.master_done = master.tick();
        }
        if let Some(slave) = self.slave.as_mut() {
            slave.drive_inputs(edges(Side::Slave), to_slave);
            events.slave_done = slave.tick();
        }

        let master_lines = self.master.as_ref().map(EntanglerDevice::link_out).unwrap_or_default();
        let slave_lines = self.slave.as_ref().map(EntanglerDevice::link_out).unwrap_or_default();
        self.link.latch(&master_lines, &slave_lines);
        self.now += 1;
        events
    }

    /// Ticks elapsed since construction.
    pub const fn now(&self) -> u64 {
        self.now
    }

    /// Current link state.
    pub const fn link(&self) -> &Link {
        &self.link
    }

    /// Whether any populated core is armed or running.
    pub fn any_active(&self) -> bool {
        Side::ALL
            .iter()
            .filter_map(|&side| self.device(side))
            .any(|device| device.status().running)
    }
}
