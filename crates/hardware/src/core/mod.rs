//! Entangler core.
//!
//! This module contains one complete controller core and its building blocks.
//! It coordinates the following:
//! 1. **Registers:** Persisted configuration and the published status image.
//! 2. **Sequencing:** The cycle timer, output windows and the run state machine.
//! 3. **Sampling:** Gated first-edge detection and herald matching per cycle.
//! 4. **Synchronization:** The master/slave handshake over the inter-core link.

/// Herald pattern matching.
pub mod herald;

/// Register file, register addresses and packed register words.
pub mod registers;

/// Gated input sampling and timestamp capture.
pub mod sampler;

/// Cycle sequencer state machine.
pub mod sequencer;

/// Master/slave synchronization controllers.
pub mod sync;

use crate::common::error::RegisterError;
use crate::config::Config;
use crate::core::registers::{RegisterFile, RunCommand, StatusSnapshot};
use crate::core::sampler::InputEdges;
use crate::core::sequencer::{CycleSequencer, OutputLevels, TickOutput};
use crate::core::sync::{LinkLines, SyncController};

/// One controller core: register file plus sequencer.
///
/// Register writes take effect immediately on the persisted state; the status
/// image is republished after every Run write and every tick.
#[derive(Debug)]
pub struct EntanglerCore {
    regs: RegisterFile,
    sequencer: CycleSequencer,
    outputs: OutputLevels,
    link: LinkLines,
}

impl EntanglerCore {
    /// Creates an idle core with cleared registers.
    pub fn new(config: &Config) -> Self {
        let revision = config.protocol.revision;
        Self {
            regs: RegisterFile::new(revision),
            sequencer: CycleSequencer::new(config.sync),
            outputs: OutputLevels::inactive(revision.output_channels()),
            link: LinkLines::default(),
        }
    }

    /// Writes a register. A Run write starts, restarts or refuses a sequence.
    ///
    /// # Errors
    ///
    /// Fails for undecodable addresses and read-only registers; the core state
    /// is left unchanged.
    pub fn write(&mut self, address: u64, word: u32) -> Result<(), RegisterError> {
        if let Some(run) = self.regs.write(address, word)? {
            match self.regs.snapshot(run) {
                Ok(program) => self.sequencer.start(program),
                Err(fault) => self.sequencer.refuse(fault),
            }
            self.publish();
        }
        Ok(())
    }

    /// Starts a sequence with an explicit synchronization controller instead of
    /// the one implied by the Config register.
    ///
    /// The Run is still refused when the persisted configuration does not allow
    /// a start.
    pub fn run_with_controller(&mut self, max_run_time: u32, sync: Box<dyn SyncController>) {
        match self.regs.snapshot(RunCommand { max_run_time }) {
            Ok(program) => self.sequencer.start_with_controller(program, sync),
            Err(fault) => self.sequencer.refuse(fault),
        }
        self.publish();
    }

    /// Reads a status or timestamp register.
    ///
    /// # Errors
    ///
    /// Fails for undecodable addresses and write-only registers.
    pub fn read(&self, address: u64) -> Result<u32, RegisterError> {
        self.regs.read(address)
    }

    /// Advances one tick with the given input edges and registered partner lines.
    pub fn tick(&mut self, edges: InputEdges, partner: &LinkLines) -> TickOutput {
        let out = self.sequencer.tick(edges, partner);
        self.outputs = out.outputs;
        self.link = out.link;
        self.publish();
        out
    }

    fn publish(&mut self) {
        self.regs.publish(self.sequencer.status());
    }

    /// Published status image.
    pub const fn status(&self) -> &StatusSnapshot {
        self.regs.status()
    }

    /// Output levels of the last tick.
    pub const fn outputs(&self) -> OutputLevels {
        self.outputs
    }

    /// Link lines driven since the last tick.
    pub const fn link(&self) -> LinkLines {
        self.link
    }

    /// Register file.
    pub const fn registers(&self) -> &RegisterFile {
        &self.regs
    }

    /// Sequencer.
    pub const fn sequencer(&self) -> &CycleSequencer {
        &self.sequencer
    }
}
