//! Synchronization controller.
//!
//! Master/slave coordination is expressed as one [`SyncController`] trait with
//! three role implementations that all drive the same cycle sequencer:
//!
//! 1. **Master:** Waits for the slave's `ready`, pulses `trigger` for
//!    `trigger_hold_ticks`, then runs. Publishes its cycle count with a mark at
//!    every boundary and holds `success`/`timeout` after the run ends. Once
//!    `ready` drops it stops heralding and, if the gap outlasts the grace
//!    period, ends with the count the slave last held.
//! 2. **Slave:** Asserts `ready` while armed or running. Starts only after
//!    `trigger_hold_ticks` consecutive high samples that follow a low one, adopts
//!    the master's cycle count at each mark, and ends with the master's reason.
//! 3. **Standalone:** Starts immediately and never looks at the link.
//!
//! The trigger line has a single writer, so no arbitration is needed: the slave
//! only observes it.

use std::fmt;

use serde::Serialize;

use crate::config::SyncConfig;
use crate::core::registers::Role;
use crate::core::sequencer::{ExitReason, TimeoutCause};

/// Lines of the inter-core link as seen by, or driven by, one core.
///
/// Only the fields owned by the driving role are meaningful in a core's
/// output; the link discards the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LinkLines {
    /// Slave → master: slave is armed or running.
    pub ready: bool,
    /// Master → slave: start trigger.
    pub trigger: bool,
    /// Master → slave: run ended on a herald.
    pub success: bool,
    /// Master → slave: run ended on a timeout.
    pub timeout: bool,
    /// Master → slave: a cycle boundary happened this tick.
    pub cycle_mark: bool,
    /// Master → slave: master's completed cycle count.
    pub cycles: u16,
}

/// Sequencer phase reported to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No sequence active (never started, refused, or finished).
    Idle,
    /// Waiting for synchronization.
    Armed,
    /// Cycling.
    Running,
}

/// What the sequencer should do after a controller callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncVerdict {
    /// Keep the current phase.
    Continue,
    /// Leave ARMED and process this tick as the first RUNNING tick.
    Start,
    /// Discard the running sequence and start over in lock-step with the partner.
    Restart,
    /// Replace the local cycle count with the partner's.
    AdoptCycles(u16),
    /// End the sequence now, optionally adopting the partner's cycle count.
    Exit {
        /// Terminal reason.
        reason: ExitReason,
        /// Partner's final cycle count.
        cycles: Option<u16>,
    },
}

/// Sequencer progress after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    /// Completed cycles.
    pub n_cycles: u16,
    /// A cycle boundary was crossed this tick.
    pub boundary: bool,
    /// The sequence ended this tick.
    pub exit: Option<ExitReason>,
}

/// Role-specific synchronization behaviour.
pub trait SyncController: fmt::Debug + Send + Sync {
    /// Role implemented by this controller.
    fn role(&self) -> Role;

    /// Called on every accepted Run write. Returns [`SyncVerdict::Start`] to skip
    /// ARMED entirely.
    fn on_enable(&mut self) -> SyncVerdict;

    /// Called at the start of each tick with the registered partner lines.
    fn on_partner_signal(&mut self, phase: SyncPhase, lines: &LinkLines) -> SyncVerdict;

    /// Called at the end of each tick with the resulting phase; returns the
    /// lines this core drives until the next tick.
    fn on_tick(&mut self, phase: SyncPhase, progress: &Progress) -> LinkLines;

    /// Whether a local herald match may end the sequence.
    fn heralds_locally(&self) -> bool {
        true
    }
}

/// Builds the controller for a role.
pub fn controller_for(role: Role, config: &SyncConfig) -> Box<dyn SyncController> {
    match role {
        Role::Master => Box::new(MasterSync::new(config)),
        Role::Slave => Box::new(SlaveSync::new(config)),
        Role::Standalone => Box::new(StandaloneSync),
    }
}

/// Master role.
#[derive(Debug, Clone)]
pub struct MasterSync {
    hold: u32,
    grace: u32,
    triggering: bool,
    trigger_driven: u32,
    ready_missing: u32,
    cycles: u16,
    cycles_at_loss: u16,
    outcome: Option<ExitReason>,
}

impl MasterSync {
    /// Creates an idle master controller.
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            hold: config.trigger_hold_ticks.max(1),
            grace: config.grace_ticks,
            triggering: false,
            trigger_driven: 0,
            ready_missing: 0,
            cycles: 0,
            cycles_at_loss: 0,
            outcome: None,
        }
    }
}

impl SyncController for MasterSync {
    fn role(&self) -> Role {
        Role::Master
    }

    fn on_enable(&mut self) -> SyncVerdict {
        self.triggering = false;
        self.trigger_driven = 0;
        self.ready_missing = 0;
        self.cycles = 0;
        self.cycles_at_loss = 0;
        self.outcome = None;
        SyncVerdict::Continue
    }

    fn on_partner_signal(&mut self, phase: SyncPhase, lines: &LinkLines) -> SyncVerdict {
        match phase {
            SyncPhase::Armed if self.triggering => {
                if self.trigger_driven >= self.hold {
                    self.triggering = false;
                    tracing::debug!(hold = self.hold, "master trigger complete, starting");
                    SyncVerdict::Start
                } else {
                    SyncVerdict::Continue
                }
            }
            SyncPhase::Armed => {
                if lines.ready {
                    tracing::debug!("slave ready, driving trigger");
                    self.triggering = true;
                }
                SyncVerdict::Continue
            }
            SyncPhase::Running => {
                if lines.ready {
                    self.ready_missing = 0;
                    return SyncVerdict::Continue;
                }
                // The slave's last count is the one in effect when ready dropped.
                if self.ready_missing == 0 {
                    self.cycles_at_loss = self.cycles;
                }
                self.ready_missing += 1;
                if self.ready_missing > self.grace {
                    tracing::warn!(
                        ticks = self.ready_missing,
                        n_cycles = self.cycles_at_loss,
                        "slave dropped ready"
                    );
                    SyncVerdict::Exit {
                        reason: ExitReason::Timeout(TimeoutCause::PartnerLost),
                        cycles: Some(self.cycles_at_loss),
                    }
                } else {
                    SyncVerdict::Continue
                }
            }
            SyncPhase::Idle => SyncVerdict::Continue,
        }
    }

    fn on_tick(&mut self, phase: SyncPhase, progress: &Progress) -> LinkLines {
        if progress.exit.is_some() {
            self.outcome = progress.exit;
        }
        self.cycles = progress.n_cycles;
        let trigger = phase == SyncPhase::Armed && self.triggering;
        if trigger {
            self.trigger_driven += 1;
        }
        LinkLines {
            ready: false,
            trigger,
            success: matches!(self.outcome, Some(ExitReason::Heralded(_))),
            timeout: matches!(self.outcome, Some(ExitReason::Timeout(_))),
            cycle_mark: progress.boundary,
            cycles: progress.n_cycles,
        }
    }

    fn heralds_locally(&self) -> bool {
        self.ready_missing == 0
    }
}

/// Slave role.
#[derive(Debug, Clone)]
pub struct SlaveSync {
    hold: u32,
    grace: u32,
    low_seen: bool,
    high_run: u32,
    awaiting_mark: Option<u32>,
}

impl SlaveSync {
    /// Creates an idle slave controller.
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            hold: config.trigger_hold_ticks.max(1),
            grace: config.grace_ticks,
            low_seen: false,
            high_run: 0,
            awaiting_mark: None,
        }
    }

    /// Debounces the trigger line; true once a validated edge completes.
    fn trigger_fired(&mut self, trigger: bool) -> bool {
        if !trigger {
            self.low_seen = true;
            self.high_run = 0;
            return false;
        }
        if !self.low_seen {
            return false;
        }
        self.high_run += 1;
        if self.high_run >= self.hold {
            self.low_seen = false;
            self.high_run = 0;
            return true;
        }
        false
    }
}

impl SyncController for SlaveSync {
    fn role(&self) -> Role {
        Role::Slave
    }

    fn on_enable(&mut self) -> SyncVerdict {
        self.low_seen = false;
        self.high_run = 0;
        self.awaiting_mark = None;
        SyncVerdict::Continue
    }

    fn on_partner_signal(&mut self, phase: SyncPhase, lines: &LinkLines) -> SyncVerdict {
        let fired = self.trigger_fired(lines.trigger);
        match phase {
            SyncPhase::Armed if fired => {
                tracing::debug!("master trigger validated, starting");
                SyncVerdict::Start
            }
            SyncPhase::Running if fired => {
                tracing::debug!("master restarted, resynchronizing");
                self.awaiting_mark = None;
                SyncVerdict::Restart
            }
            SyncPhase::Running => {
                if lines.success {
                    return SyncVerdict::Exit {
                        reason: ExitReason::Heralded(None),
                        cycles: Some(lines.cycles),
                    };
                }
                if lines.timeout {
                    return SyncVerdict::Exit {
                        reason: ExitReason::Timeout(TimeoutCause::PartnerTimeout),
                        cycles: Some(lines.cycles),
                    };
                }
                if lines.cycle_mark {
                    self.awaiting_mark = None;
                    return SyncVerdict::AdoptCycles(lines.cycles);
                }
                if let Some(waited) = self.awaiting_mark.as_mut() {
                    *waited += 1;
                    if *waited > self.grace {
                        tracing::warn!(ticks = *waited, "no cycle mark from master");
                        return SyncVerdict::Exit {
                            reason: ExitReason::Timeout(TimeoutCause::PartnerLost),
                            cycles: None,
                        };
                    }
                }
                SyncVerdict::Continue
            }
            SyncPhase::Armed | SyncPhase::Idle => SyncVerdict::Continue,
        }
    }

    fn on_tick(&mut self, phase: SyncPhase, progress: &Progress) -> LinkLines {
        if progress.boundary && progress.exit.is_none() {
            self.awaiting_mark = Some(0);
        }
        LinkLines {
            ready: matches!(phase, SyncPhase::Armed | SyncPhase::Running),
            ..LinkLines::default()
        }
    }

    fn heralds_locally(&self) -> bool {
        false
    }
}

/// Standalone role: no partner.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandaloneSync;

impl SyncController for StandaloneSync {
    fn role(&self) -> Role {
        Role::Standalone
    }

    fn on_enable(&mut self) -> SyncVerdict {
        SyncVerdict::Start
    }

    fn on_partner_signal(&mut self, _phase: SyncPhase, _lines: &LinkLines) -> SyncVerdict {
        SyncVerdict::Continue
    }

    fn on_tick(&mut self, _phase: SyncPhase, _progress: &Progress) -> LinkLines {
        LinkLines::default()
    }
}
