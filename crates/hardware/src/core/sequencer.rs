//! Cycle sequencer.
//!
//! The central state machine of a core:
//!
//! ```text
//! IDLE ──Run──▶ ARMED ──sync──▶ RUNNING ──▶ DONE(Timeout | Heralded)
//!   ▲             │                           │
//!   └─────────────┴──── Run (restart) ◀───────┘
//! ```
//!
//! One tick processes the current cycle time (drive outputs, sample inputs),
//! then advances the cycle timer and the run-tick counter. At wraparound the
//! completed-cycle counter increments and the herald matcher evaluates the
//! cycle's pattern; finally the timeout bound is checked. A herald found at the
//! same boundary as the timeout therefore wins. When the bound falls inside a
//! cycle, the pattern sampled so far is matched before the timeout is taken.
//!
//! The timeout bound applies separately to the ARMED wait and to RUNNING: the
//! run-tick counter restarts when RUNNING is entered, so a run of `T` ticks
//! always covers `T` ticks of cycling once the partners are synchronized.

use serde::Serialize;

use crate::common::constants::{
    COUNTER_MASK, GATE_CHANNELS, MAX_OUTPUT_CHANNELS, TIMEOUT_RESULT,
};
use crate::config::SyncConfig;
use crate::core::herald::{HeraldMatch, HeraldMatcher};
use crate::core::registers::{Fault, HeraldSet, Role, StatusSnapshot, TimingWindow};
use crate::core::sampler::{InputEdges, TimestampCapture, TimestampSampler};
use crate::core::sync::{
    LinkLines, Progress, StandaloneSync, SyncController, SyncPhase, SyncVerdict, controller_for,
};

/// Why a timeout ended the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimeoutCause {
    /// RUNNING lasted `max_run_time` ticks.
    RunTime,
    /// ARMED waited `max_run_time` ticks for the partner.
    ArmWait,
    /// The partner went silent for longer than the grace period.
    PartnerLost,
    /// The master reported its own timeout.
    PartnerTimeout,
}

/// Terminal reason of a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitReason {
    /// A herald matched. `None` when the slave followed the master's success.
    Heralded(Option<HeraldMatch>),
    /// A timeout bound was reached.
    Timeout(TimeoutCause),
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Heralded(Some(m)) => write!(f, "heralded (slot {}, matches {:#06b})", m.index, m.matches),
            Self::Heralded(None) => f.write_str("heralded (by partner)"),
            Self::Timeout(cause) => write!(f, "timeout ({cause:?})"),
        }
    }
}

/// Sequencer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    /// Never started, or the last Run write was refused.
    #[default]
    Idle,
    /// Run accepted, waiting for synchronization.
    Armed,
    /// Cycling.
    Running,
    /// Finished; registers hold the result until the next Run write.
    Done(ExitReason),
}

/// Configuration frozen at a Run write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Program {
    /// Synchronization role.
    pub role: Role,
    /// Ticks per cycle, at least 1.
    pub cycle_length: u16,
    /// Timeout bound in ticks.
    pub max_run_time: u32,
    /// Output windows; entries past `output_count` are inactive.
    pub outputs: [TimingWindow; MAX_OUTPUT_CHANNELS],
    /// Number of output channels in the protocol revision.
    pub output_count: usize,
    /// Input-gating windows.
    pub gates: [TimingWindow; GATE_CHANNELS],
    /// Herald slots.
    pub heralds: HeraldSet,
}

impl Default for Program {
    fn default() -> Self {
        Self {
            role: Role::Standalone,
            cycle_length: 1,
            max_run_time: 0,
            outputs: [TimingWindow::INACTIVE; MAX_OUTPUT_CHANNELS],
            output_count: 0,
            gates: [TimingWindow::INACTIVE; GATE_CHANNELS],
            heralds: HeraldSet::default(),
        }
    }
}

/// Logical output levels for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct OutputLevels {
    levels: [bool; MAX_OUTPUT_CHANNELS],
    count: usize,
}

impl OutputLevels {
    /// All `count` channels inactive.
    pub const fn inactive(count: usize) -> Self {
        Self {
            levels: [false; MAX_OUTPUT_CHANNELS],
            count,
        }
    }

    /// Level of one channel; out-of-range channels read inactive.
    pub fn get(&self, channel: usize) -> bool {
        self.as_slice().get(channel).copied().unwrap_or(false)
    }

    /// Levels of the channels that exist.
    pub fn as_slice(&self) -> &[bool] {
        &self.levels[..self.count.min(MAX_OUTPUT_CHANNELS)]
    }

    /// Bit `i` set when channel `i` is asserted.
    pub fn mask(&self) -> u8 {
        self.as_slice()
            .iter()
            .enumerate()
            .fold(0, |acc, (i, &l)| acc | (l as u8) << i)
    }

    /// Whether any channel is asserted.
    pub fn any(&self) -> bool {
        self.as_slice().iter().any(|&l| l)
    }
}

/// Result of one sequencer tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutput {
    /// Output levels during this tick.
    pub outputs: OutputLevels,
    /// Link lines driven after this tick.
    pub link: LinkLines,
    /// A cycle boundary was crossed this tick.
    pub boundary: bool,
    /// Set on the tick the sequence ended.
    pub exit: Option<ExitReason>,
}

/// Cycle sequencer of one core.
#[derive(Debug)]
pub struct CycleSequencer {
    sync_config: SyncConfig,
    sync: Box<dyn SyncController>,
    state: RunState,
    program: Program,
    matcher: HeraldMatcher,
    sampler: TimestampSampler,
    cycle_time: u16,
    n_cycles: u16,
    n_triggers: u16,
    elapsed: u32,
    last_match: Option<HeraldMatch>,
    capture: TimestampCapture,
    fault: Fault,
}

impl CycleSequencer {
    /// Creates an idle sequencer.
    pub fn new(sync_config: SyncConfig) -> Self {
        Self {
            sync_config,
            sync: Box::new(StandaloneSync),
            state: RunState::Idle,
            program: Program::default(),
            matcher: HeraldMatcher::default(),
            sampler: TimestampSampler::new(),
            cycle_time: 0,
            n_cycles: 0,
            n_triggers: 0,
            elapsed: 0,
            last_match: None,
            capture: TimestampCapture::default(),
            fault: Fault::None,
        }
    }

    /// Starts a sequence with the controller for the program's role.
    ///
    /// Any active sequence is discarded first.
    pub fn start(&mut self, program: Program) {
        let sync = controller_for(program.role, &self.sync_config);
        self.start_with_controller(program, sync);
    }

    /// Starts a sequence with an explicit synchronization controller.
    pub fn start_with_controller(&mut self, program: Program, sync: Box<dyn SyncController>) {
        if self.is_active() {
            tracing::debug!(
                n_cycles = self.n_cycles,
                elapsed = self.elapsed,
                "run rewritten, discarding active sequence"
            );
        }
        self.reset_counters();
        self.fault = Fault::None;
        self.capture = TimestampCapture::default();
        self.program = program;
        self.matcher = HeraldMatcher::new(program.heralds);
        self.sync = sync;

        let verdict = self.sync.on_enable();
        if program.max_run_time == 0 {
            let _ = self.finish(ExitReason::Timeout(TimeoutCause::RunTime));
            return;
        }
        self.state = if verdict == SyncVerdict::Start {
            RunState::Running
        } else {
            RunState::Armed
        };
        tracing::debug!(
            role = %program.role,
            cycle_length = program.cycle_length,
            max_run_time = program.max_run_time,
            state = ?self.state,
            "sequence started"
        );
    }

    /// Refuses a Run write: aborts any sequence and records the fault.
    pub fn refuse(&mut self, fault: Fault) {
        tracing::warn!(?fault, "run refused");
        self.reset_counters();
        self.capture = TimestampCapture::default();
        self.sync = Box::new(StandaloneSync);
        self.state = RunState::Idle;
        self.fault = fault;
    }

    /// Advances one tick.
    pub fn tick(&mut self, edges: InputEdges, lines: &LinkLines) -> TickOutput {
        let verdict = self.sync.on_partner_signal(self.phase(), lines);
        let mut outputs = OutputLevels::inactive(self.program.output_count);
        let mut progress = Progress::default();

        match (self.state, verdict) {
            (RunState::Armed | RunState::Running, SyncVerdict::Exit { reason, cycles }) => {
                if let Some(cycles) = cycles {
                    self.adopt_cycles(cycles);
                }
                progress.exit = Some(self.finish(reason));
            }
            (RunState::Armed, SyncVerdict::Start) | (RunState::Running, SyncVerdict::Restart) => {
                self.enter_running();
                self.run_tick(edges, &mut outputs, &mut progress);
            }
            (RunState::Armed, _) => {
                self.elapsed = self.elapsed.saturating_add(1);
                if self.elapsed >= self.program.max_run_time {
                    progress.exit = Some(self.finish(ExitReason::Timeout(TimeoutCause::ArmWait)));
                }
            }
            (RunState::Running, verdict) => {
                if let SyncVerdict::AdoptCycles(cycles) = verdict {
                    self.adopt_cycles(cycles);
                }
                self.run_tick(edges, &mut outputs, &mut progress);
            }
            (RunState::Idle | RunState::Done(_), _) => {}
        }

        progress.n_cycles = self.n_cycles;
        let link = self.sync.on_tick(self.phase(), &progress);
        TickOutput {
            outputs,
            link,
            boundary: progress.boundary,
            exit: progress.exit,
        }
    }

    fn run_tick(&mut self, edges: InputEdges, outputs: &mut OutputLevels, progress: &mut Progress) {
        let program = self.program;
        if self.cycle_time == 0 {
            self.sampler.clear();
        }

        for (level, window) in outputs
            .levels
            .iter_mut()
            .zip(&program.outputs[..program.output_count])
        {
            *level = window.contains(self.cycle_time);
        }
        self.sampler.sample(self.cycle_time, &program.gates, edges);

        self.cycle_time += 1;
        self.elapsed = self.elapsed.saturating_add(1);

        if self.cycle_time >= program.cycle_length {
            self.cycle_time = 0;
            self.n_cycles = (self.n_cycles + 1) & COUNTER_MASK;
            progress.boundary = true;
            if self.sampler.reference_seen() {
                self.n_triggers = (self.n_triggers + 1) & COUNTER_MASK;
            }

            tracing::trace!(n_cycles = self.n_cycles, "cycle boundary");
            if let Some(exit) = self.evaluate_heralds() {
                progress.exit = Some(exit);
                return;
            }
        }

        if self.elapsed >= program.max_run_time {
            // The final partial cycle is still evaluated before timing out.
            let heralded = if progress.boundary {
                None
            } else {
                self.evaluate_heralds()
            };
            let exit = match heralded {
                Some(exit) => exit,
                None => self.finish(ExitReason::Timeout(TimeoutCause::RunTime)),
            };
            progress.exit = Some(exit);
        }
    }

    fn evaluate_heralds(&mut self) -> Option<ExitReason> {
        let pattern = self.sampler.pattern();
        let matched = self.matcher.check(pattern);
        tracing::trace!(pattern, ?matched, "herald check");
        let m = matched?;
        self.last_match = Some(m);
        self.sync
            .heralds_locally()
            .then(|| self.finish(ExitReason::Heralded(Some(m))))
    }

    fn enter_running(&mut self) {
        if self.state == RunState::Running {
            self.reset_counters();
        }
        self.state = RunState::Running;
        self.cycle_time = 0;
        self.elapsed = 0;
        tracing::debug!(role = %self.program.role, "running");
    }

    fn adopt_cycles(&mut self, cycles: u16) {
        let cycles = cycles & COUNTER_MASK;
        if cycles != self.n_cycles {
            tracing::debug!(local = self.n_cycles, partner = cycles, "adopting partner cycle count");
        }
        self.n_cycles = cycles;
    }

    fn finish(&mut self, reason: ExitReason) -> ExitReason {
        self.state = RunState::Done(reason);
        self.capture = self.sampler.capture();
        tracing::info!(
            role = %self.program.role,
            %reason,
            n_cycles = self.n_cycles,
            "sequence finished"
        );
        reason
    }

    fn reset_counters(&mut self) {
        self.sampler.clear();
        self.cycle_time = 0;
        self.n_cycles = 0;
        self.n_triggers = 0;
        self.elapsed = 0;
        self.last_match = None;
    }

    fn phase(&self) -> SyncPhase {
        match self.state {
            RunState::Armed => SyncPhase::Armed,
            RunState::Running => SyncPhase::Running,
            RunState::Idle | RunState::Done(_) => SyncPhase::Idle,
        }
    }

    /// Status image for the register file.
    pub fn status(&self) -> StatusSnapshot {
        let active = self.is_active();
        StatusSnapshot {
            running: active,
            heralded: matches!(self.state, RunState::Done(ExitReason::Heralded(_))),
            timed_out: matches!(self.state, RunState::Done(ExitReason::Timeout(_))),
            refused: self.fault != Fault::None,
            n_cycles: self.n_cycles,
            time_remaining: if active {
                self.program.max_run_time.saturating_sub(self.elapsed)
            } else {
                0
            },
            n_triggers: self.n_triggers,
            run_result: match self.state {
                RunState::Done(ExitReason::Heralded(_)) => {
                    self.last_match.map_or(0, |m| m.matches as u32)
                }
                RunState::Done(ExitReason::Timeout(_)) => TIMEOUT_RESULT,
                _ => 0,
            },
            fault: self.fault,
            timestamps: self.capture,
        }
    }

    /// ARMED or RUNNING.
    pub const fn is_active(&self) -> bool {
        matches!(self.state, RunState::Armed | RunState::Running)
    }

    /// Current state.
    pub const fn state(&self) -> RunState {
        self.state
    }

    /// Position within the current cycle.
    pub const fn cycle_time(&self) -> u16 {
        self.cycle_time
    }

    /// Completed cycles of the current or last sequence.
    pub const fn n_cycles(&self) -> u16 {
        self.n_cycles
    }

    /// Ticks spent in the current bounded phase.
    pub const fn elapsed(&self) -> u32 {
        self.elapsed
    }

    /// Most recent herald match, including matches a slave did not act on.
    pub const fn last_match(&self) -> Option<HeraldMatch> {
        self.last_match
    }

    /// Program of the current or last sequence.
    pub const fn program(&self) -> &Program {
        &self.program
    }

    /// Role of the active synchronization controller.
    pub fn role(&self) -> Role {
        self.sync.role()
    }
}
