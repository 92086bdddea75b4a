//! Synchronization Unit Tests.
//!
//! Exercises the role controllers directly and master/slave pairs on a
//! testbed: the ready/trigger handshake, lock-step cycling, cycle-count
//! adoption, outcome propagation and partner-loss detection.

use entangler_core::config::SyncConfig;
use entangler_core::core::registers::{RegisterAddress, Role};
use entangler_core::core::sampler::InputEdges;
use entangler_core::core::sequencer::{ExitReason, RunState, TimeoutCause};
use entangler_core::core::sync::{
    LinkLines, MasterSync, Progress, SlaveSync, StandaloneSync, SyncController, SyncPhase,
    SyncVerdict, controller_for,
};
use entangler_core::soc::testbed::Side;
use pretty_assertions::assert_eq;

use crate::common::harness::{CoreBuilder, PairContext, addr, init_tracing};

const TRIGGER: LinkLines = LinkLines {
    ready: false,
    trigger: true,
    success: false,
    timeout: false,
    cycle_mark: false,
    cycles: 0,
};

fn ready() -> LinkLines {
    LinkLines {
        ready: true,
        ..LinkLines::default()
    }
}

#[test]
fn controller_for_matches_the_role() {
    let config = SyncConfig::default();
    for role in [Role::Master, Role::Slave, Role::Standalone] {
        assert_eq!(controller_for(role, &config).role(), role);
    }
}

#[test]
fn standalone_starts_on_enable() {
    let mut sync = StandaloneSync;
    assert_eq!(sync.on_enable(), SyncVerdict::Start);
    assert!(sync.heralds_locally());
    assert_eq!(sync.on_tick(SyncPhase::Running, &Progress::default()), LinkLines::default());
}

#[test]
fn master_drives_trigger_for_the_hold_period_after_ready() {
    let mut master = MasterSync::new(&SyncConfig::default());
    assert_eq!(master.on_enable(), SyncVerdict::Continue);

    assert_eq!(master.on_partner_signal(SyncPhase::Armed, &LinkLines::default()), SyncVerdict::Continue);
    assert!(!master.on_tick(SyncPhase::Armed, &Progress::default()).trigger);

    assert_eq!(master.on_partner_signal(SyncPhase::Armed, &ready()), SyncVerdict::Continue);
    assert!(master.on_tick(SyncPhase::Armed, &Progress::default()).trigger);
    assert_eq!(master.on_partner_signal(SyncPhase::Armed, &ready()), SyncVerdict::Continue);
    assert!(master.on_tick(SyncPhase::Armed, &Progress::default()).trigger);

    assert_eq!(master.on_partner_signal(SyncPhase::Armed, &ready()), SyncVerdict::Start);
    assert!(!master.on_tick(SyncPhase::Running, &Progress::default()).trigger);
}

#[test]
fn master_publishes_marks_and_holds_its_outcome() {
    let mut master = MasterSync::new(&SyncConfig::default());
    let _ = master.on_enable();
    let boundary = Progress {
        n_cycles: 4,
        boundary: true,
        exit: None,
    };
    let lines = master.on_tick(SyncPhase::Running, &boundary);
    assert!(lines.cycle_mark);
    assert_eq!(lines.cycles, 4);

    let done = Progress {
        n_cycles: 5,
        boundary: true,
        exit: Some(ExitReason::Timeout(TimeoutCause::RunTime)),
    };
    assert!(master.on_tick(SyncPhase::Idle, &done).timeout);
    let held = master.on_tick(SyncPhase::Idle, &Progress { n_cycles: 5, ..Progress::default() });
    assert!(held.timeout);
    assert!(!held.success);
    assert!(!held.cycle_mark);

    let _ = master.on_enable();
    assert!(!master.on_tick(SyncPhase::Armed, &Progress::default()).timeout);
}

#[test]
fn master_tolerates_short_ready_gaps() {
    let config = SyncConfig::default();
    let mut master = MasterSync::new(&config);
    let _ = master.on_enable();
    for _ in 0..config.grace_ticks {
        assert_eq!(
            master.on_partner_signal(SyncPhase::Running, &LinkLines::default()),
            SyncVerdict::Continue
        );
    }
    assert_eq!(master.on_partner_signal(SyncPhase::Running, &ready()), SyncVerdict::Continue);
    for _ in 0..config.grace_ticks {
        assert_eq!(
            master.on_partner_signal(SyncPhase::Running, &LinkLines::default()),
            SyncVerdict::Continue
        );
    }
    assert_eq!(
        master.on_partner_signal(SyncPhase::Running, &LinkLines::default()),
        SyncVerdict::Exit {
            reason: ExitReason::Timeout(TimeoutCause::PartnerLost),
            cycles: Some(0),
        }
    );
}

#[test]
fn master_reports_the_count_held_when_ready_dropped() {
    let config = SyncConfig::default();
    let mut master = MasterSync::new(&config);
    let _ = master.on_enable();
    let at = |n_cycles| Progress {
        n_cycles,
        ..Progress::default()
    };

    assert_eq!(master.on_partner_signal(SyncPhase::Running, &ready()), SyncVerdict::Continue);
    let _ = master.on_tick(SyncPhase::Running, &at(3));
    assert!(master.heralds_locally());

    let low = LinkLines::default();
    assert_eq!(master.on_partner_signal(SyncPhase::Running, &low), SyncVerdict::Continue);
    assert!(!master.heralds_locally());
    let _ = master.on_tick(SyncPhase::Running, &at(4));

    let mut verdict = SyncVerdict::Continue;
    for _ in 0..config.grace_ticks {
        verdict = master.on_partner_signal(SyncPhase::Running, &low);
        let _ = master.on_tick(SyncPhase::Running, &at(4));
    }
    assert_eq!(
        verdict,
        SyncVerdict::Exit {
            reason: ExitReason::Timeout(TimeoutCause::PartnerLost),
            cycles: Some(3),
        }
    );
}

#[test]
fn slave_ignores_a_trigger_that_is_already_high() {
    let mut slave = SlaveSync::new(&SyncConfig::default());
    let _ = slave.on_enable();
    for _ in 0..10 {
        assert_eq!(slave.on_partner_signal(SyncPhase::Armed, &TRIGGER), SyncVerdict::Continue);
    }
    assert_eq!(slave.on_partner_signal(SyncPhase::Armed, &LinkLines::default()), SyncVerdict::Continue);
    assert_eq!(slave.on_partner_signal(SyncPhase::Armed, &TRIGGER), SyncVerdict::Continue);
    assert_eq!(slave.on_partner_signal(SyncPhase::Armed, &TRIGGER), SyncVerdict::Start);
}

#[test]
fn slave_rejects_a_single_tick_glitch() {
    let mut slave = SlaveSync::new(&SyncConfig::default());
    let _ = slave.on_enable();
    let low = LinkLines::default();
    for lines in [low, TRIGGER, low, TRIGGER, low] {
        assert_eq!(slave.on_partner_signal(SyncPhase::Armed, &lines), SyncVerdict::Continue);
    }
}

#[test]
fn slave_follows_master_outcome_and_count() {
    let mut slave = SlaveSync::new(&SyncConfig::default());
    assert!(!slave.heralds_locally());
    let _ = slave.on_enable();

    let mark = LinkLines {
        cycle_mark: true,
        cycles: 7,
        ..LinkLines::default()
    };
    assert_eq!(slave.on_partner_signal(SyncPhase::Running, &mark), SyncVerdict::AdoptCycles(7));

    let success = LinkLines {
        success: true,
        cycles: 8,
        ..LinkLines::default()
    };
    assert_eq!(
        slave.on_partner_signal(SyncPhase::Running, &success),
        SyncVerdict::Exit {
            reason: ExitReason::Heralded(None),
            cycles: Some(8),
        }
    );

    let timeout = LinkLines {
        timeout: true,
        cycles: 9,
        ..LinkLines::default()
    };
    assert_eq!(
        slave.on_partner_signal(SyncPhase::Running, &timeout),
        SyncVerdict::Exit {
            reason: ExitReason::Timeout(TimeoutCause::PartnerTimeout),
            cycles: Some(9),
        }
    );
}

#[test]
fn slave_drives_ready_while_active() {
    let mut slave = SlaveSync::new(&SyncConfig::default());
    assert!(slave.on_tick(SyncPhase::Armed, &Progress::default()).ready);
    assert!(slave.on_tick(SyncPhase::Running, &Progress::default()).ready);
    assert!(!slave.on_tick(SyncPhase::Idle, &Progress::default()).ready);
}

#[test]
fn slave_without_cycle_marks_reports_partner_lost() {
    let mut ctx = CoreBuilder::slave(10).build();
    ctx.run(10_000);
    let low = LinkLines::default();

    assert!(ctx.tick_linked(InputEdges::NONE, &low).exit.is_none());
    assert!(ctx.tick_linked(InputEdges::NONE, &TRIGGER).exit.is_none());
    assert!(ctx.tick_linked(InputEdges::NONE, &TRIGGER).exit.is_none());
    assert_eq!(ctx.core.sequencer().state(), RunState::Running);

    // First boundary after ten running ticks, then the grace period runs out.
    let mut exit = None;
    for _ in 0..30 {
        if let Some(e) = ctx.tick_linked(InputEdges::NONE, &low).exit {
            exit = Some(e);
            break;
        }
    }
    assert_eq!(exit, Some(ExitReason::Timeout(TimeoutCause::PartnerLost)));
    assert_eq!(ctx.now, 21);
}

#[test]
fn pair_starts_in_lock_step() {
    init_tracing();
    let master = CoreBuilder::master(50);
    let slave = CoreBuilder::slave(50);
    let mut pair = PairContext::new(Some(&master), Some(&slave));
    pair.run(Side::Master, 10_000);
    pair.run(Side::Slave, 10_000);

    let _ = pair.tick();
    let _ = pair.tick();
    assert!(pair.bed.link().to_slave().trigger);
    let _ = pair.tick();
    for side in Side::ALL {
        let seq = pair.bed.device(side).unwrap().core().sequencer();
        assert_eq!(seq.state(), RunState::Armed, "{side}");
    }

    let _ = pair.tick();
    for side in Side::ALL {
        let seq = pair.bed.device(side).unwrap().core().sequencer();
        assert_eq!(seq.state(), RunState::Running, "{side}");
        assert_eq!(seq.cycle_time(), 1, "{side}");
    }

    for _ in 0..237 {
        let _ = pair.tick();
        let m = pair.bed.device(Side::Master).unwrap().core().sequencer();
        let s = pair.bed.device(Side::Slave).unwrap().core().sequencer();
        assert_eq!(m.cycle_time(), s.cycle_time());
        assert_eq!(m.n_cycles(), s.n_cycles());
    }
}

#[test]
fn shorter_master_timeout_ends_both_cores() {
    let master = CoreBuilder::master(500);
    let slave = CoreBuilder::slave(500);
    let mut pair = PairContext::new(Some(&master), Some(&slave));
    pair.run(Side::Master, 1000);
    pair.run(Side::Slave, 2000);
    let _ = pair.run_until_idle(5000);

    assert_eq!(pair.exit(Side::Master), Some(ExitReason::Timeout(TimeoutCause::RunTime)));
    assert_eq!(
        pair.exit(Side::Slave),
        Some(ExitReason::Timeout(TimeoutCause::PartnerTimeout))
    );
    for side in Side::ALL {
        let status = pair.status(side);
        assert_eq!(status.n_cycles, 2, "{side}");
        assert!(status.timed_out, "{side}");
        assert!(!status.running, "{side}");
    }
}

#[test]
fn shorter_slave_timeout_leaves_both_cores_on_the_same_count() {
    let master = CoreBuilder::master(500);
    let slave = CoreBuilder::slave(500);
    let mut pair = PairContext::new(Some(&master), Some(&slave));
    pair.run(Side::Master, 2000);
    pair.run(Side::Slave, 995);
    let _ = pair.run_until_idle(5000);

    assert_eq!(pair.exit(Side::Slave), Some(ExitReason::Timeout(TimeoutCause::RunTime)));
    assert_eq!(
        pair.exit(Side::Master),
        Some(ExitReason::Timeout(TimeoutCause::PartnerLost))
    );
    for side in Side::ALL {
        let status = pair.status(side);
        assert_eq!(status.n_cycles, 1, "{side}");
        assert!(status.timed_out, "{side}");
    }
}

#[test]
fn slave_without_master_times_out_while_armed() {
    let slave = CoreBuilder::slave(100).output(1, 50);
    let mut pair = PairContext::new(None, Some(&slave));
    pair.run(Side::Slave, 1000);

    let mut finished_at = None;
    for tick in 1..=1100 {
        let events = pair.tick();
        assert!(!pair.bed.device(Side::Slave).unwrap().outputs().any());
        if events.slave_done {
            finished_at = Some(tick);
            break;
        }
    }
    assert_eq!(finished_at, Some(1000));
    assert_eq!(pair.exit(Side::Slave), Some(ExitReason::Timeout(TimeoutCause::ArmWait)));
    assert_eq!(pair.status(Side::Slave).n_cycles, 0);
}

#[test]
fn slave_ends_with_the_master_herald() {
    let master = CoreBuilder::master(100).gate(10, 20).herald(0b0001);
    let slave = CoreBuilder::slave(100).gate(10, 20).herald(0b0001);
    let mut pair = PairContext::new(Some(&master), Some(&slave));
    pair.run(Side::Master, 10_000);
    pair.run(Side::Slave, 10_000);

    // Lock-step start on the fourth tick, so tick 3 + 215 is cycle 2, time 15.
    let mut slave_matched_first = false;
    for tick in 0..400u64 {
        let events = pair.tick_with(|side| match (side, tick) {
            (Side::Master, 218) => InputEdges::on(&[0]),
            (Side::Slave, 118) => InputEdges::on(&[0]),
            _ => InputEdges::NONE,
        });
        if tick == 203 {
            // The slave saw its own match at the end of cycle 1 but kept running.
            let slave_seq = pair.bed.device(Side::Slave).unwrap().core().sequencer();
            slave_matched_first = slave_seq.last_match().is_some() && slave_seq.is_active();
        }
        if events.slave_done {
            break;
        }
    }
    assert!(slave_matched_first);

    assert!(matches!(pair.exit(Side::Master), Some(ExitReason::Heralded(Some(_)))));
    assert_eq!(pair.exit(Side::Slave), Some(ExitReason::Heralded(None)));
    let m = pair.status(Side::Master);
    let s = pair.status(Side::Slave);
    assert!(m.heralded && s.heralded);
    assert_eq!(m.n_cycles, 3);
    assert_eq!(s.n_cycles, 3);
    assert_eq!(m.run_result, 1);
}

#[test]
fn master_restart_resynchronizes_the_slave() {
    let master = CoreBuilder::master(100);
    let slave = CoreBuilder::slave(100);
    let mut pair = PairContext::new(Some(&master), Some(&slave));
    pair.run(Side::Master, 10_000);
    pair.run(Side::Slave, 10_000);
    for _ in 0..250 {
        let _ = pair.tick();
    }
    assert_eq!(pair.status(Side::Slave).n_cycles, 2);

    pair.run(Side::Master, 10_000);
    for _ in 0..3 {
        let _ = pair.tick();
    }
    for side in Side::ALL {
        let seq = pair.bed.device(side).unwrap().core().sequencer();
        assert_eq!(seq.state(), RunState::Running, "{side}");
        assert_eq!(seq.n_cycles(), 0, "{side}");
        assert_eq!(seq.cycle_time(), 1, "{side}");
    }
}

#[test]
fn master_times_out_when_the_slave_goes_away() {
    let master = CoreBuilder::master(100);
    let slave = CoreBuilder::slave(100);
    let mut pair = PairContext::new(Some(&master), Some(&slave));
    pair.run(Side::Master, 10_000);
    pair.run(Side::Slave, 10_000);
    for _ in 0..20 {
        let _ = pair.tick();
    }

    // Disabling the slave and writing Run refuses it, so ready drops.
    let config = addr(RegisterAddress::Config, pair.revision);
    assert!(pair.bed.write_register(Side::Slave, config, 0));
    pair.run(Side::Slave, 10_000);
    assert!(pair.status(Side::Slave).refused);

    let mut lost_after = None;
    for tick in 1..=30 {
        if pair.tick().master_done {
            lost_after = Some(tick);
            break;
        }
    }
    let lost_after = lost_after.unwrap();
    assert!(lost_after > SyncConfig::default().grace_ticks, "{lost_after}");
    assert_eq!(
        pair.exit(Side::Master),
        Some(ExitReason::Timeout(TimeoutCause::PartnerLost))
    );
}
