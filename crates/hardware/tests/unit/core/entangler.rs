//! Entangler Core Unit Tests.
//!
//! Covers the register boundary of a single core: error propagation, the
//! status image after Run writes and ticks, and the cached output and link
//! state.

use entangler_core::common::error::RegisterError;
use entangler_core::config::{Config, ProtocolRevision};
use entangler_core::core::EntanglerCore;
use entangler_core::core::registers::{Fault, RegisterAddress};
use entangler_core::core::sampler::InputEdges;
use entangler_core::core::sync::LinkLines;
use pretty_assertions::assert_eq;

use crate::common::harness::CoreBuilder;

#[test]
fn fresh_core_reads_idle() {
    let core = EntanglerCore::new(&Config::default());
    assert_eq!(core.read(0x10), Ok(0));
    assert_eq!(core.read(0x11), Ok(0));
    assert_eq!(core.read(0x14), Ok(0));
    assert!(!core.outputs().any());
    assert_eq!(core.link(), LinkLines::default());
}

#[test]
fn invalid_accesses_are_reported_and_change_nothing() {
    let mut core = EntanglerCore::new(&Config::default());
    assert_eq!(core.write(0x40, 1), Err(RegisterError::OutOfRange(0x40)));
    assert_eq!(core.write(0x12, 1), Err(RegisterError::ReadOnly(0x12)));
    assert_eq!(core.read(0x02), Err(RegisterError::WriteOnly(0x02)));
    assert_eq!(core.read(0x05), Err(RegisterError::Unmapped(0x05)));
    assert_eq!(core.status().status_word(), 0);
}

#[test]
fn output_count_follows_the_revision() {
    let standard = EntanglerCore::new(&Config::default());
    assert_eq!(standard.outputs().as_slice().len(), 3);

    let mut config = Config::default();
    config.protocol.revision = ProtocolRevision::Extended;
    let extended = EntanglerCore::new(&config);
    assert_eq!(extended.outputs().as_slice().len(), 4);
}

#[test]
fn extended_revision_drives_the_fourth_output() {
    let mut ctx = CoreBuilder::standalone(10)
        .revision(ProtocolRevision::Extended)
        .output(0, 0)
        .output(0, 0)
        .output(0, 0)
        .output(2, 4)
        .build();
    ctx.run(100);
    let outs = ctx.tick_n(5);
    assert_eq!(outs.iter().map(|o| o.outputs.mask()).collect::<Vec<_>>(), [0, 0, 0b1000, 0b1000, 0]);
    assert_eq!(ctx.core.outputs().mask(), 0);
}

#[test]
fn legacy_revision_uses_interleaved_heralds() {
    let mut ctx = CoreBuilder::standalone(10)
        .revision(ProtocolRevision::Legacy)
        .gate(1, 9)
        .gate(1, 9)
        .herald(0b0010)
        .build();
    ctx.run(100);
    let (tick, _) = ctx.run_to_exit(100, |t| {
        if t == 3 { InputEdges::on(&[1]) } else { InputEdges::NONE }
    });
    assert_eq!(tick, 10);
    assert!(ctx.status().heralded);
    assert_eq!(ctx.read(RegisterAddress::RunResult), 1);
}

#[test]
fn status_is_published_on_every_tick() {
    let mut ctx = CoreBuilder::standalone(4).build();
    ctx.run(100);
    for expected in 1..=3u16 {
        let _ = ctx.tick_n(4);
        assert_eq!(ctx.read(RegisterAddress::NCycles), u32::from(expected));
    }
    assert_eq!(ctx.read(RegisterAddress::TimeRemaining), 88);
}

#[test]
fn refusal_publishes_fault_and_clears_counters() {
    let mut ctx = CoreBuilder::standalone(10).build();
    ctx.run(1000);
    let _ = ctx.tick_n(35);
    assert_eq!(ctx.read(RegisterAddress::NCycles), 3);

    ctx.write(RegisterAddress::Config, 0);
    ctx.run(1000);
    assert_eq!(ctx.read(RegisterAddress::Status), 0b1000);
    assert_eq!(ctx.read(RegisterAddress::NCycles), 0);
    assert_eq!(ctx.read(RegisterAddress::Fault), Fault::NotEnabled.code());
    assert_eq!(ctx.read(RegisterAddress::TimeRemaining), 0);
}

#[test]
fn standalone_core_drives_no_link_lines() {
    let mut ctx = CoreBuilder::standalone(5).build();
    ctx.run(20);
    assert!(ctx.tick_n(20).iter().all(|o| o.link == LinkLines::default()));
}

#[test]
fn master_link_reflects_the_last_tick() {
    let mut ctx = CoreBuilder::master(5).build();
    ctx.run(100);
    let ready = LinkLines {
        ready: true,
        ..LinkLines::default()
    };
    let _ = ctx.tick_linked(InputEdges::NONE, &ready);
    assert!(ctx.core.link().trigger);
}
