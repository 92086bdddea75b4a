//! Stimulus Unit Tests.

use entangler_core::common::error::ConfigError;
use entangler_core::core::sampler::InputEdges;
use entangler_core::sim::stimulus::{EdgeSpec, Stimulus, Target};
use entangler_core::soc::testbed::Side;
use pretty_assertions::assert_eq;
use rstest::rstest;

#[rstest]
#[case(Target::Both, Side::Master, true)]
#[case(Target::Both, Side::Slave, true)]
#[case(Target::Master, Side::Master, true)]
#[case(Target::Master, Side::Slave, false)]
#[case(Target::Slave, Side::Master, false)]
#[case(Target::Slave, Side::Slave, true)]
fn target_selects_sides(#[case] target: Target, #[case] side: Side, #[case] expected: bool) {
    assert_eq!(target.includes(side), expected);
}

#[test]
fn single_edges_fire_on_their_tick_only() {
    let stimulus = Stimulus::new(vec![EdgeSpec::At {
        tick: 7,
        channel: 2,
        target: Target::Master,
    }]);
    assert_eq!(stimulus.edges_at(7, Side::Master), InputEdges::on(&[2]));
    assert_eq!(stimulus.edges_at(7, Side::Slave), InputEdges::NONE);
    assert_eq!(stimulus.edges_at(6, Side::Master), InputEdges::NONE);
    assert_eq!(stimulus.edges_at(8, Side::Master), InputEdges::NONE);
}

#[test]
fn periodic_edges_respect_start_and_count() {
    let stimulus = Stimulus::new(vec![EdgeSpec::Periodic {
        start: 5,
        period: 10,
        count: Some(3),
        channel: 4,
        target: Target::Both,
    }]);
    let fired: Vec<u64> = (0..100)
        .filter(|&t| stimulus.edges_at(t, Side::Slave) != InputEdges::NONE)
        .collect();
    assert_eq!(fired, [5, 15, 25]);
}

#[test]
fn unbounded_periodic_edges_keep_firing() {
    let mut stimulus = Stimulus::default();
    stimulus.push(EdgeSpec::Periodic {
        start: 0,
        period: 100,
        count: None,
        channel: 4,
        target: Target::Both,
    });
    assert!(stimulus.edges_at(1_000_000, Side::Master).rose(4));
    assert!(!stimulus.edges_at(1_000_001, Side::Master).rose(4));
}

#[test]
fn coincident_edges_merge() {
    let stimulus = Stimulus::new(vec![
        EdgeSpec::At {
            tick: 3,
            channel: 0,
            target: Target::Both,
        },
        EdgeSpec::At {
            tick: 3,
            channel: 1,
            target: Target::Both,
        },
    ]);
    assert_eq!(stimulus.edges_at(3, Side::Master), InputEdges::on(&[0, 1]));
    assert_eq!(stimulus.edges().len(), 2);
}

#[test]
fn parses_tagged_json() {
    let json = r#"[
        { "kind": "at", "tick": 12, "channel": 1 },
        { "kind": "periodic", "start": 0, "period": 50, "channel": 4, "target": "slave" }
    ]"#;
    let stimulus: Stimulus = serde_json::from_str(json).unwrap();
    assert_eq!(
        stimulus.edges(),
        [
            EdgeSpec::At {
                tick: 12,
                channel: 1,
                target: Target::Both,
            },
            EdgeSpec::Periodic {
                start: 0,
                period: 50,
                count: None,
                channel: 4,
                target: Target::Slave,
            },
        ]
    );
}

#[test]
fn validation_rejects_bad_sources() {
    let bad_channel = Stimulus::new(vec![EdgeSpec::At {
        tick: 0,
        channel: 5,
        target: Target::Both,
    }]);
    assert_eq!(bad_channel.validate(), Err(ConfigError::StimulusChannel(5)));

    let zero_period = Stimulus::new(vec![EdgeSpec::Periodic {
        start: 0,
        period: 0,
        count: None,
        channel: 0,
        target: Target::Both,
    }]);
    assert_eq!(zero_period.validate(), Err(ConfigError::StimulusPeriod));
    assert_eq!(zero_period.edges_at(0, Side::Master), InputEdges::NONE);

    assert_eq!(Stimulus::default().validate(), Ok(()));
}
