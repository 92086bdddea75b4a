//! Herald Matcher Unit Tests.
//!
//! Verifies exact pattern equality, skipping of disabled slots and lowest-index
//! priority with the full match bitfield.

use entangler_core::core::herald::{HeraldMatch, HeraldMatcher};
use entangler_core::core::registers::{HeraldPattern, HeraldSet};
use proptest::prelude::*;

#[test]
fn matches_exact_pattern_only() {
    let m = HeraldMatcher::new(HeraldSet::from_patterns(&[0b0011]));
    assert_eq!(m.check(0b0011), Some(HeraldMatch { index: 0, matches: 0b0001 }));
    assert_eq!(m.check(0b0111), None);
    assert_eq!(m.check(0b0001), None);
}

#[test]
fn lowest_enabled_index_is_reported() {
    let m = HeraldMatcher::new(HeraldSet::from_patterns(&[0b1000, 0b0101, 0b1010, 0b0101]));
    let hit = m.check(0b0101).unwrap();
    assert_eq!(hit.index, 1);
    assert_eq!(hit.matches, 0b1010);
}

#[test]
fn disabled_slots_never_match() {
    let mut set = HeraldSet::default();
    set.slots[0] = HeraldPattern {
        pattern: 0,
        enabled: false,
    };
    set.slots[2] = HeraldPattern::enabled(0b0110);
    let m = HeraldMatcher::new(set);
    // An empty cycle must not match the zeroed, disabled slots.
    assert_eq!(m.check(0), None);
    assert_eq!(m.check(0b0110).map(|h| h.index), Some(2));
}

#[test]
fn enabled_zero_pattern_heralds_an_empty_cycle() {
    let m = HeraldMatcher::new(HeraldSet::from_patterns(&[0]));
    assert!(m.check(0).is_some());
}

#[test]
fn empty_set_never_matches() {
    let m = HeraldMatcher::default();
    assert!((0..16).all(|p| m.check(p).is_none()));
    assert_eq!(m.heralds().enabled_count(), 0);
}

proptest! {
    #[test]
    fn reported_index_is_lowest_set_bit(patterns in proptest::collection::vec(0u8..16, 1..=4), sampled in 0u8..16) {
        let m = HeraldMatcher::new(HeraldSet::from_patterns(&patterns));
        let expected: Vec<usize> = patterns.iter().enumerate().filter(|(_, p)| **p == sampled).map(|(i, _)| i).collect();
        match m.check(sampled) {
            Some(hit) => {
                prop_assert_eq!(Some(&hit.index), expected.first());
                prop_assert_eq!(hit.matches.count_ones() as usize, expected.len());
            }
            None => prop_assert!(expected.is_empty()),
        }
    }
}
