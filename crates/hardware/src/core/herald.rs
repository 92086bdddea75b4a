//! Herald matcher.
//!
//! Compares the 4-bit pattern sampled over a cycle against every enabled herald
//! slot. A slot matches on exact equality, so a pattern of `0b0000` heralds a
//! cycle in which no gate fired; disabled slots are skipped entirely.

use serde::Serialize;

use crate::core::registers::HeraldSet;

/// Outcome of a successful match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeraldMatch {
    /// Lowest enabled slot that matched.
    pub index: usize,
    /// Bit `i` set for every enabled slot `i` that matched.
    pub matches: u8,
}

/// Matcher bound to the herald set snapshotted at sequence start.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeraldMatcher {
    heralds: HeraldSet,
}

impl HeraldMatcher {
    /// Creates a matcher for the given slots.
    pub const fn new(heralds: HeraldSet) -> Self {
        Self { heralds }
    }

    /// Checks a sampled pattern against the enabled slots.
    pub fn check(&self, sampled: u8) -> Option<HeraldMatch> {
        let matches = self
            .heralds
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.enabled && slot.pattern == sampled & 0xF)
            .fold(0u8, |acc, (i, _)| acc | 1 << i);

        (matches != 0).then(|| HeraldMatch {
            index: matches.trailing_zeros() as usize,
            matches,
        })
    }

    /// Slots this matcher evaluates.
    pub const fn heralds(&self) -> &HeraldSet {
        &self.heralds
    }
}
