//! Bit-field helpers for packing and unpacking 32-bit register words.

/// Returns a mask with the low `width` bits set.
#[inline]
pub const fn mask(width: u32) -> u32 {
    if width >= 32 { u32::MAX } else { (1 << width) - 1 }
}

/// Extracts the `width`-bit field starting at bit `lsb`.
#[inline]
pub const fn field(word: u32, lsb: u32, width: u32) -> u32 {
    (word >> lsb) & mask(width)
}

/// Returns `word` with the `width`-bit field at `lsb` replaced by `value`.
///
/// Bits of `value` above `width` are discarded.
#[inline]
pub const fn insert(word: u32, lsb: u32, width: u32, value: u32) -> u32 {
    let m = mask(width) << lsb;
    (word & !m) | ((value << lsb) & m)
}

/// Tests a single bit.
#[inline]
pub const fn bit(word: u32, index: u32) -> bool {
    (word >> index) & 1 != 0
}
