//! Device trait for register-mapped peripherals.
//!
//! This module defines the `Device` trait implemented by every bus-attached
//! component of the testbed. It provides:
//! 1. **Identification:** `name` and `address_range` for routing and logs.
//! 2. **Access:** 32-bit register reads and writes at device-relative byte offsets.
//! 3. **Lifecycle:** An optional `tick` that reports when the device raised its done strobe.
//!
//! All implementors must be `Send + Sync` so a testbed can be moved to a worker thread.

/// Trait for register-mapped devices driven by the testbed clock.
///
/// Accesses never fail: an access the device cannot decode is dropped (writes)
/// or reads as zero, as on a real register bus.
pub trait Device: Send + Sync {
    /// Returns a short name for this device (e.g., `"MASTER"`).
    fn name(&self) -> &str;
    /// Returns (base_address, size_in_bytes) of this device's register window.
    fn address_range(&self) -> (u64, u64);
    /// Reads four bytes at the given device-relative offset.
    fn read_u32(&mut self, offset: u64) -> u32;
    /// Writes four bytes at the given device-relative offset.
    fn write_u32(&mut self, offset: u64, val: u32);

    /// Advances device state by one tick; returns `true` on the tick the device
    /// signals completion.
    fn tick(&mut self) -> bool {
        false
    }
}
