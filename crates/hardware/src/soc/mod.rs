//! Simulated hardware around the cores.
//!
//! This module organizes the components a core is embedded in: the
//! register-mapped device wrapper, the inter-core link, and the testbed that
//! clocks them together.

/// Register-mapped entangler device.
pub mod device;

/// Registered master/slave link.
pub mod link;

/// Two-core testbed.
pub mod testbed;

/// Device trait definitions for register access.
pub mod traits;

pub use device::EntanglerDevice;
pub use testbed::{Side, Testbed};
