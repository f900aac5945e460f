//! Valve control: the single-flight command controller and the hysteresis
//! auto-control policy.

pub mod policy;
pub mod valve;
