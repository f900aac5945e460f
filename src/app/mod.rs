//! Application core: pure domain logic, zero I/O.
//!
//! This module contains the business rules for the coordinator: host
//! command handling, valve control, network lifecycle and telemetry
//! reporting.  All interaction with the radio and the host link happens
//! through **port traits** defined in [`ports`], keeping this layer fully
//! testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
