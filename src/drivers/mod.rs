//! Interrupt-facing peripheral helpers.

pub mod button;
