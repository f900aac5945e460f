//! WFMS coordinator library.
//!
//! Exposes the pure-logic modules (dispatch, valve control, network
//! lifecycle, telemetry ingest) for integration testing and for the host
//! simulator binary.  Everything that touches a radio or a serial port sits
//! behind the port traits in [`app::ports`].

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod control;
pub mod events;
pub mod mesh;
pub mod network;
pub mod rpc;
pub mod sensors;

pub mod error;

pub mod adapters;
pub mod drivers;
