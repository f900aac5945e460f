//! System configuration parameters
//!
//! All tunable parameters for the coordinator.
//! Values can be overridden at runtime by host commands and persisted
//! through the [`ConfigPort`](crate::app::ports::ConfigPort).

use serde::{Deserialize, Serialize};

use crate::control::policy::Thresholds;
use crate::mesh::NetworkConfig;

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Network ---
    /// PAN id, channel and transmit power used when forming
    pub network: NetworkConfig,

    // --- Auto control ---
    /// Flow thresholds for the hysteresis policy
    pub thresholds: Thresholds,

    // --- Host command guard ---
    /// Window in which a repeated command id is dropped (milliseconds)
    pub dedup_window_ms: u32,
    /// Minimum spacing between commands of one debounced class (milliseconds)
    pub debounce_ms: u32,

    // --- Mesh ---
    /// How long the join window stays open after formation (milliseconds)
    pub join_window_ms: u32,
    /// In-flight valve command timeout (milliseconds, 0 = wait forever)
    pub command_timeout_ms: u32,

    // --- Reporting ---
    /// Change-gated telemetry check interval (milliseconds)
    pub data_check_interval_ms: u32,
    /// Unconditional telemetry interval (milliseconds)
    pub data_force_interval_ms: u32,
    /// Status heartbeat interval (milliseconds)
    pub heartbeat_interval_ms: u32,

    // --- Timing ---
    /// Main loop period (milliseconds)
    pub tick_interval_ms: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            thresholds: Thresholds::default(),

            // Guard
            dedup_window_ms: 2_000,
            debounce_ms: 500,

            // Mesh
            join_window_ms: 180_000, // 3 min
            command_timeout_ms: 10_000,

            // Reporting
            data_check_interval_ms: 5_000,
            data_force_interval_ms: 30_000,
            heartbeat_interval_ms: 30_000,

            // Timing
            tick_interval_ms: 50, // 20 Hz
        }
    }
}
