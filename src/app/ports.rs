//! Port traits: the seams between the coordinator core and its radio,
//! host link and flash.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Coordinator (domain)
//! ```
//!
//! Driven adapters (mesh radio, host link, storage) implement these
//! traits.  The [`Coordinator`](super::service::Coordinator) consumes them
//! via generics, so the domain core never touches a radio or a UART
//! directly and every component can run against test doubles.
//!
//! ## Contract notes
//!
//! - **MeshTransport** calls only *submit* work.  Results arrive later as
//!   [`MeshEvent`](crate::events::MeshEvent)s through the event queue.
//!   Never call a transport method from interrupt context.
//! - **HostSink** is fire-and-forget: it must not block and may drop.
//! - **ConfigPort** rejects invalid values on both save and load.

use core::fmt;

use crate::config::SystemConfig;
use crate::mesh::{
    BindingEntry, Destination, Eui64, MeshStatus, NetworkConfig, NetworkState, NodeId,
    OutgoingCommand,
};

use super::events::HostFrame;

// ───────────────────────────────────────────────────────────────
// Mesh transport port (driven adapter: domain ↔ radio stack)
// ───────────────────────────────────────────────────────────────

/// The mesh networking service.
pub trait MeshTransport {
    /// Current membership state.
    fn network_state(&self) -> NetworkState;

    /// Our own short address.
    fn node_id(&self) -> NodeId;

    /// Our own hardware identifier.
    fn eui64(&self) -> Eui64;

    /// Parameters of the network we are in, if any.
    fn network_params(&self) -> Option<NetworkConfig>;

    /// Submit a unicast.  `Ok` means accepted for transmission; the
    /// delivery result comes later as a send-complete event.
    fn send_unicast(
        &mut self,
        destination: Destination,
        command: &OutgoingCommand,
    ) -> Result<(), MeshStatus>;

    /// Start forming a network.  Success is reported by a network-up event.
    fn form_network(&mut self, config: &NetworkConfig) -> Result<(), MeshStatus>;

    /// Start leaving the current network.  Completion is a network-down event.
    fn leave_network(&mut self) -> Result<(), MeshStatus>;

    /// Write a unicast binding-table entry.
    fn set_binding(&mut self, index: u8, entry: &BindingEntry) -> Result<(), MeshStatus>;

    /// Update the cached short address of a binding slot.
    fn set_binding_remote_node(&mut self, index: u8, node_id: NodeId) -> Result<(), MeshStatus>;

    /// Permit new devices to join.
    fn open_join_window(&mut self) -> Result<(), MeshStatus>;

    /// Stop permitting joins.
    fn close_join_window(&mut self) -> Result<(), MeshStatus>;
}

// ───────────────────────────────────────────────────────────────
// Host sink port (driven adapter: domain → host line protocol)
// ───────────────────────────────────────────────────────────────

/// The only output channel to the host.  Adapters decide where frames go
/// (UART, stdout, a test recorder).
pub trait HostSink {
    fn emit(&mut self, frame: &HostFrame);
}

// ───────────────────────────────────────────────────────────────
// Persistence ports (driven adapters: domain ↔ flash)
// ───────────────────────────────────────────────────────────────

/// Keeps the runtime-tunable configuration across restarts.
///
/// `save` refuses out-of-range values with [`ConfigError::Invalid`]
/// instead of clamping them; `load` applies the same rules to what it
/// reads back.
pub trait ConfigPort {
    /// The stored configuration, or [`SystemConfig::default()`] when
    /// nothing has been saved yet.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

/// Blob store addressed by `(namespace, key)`.
pub trait StoragePort {
    /// Copy the blob into `buf` (truncated to `buf.len()`) and return the
    /// number of bytes copied.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Replace the blob in one step; readers never see a partial value.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The stored blob does not decode as a configuration.
    Corrupted,
    /// A field broke a range rule.  Carries the rule.
    Invalid(&'static str),
    /// The encoded configuration does not fit in one blob.
    TooLarge,
    /// The backing store failed.
    Storage(StorageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    NotFound,
    /// No room left for the blob.
    Full,
    /// The backing store (flash driver or filesystem) failed.
    Backend,
}

impl From<StorageError> for ConfigError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupted => write!(f, "stored config does not decode"),
            Self::Invalid(rule) => write!(f, "invalid config: {rule}"),
            Self::TooLarge => write!(f, "config blob too large"),
            Self::Storage(e) => write!(f, "storage: {e}"),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "no such key"),
            Self::Full => write!(f, "no space for blob"),
            Self::Backend => write!(f, "storage backend error"),
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for StorageError {}
