//! Mesh network vocabulary.
//!
//! Addresses, hardware identifiers, status codes and outgoing command
//! descriptors exchanged with the mesh transport.  The transport itself
//! lives outside this crate (see [`MeshTransport`](crate::app::ports::MeshTransport));
//! these types carry only what the coordinator reasons about.

use core::fmt;

use serde::{Deserialize, Serialize, Serializer};

// ── Clusters, attributes, endpoints ───────────────────────────

/// Power configuration cluster (battery reports).
pub const CLUSTER_POWER_CONFIG: u16 = 0x0001;
/// On/off cluster (valve commands).
pub const CLUSTER_ON_OFF: u16 = 0x0006;
/// Flow measurement cluster.
pub const CLUSTER_FLOW_MEASUREMENT: u16 = 0x0404;

pub const ATTR_FLOW_MEASURED_VALUE: u16 = 0x0000;
pub const ATTR_BATTERY_PERCENT_REMAINING: u16 = 0x0021;

/// Unsigned 8-bit attribute type tag.
pub const TYPE_UINT8: u8 = 0x20;
/// Unsigned 16-bit attribute type tag.
pub const TYPE_UINT16: u8 = 0x21;

/// On/off cluster command identifiers.
pub const CMD_OFF: u8 = 0x00;
pub const CMD_ON: u8 = 0x01;

/// Local endpoint receiving sensor reports.
pub const ENDPOINT_TELEMETRY: u8 = 1;
/// Local endpoint used as the source of valve commands.
pub const ENDPOINT_CONTROL: u8 = 2;
/// Valve endpoint assumed when the host does not name one.
pub const VALVE_ENDPOINT_DEFAULT: u8 = 1;

/// Valid radio channel range (2.4 GHz band).
pub const CHANNEL_MIN: u8 = 11;
pub const CHANNEL_MAX: u8 = 26;

// ── NodeId ────────────────────────────────────────────────────

/// Short (16-bit) network address.  Changes when a device rejoins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u16);

impl NodeId {
    /// Coordinators always own address 0x0000.
    pub const COORDINATOR: Self = Self(0x0000);
    /// Reserved "no address" value used on the wire.
    pub const NULL: Self = Self(0xFFFF);
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

// ── Eui64 ─────────────────────────────────────────────────────

/// Stable 64-bit hardware identifier, stored in human (big-endian) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Eui64(pub [u8; 8]);

impl Eui64 {
    pub const ZERO: Self = Self([0; 8]);

    /// Parse 16 hex digits.  Separators (`:`, `-`, spaces) and an optional
    /// `0x` prefix are ignored; any other digit count is rejected.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let s = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);

        let mut out = [0u8; 8];
        let mut nibbles = 0usize;
        for c in s.chars() {
            if matches!(c, ':' | '-' | ' ') {
                continue;
            }
            let v = c.to_digit(16)? as u8;
            if nibbles >= 16 {
                return None;
            }
            let byte = &mut out[nibbles / 2];
            *byte = (*byte << 4) | v;
            nibbles += 1;
        }
        (nibbles == 16).then_some(Self(out))
    }
}

impl fmt::Display for Eui64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02X}")?;
        }
        Ok(())
    }
}

impl Serialize for Eui64 {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

// ── MeshStatus ────────────────────────────────────────────────

/// Raw transport status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshStatus(pub u8);

impl MeshStatus {
    pub const SUCCESS: Self = Self(0x00);
    pub const NO_BUFFERS: Self = Self(0x18);
    pub const DELIVERY_FAILED: Self = Self(0x66);
    pub const INVALID_CALL: Self = Self(0x70);
    pub const NOT_JOINED: Self = Self(0x93);
    pub const NETWORK_BUSY: Self = Self(0xA1);

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }
}

impl fmt::Display for MeshStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

impl Serialize for MeshStatus {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

// ── Network state & configuration ─────────────────────────────

/// Membership state as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NetworkState {
    NoNetwork = 0,
    Joining = 1,
    Joined = 2,
    Leaving = 4,
}

impl NetworkState {
    /// Numeric code reported in status snapshots.
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// PAN identifier, radio channel and transmit power.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub pan_id: u16,
    pub channel: u8,
    pub tx_power_dbm: i8,
}

impl NetworkConfig {
    pub const DEFAULT_PAN_ID: u16 = 0xBEEF;
    pub const DEFAULT_CHANNEL: u8 = 11;
    pub const DEFAULT_TX_POWER_DBM: i8 = 8;

    pub fn channel_valid(channel: u8) -> bool {
        (CHANNEL_MIN..=CHANNEL_MAX).contains(&channel)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            pan_id: Self::DEFAULT_PAN_ID,
            channel: Self::DEFAULT_CHANNEL,
            tx_power_dbm: Self::DEFAULT_TX_POWER_DBM,
        }
    }
}

// ── Addressing ────────────────────────────────────────────────

/// How a unicast is resolved to a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Send straight to a known short address.
    Direct(NodeId),
    /// Resolve through the binding table slot at send time.
    Binding(u8),
}

impl Destination {
    pub fn path_str(self) -> &'static str {
        match self {
            Self::Direct(_) => "direct",
            Self::Binding(_) => "binding",
        }
    }

    /// Address or binding index rendered the way log frames expect.
    pub fn target_hex(self) -> NodeId {
        match self {
            Self::Direct(node) => node,
            Self::Binding(index) => NodeId(u16::from(index)),
        }
    }
}

/// A cluster command handed to the transport for unicast delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutgoingCommand {
    pub cluster: u16,
    pub source_endpoint: u8,
    pub destination_endpoint: u8,
    pub command_id: u8,
}

/// Unicast binding-table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingEntry {
    pub local_endpoint: u8,
    pub remote_endpoint: u8,
    pub cluster: u16,
    pub remote_eui64: Eui64,
}
