//! Outbound host frames.
//!
//! The [`Coordinator`](super::service::Coordinator) emits these through the
//! [`HostSink`](super::ports::HostSink) port.  Each renders as one line:
//!
//! ```text
//! @DATA {...telemetry snapshot...}
//! @INFO {...status snapshot...}
//! @ACK  {"id":..,"ok":..,"msg":"..",..}
//! @LOG  {"tag":"..","event":"..",..fields}
//! ```

use core::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::control::policy::ControlMode;
use crate::control::valve::{ValvePath, ValveState};
use crate::mesh::{Eui64, MeshStatus, NodeId};
use crate::rpc::guard::CommandId;

/// Longest acknowledgment text, in bytes.
pub const ACK_MESSAGE_MAX: usize = 64;

/// Fixed-capacity acknowledgment text.
pub type AckMessage = heapless::String<ACK_MESSAGE_MAX>;

/// Render `text` into an [`AckMessage`], truncating at a char boundary if
/// it does not fit.
pub fn ack_message(text: impl fmt::Display) -> AckMessage {
    let text = text.to_string();
    let mut end = text.len().min(ACK_MESSAGE_MAX);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let mut msg = AckMessage::new();
    // Cannot fail: `end` is within capacity.
    let _ = msg.push_str(&text[..end]);
    msg
}

/// Frames the coordinator sends to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum HostFrame {
    /// Telemetry snapshot.
    Data(DataFrame),
    /// Status snapshot.
    Info(InfoFrame),
    /// Reply to a host command.
    Ack(AckFrame),
    /// Internally originated action or diagnostic.
    Log(LogFrame),
}

impl HostFrame {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Data(_) => "@DATA",
            Self::Info(_) => "@INFO",
            Self::Ack(_) => "@ACK",
            Self::Log(_) => "@LOG",
        }
    }

    /// Render as a single protocol line, without terminator.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let body = match self {
            Self::Data(d) => serde_json::to_string(d)?,
            Self::Info(i) => serde_json::to_string(i)?,
            Self::Ack(a) => serde_json::to_string(a)?,
            Self::Log(l) => serde_json::to_string(l)?,
        };
        Ok(format!("{} {}", self.prefix(), body))
    }
}

// ── Telemetry snapshot ────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataFrame {
    pub flow: u16,
    pub valve: ValveState,
    pub battery: u8,
    pub mode: ControlMode,
    pub tx_pending: bool,
    pub valve_path: ValvePath,
    #[serde(serialize_with = "node_or_null")]
    pub valve_node_id: Option<NodeId>,
    pub valve_known: bool,
}

// ── Status snapshot ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InfoFrame {
    pub node_id: NodeId,
    pub eui64: Eui64,
    #[serde(serialize_with = "hex16")]
    pub pan_id: u16,
    pub ch: u8,
    pub tx_power: i8,
    pub net_state: u8,
    pub join_open: bool,
    pub uart_gateway: bool,
    pub mode: ControlMode,
    pub valve_path: ValvePath,
    pub valve_known: bool,
    pub valve_eui64: Eui64,
    #[serde(serialize_with = "node_or_null")]
    pub valve_node_id: Option<NodeId>,
    pub bind_index: u8,
    pub uptime_s: u32,
}

// ── Acknowledgment ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AckFrame {
    pub id: CommandId,
    pub ok: bool,
    pub msg: AckMessage,
    pub mode: ControlMode,
    pub valve: ValveState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zstatus: Option<MeshStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<&'static str>,
}

// ── Log event ─────────────────────────────────────────────────

/// Category + event name + ordered structured fields.
#[derive(Debug, Clone, PartialEq)]
pub struct LogFrame {
    pub tag: &'static str,
    pub event: &'static str,
    pub fields: Vec<(&'static str, Value)>,
}

impl LogFrame {
    pub fn new(tag: &'static str, event: &'static str) -> Self {
        Self {
            tag,
            event,
            fields: Vec::new(),
        }
    }

    /// Append a field.
    #[must_use]
    pub fn with(mut self, key: &'static str, value: impl Into<Value>) -> Self {
        self.fields.push((key, value.into()));
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }
}

impl Serialize for LogFrame {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(2 + self.fields.len()))?;
        map.serialize_entry("tag", self.tag)?;
        map.serialize_entry("event", self.event)?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

// ── Serde helpers ─────────────────────────────────────────────

#[allow(clippy::ref_option)]
fn node_or_null<S: Serializer>(node: &Option<NodeId>, s: S) -> Result<S::Ok, S::Error> {
    node.unwrap_or(NodeId::NULL).serialize(s)
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn hex16<S: Serializer>(v: &u16, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(&format_args!("0x{v:04X}"))
}
