//! Inbound commands to the coordinator.
//!
//! These represent actions requested by the host over the line protocol
//! that the [`Coordinator`](super::service::Coordinator) interprets and
//! acts upon.  Field extraction and validation that does not depend on
//! current state happens here; state-dependent checks (mode gating,
//! network membership, threshold merge) stay in the service.

use crate::control::policy::ControlMode;
use crate::control::valve::ValvePath;
use crate::error::CommandError;
use crate::mesh::{BindingEntry, Eui64, NetworkConfig, NodeId, VALVE_ENDPOINT_DEFAULT};
use crate::rpc::fields::CommandFields;
use crate::rpc::guard::DebounceClass;

/// Operation names understood by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Info,
    ValveSet,
    ModeSet,
    ThresholdSet,
    ValvePathSet,
    ValveTargetSet,
    ValvePair,
    BindSet,
    NetCfgSet,
    NetForm,
    GatewaySet,
}

impl Op {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "info" => Self::Info,
            "valve_set" => Self::ValveSet,
            "mode_set" => Self::ModeSet,
            "threshold_set" => Self::ThresholdSet,
            "valve_path_set" => Self::ValvePathSet,
            "valve_target_set" => Self::ValveTargetSet,
            "valve_pair" => Self::ValvePair,
            "bind_set" => Self::BindSet,
            "net_cfg_set" => Self::NetCfgSet,
            "net_form" => Self::NetForm,
            "uart_gateway_set" => Self::GatewaySet,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::ValveSet => "valve_set",
            Self::ModeSet => "mode_set",
            Self::ThresholdSet => "threshold_set",
            Self::ValvePathSet => "valve_path_set",
            Self::ValveTargetSet => "valve_target_set",
            Self::ValvePair => "valve_pair",
            Self::BindSet => "bind_set",
            Self::NetCfgSet => "net_cfg_set",
            Self::NetForm => "net_form",
            Self::GatewaySet => "uart_gateway_set",
        }
    }

    /// Debounce class, for operations that have one.
    pub fn debounce_class(self) -> Option<DebounceClass> {
        match self {
            Self::ModeSet => Some(DebounceClass::ModeSet),
            Self::ValveSet => Some(DebounceClass::ValveSet),
            _ => None,
        }
    }
}

/// Optional network parameters merged over the current configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetworkPatch {
    pub pan_id: Option<u64>,
    pub channel: Option<u64>,
    pub tx_power: Option<i64>,
}

impl NetworkPatch {
    fn from_fields(f: &CommandFields) -> Self {
        Self {
            pan_id: f.uint("pan_id"),
            channel: f.uint("ch"),
            tx_power: f.int("tx_power"),
        }
    }

    /// Overlay the supplied fields on `base`, validating each.
    pub fn apply(&self, base: &NetworkConfig) -> Result<NetworkConfig, CommandError> {
        let channel = match self.channel {
            Some(ch) => u8::try_from(ch)
                .ok()
                .filter(|ch| NetworkConfig::channel_valid(*ch))
                .ok_or(CommandError::Invalid("bad channel"))?,
            None => base.channel,
        };
        let pan_id = match self.pan_id {
            Some(pan) => u16::try_from(pan).map_err(|_| CommandError::Invalid("bad pan_id"))?,
            None => base.pan_id,
        };
        let tx_power_dbm = match self.tx_power {
            Some(p) => i8::try_from(p).map_err(|_| CommandError::Invalid("bad tx_power"))?,
            None => base.tx_power_dbm,
        };
        Ok(NetworkConfig {
            pan_id,
            channel,
            tx_power_dbm,
        })
    }
}

/// A fully parsed host command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    /// Emit a status snapshot.
    Info,
    /// Open or close the valve (manual mode only).
    ValveSet { open: bool },
    ModeSet(ControlMode),
    /// `open` falls back to the current open threshold when absent.
    ThresholdSet { close: u64, open: Option<u64> },
    ValvePathSet(ValvePath),
    ValveTargetSet { node_id: NodeId, dst_endpoint: u8 },
    ValvePair {
        eui64: Eui64,
        node_id: NodeId,
        bind_index: u8,
        dst_endpoint: u8,
    },
    BindSet { index: u8, entry: BindingEntry },
    NetCfgSet(NetworkPatch),
    NetForm { patch: NetworkPatch, force: bool },
    /// Enable or disable host-link polling and periodic frames.
    GatewaySet(bool),
}

impl HostCommand {
    /// Extract and validate the fields `op` needs.
    pub fn parse(op: Op, f: &CommandFields) -> Result<Self, CommandError> {
        Ok(match op {
            Op::Info => Self::Info,

            Op::ValveSet => {
                let open = match f.str("value").ok_or(CommandError::Missing("value"))? {
                    "open" => true,
                    "closed" | "close" => false,
                    _ => return Err(CommandError::Invalid("value must be open/closed")),
                };
                Self::ValveSet { open }
            }

            Op::ModeSet => {
                let value = f.str("value").ok_or(CommandError::Missing("value"))?;
                let mode = ControlMode::parse(value)
                    .ok_or(CommandError::Invalid("value must be auto/manual"))?;
                Self::ModeSet(mode)
            }

            Op::ThresholdSet => Self::ThresholdSet {
                close: f.uint("close_th").ok_or(CommandError::Missing("close_th"))?,
                open: f.uint("open_th"),
            },

            Op::ValvePathSet => {
                let value = f.str("value").ok_or(CommandError::Missing("value"))?;
                let path = ValvePath::parse(value)
                    .ok_or(CommandError::Invalid("value must be auto/direct/binding"))?;
                Self::ValvePathSet(path)
            }

            Op::ValveTargetSet => Self::ValveTargetSet {
                node_id: node_field(f)?,
                dst_endpoint: dst_endpoint_field(f)?,
            },

            Op::ValvePair => {
                let eui = f.str("eui64").ok_or(CommandError::Missing("eui64"))?;
                let node_id = node_field(f)?;
                let eui64 = Eui64::parse(eui).ok_or(CommandError::Invalid("bad eui64"))?;
                Self::ValvePair {
                    eui64,
                    node_id,
                    bind_index: narrow(f.uint("bind_index").unwrap_or(0), "bad bind_index")?,
                    dst_endpoint: dst_endpoint_field(f)?,
                }
            }

            Op::BindSet => {
                let index = required_u8(f, "index", "bad index")?;
                let local_endpoint = required_u8(f, "src_ep", "bad src_ep")?;
                let remote_endpoint = required_u8(f, "dst_ep", "bad dst_ep")?;
                let cluster = cluster_field(f)?;
                let eui = f.str("eui64").ok_or(CommandError::Missing("eui64"))?;
                let remote_eui64 = Eui64::parse(eui).ok_or(CommandError::Invalid("bad eui64"))?;
                Self::BindSet {
                    index,
                    entry: BindingEntry {
                        local_endpoint,
                        remote_endpoint,
                        cluster,
                        remote_eui64,
                    },
                }
            }

            Op::NetCfgSet => Self::NetCfgSet(NetworkPatch::from_fields(f)),

            Op::NetForm => Self::NetForm {
                patch: NetworkPatch::from_fields(f),
                force: f.uint("force").is_some_and(|v| v != 0),
            },

            Op::GatewaySet => Self::GatewaySet(f.uint("enable").unwrap_or(1) != 0),
        })
    }
}

// ── Field helpers ─────────────────────────────────────────────

fn narrow<T: TryFrom<u64>>(value: u64, msg: &'static str) -> Result<T, CommandError> {
    T::try_from(value).map_err(|_| CommandError::Invalid(msg))
}

fn required_u8(f: &CommandFields, key: &'static str, bad: &'static str) -> Result<u8, CommandError> {
    narrow(f.uint(key).ok_or(CommandError::Missing(key))?, bad)
}

fn node_field(f: &CommandFields) -> Result<NodeId, CommandError> {
    let raw = f.uint("node_id").ok_or(CommandError::Missing("node_id"))?;
    narrow(raw, "bad node_id").map(NodeId)
}

fn dst_endpoint_field(f: &CommandFields) -> Result<u8, CommandError> {
    narrow(
        f.uint("dst_ep").unwrap_or(u64::from(VALVE_ENDPOINT_DEFAULT)),
        "bad dst_ep",
    )
}

/// Cluster ids arrive as a number or as decimal / hex text.
fn cluster_field(f: &CommandFields) -> Result<u16, CommandError> {
    if !f.contains("cluster") {
        return Err(CommandError::Missing("cluster"));
    }
    let raw = f.uint("cluster").ok_or(CommandError::Invalid("bad cluster"))?;
    narrow(raw, "bad cluster")
}
