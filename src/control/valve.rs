//! Valve command controller.
//!
//! ```text
//!            queue() accepted
//!   ┌──────┐ ───────────────▶ ┌──────────┐
//!   │ Idle │                  │ InFlight │
//!   └──────┘ ◀─────────────── └──────────┘
//!        completion (ok / fail) or timeout
//! ```
//!
//! At most one command is outstanding.  A request while one is in flight
//! is rejected, never queued or overwritten.  The confirmed valve state
//! changes only when the transport reports a successful completion.

use serde::Serialize;

use crate::app::ports::MeshTransport;
use crate::error::ValveError;
use crate::mesh::{
    CLUSTER_ON_OFF, CMD_OFF, CMD_ON, Destination, ENDPOINT_CONTROL, Eui64, MeshStatus,
    NetworkState, NodeId, OutgoingCommand, VALVE_ENDPOINT_DEFAULT,
};
use crate::rpc::guard::CommandId;

/// Addressing preference for valve commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValvePath {
    /// Direct when an address is known, otherwise via the binding table.
    #[default]
    Auto,
    Direct,
    Binding,
}

impl ValvePath {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(Self::Auto),
            "direct" => Some(Self::Direct),
            "binding" => Some(Self::Binding),
            _ => None,
        }
    }
}

/// Confirmed valve position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValveState {
    Open,
    #[default]
    Closed,
}

impl ValveState {
    pub fn from_open(open: bool) -> Self {
        if open { Self::Open } else { Self::Closed }
    }

    pub fn is_open(self) -> bool {
        self == Self::Open
    }
}

/// Where valve commands go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValveTarget {
    /// Hardware identifier, once paired.
    pub eui64: Option<Eui64>,
    /// Current short address, if known.
    pub node_id: Option<NodeId>,
    pub bind_index: u8,
    pub dst_endpoint: u8,
    pub path: ValvePath,
}

impl Default for ValveTarget {
    fn default() -> Self {
        Self {
            eui64: None,
            node_id: None,
            bind_index: 0,
            dst_endpoint: VALVE_ENDPOINT_DEFAULT,
            path: ValvePath::Auto,
        }
    }
}

/// The single outstanding command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InFlight {
    pub id: CommandId,
    pub want_open: bool,
    pub destination: Destination,
    pub submitted_ms: u32,
}

/// Result of a completion that matched the valve command signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The outstanding command finished.  State was committed iff
    /// `status` is success.
    Completed { command: InFlight, status: MeshStatus },
    /// A completion for a command that had already timed out.
    Late { id: CommandId, status: MeshStatus },
}

pub struct ValveController {
    target: ValveTarget,
    state: ValveState,
    in_flight: Option<InFlight>,
    timed_out: Option<CommandId>,
    timeout_ms: u32,
}

impl ValveController {
    /// `timeout_ms == 0` disables the in-flight timeout.
    pub fn new(timeout_ms: u32) -> Self {
        Self {
            target: ValveTarget::default(),
            state: ValveState::Closed,
            in_flight: None,
            timed_out: None,
            timeout_ms,
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> ValveState {
        self.state
    }

    pub fn target(&self) -> &ValveTarget {
        &self.target
    }

    pub fn in_flight(&self) -> Option<&InFlight> {
        self.in_flight.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Resolve the addressing mode for the next command.
    pub fn destination(&self) -> Result<Destination, ValveError> {
        let use_direct = match self.target.path {
            ValvePath::Direct => true,
            ValvePath::Binding => false,
            ValvePath::Auto => self.target.node_id.is_some(),
        };
        if !use_direct {
            return Ok(Destination::Binding(self.target.bind_index));
        }
        self.target
            .node_id
            .map(Destination::Direct)
            .ok_or(ValveError::DirectNeedsAddress)
    }

    // ── Transitions ───────────────────────────────────────────

    /// Submit an open/close command.  On success the controller is
    /// InFlight until [`on_send_complete`](Self::on_send_complete) or the
    /// timeout.
    pub fn queue(
        &mut self,
        id: CommandId,
        want_open: bool,
        now_ms: u32,
        mesh: &mut impl MeshTransport,
    ) -> Result<Destination, ValveError> {
        if mesh.network_state() != NetworkState::Joined {
            return Err(ValveError::NotJoined);
        }
        if self.in_flight.is_some() {
            return Err(ValveError::Busy);
        }
        let destination = self.destination()?;

        let command = OutgoingCommand {
            cluster: CLUSTER_ON_OFF,
            source_endpoint: ENDPOINT_CONTROL,
            destination_endpoint: self.target.dst_endpoint,
            command_id: if want_open { CMD_ON } else { CMD_OFF },
        };
        mesh.send_unicast(destination, &command)
            .map_err(ValveError::SendFailed)?;

        self.in_flight = Some(InFlight {
            id,
            want_open,
            destination,
            submitted_ms: now_ms,
        });
        self.timed_out = None;
        Ok(destination)
    }

    /// Feed a transport completion.  Returns `None` when it does not carry
    /// the valve command signature or nothing was waiting for it.
    pub fn on_send_complete(
        &mut self,
        cluster: u16,
        source_endpoint: u8,
        status: MeshStatus,
    ) -> Option<SendOutcome> {
        if cluster != CLUSTER_ON_OFF || source_endpoint != ENDPOINT_CONTROL {
            return None;
        }
        match self.in_flight.take() {
            Some(command) => {
                if status.is_success() {
                    self.state = ValveState::from_open(command.want_open);
                }
                Some(SendOutcome::Completed { command, status })
            }
            None => self
                .timed_out
                .take()
                .map(|id| SendOutcome::Late { id, status }),
        }
    }

    /// Abandon the outstanding command if it has waited too long.
    pub fn poll_timeout(&mut self, now_ms: u32) -> Option<InFlight> {
        if self.timeout_ms == 0 {
            return None;
        }
        let expired = self
            .in_flight
            .as_ref()
            .is_some_and(|c| now_ms.wrapping_sub(c.submitted_ms) >= self.timeout_ms);
        if !expired {
            return None;
        }
        let command = self.in_flight.take()?;
        self.timed_out = Some(command.id);
        Some(command)
    }

    // ── Target management ─────────────────────────────────────

    pub fn set_path(&mut self, path: ValvePath) {
        self.target.path = path;
    }

    /// Point direct addressing at `node_id`.  The null address forgets it.
    pub fn set_target(&mut self, node_id: NodeId, dst_endpoint: u8) {
        self.target.node_id = (node_id != NodeId::NULL).then_some(node_id);
        self.target.dst_endpoint = dst_endpoint;
    }

    /// Record the valve's identity and refresh its binding slot's address.
    pub fn pair(
        &mut self,
        eui64: Eui64,
        node_id: NodeId,
        bind_index: u8,
        dst_endpoint: u8,
        mesh: &mut impl MeshTransport,
    ) -> Result<(), MeshStatus> {
        self.target.eui64 = Some(eui64);
        self.target.bind_index = bind_index;
        self.set_target(node_id, dst_endpoint);
        mesh.set_binding_remote_node(bind_index, node_id)
    }

    /// Track the paired valve across rejoins.  Returns `None` if the
    /// joining device is not the paired valve.
    pub fn on_device_joined(
        &mut self,
        node_id: NodeId,
        eui64: Eui64,
        mesh: &mut impl MeshTransport,
    ) -> Option<Result<(), MeshStatus>> {
        if self.target.eui64 != Some(eui64) {
            return None;
        }
        self.target.node_id = Some(node_id);
        Some(mesh.set_binding_remote_node(self.target.bind_index, node_id))
    }
}
