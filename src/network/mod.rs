//! Network lifecycle manager.
//!
//! ```text
//! ┌───────────┐ request_form ┌─────────┐  network up  ┌────────┐
//! │ NoNetwork │─────────────▶│ Forming │─────────────▶│ Joined │
//! └───────────┘              └─────────┘              └────────┘
//!       ▲                                                  │
//!       │      network down: form the pending config       │ force
//!       │                                                  ▼
//!       │                                        ┌──────────────────┐
//!       └────────────────── Forming ◀────────────│ LeavingForReform │
//!                                                └──────────────────┘
//! ```
//!
//! A forced reform stores the requested configuration *before* asking the
//! transport to leave.  The pending configuration is consumed by the very
//! next network-down event, so the new parameters are always the ones
//! formed, never the old ones.
//!
//! Requests are judged on the transport's live state, so a transition
//! the stack abandoned without an up or down event does not block later
//! formations.
//!
//! While joined, a join window stays open for a bounded time after
//! formation (or after the secondary button) and is closed from
//! [`tick`](NetworkManager::tick).

use log::{info, warn};

use crate::app::events::{HostFrame, LogFrame};
use crate::app::ports::{HostSink, MeshTransport};
use crate::error::NetError;
use crate::mesh::{MeshStatus, NetworkConfig, NetworkState};

const TAG: &str = "NET";

/// Lifecycle phase as tracked by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetPhase {
    NoNetwork,
    Forming,
    Joined,
    LeavingForReform,
}

/// Who asked for a formation.  Echoed as `src` in log frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requester {
    /// A host command over the line protocol.
    Host,
    /// The primary button.
    Button,
}

impl Requester {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Host => "uart",
            Self::Button => "pb0",
        }
    }
}

/// A formation deferred until the current network is left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingForm {
    pub config: NetworkConfig,
    pub requester: Requester,
}

/// Outcome of an accepted formation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormRequest {
    /// Formation submitted immediately.
    Started,
    /// Leave submitted; formation follows the network-down event.
    LeaveRequested,
}

pub struct NetworkManager {
    phase: NetPhase,
    pending: Option<PendingForm>,
    join_opened_ms: Option<u32>,
    join_window_ms: u32,
}

impl NetworkManager {
    /// `state` is the transport's membership at boot.
    pub fn new(join_window_ms: u32, state: NetworkState) -> Self {
        let phase = if state == NetworkState::Joined {
            NetPhase::Joined
        } else {
            NetPhase::NoNetwork
        };
        Self {
            phase,
            pending: None,
            join_opened_ms: None,
            join_window_ms,
        }
    }

    pub fn phase(&self) -> NetPhase {
        self.phase
    }

    pub fn pending(&self) -> Option<&PendingForm> {
        self.pending.as_ref()
    }

    pub fn join_open(&self) -> bool {
        self.join_opened_ms.is_some()
    }

    // ── Requests ──────────────────────────────────────────────

    /// Form a network with `config`.  When already joined, `force`
    /// schedules a leave first and forms on the resulting down event.
    pub fn request_form(
        &mut self,
        config: NetworkConfig,
        force: bool,
        requester: Requester,
        mesh: &mut impl MeshTransport,
        sink: &mut impl HostSink,
    ) -> Result<FormRequest, NetError> {
        let src = requester.as_str();
        let live = mesh.network_state();

        if matches!(live, NetworkState::Joining | NetworkState::Leaving) {
            emit(
                sink,
                LogFrame::new(TAG, "form_skip")
                    .with("reason", NetError::TransitionInProgress.reason())
                    .with("src", src),
            );
            return Err(NetError::TransitionInProgress);
        }

        if matches!(self.phase, NetPhase::Forming | NetPhase::LeavingForReform) {
            // The stack settled without reporting up or down.
            warn!("{:?} abandoned, stack reports {:?}", self.phase, live);
            self.phase = if live == NetworkState::Joined {
                NetPhase::Joined
            } else {
                NetPhase::NoNetwork
            };
            self.pending = None;
        }

        if live == NetworkState::NoNetwork {
            self.start_form(config, requester, mesh, sink)?;
            return Ok(FormRequest::Started);
        }

        if !force {
            emit(
                sink,
                LogFrame::new(TAG, "form_skip")
                    .with("reason", NetError::AlreadyInNetwork.reason())
                    .with("src", src),
            );
            return Err(NetError::AlreadyInNetwork);
        }

        self.pending = Some(PendingForm { config, requester });
        let result = mesh.leave_network();
        emit(
            sink,
            LogFrame::new(TAG, "leave_req")
                .with("zstatus", status_of(result).to_string())
                .with("src", src),
        );

        match result {
            Ok(()) => {
                info!("leaving network to reform on pan 0x{:04X}", config.pan_id);
                self.phase = NetPhase::LeavingForReform;
                Ok(FormRequest::LeaveRequested)
            }
            Err(status) => {
                warn!("leave refused: {status}");
                self.pending = None;
                Err(NetError::Transport(status))
            }
        }
    }

    /// Open the join window.  Only meaningful while joined.
    pub fn open_join_window(
        &mut self,
        now_ms: u32,
        mesh: &mut impl MeshTransport,
        sink: &mut impl HostSink,
    ) -> Result<(), NetError> {
        if mesh.network_state() != NetworkState::Joined {
            return Err(NetError::NotJoined);
        }
        let result = mesh.open_join_window();
        emit(
            sink,
            LogFrame::new(TAG, "open_join").with("zstatus", status_of(result).to_string()),
        );
        result.map_err(NetError::Transport)?;
        self.join_opened_ms = Some(now_ms);
        Ok(())
    }

    // ── Transport events ──────────────────────────────────────

    pub fn on_network_up(
        &mut self,
        params: &NetworkConfig,
        now_ms: u32,
        mesh: &mut impl MeshTransport,
        sink: &mut impl HostSink,
    ) {
        self.phase = NetPhase::Joined;
        info!(
            "network up: pan 0x{:04X} ch {}",
            params.pan_id, params.channel
        );
        emit(
            sink,
            LogFrame::new(TAG, "formed")
                .with("pan_id", format!("0x{:04X}", params.pan_id))
                .with("ch", params.channel),
        );
        if let Err(e) = self.open_join_window(now_ms, mesh, sink) {
            warn!("join window not opened: {e}");
        }
    }

    /// Returns the result of the deferred formation, if one was pending.
    pub fn on_network_down(
        &mut self,
        mesh: &mut impl MeshTransport,
        sink: &mut impl HostSink,
    ) -> Option<Result<(), NetError>> {
        self.phase = NetPhase::NoNetwork;
        self.join_opened_ms = None;
        info!("network down");

        let pending = self.pending.take()?;
        Some(self.start_form(pending.config, pending.requester, mesh, sink))
    }

    /// Close the join window once it has been open long enough.
    pub fn tick(&mut self, now_ms: u32, mesh: &mut impl MeshTransport, sink: &mut impl HostSink) {
        let Some(opened) = self.join_opened_ms else {
            return;
        };
        if now_ms.wrapping_sub(opened) < self.join_window_ms {
            return;
        }
        self.join_opened_ms = None;
        let result = mesh.close_join_window();
        emit(
            sink,
            LogFrame::new(TAG, "close_join")
                .with("zstatus", status_of(result).to_string())
                .with("after_ms", self.join_window_ms),
        );
    }

    // ── Internal ──────────────────────────────────────────────

    fn start_form(
        &mut self,
        config: NetworkConfig,
        requester: Requester,
        mesh: &mut impl MeshTransport,
        sink: &mut impl HostSink,
    ) -> Result<(), NetError> {
        let result = mesh.form_network(&config);
        emit(
            sink,
            LogFrame::new(TAG, "form_start")
                .with("zstatus", status_of(result).to_string())
                .with("pan_id", format!("0x{:04X}", config.pan_id))
                .with("ch", config.channel)
                .with("pwr", config.tx_power_dbm)
                .with("src", requester.as_str()),
        );
        result.map_err(NetError::Transport)?;
        self.phase = NetPhase::Forming;
        Ok(())
    }
}

fn status_of(result: Result<(), MeshStatus>) -> MeshStatus {
    result.err().unwrap_or(MeshStatus::SUCCESS)
}

fn emit(sink: &mut impl HostSink, frame: LogFrame) {
    sink.emit(&HostFrame::Log(frame));
}
