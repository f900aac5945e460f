//! Coordinator service: the hexagonal core.
//!
//! [`Coordinator`] owns every piece of mutable control state: mode,
//! thresholds, network configuration, valve controller, network manager
//! and telemetry.  It exposes a hardware-agnostic API.  All I/O flows
//! through port traits injected at call sites, making the entire service
//! testable with mock adapters.
//!
//! ```text
//!  HostCommand ──▶ ┌──────────────────────────────┐ ──▶ HostSink
//!                  │         Coordinator           │
//!  MeshEvent  ──▶  │ Valve · Policy · Net · Ingest │ ◀─▶ MeshTransport
//!                  └──────────────────────────────┘
//! ```
//!
//! Everything runs on one cooperative loop, so no field needs a lock.

use core::fmt;

use log::{debug, info, warn};

use crate::config::SystemConfig;
use crate::control::policy::{self, ControlMode, Decision, Thresholds};
use crate::control::valve::{SendOutcome, ValveController, ValveState};
use crate::drivers::button::{ButtonAction, ButtonLatch};
use crate::error::{Error, NetError, ThresholdError, ValveError};
use crate::events::MeshEvent;
use crate::mesh::{Eui64, MeshStatus, NetworkState, NodeId};
use crate::network::{NetworkManager, Requester};
use crate::rpc::guard::{CommandId, INTERNAL_ID};
use crate::sensors::TelemetryIngest;

use super::commands::HostCommand;
use super::events::{AckFrame, DataFrame, HostFrame, InfoFrame, LogFrame, ack_message};
use super::ports::{ConfigPort, HostSink, MeshTransport};

/// Delay between the first unsaved change and the write.
const AUTO_SAVE_DELAY_MS: u32 = 5_000;

/// Values compared by the change-gated telemetry check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DataSignature {
    flow: u16,
    battery: u8,
    valve: ValveState,
    mode: ControlMode,
}

// ───────────────────────────────────────────────────────────────
// Coordinator
// ───────────────────────────────────────────────────────────────

/// The coordinator service orchestrates all domain logic.
pub struct Coordinator {
    config: SystemConfig,
    mode: ControlMode,
    gateway_enabled: bool,
    /// Set when the gateway comes back on; the engine drops its partial line.
    link_resumed: bool,
    valve: ValveController,
    network: NetworkManager,
    telemetry: TelemetryIngest,
    started_ms: u32,
    last_data_check_ms: u32,
    last_data_force_ms: u32,
    last_info_ms: u32,
    last_sent: Option<DataSignature>,
    config_dirty: bool,
    dirty_since_ms: u32,
}

impl Coordinator {
    /// Construct the service from configuration and the transport's
    /// membership at boot.
    ///
    /// Emits nothing; call [`start`](Self::start) next.
    pub fn new(config: SystemConfig, state: NetworkState) -> Self {
        let valve = ValveController::new(config.command_timeout_ms);
        let network = NetworkManager::new(config.join_window_ms, state);
        Self {
            config,
            mode: ControlMode::Manual,
            gateway_enabled: true,
            link_resumed: false,
            valve,
            network,
            telemetry: TelemetryIngest::new(),
            started_ms: 0,
            last_data_check_ms: 0,
            last_data_force_ms: 0,
            last_info_ms: 0,
            last_sent: None,
            config_dirty: false,
            dirty_since_ms: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Announce the coordinator: one status snapshot and one telemetry
    /// snapshot.  Periodic timers start from `now_ms`.
    pub fn start(&mut self, now_ms: u32, mesh: &impl MeshTransport, sink: &mut impl HostSink) {
        self.started_ms = now_ms;
        self.last_data_check_ms = now_ms;
        self.last_data_force_ms = now_ms;
        self.emit_info(now_ms, mesh, sink);
        self.emit_data(sink);
        info!(
            "Coordinator started, net_state={:?}",
            mesh.network_state()
        );
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one housekeeping pass: deferred buttons → join window →
    /// in-flight timeout → periodic frames.
    pub fn tick(
        &mut self,
        now_ms: u32,
        buttons: &ButtonLatch,
        mesh: &mut impl MeshTransport,
        sink: &mut impl HostSink,
    ) {
        // 1. Button actions deferred from interrupt context
        while let Some(action) = buttons.take() {
            self.on_button(action, now_ms, mesh, sink);
        }

        // 2. Join window expiry
        self.network.tick(now_ms, mesh, sink);

        // 3. Stuck valve command
        if let Some(expired) = self.valve.poll_timeout(now_ms) {
            warn!("valve command {} timed out", expired.id);
            if expired.id == INTERNAL_ID {
                self.log(
                    sink,
                    LogFrame::new("ZB", "tx_timeout")
                        .with("id", expired.id)
                        .with("path", expired.destination.path_str())
                        .with("want", want_str(expired.want_open)),
                );
            } else {
                self.send_ack(expired.id, false, "tx_timeout", None, Some("timeout"), sink);
            }
        }

        // 4. Periodic frames, only while the host link is active
        if self.gateway_enabled {
            self.periodic_data(now_ms, sink);
            if now_ms.wrapping_sub(self.last_info_ms) >= self.config.heartbeat_interval_ms {
                self.emit_info(now_ms, mesh, sink);
            }
        }
    }

    /// Dispatch one asynchronous transport result.
    pub fn handle_event(
        &mut self,
        event: MeshEvent,
        now_ms: u32,
        mesh: &mut impl MeshTransport,
        sink: &mut impl HostSink,
    ) {
        match event {
            MeshEvent::SendComplete {
                cluster,
                source_endpoint,
                status,
            } => self.on_send_complete(cluster, source_endpoint, status, sink),

            MeshEvent::NetworkUp(params) => {
                self.network.on_network_up(&params, now_ms, mesh, sink);
                self.emit_info(now_ms, mesh, sink);
            }

            MeshEvent::NetworkDown => {
                self.emit_info(now_ms, mesh, sink);
                if let Some(Err(e)) = self.network.on_network_down(mesh, sink) {
                    warn!("deferred formation failed: {e}");
                }
            }

            MeshEvent::AttributeReport { cluster, payload } => {
                if self.telemetry.ingest(cluster, &payload) {
                    self.auto_control(now_ms, mesh, sink);
                    self.emit_data(sink);
                }
            }

            MeshEvent::DeviceJoined { node_id, eui64 } => {
                self.on_device_joined(node_id, eui64, now_ms, mesh, sink);
            }
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Execute a validated host command.  Every branch acknowledges,
    /// except a submitted `valve_set`, which is acknowledged when the
    /// transport reports completion.
    pub fn execute(
        &mut self,
        id: CommandId,
        cmd: HostCommand,
        now_ms: u32,
        mesh: &mut impl MeshTransport,
        sink: &mut impl HostSink,
    ) {
        match cmd {
            HostCommand::Info => {
                self.emit_info(now_ms, mesh, sink);
                self.ack(id, true, "info", sink);
            }

            HostCommand::ValveSet { open } => {
                self.queue_valve(id, open, now_ms, mesh, sink);
            }

            HostCommand::ModeSet(mode) => {
                self.mode = mode;
                info!("control mode -> {}", mode.as_str());
                self.ack(id, true, "mode set", sink);
                self.auto_control(now_ms, mesh, sink);
                self.emit_data(sink);
            }

            HostCommand::ThresholdSet { close, open } => match self.set_thresholds(close, open) {
                Ok(()) => {
                    self.mark_config_dirty(now_ms);
                    self.ack(id, true, "threshold updated", sink);
                    self.auto_control(now_ms, mesh, sink);
                    self.emit_data(sink);
                }
                Err(e) => self.reject(id, e, sink),
            },

            HostCommand::ValvePathSet(path) => {
                self.valve.set_path(path);
                self.ack(id, true, "valve_path_set", sink);
                self.emit_info(now_ms, mesh, sink);
            }

            HostCommand::ValveTargetSet {
                node_id,
                dst_endpoint,
            } => {
                self.valve.set_target(node_id, dst_endpoint);
                self.ack(id, true, "valve_target_set", sink);
                self.emit_info(now_ms, mesh, sink);
            }

            HostCommand::ValvePair {
                eui64,
                node_id,
                bind_index,
                dst_endpoint,
            } => {
                if let Err(status) = self
                    .valve
                    .pair(eui64, node_id, bind_index, dst_endpoint, mesh)
                {
                    self.log(
                        sink,
                        LogFrame::new("ZB", "bind_node_fail")
                            .with("index", bind_index)
                            .with("zstatus", status.to_string()),
                    );
                }
                info!("valve paired: {eui64} at {node_id}");
                self.ack(id, true, "valve_pair set", sink);
                self.emit_info(now_ms, mesh, sink);
            }

            HostCommand::BindSet { index, entry } => match mesh.set_binding(index, &entry) {
                Ok(()) => self.send_ack(id, true, "bind_set", Some(MeshStatus::SUCCESS), None, sink),
                Err(status) => {
                    self.send_ack(id, false, "bind_set failed", Some(status), None, sink);
                }
            },

            HostCommand::NetCfgSet(patch) => match patch.apply(&self.config.network) {
                Ok(network) => {
                    self.config.network = network;
                    self.mark_config_dirty(now_ms);
                    self.log(
                        sink,
                        LogFrame::new("NET", "net_cfg_set")
                            .with("pan_id", format!("0x{:04X}", network.pan_id))
                            .with("ch", network.channel)
                            .with("pwr", network.tx_power_dbm)
                            .with("src", Requester::Host.as_str()),
                    );
                    self.ack(id, true, "net cfg updated", sink);
                }
                Err(e) => self.reject(id, e, sink),
            },

            HostCommand::NetForm { patch, force } => {
                let requested = match patch.apply(&self.config.network) {
                    Ok(cfg) => cfg,
                    Err(e) => return self.reject(id, e, sink),
                };
                match self
                    .network
                    .request_form(requested, force, Requester::Host, mesh, sink)
                {
                    Ok(_) => self.ack(id, true, "net_form accepted", sink),
                    Err(e @ NetError::TransitionInProgress) => self.reject(id, e, sink),
                    Err(_) => self.ack(id, false, "net_form rejected", sink),
                }
            }

            HostCommand::GatewaySet(enabled) => {
                self.set_gateway(enabled, "uart", sink);
                self.ack(id, true, "uart_gateway_set", sink);
            }
        }
    }

    /// Acknowledge `id` with a failure carrying `err`'s message.
    pub fn reject(&self, id: CommandId, err: impl Into<Error>, sink: &mut impl HostSink) {
        let err = err.into();
        debug!("command {id} rejected: {err}");
        self.ack(id, false, err.ack_message(), sink);
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    /// Whether the host link is polled and periodic frames are sent.
    pub fn gateway_enabled(&self) -> bool {
        self.gateway_enabled
    }

    /// `true` once after the gateway is re-enabled.
    pub fn take_link_resumed(&mut self) -> bool {
        core::mem::take(&mut self.link_resumed)
    }

    pub fn thresholds(&self) -> Thresholds {
        self.config.thresholds
    }

    pub fn valve(&self) -> &ValveController {
        &self.valve
    }

    pub fn network(&self) -> &NetworkManager {
        &self.network
    }

    pub fn telemetry(&self) -> &TelemetryIngest {
        &self.telemetry
    }

    /// Live configuration (for persistence or read-back).
    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// Telemetry snapshot as sent in `@DATA`.
    pub fn data_frame(&self) -> DataFrame {
        let target = self.valve.target();
        DataFrame {
            flow: self.telemetry.flow(),
            valve: self.valve.state(),
            battery: self.telemetry.battery(),
            mode: self.mode,
            tx_pending: self.valve.is_busy(),
            valve_path: target.path,
            valve_node_id: target.node_id,
            valve_known: target.eui64.is_some(),
        }
    }

    /// Status snapshot as sent in `@INFO`.
    pub fn info_frame(&self, now_ms: u32, mesh: &impl MeshTransport) -> InfoFrame {
        let params = mesh.network_params().unwrap_or(self.config.network);
        let target = self.valve.target();
        InfoFrame {
            node_id: mesh.node_id(),
            eui64: mesh.eui64(),
            pan_id: params.pan_id,
            ch: params.channel,
            tx_power: params.tx_power_dbm,
            net_state: mesh.network_state().code(),
            join_open: self.network.join_open(),
            uart_gateway: self.gateway_enabled,
            mode: self.mode,
            valve_path: target.path,
            valve_known: target.eui64.is_some(),
            valve_eui64: target.eui64.unwrap_or(Eui64::ZERO),
            valve_node_id: target.node_id,
            bind_index: target.bind_index,
            uptime_s: now_ms.wrapping_sub(self.started_ms) / 1000,
        }
    }

    // ── Internal ──────────────────────────────────────────────

    /// Hysteresis policy.  A busy controller simply refuses; the policy
    /// runs again on the next telemetry change.
    fn auto_control(&mut self, now_ms: u32, mesh: &mut impl MeshTransport, sink: &mut impl HostSink) {
        let decision = policy::evaluate(
            self.mode,
            self.valve.state().is_open(),
            self.telemetry.flow(),
            &self.config.thresholds,
        );
        match decision {
            Decision::Open => self.queue_valve(INTERNAL_ID, true, now_ms, mesh, sink),
            Decision::Close => self.queue_valve(INTERNAL_ID, false, now_ms, mesh, sink),
            Decision::Hold => {}
        }
    }

    fn queue_valve(
        &mut self,
        id: CommandId,
        want_open: bool,
        now_ms: u32,
        mesh: &mut impl MeshTransport,
        sink: &mut impl HostSink,
    ) {
        match self.valve.queue(id, want_open, now_ms, mesh) {
            Ok(destination) => self.log(
                sink,
                LogFrame::new("ZB", "valve_queued")
                    .with("id", id)
                    .with("path", destination.path_str())
                    .with("want", want_str(want_open)),
            ),
            Err(e) if id == INTERNAL_ID => {
                let mut frame = LogFrame::new("ZB", "valve_reject").with("reason", e.reason());
                if let ValveError::SendFailed(status) = e {
                    frame = frame.with("zstatus", status.to_string());
                }
                self.log(sink, frame);
            }
            Err(e) => self.reject(id, e, sink),
        }
    }

    fn on_send_complete(
        &mut self,
        cluster: u16,
        source_endpoint: u8,
        status: MeshStatus,
        sink: &mut impl HostSink,
    ) {
        match self.valve.on_send_complete(cluster, source_endpoint, status) {
            None => debug!("send complete 0x{cluster:04X}/{source_endpoint} not tracked"),

            Some(SendOutcome::Completed { command, status }) => {
                let ok = status.is_success();
                if command.id != INTERNAL_ID {
                    let msg = if ok { "done" } else { "tx_failed" };
                    self.send_ack(command.id, ok, msg, Some(status), Some("done"), sink);
                }
                self.log(
                    sink,
                    LogFrame::new("ZB", if ok { "tx_done" } else { "tx_fail" })
                        .with("id", command.id)
                        .with("zstatus", status.to_string())
                        .with("path", command.destination.path_str())
                        .with("dst", command.destination.target_hex().to_string())
                        .with("want", want_str(command.want_open)),
                );
                self.emit_data(sink);
            }

            Some(SendOutcome::Late { id, status }) => {
                warn!("completion for timed-out command {id}: {status}");
                self.log(
                    sink,
                    LogFrame::new("ZB", "tx_late")
                        .with("id", id)
                        .with("zstatus", status.to_string()),
                );
            }
        }
    }

    fn on_device_joined(
        &mut self,
        node_id: NodeId,
        eui64: Eui64,
        now_ms: u32,
        mesh: &mut impl MeshTransport,
        sink: &mut impl HostSink,
    ) {
        let Some(result) = self.valve.on_device_joined(node_id, eui64, mesh) else {
            debug!("device {eui64} joined as {node_id}");
            return;
        };
        info!("paired valve rejoined as {node_id}");
        let status = result.err().unwrap_or(MeshStatus::SUCCESS);
        self.log(
            sink,
            LogFrame::new("ZB", "valve_nodeid_update")
                .with("node_id", node_id.to_string())
                .with("zstatus", status.to_string()),
        );
        self.emit_info(now_ms, mesh, sink);
    }

    fn on_button(
        &mut self,
        action: ButtonAction,
        now_ms: u32,
        mesh: &mut impl MeshTransport,
        sink: &mut impl HostSink,
    ) {
        match action {
            ButtonAction::ToggleGateway => {
                self.set_gateway(!self.gateway_enabled, "pb0_long", sink);
            }
            ButtonAction::FormNetwork => {
                let config = self.config.network;
                if let Err(e) = self
                    .network
                    .request_form(config, false, Requester::Button, mesh, sink)
                {
                    info!("button formation not started: {e}");
                }
            }
            ButtonAction::OpenJoinWindow => {
                let result = match self.network.open_join_window(now_ms, mesh, sink) {
                    Ok(()) => "opened",
                    Err(NetError::NotJoined) => "not_in_network",
                    Err(_) => "failed",
                };
                self.log(sink, LogFrame::new("NET", "pb1_open").with("result", result));
            }
        }
    }

    fn set_thresholds(&mut self, close: u64, open: Option<u64>) -> Result<(), ThresholdError> {
        let open = open.unwrap_or(u64::from(self.config.thresholds.open()));
        self.config.thresholds = Thresholds::from_raw(close, open)?;
        info!(
            "thresholds -> close {} open {}",
            self.config.thresholds.close(),
            self.config.thresholds.open()
        );
        Ok(())
    }

    fn set_gateway(&mut self, enabled: bool, src: &'static str, sink: &mut impl HostSink) {
        if enabled && !self.gateway_enabled {
            self.link_resumed = true;
        }
        self.gateway_enabled = enabled;
        info!("uart gateway {}", if enabled { "on" } else { "off" });
        self.log(
            sink,
            LogFrame::new("SYS", "uart_gateway")
                .with("src", src)
                .with("enabled", enabled),
        );
    }

    /// Change-gated telemetry, with an unconditional send every force
    /// interval.
    fn periodic_data(&mut self, now_ms: u32, sink: &mut impl HostSink) {
        if now_ms.wrapping_sub(self.last_data_check_ms) < self.config.data_check_interval_ms {
            return;
        }
        self.last_data_check_ms = now_ms;

        let signature = self.signature();
        let changed = self.last_sent != Some(signature);
        let forced = now_ms.wrapping_sub(self.last_data_force_ms) >= self.config.data_force_interval_ms;
        if !(changed || forced) {
            return;
        }
        self.emit_data(sink);
        self.last_sent = Some(signature);
        if forced {
            self.last_data_force_ms = now_ms;
        }
    }

    fn signature(&self) -> DataSignature {
        DataSignature {
            flow: self.telemetry.flow(),
            battery: self.telemetry.battery(),
            valve: self.valve.state(),
            mode: self.mode,
        }
    }

    fn emit_data(&self, sink: &mut impl HostSink) {
        sink.emit(&HostFrame::Data(self.data_frame()));
    }

    fn emit_info(&mut self, now_ms: u32, mesh: &impl MeshTransport, sink: &mut impl HostSink) {
        self.last_info_ms = now_ms;
        sink.emit(&HostFrame::Info(self.info_frame(now_ms, mesh)));
    }

    fn log(&self, sink: &mut impl HostSink, frame: LogFrame) {
        sink.emit(&HostFrame::Log(frame));
    }

    fn ack(&self, id: CommandId, ok: bool, msg: impl fmt::Display, sink: &mut impl HostSink) {
        self.send_ack(id, ok, msg, None, None, sink);
    }

    fn send_ack(
        &self,
        id: CommandId,
        ok: bool,
        msg: impl fmt::Display,
        zstatus: Option<MeshStatus>,
        stage: Option<&'static str>,
        sink: &mut impl HostSink,
    ) {
        sink.emit(&HostFrame::Ack(AckFrame {
            id,
            ok,
            msg: ack_message(msg),
            mode: self.mode,
            valve: self.valve.state(),
            zstatus,
            stage,
        }));
    }

    // ── Config dirty-flag management ──────────────────────────

    /// Mark the config as modified.
    pub fn mark_config_dirty(&mut self, now_ms: u32) {
        if !self.config_dirty {
            self.config_dirty = true;
            self.dirty_since_ms = now_ms;
        }
    }

    /// Check if auto-save should trigger (5 seconds after the first
    /// unsaved change).  Returns `true` if the config was saved.
    pub fn auto_save_if_needed(&mut self, now_ms: u32, storage: &impl ConfigPort) -> bool {
        if !self.config_dirty {
            return false;
        }
        if now_ms.wrapping_sub(self.dirty_since_ms) < AUTO_SAVE_DELAY_MS {
            return false;
        }
        match storage.save(&self.config) {
            Ok(()) => {
                self.config_dirty = false;
                info!("Config auto-saved");
                true
            }
            Err(e) => {
                warn!("Config auto-save failed: {}", e);
                // Back off a full delay before retrying.
                self.dirty_since_ms = now_ms;
                false
            }
        }
    }

    /// Force-save if dirty (call before shutdown).
    pub fn force_save_if_dirty(&mut self, storage: &impl ConfigPort) {
        if !self.config_dirty {
            return;
        }
        match storage.save(&self.config) {
            Ok(()) => {
                self.config_dirty = false;
                info!("Config force-saved before shutdown");
            }
            Err(e) => {
                warn!("Config force-save failed: {}", e);
            }
        }
    }

    /// Whether the config has unsaved changes.
    pub fn is_config_dirty(&self) -> bool {
        self.config_dirty
    }
}

fn want_str(open: bool) -> &'static str {
    if open { "open" } else { "close" }
}
