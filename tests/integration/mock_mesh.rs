//! Mock mesh transport and recording host sink for integration tests.
//!
//! Records every transport call so tests can assert on the full
//! submission history without a radio.  Asynchronous results are not
//! produced on their own: the test decides when a completion, network-up
//! or network-down event happens and feeds it to the coordinator through
//! [`Rig`].

use std::collections::VecDeque;

use wfms::app::events::{AckFrame, DataFrame, HostFrame, InfoFrame, LogFrame};
use wfms::app::ports::{HostSink, MeshTransport};
use wfms::app::service::Coordinator;
use wfms::config::SystemConfig;
use wfms::drivers::button::ButtonLatch;
use wfms::events::MeshEvent;
use wfms::mesh::{
    BindingEntry, CLUSTER_FLOW_MEASUREMENT, CLUSTER_ON_OFF, CMD_ON, Destination, ENDPOINT_CONTROL,
    Eui64, MeshStatus, NetworkConfig, NetworkState, NodeId, OutgoingCommand, TYPE_UINT16,
};
use wfms::rpc::engine::CommandEngine;

// ── Transport call record ─────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum MeshCall {
    Unicast {
        destination: Destination,
        command: OutgoingCommand,
    },
    Form(NetworkConfig),
    Leave,
    SetBinding { index: u8, entry: BindingEntry },
    SetBindingNode { index: u8, node_id: NodeId },
    OpenJoin,
    CloseJoin,
}

// ── MockMesh ──────────────────────────────────────────────────

pub struct MockMesh {
    pub state: NetworkState,
    pub params: Option<NetworkConfig>,
    pub calls: Vec<MeshCall>,
    /// Returned by `send_unicast`.
    pub send_result: Result<(), MeshStatus>,
    /// Returned by `leave_network`.
    pub leave_result: Result<(), MeshStatus>,
    /// Returned by `set_binding` / `set_binding_remote_node`.
    pub binding_result: Result<(), MeshStatus>,
}

#[allow(dead_code)]
impl MockMesh {
    pub fn new() -> Self {
        Self {
            state: NetworkState::NoNetwork,
            params: None,
            calls: Vec::new(),
            send_result: Ok(()),
            leave_result: Ok(()),
            binding_result: Ok(()),
        }
    }

    /// Already a member of `params` at boot.
    pub fn joined(params: NetworkConfig) -> Self {
        Self {
            state: NetworkState::Joined,
            params: Some(params),
            ..Self::new()
        }
    }

    pub fn unicasts(&self) -> Vec<(Destination, OutgoingCommand)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                MeshCall::Unicast {
                    destination,
                    command,
                } => Some((*destination, *command)),
                _ => None,
            })
            .collect()
    }

    /// `true` per submitted command that asked the valve to open.
    pub fn valve_commands(&self) -> Vec<bool> {
        self.unicasts()
            .iter()
            .map(|(_, cmd)| cmd.command_id == CMD_ON)
            .collect()
    }

    pub fn forms(&self) -> Vec<NetworkConfig> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                MeshCall::Form(cfg) => Some(*cfg),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, call: &MeshCall) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }

    /// Finish a pending formation: the stack reports joined before the
    /// network-up callback fires.
    pub fn come_up(&mut self) -> MeshEvent {
        let cfg = self.forms().last().copied().unwrap_or_default();
        self.state = NetworkState::Joined;
        self.params = Some(cfg);
        MeshEvent::NetworkUp(cfg)
    }

    pub fn go_down(&mut self) -> MeshEvent {
        self.state = NetworkState::NoNetwork;
        self.params = None;
        MeshEvent::NetworkDown
    }
}

impl Default for MockMesh {
    fn default() -> Self {
        Self::new()
    }
}

impl MeshTransport for MockMesh {
    fn network_state(&self) -> NetworkState {
        self.state
    }

    fn node_id(&self) -> NodeId {
        NodeId::COORDINATOR
    }

    fn eui64(&self) -> Eui64 {
        Eui64([0x00, 0x12, 0x4B, 0x00, 0x00, 0x00, 0x00, 0x01])
    }

    fn network_params(&self) -> Option<NetworkConfig> {
        self.params
    }

    fn send_unicast(
        &mut self,
        destination: Destination,
        command: &OutgoingCommand,
    ) -> Result<(), MeshStatus> {
        self.calls.push(MeshCall::Unicast {
            destination,
            command: *command,
        });
        self.send_result
    }

    fn form_network(&mut self, config: &NetworkConfig) -> Result<(), MeshStatus> {
        self.calls.push(MeshCall::Form(*config));
        self.state = NetworkState::Joining;
        Ok(())
    }

    fn leave_network(&mut self) -> Result<(), MeshStatus> {
        self.calls.push(MeshCall::Leave);
        if self.leave_result.is_ok() {
            self.state = NetworkState::Leaving;
        }
        self.leave_result
    }

    fn set_binding(&mut self, index: u8, entry: &BindingEntry) -> Result<(), MeshStatus> {
        self.calls.push(MeshCall::SetBinding {
            index,
            entry: *entry,
        });
        self.binding_result
    }

    fn set_binding_remote_node(&mut self, index: u8, node_id: NodeId) -> Result<(), MeshStatus> {
        self.calls.push(MeshCall::SetBindingNode { index, node_id });
        self.binding_result
    }

    fn open_join_window(&mut self) -> Result<(), MeshStatus> {
        self.calls.push(MeshCall::OpenJoin);
        Ok(())
    }

    fn close_join_window(&mut self) -> Result<(), MeshStatus> {
        self.calls.push(MeshCall::CloseJoin);
        Ok(())
    }
}

// ── Recording sink ────────────────────────────────────────────

#[derive(Default)]
pub struct FrameLog {
    pub frames: Vec<HostFrame>,
}

#[allow(dead_code)]
impl FrameLog {
    pub fn acks(&self) -> Vec<&AckFrame> {
        self.frames
            .iter()
            .filter_map(|f| match f {
                HostFrame::Ack(a) => Some(a),
                _ => None,
            })
            .collect()
    }

    pub fn acks_for(&self, id: i64) -> Vec<&AckFrame> {
        self.acks().into_iter().filter(|a| a.id == id).collect()
    }

    pub fn last_ack(&self) -> Option<&AckFrame> {
        self.acks().pop()
    }

    pub fn logs(&self, event: &str) -> Vec<&LogFrame> {
        self.frames
            .iter()
            .filter_map(|f| match f {
                HostFrame::Log(l) if l.event == event => Some(l),
                _ => None,
            })
            .collect()
    }

    pub fn data(&self) -> Vec<&DataFrame> {
        self.frames
            .iter()
            .filter_map(|f| match f {
                HostFrame::Data(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    pub fn infos(&self) -> Vec<&InfoFrame> {
        self.frames
            .iter()
            .filter_map(|f| match f {
                HostFrame::Info(i) => Some(i),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

impl HostSink for FrameLog {
    fn emit(&mut self, frame: &HostFrame) {
        self.frames.push(frame.clone());
    }
}

// ── Rig: engine + coordinator + mocks on a manual clock ──────

/// Spacing [`Rig::send`] leaves before each command: past the debounce
/// interval, inside the dedup window.
pub const COMMAND_SPACING_MS: u32 = 600;

pub struct Rig {
    pub app: Coordinator,
    pub engine: CommandEngine,
    pub mesh: MockMesh,
    pub sink: FrameLog,
    pub buttons: ButtonLatch,
    pub now: u32,
}

#[allow(dead_code)]
impl Rig {
    pub fn with(config: SystemConfig, mesh: MockMesh) -> Self {
        let engine = CommandEngine::new(&config);
        let mut app = Coordinator::new(config, mesh.network_state());
        let mut sink = FrameLog::default();
        app.start(0, &mesh, &mut sink);
        Self {
            app,
            engine,
            mesh,
            sink,
            buttons: ButtonLatch::new(),
            now: 0,
        }
    }

    /// Default config, already joined to the default network.
    pub fn joined() -> Self {
        Self::with(
            SystemConfig::default(),
            MockMesh::joined(NetworkConfig::default()),
        )
    }

    /// Default config, no network.
    pub fn unjoined() -> Self {
        Self::with(SystemConfig::default(), MockMesh::new())
    }

    pub fn advance(&mut self, ms: u32) {
        self.now = self.now.wrapping_add(ms);
    }

    /// Wait [`COMMAND_SPACING_MS`], then feed `body` as one command line.
    pub fn send(&mut self, body: &str) -> usize {
        self.advance(COMMAND_SPACING_MS);
        self.send_now(body)
    }

    /// Feed `body` as one command line without advancing the clock.
    pub fn send_now(&mut self, body: &str) -> usize {
        let mut link: VecDeque<u8> = format!("@CMD {body}\r\n").into_bytes().into();
        self.engine.poll(
            &mut link,
            self.now,
            &mut self.app,
            &mut self.mesh,
            &mut self.sink,
        )
    }

    /// Feed raw host bytes, framing left to the engine.
    pub fn feed(&mut self, bytes: &str) -> usize {
        let mut link: VecDeque<u8> = bytes.as_bytes().to_vec().into();
        self.engine.poll(
            &mut link,
            self.now,
            &mut self.app,
            &mut self.mesh,
            &mut self.sink,
        )
    }

    pub fn deliver(&mut self, event: MeshEvent) {
        self.app
            .handle_event(event, self.now, &mut self.mesh, &mut self.sink);
    }

    /// The transport finishes the outstanding valve command.
    pub fn complete(&mut self, status: MeshStatus) {
        self.deliver(MeshEvent::SendComplete {
            cluster: CLUSTER_ON_OFF,
            source_endpoint: ENDPOINT_CONTROL,
            status,
        });
    }

    pub fn report_flow(&mut self, flow: u16) {
        let [lo, hi] = flow.to_le_bytes();
        let event = MeshEvent::report(CLUSTER_FLOW_MEASUREMENT, &[0x00, 0x00, TYPE_UINT16, lo, hi])
            .expect("flow report fits");
        self.deliver(event);
    }

    pub fn tick(&mut self) {
        self.app
            .tick(self.now, &self.buttons, &mut self.mesh, &mut self.sink);
    }

    pub fn come_up(&mut self) {
        let event = self.mesh.come_up();
        self.deliver(event);
    }

    pub fn go_down(&mut self) {
        let event = self.mesh.go_down();
        self.deliver(event);
    }
}
