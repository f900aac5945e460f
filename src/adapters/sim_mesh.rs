//! Simulated mesh transport for the host binary.
//!
//! Stands in for the radio stack: every submission is answered on the
//! next [`step`](SimMesh::step) through the shared [`EventQueue`], exactly
//! as the real stack's callbacks would.  A simulated flow sensor reports
//! periodically while the network is up, and the flow it reports follows
//! the valve (rising while open, draining while closed) so the auto policy
//! has something to react to.

use log::{debug, info};

use crate::app::ports::MeshTransport;
use crate::events::{EventQueue, MeshEvent};
use crate::mesh::{
    ATTR_BATTERY_PERCENT_REMAINING, ATTR_FLOW_MEASURED_VALUE, BindingEntry, CLUSTER_FLOW_MEASUREMENT,
    CLUSTER_ON_OFF, CLUSTER_POWER_CONFIG, CMD_ON, Destination, Eui64, MeshStatus, NetworkConfig,
    NetworkState, NodeId, OutgoingCommand, TYPE_UINT8, TYPE_UINT16,
};

/// Binding-table capacity of the simulated stack.
const BINDING_SLOTS: usize = 8;

/// Interval between simulated sensor reports.
const REPORT_INTERVAL_MS: u32 = 2_000;

/// Every n-th report also carries a battery reading.
const BATTERY_EVERY: u32 = 5;

/// Completions the stack can hold before refusing submissions.
const COMPLETION_BACKLOG: usize = 4;

/// Flow change per report.
const FLOW_STEP: u16 = 5;
const FLOW_MAX: u16 = 120;

/// Hardware identifier of the simulated valve device.
pub const SIM_VALVE_EUI64: Eui64 = Eui64([0x00, 0x12, 0x4B, 0x00, 0x0A, 0x1B, 0x2C, 0x3D]);

/// Short address the simulated valve announces after each formation.
pub const SIM_VALVE_NODE: NodeId = NodeId(0x5A11);

/// Work scheduled for the next step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Up(NetworkConfig),
    Down,
}

pub struct SimMesh {
    events: &'static EventQueue,
    state: NetworkState,
    params: Option<NetworkConfig>,
    node_id: NodeId,
    eui64: Eui64,
    bindings: [Option<BindingEntry>; BINDING_SLOTS],
    join_open: bool,
    transition: Option<Pending>,
    completions: Vec<MeshEvent>,
    valve_open: bool,
    flow: u16,
    battery_half_pct: u8,
    reports: u32,
    last_report_ms: u32,
    valve_announced: bool,
}

impl SimMesh {
    /// Boot without a network.
    pub fn new(events: &'static EventQueue) -> Self {
        Self {
            events,
            state: NetworkState::NoNetwork,
            params: None,
            node_id: NodeId::COORDINATOR,
            eui64: Eui64([0x00, 0x12, 0x4B, 0x00, 0x00, 0x00, 0xC0, 0x01]),
            bindings: [None; BINDING_SLOTS],
            join_open: false,
            transition: None,
            completions: Vec::with_capacity(COMPLETION_BACKLOG),
            valve_open: false,
            flow: 0,
            battery_half_pct: 200,
            reports: 0,
            last_report_ms: 0,
            valve_announced: false,
        }
    }

    pub fn join_open(&self) -> bool {
        self.join_open
    }

    pub fn binding(&self, index: u8) -> Option<&BindingEntry> {
        self.bindings.get(usize::from(index))?.as_ref()
    }

    /// Deliver everything scheduled since the last step and produce a
    /// sensor report when one is due.
    pub fn step(&mut self, now_ms: u32) {
        for event in std::mem::take(&mut self.completions) {
            self.post(event);
        }

        match self.transition.take() {
            Some(Pending::Up(cfg)) => {
                self.state = NetworkState::Joined;
                self.params = Some(cfg);
                self.valve_announced = false;
                info!(
                    "sim: network up pan=0x{:04X} ch={}",
                    cfg.pan_id, cfg.channel
                );
                self.post(MeshEvent::NetworkUp(cfg));
            }
            Some(Pending::Down) => {
                self.state = NetworkState::NoNetwork;
                self.params = None;
                self.join_open = false;
                info!("sim: network down");
                self.post(MeshEvent::NetworkDown);
            }
            None => {}
        }

        if self.state != NetworkState::Joined {
            return;
        }

        if self.join_open && !self.valve_announced {
            self.valve_announced = true;
            self.post(MeshEvent::DeviceJoined {
                node_id: SIM_VALVE_NODE,
                eui64: SIM_VALVE_EUI64,
            });
        }

        if now_ms.wrapping_sub(self.last_report_ms) >= REPORT_INTERVAL_MS {
            self.last_report_ms = now_ms;
            self.report();
        }
    }

    fn report(&mut self) {
        self.flow = if self.valve_open {
            self.flow.saturating_add(FLOW_STEP).min(FLOW_MAX)
        } else {
            self.flow.saturating_sub(FLOW_STEP)
        };
        let [lo, hi] = ATTR_FLOW_MEASURED_VALUE.to_le_bytes();
        let [f0, f1] = self.flow.to_le_bytes();
        if let Some(ev) = MeshEvent::report(CLUSTER_FLOW_MEASUREMENT, &[lo, hi, TYPE_UINT16, f0, f1])
        {
            self.post(ev);
        }

        self.reports = self.reports.wrapping_add(1);
        if self.reports % BATTERY_EVERY == 0 {
            self.battery_half_pct = self.battery_half_pct.saturating_sub(1);
            let [lo, hi] = ATTR_BATTERY_PERCENT_REMAINING.to_le_bytes();
            if let Some(ev) =
                MeshEvent::report(CLUSTER_POWER_CONFIG, &[lo, hi, TYPE_UINT8, self.battery_half_pct])
            {
                self.post(ev);
            }
        }
    }

    fn post(&self, event: MeshEvent) {
        if !self.events.push(event) {
            debug!("sim: event queue full, dropping");
        }
    }

    fn complete(&mut self, command: &OutgoingCommand, status: MeshStatus) {
        let event = MeshEvent::SendComplete {
            cluster: command.cluster,
            source_endpoint: command.source_endpoint,
            status,
        };
        self.completions.push(event);
    }
}

impl MeshTransport for SimMesh {
    fn network_state(&self) -> NetworkState {
        self.state
    }

    fn node_id(&self) -> NodeId {
        self.node_id
    }

    fn eui64(&self) -> Eui64 {
        self.eui64
    }

    fn network_params(&self) -> Option<NetworkConfig> {
        self.params
    }

    fn send_unicast(
        &mut self,
        destination: Destination,
        command: &OutgoingCommand,
    ) -> Result<(), MeshStatus> {
        if self.state != NetworkState::Joined {
            return Err(MeshStatus::NOT_JOINED);
        }
        if self.completions.len() >= COMPLETION_BACKLOG {
            return Err(MeshStatus::NO_BUFFERS);
        }

        let delivered = match destination {
            Destination::Direct(node) => node == SIM_VALVE_NODE,
            Destination::Binding(index) => self
                .binding(index)
                .is_some_and(|b| b.remote_eui64 == SIM_VALVE_EUI64),
        };
        if delivered && command.cluster == CLUSTER_ON_OFF {
            self.valve_open = command.command_id == CMD_ON;
        }
        let status = if delivered {
            MeshStatus::SUCCESS
        } else {
            MeshStatus::DELIVERY_FAILED
        };
        debug!("sim: unicast {:?} -> {}", destination, status);
        self.complete(command, status);
        Ok(())
    }

    fn form_network(&mut self, config: &NetworkConfig) -> Result<(), MeshStatus> {
        if self.state != NetworkState::NoNetwork || self.transition.is_some() {
            return Err(MeshStatus::INVALID_CALL);
        }
        self.state = NetworkState::Joining;
        self.transition = Some(Pending::Up(*config));
        Ok(())
    }

    fn leave_network(&mut self) -> Result<(), MeshStatus> {
        if self.state != NetworkState::Joined {
            return Err(MeshStatus::INVALID_CALL);
        }
        self.state = NetworkState::Leaving;
        self.transition = Some(Pending::Down);
        Ok(())
    }

    fn set_binding(&mut self, index: u8, entry: &BindingEntry) -> Result<(), MeshStatus> {
        let slot = self
            .bindings
            .get_mut(usize::from(index))
            .ok_or(MeshStatus::INVALID_CALL)?;
        *slot = Some(*entry);
        Ok(())
    }

    fn set_binding_remote_node(&mut self, index: u8, _node_id: NodeId) -> Result<(), MeshStatus> {
        match self.bindings.get(usize::from(index)) {
            Some(Some(_)) => Ok(()),
            _ => Err(MeshStatus::INVALID_CALL),
        }
    }

    fn open_join_window(&mut self) -> Result<(), MeshStatus> {
        if self.state != NetworkState::Joined {
            return Err(MeshStatus::NOT_JOINED);
        }
        self.join_open = true;
        Ok(())
    }

    fn close_join_window(&mut self) -> Result<(), MeshStatus> {
        self.join_open = false;
        Ok(())
    }
}
