//! Mesh event queue.
//!
//! The mesh transport delivers its results asynchronously: send
//! completions, network up/down transitions, attribute reports and device
//! joins.  Those callbacks may fire from a radio task or interrupt
//! context, where calling back into the transport is not allowed.  They
//! push a typed [`MeshEvent`] here instead, and the cooperative main loop
//! pops and dispatches them one at a time.
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ send complete    │────▶│              │     │              │
//! │ network up/down  │────▶│  EventQueue  │────▶│  Main Loop   │
//! │ attribute report │────▶│  (bounded)   │     │  (consumer)  │
//! │ device joined    │────▶│              │     │              │
//! └──────────────────┘     └──────────────┘     └──────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use heapless::Vec;

use crate::mesh::{Eui64, MeshStatus, NetworkConfig, NodeId};

/// Maximum number of pending mesh events.
const EVENT_QUEUE_CAP: usize = 16;

/// Largest attribute-report payload the queue will carry.
pub const REPORT_PAYLOAD_MAX: usize = 64;

/// Asynchronous results delivered by the mesh transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshEvent {
    /// A unicast finished.  Correlated by cluster and source endpoint;
    /// the transport provides no sequence number.
    SendComplete {
        cluster: u16,
        source_endpoint: u8,
        status: MeshStatus,
    },
    /// Formation (or rejoin) completed with these parameters.
    NetworkUp(NetworkConfig),
    /// The coordinator is no longer part of a network.
    NetworkDown,
    /// Raw attribute-report payload from a sensor device.
    AttributeReport {
        cluster: u16,
        payload: Vec<u8, REPORT_PAYLOAD_MAX>,
    },
    /// A device joined or rejoined through the trust center.
    DeviceJoined { node_id: NodeId, eui64: Eui64 },
}

impl MeshEvent {
    /// Build a report event.  Returns `None` if `payload` exceeds
    /// [`REPORT_PAYLOAD_MAX`].
    pub fn report(cluster: u16, payload: &[u8]) -> Option<Self> {
        Some(Self::AttributeReport {
            cluster,
            payload: Vec::from_slice(payload).ok()?,
        })
    }
}

/// Bounded multi-producer queue drained by the main loop.
///
/// Safe to share as a `static`: producers only ever `try_send`, so a full
/// queue drops the event instead of blocking the caller.
pub struct EventQueue {
    channel: Channel<CriticalSectionRawMutex, MeshEvent, EVENT_QUEUE_CAP>,
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Push an event.  Returns `false` if the queue is full (event dropped).
    pub fn push(&self, event: MeshEvent) -> bool {
        self.channel.try_send(event).is_ok()
    }

    /// Pop the next event, or `None` if the queue is empty.
    pub fn pop(&self) -> Option<MeshEvent> {
        self.channel.try_receive().ok()
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
