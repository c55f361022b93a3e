use crate::policy::component_kind::ComponentKind;
use crate::types::Tick;
use crate::world::net_id::NetworkId;

use super::batch::OutboundBatch;
use super::event_message::EventMessage;
use super::handshake::{HandshakeError, HandshakePayload};
use super::snapshot::FieldUpdate;

/// A decoded message arriving from the transport.
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum InboundMessage {
    Handshake(HandshakePayload),
    /// The remote authority refused our handshake (Connected mode only).
    HandshakeRejected(HandshakeError),
    /// Client-authored write to owner-directed fields. Values are only
    /// trusted when the sending connection owns the entity.
    FieldUpdate {
        net_id: NetworkId,
        kind: ComponentKind,
        fields: Vec<FieldUpdate>,
    },
    Event(EventMessage),
    /// Authority-to-remote replication batch (Connected mode only).
    Batch(OutboundBatch),
}

/// Raw inbound unit enqueued by an I/O thread and drained by the simulation
/// thread at a tick boundary.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct InboundEnvelope {
    /// The sender's simulation tick when the message was produced. The
    /// highest value seen becomes the connection's last acknowledged tick,
    /// which lag-compensated events rewind to.
    pub remote_tick: Tick,
    pub message: InboundMessage,
}

impl InboundEnvelope {
    pub fn new(remote_tick: Tick, message: InboundMessage) -> Self {
        Self {
            remote_tick,
            message,
        }
    }
}
