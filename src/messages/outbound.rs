use crate::policy::component_kind::ComponentKind;
use crate::world::net_id::NetworkId;

use super::batch::OutboundBatch;
use super::event_message::EventMessage;
use super::handshake::{HandshakeError, HandshakePayload};
use super::snapshot::FieldUpdate;

/// A message ready for the transport to encode and send.
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum OutboundMessage {
    /// This side's handshake payload, sent once per connection.
    Handshake(HandshakePayload),
    /// Connection refused; carries the precise rejection reason.
    HandshakeRejected(HandshakeError),
    /// Authority-side replication batch.
    Batch(OutboundBatch),
    /// Remote-side event forwarded to the authority.
    Event(EventMessage),
    /// Remote-side write to owner-directed fields.
    FieldUpdate {
        net_id: NetworkId,
        kind: ComponentKind,
        fields: Vec<FieldUpdate>,
    },
}
