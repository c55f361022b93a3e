use crate::events::event_kinds::EventKind;
use crate::world::net_id::NetworkId;

#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum EventTarget {
    Entity(NetworkId),
    World,
}

/// An event awaiting delivery, outbound or inbound. The payload is opaque
/// codec output; routing only needs the kind and the target.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct EventMessage {
    pub target: EventTarget,
    pub kind: EventKind,
    pub payload: Vec<u8>,
}

impl EventMessage {
    pub fn new(target: EventTarget, kind: EventKind, payload: Vec<u8>) -> Self {
        Self {
            target,
            kind,
            payload,
        }
    }
}
