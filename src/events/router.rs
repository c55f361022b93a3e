use std::collections::VecDeque;
use std::mem;

use crate::connection::key::ConnectionKey;
use crate::messages::event_message::{EventMessage, EventTarget};
use crate::types::Tick;

use super::event_kinds::{EventKinds, EventSpec};

/// Rewind/restore seam for lag-compensated events. The implementation
/// (historical world snapshots) belongs to the game logic collaborator; the
/// router only guarantees the bracketing: `begin` with the sender's last
/// acked tick immediately before one event's execution, `end` immediately
/// after, never spanning two events.
pub trait LagCompensator {
    fn begin(&mut self, tick: Tick);
    fn end(&mut self);
}

/// An inbound event whose target entity was unknown on arrival. Tolerates
/// ordering races with entity creation: retried once at the next tick, then
/// dropped with a warning.
pub struct PendingEvent {
    pub source: Option<ConnectionKey>,
    pub remote_tick: Tick,
    pub message: EventMessage,
}

/// Classifies events by their registered authority and buffers the ones
/// whose targets have not resolved yet.
pub struct EventRouter {
    kinds: EventKinds,
    unresolved: VecDeque<PendingEvent>,
}

impl EventRouter {
    pub fn new(kinds: EventKinds) -> Self {
        Self {
            kinds,
            unresolved: VecDeque::new(),
        }
    }

    pub fn kinds(&self) -> &EventKinds {
        &self.kinds
    }

    pub fn spec_of(&self, message: &EventMessage) -> Option<&EventSpec> {
        self.kinds.spec(&message.kind)
    }

    /// Queues an event whose target entity does not exist yet on this side.
    pub fn queue_unresolved(
        &mut self,
        source: Option<ConnectionKey>,
        remote_tick: Tick,
        message: EventMessage,
    ) {
        self.unresolved.push_back(PendingEvent {
            source,
            remote_tick,
            message,
        });
    }

    /// Takes the retry queue for this tick. Entries that still fail to
    /// resolve must be dropped by the caller, not requeued again.
    pub fn take_unresolved(&mut self) -> Vec<PendingEvent> {
        mem::take(&mut self.unresolved).into_iter().collect()
    }

    /// Discards pending retries originating from a disconnecting connection.
    pub fn discard_from(&mut self, connection: &ConnectionKey) {
        self.unresolved
            .retain(|pending| pending.source != Some(*connection));
    }

    pub fn target_net_id(message: &EventMessage) -> Option<crate::world::net_id::NetworkId> {
        match message.target {
            EventTarget::Entity(net_id) => Some(net_id),
            EventTarget::World => None,
        }
    }
}
