use std::hash::Hash;
use std::mem;

use crate::connection::key::ConnectionKey;
use crate::events::event_kinds::EventKind;
use crate::messages::event_message::EventTarget;
use crate::messages::handshake::HandshakeError;
use crate::world::net_id::NetworkId;

/// An event that executed (or is to execute) on this side, handed to game
/// logic. `source` is the originating connection for inbound events, None
/// for locally raised ones.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct EventDelivery {
    pub source: Option<ConnectionKey>,
    pub target: EventTarget,
    pub kind: EventKind,
    pub payload: Vec<u8>,
}

/// Everything one tick produced for the caller: lifecycle transitions,
/// handshake rejections, delivered events, and (Connected mode) the entities
/// the authority spawned or despawned locally.
pub struct ReplicationEvents<E: Copy + Eq + Hash> {
    connections: Vec<ConnectionKey>,
    disconnections: Vec<ConnectionKey>,
    rejections: Vec<(ConnectionKey, HandshakeError)>,
    deliveries: Vec<EventDelivery>,
    spawns: Vec<(NetworkId, E)>,
    despawns: Vec<(NetworkId, E)>,
}

impl<E: Copy + Eq + Hash> ReplicationEvents<E> {
    pub(crate) fn new() -> Self {
        Self {
            connections: Vec::new(),
            disconnections: Vec::new(),
            rejections: Vec::new(),
            deliveries: Vec::new(),
            spawns: Vec::new(),
            despawns: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
            && self.disconnections.is_empty()
            && self.rejections.is_empty()
            && self.deliveries.is_empty()
            && self.spawns.is_empty()
            && self.despawns.is_empty()
    }

    pub fn take_connections(&mut self) -> Vec<ConnectionKey> {
        mem::take(&mut self.connections)
    }

    pub fn take_disconnections(&mut self) -> Vec<ConnectionKey> {
        mem::take(&mut self.disconnections)
    }

    pub fn take_rejections(&mut self) -> Vec<(ConnectionKey, HandshakeError)> {
        mem::take(&mut self.rejections)
    }

    pub fn take_deliveries(&mut self) -> Vec<EventDelivery> {
        mem::take(&mut self.deliveries)
    }

    pub fn take_spawns(&mut self) -> Vec<(NetworkId, E)> {
        mem::take(&mut self.spawns)
    }

    pub fn take_despawns(&mut self) -> Vec<(NetworkId, E)> {
        mem::take(&mut self.despawns)
    }

    pub(crate) fn push_connection(&mut self, key: ConnectionKey) {
        self.connections.push(key);
    }

    pub(crate) fn push_disconnection(&mut self, key: ConnectionKey) {
        self.disconnections.push(key);
    }

    pub(crate) fn push_rejection(&mut self, key: ConnectionKey, error: HandshakeError) {
        self.rejections.push((key, error));
    }

    pub(crate) fn push_delivery(&mut self, delivery: EventDelivery) {
        self.deliveries.push(delivery);
    }

    pub(crate) fn push_spawn(&mut self, net_id: NetworkId, entity: E) {
        self.spawns.push((net_id, entity));
    }

    pub(crate) fn push_despawn(&mut self, net_id: NetworkId, entity: E) {
        self.despawns.push((net_id, entity));
    }
}
