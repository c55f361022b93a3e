use std::collections::VecDeque;
use std::sync::mpsc::{Receiver, TryRecvError};

use crate::messages::inbound::InboundEnvelope;
use crate::messages::outbound::OutboundMessage;
use crate::types::Tick;
use crate::world::net_id::NetworkId;

use super::key::ConnectionKey;
use super::replication_state::ReplicationState;
use super::status::ConnectionStatus;

/// One transport-level connection as the simulation thread sees it.
///
/// The inbound receiver is the consuming end of a single-producer channel
/// fed by the connection's I/O task; it is drained only at tick boundaries.
/// Outbound messages are parked here, ready for the transport to take.
pub struct Connection {
    key: ConnectionKey,
    status: ConnectionStatus,
    state: ReplicationState,
    inbound: Receiver<InboundEnvelope>,
    outbound: VecDeque<OutboundMessage>,
    last_acked_tick: Tick,
    avatar: Option<NetworkId>,
    view_distance: i32,
}

impl Connection {
    pub fn new(key: ConnectionKey, inbound: Receiver<InboundEnvelope>, view_distance: i32) -> Self {
        Self {
            key,
            status: ConnectionStatus::AwaitingHandshake,
            state: ReplicationState::new(),
            inbound,
            outbound: VecDeque::new(),
            last_acked_tick: 0,
            avatar: None,
            view_distance,
        }
    }

    pub fn key(&self) -> ConnectionKey {
        self.key
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn activate(&mut self) {
        self.status = ConnectionStatus::Active;
    }

    /// Handshake refused: stop replication but keep the queued rejection
    /// message so the transport can still deliver the reason.
    pub fn refuse(&mut self) {
        self.status = ConnectionStatus::Disconnected;
        self.state.clear();
        self.avatar = None;
    }

    /// Idempotent. Discards all per-connection state; anything in flight for
    /// this connection is dropped, never retried.
    pub fn disconnect(&mut self) {
        if self.status == ConnectionStatus::Disconnected {
            return;
        }
        self.status = ConnectionStatus::Disconnected;
        self.state.clear();
        self.outbound.clear();
        self.avatar = None;
    }

    pub fn state(&self) -> &ReplicationState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ReplicationState {
        &mut self.state
    }

    /// Drains every raw message the I/O task has enqueued since last tick.
    pub fn drain_inbound(&mut self) -> Vec<InboundEnvelope> {
        let mut envelopes = Vec::new();
        loop {
            match self.inbound.try_recv() {
                Ok(envelope) => envelopes.push(envelope),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        envelopes
    }

    pub fn observe_remote_tick(&mut self, tick: Tick) {
        if tick > self.last_acked_tick {
            self.last_acked_tick = tick;
        }
    }

    pub fn last_acked_tick(&self) -> Tick {
        self.last_acked_tick
    }

    pub fn queue_outbound(&mut self, message: OutboundMessage) {
        self.outbound.push_back(message);
    }

    pub fn next_outbound(&mut self) -> Option<OutboundMessage> {
        self.outbound.pop_front()
    }

    pub fn avatar(&self) -> Option<NetworkId> {
        self.avatar
    }

    /// The connection's own controlled entity: the relevance anchor, and
    /// always relevant to this connection regardless of cells.
    pub fn set_avatar(&mut self, avatar: Option<NetworkId>) {
        self.avatar = avatar;
    }

    pub fn view_distance(&self) -> i32 {
        self.view_distance
    }
}
