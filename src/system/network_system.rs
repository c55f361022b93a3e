use std::collections::HashMap;
use std::hash::Hash;
use std::mem;
use std::sync::mpsc::Sender;

use log::{info, warn};

use crate::connection::connection::Connection;
use crate::connection::key::ConnectionKey;
use crate::connection::status::ConnectionStatus;
use crate::events::event_kinds::{EventAuthority, EventKinds};
use crate::events::router::{EventRouter, LagCompensator, PendingEvent};
use crate::messages::event_message::{EventMessage, EventTarget};
use crate::messages::handshake::HandshakePayload;
use crate::messages::inbound::{InboundEnvelope, InboundMessage};
use crate::messages::outbound::OutboundMessage;
use crate::messages::snapshot::FieldUpdate;
use crate::policy::component_kind::ComponentKind;
use crate::policy::rules::ReplicationRules;
use crate::registry::error::RegistryError;
use crate::registry::identity_registry::IdentityRegistry;
use crate::relevance::manager::RelevanceManager;
use crate::remote::remote_world::RemoteWorld;
use crate::types::Tick;
use crate::world::net_id::NetworkId;
use crate::world::world_type::{WorldMutType, WorldRefType};

use super::command_queue::{ConnectionCommand, ConnectionCommandQueue};
use super::config::SystemConfig;
use super::error::SystemError;
use super::mode::AuthorityMode;
use super::system_events::{EventDelivery, ReplicationEvents};

type EventHandler = Box<dyn FnMut(&EventDelivery)>;

/// Owns the set of active connections and the authority mode, and drives the
/// per-tick replication pass.
///
/// All mutation of replication state happens on the simulation thread inside
/// [`NetworkSystem::tick`]; I/O threads interact only through the
/// [`ConnectionCommandQueue`] and each connection's inbound channel sender.
pub struct NetworkSystem<E: Copy + Eq + Hash + Send + Sync> {
    config: SystemConfig,
    mode: AuthorityMode,
    tick: Tick,
    local_handshake: HandshakePayload,
    rules: ReplicationRules,
    registry: IdentityRegistry<E>,
    relevance: RelevanceManager,
    router: EventRouter,
    connections: HashMap<ConnectionKey, Connection>,
    command_queue: ConnectionCommandQueue,
    remote: RemoteWorld<E>,
    compensator: Option<Box<dyn LagCompensator>>,
    handler: Option<EventHandler>,
    pending_deliveries: Vec<EventDelivery>,
}

impl<E: Copy + Eq + Hash + Send + Sync> NetworkSystem<E> {
    pub fn new(
        config: SystemConfig,
        rules: ReplicationRules,
        event_kinds: EventKinds,
        local_handshake: HandshakePayload,
    ) -> Self {
        Self {
            config,
            mode: AuthorityMode::Standalone,
            tick: 0,
            local_handshake,
            rules,
            registry: IdentityRegistry::new(),
            relevance: RelevanceManager::new(),
            router: EventRouter::new(event_kinds),
            connections: HashMap::new(),
            command_queue: ConnectionCommandQueue::new(),
            remote: RemoteWorld::new(),
            compensator: None,
            handler: None,
            pending_deliveries: Vec::new(),
        }
    }

    // Mode

    pub fn mode(&self) -> AuthorityMode {
        self.mode
    }

    pub fn start_hosting(&mut self) -> Result<(), SystemError> {
        if self.mode != AuthorityMode::Standalone {
            return Err(SystemError::InvalidModeTransition(AuthorityMode::Hosting));
        }
        self.mode = AuthorityMode::Hosting;
        info!("network system now hosting");
        Ok(())
    }

    /// Becomes a pure client of a remote authority. Returns the single
    /// connection's key and the sender the transport feeds the authority's
    /// messages into. Our handshake payload is queued outbound immediately.
    pub fn start_connected(
        &mut self,
    ) -> Result<(ConnectionKey, Sender<InboundEnvelope>), SystemError> {
        if self.mode != AuthorityMode::Standalone {
            return Err(SystemError::InvalidModeTransition(AuthorityMode::Connected));
        }
        self.mode = AuthorityMode::Connected;
        let (key, sender) = self.command_queue.connect();
        self.apply_connection_commands();
        if let Some(connection) = self.connections.get_mut(&key) {
            connection.queue_outbound(OutboundMessage::Handshake(self.local_handshake.clone()));
        }
        info!("network system connecting to remote authority as {key}");
        Ok((key, sender))
    }

    /// Full teardown back to Standalone: every connection is closed and all
    /// per-connection state is discarded.
    pub fn shutdown(&mut self) {
        self.mode = AuthorityMode::Standalone;
        // Commands queued before the shutdown resolve now, while the mode
        // already refuses fresh connects; nothing can outlive the teardown.
        self.apply_connection_commands();
        let keys: Vec<ConnectionKey> = self.connections.keys().copied().collect();
        for key in keys {
            self.teardown_connection(&key);
        }
        self.remote = RemoteWorld::new();
        self.pending_deliveries.clear();
        info!("network system shut down, back to standalone");
    }

    // Injection points

    /// Installs the rewind/restore collaborator. The bracket only runs when
    /// an event handler is also installed; events returned through
    /// [`ReplicationEvents`] execute at present state.
    pub fn set_compensator(&mut self, compensator: Box<dyn LagCompensator>) {
        self.compensator = Some(compensator);
    }

    /// Installs the game-logic event execution callback. With a handler
    /// installed, events execute inside the tick (and inside the lag
    /// compensation window where declared); without one they are returned
    /// through [`ReplicationEvents`].
    pub fn set_event_handler(&mut self, handler: EventHandler) {
        self.handler = Some(handler);
    }

    // Accessors

    pub fn command_queue(&self) -> ConnectionCommandQueue {
        self.command_queue.clone()
    }

    pub fn rules(&self) -> &ReplicationRules {
        &self.rules
    }

    pub fn registry(&self) -> &IdentityRegistry<E> {
        &self.registry
    }

    pub fn remote(&self) -> &RemoteWorld<E> {
        &self.remote
    }

    pub fn remote_mut(&mut self) -> &mut RemoteWorld<E> {
        &mut self.remote
    }

    pub fn current_tick(&self) -> Tick {
        self.tick
    }

    pub fn connection(&self, key: &ConnectionKey) -> Option<&Connection> {
        self.connections.get(key)
    }

    /// Hands the next ready-to-send message for this connection to the
    /// transport. Batches are immutable once returned.
    pub fn next_outbound(&mut self, key: &ConnectionKey) -> Option<OutboundMessage> {
        self.connections.get_mut(key)?.next_outbound()
    }

    // Entity lifecycle (called by the entity store collaborator)

    /// Starts replicating an entity. If a connection's interest region
    /// already covers the entity's cell, it becomes relevant right away.
    pub fn register_entity<W: WorldRefType<E>>(
        &mut self,
        world: &W,
        entity: E,
    ) -> Result<NetworkId, SystemError> {
        let net_id = self.registry.register(entity)?;
        let cell = world.position(&entity);
        for (key, connection) in self.connections.iter_mut() {
            if !connection.status().is_active() {
                continue;
            }
            if cell.is_some_and(|c| self.relevance.contains(key, &c)) {
                connection.state_mut().mark_relevant(net_id);
            }
        }
        Ok(net_id)
    }

    /// Retires an entity from replication. Every connection that still holds
    /// the id is scheduled a removal before the mapping is dropped, so no
    /// connection ever references a dangling id.
    pub fn unregister_entity(&mut self, net_id: &NetworkId) -> Result<E, SystemError> {
        if self.registry.lookup(net_id).is_none() {
            return Err(RegistryError::NotRegistered(*net_id).into());
        }
        for connection in self.connections.values_mut() {
            connection.state_mut().mark_irrelevant_or_destroyed(net_id);
        }
        let entity = self.registry.unregister(net_id)?;
        Ok(entity)
    }

    /// Reassigns the entity's owner and schedules a full re-send to both the
    /// old and new owner, so field visibility is re-evaluated immediately.
    pub fn set_owner(
        &mut self,
        net_id: &NetworkId,
        owner: Option<ConnectionKey>,
    ) -> Result<Option<ConnectionKey>, SystemError> {
        let previous = self.registry.set_owner(net_id, owner)?;
        if previous != owner {
            for key in [previous, owner].into_iter().flatten() {
                if let Some(connection) = self.connections.get_mut(&key) {
                    connection.state_mut().refresh(net_id);
                }
            }
        }
        Ok(previous)
    }

    pub fn set_always_relevant<W: WorldRefType<E>>(
        &mut self,
        world: &W,
        net_id: &NetworkId,
        always: bool,
    ) -> Result<(), SystemError> {
        self.registry.set_always_relevant(net_id, always)?;
        let cell = self
            .registry
            .lookup(net_id)
            .and_then(|entity| world.position(&entity));
        for (key, connection) in self.connections.iter_mut() {
            if !connection.status().is_active() {
                continue;
            }
            if always {
                connection.state_mut().mark_relevant(*net_id);
            } else {
                // Fall back to spatial relevance.
                let covered = connection.avatar() == Some(*net_id)
                    || cell.is_some_and(|c| self.relevance.contains(key, &c));
                if !covered {
                    connection.state_mut().mark_irrelevant_or_destroyed(net_id);
                }
            }
        }
        Ok(())
    }

    /// Binds the connection's controlled entity. The avatar anchors the
    /// connection's interest region and is unconditionally relevant to it.
    pub fn set_avatar(
        &mut self,
        key: &ConnectionKey,
        avatar: Option<NetworkId>,
    ) -> Result<(), SystemError> {
        let connection = self
            .connections
            .get_mut(key)
            .ok_or(SystemError::UnknownConnection(*key))?;
        connection.set_avatar(avatar);
        if let Some(net_id) = avatar {
            connection.state_mut().mark_relevant(net_id);
        }
        Ok(())
    }

    // Component notifications (called by the entity store collaborator)

    pub fn on_component_added(&mut self, entity: &E, kind: ComponentKind) {
        let Some(net_id) = self.registry.net_id_of(entity) else {
            return;
        };
        for connection in self.active_connections() {
            connection.state_mut().mark_component_added(&net_id, kind);
        }
    }

    pub fn on_component_changed(&mut self, entity: &E, kind: ComponentKind) {
        let Some(net_id) = self.registry.net_id_of(entity) else {
            return;
        };
        for connection in self.active_connections() {
            connection.state_mut().mark_field_dirty(&net_id, kind);
        }
    }

    pub fn on_component_removed(&mut self, entity: &E, kind: ComponentKind) {
        let Some(net_id) = self.registry.net_id_of(entity) else {
            return;
        };
        for connection in self.active_connections() {
            connection.state_mut().mark_component_removed(&net_id, kind);
        }
    }

    /// The entity changed cells while connection regions stayed put:
    /// re-evaluate it against every active connection's current region.
    pub fn entity_moved<W: WorldRefType<E>>(&mut self, world: &W, entity: &E) {
        let Some(net_id) = self.registry.net_id_of(entity) else {
            return;
        };
        let cell = world.position(entity);
        let always = self.registry.is_always_relevant(&net_id);
        for (key, connection) in self.connections.iter_mut() {
            if !connection.status().is_active() {
                continue;
            }
            let covered = always
                || connection.avatar() == Some(net_id)
                || cell.is_some_and(|c| self.relevance.contains(key, &c));
            if covered {
                connection.state_mut().mark_relevant(net_id);
            } else {
                connection.state_mut().mark_irrelevant_or_destroyed(&net_id);
            }
        }
    }

    // Events (called by game logic)

    /// Raises an event, respecting its registered authority classification.
    pub fn send_event(&mut self, message: EventMessage) -> Result<(), SystemError> {
        let Some(spec) = self.router.spec_of(&message).copied() else {
            return Err(crate::events::error::EventError::UnknownEvent(message.kind).into());
        };

        match self.mode {
            AuthorityMode::Standalone => {
                // Single local participant: everything executes here.
                self.deliver_event(None, None, message, None);
            }
            AuthorityMode::Hosting => {
                if let Some(net_id) = EventRouter::target_net_id(&message) {
                    if self.registry.lookup(&net_id).is_none() {
                        // Tolerate ordering races with entity creation.
                        self.router.queue_unresolved(None, self.tick, message);
                        return Ok(());
                    }
                }
                self.route_on_authority(
                    None,
                    self.tick,
                    spec.authority,
                    spec.lag_compensated,
                    message,
                    None,
                );
            }
            AuthorityMode::Connected => {
                let locally_owned = EventRouter::target_net_id(&message)
                    .is_some_and(|net_id| self.remote.is_locally_owned(&net_id));
                if spec.authority == EventAuthority::OwnerAuthoritative && locally_owned {
                    self.deliver_event(None, None, message, None);
                } else {
                    // Forwarded to the authority; it executes only there.
                    for connection in self.active_connections() {
                        connection.queue_outbound(OutboundMessage::Event(message.clone()));
                    }
                }
            }
        }
        Ok(())
    }

    // Tick

    /// One replication pass. Must be called from the simulation thread.
    pub fn tick<W: WorldMutType<E>>(&mut self, world: &mut W) -> ReplicationEvents<E> {
        let mut events = ReplicationEvents::new();

        for delivery in mem::take(&mut self.pending_deliveries) {
            events.push_delivery(delivery);
        }
        for key in self.apply_connection_commands() {
            events.push_disconnection(key);
        }

        match self.mode {
            AuthorityMode::Standalone => {}
            AuthorityMode::Hosting => self.tick_hosting(world, &mut events),
            AuthorityMode::Connected => self.tick_connected(world, &mut events),
        }

        self.tick = self.tick.wrapping_add(1);
        events
    }

    // Internals

    fn active_connections(&mut self) -> impl Iterator<Item = &mut Connection> {
        self.connections
            .values_mut()
            .filter(|connection| connection.status().is_active())
    }

    fn sorted_keys(&self) -> Vec<ConnectionKey> {
        let mut keys: Vec<ConnectionKey> = self.connections.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    fn apply_connection_commands(&mut self) -> Vec<ConnectionKey> {
        let mut disconnected = Vec::new();
        for command in self.command_queue.drain() {
            match command {
                ConnectionCommand::Connect(key, receiver) => {
                    if self.mode == AuthorityMode::Standalone {
                        // Dropping the receiver closes the transport's sender.
                        drop(receiver);
                        warn!("{key} refused, no authority mode active");
                        continue;
                    }
                    if self.connections.contains_key(&key) {
                        continue;
                    }
                    info!("{key} connected, awaiting handshake");
                    self.connections.insert(
                        key,
                        Connection::new(key, receiver, self.config.view_distance),
                    );
                    self.relevance.add_connection(key);
                }
                ConnectionCommand::Disconnect(key) => {
                    if self.teardown_connection(&key) {
                        disconnected.push(key);
                    }
                }
            }
        }
        disconnected
    }

    fn teardown_connection(&mut self, key: &ConnectionKey) -> bool {
        let Some(mut connection) = self.connections.remove(key) else {
            return false;
        };
        connection.disconnect();
        self.relevance.remove_connection(key);
        let orphaned = self.registry.clear_owner(key);
        if !orphaned.is_empty() {
            info!(
                "{key} disconnected leaving {} owned entities for game logic to resolve",
                orphaned.len()
            );
        }
        self.router.discard_from(key);
        info!("{key} disconnected");
        true
    }

    fn tick_hosting<W: WorldMutType<E>>(
        &mut self,
        world: &mut W,
        events: &mut ReplicationEvents<E>,
    ) {
        let keys = self.sorted_keys();

        // Taken before the inbound drain: events queued during this tick's
        // processing get their retry at the next tick, not this one.
        let retries = self.router.take_unresolved();

        // Inbound: raw messages enqueued by I/O threads since last tick.
        for key in &keys {
            let envelopes = match self.connections.get_mut(key) {
                Some(connection) => connection.drain_inbound(),
                None => continue,
            };
            for envelope in envelopes {
                self.process_inbound_hosting(world, *key, envelope, events);
            }
        }

        // Second chance for events that raced entity creation.
        self.retry_unresolved(retries, events);

        // Relevance and flush, per connection.
        for key in &keys {
            let Some(connection) = self.connections.get(key) else {
                continue;
            };
            if !connection.status().is_active() {
                continue;
            }
            let avatar = connection.avatar();
            let view_distance = connection.view_distance();
            let anchor = avatar
                .and_then(|net_id| self.registry.lookup(&net_id))
                .and_then(|entity| world.position(&entity));
            let transitions = self.relevance.tick(key, anchor, view_distance);

            let entities: Vec<(NetworkId, E)> = self.registry.iter().collect();
            let Some(connection) = self.connections.get_mut(key) else {
                continue;
            };
            for (net_id, entity) in entities {
                let always =
                    self.registry.is_always_relevant(&net_id) || connection.avatar() == Some(net_id);
                if always {
                    connection.state_mut().mark_relevant(net_id);
                    continue;
                }
                let Some(cell) = world.position(&entity) else {
                    continue;
                };
                if transitions.entered.contains(&cell) {
                    connection.state_mut().mark_relevant(net_id);
                } else if transitions.left.contains(&cell) && !self.relevance.contains(key, &cell) {
                    connection.state_mut().mark_irrelevant_or_destroyed(&net_id);
                }
            }

            let batch =
                connection
                    .state_mut()
                    .flush(self.tick, world, &self.registry, &self.rules, key);
            if !batch.is_empty() {
                connection.queue_outbound(OutboundMessage::Batch(batch));
            }
        }
    }

    fn process_inbound_hosting<W: WorldMutType<E>>(
        &mut self,
        world: &mut W,
        key: ConnectionKey,
        envelope: InboundEnvelope,
        events: &mut ReplicationEvents<E>,
    ) {
        let status = {
            let Some(connection) = self.connections.get_mut(&key) else {
                return;
            };
            connection.observe_remote_tick(envelope.remote_tick);
            connection.status()
        };

        match status {
            ConnectionStatus::AwaitingHandshake => {
                match envelope.message {
                    InboundMessage::Handshake(remote) => {
                        match self.local_handshake.verify(&remote) {
                            Ok(()) => {
                                if let Some(connection) = self.connections.get_mut(&key) {
                                    connection.queue_outbound(OutboundMessage::Handshake(
                                        self.local_handshake.clone(),
                                    ));
                                    connection.activate();
                                }
                                info!("{key} handshake complete, replication active");
                                events.push_connection(key);
                            }
                            Err(error) => {
                                warn!("{key} refused: {error}");
                                if let Some(connection) = self.connections.get_mut(&key) {
                                    connection.queue_outbound(OutboundMessage::HandshakeRejected(
                                        error.clone(),
                                    ));
                                    connection.refuse();
                                }
                                self.relevance.remove_connection(&key);
                                events.push_rejection(key, error);
                            }
                        }
                    }
                    _ => {
                        warn!("{key} sent a message before completing handshake, dropping");
                    }
                }
            }
            ConnectionStatus::Active => match envelope.message {
                InboundMessage::Handshake(_) => {
                    warn!("{key} sent a duplicate handshake, ignoring");
                }
                InboundMessage::HandshakeRejected(_) => {
                    warn!("{key} sent a handshake rejection to the authority, ignoring");
                }
                InboundMessage::FieldUpdate {
                    net_id,
                    kind,
                    fields,
                } => {
                    self.apply_inbound_field_update(world, key, net_id, kind, fields);
                }
                InboundMessage::Event(message) => {
                    self.route_inbound_event(key, envelope.remote_tick, message, events, true);
                }
                InboundMessage::Batch(_) => {
                    warn!("{key} sent a replication batch to the authority, dropping");
                }
            },
            ConnectionStatus::Disconnected => {}
        }
    }

    /// Owner-directed field write arriving from a client. Values for fields
    /// the sender is not trusted to write are discarded and logged, never
    /// applied.
    fn apply_inbound_field_update<W: WorldMutType<E>>(
        &mut self,
        world: &mut W,
        key: ConnectionKey,
        net_id: NetworkId,
        kind: ComponentKind,
        fields: Vec<FieldUpdate>,
    ) {
        let Some(entity) = self.registry.lookup(&net_id) else {
            warn!("{key} wrote fields of unregistered {net_id}, dropping");
            return;
        };
        let is_owner = self.registry.owner_of(&net_id) == Some(key);
        let Some(schema) = self.rules.schema(&kind) else {
            warn!(
                "{key} wrote fields of unregistered component kind {:?}, dropping",
                kind
            );
            return;
        };

        let mut trusted = Vec::new();
        let mut rejected = 0usize;
        for update in fields {
            match schema.field(update.field) {
                Some(spec) if ReplicationRules::trusts_inbound(spec, is_owner) => {
                    trusted.push(update);
                }
                _ => rejected += 1,
            }
        }
        if rejected > 0 {
            warn!(
                "{key} wrote {rejected} untrusted field value(s) of `{}` on {net_id}, discarded",
                self.rules.kind_to_name(&kind)
            );
        }
        if trusted.is_empty() {
            return;
        }
        world.apply_field_update(&entity, &kind, &trusted);

        // The owner's write may be visible to other connections; let the
        // policy decide per field at their next flush.
        for (other, connection) in self.connections.iter_mut() {
            if *other == key || !connection.status().is_active() {
                continue;
            }
            connection.state_mut().mark_field_dirty(&net_id, kind);
        }
    }

    fn route_inbound_event(
        &mut self,
        source: ConnectionKey,
        remote_tick: Tick,
        message: EventMessage,
        events: &mut ReplicationEvents<E>,
        allow_requeue: bool,
    ) {
        let Some(spec) = self.router.spec_of(&message).copied() else {
            warn!("{source} sent event of unregistered kind, dropping");
            return;
        };

        if let Some(net_id) = EventRouter::target_net_id(&message) {
            if self.registry.lookup(&net_id).is_none() {
                if allow_requeue {
                    self.router.queue_unresolved(Some(source), remote_tick, message);
                } else {
                    warn!(
                        "dropping `{}` event from {source}: target {net_id} never resolved",
                        self.router.kinds().kind_to_name(&message.kind)
                    );
                }
                return;
            }
        }

        self.route_on_authority(
            Some(source),
            remote_tick,
            spec.authority,
            spec.lag_compensated,
            message,
            Some(events),
        );
    }

    /// Authority-side dispatch of an event whose target has resolved.
    fn route_on_authority(
        &mut self,
        source: Option<ConnectionKey>,
        remote_tick: Tick,
        authority: EventAuthority,
        lag_compensated: bool,
        message: EventMessage,
        events: Option<&mut ReplicationEvents<E>>,
    ) {
        match authority {
            EventAuthority::ServerAuthoritative => {
                let lag_tick = if lag_compensated && source.is_some() {
                    Some(remote_tick)
                } else {
                    None
                };
                self.deliver_event(source, lag_tick, message, events);
            }
            EventAuthority::OwnerAuthoritative => {
                let owner = EventRouter::target_net_id(&message)
                    .and_then(|net_id| self.registry.owner_of(&net_id));
                match owner {
                    Some(owner) if Some(owner) != source => {
                        if let Some(connection) = self.connections.get_mut(&owner) {
                            if connection.status().is_active() {
                                connection.state_mut().queue_event(message);
                                return;
                            }
                        }
                        // Owner unreachable: authority executes.
                        self.deliver_event(source, None, message, events);
                    }
                    Some(_) => {
                        warn!("owner-authoritative event arrived from its own owner, ignoring");
                    }
                    None => {
                        self.deliver_event(source, None, message, events);
                    }
                }
            }
            EventAuthority::Broadcast => {
                self.relay_broadcast(&message);
                self.deliver_event(source, None, message, events);
            }
        }
    }

    /// Relays a broadcast event to every connection for which the target
    /// entity is relevant (or to all of them for world-targeted events).
    fn relay_broadcast(&mut self, message: &EventMessage) {
        for connection in self.connections.values_mut() {
            if !connection.status().is_active() {
                continue;
            }
            let relevant = match message.target {
                EventTarget::World => true,
                EventTarget::Entity(net_id) => connection.state().is_relevant(&net_id),
            };
            if relevant {
                connection.state_mut().queue_event(message.clone());
            }
        }
    }

    /// Executes an event on this side. Lag-compensated events are bracketed
    /// by the compensator's rewind/restore, one event at a time, so the
    /// historical window never leaks into subsequent processing.
    fn deliver_event(
        &mut self,
        source: Option<ConnectionKey>,
        lag_tick: Option<Tick>,
        message: EventMessage,
        events: Option<&mut ReplicationEvents<E>>,
    ) {
        let delivery = EventDelivery {
            source,
            target: message.target,
            kind: message.kind,
            payload: message.payload,
        };

        // Without a handler the event is returned to the caller and executes
        // at present state, so rewinding for it would be wasted work.
        let bracketed =
            lag_tick.filter(|_| self.compensator.is_some() && self.handler.is_some());
        if let Some(tick) = bracketed {
            if let Some(compensator) = self.compensator.as_mut() {
                compensator.begin(tick);
            }
        }

        if let Some(handler) = self.handler.as_mut() {
            handler(&delivery);
        } else if let Some(events) = events {
            events.push_delivery(delivery);
        } else {
            self.pending_deliveries.push(delivery);
        }

        if bracketed.is_some() {
            if let Some(compensator) = self.compensator.as_mut() {
                compensator.end();
            }
        }
    }

    /// One retry for events whose targets were unknown on arrival; still
    /// unresolved means dropped with a warning.
    fn retry_unresolved(
        &mut self,
        retries: Vec<PendingEvent>,
        events: &mut ReplicationEvents<E>,
    ) {
        for pending in retries {
            match pending.source {
                Some(source) => {
                    let active = self
                        .connections
                        .get(&source)
                        .is_some_and(|connection| connection.status().is_active());
                    if !active {
                        continue;
                    }
                    self.route_inbound_event(
                        source,
                        pending.remote_tick,
                        pending.message,
                        events,
                        false,
                    );
                }
                None => {
                    // Locally raised; no requeue left.
                    let Some(spec) = self.router.spec_of(&pending.message).copied() else {
                        continue;
                    };
                    if let Some(net_id) = EventRouter::target_net_id(&pending.message) {
                        if self.registry.lookup(&net_id).is_none() {
                            warn!(
                                "dropping local `{}` event: target {net_id} never resolved",
                                self.router.kinds().kind_to_name(&pending.message.kind)
                            );
                            continue;
                        }
                    }
                    self.route_on_authority(
                        None,
                        pending.remote_tick,
                        spec.authority,
                        false,
                        pending.message,
                        Some(&mut *events),
                    );
                }
            }
        }
    }

    fn tick_connected<W: WorldMutType<E>>(
        &mut self,
        world: &mut W,
        events: &mut ReplicationEvents<E>,
    ) {
        let keys = self.sorted_keys();

        // Events queued last tick get retried after this tick's batches have
        // been applied, so a spawn arriving now still resolves them.
        let retries = self.router.take_unresolved();

        for key in &keys {
            let envelopes = match self.connections.get_mut(key) {
                Some(connection) => connection.drain_inbound(),
                None => continue,
            };
            for envelope in envelopes {
                self.process_inbound_connected(world, *key, envelope, events);
            }
        }

        // Retry events that raced their entity's spawn action.
        for pending in retries {
            if let Some(net_id) = EventRouter::target_net_id(&pending.message) {
                if self.remote.entity(&net_id).is_none() {
                    warn!(
                        "dropping `{}` event: target {net_id} never materialized locally",
                        self.router.kinds().kind_to_name(&pending.message.kind)
                    );
                    continue;
                }
            }
            self.deliver_event(pending.source, None, pending.message, Some(&mut *events));
        }
    }

    /// Connected mode: write owner-directed fields back to the authority.
    /// The authority applies them only if this side owns the entity.
    pub fn send_field_update(
        &mut self,
        net_id: NetworkId,
        kind: ComponentKind,
        fields: Vec<FieldUpdate>,
    ) {
        for connection in self.active_connections() {
            connection.queue_outbound(OutboundMessage::FieldUpdate {
                net_id,
                kind,
                fields: fields.clone(),
            });
        }
    }

    fn process_inbound_connected<W: WorldMutType<E>>(
        &mut self,
        world: &mut W,
        key: ConnectionKey,
        envelope: InboundEnvelope,
        events: &mut ReplicationEvents<E>,
    ) {
        let status = {
            let Some(connection) = self.connections.get_mut(&key) else {
                return;
            };
            connection.observe_remote_tick(envelope.remote_tick);
            connection.status()
        };

        match status {
            ConnectionStatus::AwaitingHandshake => {
                match envelope.message {
                    InboundMessage::Handshake(remote) => {
                        match self.local_handshake.verify(&remote) {
                            Ok(()) => {
                                if let Some(connection) = self.connections.get_mut(&key) {
                                    connection.activate();
                                }
                                info!("connected to authority, replication active");
                                events.push_connection(key);
                            }
                            Err(error) => {
                                warn!("authority handshake incompatible: {error}");
                                events.push_rejection(key, error);
                                self.teardown_connection(&key);
                            }
                        }
                    }
                    InboundMessage::HandshakeRejected(error) => {
                        warn!("authority refused connection: {error}");
                        events.push_rejection(key, error);
                        self.teardown_connection(&key);
                    }
                    _ => {
                        warn!("authority sent entity messages before handshake, dropping");
                    }
                }
            }
            ConnectionStatus::Active => match envelope.message {
                InboundMessage::Batch(batch) => {
                    let applied = self.remote.apply_batch(world, batch);
                    for (net_id, entity) in applied.spawned {
                        events.push_spawn(net_id, entity);
                    }
                    for (net_id, entity) in applied.despawned {
                        events.push_despawn(net_id, entity);
                    }
                    for message in applied.events {
                        self.route_remote_event(key, envelope.remote_tick, message, events);
                    }
                }
                InboundMessage::Event(message) => {
                    self.route_remote_event(key, envelope.remote_tick, message, events);
                }
                InboundMessage::Handshake(_) => {
                    warn!("authority sent a duplicate handshake, ignoring");
                }
                InboundMessage::HandshakeRejected(error) => {
                    warn!("authority rejected connection mid-session: {error}");
                    events.push_rejection(key, error);
                    self.teardown_connection(&key);
                }
                InboundMessage::FieldUpdate { .. } => {
                    warn!("authority sent a raw field update outside a batch, dropping");
                }
            },
            ConnectionStatus::Disconnected => {}
        }
    }

    /// An event arriving from the authority executes locally, once its
    /// target exists here.
    fn route_remote_event(
        &mut self,
        source: ConnectionKey,
        remote_tick: Tick,
        message: EventMessage,
        events: &mut ReplicationEvents<E>,
    ) {
        if self.router.spec_of(&message).is_none() {
            warn!("authority sent event of unregistered kind, dropping");
            return;
        }
        if let Some(net_id) = EventRouter::target_net_id(&message) {
            if self.remote.entity(&net_id).is_none() {
                self.router
                    .queue_unresolved(Some(source), remote_tick, message);
                return;
            }
        }
        self.deliver_event(Some(source), None, message, Some(events));
    }
}
