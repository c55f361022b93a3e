#![cfg(test)]

use std::sync::mpsc::Sender;

use crate::connection::key::ConnectionKey;
use crate::events::event_kinds::{EventAuthority, EventKind, EventKinds};
use crate::messages::event_message::{EventMessage, EventTarget};
use crate::messages::handshake::{HandshakeError, HandshakePayload};
use crate::messages::inbound::{InboundEnvelope, InboundMessage};
use crate::messages::outbound::OutboundMessage;
use crate::system::config::SystemConfig;
use crate::system::network_system::NetworkSystem;
use crate::world::cell::Cell;
use crate::world::net_id::NetworkId;
use crate::world::world_type::WorldRefType;

use super::mock_world::{test_handshake, test_rules, value, MockWorld, TestEntity, TestKinds};

/// A pure client talking to a remote authority: its own world, its own
/// single connection.
struct Client {
    system: NetworkSystem<TestEntity>,
    world: MockWorld,
    key: ConnectionKey,
    sender: Sender<InboundEnvelope>,
    kinds: TestKinds,
    chat: EventKind,
    fire: EventKind,
    open_door: EventKind,
    handshake: HandshakePayload,
}

impl Client {
    fn new() -> Self {
        let (rules, kinds) = test_rules();
        let handshake = test_handshake(&rules);
        let mut event_kinds = EventKinds::new();
        let chat = event_kinds
            .register("chat", EventAuthority::Broadcast, false)
            .unwrap();
        let fire = event_kinds
            .register("fire_weapon", EventAuthority::ServerAuthoritative, true)
            .unwrap();
        let open_door = event_kinds
            .register("open_door", EventAuthority::OwnerAuthoritative, false)
            .unwrap();
        let mut system = NetworkSystem::new(
            SystemConfig::default(),
            rules,
            event_kinds,
            handshake.clone(),
        );
        let (key, sender) = system.start_connected().unwrap();
        Self {
            system,
            world: MockWorld::new(),
            key,
            sender,
            kinds,
            chat,
            fire,
            open_door,
            handshake,
        }
    }

    /// Completes the handshake with the (simulated) authority.
    fn activate(&mut self) {
        // Our own handshake goes out first.
        assert!(matches!(
            self.system.next_outbound(&self.key),
            Some(OutboundMessage::Handshake(_))
        ));
        self.feed(0, InboundMessage::Handshake(self.handshake.clone()));
        let mut events = self.system.tick(&mut self.world);
        assert_eq!(events.take_connections(), vec![self.key]);
    }

    fn feed(&self, remote_tick: u32, message: InboundMessage) {
        self.sender
            .send(InboundEnvelope::new(remote_tick, message))
            .unwrap();
    }

    fn local_entity(&self, net_id: &NetworkId) -> TestEntity {
        self.system.remote().entity(net_id).expect("entity not mirrored")
    }
}

/// Authority fixture sharing the client's protocol tables.
mod authority {
    use super::*;

    pub fn hosting() -> (NetworkSystem<TestEntity>, MockWorld, TestKinds) {
        let (rules, kinds) = test_rules();
        let handshake = test_handshake(&rules);
        let mut event_kinds = EventKinds::new();
        event_kinds
            .register("chat", EventAuthority::Broadcast, false)
            .unwrap();
        event_kinds
            .register("fire_weapon", EventAuthority::ServerAuthoritative, true)
            .unwrap();
        event_kinds
            .register("open_door", EventAuthority::OwnerAuthoritative, false)
            .unwrap();
        let mut system = NetworkSystem::new(
            SystemConfig { view_distance: 2 },
            rules,
            event_kinds,
            handshake,
        );
        system.start_hosting().unwrap();
        (system, MockWorld::new(), kinds)
    }
}

#[test]
fn authoritative_state_round_trips_through_a_client() {
    let (mut server, mut server_world, kinds) = authority::hosting();
    let mut client = Client::new();
    client.activate();

    // Server side: the client's connection plus two entities.
    let queue = server.command_queue();
    let (conn, conn_sender) = queue.connect();
    server.tick(&mut server_world);
    conn_sender
        .send(InboundEnvelope::new(
            0,
            InboundMessage::Handshake(client.handshake.clone()),
        ))
        .unwrap();
    server.tick(&mut server_world);
    assert!(matches!(
        server.next_outbound(&conn),
        Some(OutboundMessage::Handshake(_))
    ));

    let avatar = server_world.spawn_at(Cell::new(0, 0, 0));
    server_world.insert(avatar, kinds.transform, vec![value(1), value(2)]);
    let avatar_id = server.register_entity(&server_world, avatar).unwrap();
    server.set_owner(&avatar_id, Some(conn)).unwrap();
    server.set_avatar(&conn, Some(avatar_id)).unwrap();

    let stranger = server_world.spawn_at(Cell::new(1, 0, 0));
    server_world.insert(stranger, kinds.health, vec![value(50), value(3)]);
    let stranger_id = server.register_entity(&server_world, stranger).unwrap();

    server.tick(&mut server_world);
    let Some(OutboundMessage::Batch(batch)) = server.next_outbound(&conn) else {
        panic!("expected an initial batch");
    };

    // Client side: apply and check what materialized.
    client.feed(1, InboundMessage::Batch(batch));
    let mut events = client.system.tick(&mut client.world);
    let spawned: Vec<NetworkId> = events.take_spawns().into_iter().map(|(id, _)| id).collect();
    assert_eq!(spawned, vec![avatar_id, stranger_id]);
    assert_eq!(client.system.remote().len(), 2);

    let local_avatar = client.local_entity(&avatar_id);
    // The owner's initial seed carries both transform fields.
    assert_eq!(client.world.field(local_avatar, &client.kinds.transform, 0), Some(&value(1)));
    assert_eq!(client.world.field(local_avatar, &client.kinds.transform, 1), Some(&value(2)));

    // The stranger's owner-only regen never crossed the wire.
    let local_stranger = client.local_entity(&stranger_id);
    let health = client
        .world
        .component_snapshot(&local_stranger, &client.kinds.health)
        .unwrap();
    assert_eq!(health.fields.len(), 1);
    assert_eq!(health.fields[0].value, value(50));

    // A field change flows through as an update.
    server_world.set_field(stranger, kinds.health, 0, value(40));
    server.on_component_changed(&stranger, kinds.health);
    server.tick(&mut server_world);
    let Some(OutboundMessage::Batch(batch)) = server.next_outbound(&conn) else {
        panic!("expected an update batch");
    };
    client.feed(2, InboundMessage::Batch(batch));
    client.system.tick(&mut client.world);
    assert_eq!(
        client.world.field(local_stranger, &client.kinds.health, 0),
        Some(&value(40))
    );

    // Leaving relevance despawns the mirror.
    server_world.set_position(stranger, Some(Cell::new(10, 0, 0)));
    server.entity_moved(&server_world, &stranger);
    server.tick(&mut server_world);
    let Some(OutboundMessage::Batch(batch)) = server.next_outbound(&conn) else {
        panic!("expected a despawn batch");
    };
    client.feed(3, InboundMessage::Batch(batch));
    let mut events = client.system.tick(&mut client.world);
    let despawned: Vec<NetworkId> = events.take_despawns().into_iter().map(|(id, _)| id).collect();
    assert_eq!(despawned, vec![stranger_id]);
    assert!(!client.world.has_entity(&local_stranger));
    assert_eq!(client.system.remote().len(), 1);
}

#[test]
fn batch_events_deliver_after_their_spawns() {
    let (mut server, mut server_world, kinds) = authority::hosting();
    let mut client = Client::new();
    client.activate();

    let entity = server_world.spawn_at(Cell::new(0, 0, 0));
    server_world.insert(entity, kinds.transform, vec![value(0), value(0)]);
    let net_id = server.register_entity(&server_world, entity).unwrap();

    // An event referencing an entity the client has not seen yet.
    client.feed(
        1,
        InboundMessage::Event(EventMessage::new(
            EventTarget::Entity(net_id),
            client.chat,
            vec![9],
        )),
    );
    let mut events = client.system.tick(&mut client.world);
    assert!(events.take_deliveries().is_empty());

    // The spawn arrives; the held event resolves on the following tick.
    let snapshot_batch = {
        use crate::messages::batch::{EntityAction, OutboundBatch};
        use crate::messages::snapshot::{ComponentSnapshot, EntitySnapshot, FieldUpdate};
        OutboundBatch {
            tick: 2,
            actions: vec![EntityAction::Spawn(EntitySnapshot {
                net_id,
                components: vec![ComponentSnapshot::new(
                    kinds.transform,
                    vec![FieldUpdate::new(0, value(0))],
                )],
            })],
            events: Vec::new(),
        }
    };
    client.feed(2, InboundMessage::Batch(snapshot_batch));
    let mut events = client.system.tick(&mut client.world);
    assert_eq!(events.take_spawns().len(), 1);
    let deliveries = events.take_deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].payload, vec![9]);
}

#[test]
fn client_forwards_events_to_the_authority() {
    let mut client = Client::new();
    client.activate();

    let net_id = NetworkId::new(1);
    // Mirror one entity so the target resolves locally.
    client.feed(1, InboundMessage::Batch(crate::messages::batch::OutboundBatch {
        tick: 1,
        actions: vec![crate::messages::batch::EntityAction::Spawn(
            crate::messages::snapshot::EntitySnapshot {
                net_id,
                components: Vec::new(),
            },
        )],
        events: Vec::new(),
    }));
    client.system.tick(&mut client.world);

    let message = EventMessage::new(EventTarget::Entity(net_id), client.fire, vec![1]);
    client.system.send_event(message.clone()).unwrap();
    assert_eq!(
        client.system.next_outbound(&client.key),
        Some(OutboundMessage::Event(message))
    );

    // Owner-authoritative events on a locally owned entity execute here
    // instead of being forwarded.
    client.system.remote_mut().set_locally_owned(net_id, true);
    client
        .system
        .send_event(EventMessage::new(
            EventTarget::Entity(net_id),
            client.open_door,
            Vec::new(),
        ))
        .unwrap();
    assert!(client.system.next_outbound(&client.key).is_none());
    let mut events = client.system.tick(&mut client.world);
    let deliveries = events.take_deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].kind, client.open_door);
}

#[test]
fn client_writes_owner_fields_back() {
    let mut client = Client::new();
    client.activate();

    let net_id = NetworkId::new(4);
    client.system.send_field_update(
        net_id,
        client.kinds.transform,
        vec![crate::messages::snapshot::FieldUpdate::new(1, value(9))],
    );
    let Some(OutboundMessage::FieldUpdate { net_id: sent, kind, fields }) =
        client.system.next_outbound(&client.key)
    else {
        panic!("expected a field update message");
    };
    assert_eq!(sent, net_id);
    assert_eq!(kind, client.kinds.transform);
    assert_eq!(fields.len(), 1);
}

#[test]
fn authority_rejection_tears_the_client_down() {
    let mut client = Client::new();
    assert!(matches!(
        client.system.next_outbound(&client.key),
        Some(OutboundMessage::Handshake(_))
    ));

    client.feed(
        0,
        InboundMessage::HandshakeRejected(HandshakeError::EpochMismatch {
            local: 7,
            remote: 8,
        }),
    );
    let mut events = client.system.tick(&mut client.world);
    let rejections = events.take_rejections();
    assert_eq!(rejections.len(), 1);
    assert_eq!(rejections[0].0, client.key);
    assert!(client.system.connection(&client.key).is_none());
}

#[test]
fn incompatible_authority_handshake_tears_the_client_down() {
    let mut client = Client::new();
    client.system.next_outbound(&client.key);

    let mut remote = client.handshake.clone();
    remote.world_epoch = 9;
    client.feed(0, InboundMessage::Handshake(remote));
    let mut events = client.system.tick(&mut client.world);
    assert!(events.take_connections().is_empty());
    assert_eq!(events.take_rejections().len(), 1);
    assert!(client.system.connection(&client.key).is_none());
}
