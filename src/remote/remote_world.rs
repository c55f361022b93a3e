use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use log::warn;

use crate::messages::batch::{EntityAction, OutboundBatch};
use crate::messages::event_message::EventMessage;
use crate::world::net_id::NetworkId;
use crate::world::world_type::WorldMutType;

/// Result of applying one authoritative batch to the local store.
pub struct AppliedBatch<E> {
    pub spawned: Vec<(NetworkId, E)>,
    pub despawned: Vec<(NetworkId, E)>,
    pub events: Vec<EventMessage>,
}

/// Connected-mode mirror of the authority's replicated entities: maps each
/// NetworkId to the local entity it materialized as, and applies inbound
/// batches to the local store in order.
pub struct RemoteWorld<E: Copy + Eq + Hash> {
    entities: HashMap<NetworkId, E>,
    /// Entities this side owns, per game logic's possession decisions.
    /// Owner-authoritative events targeting these execute locally.
    locally_owned: HashSet<NetworkId>,
}

impl<E: Copy + Eq + Hash> RemoteWorld<E> {
    pub fn new() -> Self {
        Self {
            entities: HashMap::new(),
            locally_owned: HashSet::new(),
        }
    }

    pub fn entity(&self, net_id: &NetworkId) -> Option<E> {
        self.entities.get(net_id).copied()
    }

    pub fn net_id_of(&self, entity: &E) -> Option<NetworkId>
    where
        E: PartialEq,
    {
        self.entities
            .iter()
            .find(|(_, e)| *e == entity)
            .map(|(net_id, _)| *net_id)
    }

    pub fn set_locally_owned(&mut self, net_id: NetworkId, owned: bool) {
        if owned {
            self.locally_owned.insert(net_id);
        } else {
            self.locally_owned.remove(&net_id);
        }
    }

    pub fn is_locally_owned(&self, net_id: &NetworkId) -> bool {
        self.locally_owned.contains(net_id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Applies one batch in action order. Stale removals are dropped
    /// silently; updates for unknown entities are dropped with a warning.
    /// Event messages are returned for the router; they are not executed
    /// here.
    pub fn apply_batch<W: WorldMutType<E>>(
        &mut self,
        world: &mut W,
        batch: OutboundBatch,
    ) -> AppliedBatch<E> {
        let mut spawned = Vec::new();
        let mut despawned = Vec::new();

        for action in batch.actions {
            match action {
                EntityAction::Despawn(net_id) => {
                    let Some(entity) = self.entities.remove(&net_id) else {
                        // Stale removal, already gone.
                        continue;
                    };
                    self.locally_owned.remove(&net_id);
                    world.despawn_entity(&entity);
                    despawned.push((net_id, entity));
                }
                EntityAction::Spawn(snapshot) => {
                    if let Some(existing) = self.entities.get(&snapshot.net_id) {
                        // Re-initial send (re-entered relevance or ownership
                        // change): replace component state in place.
                        for component in &snapshot.components {
                            world.insert_component(existing, component);
                        }
                        continue;
                    }
                    let entity = world.spawn_from_snapshot(&snapshot);
                    self.entities.insert(snapshot.net_id, entity);
                    spawned.push((snapshot.net_id, entity));
                }
                EntityAction::Update(update) => {
                    let Some(entity) = self.entities.get(&update.net_id) else {
                        warn!(
                            "dropping update for unknown entity {}",
                            update.net_id
                        );
                        continue;
                    };
                    for component in &update.added {
                        world.insert_component(entity, component);
                    }
                    for component in &update.changed {
                        world.apply_field_update(entity, &component.kind, &component.fields);
                    }
                    for kind in &update.removed {
                        world.remove_component(entity, kind);
                    }
                }
            }
        }

        AppliedBatch {
            spawned,
            despawned,
            events: batch.events,
        }
    }
}

impl<E: Copy + Eq + Hash> Default for RemoteWorld<E> {
    fn default() -> Self {
        Self::new()
    }
}
