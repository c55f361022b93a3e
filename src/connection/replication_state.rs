use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;

use crate::messages::batch::{EntityAction, EntityUpdate, OutboundBatch};
use crate::messages::event_message::EventMessage;
use crate::messages::snapshot::EntitySnapshot;
use crate::policy::component_kind::ComponentKind;
use crate::policy::rules::ReplicationRules;
use crate::registry::identity_registry::IdentityRegistry;
use crate::types::Tick;
use crate::world::net_id::NetworkId;
use crate::world::world_type::WorldRefType;

use super::key::ConnectionKey;

/// Per-connection replication bookkeeping: which entities are newly relevant
/// (initial), which have pending deltas (dirty), which must be forgotten
/// (removed), plus the per-component delta multimaps and the outbound event
/// queue.
///
/// Invariant held by every operation: a NetworkId is in at most one of
/// `initial` / `dirty` / `removed` at any instant. `relevant` additionally
/// contains every id in `initial` or `dirty`.
pub struct ReplicationState {
    relevant: HashSet<NetworkId>,
    initial: HashSet<NetworkId>,
    dirty: HashSet<NetworkId>,
    removed: HashSet<NetworkId>,
    added_components: HashMap<NetworkId, HashSet<ComponentKind>>,
    dirty_components: HashMap<NetworkId, HashSet<ComponentKind>>,
    removed_components: HashMap<NetworkId, HashSet<ComponentKind>>,
    outbound_events: VecDeque<EventMessage>,
}

impl ReplicationState {
    pub fn new() -> Self {
        Self {
            relevant: HashSet::new(),
            initial: HashSet::new(),
            dirty: HashSet::new(),
            removed: HashSet::new(),
            added_components: HashMap::new(),
            dirty_components: HashMap::new(),
            removed_components: HashMap::new(),
            outbound_events: VecDeque::new(),
        }
    }

    pub fn is_relevant(&self, net_id: &NetworkId) -> bool {
        self.relevant.contains(net_id)
    }

    pub fn is_pending_initial(&self, net_id: &NetworkId) -> bool {
        self.initial.contains(net_id)
    }

    pub fn is_pending_removal(&self, net_id: &NetworkId) -> bool {
        self.removed.contains(net_id)
    }

    pub fn is_dirty(&self, net_id: &NetworkId) -> bool {
        self.dirty.contains(net_id)
    }

    /// The entity became relevant to this connection. Schedules a full-state
    /// send; any stale incremental bookkeeping for the id is moot and is
    /// discarded.
    pub fn mark_relevant(&mut self, net_id: NetworkId) {
        if self.removed.remove(&net_id) {
            // Left and returned within one flush window: the pending removal
            // is superseded by a fresh full-state send.
            self.relevant.insert(net_id);
            self.initial.insert(net_id);
            return;
        }
        if self.relevant.contains(&net_id) {
            return;
        }
        self.relevant.insert(net_id);
        self.dirty.remove(&net_id);
        self.clear_deltas(&net_id);
        self.initial.insert(net_id);
    }

    /// The entity left the connection's interest region or was destroyed.
    /// If it was never sent, it is silently dropped; otherwise the client
    /// must be told to forget it.
    pub fn mark_irrelevant_or_destroyed(&mut self, net_id: &NetworkId) {
        if self.initial.remove(net_id) {
            // Pending initial that never flushed: the client never learned
            // of this entity, nothing to send.
            self.relevant.remove(net_id);
            self.clear_deltas(net_id);
            return;
        }
        if self.relevant.remove(net_id) {
            self.dirty.remove(net_id);
            self.clear_deltas(net_id);
            self.removed.insert(*net_id);
        }
    }

    /// Ownership changed: schedule a full re-send so every field's
    /// visibility is re-evaluated against the new owner.
    pub fn refresh(&mut self, net_id: &NetworkId) {
        if !self.relevant.contains(net_id) || self.initial.contains(net_id) {
            return;
        }
        self.dirty.remove(net_id);
        self.clear_deltas(net_id);
        self.initial.insert(*net_id);
    }

    pub fn mark_component_added(&mut self, net_id: &NetworkId, kind: ComponentKind) {
        if !self.delta_applies(net_id) {
            return;
        }
        if Self::multimap_remove(&mut self.removed_components, net_id, &kind) {
            // Removal and re-addition within one flush collapse to "changed".
            Self::multimap_insert(&mut self.dirty_components, net_id, kind);
        } else {
            Self::multimap_insert(&mut self.added_components, net_id, kind);
        }
        self.dirty.insert(*net_id);
    }

    pub fn mark_component_removed(&mut self, net_id: &NetworkId, kind: ComponentKind) {
        if !self.delta_applies(net_id) {
            return;
        }
        if Self::multimap_remove(&mut self.added_components, net_id, &kind) {
            // Addition and removal within one flush cancel to a net no-op.
            Self::multimap_remove(&mut self.dirty_components, net_id, &kind);
            if !self.has_deltas(net_id) {
                self.dirty.remove(net_id);
            }
            return;
        }
        // No point sending fields for a component about to vanish.
        Self::multimap_remove(&mut self.dirty_components, net_id, &kind);
        Self::multimap_insert(&mut self.removed_components, net_id, kind);
        self.dirty.insert(*net_id);
    }

    pub fn mark_field_dirty(&mut self, net_id: &NetworkId, kind: ComponentKind) {
        if !self.delta_applies(net_id) {
            return;
        }
        // A pending addition implies a full-field send; a pending removal
        // makes field changes moot.
        if Self::multimap_contains(&self.added_components, net_id, &kind)
            || Self::multimap_contains(&self.removed_components, net_id, &kind)
        {
            return;
        }
        Self::multimap_insert(&mut self.dirty_components, net_id, kind);
        self.dirty.insert(*net_id);
    }

    pub fn queue_event(&mut self, message: EventMessage) {
        self.outbound_events.push_back(message);
    }

    /// Drains all accumulated state into an immutable outbound batch.
    ///
    /// Ids the registry or world no longer knows mid-flush are dropped
    /// silently; a flush never fails. All sets and delta multimaps are
    /// cleared atomically once the batch is built (at-most-once per cycle).
    pub fn flush<E: Copy + Eq + Hash, W: WorldRefType<E>>(
        &mut self,
        tick: Tick,
        world: &W,
        registry: &IdentityRegistry<E>,
        rules: &ReplicationRules,
        connection: &ConnectionKey,
    ) -> OutboundBatch {
        let mut actions = Vec::new();

        let mut removed: Vec<NetworkId> = self.removed.drain().collect();
        removed.sort_unstable();
        for net_id in removed {
            actions.push(EntityAction::Despawn(net_id));
        }

        let mut initial: Vec<NetworkId> = self.initial.drain().collect();
        initial.sort_unstable();
        for net_id in initial {
            let Some(snapshot) = Self::full_snapshot(&net_id, world, registry, rules, connection)
            else {
                // Unregistered or despawned mid-tick; the connection was
                // never told about it, so there is nothing to retract.
                self.relevant.remove(&net_id);
                continue;
            };
            actions.push(EntityAction::Spawn(snapshot));
        }

        let mut dirty: Vec<NetworkId> = self.dirty.drain().collect();
        dirty.sort_unstable();
        for net_id in dirty {
            let Some(update) = self.build_update(&net_id, world, registry, rules, connection)
            else {
                continue;
            };
            if !update.is_empty() {
                actions.push(EntityAction::Update(update));
            }
        }

        self.added_components.clear();
        self.dirty_components.clear();
        self.removed_components.clear();

        OutboundBatch {
            tick,
            actions,
            events: self.outbound_events.drain(..).collect(),
        }
    }

    /// Discards everything. Used at disconnect; nothing queued here is ever
    /// retried.
    pub fn clear(&mut self) {
        self.relevant.clear();
        self.initial.clear();
        self.dirty.clear();
        self.removed.clear();
        self.added_components.clear();
        self.dirty_components.clear();
        self.removed_components.clear();
        self.outbound_events.clear();
    }

    pub fn relevant_ids(&self) -> impl Iterator<Item = &NetworkId> {
        self.relevant.iter()
    }

    fn delta_applies(&self, net_id: &NetworkId) -> bool {
        // Deltas only accumulate for entities the connection has been told
        // about; a pending initial subsumes them with a full snapshot.
        self.relevant.contains(net_id) && !self.initial.contains(net_id)
    }

    fn has_deltas(&self, net_id: &NetworkId) -> bool {
        self.added_components.contains_key(net_id)
            || self.dirty_components.contains_key(net_id)
            || self.removed_components.contains_key(net_id)
    }

    fn full_snapshot<E: Copy + Eq + Hash, W: WorldRefType<E>>(
        net_id: &NetworkId,
        world: &W,
        registry: &IdentityRegistry<E>,
        rules: &ReplicationRules,
        connection: &ConnectionKey,
    ) -> Option<EntitySnapshot> {
        let entity = registry.lookup(net_id)?;
        if !world.has_entity(&entity) {
            return None;
        }
        let is_owner = registry.owner_of(net_id) == Some(*connection);
        let mut components = Vec::new();
        for kind in world.component_kinds(&entity) {
            let Some(raw) = world.component_snapshot(&entity, &kind) else {
                continue;
            };
            if let Some(filtered) = rules.filter_snapshot(&raw, is_owner, true) {
                components.push(filtered);
            }
        }
        Some(EntitySnapshot {
            net_id: *net_id,
            components,
        })
    }

    fn build_update<E: Copy + Eq + Hash, W: WorldRefType<E>>(
        &self,
        net_id: &NetworkId,
        world: &W,
        registry: &IdentityRegistry<E>,
        rules: &ReplicationRules,
        connection: &ConnectionKey,
    ) -> Option<EntityUpdate> {
        let entity = registry.lookup(net_id)?;
        if !world.has_entity(&entity) {
            return None;
        }
        let is_owner = registry.owner_of(net_id) == Some(*connection);

        let mut added = Vec::new();
        if let Some(kinds) = self.added_components.get(net_id) {
            let mut kinds: Vec<_> = kinds.iter().copied().collect();
            kinds.sort_unstable();
            for kind in kinds {
                let Some(raw) = world.component_snapshot(&entity, &kind) else {
                    continue;
                };
                // A component inserted after the entity's initial send is at
                // its own creation point: initial-only fields go out here,
                // exactly once.
                if let Some(filtered) = rules.filter_snapshot(&raw, is_owner, true) {
                    added.push(filtered);
                }
            }
        }

        let mut changed = Vec::new();
        if let Some(kinds) = self.dirty_components.get(net_id) {
            let mut kinds: Vec<_> = kinds.iter().copied().collect();
            kinds.sort_unstable();
            for kind in kinds {
                let Some(raw) = world.component_snapshot(&entity, &kind) else {
                    continue;
                };
                if let Some(filtered) = rules.filter_snapshot(&raw, is_owner, false) {
                    changed.push(filtered);
                }
            }
        }

        let mut removed: Vec<ComponentKind> = self
            .removed_components
            .get(net_id)
            .map(|kinds| kinds.iter().copied().collect())
            .unwrap_or_default();
        removed.sort_unstable();

        Some(EntityUpdate {
            net_id: *net_id,
            added,
            changed,
            removed,
        })
    }

    fn multimap_insert(
        map: &mut HashMap<NetworkId, HashSet<ComponentKind>>,
        net_id: &NetworkId,
        kind: ComponentKind,
    ) {
        map.entry(*net_id).or_default().insert(kind);
    }

    fn multimap_remove(
        map: &mut HashMap<NetworkId, HashSet<ComponentKind>>,
        net_id: &NetworkId,
        kind: &ComponentKind,
    ) -> bool {
        let Some(kinds) = map.get_mut(net_id) else {
            return false;
        };
        let removed = kinds.remove(kind);
        if kinds.is_empty() {
            map.remove(net_id);
        }
        removed
    }

    fn multimap_contains(
        map: &HashMap<NetworkId, HashSet<ComponentKind>>,
        net_id: &NetworkId,
        kind: &ComponentKind,
    ) -> bool {
        map.get(net_id).is_some_and(|kinds| kinds.contains(kind))
    }

    fn clear_deltas(&mut self, net_id: &NetworkId) {
        self.added_components.remove(net_id);
        self.dirty_components.remove(net_id);
        self.removed_components.remove(net_id);
    }
}

impl Default for ReplicationState {
    fn default() -> Self {
        Self::new()
    }
}
