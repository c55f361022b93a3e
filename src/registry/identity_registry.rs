use std::collections::HashMap;
use std::hash::Hash;

use crate::connection::key::ConnectionKey;
use crate::world::net_id::NetworkId;

use super::error::RegistryError;

struct EntityRecord<E> {
    entity: E,
    owner: Option<ConnectionKey>,
    always_relevant: bool,
}

/// Maps NetworkId <-> entity for every entity participating in replication,
/// and tracks each entity's current authoritative owner.
///
/// Identifiers are allocated from a monotonic counter and never reused, so a
/// late message for a retired id can never alias a live entity.
pub struct IdentityRegistry<E: Copy + Eq + Hash> {
    next_id: u32,
    entity_to_id: HashMap<E, NetworkId>,
    records: HashMap<NetworkId, EntityRecord<E>>,
}

impl<E: Copy + Eq + Hash> IdentityRegistry<E> {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            entity_to_id: HashMap::new(),
            records: HashMap::new(),
        }
    }

    /// Allocates a fresh NetworkId for the entity.
    pub fn register(&mut self, entity: E) -> Result<NetworkId, RegistryError> {
        if let Some(existing) = self.entity_to_id.get(&entity) {
            return Err(RegistryError::AlreadyRegistered(*existing));
        }
        let net_id = NetworkId::new(self.next_id);
        self.next_id += 1;
        self.entity_to_id.insert(entity, net_id);
        self.records.insert(
            net_id,
            EntityRecord {
                entity,
                owner: None,
                always_relevant: false,
            },
        );
        Ok(net_id)
    }

    /// Invalidates the mapping. Must be called exactly once per entity
    /// retirement, after every connection still holding the id has been
    /// scheduled a removal (the Network System's responsibility).
    pub fn unregister(&mut self, net_id: &NetworkId) -> Result<E, RegistryError> {
        let record = self
            .records
            .remove(net_id)
            .ok_or(RegistryError::NotRegistered(*net_id))?;
        self.entity_to_id.remove(&record.entity);
        Ok(record.entity)
    }

    pub fn lookup(&self, net_id: &NetworkId) -> Option<E> {
        self.records.get(net_id).map(|record| record.entity)
    }

    pub fn net_id_of(&self, entity: &E) -> Option<NetworkId> {
        self.entity_to_id.get(entity).copied()
    }

    pub fn owner_of(&self, net_id: &NetworkId) -> Option<ConnectionKey> {
        self.records.get(net_id).and_then(|record| record.owner)
    }

    /// Reassigns the entity's owner, returning the previous one so the
    /// caller can re-evaluate field visibility for both connections.
    pub fn set_owner(
        &mut self,
        net_id: &NetworkId,
        owner: Option<ConnectionKey>,
    ) -> Result<Option<ConnectionKey>, RegistryError> {
        let record = self
            .records
            .get_mut(net_id)
            .ok_or(RegistryError::NotRegistered(*net_id))?;
        Ok(std::mem::replace(&mut record.owner, owner))
    }

    /// Drops ownership records pointing at a disconnected connection.
    /// Reassignment or destruction of the orphaned entities is the game
    /// logic collaborator's decision.
    pub fn clear_owner(&mut self, connection: &ConnectionKey) -> Vec<NetworkId> {
        let mut orphaned = Vec::new();
        for (net_id, record) in self.records.iter_mut() {
            if record.owner == Some(*connection) {
                record.owner = None;
                orphaned.push(*net_id);
            }
        }
        orphaned
    }

    /// World-scoped singletons and the like: relevant to every active
    /// connection, bypassing cell containment entirely.
    pub fn set_always_relevant(
        &mut self,
        net_id: &NetworkId,
        always: bool,
    ) -> Result<(), RegistryError> {
        let record = self
            .records
            .get_mut(net_id)
            .ok_or(RegistryError::NotRegistered(*net_id))?;
        record.always_relevant = always;
        Ok(())
    }

    pub fn is_always_relevant(&self, net_id: &NetworkId) -> bool {
        self.records
            .get(net_id)
            .is_some_and(|record| record.always_relevant)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NetworkId, E)> + '_ {
        self.records
            .iter()
            .map(|(net_id, record)| (*net_id, record.entity))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<E: Copy + Eq + Hash> Default for IdentityRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}
