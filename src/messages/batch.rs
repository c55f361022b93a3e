use crate::policy::component_kind::ComponentKind;
use crate::types::Tick;
use crate::world::net_id::NetworkId;

use super::event_message::EventMessage;
use super::snapshot::{ComponentSnapshot, EntitySnapshot};

/// Partial update for an entity the connection already knows about.
/// `added` snapshots carry every creation-visible field of the new
/// component; `changed` snapshots carry only non-initial-only fields.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct EntityUpdate {
    pub net_id: NetworkId,
    pub added: Vec<ComponentSnapshot>,
    pub changed: Vec<ComponentSnapshot>,
    pub removed: Vec<ComponentKind>,
}

impl EntityUpdate {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub enum EntityAction {
    /// Full-state send: the entity just became relevant to the connection.
    Spawn(EntitySnapshot),
    /// Delta send: the entity is already relevant and has pending changes.
    Update(EntityUpdate),
    /// The connection must forget the entity.
    Despawn(NetworkId),
}

/// Immutable result of one flush, handed to the transport by move and never
/// mutated afterwards. Redelivery on transport failure is the transport's
/// concern.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct OutboundBatch {
    pub tick: Tick,
    pub actions: Vec<EntityAction>,
    pub events: Vec<EventMessage>,
}

impl OutboundBatch {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty() && self.events.is_empty()
    }
}
