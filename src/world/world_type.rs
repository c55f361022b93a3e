use crate::messages::snapshot::{ComponentSnapshot, EntitySnapshot, FieldUpdate};
use crate::policy::component_kind::ComponentKind;

use super::cell::Cell;

/// Read access to the collaborating entity-component store.
///
/// The replication layer never inspects component internals; it asks the
/// store for opaque snapshots and filters them through the field policy.
pub trait WorldRefType<E> {
    fn has_entity(&self, entity: &E) -> bool;
    fn component_kinds(&self, entity: &E) -> Vec<ComponentKind>;
    /// Unfiltered capture of one component's fields, in schema order.
    /// None if the entity or component is gone.
    fn component_snapshot(&self, entity: &E, kind: &ComponentKind) -> Option<ComponentSnapshot>;
    /// The entity's current relevance cell. None for entities without a
    /// spatial location.
    fn position(&self, entity: &E) -> Option<Cell>;
}

/// Write access, used when applying authoritative state on the remote side
/// and owner field writes on the authority.
pub trait WorldMutType<E>: WorldRefType<E> {
    fn spawn_from_snapshot(&mut self, snapshot: &EntitySnapshot) -> E;
    fn despawn_entity(&mut self, entity: &E);
    fn insert_component(&mut self, entity: &E, snapshot: &ComponentSnapshot);
    fn remove_component(&mut self, entity: &E, kind: &ComponentKind);
    fn apply_field_update(&mut self, entity: &E, kind: &ComponentKind, fields: &[FieldUpdate]);
}
