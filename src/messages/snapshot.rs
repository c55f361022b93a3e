use crate::policy::component_kind::ComponentKind;
use crate::types::FieldId;
use crate::world::net_id::NetworkId;

// FieldValue
//
// Opaque codec payload for a single field. The replication layer only moves
// these around and compares them; encoding and decoding belong to the
// external message codec.
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct FieldValue(Vec<u8>);

impl FieldValue {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub struct FieldUpdate {
    pub field: FieldId,
    pub value: FieldValue,
}

impl FieldUpdate {
    pub fn new(field: FieldId, value: FieldValue) -> Self {
        Self { field, value }
    }
}

/// All captured fields of one component instance, in schema order.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct ComponentSnapshot {
    pub kind: ComponentKind,
    pub fields: Vec<FieldUpdate>,
}

impl ComponentSnapshot {
    pub fn new(kind: ComponentKind, fields: Vec<FieldUpdate>) -> Self {
        Self { kind, fields }
    }
}

/// Full-state capture of an entity, the payload of an initial send.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct EntitySnapshot {
    pub net_id: NetworkId,
    pub components: Vec<ComponentSnapshot>,
}
