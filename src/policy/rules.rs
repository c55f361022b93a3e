use std::collections::HashMap;

use crate::messages::snapshot::ComponentSnapshot;
use crate::types::FieldId;

use super::component_kind::ComponentKind;
use super::directive::{FieldSpec, ReplicationDirective};
use super::error::PolicyError;

pub struct ComponentSchema {
    name: &'static str,
    fields: Vec<FieldSpec>,
}

impl ComponentSchema {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, field: FieldId) -> Option<&FieldSpec> {
        self.fields.get(field as usize)
    }
}

/// Declarative per-component-type replication table, built once at startup
/// and consulted by index afterwards. No runtime type introspection.
pub struct ReplicationRules {
    schemas: Vec<ComponentSchema>,
    names: HashMap<&'static str, ComponentKind>,
}

impl ReplicationRules {
    pub fn new() -> Self {
        Self {
            schemas: Vec::new(),
            names: HashMap::new(),
        }
    }

    /// Registers a component type's field table and returns its kind.
    pub fn register_component(
        &mut self,
        name: &'static str,
        fields: Vec<FieldSpec>,
    ) -> Result<ComponentKind, PolicyError> {
        if self.names.contains_key(name) {
            return Err(PolicyError::DuplicateComponent(name.to_string()));
        }
        if fields.is_empty() {
            return Err(PolicyError::EmptySchema(name.to_string()));
        }
        let kind = ComponentKind::new(self.schemas.len() as u16);
        self.schemas.push(ComponentSchema { name, fields });
        self.names.insert(name, kind);
        Ok(kind)
    }

    pub fn schema(&self, kind: &ComponentKind) -> Option<&ComponentSchema> {
        self.schemas.get(kind.value() as usize)
    }

    pub fn kind_from_name(&self, name: &str) -> Option<ComponentKind> {
        self.names.get(name).copied()
    }

    pub fn kind_to_name(&self, kind: &ComponentKind) -> &'static str {
        self.schema(kind).map(|s| s.name).unwrap_or("<unregistered>")
    }

    /// The (name, kind) pairs both sides must agree on at handshake time.
    pub fn type_table(&self) -> Vec<(String, u16)> {
        self.schemas
            .iter()
            .enumerate()
            .map(|(index, schema)| (schema.name.to_string(), index as u16))
            .collect()
    }

    /// Decision table for outbound sends, evaluated independently per
    /// (field, connection) pair.
    pub fn should_send(spec: &FieldSpec, is_owner: bool, is_initial: bool) -> bool {
        if spec.initial_only && !is_initial {
            return false;
        }
        match spec.directive {
            ReplicationDirective::ServerToClient => true,
            ReplicationDirective::ServerToOwner => is_owner,
            ReplicationDirective::OwnerToServer => is_owner && is_initial,
            ReplicationDirective::OwnerToServerToClient => is_initial || !is_owner,
            ReplicationDirective::InitialOnly => is_initial,
        }
    }

    /// Whether an inbound value for this field is trusted from the given
    /// connection. Only owner-directed fields arriving from the owner are.
    pub fn trusts_inbound(spec: &FieldSpec, is_owner: bool) -> bool {
        match spec.directive {
            ReplicationDirective::OwnerToServer
            | ReplicationDirective::OwnerToServerToClient => is_owner,
            _ => false,
        }
    }

    /// Filters a raw component snapshot down to the fields visible to the
    /// given connection. Returns None when nothing survives, in which case
    /// the component is omitted from the message entirely.
    pub fn filter_snapshot(
        &self,
        snapshot: &ComponentSnapshot,
        is_owner: bool,
        is_initial: bool,
    ) -> Option<ComponentSnapshot> {
        let schema = self.schema(&snapshot.kind)?;
        let fields: Vec<_> = snapshot
            .fields
            .iter()
            .filter(|update| {
                schema
                    .field(update.field)
                    .is_some_and(|spec| Self::should_send(spec, is_owner, is_initial))
            })
            .cloned()
            .collect();
        if fields.is_empty() {
            return None;
        }
        Some(ComponentSnapshot {
            kind: snapshot.kind,
            fields,
        })
    }
}

impl Default for ReplicationRules {
    fn default() -> Self {
        Self::new()
    }
}
