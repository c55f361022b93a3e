/// Declared direction of a replicated field.
///
/// The directive is half of the decision; the other half is whether the
/// receiving connection owns the entity, which differs per entity and is why
/// there is no "send to everyone" shortcut anywhere in the policy.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum ReplicationDirective {
    /// Replicated to every connection the entity is relevant to.
    ServerToClient,
    /// Replicated only to the entity's owning connection.
    ServerToOwner,
    /// Written by the owning connection; the authority seeds the owner once
    /// on the initial send and otherwise never replicates it out.
    OwnerToServer,
    /// Written by the owning connection, relayed by the authority to every
    /// other connection. Never echoed back to the owner after the initial
    /// send.
    OwnerToServerToClient,
    /// Sent exactly once, on the entity's initial send to a connection.
    InitialOnly,
}

/// Per-field replication rule: directive plus the send-once flag.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    pub directive: ReplicationDirective,
    /// Send once on creation, never again, regardless of directive.
    pub initial_only: bool,
}

impl FieldSpec {
    pub fn new(name: &'static str, directive: ReplicationDirective) -> Self {
        Self {
            name,
            directive,
            initial_only: false,
        }
    }

    pub fn send_once(name: &'static str, directive: ReplicationDirective) -> Self {
        Self {
            name,
            directive,
            initial_only: true,
        }
    }
}
