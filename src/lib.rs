//! # Mantle
//! Authoritative client/server replication layer for mutable
//! entity-component worlds: per-connection interest management,
//! field-level replication policy, and authority-aware event routing.
//!
//! The wire encoding and the transport are external collaborators; this
//! crate decides *what* to send, *to whom*, *when*, and filtered *how*.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod connection;
mod events;
mod messages;
mod policy;
mod registry;
mod relevance;
mod remote;
mod system;
mod types;
mod world;

mod tests;

pub use connection::{
    connection::Connection,
    key::ConnectionKey,
    replication_state::ReplicationState,
    status::ConnectionStatus,
};
pub use events::{
    error::EventError,
    event_kinds::{EventAuthority, EventKind, EventKinds, EventSpec},
    router::{EventRouter, LagCompensator, PendingEvent},
};
pub use messages::{
    batch::{EntityAction, EntityUpdate, OutboundBatch},
    event_message::{EventMessage, EventTarget},
    handshake::{HandshakeError, HandshakePayload, ModuleInfo},
    inbound::{InboundEnvelope, InboundMessage},
    outbound::OutboundMessage,
    snapshot::{ComponentSnapshot, EntitySnapshot, FieldUpdate, FieldValue},
};
pub use policy::{
    component_kind::ComponentKind,
    directive::{FieldSpec, ReplicationDirective},
    error::PolicyError,
    rules::{ComponentSchema, ReplicationRules},
};
pub use registry::{error::RegistryError, identity_registry::IdentityRegistry};
pub use relevance::{
    manager::RelevanceManager,
    region::{CellTransitions, InterestRegion},
};
pub use remote::remote_world::{AppliedBatch, RemoteWorld};
pub use system::{
    command_queue::ConnectionCommandQueue,
    config::SystemConfig,
    error::SystemError,
    mode::AuthorityMode,
    network_system::NetworkSystem,
    system_events::{EventDelivery, ReplicationEvents},
};
pub use types::{FieldId, Tick};
pub use world::{cell::Cell, net_id::NetworkId, world_type::{WorldMutType, WorldRefType}};
