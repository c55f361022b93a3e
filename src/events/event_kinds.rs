use std::collections::HashMap;

use super::error::EventError;

#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Debug)]
pub struct EventKind(u16);

impl EventKind {
    pub(crate) fn new(value: u16) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u16 {
        self.0
    }
}

/// Where an event type executes. Resolved once at registration, never
/// inspected reflectively per dispatch.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum EventAuthority {
    /// Raised on a remote side it is forwarded to the authority and actually
    /// executes only there.
    ServerAuthoritative,
    /// Executes on whichever side owns the target entity; on the authority
    /// when the owner is null or non-local.
    OwnerAuthoritative,
    /// Executes on the authority, then is relayed to every connection for
    /// which the target entity is relevant.
    Broadcast,
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct EventSpec {
    pub name: &'static str,
    pub authority: EventAuthority,
    /// Only legal for server-authoritative events: execution is bracketed
    /// against a historical snapshot matching the sender's last acked tick.
    pub lag_compensated: bool,
}

/// Registration table of all event types, built once at startup.
pub struct EventKinds {
    specs: Vec<EventSpec>,
    names: HashMap<&'static str, EventKind>,
}

impl EventKinds {
    pub fn new() -> Self {
        Self {
            specs: Vec::new(),
            names: HashMap::new(),
        }
    }

    pub fn register(
        &mut self,
        name: &'static str,
        authority: EventAuthority,
        lag_compensated: bool,
    ) -> Result<EventKind, EventError> {
        if self.names.contains_key(name) {
            return Err(EventError::DuplicateEvent(name.to_string()));
        }
        if lag_compensated && authority != EventAuthority::ServerAuthoritative {
            return Err(EventError::LagCompensationNotServerAuthoritative(
                name.to_string(),
            ));
        }
        let kind = EventKind::new(self.specs.len() as u16);
        self.specs.push(EventSpec {
            name,
            authority,
            lag_compensated,
        });
        self.names.insert(name, kind);
        Ok(kind)
    }

    pub fn spec(&self, kind: &EventKind) -> Option<&EventSpec> {
        self.specs.get(kind.value() as usize)
    }

    pub fn kind_to_name(&self, kind: &EventKind) -> &'static str {
        self.spec(kind).map(|s| s.name).unwrap_or("<unregistered>")
    }
}

impl Default for EventKinds {
    fn default() -> Self {
        Self::new()
    }
}
