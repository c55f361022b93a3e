use std::fmt;

// NetworkId
//
// Stable per-entity replication handle, assigned by the authority when an
// entity is registered and valid until the entity is unregistered.
// Identifiers are allocated from a monotonic counter and never reused.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Debug)]
pub struct NetworkId(u32);

impl NetworkId {
    pub(crate) fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NetworkId({})", self.0)
    }
}
