// ComponentKind
//
// Dense index into the ReplicationRules schema table. Kinds are handed out
// at registration time and are stable for the process lifetime; both sides
// of a connection must agree on the table (verified during handshake).
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Debug)]
pub struct ComponentKind(u16);

impl ComponentKind {
    pub(crate) fn new(value: u16) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u16 {
        self.0
    }
}
