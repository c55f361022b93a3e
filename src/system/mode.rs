/// Authority mode of the local process.
///
/// Transitions only happen from `Standalone`; a full teardown (close every
/// connection, reset all per-connection state) is required before returning
/// there.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum AuthorityMode {
    /// No replication, single local participant.
    Standalone,
    /// This process is authoritative and accepts connections.
    Hosting,
    /// This process is a pure client of a remote authority.
    Connected,
}

impl AuthorityMode {
    /// Whether events and state changes execute authoritatively here.
    pub fn is_authority(self) -> bool {
        matches!(self, AuthorityMode::Standalone | AuthorityMode::Hosting)
    }
}
