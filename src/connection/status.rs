/// Connection lifecycle. No replication happens before `Active`; at
/// `Disconnected` all per-connection state is discarded.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum ConnectionStatus {
    AwaitingHandshake,
    Active,
    Disconnected,
}

impl ConnectionStatus {
    pub fn is_active(self) -> bool {
        self == ConnectionStatus::Active
    }
}
