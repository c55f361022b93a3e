use thiserror::Error;

/// A content module both sides must have loaded, with its exact version.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct ModuleInfo {
    pub name: String,
    pub version: String,
}

impl ModuleInfo {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
        }
    }
}

/// Negotiated state exchanged at connect time, before any entity messages.
///
/// The byte layout is the codec's concern; the *content* is a protocol
/// invariant. Any disagreement found by [`HandshakePayload::verify`] is a
/// fatal invalidation of the connection, not a recoverable error.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct HandshakePayload {
    pub world_epoch: u64,
    /// Informational; not part of the compatibility check.
    pub world_time_ms: u64,
    pub modules: Vec<ModuleInfo>,
    /// (component type name, kind index) pairs, in table order.
    pub type_table: Vec<(String, u16)>,
}

impl HandshakePayload {
    /// Verifies a remote payload against this side's expectations.
    /// The first disagreement found is returned as the rejection reason.
    pub fn verify(&self, remote: &HandshakePayload) -> Result<(), HandshakeError> {
        if self.world_epoch != remote.world_epoch {
            return Err(HandshakeError::EpochMismatch {
                local: self.world_epoch,
                remote: remote.world_epoch,
            });
        }
        for module in &self.modules {
            match remote.modules.iter().find(|m| m.name == module.name) {
                None => {
                    return Err(HandshakeError::MissingModule(module.name.clone()));
                }
                Some(found) if found.version != module.version => {
                    return Err(HandshakeError::ModuleVersionMismatch {
                        module: module.name.clone(),
                        local: module.version.clone(),
                        remote: found.version.clone(),
                    });
                }
                Some(_) => {}
            }
        }
        for module in &remote.modules {
            if !self.modules.iter().any(|m| m.name == module.name) {
                return Err(HandshakeError::UnexpectedModule(module.name.clone()));
            }
        }
        if self.type_table.len() != remote.type_table.len() {
            return Err(HandshakeError::TypeTableSizeMismatch {
                local: self.type_table.len(),
                remote: remote.type_table.len(),
            });
        }
        for (local, found) in self.type_table.iter().zip(remote.type_table.iter()) {
            if local != found {
                return Err(HandshakeError::TypeTableMismatch {
                    name: local.0.clone(),
                    local: local.1,
                    remote: found.1,
                });
            }
        }
        Ok(())
    }
}

/// Reasons a connection is refused before any entity replication begins.
/// These are surfaced verbatim to the connecting side.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("world epoch mismatch: local {local}, remote {remote}")]
    EpochMismatch { local: u64, remote: u64 },
    #[error("remote side is missing content module `{0}`")]
    MissingModule(String),
    #[error("remote side has unexpected content module `{0}`")]
    UnexpectedModule(String),
    #[error("content module `{module}` version mismatch: local {local}, remote {remote}")]
    ModuleVersionMismatch {
        module: String,
        local: String,
        remote: String,
    },
    #[error("type table size mismatch: local {local} entries, remote {remote}")]
    TypeTableSizeMismatch { local: usize, remote: usize },
    #[error("type table disagrees on `{name}`: local id {local}, remote id {remote}")]
    TypeTableMismatch { name: String, local: u16, remote: u16 },
}
