use thiserror::Error;

use crate::world::net_id::NetworkId;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    #[error("entity is already registered as {0}")]
    AlreadyRegistered(NetworkId),
    #[error("{0} is not registered")]
    NotRegistered(NetworkId),
}
