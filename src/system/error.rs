use thiserror::Error;

use crate::connection::key::ConnectionKey;
use crate::events::error::EventError;
use crate::messages::handshake::HandshakeError;
use crate::registry::error::RegistryError;

use super::mode::AuthorityMode;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SystemError {
    #[error("transition to {0:?} is only legal from Standalone")]
    InvalidModeTransition(AuthorityMode),
    #[error("{0} does not exist")]
    UnknownConnection(ConnectionKey),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Event(#[from] EventError),
    #[error(transparent)]
    Handshake(#[from] HandshakeError),
}
