use thiserror::Error;

use super::event_kinds::EventKind;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("event type `{0}` is already registered")]
    DuplicateEvent(String),
    #[error("event kind {0:?} is not registered")]
    UnknownEvent(EventKind),
    #[error("event type `{0}` requests lag compensation but is not server-authoritative")]
    LagCompensationNotServerAuthoritative(String),
}
