use thiserror::Error;

use super::component_kind::ComponentKind;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("component type `{0}` is already registered")]
    DuplicateComponent(String),
    #[error("component type {0:?} is not registered")]
    UnknownComponent(ComponentKind),
    #[error("component type `{0}` declares no fields")]
    EmptySchema(String),
}
