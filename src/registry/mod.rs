pub mod error;
pub mod identity_registry;
