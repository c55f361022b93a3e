pub mod component_kind;
pub mod directive;
pub mod error;
pub mod rules;
