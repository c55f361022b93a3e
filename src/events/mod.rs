pub mod error;
pub mod event_kinds;
pub mod router;
