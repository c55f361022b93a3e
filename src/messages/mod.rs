pub mod batch;
pub mod event_message;
pub mod handshake;
pub mod inbound;
pub mod outbound;
pub mod snapshot;
