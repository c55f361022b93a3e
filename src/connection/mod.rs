pub mod connection;
pub mod key;
pub mod replication_state;
pub mod status;
