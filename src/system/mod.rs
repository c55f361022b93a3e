pub mod command_queue;
pub mod config;
pub mod error;
pub mod mode;
pub mod network_system;
pub mod system_events;
