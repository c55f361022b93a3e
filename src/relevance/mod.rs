pub mod manager;
pub mod region;
