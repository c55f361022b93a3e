pub mod cell;
pub mod net_id;
pub mod world_type;
