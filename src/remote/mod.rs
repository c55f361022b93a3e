pub mod remote_world;
