pub mod config_port;
pub mod database_port;
pub mod resource_port;
