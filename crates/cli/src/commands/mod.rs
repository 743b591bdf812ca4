pub mod chat;
pub mod config_cmd;
pub mod serve;
pub mod wiring;
