pub mod codec;
pub mod command;
pub mod commands;
pub mod config;
pub mod connection;
pub mod frame;
pub mod multiplexer;
pub mod server;
pub mod skiplist;
pub mod status;
pub mod store;
pub mod zset;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Result<T> = std::result::Result<T, Error>;
