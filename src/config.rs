use clap::builder::RangedU64ValueParser;
use clap::Parser;
use tracing::Level;

use crate::codec::DEFAULT_MAX_FRAME_SIZE;

const HOST: &str = "0.0.0.0";
const PORT: u16 = 6379;
const READ_BUFFER_SIZE: usize = 4096;

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Config {
    /// The address to listen on
    #[arg(long, env = "MEMKV_HOST", default_value = HOST)]
    pub host: String,

    /// The port to listen on
    #[arg(short, long, env = "MEMKV_PORT", default_value_t = PORT)]
    pub port: u16,

    /// Largest request, in bytes, a connection may buffer before it is rejected
    #[arg(long, env = "MEMKV_MAX_FRAME_SIZE", default_value_t = DEFAULT_MAX_FRAME_SIZE)]
    pub max_frame_size: usize,

    /// Bytes read from a client per readiness event
    #[arg(
        long,
        env = "MEMKV_READ_BUFFER_SIZE",
        default_value_t = READ_BUFFER_SIZE,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub read_buffer_size: usize,

    /// Maximum level of the logs that are emitted
    #[arg(long, env = "MEMKV_LOG_LEVEL", default_value_t = Level::INFO)]
    pub log_level: Level,
}

impl Config {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: HOST.to_string(),
            port: PORT,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            read_buffer_size: READ_BUFFER_SIZE,
            log_level: Level::INFO,
        }
    }
}
