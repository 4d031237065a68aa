use thiserror::Error;

#[derive(Error, Debug)]
pub enum MapError {
    #[error("Channel {channel} out of range (configured for {num_channels} channels)")]
    ChannelOutOfRange { channel: u16, num_channels: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    #[error("Mapping failed: {0}")]
    Mapping(String),
}

pub type Result<T> = std::result::Result<T, MapError>;
