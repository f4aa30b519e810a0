use crate::channel::ChannelError;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error, Clone)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    /// Reconnect budget spent
    #[error("connection error: {0}")]
    Connection(String),

    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),
}

impl AppError {
    /// Whether the reconnect policy should try again.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Channel(e) => e.is_transient(),
            AppError::Connection(_) | AppError::Config(_) => false,
        }
    }
}
