use thiserror::Error;

pub type DefendResult<T> = Result<T, DefendError>;

#[derive(Error, Debug)]
pub enum DefendError {
    #[error("Feed error: {0}")]
    Feed(String),

    #[error("Webhook delivery error: {0}")]
    Webhook(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bind error: {0}")]
    Bind(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}
