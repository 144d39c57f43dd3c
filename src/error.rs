//! Crate-wide error types.

use thiserror::Error;

pub type DrillResult<T> = Result<T, DrillError>;

#[derive(Debug, Error)]
pub enum DrillError {
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("bundle error: {0}")]
    Bundle(String),
}
