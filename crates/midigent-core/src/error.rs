//! Unified Error Model
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MidigentError {
    #[error("CONFIG/{0}")]
    ConfigError(String),

    #[error("PARSE/{0}")]
    ParseError(String),

    #[error("SERIALIZE/{0}")]
    SerializeError(String),

    #[error("STAGE/{0}")]
    StageError(String),

    #[error("PROVIDER/{0}")]
    ProviderError(String),

    #[error("IO/{0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_yaml::Error> for MidigentError {
    fn from(err: serde_yaml::Error) -> Self {
        MidigentError::ConfigError(err.to_string())
    }
}

impl From<serde_json::Error> for MidigentError {
    fn from(err: serde_json::Error) -> Self {
        MidigentError::SerializeError(err.to_string())
    }
}
