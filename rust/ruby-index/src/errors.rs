use thiserror::Error;

#[derive(Debug, PartialEq, Eq, Error)]
pub enum Errors {
    #[error("FileError: {0}")]
    FileError(String),
    #[error("InvalidUri: {0}")]
    InvalidUri(String),
    #[error("ConfigError: {0}")]
    ConfigError(String),
}
