//! Errors raised while loading or validating `HeraldConfig`.

use std::path::PathBuf;
use thiserror::Error;

/// Why a configuration could not be produced.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("config file {0} does not exist")]
    FileNotFound(PathBuf),

    /// A source could not be parsed or extracted.
    #[error("config could not be parsed: {0}")]
    ParseError(String),

    /// A value parsed but is not acceptable.
    #[error("invalid config: {message}")]
    ValidationError { message: String },

    /// A setting required by another setting is absent.
    #[error("config field `{field}` is required")]
    MissingField { field: String },

    /// Unknown log level name.
    #[error("unknown log level {0:?}")]
    InvalidLogLevel(String),
}

impl ConfigError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
