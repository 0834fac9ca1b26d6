//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;
use herald_framework::{DispatchError, MetadataError};

/// Errors that can occur while building or running a runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Subscriber registration failed.
    #[error("Subscriber registration failed: {0}")]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
