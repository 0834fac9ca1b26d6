//! Configuration module for the Herald runtime.
//!
//! This module provides figment-based configuration loading and validation
//! for logging and dispatch policy.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    HeraldConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, SpanEventConfig,
};
pub use validation::validate_config;

pub use herald_framework::config::{DispatchConfig, DispatchScope, DispatchStrategy};
