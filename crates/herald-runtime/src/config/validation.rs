//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{HeraldConfig, LogLevel, LogOutput, LoggingConfig};
use herald_framework::config::DispatchConfig;

/// Validates the entire configuration.
pub fn validate_config(config: &HeraldConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_dispatch_config(&config.dispatch)?;
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    for (target, level) in &logging.filters {
        if target.is_empty() {
            return Err(ConfigError::validation("Log filter target cannot be empty"));
        }
        level.parse::<LogLevel>()?;
    }

    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    if logging.max_files == 0 {
        return Err(ConfigError::validation("max_files must be greater than 0"));
    }

    Ok(())
}

fn validate_dispatch_config(dispatch: &DispatchConfig) -> ConfigResult<()> {
    validate_parallelism(
        "max_basic_event_parallelism",
        dispatch.max_basic_event_parallelism,
    )?;
    validate_parallelism(
        "max_command_event_parallelism",
        dispatch.max_command_event_parallelism,
    )
}

/// Unset means unbounded; an explicit limit must admit at least one subscriber.
fn validate_parallelism(field: &str, limit: Option<usize>) -> ConfigResult<()> {
    if limit == Some(0) {
        return Err(ConfigError::validation(format!(
            "{field} must be greater than 0"
        )));
    }
    Ok(())
}
