//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{BotkeeperConfig, GatewayConfig, LogOutput, LoggingConfig, RuntimeConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &BotkeeperConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_runtime_config(&config.runtime)?;
    validate_gateway_config(&config.gateway)?;
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.file_path is required when logging.output is 'file'",
        ));
    }
    if let Some(module) = logging.filters.keys().find(|m| m.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Invalid logging filter module name: '{module}'"
        )));
    }
    Ok(())
}

fn validate_runtime_config(runtime: &RuntimeConfig) -> ConfigResult<()> {
    if runtime.event_buffer == 0 {
        return Err(ConfigError::validation(
            "runtime.event_buffer must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_gateway_config(gateway: &GatewayConfig) -> ConfigResult<()> {
    validate_url(&gateway.url)?;
    if gateway.heartbeat_interval_secs == 0 {
        return Err(ConfigError::validation(
            "gateway.heartbeat_interval_secs must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_url(url: &str) -> ConfigResult<()> {
    const SCHEMES: [&str; 2] = ["ws://", "wss://"];

    if url.is_empty() {
        return Err(ConfigError::validation("gateway.url is required"));
    }
    if !SCHEMES.iter().any(|s| url.starts_with(s)) {
        return Err(ConfigError::validation(format!(
            "Invalid gateway URL '{url}': must start with one of {SCHEMES:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&BotkeeperConfig::default()).is_ok());
    }

    #[test]
    fn test_empty_event_buffer() {
        let mut config = BotkeeperConfig::default();
        config.runtime.event_buffer = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_gateway_url_scheme() {
        let mut config = BotkeeperConfig::default();
        config.gateway.url = "http://example.com".into();
        assert!(validate_config(&config).is_err());

        config.gateway.url = "wss://gateway.example.com/v1".into();
        assert!(validate_config(&config).is_ok());

        config.gateway.url.clear();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_heartbeat() {
        let mut config = BotkeeperConfig::default();
        config.gateway.heartbeat_interval_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_file_output_needs_path() {
        let mut config = BotkeeperConfig::default();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());

        config.logging.file_path = Some("botkeeper.log".into());
        assert!(validate_config(&config).is_ok());
    }
}
