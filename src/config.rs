use std::env;

/// Process configuration loaded from environment variables.
///
/// `BROKER_ADDR` is required; everything else has a default:
/// - `SENSOR_TOPIC_FILTER` (default: knock/sensor/#)
/// - `PATTERNS_FILE` (default: knock_patterns.json)
/// - `INGEST_CHANNEL_BUFFER` (default: 1000)
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub broker_addr: String,
    pub topic_filter: String,
    pub patterns_file: String,
    pub channel_buffer: usize,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let broker_addr = env::var("BROKER_ADDR")
            .map_err(|_| ConfigError::MissingVariable("BROKER_ADDR".to_string()))?;

        if !broker_addr.contains(':') {
            return Err(ConfigError::InvalidValue(
                "BROKER_ADDR must be host:port".to_string(),
            ));
        }

        let topic_filter =
            env::var("SENSOR_TOPIC_FILTER").unwrap_or_else(|_| "knock/sensor/#".to_string());
        if topic_filter.is_empty() {
            return Err(ConfigError::InvalidValue(
                "SENSOR_TOPIC_FILTER cannot be empty".to_string(),
            ));
        }

        let patterns_file =
            env::var("PATTERNS_FILE").unwrap_or_else(|_| "knock_patterns.json".to_string());

        let channel_buffer = env::var("INGEST_CHANNEL_BUFFER")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1_000);

        Ok(Self {
            broker_addr,
            topic_filter,
            patterns_file,
            channel_buffer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_env_defaults_and_overrides() {
        // Test: missing BROKER_ADDR is an error
        env::remove_var("BROKER_ADDR");
        assert!(matches!(
            RuntimeConfig::from_env(),
            Err(ConfigError::MissingVariable(_))
        ));

        // Test: defaults apply when only BROKER_ADDR is set
        env::set_var("BROKER_ADDR", "127.0.0.1:1900");
        env::remove_var("SENSOR_TOPIC_FILTER");
        env::remove_var("PATTERNS_FILE");
        env::remove_var("INGEST_CHANNEL_BUFFER");

        let config = RuntimeConfig::from_env().unwrap();
        assert_eq!(config.broker_addr, "127.0.0.1:1900");
        assert_eq!(config.topic_filter, "knock/sensor/#");
        assert_eq!(config.patterns_file, "knock_patterns.json");
        assert_eq!(config.channel_buffer, 1_000);

        // Test: overrides are honored
        env::set_var("SENSOR_TOPIC_FILTER", "knock/lab/#");
        env::set_var("PATTERNS_FILE", "/tmp/patterns.json");
        env::set_var("INGEST_CHANNEL_BUFFER", "250");

        let config = RuntimeConfig::from_env().unwrap();
        assert_eq!(config.topic_filter, "knock/lab/#");
        assert_eq!(config.patterns_file, "/tmp/patterns.json");
        assert_eq!(config.channel_buffer, 250);

        // Test: an address without a port is rejected
        env::set_var("BROKER_ADDR", "localhost");
        assert!(matches!(
            RuntimeConfig::from_env(),
            Err(ConfigError::InvalidValue(_))
        ));

        // Cleanup
        env::remove_var("BROKER_ADDR");
        env::remove_var("SENSOR_TOPIC_FILTER");
        env::remove_var("PATTERNS_FILE");
        env::remove_var("INGEST_CHANNEL_BUFFER");
    }
}
