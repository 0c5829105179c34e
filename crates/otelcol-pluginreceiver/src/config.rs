//! Plugin receiver configuration
//!
//! ```yaml
//! receivers:
//!   plugin/nginx:
//!     path: /etc/otelcol/plugins/nginx.yaml
//!     parameters:
//!       file_path: [/var/log/nginx/access.log]
//!     poll_interval: 250ms
//!     start_timeout: 1m
//!     shutdown_timeout: 30s
//! ```

use crate::error::{PluginError, PluginResult};
use crate::plugin::ParameterMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Settings of a `plugin` receiver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PluginReceiverConfig {
    /// Location of the plugin file
    #[serde(default)]
    #[validate(length(min = 1, message = "path must be set"))]
    pub path: String,

    /// Values for the plugin's parameters
    #[serde(default)]
    pub parameters: ParameterMap,

    /// How often the nested service is checked while starting
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    #[validate(custom(function = "validate_poll_interval"))]
    pub poll_interval: Duration,

    /// How long the nested service may take to reach running
    #[serde(default = "default_start_timeout", with = "humantime_serde")]
    pub start_timeout: Duration,

    /// How long shutdown waits for the nested service to stop
    #[serde(default = "default_shutdown_timeout", with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(250)
}

fn default_start_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

fn validate_poll_interval(interval: &Duration) -> Result<(), ValidationError> {
    if interval.is_zero() {
        return Err(ValidationError::new("zero_poll_interval")
            .with_message("poll_interval must be greater than zero".into()));
    }
    Ok(())
}

impl Default for PluginReceiverConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            parameters: ParameterMap::new(),
            poll_interval: default_poll_interval(),
            start_timeout: default_start_timeout(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

impl PluginReceiverConfig {
    /// Decode receiver settings as merged by the collector
    pub fn from_value(value: &Value) -> PluginResult<Self> {
        let config: Self = match value {
            Value::Null => Self::default(),
            value => serde_yaml::from_value(value.clone())
                .map_err(|e| PluginError::Config(e.to_string()))?,
        };
        config.validate_config()?;
        Ok(config)
    }

    /// Validate the settings
    pub fn validate_config(&self) -> PluginResult<()> {
        self.validate()
            .map_err(|e| PluginError::Config(e.to_string()))
    }

    /// The settings as a YAML value, the form factories hand out
    pub fn to_value(&self) -> PluginResult<Value> {
        serde_yaml::to_value(self).map_err(PluginError::Marshal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: PluginReceiverConfig = serde_yaml::from_str("path: plugin.yaml").unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.start_timeout, Duration::from_secs(60));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(30));
        assert!(config.parameters.is_empty());
        assert!(config.validate_config().is_ok());
    }

    #[test]
    fn test_humantime_durations() {
        let config = PluginReceiverConfig::from_value(
            &serde_yaml::from_str("path: p.yaml\npoll_interval: 10ms\nstart_timeout: 2m").unwrap(),
        )
        .unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(10));
        assert_eq!(config.start_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_empty_path_rejected() {
        let err = PluginReceiverConfig::from_value(&Value::Null).unwrap_err();
        assert!(matches!(err, PluginError::Config(ref msg) if msg.contains("path must be set")));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let config = PluginReceiverConfig {
            path: "p.yaml".to_string(),
            poll_interval: Duration::ZERO,
            ..Default::default()
        };
        let err = config.validate_config().unwrap_err();
        assert!(err.to_string().contains("poll_interval must be greater than zero"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let value: Value = serde_yaml::from_str("path: p.yaml\nparams: {}").unwrap();
        assert!(matches!(
            PluginReceiverConfig::from_value(&value),
            Err(PluginError::Config(_))
        ));
    }

    #[test]
    fn test_value_round_trip() {
        let config = PluginReceiverConfig {
            path: "p.yaml".to_string(),
            parameters: serde_yaml::from_str("a: [x, y]").unwrap(),
            ..Default::default()
        };
        let value = config.to_value().unwrap();
        assert_eq!(PluginReceiverConfig::from_value(&value).unwrap(), config);
    }
}
