//! Error types for otelcol-core
//!
//! A single error enum covers configuration, graph construction, component
//! lifecycle and data delivery failures.

use crate::component::{DataType, Kind};
use thiserror::Error;

/// Result type alias for collector operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error used to carry component-specific failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for the collector runtime
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// A component or pipeline id could not be parsed
    #[error("invalid id {id:?}: {reason}")]
    InvalidId { id: String, reason: String },

    /// No factory is registered for a configured component type
    #[error("unknown {kind} type {component_type:?} for {id:?}")]
    UnknownComponentType {
        kind: Kind,
        component_type: String,
        id: String,
    },

    /// The factory exists but cannot build a component for the signal
    #[error("{kind} type {component_type:?} does not support {data_type}")]
    DataTypeNotSupported {
        kind: Kind,
        component_type: String,
        data_type: DataType,
    },

    /// A component failed in one of its lifecycle operations
    #[error("{id}: {source}")]
    Component {
        id: String,
        #[source]
        source: BoxError,
    },

    /// Delivering data to a downstream consumer failed
    #[error("consumer error: {0}")]
    Consumer(String),

    /// The consumer does not accept the given signal
    #[error("consumer does not accept {0}")]
    SignalNotSupported(DataType),

    /// The service was asked to do something its state does not allow
    #[error("service error: {0}")]
    Service(String),

    /// YAML error
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid id error
    pub fn invalid_id(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidId {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a component failure with the id of the component that raised it
    pub fn component(id: impl ToString, source: impl Into<BoxError>) -> Self {
        Self::Component {
            id: id.to_string(),
            source: source.into(),
        }
    }

    /// Create a consumer error
    pub fn consumer(msg: impl Into<String>) -> Self {
        Self::Consumer(msg.into())
    }

    /// Create a service error
    pub fn service(msg: impl Into<String>) -> Self {
        Self::Service(msg.into())
    }

    /// Check if this error comes from configuration rather than runtime
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::InvalidId { .. }
                | Self::UnknownComponentType { .. }
                | Self::DataTypeNotSupported { .. }
                | Self::Yaml(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnknownComponentType {
            kind: Kind::Receiver,
            component_type: "ghost".to_string(),
            id: "ghost/1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unknown receiver type \"ghost\" for \"ghost/1\""
        );
    }

    #[test]
    fn test_component_error_keeps_source() {
        let err = Error::component("plugin/x", Error::config("bad"));
        assert_eq!(err.to_string(), "plugin/x: configuration error: bad");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_is_config() {
        assert!(Error::config("x").is_config());
        assert!(Error::invalid_id("", "empty").is_config());
        assert!(!Error::consumer("down").is_config());
        assert!(!Error::service("closed").is_config());
    }

    #[test]
    fn test_from_conversions() {
        fn read(path: &str) -> Result<serde_yaml::Value> {
            let text = std::fs::read_to_string(path)?;
            Ok(serde_yaml::from_str(&text)?)
        }

        let err = read("/nonexistent/otelcol.yaml").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().starts_with("io error:"));

        let err: Error = serde_yaml::from_str::<serde_yaml::Value>("a: [").unwrap_err().into();
        assert!(matches!(err, Error::Yaml(_)));
        assert!(err.is_config());
    }
}
