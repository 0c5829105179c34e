//! Error types for the plugin receiver
//!
//! Every failure of [`PluginReceiver::start`](crate::PluginReceiver) names the
//! stage it happened in, so a message reads like
//! `failed to render plugin: failed to execute template: ...`.

use crate::template::TemplateError;
use otelcol_core::{ComponentId, Kind};
use serde_yaml::Value;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for plugin operations
pub type PluginResult<T> = std::result::Result<T, PluginError>;

/// Receiver stage a failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Validate,
    Render,
    ResolveFactories,
    ConfigProvider,
    CreateService,
    StartService,
    Shutdown,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Load => write!(f, "failed to load plugin"),
            Stage::Validate => write!(f, "invalid plugin parameter"),
            Stage::Render => write!(f, "failed to render plugin"),
            Stage::ResolveFactories => write!(f, "failed to get factories from factory provider"),
            Stage::ConfigProvider => write!(f, "failed to get config provider"),
            Stage::CreateService => write!(f, "failed to create internal service"),
            Stage::StartService => write!(f, "failed to start internal service"),
            Stage::Shutdown => write!(f, "shutdown service"),
        }
    }
}

fn display_values(values: &[Value]) -> String {
    let items: Vec<String> = values
        .iter()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => serde_yaml::to_string(other)
                .map(|s| s.trim_end().to_string())
                .unwrap_or_default(),
        })
        .collect();
    format!("[{}]", items.join(" "))
}

/// Plugin receiver error
#[derive(Debug, Error)]
pub enum PluginError {
    /// The receiver configuration is invalid
    #[error("invalid receiver config: {0}")]
    Config(String),

    /// The plugin file could not be read
    #[error("failed to read file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The plugin file could not be written
    #[error("failed to write file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The plugin file is not a plugin definition
    #[error("failed to unmarshal plugin from yaml: {0}")]
    Parse(#[source] serde_yaml::Error),

    #[error("definition failure: parameter {name} is not defined in plugin")]
    UndefinedParameter { name: String },

    #[error("required failure: parameter {name} is missing but required in plugin")]
    MissingRequired { name: String },

    /// `reason` completes "parameter NAME ..."
    #[error("type failure: parameter {name} {reason}")]
    TypeMismatch { name: String, reason: String },

    #[error("type failure: unsupported parameter type {kind:?} for parameter {name}")]
    UnsupportedType { name: String, kind: String },

    #[error(
        "supported value failure: parameter {name} does not match the list of supported values: {}",
        display_values(.supported)
    )]
    UnsupportedValue { name: String, supported: Vec<Value> },

    /// The plugin template does not parse
    #[error("failed to create plugin template: {0}")]
    TemplateSyntax(#[source] TemplateError),

    /// The plugin template failed against the parameters
    #[error("failed to execute template: {0}")]
    TemplateExecution(#[source] TemplateError),

    /// The rendered template is not a collector config
    #[error("failed to create rendered config: failed to unmarshal yaml bytes: {0}")]
    ConfigParse(#[source] serde_yaml::Error),

    /// A storage extension directory could not be scoped
    #[error("failed to create unique storage id for {extension}: {reason}")]
    Storage { extension: String, reason: String },

    #[error("invalid component id {id:?}: {reason}")]
    InvalidComponentId { id: String, reason: String },

    /// Neither the plugin nor the host provide a factory
    #[error("{kind} factory {component_type} is missing from host")]
    MissingFactory { kind: Kind, component_type: String },

    /// A plugin or rendered config could not be serialized
    #[error("failed to marshal as yaml: {0}")]
    Marshal(#[source] serde_yaml::Error),

    /// The rendered config did not decode against the resolved factories
    #[error("failed to unmarshal config map: {0}")]
    Unmarshal(#[source] otelcol_core::Error),

    /// The nested service failed
    #[error("{0}")]
    NestedService(#[source] otelcol_core::Error),

    #[error("receiver {id} is already running")]
    AlreadyRunning { id: String },

    #[error("internal service did not reach running within {timeout:?}")]
    StartTimeout { timeout: Duration },

    #[error("internal service exited before reaching running")]
    ServiceExited,

    #[error("internal service did not stop within {timeout:?}")]
    ShutdownTimeout { timeout: Duration },

    /// A failure annotated with the receiver stage it happened in
    #[error("{stage}: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<PluginError>,
    },
}

impl PluginError {
    /// Create a type mismatch error
    pub fn type_mismatch(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TypeMismatch {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a storage error
    pub fn storage(extension: impl Into<String>, reason: impl ToString) -> Self {
        Self::Storage {
            extension: extension.into(),
            reason: reason.to_string(),
        }
    }

    /// Annotate with the stage the error happened in
    pub fn in_stage(self, stage: Stage) -> Self {
        Self::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// Stage the error was annotated with, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The error with stage annotations removed
    pub fn root(&self) -> &PluginError {
        match self {
            Self::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if the caller supplied bad parameters
    pub fn is_parameter_error(&self) -> bool {
        matches!(
            self.root(),
            Self::UndefinedParameter { .. }
                | Self::MissingRequired { .. }
                | Self::TypeMismatch { .. }
                | Self::UnsupportedType { .. }
                | Self::UnsupportedValue { .. }
        )
    }

    /// Check if starting again without reconfiguring may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.root(),
            Self::Read { .. }
                | Self::NestedService(_)
                | Self::StartTimeout { .. }
                | Self::ServiceExited
                | Self::ShutdownTimeout { .. }
        )
    }

    /// Convert into a collector error raised by receiver `id`
    pub fn into_component_error(self, id: &ComponentId) -> otelcol_core::Error {
        otelcol_core::Error::component(id, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_prefixes_message() {
        let err = PluginError::MissingFactory {
            kind: Kind::Receiver,
            component_type: "ghost".to_string(),
        }
        .in_stage(Stage::ResolveFactories);
        assert_eq!(
            err.to_string(),
            "failed to get factories from factory provider: receiver factory ghost is missing from host"
        );
        assert_eq!(err.stage(), Some(Stage::ResolveFactories));
        assert!(matches!(err.root(), PluginError::MissingFactory { .. }));
    }

    #[test]
    fn test_parameter_messages() {
        let err = PluginError::type_mismatch("a", "must be a string");
        assert_eq!(err.to_string(), "type failure: parameter a must be a string");

        let err = PluginError::UnsupportedValue {
            name: "mode".to_string(),
            supported: vec![Value::from("json"), Value::from(1)],
        };
        assert_eq!(
            err.to_string(),
            "supported value failure: parameter mode does not match the list of supported values: [json 1]"
        );
    }

    #[test]
    fn test_classification() {
        let err = PluginError::MissingRequired {
            name: "a".to_string(),
        }
        .in_stage(Stage::Validate);
        assert!(err.is_parameter_error());
        assert!(!err.is_retryable());

        let err = PluginError::StartTimeout {
            timeout: Duration::from_secs(1),
        }
        .in_stage(Stage::StartService);
        assert!(err.is_retryable());
        assert!(!err.is_parameter_error());
    }

    #[test]
    fn test_into_component_error() {
        let id: ComponentId = "plugin/files".parse().unwrap();
        let err = PluginError::ServiceExited.into_component_error(&id);
        assert_eq!(
            err.to_string(),
            "plugin/files: internal service exited before reaching running"
        );
    }
}
