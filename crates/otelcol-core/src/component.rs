//! Component identity and lifecycle
//!
//! Every configured component is addressed by a [`ComponentId`] of the form
//! `type[/name]`. The type selects the factory; the optional name allows
//! several instances of the same type in one configuration.

use crate::error::{Error, Result};
use crate::factory::Factory;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Separator between type and name in a component id
pub const TYPE_AND_NAME_SEPARATOR: char = '/';

const MAX_TYPE_LENGTH: usize = 63;

/// The kind of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    Receiver,
    Processor,
    Exporter,
    Extension,
}

impl Kind {
    /// All component kinds, in graph start order of their config sections
    pub const ALL: [Kind; 4] = [
        Kind::Receiver,
        Kind::Processor,
        Kind::Exporter,
        Kind::Extension,
    ];

    /// Name of the config section holding components of this kind
    pub fn section(&self) -> &'static str {
        match self {
            Kind::Receiver => "receivers",
            Kind::Processor => "processors",
            Kind::Exporter => "exporters",
            Kind::Extension => "extensions",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Receiver => write!(f, "receiver"),
            Kind::Processor => write!(f, "processor"),
            Kind::Exporter => write!(f, "exporter"),
            Kind::Extension => write!(f, "extension"),
        }
    }
}

/// Telemetry signal carried by a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataType {
    Logs,
    Metrics,
    Traces,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Logs => write!(f, "logs"),
            DataType::Metrics => write!(f, "metrics"),
            DataType::Traces => write!(f, "traces"),
        }
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "logs" => Ok(DataType::Logs),
            "metrics" => Ok(DataType::Metrics),
            "traces" => Ok(DataType::Traces),
            other => Err(Error::invalid_id(other, "unknown data type")),
        }
    }
}

/// Type of a component, e.g. `filelog` or `batch`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentType(String);

impl ComponentType {
    /// Create a component type, validating its spelling
    ///
    /// A type starts with an ASCII letter, continues with ASCII letters,
    /// digits or underscores and is at most 63 characters long.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        let mut chars = value.chars();
        match chars.next() {
            None => return Err(Error::invalid_id(value, "type must not be empty")),
            Some(c) if !c.is_ascii_alphabetic() => {
                return Err(Error::invalid_id(value, "type must start with a letter"))
            }
            Some(_) => {}
        }
        if value.len() > MAX_TYPE_LENGTH {
            return Err(Error::invalid_id(value, "type is too long"));
        }
        if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::invalid_id(
                value,
                "type may only contain letters, digits and underscores",
            ));
        }
        Ok(Self(value))
    }

    /// Create a component type from a literal
    ///
    /// # Panics
    ///
    /// Panics if `value` is not a valid component type. Meant for the
    /// constant types factories declare.
    pub fn from_static(value: &'static str) -> Self {
        match Self::new(value) {
            Ok(ty) => ty,
            Err(e) => panic!("invalid static component type: {}", e),
        }
    }

    /// Borrow the type as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ComponentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Identifier of a configured component instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId {
    component_type: ComponentType,
    name: Option<String>,
}

impl ComponentId {
    /// Id with only a type, e.g. `otlp`
    pub fn new(component_type: ComponentType) -> Self {
        Self {
            component_type,
            name: None,
        }
    }

    /// Id with a type and a name, e.g. `otlp/2`
    pub fn with_name(component_type: ComponentType, name: impl Into<String>) -> Self {
        Self {
            component_type,
            name: Some(name.into()),
        }
    }

    pub fn component_type(&self) -> &ComponentType {
        &self.component_type
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}{}{}", self.component_type, TYPE_AND_NAME_SEPARATOR, name),
            None => write!(f, "{}", self.component_type),
        }
    }
}

impl FromStr for ComponentId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.split_once(TYPE_AND_NAME_SEPARATOR) {
            None => Ok(Self::new(ComponentType::new(s)?)),
            Some((ty, name)) => {
                let name = name.trim();
                if name.is_empty() {
                    return Err(Error::invalid_id(s, "name part must be set after '/'"));
                }
                Ok(Self::with_name(ComponentType::new(ty.trim())?, name))
            }
        }
    }
}

/// Identifier of a pipeline, e.g. `logs` or `metrics/host`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineId {
    data_type: DataType,
    name: Option<String>,
}

impl PipelineId {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            name: None,
        }
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl fmt::Display for PipelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}{}{}", self.data_type, TYPE_AND_NAME_SEPARATOR, name),
            None => write!(f, "{}", self.data_type),
        }
    }
}

impl FromStr for PipelineId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (data_type, name) = match s.split_once(TYPE_AND_NAME_SEPARATOR) {
            None => (s, None),
            Some((ty, name)) if !name.trim().is_empty() => (ty, Some(name.trim().to_string())),
            Some(_) => return Err(Error::invalid_id(s, "name part must be set after '/'")),
        };
        Ok(Self {
            data_type: data_type.trim().parse()?,
            name,
        })
    }
}

/// Lifecycle shared by every component
///
/// Components are shared between pipelines, so both operations take `&self`
/// and implementations keep mutable state behind their own locks.
#[async_trait]
pub trait Component: Send + Sync {
    /// Start the component. The host gives access to the factories known to
    /// the enclosing runtime.
    async fn start(&self, _host: Arc<dyn Host>) -> Result<()> {
        Ok(())
    }

    /// Stop the component and release its resources
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// The runtime hosting a component
///
/// This is the only capability components may query from their host.
pub trait Host: Send + Sync {
    /// Look up the factory registered for `kind` and `component_type`
    fn get_factory(&self, kind: Kind, component_type: &ComponentType) -> Option<Factory>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_type_validation() {
        assert!(ComponentType::new("filelog").is_ok());
        assert!(ComponentType::new("k8s_cluster2").is_ok());
        assert!(ComponentType::new("").is_err());
        assert!(ComponentType::new("2fast").is_err());
        assert!(ComponentType::new("with-dash").is_err());
        assert!(ComponentType::new("a".repeat(64)).is_err());
    }

    #[test]
    fn test_component_id_parse() {
        let id: ComponentId = "otlp".parse().unwrap();
        assert_eq!(id.component_type().as_str(), "otlp");
        assert_eq!(id.name(), None);

        let id: ComponentId = "filelog/nginx access".parse().unwrap();
        assert_eq!(id.component_type().as_str(), "filelog");
        assert_eq!(id.name(), Some("nginx access"));
        assert_eq!(id.to_string(), "filelog/nginx access");

        let id: ComponentId = "plugin/a/b".parse().unwrap();
        assert_eq!(id.name(), Some("a/b"));

        assert!("otlp/".parse::<ComponentId>().is_err());
        assert!("/name".parse::<ComponentId>().is_err());
    }

    #[test]
    fn test_pipeline_id_parse() {
        let id: PipelineId = "metrics/host".parse().unwrap();
        assert_eq!(id.data_type(), DataType::Metrics);
        assert_eq!(id.name(), Some("host"));
        assert_eq!(id.to_string(), "metrics/host");

        let id: PipelineId = "logs".parse().unwrap();
        assert_eq!(id.data_type(), DataType::Logs);

        assert!("profiles".parse::<PipelineId>().is_err());
        assert!("logs/".parse::<PipelineId>().is_err());
    }
}
