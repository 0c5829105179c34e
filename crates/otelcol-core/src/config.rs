//! Collector configuration
//!
//! A raw YAML document is turned into a typed [`Config`] against a set of
//! factories. Component settings stay as YAML values; each factory decodes
//! its own settings when it builds a component.
//!
//! ```yaml
//! receivers:
//!   filelog/nginx:
//!     include: [/var/log/nginx/*.log]
//! exporters:
//!   otlp:
//! service:
//!   pipelines:
//!     logs:
//!       receivers: [filelog/nginx]
//!       exporters: [otlp]
//!   telemetry:
//!     metrics:
//!       level: none
//! ```

use crate::component::{ComponentId, Kind, PipelineId};
use crate::error::{Error, Result};
use crate::factory::Factories;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

/// Top-level sections understood by [`Config::unmarshal`]
const SECTIONS: [&str; 5] = ["receivers", "processors", "exporters", "extensions", "service"];

/// Verbosity of the collector's own metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricsLevel {
    None,
    Basic,
    #[default]
    Normal,
    Detailed,
}

impl std::fmt::Display for MetricsLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricsLevel::None => write!(f, "none"),
            MetricsLevel::Basic => write!(f, "basic"),
            MetricsLevel::Normal => write!(f, "normal"),
            MetricsLevel::Detailed => write!(f, "detailed"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsTelemetryConfig {
    pub level: MetricsLevel,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub metrics: MetricsTelemetryConfig,
}

/// Components wired into one pipeline, in processing order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineConfig {
    pub receivers: Vec<ComponentId>,
    pub processors: Vec<ComponentId>,
    pub exporters: Vec<ComponentId>,
}

/// The `service` section
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Extensions to run, in start order
    pub extensions: Vec<ComponentId>,
    pub pipelines: BTreeMap<PipelineId, PipelineConfig>,
    pub telemetry: TelemetryConfig,
}

/// A validated collector configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub receivers: BTreeMap<ComponentId, Value>,
    pub processors: BTreeMap<ComponentId, Value>,
    pub exporters: BTreeMap<ComponentId, Value>,
    pub extensions: BTreeMap<ComponentId, Value>,
    pub service: ServiceConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawPipeline {
    receivers: Vec<String>,
    processors: Vec<String>,
    exporters: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawService {
    extensions: Vec<String>,
    pipelines: BTreeMap<String, RawPipeline>,
    telemetry: TelemetryConfig,
}

fn parse_ids(ids: &[String]) -> Result<Vec<ComponentId>> {
    ids.iter().map(|id| id.parse()).collect()
}

/// Recursively merge `overlay` over `base`
///
/// Mappings are merged key by key; any other overlay value replaces the
/// base value. A `null` overlay keeps the base.
pub fn merge_values(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (base, Value::Null) => base,
        (Value::Mapping(mut base), Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                let merged = match base.remove(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            Value::Mapping(base)
        }
        (_, overlay) => overlay,
    }
}

impl Config {
    /// Parse a YAML document against `factories`
    pub fn from_yaml(yaml: &str, factories: &Factories) -> Result<Self> {
        let raw: Value = serde_yaml::from_str(yaml)?;
        Self::unmarshal(&raw, factories)
    }

    /// Build a configuration from a raw YAML value
    ///
    /// Every component's settings are its factory's default config with the
    /// user settings merged over it. The result is validated before it is
    /// returned.
    pub fn unmarshal(raw: &Value, factories: &Factories) -> Result<Self> {
        let empty = Mapping::new();
        let root = match raw {
            Value::Null => &empty,
            Value::Mapping(m) => m,
            _ => return Err(Error::config("configuration must be a mapping")),
        };

        for key in root.keys() {
            match key.as_str() {
                Some(section) if SECTIONS.contains(&section) => {}
                _ => {
                    return Err(Error::config(format!(
                        "unknown section {}",
                        serde_yaml::to_string(key)?.trim()
                    )))
                }
            }
        }

        let mut config = Config::default();
        for kind in Kind::ALL {
            let components = Self::unmarshal_section(kind, root.get(kind.section()), factories)?;
            match kind {
                Kind::Receiver => config.receivers = components,
                Kind::Processor => config.processors = components,
                Kind::Exporter => config.exporters = components,
                Kind::Extension => config.extensions = components,
            }
        }

        config.service = match root.get("service") {
            None | Some(Value::Null) => ServiceConfig::default(),
            Some(value) => Self::unmarshal_service(value.clone())?,
        };

        config.validate()?;
        Ok(config)
    }

    fn unmarshal_section(
        kind: Kind,
        section: Option<&Value>,
        factories: &Factories,
    ) -> Result<BTreeMap<ComponentId, Value>> {
        let mapping = match section {
            None | Some(Value::Null) => return Ok(BTreeMap::new()),
            Some(Value::Mapping(m)) => m,
            Some(_) => {
                return Err(Error::config(format!(
                    "section {} must be a mapping",
                    kind.section()
                )))
            }
        };

        let mut components = BTreeMap::new();
        for (key, settings) in mapping {
            let key = key.as_str().ok_or_else(|| {
                Error::config(format!("{} keys must be strings", kind.section()))
            })?;
            let id: ComponentId = key.parse()?;
            let factory = factories.get(kind, id.component_type()).ok_or_else(|| {
                Error::UnknownComponentType {
                    kind,
                    component_type: id.component_type().to_string(),
                    id: id.to_string(),
                }
            })?;
            let merged = merge_values(factory.create_default_config(), settings.clone());
            components.insert(id, merged);
        }
        Ok(components)
    }

    fn unmarshal_service(value: Value) -> Result<ServiceConfig> {
        let raw: RawService = serde_yaml::from_value(value)
            .map_err(|e| Error::config(format!("service: {}", e)))?;

        let mut pipelines = BTreeMap::new();
        for (id, pipeline) in raw.pipelines {
            let id: PipelineId = id.parse()?;
            pipelines.insert(
                id,
                PipelineConfig {
                    receivers: parse_ids(&pipeline.receivers)?,
                    processors: parse_ids(&pipeline.processors)?,
                    exporters: parse_ids(&pipeline.exporters)?,
                },
            );
        }

        Ok(ServiceConfig {
            extensions: parse_ids(&raw.extensions)?,
            pipelines,
            telemetry: raw.telemetry,
        })
    }

    /// Check the cross references of the configuration
    pub fn validate(&self) -> Result<()> {
        if self.service.pipelines.is_empty() {
            return Err(Error::config("service must have at least one pipeline"));
        }

        for id in &self.service.extensions {
            if !self.extensions.contains_key(id) {
                return Err(Error::config(format!(
                    "service references extension {:?} which is not configured",
                    id.to_string()
                )));
            }
        }

        for (pipeline_id, pipeline) in &self.service.pipelines {
            if pipeline.receivers.is_empty() {
                return Err(Error::config(format!(
                    "pipeline {:?} must have at least one receiver",
                    pipeline_id.to_string()
                )));
            }
            if pipeline.exporters.is_empty() {
                return Err(Error::config(format!(
                    "pipeline {:?} must have at least one exporter",
                    pipeline_id.to_string()
                )));
            }

            let references = [
                (Kind::Receiver, &pipeline.receivers, &self.receivers),
                (Kind::Processor, &pipeline.processors, &self.processors),
                (Kind::Exporter, &pipeline.exporters, &self.exporters),
            ];
            for (kind, ids, declared) in references {
                for id in ids.iter() {
                    if !declared.contains_key(id) {
                        return Err(Error::config(format!(
                            "pipeline {:?} references {} {:?} which is not configured",
                            pipeline_id.to_string(),
                            kind,
                            id.to_string()
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}
