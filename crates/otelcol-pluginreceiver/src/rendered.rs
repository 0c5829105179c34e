//! The collector config a plugin template renders to
//!
//! Whatever exporters a template declares, the rendered config only ever
//! exports through the emitter, and the nested collector never records its
//! own metrics.

use crate::emitter::EMITTER_TYPE;
use crate::error::{PluginError, PluginResult};
use otelcol_core::{ComponentId, Kind, MetricsLevel, TelemetryConfig};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;

/// Components of one section, keyed by component id
pub type ComponentMap = BTreeMap<String, Value>;

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts any telemetry section; its content is replaced on parse
fn overridden_telemetry<'de, D>(deserializer: D) -> Result<TelemetryConfig, D::Error>
where
    D: Deserializer<'de>,
{
    IgnoredAny::deserialize(deserializer)?;
    Ok(TelemetryConfig::default())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedPipeline {
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub receivers: Vec<String>,

    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub processors: Vec<String>,

    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub exporters: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderedService {
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<String>,

    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub pipelines: BTreeMap<String, RenderedPipeline>,

    #[serde(default, deserialize_with = "overridden_telemetry")]
    pub telemetry: TelemetryConfig,
}

/// Rendered plugin template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderedConfig {
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "BTreeMap::is_empty")]
    pub receivers: ComponentMap,

    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "BTreeMap::is_empty")]
    pub processors: ComponentMap,

    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "BTreeMap::is_empty")]
    pub exporters: ComponentMap,

    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: ComponentMap,

    #[serde(default, deserialize_with = "null_as_default")]
    pub service: RenderedService,
}

impl RenderedConfig {
    /// Parse rendered template output
    ///
    /// Exporters are replaced by the emitter, every pipeline exports to it
    /// and the telemetry metrics level is forced to `none`.
    pub fn from_yaml(text: &str) -> PluginResult<Self> {
        let value: Value = serde_yaml::from_str(text).map_err(PluginError::ConfigParse)?;
        let mut config: RenderedConfig = match value {
            Value::Null => RenderedConfig::default(),
            value => serde_yaml::from_value(value).map_err(PluginError::ConfigParse)?,
        };
        config.route_to_emitter();
        Ok(config)
    }

    fn route_to_emitter(&mut self) {
        self.exporters = ComponentMap::from([(EMITTER_TYPE.to_string(), Value::Null)]);
        for pipeline in self.service.pipelines.values_mut() {
            pipeline.exporters = vec![EMITTER_TYPE.to_string()];
        }
        self.service.telemetry.metrics.level = MetricsLevel::None;
    }

    /// Components of a section
    pub fn section(&self, kind: Kind) -> &ComponentMap {
        match kind {
            Kind::Receiver => &self.receivers,
            Kind::Processor => &self.processors,
            Kind::Exporter => &self.exporters,
            Kind::Extension => &self.extensions,
        }
    }

    /// Parsed ids of a section's components
    pub fn component_ids(&self, kind: Kind) -> PluginResult<Vec<ComponentId>> {
        self.section(kind)
            .keys()
            .map(|key| {
                key.parse::<ComponentId>()
                    .map_err(|e| PluginError::InvalidComponentId {
                        id: key.clone(),
                        reason: e.to_string(),
                    })
            })
            .collect()
    }

    /// The config as a YAML document for the nested collector
    pub fn to_value(&self) -> PluginResult<Value> {
        serde_yaml::to_value(self).map_err(PluginError::Marshal)
    }

    pub fn to_yaml(&self) -> PluginResult<String> {
        serde_yaml::to_string(self).map_err(PluginError::Marshal)
    }
}
