//! Factory for `plugin` receivers

use crate::config::PluginReceiverConfig;
use crate::emitter::EmitterFactory;
use crate::receiver::PluginReceiver;
use crate::runner::ServiceFactory;
use otelcol_core::{
    Component, ComponentType, CreateSettings, ReceiverFactory, Result, SharedConsumer,
};
use serde_yaml::Value;
use std::sync::Arc;

/// Component type of the plugin receiver
pub const PLUGIN_RECEIVER_TYPE: &str = "plugin";

/// Builds [`PluginReceiver`]s for logs, metrics and traces
#[derive(Clone, Default)]
pub struct PluginReceiverFactory {
    service_factory: Option<ServiceFactory>,
}

impl PluginReceiverFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every receiver's nested service with `service_factory`
    pub fn with_service_factory(mut self, service_factory: ServiceFactory) -> Self {
        self.service_factory = Some(service_factory);
        self
    }

    fn create(
        &self,
        set: CreateSettings,
        config: &Value,
        emitter: EmitterFactory,
    ) -> Result<Arc<dyn Component>> {
        let config = PluginReceiverConfig::from_value(config)
            .map_err(|e| otelcol_core::Error::config(format!("{}: {}", set.id, e)))?;
        let mut receiver = PluginReceiver::new(set.id, config, emitter);
        if let Some(service_factory) = &self.service_factory {
            receiver = receiver.with_service_factory(service_factory.clone());
        }
        Ok(Arc::new(receiver))
    }
}

impl ReceiverFactory for PluginReceiverFactory {
    fn component_type(&self) -> ComponentType {
        ComponentType::from_static(PLUGIN_RECEIVER_TYPE)
    }

    fn create_default_config(&self) -> Value {
        PluginReceiverConfig::default()
            .to_value()
            .unwrap_or(Value::Null)
    }

    fn create_logs_receiver(
        &self,
        set: CreateSettings,
        config: &Value,
        next: SharedConsumer,
    ) -> Result<Arc<dyn Component>> {
        self.create(set, config, EmitterFactory::for_logs(next))
    }

    fn create_metrics_receiver(
        &self,
        set: CreateSettings,
        config: &Value,
        next: SharedConsumer,
    ) -> Result<Arc<dyn Component>> {
        self.create(set, config, EmitterFactory::for_metrics(next))
    }

    fn create_traces_receiver(
        &self,
        set: CreateSettings,
        config: &Value,
        next: SharedConsumer,
    ) -> Result<Arc<dyn Component>> {
        self.create(set, config, EmitterFactory::for_traces(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use otelcol_core::testing::CapturingConsumer;
    use otelcol_core::{ComponentId, DataType};

    #[test]
    fn test_default_config() {
        let factory = PluginReceiverFactory::new();
        assert_eq!(factory.component_type().as_str(), "plugin");

        let config = factory.create_default_config();
        assert_eq!(config.get("path").and_then(Value::as_str), Some(""));
        assert!(config.get("parameters").is_some_and(|p| p.as_mapping().is_some_and(|m| m.is_empty())));
        assert_eq!(config.get("poll_interval").and_then(Value::as_str), Some("250ms"));
    }

    #[test]
    fn test_creates_every_signal() {
        let factory = PluginReceiverFactory::new();
        let config: Value = serde_yaml::from_str("path: plugin.yaml").unwrap();
        for data_type in [DataType::Logs, DataType::Metrics, DataType::Traces] {
            let set = CreateSettings::new(ComponentId::new(factory.component_type()));
            let next: SharedConsumer = Arc::new(CapturingConsumer::new());
            assert!(factory.create_receiver(data_type, set, &config, next).is_ok());
        }
    }

    #[test]
    fn test_invalid_config_rejected_at_create() {
        let factory = PluginReceiverFactory::new();
        let set = CreateSettings::new("plugin/x".parse().unwrap());
        let config = factory.create_default_config();
        let err = factory
            .create_logs_receiver(set, &config, Arc::new(CapturingConsumer::new()))
            .err()
            .unwrap();
        assert!(err.is_config());
        assert!(err.to_string().contains("plugin/x"));
    }
}
