//! Config provider serving a rendered plugin config to the nested service

use crate::error::{PluginError, PluginResult};
use crate::rendered::RenderedConfig;
use async_trait::async_trait;
use otelcol_core::{Config, ConfigProvider, Error, Factories, Result};
use serde_yaml::Value;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Serves one rendered config, serialized once when the provider is created
///
/// The config never changes, so watchers are never notified.
pub struct RenderedConfigProvider {
    raw: Value,
    errors: broadcast::Sender<Arc<Error>>,
}

impl RenderedConfigProvider {
    pub fn new(rendered: &RenderedConfig) -> PluginResult<Self> {
        let raw = rendered.to_value()?;
        let (errors, _) = broadcast::channel(1);
        Ok(Self { raw, errors })
    }

    /// Decode the served config against `factories`
    pub fn unmarshal(&self, factories: &Factories) -> PluginResult<Config> {
        Config::unmarshal(&self.raw, factories).map_err(PluginError::Unmarshal)
    }
}

#[async_trait]
impl ConfigProvider for RenderedConfigProvider {
    async fn get(&self, factories: &Factories) -> Result<Config> {
        self.unmarshal(factories)
            .map_err(|e| Error::config(e.to_string()))
    }

    fn watch(&self) -> broadcast::Receiver<Arc<Error>> {
        self.errors.subscribe()
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::EmitterFactory;
    use otelcol_core::testing::{CapturingConsumer, NopReceiverFactory};
    use otelcol_core::{ComponentId, Kind};

    fn factories() -> Factories {
        Factories::new()
            .with_receiver(Arc::new(NopReceiverFactory))
            .with_exporter(Arc::new(EmitterFactory::for_logs(Arc::new(
                CapturingConsumer::new(),
            ))))
    }

    const RENDERED: &str = r#"
receivers:
  nop:
service:
  pipelines:
    logs:
      receivers: [nop]
"#;

    #[tokio::test]
    async fn test_get_decodes_rendered_config() {
        let rendered = RenderedConfig::from_yaml(RENDERED).unwrap();
        let provider = RenderedConfigProvider::new(&rendered).unwrap();

        let config = provider.get(&factories()).await.unwrap();
        let nop: ComponentId = "nop".parse().unwrap();
        let output: ComponentId = "plugin_output".parse().unwrap();
        assert!(config.receivers.contains_key(&nop));
        assert!(config.exporters.contains_key(&output));
        assert!(provider.shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_type_is_config_error() {
        let rendered = RenderedConfig::from_yaml(RENDERED).unwrap();
        let provider = RenderedConfigProvider::new(&rendered).unwrap();
        let bare = Factories::new().with_exporter(Arc::new(EmitterFactory::default()));

        let err = provider.unmarshal(&bare).unwrap_err();
        assert!(matches!(err, PluginError::Unmarshal(_)));
        assert!(err.to_string().starts_with("failed to unmarshal config map:"));

        let err = provider.get(&bare).await.unwrap_err();
        assert!(err.is_config());
        assert_eq!(bare.len(Kind::Receiver), 0);
    }

    #[tokio::test]
    async fn test_watch_stays_quiet() {
        let rendered = RenderedConfig::from_yaml(RENDERED).unwrap();
        let provider = RenderedConfigProvider::new(&rendered).unwrap();
        let mut watch = provider.watch();
        assert!(matches!(
            watch.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}
