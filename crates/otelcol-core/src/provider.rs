//! Configuration providers
//!
//! A [`ConfigProvider`] hands the service its configuration and may later
//! report that the configuration became invalid through its watch channel.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::factory::Factories;
use async_trait::async_trait;
use serde_yaml::Value;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Source of a service configuration
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    /// Produce the configuration, decoded against `factories`
    async fn get(&self, factories: &Factories) -> Result<Config>;

    /// Subscribe to configuration errors raised after [`get`](Self::get)
    fn watch(&self) -> broadcast::Receiver<Arc<Error>>;

    /// Release provider resources
    async fn shutdown(&self) -> Result<()>;
}

/// Provider serving a fixed YAML document
pub struct YamlConfigProvider {
    raw: Value,
    errors: broadcast::Sender<Arc<Error>>,
}

impl YamlConfigProvider {
    /// Create a provider from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(Self::new(serde_yaml::from_str(yaml)?))
    }

    /// Create a provider from an already parsed document
    pub fn new(raw: Value) -> Self {
        let (errors, _) = broadcast::channel(1);
        Self { raw, errors }
    }

    /// Report a configuration error to every watcher
    pub fn report_error(&self, error: Error) {
        // no watcher means nobody is running on this config
        let _ = self.errors.send(Arc::new(error));
    }
}

#[async_trait]
impl ConfigProvider for YamlConfigProvider {
    async fn get(&self, factories: &Factories) -> Result<Config> {
        Config::unmarshal(&self.raw, factories)
    }

    fn watch(&self) -> broadcast::Receiver<Arc<Error>> {
        self.errors.subscribe()
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}
