//! Testing utilities for collector components
//!
//! Reusable components and doubles for exercising pipelines without any
//! external system.
//!
//! # Example
//!
//! ```rust,ignore
//! use otelcol_core::testing::*;
//!
//! let capture = Arc::new(CaptureExporterFactory::new());
//! let factories = Factories::new()
//!     .with_receiver(Arc::new(GeneratorReceiverFactory))
//!     .with_exporter(capture.clone());
//!
//! // run a service with `generator` -> `capture`, then:
//! assert_eq!(capture.sink().log_record_count(), 1);
//! ```

use crate::component::{Component, ComponentType, Host, Kind};
use crate::consumer::{Consumer, SharedConsumer};
use crate::error::{Error, Result};
use crate::factory::{
    CreateSettings, Exporter, ExporterFactory, ExtensionFactory, Factories, Factory, Processor,
    ProcessorFactory, ReceiverFactory,
};
use crate::pdata::{self, Logs, Metrics, Traces};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Capturing Consumer
// ============================================================================

/// A consumer that keeps every payload it receives
#[derive(Debug, Default)]
pub struct CapturingConsumer {
    logs: Mutex<Vec<Logs>>,
    metrics: Mutex<Vec<Metrics>>,
    traces: Mutex<Vec<Traces>>,
}

impl CapturingConsumer {
    /// Create an empty capturing consumer
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs payloads received so far
    pub fn logs(&self) -> Vec<Logs> {
        self.logs.lock().clone()
    }

    /// Metrics payloads received so far
    pub fn metrics(&self) -> Vec<Metrics> {
        self.metrics.lock().clone()
    }

    /// Traces payloads received so far
    pub fn traces(&self) -> Vec<Traces> {
        self.traces.lock().clone()
    }

    /// Total number of log records received
    pub fn log_record_count(&self) -> usize {
        self.logs.lock().iter().map(pdata::log_record_count).sum()
    }

    /// Total number of metrics received
    pub fn metric_count(&self) -> usize {
        self.metrics.lock().iter().map(pdata::metric_count).sum()
    }

    /// Total number of spans received
    pub fn span_count(&self) -> usize {
        self.traces.lock().iter().map(pdata::span_count).sum()
    }

    /// Wait until at least `count` log records arrived
    ///
    /// Returns false if `timeout` elapses first.
    pub async fn wait_for_log_records(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.log_record_count() >= count {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Forget everything received so far
    pub fn clear(&self) {
        self.logs.lock().clear();
        self.metrics.lock().clear();
        self.traces.lock().clear();
    }
}

#[async_trait]
impl Consumer for CapturingConsumer {
    async fn consume_logs(&self, logs: Logs) -> Result<()> {
        self.logs.lock().push(logs);
        Ok(())
    }

    async fn consume_metrics(&self, metrics: Metrics) -> Result<()> {
        self.metrics.lock().push(metrics);
        Ok(())
    }

    async fn consume_traces(&self, traces: Traces) -> Result<()> {
        self.traces.lock().push(traces);
        Ok(())
    }
}

#[async_trait]
impl Component for CapturingConsumer {}

// ============================================================================
// Nop Components
// ============================================================================

/// A component that does nothing
#[derive(Debug, Default)]
pub struct NopComponent;

#[async_trait]
impl Component for NopComponent {}

/// Accepts every payload and drops it
#[derive(Debug, Default)]
pub struct NopExporter;

#[async_trait]
impl Component for NopExporter {}

#[async_trait]
impl Consumer for NopExporter {
    async fn consume_logs(&self, _logs: Logs) -> Result<()> {
        Ok(())
    }

    async fn consume_metrics(&self, _metrics: Metrics) -> Result<()> {
        Ok(())
    }

    async fn consume_traces(&self, _traces: Traces) -> Result<()> {
        Ok(())
    }
}

/// Passes every payload on unchanged
pub struct NopProcessor {
    next: SharedConsumer,
}

#[async_trait]
impl Component for NopProcessor {}

#[async_trait]
impl Consumer for NopProcessor {
    async fn consume_logs(&self, logs: Logs) -> Result<()> {
        self.next.consume_logs(logs).await
    }

    async fn consume_metrics(&self, metrics: Metrics) -> Result<()> {
        self.next.consume_metrics(metrics).await
    }

    async fn consume_traces(&self, traces: Traces) -> Result<()> {
        self.next.consume_traces(traces).await
    }
}

/// Receiver factory of type `nop` for every signal
#[derive(Debug, Default)]
pub struct NopReceiverFactory;

impl ReceiverFactory for NopReceiverFactory {
    fn component_type(&self) -> ComponentType {
        ComponentType::from_static("nop")
    }

    fn create_logs_receiver(
        &self,
        _set: CreateSettings,
        _config: &Value,
        _next: SharedConsumer,
    ) -> Result<Arc<dyn Component>> {
        Ok(Arc::new(NopComponent))
    }

    fn create_metrics_receiver(
        &self,
        _set: CreateSettings,
        _config: &Value,
        _next: SharedConsumer,
    ) -> Result<Arc<dyn Component>> {
        Ok(Arc::new(NopComponent))
    }

    fn create_traces_receiver(
        &self,
        _set: CreateSettings,
        _config: &Value,
        _next: SharedConsumer,
    ) -> Result<Arc<dyn Component>> {
        Ok(Arc::new(NopComponent))
    }
}

/// Processor factory of type `nop` for every signal
#[derive(Debug, Default)]
pub struct NopProcessorFactory;

impl ProcessorFactory for NopProcessorFactory {
    fn component_type(&self) -> ComponentType {
        ComponentType::from_static("nop")
    }

    fn create_logs_processor(
        &self,
        _set: CreateSettings,
        _config: &Value,
        next: SharedConsumer,
    ) -> Result<Arc<dyn Processor>> {
        Ok(Arc::new(NopProcessor { next }))
    }

    fn create_metrics_processor(
        &self,
        _set: CreateSettings,
        _config: &Value,
        next: SharedConsumer,
    ) -> Result<Arc<dyn Processor>> {
        Ok(Arc::new(NopProcessor { next }))
    }

    fn create_traces_processor(
        &self,
        _set: CreateSettings,
        _config: &Value,
        next: SharedConsumer,
    ) -> Result<Arc<dyn Processor>> {
        Ok(Arc::new(NopProcessor { next }))
    }
}

/// Exporter factory of type `nop` for every signal
#[derive(Debug, Default)]
pub struct NopExporterFactory;

impl ExporterFactory for NopExporterFactory {
    fn component_type(&self) -> ComponentType {
        ComponentType::from_static("nop")
    }

    fn create_logs_exporter(&self, _set: CreateSettings, _config: &Value) -> Result<Arc<dyn Exporter>> {
        Ok(Arc::new(NopExporter))
    }

    fn create_metrics_exporter(&self, _set: CreateSettings, _config: &Value) -> Result<Arc<dyn Exporter>> {
        Ok(Arc::new(NopExporter))
    }

    fn create_traces_exporter(&self, _set: CreateSettings, _config: &Value) -> Result<Arc<dyn Exporter>> {
        Ok(Arc::new(NopExporter))
    }
}

/// Extension factory of type `nop`
#[derive(Debug, Default)]
pub struct NopExtensionFactory;

impl ExtensionFactory for NopExtensionFactory {
    fn component_type(&self) -> ComponentType {
        ComponentType::from_static("nop")
    }

    fn create_extension(&self, _set: CreateSettings, _config: &Value) -> Result<Arc<dyn Component>> {
        Ok(Arc::new(NopComponent))
    }
}

// ============================================================================
// Generator Receiver
// ============================================================================

/// Settings of the `generator` receiver
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Number of log records emitted on start
    pub count: usize,
    /// Body of every emitted record
    pub body: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            count: 1,
            body: "generated".to_string(),
        }
    }
}

/// Emits one batch of log records when started
pub struct GeneratorReceiver {
    config: GeneratorConfig,
    next: SharedConsumer,
}

#[async_trait]
impl Component for GeneratorReceiver {
    async fn start(&self, _host: Arc<dyn Host>) -> Result<()> {
        let bodies = std::iter::repeat(self.config.body.as_str()).take(self.config.count);
        self.next.consume_logs(pdata::logs_from_bodies(bodies)).await
    }
}

/// Receiver factory of type `generator`, logs only
#[derive(Debug, Default)]
pub struct GeneratorReceiverFactory;

impl ReceiverFactory for GeneratorReceiverFactory {
    fn component_type(&self) -> ComponentType {
        ComponentType::from_static("generator")
    }

    fn create_default_config(&self) -> Value {
        let defaults = GeneratorConfig::default();
        let mut mapping = Mapping::new();
        mapping.insert("count".into(), Value::from(defaults.count as u64));
        mapping.insert("body".into(), Value::from(defaults.body));
        Value::Mapping(mapping)
    }

    fn create_logs_receiver(
        &self,
        _set: CreateSettings,
        config: &Value,
        next: SharedConsumer,
    ) -> Result<Arc<dyn Component>> {
        let config: GeneratorConfig = serde_yaml::from_value(config.clone())
            .map_err(|e| Error::config(format!("generator: {}", e)))?;
        Ok(Arc::new(GeneratorReceiver { config, next }))
    }
}

/// A receiver whose start always fails
#[derive(Debug, Default)]
pub struct FailingReceiver;

#[async_trait]
impl Component for FailingReceiver {
    async fn start(&self, _host: Arc<dyn Host>) -> Result<()> {
        Err(Error::service("failing receiver refused to start"))
    }
}

/// Receiver factory of type `failing`, logs only
#[derive(Debug, Default)]
pub struct FailingReceiverFactory;

impl ReceiverFactory for FailingReceiverFactory {
    fn component_type(&self) -> ComponentType {
        ComponentType::from_static("failing")
    }

    fn create_logs_receiver(
        &self,
        _set: CreateSettings,
        _config: &Value,
        _next: SharedConsumer,
    ) -> Result<Arc<dyn Component>> {
        Ok(Arc::new(FailingReceiver))
    }
}

// ============================================================================
// Capture Exporter
// ============================================================================

struct CaptureExporter {
    sink: Arc<CapturingConsumer>,
}

#[async_trait]
impl Component for CaptureExporter {}

#[async_trait]
impl Consumer for CaptureExporter {
    async fn consume_logs(&self, logs: Logs) -> Result<()> {
        self.sink.consume_logs(logs).await
    }

    async fn consume_metrics(&self, metrics: Metrics) -> Result<()> {
        self.sink.consume_metrics(metrics).await
    }

    async fn consume_traces(&self, traces: Traces) -> Result<()> {
        self.sink.consume_traces(traces).await
    }
}

/// Exporter factory of type `capture`
///
/// Every exporter it creates writes into the same [`CapturingConsumer`].
#[derive(Debug, Default)]
pub struct CaptureExporterFactory {
    sink: Arc<CapturingConsumer>,
}

impl CaptureExporterFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The consumer every created exporter writes into
    pub fn sink(&self) -> Arc<CapturingConsumer> {
        self.sink.clone()
    }

    fn exporter(&self) -> Arc<dyn Exporter> {
        Arc::new(CaptureExporter {
            sink: self.sink.clone(),
        })
    }
}

impl ExporterFactory for CaptureExporterFactory {
    fn component_type(&self) -> ComponentType {
        ComponentType::from_static("capture")
    }

    fn create_logs_exporter(&self, _set: CreateSettings, _config: &Value) -> Result<Arc<dyn Exporter>> {
        Ok(self.exporter())
    }

    fn create_metrics_exporter(&self, _set: CreateSettings, _config: &Value) -> Result<Arc<dyn Exporter>> {
        Ok(self.exporter())
    }

    fn create_traces_exporter(&self, _set: CreateSettings, _config: &Value) -> Result<Arc<dyn Exporter>> {
        Ok(self.exporter())
    }
}

// ============================================================================
// Mock Host
// ============================================================================

/// A host answering from a factory set and counting every lookup
#[derive(Debug, Default)]
pub struct MockHost {
    factories: Factories,
    lookups: Mutex<HashMap<(Kind, String), usize>>,
}

impl MockHost {
    pub fn new(factories: Factories) -> Self {
        Self {
            factories,
            lookups: Mutex::new(HashMap::new()),
        }
    }

    /// How often `component_type` of `kind` was looked up
    pub fn lookups(&self, kind: Kind, component_type: &str) -> usize {
        self.lookups
            .lock()
            .get(&(kind, component_type.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Total number of lookups of any kind
    pub fn total_lookups(&self) -> usize {
        self.lookups.lock().values().sum()
    }
}

impl Host for MockHost {
    fn get_factory(&self, kind: Kind, component_type: &ComponentType) -> Option<Factory> {
        *self
            .lookups
            .lock()
            .entry((kind, component_type.to_string()))
            .or_insert(0) += 1;
        self.factories.get(kind, component_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::Forward;

    #[tokio::test]
    async fn test_capturing_consumer_counts() {
        let sink = CapturingConsumer::new();
        sink.consume_logs(pdata::logs_from_bodies(["a", "b"])).await.unwrap();
        sink.consume_metrics(Metrics::default()).await.unwrap();
        assert_eq!(sink.log_record_count(), 2);
        assert_eq!(sink.metrics().len(), 1);
        assert!(sink.wait_for_log_records(2, Duration::from_millis(10)).await);
        assert!(!sink.wait_for_log_records(3, Duration::from_millis(10)).await);

        sink.clear();
        assert_eq!(sink.log_record_count(), 0);
    }

    #[tokio::test]
    async fn test_generator_emits_on_start() {
        let sink = Arc::new(CapturingConsumer::new());
        let config: Value = serde_yaml::from_str("count: 3\nbody: hello").unwrap();
        let receiver = GeneratorReceiverFactory
            .create_logs_receiver(
                CreateSettings::new("generator".parse().unwrap()),
                &config,
                Arc::new(Forward(sink.clone())),
            )
            .unwrap();

        receiver
            .start(Arc::new(Factories::new()))
            .await
            .unwrap();

        assert_eq!(pdata::log_bodies(&sink.logs()[0]), vec!["hello"; 3]);
    }

    #[test]
    fn test_mock_host_counts_lookups() {
        let host = MockHost::new(Factories::new().with_receiver(Arc::new(NopReceiverFactory)));
        let nop = ComponentType::from_static("nop");
        assert!(host.get_factory(Kind::Receiver, &nop).is_some());
        assert!(host.get_factory(Kind::Receiver, &nop).is_some());
        assert!(host.get_factory(Kind::Exporter, &nop).is_none());
        assert_eq!(host.lookups(Kind::Receiver, "nop"), 2);
        assert_eq!(host.lookups(Kind::Exporter, "nop"), 1);
        assert_eq!(host.total_lookups(), 3);
    }
}
