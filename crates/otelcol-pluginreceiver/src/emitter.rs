//! Emitter: the exporter that hands nested pipeline output to the parent
//!
//! ```text
//! ┌──────────────── nested collector ────────────────┐
//! │  receivers ──► processors ──► plugin_output ─────┼──► outer consumer
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! Every rendered pipeline exports to `plugin_output`. The emitter forwards
//! each payload synchronously to the consumer the plugin receiver was built
//! with; signals it has no consumer for are accepted and dropped.

use async_trait::async_trait;
use otelcol_core::pdata::{Logs, Metrics, Traces};
use otelcol_core::{
    Capabilities, Component, ComponentType, Consumer, CreateSettings, Exporter, ExporterFactory,
    Result, SharedConsumer,
};
use serde_yaml::Value;
use std::sync::Arc;

/// Component type of the emitter
pub const EMITTER_TYPE: &str = "plugin_output";

/// Forwards telemetry to the outer pipeline
#[derive(Clone, Default)]
pub struct Emitter {
    logs: Option<SharedConsumer>,
    metrics: Option<SharedConsumer>,
    traces: Option<SharedConsumer>,
}

impl Emitter {
    pub fn new(
        logs: Option<SharedConsumer>,
        metrics: Option<SharedConsumer>,
        traces: Option<SharedConsumer>,
    ) -> Self {
        Self {
            logs,
            metrics,
            traces,
        }
    }
}

#[async_trait]
impl Component for Emitter {}

#[async_trait]
impl Consumer for Emitter {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            mutates_data: false,
        }
    }

    async fn consume_logs(&self, logs: Logs) -> Result<()> {
        match &self.logs {
            Some(next) => next.consume_logs(logs).await,
            None => Ok(()),
        }
    }

    async fn consume_metrics(&self, metrics: Metrics) -> Result<()> {
        match &self.metrics {
            Some(next) => next.consume_metrics(metrics).await,
            None => Ok(()),
        }
    }

    async fn consume_traces(&self, traces: Traces) -> Result<()> {
        match &self.traces {
            Some(next) => next.consume_traces(traces).await,
            None => Ok(()),
        }
    }
}

/// Exporter factory for [`Emitter`]s bound to one outer consumer
#[derive(Clone, Default)]
pub struct EmitterFactory {
    emitter: Emitter,
}

impl EmitterFactory {
    pub fn for_logs(next: SharedConsumer) -> Self {
        Self {
            emitter: Emitter::new(Some(next), None, None),
        }
    }

    pub fn for_metrics(next: SharedConsumer) -> Self {
        Self {
            emitter: Emitter::new(None, Some(next), None),
        }
    }

    pub fn for_traces(next: SharedConsumer) -> Self {
        Self {
            emitter: Emitter::new(None, None, Some(next)),
        }
    }

    fn create(&self) -> Result<Arc<dyn Exporter>> {
        Ok(Arc::new(self.emitter.clone()))
    }
}

impl ExporterFactory for EmitterFactory {
    fn component_type(&self) -> ComponentType {
        ComponentType::from_static(EMITTER_TYPE)
    }

    fn create_default_config(&self) -> Value {
        Value::Null
    }

    fn create_logs_exporter(&self, _set: CreateSettings, _config: &Value) -> Result<Arc<dyn Exporter>> {
        self.create()
    }

    fn create_metrics_exporter(&self, _set: CreateSettings, _config: &Value) -> Result<Arc<dyn Exporter>> {
        self.create()
    }

    fn create_traces_exporter(&self, _set: CreateSettings, _config: &Value) -> Result<Arc<dyn Exporter>> {
        self.create()
    }
}
