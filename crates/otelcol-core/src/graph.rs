//! Pipeline graph construction and lifecycle
//!
//! ```text
//!  receiver ──┐                                  ┌──► exporter
//!             ├──► processor ──► processor ──► fan-out
//!  receiver ──┘                                  └──► exporter
//! ```
//!
//! Exporters and receivers are shared between the pipelines of one signal
//! that reference them; processors belong to a single pipeline.

use crate::component::{Component, ComponentId, DataType, Host, Kind, PipelineId};
use crate::config::{Config, MetricsLevel};
use crate::consumer::{Capabilities, Consumer, Fanout, Forward, SharedConsumer};
use crate::error::{Error, Result};
use crate::factory::{CreateSettings, Exporter, Factories, Processor};
use crate::pdata::{self, Logs, Metrics, Traces};
use async_trait::async_trait;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Counts the items flowing into a pipeline's exporters
struct ItemCounter {
    inner: SharedConsumer,
    items: AtomicU64,
}

impl ItemCounter {
    fn new(inner: SharedConsumer) -> Self {
        Self {
            inner,
            items: AtomicU64::new(0),
        }
    }

    fn add(&self, n: usize) {
        self.items.fetch_add(n as u64, Ordering::Relaxed);
    }

    fn items(&self) -> u64 {
        self.items.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Consumer for ItemCounter {
    fn capabilities(&self) -> Capabilities {
        self.inner.capabilities()
    }

    async fn consume_logs(&self, logs: Logs) -> Result<()> {
        self.add(pdata::log_record_count(&logs));
        self.inner.consume_logs(logs).await
    }

    async fn consume_metrics(&self, metrics: Metrics) -> Result<()> {
        self.add(pdata::metric_count(&metrics));
        self.inner.consume_metrics(metrics).await
    }

    async fn consume_traces(&self, traces: Traces) -> Result<()> {
        self.add(pdata::span_count(&traces));
        self.inner.consume_traces(traces).await
    }
}

/// A built component with the label used when logging about it
struct Node<T: ?Sized> {
    label: String,
    component: Arc<T>,
}

/// All component instances of a running configuration
pub(crate) struct Graph {
    extensions: Vec<Node<dyn Component>>,
    exporters: Vec<Node<dyn Exporter>>,
    processors: Vec<Node<dyn Processor>>,
    receivers: Vec<Node<dyn Component>>,
    counters: Vec<(PipelineId, Arc<ItemCounter>)>,
}

fn factory_missing(kind: Kind, id: &ComponentId) -> Error {
    Error::UnknownComponentType {
        kind,
        component_type: id.component_type().to_string(),
        id: id.to_string(),
    }
}

fn settings<'a>(
    section: &'a BTreeMap<ComponentId, Value>,
    kind: Kind,
    id: &ComponentId,
) -> Result<&'a Value> {
    section.get(id).ok_or_else(|| {
        Error::config(format!("{} {:?} is not configured", kind, id.to_string()))
    })
}

fn label(id: &ComponentId, data_type: DataType) -> String {
    format!("{} ({})", id, data_type)
}

impl Graph {
    /// Instantiate every component referenced by `config`
    ///
    /// With `count_items` set, each pipeline counts the items it hands to its
    /// exporters.
    pub(crate) fn build(config: &Config, factories: &Factories, count_items: bool) -> Result<Self> {
        let count_items =
            count_items && config.service.telemetry.metrics.level != MetricsLevel::None;
        let mut graph = Graph {
            extensions: Vec::new(),
            exporters: Vec::new(),
            processors: Vec::new(),
            receivers: Vec::new(),
            counters: Vec::new(),
        };

        for id in &config.service.extensions {
            let factory = factories
                .extensions
                .get(id.component_type())
                .ok_or_else(|| factory_missing(Kind::Extension, id))?;
            let component = factory.create_extension(
                CreateSettings::new(id.clone()),
                settings(&config.extensions, Kind::Extension, id)?,
            )?;
            graph.extensions.push(Node {
                label: id.to_string(),
                component,
            });
        }

        let mut exporters: BTreeMap<(ComponentId, DataType), Arc<dyn Exporter>> = BTreeMap::new();
        let mut entries: BTreeMap<(ComponentId, DataType), Vec<SharedConsumer>> = BTreeMap::new();

        for (pipeline_id, pipeline) in &config.service.pipelines {
            let data_type = pipeline_id.data_type();

            let mut terminal = Vec::with_capacity(pipeline.exporters.len());
            for id in &pipeline.exporters {
                let key = (id.clone(), data_type);
                let exporter = match exporters.get(&key) {
                    Some(exporter) => exporter.clone(),
                    None => {
                        let factory = factories
                            .exporters
                            .get(id.component_type())
                            .ok_or_else(|| factory_missing(Kind::Exporter, id))?;
                        let exporter = factory.create_exporter(
                            data_type,
                            CreateSettings::new(id.clone()),
                            settings(&config.exporters, Kind::Exporter, id)?,
                        )?;
                        graph.exporters.push(Node {
                            label: label(id, data_type),
                            component: exporter.clone(),
                        });
                        exporters.insert(key, exporter.clone());
                        exporter
                    }
                };
                terminal.push(Arc::new(Forward(exporter)) as SharedConsumer);
            }

            let mut next = Fanout::build(terminal);
            if count_items {
                let counter = Arc::new(ItemCounter::new(next));
                graph.counters.push((pipeline_id.clone(), counter.clone()));
                next = counter as SharedConsumer;
            }

            for id in pipeline.processors.iter().rev() {
                let factory = factories
                    .processors
                    .get(id.component_type())
                    .ok_or_else(|| factory_missing(Kind::Processor, id))?;
                let processor = factory.create_processor(
                    data_type,
                    CreateSettings::new(id.clone()),
                    settings(&config.processors, Kind::Processor, id)?,
                    next,
                )?;
                graph.processors.push(Node {
                    label: format!("{} ({})", id, pipeline_id),
                    component: processor.clone(),
                });
                next = Arc::new(Forward(processor)) as SharedConsumer;
            }

            for id in &pipeline.receivers {
                entries
                    .entry((id.clone(), data_type))
                    .or_default()
                    .push(next.clone());
            }
        }

        for ((id, data_type), consumers) in entries {
            let factory = factories
                .receivers
                .get(id.component_type())
                .ok_or_else(|| factory_missing(Kind::Receiver, &id))?;
            let receiver = factory.create_receiver(
                data_type,
                CreateSettings::new(id.clone()),
                settings(&config.receivers, Kind::Receiver, &id)?,
                Fanout::build(consumers),
            )?;
            graph.receivers.push(Node {
                label: label(&id, data_type),
                component: receiver,
            });
        }

        debug!(
            extensions = graph.extensions.len(),
            exporters = graph.exporters.len(),
            processors = graph.processors.len(),
            receivers = graph.receivers.len(),
            "Built pipeline graph"
        );
        Ok(graph)
    }

    /// Start extensions, exporters, processors and receivers, in that order
    pub(crate) async fn start(&self, host: Arc<dyn Host>) -> Result<()> {
        for node in &self.extensions {
            start_node(node, &host).await?;
        }
        for node in &self.exporters {
            start_node(node, &host).await?;
        }
        for node in &self.processors {
            start_node(node, &host).await?;
        }
        for node in &self.receivers {
            start_node(node, &host).await?;
        }
        Ok(())
    }

    /// Shut components down in reverse start order
    ///
    /// Every component is asked to shut down; the first error is returned.
    pub(crate) async fn shutdown(&self) -> Result<()> {
        let mut first_err = None;
        let mut record = |result: Result<()>| {
            if let Err(e) = result {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        };

        for node in self.receivers.iter().rev() {
            record(shutdown_node(node).await);
        }
        for node in self.processors.iter().rev() {
            record(shutdown_node(node).await);
        }
        for node in self.exporters.iter().rev() {
            record(shutdown_node(node).await);
        }
        for node in self.extensions.iter().rev() {
            record(shutdown_node(node).await);
        }

        for (pipeline, counter) in &self.counters {
            info!(pipeline = %pipeline, items = counter.items(), "Pipeline totals");
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

async fn start_node<T: Component + ?Sized>(node: &Node<T>, host: &Arc<dyn Host>) -> Result<()> {
    debug!(component = %node.label, "Starting component");
    node.component
        .start(host.clone())
        .await
        .map_err(|e| Error::component(&node.label, e))
}

async fn shutdown_node<T: Component + ?Sized>(node: &Node<T>) -> Result<()> {
    debug!(component = %node.label, "Shutting down component");
    let result = node.component.shutdown().await;
    if let Err(e) = &result {
        warn!(component = %node.label, error = %e, "Component shutdown failed");
    }
    result.map_err(|e| Error::component(&node.label, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CaptureExporterFactory, GeneratorReceiverFactory, NopProcessorFactory};

    #[tokio::test]
    async fn test_build_and_start_delivers() {
        let capture = Arc::new(CaptureExporterFactory::new());
        let factories = Factories::new()
            .with_receiver(Arc::new(GeneratorReceiverFactory))
            .with_processor(Arc::new(NopProcessorFactory))
            .with_exporter(capture.clone());

        let yaml = r#"
receivers:
  generator:
    count: 2
processors:
  nop:
exporters:
  capture:
service:
  pipelines:
    logs/a:
      receivers: [generator]
      processors: [nop]
      exporters: [capture]
    logs/b:
      receivers: [generator]
      exporters: [capture]
"#;
        let config = Config::from_yaml(yaml, &factories).unwrap();
        let graph = Graph::build(&config, &factories, true).unwrap();

        // one shared receiver and exporter, one processor per pipeline
        assert_eq!(graph.receivers.len(), 1);
        assert_eq!(graph.exporters.len(), 1);
        assert_eq!(graph.processors.len(), 1);
        assert_eq!(graph.counters.len(), 2);

        let host: Arc<dyn Host> = Arc::new(factories.clone());
        graph.start(host).await.unwrap();
        graph.shutdown().await.unwrap();

        // the generator fans out to both pipelines
        assert_eq!(capture.sink().log_record_count(), 4);
        for (_, counter) in &graph.counters {
            assert_eq!(counter.items(), 2);
        }
    }

    #[tokio::test]
    async fn test_level_none_skips_counting() {
        let factories = Factories::new()
            .with_receiver(Arc::new(GeneratorReceiverFactory))
            .with_exporter(Arc::new(CaptureExporterFactory::new()));
        let yaml = r#"
receivers:
  generator:
exporters:
  capture:
service:
  pipelines:
    logs:
      receivers: [generator]
      exporters: [capture]
  telemetry:
    metrics:
      level: none
"#;
        let config = Config::from_yaml(yaml, &factories).unwrap();
        let graph = Graph::build(&config, &factories, true).unwrap();
        assert!(graph.counters.is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_signal_fails_build() {
        let factories = Factories::new()
            .with_receiver(Arc::new(GeneratorReceiverFactory))
            .with_exporter(Arc::new(CaptureExporterFactory::new()));
        let yaml = r#"
receivers:
  generator:
exporters:
  capture:
service:
  pipelines:
    traces:
      receivers: [generator]
      exporters: [capture]
"#;
        let config = Config::from_yaml(yaml, &factories).unwrap();
        let err = Graph::build(&config, &factories, false).err().unwrap();
        assert!(matches!(err, Error::DataTypeNotSupported { .. }));
    }
}
