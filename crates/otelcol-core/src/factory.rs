//! Component factories and the factory registry
//!
//! A factory knows how to produce the default configuration of its component
//! type and how to build a component instance for a given signal. The
//! [`Factories`] registry groups factories by kind and answers
//! [`Host::get_factory`] lookups.
//!
//! # Example
//!
//! ```rust,ignore
//! use otelcol_core::Factories;
//! use std::sync::Arc;
//!
//! let factories = Factories::new()
//!     .with_receiver(Arc::new(MyReceiverFactory))
//!     .with_exporter(Arc::new(MyExporterFactory));
//! ```

use crate::component::{Component, ComponentId, ComponentType, DataType, Host, Kind};
use crate::consumer::{Consumer, SharedConsumer};
use crate::error::{Error, Result};
use serde_yaml::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Processors sit between receivers and exporters
pub trait Processor: Component + Consumer {}

impl<T: Component + Consumer + ?Sized> Processor for T {}

/// Exporters terminate a pipeline
pub trait Exporter: Component + Consumer {}

impl<T: Component + Consumer + ?Sized> Exporter for T {}

/// Settings handed to a factory when it builds a component
#[derive(Debug, Clone)]
pub struct CreateSettings {
    /// Id of the component being built
    pub id: ComponentId,
    /// Span the component should log within
    pub span: tracing::Span,
}

impl CreateSettings {
    pub fn new(id: ComponentId) -> Self {
        let span = tracing::info_span!("component", id = %id);
        Self { id, span }
    }
}

fn unsupported(kind: Kind, component_type: ComponentType, data_type: DataType) -> Error {
    Error::DataTypeNotSupported {
        kind,
        component_type: component_type.to_string(),
        data_type,
    }
}

fn empty_config() -> Value {
    Value::Mapping(Default::default())
}

/// Factory for receivers
pub trait ReceiverFactory: Send + Sync {
    fn component_type(&self) -> ComponentType;

    fn create_default_config(&self) -> Value {
        empty_config()
    }

    fn create_logs_receiver(
        &self,
        _set: CreateSettings,
        _config: &Value,
        _next: SharedConsumer,
    ) -> Result<Arc<dyn Component>> {
        Err(unsupported(Kind::Receiver, self.component_type(), DataType::Logs))
    }

    fn create_metrics_receiver(
        &self,
        _set: CreateSettings,
        _config: &Value,
        _next: SharedConsumer,
    ) -> Result<Arc<dyn Component>> {
        Err(unsupported(Kind::Receiver, self.component_type(), DataType::Metrics))
    }

    fn create_traces_receiver(
        &self,
        _set: CreateSettings,
        _config: &Value,
        _next: SharedConsumer,
    ) -> Result<Arc<dyn Component>> {
        Err(unsupported(Kind::Receiver, self.component_type(), DataType::Traces))
    }

    /// Build a receiver for `data_type`
    fn create_receiver(
        &self,
        data_type: DataType,
        set: CreateSettings,
        config: &Value,
        next: SharedConsumer,
    ) -> Result<Arc<dyn Component>> {
        match data_type {
            DataType::Logs => self.create_logs_receiver(set, config, next),
            DataType::Metrics => self.create_metrics_receiver(set, config, next),
            DataType::Traces => self.create_traces_receiver(set, config, next),
        }
    }
}

/// Factory for processors
pub trait ProcessorFactory: Send + Sync {
    fn component_type(&self) -> ComponentType;

    fn create_default_config(&self) -> Value {
        empty_config()
    }

    fn create_logs_processor(
        &self,
        _set: CreateSettings,
        _config: &Value,
        _next: SharedConsumer,
    ) -> Result<Arc<dyn Processor>> {
        Err(unsupported(Kind::Processor, self.component_type(), DataType::Logs))
    }

    fn create_metrics_processor(
        &self,
        _set: CreateSettings,
        _config: &Value,
        _next: SharedConsumer,
    ) -> Result<Arc<dyn Processor>> {
        Err(unsupported(Kind::Processor, self.component_type(), DataType::Metrics))
    }

    fn create_traces_processor(
        &self,
        _set: CreateSettings,
        _config: &Value,
        _next: SharedConsumer,
    ) -> Result<Arc<dyn Processor>> {
        Err(unsupported(Kind::Processor, self.component_type(), DataType::Traces))
    }

    /// Build a processor for `data_type`
    fn create_processor(
        &self,
        data_type: DataType,
        set: CreateSettings,
        config: &Value,
        next: SharedConsumer,
    ) -> Result<Arc<dyn Processor>> {
        match data_type {
            DataType::Logs => self.create_logs_processor(set, config, next),
            DataType::Metrics => self.create_metrics_processor(set, config, next),
            DataType::Traces => self.create_traces_processor(set, config, next),
        }
    }
}

/// Factory for exporters
pub trait ExporterFactory: Send + Sync {
    fn component_type(&self) -> ComponentType;

    fn create_default_config(&self) -> Value {
        empty_config()
    }

    fn create_logs_exporter(
        &self,
        _set: CreateSettings,
        _config: &Value,
    ) -> Result<Arc<dyn Exporter>> {
        Err(unsupported(Kind::Exporter, self.component_type(), DataType::Logs))
    }

    fn create_metrics_exporter(
        &self,
        _set: CreateSettings,
        _config: &Value,
    ) -> Result<Arc<dyn Exporter>> {
        Err(unsupported(Kind::Exporter, self.component_type(), DataType::Metrics))
    }

    fn create_traces_exporter(
        &self,
        _set: CreateSettings,
        _config: &Value,
    ) -> Result<Arc<dyn Exporter>> {
        Err(unsupported(Kind::Exporter, self.component_type(), DataType::Traces))
    }

    /// Build an exporter for `data_type`
    fn create_exporter(
        &self,
        data_type: DataType,
        set: CreateSettings,
        config: &Value,
    ) -> Result<Arc<dyn Exporter>> {
        match data_type {
            DataType::Logs => self.create_logs_exporter(set, config),
            DataType::Metrics => self.create_metrics_exporter(set, config),
            DataType::Traces => self.create_traces_exporter(set, config),
        }
    }
}

/// Factory for extensions
pub trait ExtensionFactory: Send + Sync {
    fn component_type(&self) -> ComponentType;

    fn create_default_config(&self) -> Value {
        empty_config()
    }

    fn create_extension(&self, set: CreateSettings, config: &Value)
        -> Result<Arc<dyn Component>>;
}

/// A factory of any kind
#[derive(Clone)]
pub enum Factory {
    Receiver(Arc<dyn ReceiverFactory>),
    Processor(Arc<dyn ProcessorFactory>),
    Exporter(Arc<dyn ExporterFactory>),
    Extension(Arc<dyn ExtensionFactory>),
}

impl Factory {
    pub fn kind(&self) -> Kind {
        match self {
            Factory::Receiver(_) => Kind::Receiver,
            Factory::Processor(_) => Kind::Processor,
            Factory::Exporter(_) => Kind::Exporter,
            Factory::Extension(_) => Kind::Extension,
        }
    }

    pub fn component_type(&self) -> ComponentType {
        match self {
            Factory::Receiver(f) => f.component_type(),
            Factory::Processor(f) => f.component_type(),
            Factory::Exporter(f) => f.component_type(),
            Factory::Extension(f) => f.component_type(),
        }
    }

    pub fn create_default_config(&self) -> Value {
        match self {
            Factory::Receiver(f) => f.create_default_config(),
            Factory::Processor(f) => f.create_default_config(),
            Factory::Exporter(f) => f.create_default_config(),
            Factory::Extension(f) => f.create_default_config(),
        }
    }

    pub fn into_receiver(self) -> Option<Arc<dyn ReceiverFactory>> {
        match self {
            Factory::Receiver(f) => Some(f),
            _ => None,
        }
    }

    pub fn into_processor(self) -> Option<Arc<dyn ProcessorFactory>> {
        match self {
            Factory::Processor(f) => Some(f),
            _ => None,
        }
    }

    pub fn into_exporter(self) -> Option<Arc<dyn ExporterFactory>> {
        match self {
            Factory::Exporter(f) => Some(f),
            _ => None,
        }
    }

    pub fn into_extension(self) -> Option<Arc<dyn ExtensionFactory>> {
        match self {
            Factory::Extension(f) => Some(f),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Factory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Factory({} {})", self.kind(), self.component_type())
    }
}

/// Registry of the factories available to a runtime
///
/// Factories are keyed by their component type. Registering a second
/// factory of the same kind and type replaces the first.
#[derive(Clone, Default)]
pub struct Factories {
    pub receivers: HashMap<ComponentType, Arc<dyn ReceiverFactory>>,
    pub processors: HashMap<ComponentType, Arc<dyn ProcessorFactory>>,
    pub exporters: HashMap<ComponentType, Arc<dyn ExporterFactory>>,
    pub extensions: HashMap<ComponentType, Arc<dyn ExtensionFactory>>,
}

impl Factories {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory of any kind
    pub fn register(&mut self, factory: Factory) {
        let component_type = factory.component_type();
        match factory {
            Factory::Receiver(f) => {
                self.receivers.insert(component_type, f);
            }
            Factory::Processor(f) => {
                self.processors.insert(component_type, f);
            }
            Factory::Exporter(f) => {
                self.exporters.insert(component_type, f);
            }
            Factory::Extension(f) => {
                self.extensions.insert(component_type, f);
            }
        }
    }

    pub fn with_receiver(mut self, factory: Arc<dyn ReceiverFactory>) -> Self {
        self.register(Factory::Receiver(factory));
        self
    }

    pub fn with_processor(mut self, factory: Arc<dyn ProcessorFactory>) -> Self {
        self.register(Factory::Processor(factory));
        self
    }

    pub fn with_exporter(mut self, factory: Arc<dyn ExporterFactory>) -> Self {
        self.register(Factory::Exporter(factory));
        self
    }

    pub fn with_extension(mut self, factory: Arc<dyn ExtensionFactory>) -> Self {
        self.register(Factory::Extension(factory));
        self
    }

    /// Get a factory by kind and type
    pub fn get(&self, kind: Kind, component_type: &ComponentType) -> Option<Factory> {
        match kind {
            Kind::Receiver => self
                .receivers
                .get(component_type)
                .cloned()
                .map(Factory::Receiver),
            Kind::Processor => self
                .processors
                .get(component_type)
                .cloned()
                .map(Factory::Processor),
            Kind::Exporter => self
                .exporters
                .get(component_type)
                .cloned()
                .map(Factory::Exporter),
            Kind::Extension => self
                .extensions
                .get(component_type)
                .cloned()
                .map(Factory::Extension),
        }
    }

    /// Check if a factory is registered
    pub fn contains(&self, kind: Kind, component_type: &ComponentType) -> bool {
        match kind {
            Kind::Receiver => self.receivers.contains_key(component_type),
            Kind::Processor => self.processors.contains_key(component_type),
            Kind::Exporter => self.exporters.contains_key(component_type),
            Kind::Extension => self.extensions.contains_key(component_type),
        }
    }

    /// Number of registered factories of a kind
    pub fn len(&self, kind: Kind) -> usize {
        match kind {
            Kind::Receiver => self.receivers.len(),
            Kind::Processor => self.processors.len(),
            Kind::Exporter => self.exporters.len(),
            Kind::Extension => self.extensions.len(),
        }
    }

    /// Check if no factory of any kind is registered
    pub fn is_empty(&self) -> bool {
        Kind::ALL.iter().all(|kind| self.len(*kind) == 0)
    }
}

impl Host for Factories {
    fn get_factory(&self, kind: Kind, component_type: &ComponentType) -> Option<Factory> {
        self.get(kind, component_type)
    }
}

impl std::fmt::Debug for Factories {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names = |map: Vec<&ComponentType>| {
            let mut names: Vec<String> = map.into_iter().map(|t| t.to_string()).collect();
            names.sort();
            names
        };
        f.debug_struct("Factories")
            .field("receivers", &names(self.receivers.keys().collect()))
            .field("processors", &names(self.processors.keys().collect()))
            .field("exporters", &names(self.exporters.keys().collect()))
            .field("extensions", &names(self.extensions.keys().collect()))
            .finish()
    }
}
