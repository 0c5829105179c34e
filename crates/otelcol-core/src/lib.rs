//! otelcol-core - Minimal embeddable telemetry collector runtime
//!
//! This crate provides the pieces a collector component needs to plug into a
//! pipeline: component identity, factories, the consumer chain, raw
//! configuration unmarshalling and a [`Service`] that runs a pipeline graph.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  ConfigProvider ──► Config::unmarshal(raw, Factories)        │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Service                                                     │
//! │  ├── extensions                                              │
//! │  └── pipelines: receivers ─► processors ─► exporters         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Host::get_factory(kind, type) for components                │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use otelcol_core::{Factories, Service, ServiceSettings, YamlConfigProvider};
//!
//! let service = Service::new(ServiceSettings {
//!     factories,
//!     config_provider: Arc::new(YamlConfigProvider::from_yaml(yaml)?),
//!     telemetry_enabled: true,
//! });
//! service.run().await?;
//! ```

pub mod component;
pub mod config;
pub mod consumer;
pub mod error;
pub mod factory;
mod graph;
pub mod pdata;
pub mod provider;
pub mod service;
pub mod testing;

pub use component::{
    Component, ComponentId, ComponentType, DataType, Host, Kind, PipelineId,
    TYPE_AND_NAME_SEPARATOR,
};
pub use config::{Config, MetricsLevel, PipelineConfig, ServiceConfig, TelemetryConfig};
pub use consumer::{Capabilities, Consumer, Fanout, Forward, SharedConsumer};
pub use error::{BoxError, Error, Result};
pub use factory::{
    CreateSettings, Exporter, ExporterFactory, ExtensionFactory, Factories, Factory, Processor,
    ProcessorFactory, ReceiverFactory,
};
pub use provider::{ConfigProvider, YamlConfigProvider};
pub use service::{Service, ServiceSettings, State};
