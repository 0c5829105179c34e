//! otelcol-pluginreceiver - Receiver running parameterized plugins
//!
//! A plugin is a templated collector config plus the parameters it accepts.
//! The `plugin` receiver renders it with user values and runs the result as
//! a nested collector whose output feeds the receiver's own pipeline.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  plugin.yaml ──► Plugin::load ──► check_parameters ──► render   │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  RenderedConfig (exporters replaced by plugin_output)           │
//! │  ├── resolve_factories(host)                                    │
//! │  └── RenderedConfigProvider                                     │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  nested Service: receivers ─► processors ─► plugin_output ──────┼──► next
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Library Usage
//!
//! ```rust,ignore
//! use otelcol_pluginreceiver::PluginReceiverFactory;
//!
//! let factories = Factories::new()
//!     .with_receiver(Arc::new(PluginReceiverFactory::new()))
//!     .with_receiver(Arc::new(FileLogReceiverFactory::new()));
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Check parameter values against a plugin
//! plugin-render -p nginx.yaml --param file_path='[/var/log/nginx/access.log]' validate
//!
//! # Print the config the receiver would run
//! plugin-render -p nginx.yaml --param file_path='[/var/log/nginx/access.log]' render
//! ```

pub mod config;
pub mod emitter;
pub mod error;
pub mod factory;
pub mod plugin;
pub mod provider;
pub mod receiver;
pub mod rendered;
pub mod resolver;
pub mod runner;
pub mod storage;
pub mod template;

pub use config::PluginReceiverConfig;
pub use emitter::{Emitter, EmitterFactory, EMITTER_TYPE};
pub use error::{PluginError, PluginResult, Stage};
pub use factory::{PluginReceiverFactory, PLUGIN_RECEIVER_TYPE};
pub use plugin::{Parameter, ParameterMap, ParameterType, Plugin};
pub use provider::RenderedConfigProvider;
pub use receiver::{PluginReceiver, ReceiverState};
pub use rendered::{RenderedConfig, RenderedPipeline, RenderedService};
pub use resolver::resolve_factories;
pub use runner::{default_service_factory, start_service, NestedService, RunningService, ServiceFactory};
pub use template::{GoTemplateEngine, Template, TemplateEngine, TemplateError};
