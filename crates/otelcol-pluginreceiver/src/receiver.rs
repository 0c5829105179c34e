//! The plugin receiver
//!
//! ```text
//!  Created ──► Starting ──► Running ──► ShuttingDown ──► Stopped
//!                 │            │              │
//!                 └──────────► Failed ◄───────┘
//! ```
//!
//! Starting a receiver loads its plugin, checks and renders it, resolves
//! the factories the rendered config needs and starts the nested service.
//! Every step failing names its stage in the error.

use crate::config::PluginReceiverConfig;
use crate::emitter::EmitterFactory;
use crate::error::{PluginError, PluginResult, Stage};
use crate::plugin::Plugin;
use crate::provider::RenderedConfigProvider;
use crate::resolver::resolve_factories;
use crate::runner::{default_service_factory, start_service, RunningService, ServiceFactory};
use async_trait::async_trait;
use otelcol_core::{Component, ComponentId, Host};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Lifecycle state of a [`PluginReceiver`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    Created,
    Starting,
    Running,
    ShuttingDown,
    Stopped,
    Failed,
}

impl std::fmt::Display for ReceiverState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReceiverState::Created => write!(f, "created"),
            ReceiverState::Starting => write!(f, "starting"),
            ReceiverState::Running => write!(f, "running"),
            ReceiverState::ShuttingDown => write!(f, "shutting_down"),
            ReceiverState::Stopped => write!(f, "stopped"),
            ReceiverState::Failed => write!(f, "failed"),
        }
    }
}

/// Runs a rendered plugin as a nested collector
pub struct PluginReceiver {
    id: ComponentId,
    config: PluginReceiverConfig,
    emitter: Arc<EmitterFactory>,
    service_factory: ServiceFactory,
    state: Arc<RwLock<ReceiverState>>,
    running: Mutex<Option<RunningService>>,
}

impl PluginReceiver {
    pub fn new(id: ComponentId, config: PluginReceiverConfig, emitter: EmitterFactory) -> Self {
        Self {
            id,
            config,
            emitter: Arc::new(emitter),
            service_factory: default_service_factory(),
            state: Arc::new(RwLock::new(ReceiverState::Created)),
            running: Mutex::new(None),
        }
    }

    /// Replace the factory the nested service is built with
    pub fn with_service_factory(mut self, service_factory: ServiceFactory) -> Self {
        self.service_factory = service_factory;
        self
    }

    pub fn id(&self) -> &ComponentId {
        &self.id
    }

    pub fn config(&self) -> &PluginReceiverConfig {
        &self.config
    }

    pub fn state(&self) -> ReceiverState {
        *self.state.read()
    }

    fn set_state(&self, state: ReceiverState) {
        *self.state.write() = state;
    }

    /// Move from Starting to Running; false if the start was overtaken
    fn mark_running(&self) -> bool {
        let mut state = self.state.write();
        if *state != ReceiverState::Starting {
            return false;
        }
        *state = ReceiverState::Running;
        true
    }

    /// Load, render and start the plugin against `host`
    pub async fn start_plugin(&self, host: Arc<dyn Host>) -> PluginResult<()> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(PluginError::AlreadyRunning {
                id: self.id.to_string(),
            });
        }

        self.set_state(ReceiverState::Starting);
        match self.start_inner(host.as_ref()).await {
            Ok(service) => {
                if self.mark_running() {
                    *running = Some(service);
                    return Ok(());
                }
                // the run task failed between the last poll and now
                let e = match service.stop(self.config.shutdown_timeout).await {
                    Ok(()) => PluginError::ServiceExited,
                    Err(e) => e,
                }
                .in_stage(Stage::StartService);
                self.set_state(ReceiverState::Failed);
                error!(receiver = %self.id, error = %e, "Plugin receiver failed to start");
                Err(e)
            }
            Err(e) => {
                self.set_state(ReceiverState::Failed);
                error!(receiver = %self.id, error = %e, "Plugin receiver failed to start");
                Err(e)
            }
        }
    }

    async fn start_inner(&self, host: &dyn Host) -> PluginResult<RunningService> {
        let plugin = Plugin::load(&self.config.path).map_err(|e| e.in_stage(Stage::Load))?;
        info!(
            plugin = %plugin.title,
            plugin_version = %plugin.version,
            receiver = %self.id,
            "Starting plugin receiver"
        );

        plugin
            .check_parameters(&self.config.parameters)
            .map_err(|e| e.in_stage(Stage::Validate))?;
        let rendered = plugin
            .render(&self.config.parameters, &self.id)
            .map_err(|e| e.in_stage(Stage::Render))?;
        let factories = resolve_factories(host, &rendered, self.emitter.clone())
            .map_err(|e| e.in_stage(Stage::ResolveFactories))?;

        let provider = RenderedConfigProvider::new(&rendered)
            .and_then(|provider| provider.unmarshal(&factories).map(|_| provider))
            .map_err(|e| e.in_stage(Stage::ConfigProvider))?;
        let service = (self.service_factory)(factories, Arc::new(provider))
            .map_err(|e| e.in_stage(Stage::CreateService))?;

        let state = self.state.clone();
        let id = self.id.clone();
        let running = start_service(
            service,
            self.config.poll_interval,
            self.config.start_timeout,
            move |result| record_exit(&state, &id, result),
        )
        .await
        .map_err(|e| e.in_stage(Stage::StartService))?;

        info!(
            plugin = %plugin.title,
            plugin_version = %plugin.version,
            receiver = %self.id,
            "Plugin receiver is running"
        );
        Ok(running)
    }

    /// Stop the nested service, if one is running
    pub async fn shutdown_plugin(&self) -> PluginResult<()> {
        let Some(service) = self.running.lock().await.take() else {
            return Ok(());
        };

        self.set_state(ReceiverState::ShuttingDown);
        info!(receiver = %self.id, "Shutting down plugin receiver");
        match service.stop(self.config.shutdown_timeout).await {
            Ok(()) => {
                self.set_state(ReceiverState::Stopped);
                info!(receiver = %self.id, "Plugin receiver stopped");
                Ok(())
            }
            Err(e) => {
                self.set_state(ReceiverState::Failed);
                warn!(receiver = %self.id, error = %e, "Plugin receiver did not shut down cleanly");
                Err(e.in_stage(Stage::Shutdown))
            }
        }
    }
}

/// Fail a receiver whose nested service errors while starting or running
fn record_exit(
    state: &RwLock<ReceiverState>,
    id: &ComponentId,
    result: &otelcol_core::Result<()>,
) {
    let Err(e) = result else {
        return;
    };
    let mut state = state.write();
    if matches!(*state, ReceiverState::Starting | ReceiverState::Running) {
        *state = ReceiverState::Failed;
        error!(receiver = %id, error = %e, "Internal service stopped unexpectedly");
    }
}

#[async_trait]
impl Component for PluginReceiver {
    async fn start(&self, host: Arc<dyn Host>) -> otelcol_core::Result<()> {
        self.start_plugin(host)
            .await
            .map_err(|e| e.into_component_error(&self.id))
    }

    async fn shutdown(&self) -> otelcol_core::Result<()> {
        self.shutdown_plugin()
            .await
            .map_err(|e| e.into_component_error(&self.id))
    }
}
