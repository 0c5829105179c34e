//! The collector service
//!
//! A [`Service`] fetches its configuration from a provider, builds the
//! pipeline graph and runs it until [`Service::shutdown`] is called or the
//! provider reports a configuration error.
//!
//! ```text
//!  Starting ──► Running ──► Closing ──► Closed
//!      │                       │
//!      └──────► Failed ◄───────┘
//! ```
//!
//! The service never installs OS signal handlers, so it can run embedded in
//! another process.

use crate::component::Host;
use crate::error::{Error, Result};
use crate::factory::Factories;
use crate::graph::Graph;
use crate::provider::ConfigProvider;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info};

/// Lifecycle state of a service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Starting,
    Running,
    Closing,
    Closed,
    Failed,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Starting => write!(f, "starting"),
            State::Running => write!(f, "running"),
            State::Closing => write!(f, "closing"),
            State::Closed => write!(f, "closed"),
            State::Failed => write!(f, "failed"),
        }
    }
}

/// Everything a service is built from
pub struct ServiceSettings {
    /// Factories available to the configuration
    pub factories: Factories,
    /// Where the configuration comes from
    pub config_provider: Arc<dyn ConfigProvider>,
    /// Count pipeline items and log the totals at shutdown
    pub telemetry_enabled: bool,
}

/// A runnable collector
pub struct Service {
    factories: Factories,
    config_provider: Arc<dyn ConfigProvider>,
    telemetry_enabled: bool,
    state: RwLock<State>,
    shutdown_tx: watch::Sender<bool>,
}

impl Service {
    /// Create a service; nothing happens until [`run`](Self::run)
    pub fn new(settings: ServiceSettings) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            factories: settings.factories,
            config_provider: settings.config_provider,
            telemetry_enabled: settings.telemetry_enabled,
            state: RwLock::new(State::Starting),
            shutdown_tx,
        }
    }

    /// Current state, safe to call from any task at any time
    pub fn state(&self) -> State {
        *self.state.read()
    }

    fn set_state(&self, state: State) {
        *self.state.write() = state;
        debug!(state = %state, "Service state changed");
    }

    /// Ask a running service to stop
    ///
    /// Calling this before [`run`](Self::run) makes `run` stop right after
    /// startup.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Run the service until it is shut down
    ///
    /// Returns once every component has been shut down. The final state is
    /// `Closed` on success and `Failed` otherwise.
    pub async fn run(&self) -> Result<()> {
        self.set_state(State::Starting);
        match self.run_inner().await {
            Ok(()) => {
                self.set_state(State::Closed);
                info!("Service stopped");
                Ok(())
            }
            Err(e) => {
                self.set_state(State::Failed);
                error!(error = %e, "Service failed");
                Err(e)
            }
        }
    }

    async fn run_inner(&self) -> Result<()> {
        let mut config_errors = self.config_provider.watch();
        let config = self.config_provider.get(&self.factories).await?;
        let graph = Graph::build(&config, &self.factories, self.telemetry_enabled)?;

        let host: Arc<dyn Host> = Arc::new(self.factories.clone());
        if let Err(e) = graph.start(host).await {
            // components that never started tolerate shutdown
            let _ = graph.shutdown().await;
            let _ = self.config_provider.shutdown().await;
            return Err(e);
        }

        self.set_state(State::Running);
        info!(
            pipelines = config.service.pipelines.len(),
            "Service is running"
        );

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut watching = true;
        let outcome = loop {
            tokio::select! {
                _ = stop_requested(&mut shutdown_rx) => break Ok(()),
                received = config_errors.recv(), if watching => match received {
                    Ok(err) => break Err(Error::service(format!("configuration error: {}", err))),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => watching = false,
                },
            };
        };

        self.set_state(State::Closing);
        info!("Service is shutting down");
        let graph_result = graph.shutdown().await;
        let provider_result = self.config_provider.shutdown().await;
        outcome.and(graph_result).and(provider_result)
    }
}

async fn stop_requested(rx: &mut watch::Receiver<bool>) {
    // the sender lives as long as the service, so an error cannot happen here
    let _ = rx.wait_for(|stop| *stop).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::YamlConfigProvider;
    use crate::testing::{CaptureExporterFactory, GeneratorReceiverFactory};
    use std::time::Duration;

    const CONFIG: &str = r#"
receivers:
  generator:
exporters:
  capture:
service:
  pipelines:
    logs:
      receivers: [generator]
      exporters: [capture]
"#;

    fn service(provider: Arc<YamlConfigProvider>) -> Arc<Service> {
        let factories = Factories::new()
            .with_receiver(Arc::new(GeneratorReceiverFactory))
            .with_exporter(Arc::new(CaptureExporterFactory::new()));
        Arc::new(Service::new(ServiceSettings {
            factories,
            config_provider: provider,
            telemetry_enabled: false,
        }))
    }

    #[tokio::test]
    async fn test_watch_error_stops_service() {
        let provider = Arc::new(YamlConfigProvider::from_yaml(CONFIG).unwrap());
        let service = service(provider.clone());

        let task = tokio::spawn({
            let service = service.clone();
            async move { service.run().await }
        });

        while service.state() != State::Running {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        provider.report_error(Error::config("reloaded"));

        let err = task.await.unwrap().unwrap_err();
        assert!(err.to_string().contains("reloaded"));
        assert_eq!(service.state(), State::Failed);
    }

    #[test]
    fn test_initial_state() {
        let provider = Arc::new(YamlConfigProvider::from_yaml(CONFIG).unwrap());
        assert_eq!(service(provider).state(), State::Starting);
    }
}
