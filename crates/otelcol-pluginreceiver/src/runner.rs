//! Nested service runner
//!
//! ```text
//!  start_service ──► spawn run() ──► poll state() every poll_interval
//!                                      │
//!        Running ◄─────────────────────┤
//!        task ended ──► error ◄────────┤
//!        start_timeout ──► shutdown() + StartTimeout
//! ```
//!
//! `run()` blocks for the lifetime of the nested service, so it lives on its
//! own task and startup is observed by polling.

use crate::error::{PluginError, PluginResult};
use async_trait::async_trait;
use otelcol_core::{ConfigProvider, Factories, Service, ServiceSettings, State};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, warn};

/// Smallest accepted readiness poll interval
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// A collector service run inside a plugin receiver
#[async_trait]
pub trait NestedService: Send + Sync {
    /// Run until shut down
    async fn run(&self) -> otelcol_core::Result<()>;

    /// Ask the service to stop; must not block
    fn shutdown(&self);

    fn state(&self) -> State;
}

#[async_trait]
impl NestedService for Service {
    async fn run(&self) -> otelcol_core::Result<()> {
        Service::run(self).await
    }

    fn shutdown(&self) {
        Service::shutdown(self)
    }

    fn state(&self) -> State {
        Service::state(self)
    }
}

/// Builds the nested service from resolved factories and a config provider
pub type ServiceFactory = Arc<
    dyn Fn(Factories, Arc<dyn ConfigProvider>) -> PluginResult<Arc<dyn NestedService>>
        + Send
        + Sync,
>;

/// Service factory building an [`otelcol_core::Service`] without telemetry
pub fn default_service_factory() -> ServiceFactory {
    Arc::new(|factories: Factories, config_provider: Arc<dyn ConfigProvider>| {
        let service = Service::new(ServiceSettings {
            factories,
            config_provider,
            telemetry_enabled: false,
        });
        let service: Arc<dyn NestedService> = Arc::new(service);
        PluginResult::Ok(service)
    })
}

/// A nested service whose run task is live
pub struct RunningService {
    service: Arc<dyn NestedService>,
    task: JoinHandle<otelcol_core::Result<()>>,
}

impl std::fmt::Debug for RunningService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningService")
            .field("state", &self.service.state())
            .field("finished", &self.task.is_finished())
            .finish()
    }
}

impl RunningService {
    pub fn state(&self) -> State {
        self.service.state()
    }

    /// Check if the run task has ended
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Shut the service down and wait up to `timeout` for the run task
    ///
    /// On timeout the task is left to finish on its own.
    pub async fn stop(self, timeout: Duration) -> PluginResult<()> {
        self.service.shutdown();
        match time::timeout(timeout, self.task).await {
            Ok(Ok(result)) => result.map_err(PluginError::NestedService),
            Ok(Err(join_error)) => Err(PluginError::NestedService(otelcol_core::Error::service(
                format!("run task failed: {}", join_error),
            ))),
            Err(_) => {
                warn!(timeout = ?timeout, "Internal service did not stop in time");
                Err(PluginError::ShutdownTimeout { timeout })
            }
        }
    }
}

fn exit_error(joined: Result<otelcol_core::Result<()>, tokio::task::JoinError>) -> PluginError {
    match joined {
        Ok(Ok(())) => PluginError::ServiceExited,
        Ok(Err(e)) => PluginError::NestedService(e),
        Err(join_error) => PluginError::NestedService(otelcol_core::Error::service(format!(
            "run task failed: {}",
            join_error
        ))),
    }
}

/// Run `service` and wait until it reports [`State::Running`]
///
/// `on_exit` is called with the outcome when the run task ends, whether
/// during startup or long after.
pub async fn start_service<F>(
    service: Arc<dyn NestedService>,
    poll_interval: Duration,
    start_timeout: Duration,
    on_exit: F,
) -> PluginResult<RunningService>
where
    F: FnOnce(&otelcol_core::Result<()>) + Send + 'static,
{
    let mut task = tokio::spawn({
        let service = service.clone();
        async move {
            let result = service.run().await;
            if let Err(e) = &result {
                error!(error = %e, "Internal service failed");
            }
            on_exit(&result);
            result
        }
    });

    let deadline = Instant::now() + start_timeout;
    let mut ticker = time::interval(poll_interval.max(MIN_POLL_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            joined = &mut task => return Err(exit_error(joined)),
            _ = time::sleep_until(deadline) => {
                service.shutdown();
                return Err(PluginError::StartTimeout { timeout: start_timeout });
            }
            _ = ticker.tick() => {
                let state = service.state();
                debug!(state = %state, "Polled internal service");
                if state == State::Running {
                    break;
                }
            }
        }
    }

    Ok(RunningService { service, task })
}
