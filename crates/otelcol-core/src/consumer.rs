//! Consumers receive telemetry from the previous stage of a pipeline
//!
//! A single trait covers all three signals. Implementations override the
//! operations for the signals they accept; the others reject the data with
//! [`Error::SignalNotSupported`].

use crate::component::DataType;
use crate::error::{Error, Result};
use crate::pdata::{Logs, Metrics, Traces};
use async_trait::async_trait;
use std::sync::Arc;

/// What a consumer does to the data handed to it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// The consumer modifies the payload in place
    pub mutates_data: bool,
}

/// Receiver of telemetry payloads
#[async_trait]
pub trait Consumer: Send + Sync {
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    async fn consume_logs(&self, _logs: Logs) -> Result<()> {
        Err(Error::SignalNotSupported(DataType::Logs))
    }

    async fn consume_metrics(&self, _metrics: Metrics) -> Result<()> {
        Err(Error::SignalNotSupported(DataType::Metrics))
    }

    async fn consume_traces(&self, _traces: Traces) -> Result<()> {
        Err(Error::SignalNotSupported(DataType::Traces))
    }
}

/// Shared handle to a consumer
pub type SharedConsumer = Arc<dyn Consumer>;

/// Forwards to a shared value implementing [`Consumer`]
///
/// Used to hand a processor or exporter trait object to the stage in front
/// of it as a plain [`SharedConsumer`].
pub struct Forward<T: ?Sized>(pub Arc<T>);

#[async_trait]
impl<T> Consumer for Forward<T>
where
    T: Consumer + ?Sized,
{
    fn capabilities(&self) -> Capabilities {
        self.0.capabilities()
    }

    async fn consume_logs(&self, logs: Logs) -> Result<()> {
        self.0.consume_logs(logs).await
    }

    async fn consume_metrics(&self, metrics: Metrics) -> Result<()> {
        self.0.consume_metrics(metrics).await
    }

    async fn consume_traces(&self, traces: Traces) -> Result<()> {
        self.0.consume_traces(traces).await
    }
}

/// Sends every payload to all of its consumers
///
/// Consumers are called in order. All but the last receive a clone, so a
/// mutating consumer never affects its siblings. Every consumer is called
/// even if an earlier one fails; the first error is returned.
pub struct Fanout {
    consumers: Vec<SharedConsumer>,
}

impl Fanout {
    /// Build a consumer that fans out to `consumers`
    ///
    /// A single consumer is returned as-is.
    pub fn build(mut consumers: Vec<SharedConsumer>) -> SharedConsumer {
        if consumers.len() == 1 {
            return consumers.remove(0);
        }
        Arc::new(Self { consumers })
    }
}

macro_rules! fan_out {
    ($self:ident, $data:ident, $method:ident) => {{
        let mut first_err = None;
        let last = $self.consumers.len().saturating_sub(1);
        for (i, consumer) in $self.consumers.iter().enumerate() {
            let payload = if i == last {
                std::mem::take(&mut $data)
            } else {
                $data.clone()
            };
            if let Err(e) = consumer.$method(payload).await {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }};
}

#[async_trait]
impl Consumer for Fanout {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            mutates_data: self.consumers.iter().any(|c| c.capabilities().mutates_data),
        }
    }

    async fn consume_logs(&self, mut logs: Logs) -> Result<()> {
        fan_out!(self, logs, consume_logs)
    }

    async fn consume_metrics(&self, mut metrics: Metrics) -> Result<()> {
        fan_out!(self, metrics, consume_metrics)
    }

    async fn consume_traces(&self, mut traces: Traces) -> Result<()> {
        fan_out!(self, traces, consume_traces)
    }
}
