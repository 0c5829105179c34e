//! Telemetry payloads passed between components
//!
//! Payloads are the OTLP export requests, so data can be handed to or
//! received from OTLP endpoints without conversion.

pub use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest as Logs;
pub use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest as Metrics;
pub use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest as Traces;

use opentelemetry_proto::tonic::common::v1::{any_value, AnyValue};
use opentelemetry_proto::tonic::logs::v1::{LogRecord, ResourceLogs, ScopeLogs};

/// Number of log records in a payload
pub fn log_record_count(logs: &Logs) -> usize {
    logs.resource_logs
        .iter()
        .flat_map(|rl| rl.scope_logs.iter())
        .map(|sl| sl.log_records.len())
        .sum()
}

/// Number of metrics in a payload
pub fn metric_count(metrics: &Metrics) -> usize {
    metrics
        .resource_metrics
        .iter()
        .flat_map(|rm| rm.scope_metrics.iter())
        .map(|sm| sm.metrics.len())
        .sum()
}

/// Number of spans in a payload
pub fn span_count(traces: &Traces) -> usize {
    traces
        .resource_spans
        .iter()
        .flat_map(|rs| rs.scope_spans.iter())
        .map(|ss| ss.spans.len())
        .sum()
}

/// Build a logs payload with one string-bodied record per entry
pub fn logs_from_bodies<I, S>(bodies: I) -> Logs
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let log_records = bodies
        .into_iter()
        .map(|body| LogRecord {
            body: Some(AnyValue {
                value: Some(any_value::Value::StringValue(body.into())),
            }),
            ..Default::default()
        })
        .collect();

    Logs {
        resource_logs: vec![ResourceLogs {
            scope_logs: vec![ScopeLogs {
                log_records,
                ..Default::default()
            }],
            ..Default::default()
        }],
    }
}

/// String bodies of every log record in a payload, in order
pub fn log_bodies(logs: &Logs) -> Vec<String> {
    logs.resource_logs
        .iter()
        .flat_map(|rl| rl.scope_logs.iter())
        .flat_map(|sl| sl.log_records.iter())
        .filter_map(|record| match record.body.as_ref()?.value.as_ref()? {
            any_value::Value::StringValue(s) => Some(s.clone()),
            _ => None,
        })
        .collect()
}
