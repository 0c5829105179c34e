//! Service lifecycle tests: provider → graph → running → closed
//!
//! Run with: cargo test -p otelcol-core --test service_lifecycle

use otelcol_core::pdata::log_bodies;
use otelcol_core::testing::{
    CaptureExporterFactory, FailingReceiverFactory, GeneratorReceiverFactory, NopExtensionFactory,
    NopProcessorFactory,
};
use otelcol_core::{Factories, Service, ServiceSettings, State, YamlConfigProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

const PIPELINE: &str = r#"
receivers:
  generator:
    count: 2
    body: hello
processors:
  nop:
exporters:
  capture:
extensions:
  nop:
service:
  extensions: [nop]
  pipelines:
    logs:
      receivers: [generator]
      processors: [nop]
      exporters: [capture]
"#;

fn factories(capture: Arc<CaptureExporterFactory>) -> Factories {
    Factories::new()
        .with_receiver(Arc::new(GeneratorReceiverFactory))
        .with_receiver(Arc::new(FailingReceiverFactory))
        .with_processor(Arc::new(NopProcessorFactory))
        .with_exporter(capture)
        .with_extension(Arc::new(NopExtensionFactory))
}

fn service(yaml: &str, capture: Arc<CaptureExporterFactory>) -> Arc<Service> {
    Arc::new(Service::new(ServiceSettings {
        factories: factories(capture),
        config_provider: Arc::new(YamlConfigProvider::from_yaml(yaml).unwrap()),
        telemetry_enabled: true,
    }))
}

async fn wait_for_state(service: &Service, state: State) {
    timeout(Duration::from_secs(5), async {
        while service.state() != state {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("service never reached {}", state));
}

#[tokio::test]
async fn test_generator_reaches_capture_exporter() {
    let capture = Arc::new(CaptureExporterFactory::new());
    let service = service(PIPELINE, capture.clone());

    let task = tokio::spawn({
        let service = service.clone();
        async move { service.run().await }
    });

    wait_for_state(&service, State::Running).await;
    assert!(
        capture
            .sink()
            .wait_for_log_records(2, Duration::from_secs(5))
            .await
    );
    assert_eq!(log_bodies(&capture.sink().logs()[0]), vec!["hello", "hello"]);

    service.shutdown();
    task.await.unwrap().unwrap();
    assert_eq!(service.state(), State::Closed);
}

#[tokio::test]
async fn test_states_move_through_running_to_closed() {
    let capture = Arc::new(CaptureExporterFactory::new());
    let service = service(PIPELINE, capture);
    assert_eq!(service.state(), State::Starting);

    let task = tokio::spawn({
        let service = service.clone();
        async move { service.run().await }
    });

    wait_for_state(&service, State::Running).await;
    service.shutdown();
    task.await.unwrap().unwrap();
    assert_eq!(service.state(), State::Closed);
}

#[tokio::test]
async fn test_shutdown_before_run_ends_cleanly() {
    let capture = Arc::new(CaptureExporterFactory::new());
    let service = service(PIPELINE, capture.clone());

    service.shutdown();
    timeout(Duration::from_secs(5), service.run())
        .await
        .expect("run should return after startup")
        .unwrap();

    assert_eq!(service.state(), State::Closed);
    // startup still happened
    assert_eq!(capture.sink().log_record_count(), 2);
}

#[tokio::test]
async fn test_invalid_config_fails_run() {
    let yaml = r#"
receivers:
  generator:
exporters:
  capture:
service:
  pipelines:
    logs:
      receivers: [generator]
"#;
    let service = service(yaml, Arc::new(CaptureExporterFactory::new()));

    let err = service.run().await.unwrap_err();
    assert!(err.is_config());
    assert_eq!(service.state(), State::Failed);
}

#[tokio::test]
async fn test_component_start_failure_fails_run() {
    let yaml = r#"
receivers:
  failing:
exporters:
  capture:
service:
  pipelines:
    logs:
      receivers: [failing]
      exporters: [capture]
"#;
    let service = service(yaml, Arc::new(CaptureExporterFactory::new()));

    let err = service.run().await.unwrap_err();
    assert!(err.to_string().contains("failing"));
    assert_eq!(service.state(), State::Failed);
}
