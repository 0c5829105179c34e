//! Plugin receiver tests: plugin file → render → nested service → outer pipeline
//!
//! Run with: cargo test -p otelcol-pluginreceiver --test plugin_receiver

use async_trait::async_trait;
use otelcol_core::pdata::log_bodies;
use otelcol_core::testing::{
    CaptureExporterFactory, CapturingConsumer, GeneratorReceiverFactory, MockHost,
    NopReceiverFactory,
};
use otelcol_core::{
    ConfigProvider, Factories, Host, Kind, MetricsLevel, Service, ServiceSettings, State,
    YamlConfigProvider,
};
use otelcol_pluginreceiver::{
    EmitterFactory, NestedService, Parameter, ParameterMap, ParameterType, Plugin, PluginError,
    PluginReceiver, PluginReceiverConfig, PluginReceiverFactory, PluginResult, ReceiverState,
    Stage, EMITTER_TYPE,
};
use parking_lot::Mutex;
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{sleep, timeout};

const GENERATOR_PLUGIN: &str = r#"
title: generator
version: 0.0.1
description: Emit a fixed batch of log records
parameters:
  - name: count
    type: int
    default: 1
  - name: body
    type: string
    default: hello
template: |
  receivers:
    generator:
      count: {{ .count }}
      body: {{ .body }}
  exporters:
    otlp:
      endpoint: elsewhere:4317
  service:
    pipelines:
      logs:
        receivers: [generator]
        exporters: [otlp]
"#;

const GHOST_PLUGIN: &str = r#"
title: ghost
template: |
  receivers:
    ghost:
  service:
    pipelines:
      logs:
        receivers: [ghost]
"#;

fn write_plugin(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn receiver_config(path: &Path) -> PluginReceiverConfig {
    PluginReceiverConfig {
        path: path.display().to_string(),
        poll_interval: Duration::from_millis(5),
        ..Default::default()
    }
}

fn values(yaml: &str) -> ParameterMap {
    serde_yaml::from_str(yaml).unwrap()
}

// ============================================================================
// Plugin definitions
// ============================================================================

#[test]
fn test_type_checked_before_required() {
    let plugin = Plugin::from_yaml(
        "title: t\nparameters:\n  - name: a\n    type: string\n    required: true",
    )
    .unwrap();
    let err = plugin.check_parameters(&values("a: 5")).unwrap_err();
    assert!(matches!(err, PluginError::TypeMismatch { ref name, .. } if name == "a"));
}

#[test]
fn test_supplied_value_beats_default() {
    let plugin = Plugin::from_yaml("parameters:\n  - name: x\n    default: d").unwrap();
    assert_eq!(plugin.apply_defaults(&values("x: s")), values("x: s"));
    assert_eq!(plugin.apply_defaults(&ParameterMap::new()), values("x: d"));
}

#[test]
fn test_save_then_load() {
    let dir = tempfile::tempdir().unwrap();
    let plugin = Plugin {
        title: "Simple Log File".to_string(),
        template: "receivers:\n  filelog:\n".to_string(),
        version: "0.0.1".to_string(),
        description: "Read logs".to_string(),
        parameters: vec![
            Parameter {
                name: "file_path".to_string(),
                parameter_type: Some(ParameterType::StringArray),
                required: true,
                ..Default::default()
            },
            Parameter {
                name: "start_at".to_string(),
                parameter_type: Some(ParameterType::String),
                default: Some(Value::from("end")),
                supported: vec![Value::from("beginning"), Value::from("end")],
                required: false,
            },
            Parameter {
                name: "timezone".to_string(),
                parameter_type: Some(ParameterType::Timezone),
                default: Some(Value::from("UTC")),
                ..Default::default()
            },
        ],
    };

    let path = dir.path().join("plugin.yaml");
    plugin.save(&path).unwrap();
    assert_eq!(Plugin::load(&path).unwrap(), plugin);
}

#[test]
fn test_conditional_template_renders_nop() {
    let plugin = Plugin {
        template: "{{if .enabled}}receivers:\n  nop:{{end}}".to_string(),
        parameters: vec![Parameter {
            name: "enabled".to_string(),
            default: Some(Value::Bool(true)),
            ..Default::default()
        }],
        ..Default::default()
    };
    let id = "plugin".parse().unwrap();

    let rendered = plugin.render(&ParameterMap::new(), &id).unwrap();
    assert!(rendered.receivers.contains_key("nop"));
    assert_eq!(rendered.exporters.len(), 1);
    assert!(rendered.exporters.contains_key(EMITTER_TYPE));
    assert_eq!(rendered.service.telemetry.metrics.level, MetricsLevel::None);

    let rendered = plugin.render(&values("enabled: false"), &id).unwrap();
    assert!(rendered.receivers.is_empty());
    assert_eq!(rendered.exporters.len(), 1);
}

#[test]
fn test_rendered_pipelines_export_to_emitter() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_plugin(dir.path(), "generator.yaml", GENERATOR_PLUGIN);
    let plugin = Plugin::load(path).unwrap();

    let rendered = plugin
        .render(&values("count: 2"), &"plugin/gen".parse().unwrap())
        .unwrap();
    assert!(!rendered.exporters.contains_key("otlp"));
    assert_eq!(
        rendered.service.pipelines["logs"].exporters,
        vec![EMITTER_TYPE.to_string()]
    );
    assert_eq!(
        rendered.receivers["generator"].get("count").and_then(Value::as_u64),
        Some(2)
    );
}

// ============================================================================
// Receiver lifecycle
// ============================================================================

#[tokio::test]
async fn test_shutdown_after_failed_resolve() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_plugin(dir.path(), "ghost.yaml", GHOST_PLUGIN);
    let receiver = PluginReceiver::new(
        "plugin/ghost".parse().unwrap(),
        receiver_config(&path),
        EmitterFactory::for_logs(Arc::new(CapturingConsumer::new())),
    );
    let host: Arc<dyn Host> = Arc::new(MockHost::new(
        Factories::new().with_receiver(Arc::new(NopReceiverFactory)),
    ));

    let err = receiver.start_plugin(host).await.unwrap_err();
    assert_eq!(err.stage(), Some(Stage::ResolveFactories));
    assert!(matches!(
        err.root(),
        PluginError::MissingFactory { kind: Kind::Receiver, component_type } if component_type == "ghost"
    ));
    assert_eq!(
        err.to_string(),
        "failed to get factories from factory provider: receiver factory ghost is missing from host"
    );
    assert_eq!(receiver.state(), ReceiverState::Failed);

    receiver.shutdown_plugin().await.unwrap();
}

#[tokio::test]
async fn test_invalid_parameter_names_stage() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_plugin(dir.path(), "generator.yaml", GENERATOR_PLUGIN);
    let config = PluginReceiverConfig {
        parameters: values("color: blue"),
        ..receiver_config(&path)
    };
    let receiver = PluginReceiver::new(
        "plugin".parse().unwrap(),
        config,
        EmitterFactory::for_logs(Arc::new(CapturingConsumer::new())),
    );

    let err = receiver
        .start_plugin(Arc::new(Factories::new()))
        .await
        .unwrap_err();
    assert!(err.is_parameter_error());
    assert_eq!(
        err.to_string(),
        "invalid plugin parameter: definition failure: parameter color is not defined in plugin"
    );
}

#[tokio::test]
async fn test_logs_relayed_to_outer_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_plugin(dir.path(), "generator.yaml", GENERATOR_PLUGIN);
    let outer = format!(
        r#"
receivers:
  plugin/gen:
    path: {}
    parameters:
      count: 3
      body: relayed
    poll_interval: 5ms
exporters:
  capture:
service:
  pipelines:
    logs:
      receivers: [plugin/gen]
      exporters: [capture]
"#,
        path.display()
    );

    let capture = Arc::new(CaptureExporterFactory::new());
    let sink = capture.sink();
    let factories = Factories::new()
        .with_receiver(Arc::new(PluginReceiverFactory::new()))
        .with_receiver(Arc::new(GeneratorReceiverFactory))
        .with_exporter(capture);
    let service = Arc::new(Service::new(ServiceSettings {
        factories,
        config_provider: Arc::new(YamlConfigProvider::from_yaml(&outer).unwrap()),
        telemetry_enabled: false,
    }));

    let task = tokio::spawn({
        let service = service.clone();
        async move { service.run().await }
    });

    assert!(sink.wait_for_log_records(3, Duration::from_secs(5)).await);
    let bodies: Vec<String> = sink.logs().iter().flat_map(log_bodies).collect();
    assert_eq!(bodies, vec!["relayed"; 3]);

    timeout(Duration::from_secs(5), async {
        while service.state() != State::Running {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    service.shutdown();
    task.await.unwrap().unwrap();
    assert_eq!(service.state(), State::Closed);
}

/// Never reaches running until told to stop
#[derive(Default)]
struct Stuck {
    state: Mutex<Option<State>>,
    stop: Notify,
}

#[async_trait]
impl NestedService for Stuck {
    async fn run(&self) -> otelcol_core::Result<()> {
        self.stop.notified().await;
        *self.state.lock() = Some(State::Closed);
        Ok(())
    }

    fn shutdown(&self) {
        self.stop.notify_one();
    }

    fn state(&self) -> State {
        self.state.lock().unwrap_or(State::Starting)
    }
}

#[tokio::test]
async fn test_start_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_plugin(
        dir.path(),
        "nop.yaml",
        "template: |\n  receivers:\n    nop:\n  service:\n    pipelines:\n      logs:\n        receivers: [nop]\n",
    );
    let config = PluginReceiverConfig {
        start_timeout: Duration::from_millis(200),
        ..receiver_config(&path)
    };

    let stuck = Arc::new(Stuck::default());
    let receiver = PluginReceiver::new(
        "plugin/stuck".parse().unwrap(),
        config,
        EmitterFactory::for_logs(Arc::new(CapturingConsumer::new())),
    )
    .with_service_factory({
        let stuck = stuck.clone();
        Arc::new(
            move |_: Factories, _: Arc<dyn ConfigProvider>| -> PluginResult<Arc<dyn NestedService>> {
                Ok(stuck.clone())
            },
        )
    });
    let host: Arc<dyn Host> = Arc::new(Factories::new().with_receiver(Arc::new(NopReceiverFactory)));

    let started = tokio::time::Instant::now();
    let err = receiver.start_plugin(host).await.unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(err.stage(), Some(Stage::StartService));
    assert!(matches!(err.root(), PluginError::StartTimeout { .. }));
    assert!(err.is_retryable());
    assert_eq!(receiver.state(), ReceiverState::Failed);

    // the abandoned service was told to stop
    timeout(Duration::from_secs(5), async {
        while stuck.state() != State::Closed {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    receiver.shutdown_plugin().await.unwrap();
}
