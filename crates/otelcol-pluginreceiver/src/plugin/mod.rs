//! Plugin definitions
//!
//! A plugin is a YAML file holding a templated collector config and the
//! parameters the template accepts:
//!
//! ```yaml
//! title: Simple Log File
//! version: 0.0.1
//! description: Read logs from files
//! parameters:
//!   - name: file_path
//!     type: "[]string"
//!     required: true
//!   - name: start_at
//!     type: string
//!     default: end
//!     supported: [beginning, end]
//! template: |
//!   receivers:
//!     filelog:
//!       include:
//!       {{- range .file_path }}
//!         - {{ . }}
//!       {{- end }}
//!       start_at: {{ .start_at }}
//!   service:
//!     pipelines:
//!       logs:
//!         receivers: [filelog]
//! ```
//!
//! Parameter checks run by category: every supplied key must be defined,
//! then every required parameter must be supplied, then types, then
//! allow-lists. The first failing category is reported.

mod parameter;

pub use parameter::{Parameter, ParameterMap, ParameterType};

use crate::error::{PluginError, PluginResult};
use crate::rendered::RenderedConfig;
use crate::storage;
use crate::template::{GoTemplateEngine, TemplateEngine};
use otelcol_core::ComponentId;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::path::Path;
use tracing::debug;

/// A templated pipeline of receivers and processors
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plugin {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub template: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
}

impl Plugin {
    /// Load a plugin from a file
    pub fn load(path: impl AsRef<Path>) -> PluginResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| PluginError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&contents)
    }

    /// Parse a plugin from YAML
    pub fn from_yaml(yaml: &str) -> PluginResult<Self> {
        serde_yaml::from_str(yaml).map_err(PluginError::Parse)
    }

    /// Serialize the plugin in the same shape [`load`](Self::load) reads
    pub fn to_yaml(&self) -> PluginResult<String> {
        serde_yaml::to_string(self).map_err(PluginError::Marshal)
    }

    /// Write the plugin to a file
    pub fn save(&self, path: impl AsRef<Path>) -> PluginResult<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_yaml()?).map_err(|source| PluginError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Check supplied values against the declared parameters
    pub fn check_parameters(&self, values: &ParameterMap) -> PluginResult<()> {
        for name in values.keys() {
            if self.parameter(name).is_none() {
                return Err(PluginError::UndefinedParameter { name: name.clone() });
            }
        }

        // a default does not satisfy `required`
        for parameter in &self.parameters {
            if parameter.required && !values.contains_key(&parameter.name) {
                return Err(PluginError::MissingRequired {
                    name: parameter.name.clone(),
                });
            }
        }

        for parameter in &self.parameters {
            if let Some(value) = values.get(&parameter.name) {
                parameter.check_type(value)?;
            }
        }

        for parameter in &self.parameters {
            if let Some(value) = values.get(&parameter.name) {
                parameter.check_supported(value)?;
            }
        }

        Ok(())
    }

    /// Merge parameter defaults under the supplied values
    pub fn apply_defaults(&self, values: &ParameterMap) -> ParameterMap {
        let mut result: ParameterMap = self
            .parameters
            .iter()
            .filter_map(|p| p.default.clone().map(|d| (p.name.clone(), d)))
            .collect();
        result.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
        result
    }

    /// Render the template for receiver `id` with the default engine
    pub fn render(&self, values: &ParameterMap, id: &ComponentId) -> PluginResult<RenderedConfig> {
        self.render_with(&GoTemplateEngine, values, id)
    }

    /// Render the template for receiver `id`
    ///
    /// Defaults are merged under `values`, the template is executed and the
    /// output parsed into a [`RenderedConfig`]. `file_storage` extensions get
    /// a directory of their own for `id`.
    pub fn render_with(
        &self,
        engine: &dyn TemplateEngine,
        values: &ParameterMap,
        id: &ComponentId,
    ) -> PluginResult<RenderedConfig> {
        let bindings: Mapping = self
            .apply_defaults(values)
            .into_iter()
            .map(|(k, v)| (Value::String(k), v))
            .collect();

        let text = engine
            .execute(&self.title, &self.template, &Value::Mapping(bindings))
            .map_err(|e| {
                if e.is_syntax() {
                    PluginError::TemplateSyntax(e)
                } else {
                    PluginError::TemplateExecution(e)
                }
            })?;
        debug!(plugin = %self.title, receiver = %id, "Rendered plugin template");

        let mut rendered = RenderedConfig::from_yaml(&text)?;
        storage::scope_file_storage(&mut rendered.extensions, id)?;
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TemplateError;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    fn values(s: &str) -> ParameterMap {
        serde_yaml::from_str(s).unwrap()
    }

    fn plugin(parameters: &str) -> Plugin {
        Plugin {
            title: "test".to_string(),
            parameters: serde_yaml::from_str(parameters).unwrap(),
            ..Default::default()
        }
    }

    fn id() -> ComponentId {
        "plugin/test".parse().unwrap()
    }

    #[test]
    fn test_unserializable_plugin_is_marshal_error() {
        use serde_yaml::value::{Tag, TaggedValue};

        // YAML cannot carry a tag on an already tagged value
        let tagged = |tag: &str, value: Value| {
            Value::Tagged(Box::new(TaggedValue {
                tag: Tag::new(tag),
                value,
            }))
        };
        let plugin = Plugin {
            parameters: vec![Parameter {
                name: "p".to_string(),
                default: Some(tagged("outer", tagged("inner", Value::from("x")))),
                ..Default::default()
            }],
            ..Default::default()
        };

        let err = plugin.to_yaml().unwrap_err();
        assert!(matches!(err, PluginError::Marshal(_)));
        assert!(err.to_string().starts_with("failed to marshal as yaml:"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plugin.yaml");
        assert!(matches!(plugin.save(&path), Err(PluginError::Marshal(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_type_checked_before_supported() {
        let p = plugin("[{name: mode, type: string, supported: [a, b]}]");
        let err = p.check_parameters(&values("mode: 3")).unwrap_err();
        assert!(matches!(err, PluginError::TypeMismatch { .. }));
        let err = p.check_parameters(&values("mode: c")).unwrap_err();
        assert!(matches!(err, PluginError::UnsupportedValue { .. }));
    }

    #[test]
    fn test_undefined_checked_first() {
        let p = plugin("[{name: a, type: string, required: true}]");
        let err = p.check_parameters(&values("b: x")).unwrap_err();
        assert!(matches!(err, PluginError::UndefinedParameter { ref name } if name == "b"));
    }

    #[test]
    fn test_required_with_default_still_required() {
        let p = plugin("[{name: a, type: string, required: true, default: x}]");
        let err = p.check_parameters(&ParameterMap::new()).unwrap_err();
        assert!(matches!(err, PluginError::MissingRequired { ref name } if name == "a"));
    }

    #[test]
    fn test_apply_defaults_keeps_unset_absent() {
        let p = plugin("[{name: a, default: 1}, {name: b}]");
        let merged = p.apply_defaults(&values("c: 3"));
        assert_eq!(merged, values("a: 1\nc: 3"));
    }

    #[test]
    fn test_render_syntax_and_execution_errors() {
        let mut p = plugin("[]");
        p.template = "{{ if }}".to_string();
        let err = p.render(&ParameterMap::new(), &id()).unwrap_err();
        assert!(matches!(err, PluginError::TemplateSyntax(_)));
        assert!(err.to_string().starts_with("failed to create plugin template: template: test:1:"));

        p.template = "{{ .a.b }}".to_string();
        let err = p.render(&values("a: 1"), &id()).unwrap_err();
        assert!(matches!(err, PluginError::TemplateExecution(_)));
        assert!(err.to_string().starts_with("failed to execute template:"));
    }

    #[test]
    fn test_render_malformed_output() {
        let mut p = plugin("[]");
        p.template = "receivers: [unclosed".to_string();
        let err = p.render(&ParameterMap::new(), &id()).unwrap_err();
        assert!(matches!(err, PluginError::ConfigParse(_)));
    }

    #[test]
    fn test_render_with_custom_engine() {
        struct Fixed;
        impl TemplateEngine for Fixed {
            fn execute(&self, _: &str, _: &str, bindings: &Value) -> Result<String, TemplateError> {
                assert_eq!(bindings, &yaml("a: 1"));
                Ok("receivers:\n  nop:".to_string())
            }
        }

        let p = plugin("[{name: a, default: 1}]");
        let rendered = p.render_with(&Fixed, &ParameterMap::new(), &id()).unwrap();
        assert!(rendered.receivers.contains_key("nop"));
    }
}
