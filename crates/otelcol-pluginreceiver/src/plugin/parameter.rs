//! Plugin parameters and their validation

use crate::error::{PluginError, PluginResult};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;

/// Parameter values keyed by parameter name
pub type ParameterMap = BTreeMap<String, Value>;

/// Declared type of a parameter
///
/// Unknown spellings are kept as [`ParameterType::Other`] so a plugin still
/// loads; supplying a value for such a parameter fails validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ParameterType {
    String,
    StringArray,
    Int,
    Bool,
    /// A string naming an IANA timezone
    Timezone,
    Other(String),
}

impl ParameterType {
    pub fn as_str(&self) -> &str {
        match self {
            ParameterType::String => "string",
            ParameterType::StringArray => "[]string",
            ParameterType::Int => "int",
            ParameterType::Bool => "bool",
            ParameterType::Timezone => "timezone",
            ParameterType::Other(other) => other,
        }
    }
}

impl From<String> for ParameterType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "string" => ParameterType::String,
            "[]string" => ParameterType::StringArray,
            "int" => ParameterType::Int,
            "bool" => ParameterType::Bool,
            "timezone" => ParameterType::Timezone,
            _ => ParameterType::Other(value),
        }
    }
}

impl From<ParameterType> for String {
    fn from(value: ParameterType) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for ParameterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, typed input of a plugin template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub parameter_type: Option<ParameterType>,

    /// Value used when the caller supplies none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Allow-list of values; empty allows anything
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supported: Vec<Value>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
}

fn short(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

impl Parameter {
    /// Check that `value` has this parameter's declared type
    pub fn check_type(&self, value: &Value) -> PluginResult<()> {
        let mismatch = |reason: String| Err(PluginError::type_mismatch(&self.name, reason));

        let parameter_type = match &self.parameter_type {
            None => {
                return Err(PluginError::UnsupportedType {
                    name: self.name.clone(),
                    kind: String::new(),
                })
            }
            Some(ParameterType::Other(kind)) => {
                return Err(PluginError::UnsupportedType {
                    name: self.name.clone(),
                    kind: kind.clone(),
                })
            }
            Some(parameter_type) => parameter_type,
        };

        match parameter_type {
            ParameterType::String if !value.is_string() => mismatch("must be a string".into()),
            ParameterType::StringArray => {
                let Some(items) = value.as_sequence() else {
                    return mismatch("must be a []string".into());
                };
                match items.iter().find(|item| !item.is_string()) {
                    Some(item) => mismatch(format!(
                        "must be a []string: expected string, but got {}",
                        short(item)
                    )),
                    None => Ok(()),
                }
            }
            ParameterType::Int if !(value.is_i64() || value.is_u64()) => {
                mismatch("must be an int".into())
            }
            ParameterType::Bool if !value.is_bool() => mismatch("must be a bool".into()),
            ParameterType::Timezone => match value.as_str() {
                None => mismatch("must be a string".into()),
                Some(name) if name.parse::<Tz>().is_err() => {
                    mismatch("must be a valid timezone".into())
                }
                Some(_) => Ok(()),
            },
            _ => Ok(()),
        }
    }

    /// Check that `value` is in the allow-list
    ///
    /// For a `[]string` parameter every element must be allowed.
    pub fn check_supported(&self, value: &Value) -> PluginResult<()> {
        if self.supported.is_empty() {
            return Ok(());
        }

        let allowed = match (&self.parameter_type, value) {
            (Some(ParameterType::StringArray), Value::Sequence(items)) => {
                items.iter().all(|item| self.supported.contains(item))
            }
            _ => self.supported.contains(value),
        };
        if allowed {
            Ok(())
        } else {
            Err(PluginError::UnsupportedValue {
                name: self.name.clone(),
                supported: self.supported.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parameter(parameter_type: &str) -> Parameter {
        Parameter {
            name: "p".to_string(),
            parameter_type: Some(ParameterType::from(parameter_type.to_string())),
            ..Default::default()
        }
    }

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn test_parameter_type_serde() {
        let p: Parameter = serde_yaml::from_str("name: a\ntype: '[]string'").unwrap();
        assert_eq!(p.parameter_type, Some(ParameterType::StringArray));
        let p: Parameter = serde_yaml::from_str("name: a\ntype: map").unwrap();
        assert_eq!(p.parameter_type, Some(ParameterType::Other("map".to_string())));
        assert!(serde_yaml::to_string(&p).unwrap().contains("type: map"));
    }

    #[test]
    fn test_type_rules() {
        assert!(parameter("string").check_type(&yaml("x")).is_ok());
        assert!(parameter("string").check_type(&yaml("5")).is_err());
        assert!(parameter("int").check_type(&yaml("5")).is_ok());
        assert!(parameter("int").check_type(&yaml("5.5")).is_err());
        assert!(parameter("bool").check_type(&yaml("true")).is_ok());
        assert!(parameter("bool").check_type(&yaml("'true'")).is_err());
        assert!(parameter("[]string").check_type(&yaml("[a, b]")).is_ok());
        assert!(parameter("[]string").check_type(&yaml("a")).is_err());
    }

    #[test]
    fn test_string_array_reports_element() {
        let err = parameter("[]string").check_type(&yaml("[a, 3]")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "type failure: parameter p must be a []string: expected string, but got 3"
        );
    }

    #[test]
    fn test_timezone() {
        let tz = parameter("timezone");
        assert!(tz.check_type(&yaml("America/New_York")).is_ok());
        assert!(tz.check_type(&yaml("UTC")).is_ok());
        let err = tz.check_type(&yaml("Mars/Base")).unwrap_err();
        assert!(err.to_string().contains("must be a valid timezone"));
        assert!(tz.check_type(&yaml("3")).unwrap_err().to_string().contains("must be a string"));
    }

    #[test]
    fn test_unsupported_type() {
        let err = parameter("map").check_type(&yaml("{}")).unwrap_err();
        assert!(matches!(err, PluginError::UnsupportedType { ref kind, .. } if kind == "map"));
        let untyped = Parameter {
            name: "u".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            untyped.check_type(&yaml("1")),
            Err(PluginError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn test_supported_values() {
        let mut p = parameter("string");
        p.supported = vec![yaml("json"), yaml("regex")];
        assert!(p.check_supported(&yaml("json")).is_ok());
        assert!(p.check_supported(&yaml("xml")).is_err());

        let mut p = parameter("[]string");
        p.supported = vec![yaml("a"), yaml("b")];
        assert!(p.check_supported(&yaml("[a, b]")).is_ok());
        assert!(p.check_supported(&yaml("[a, c]")).is_err());
    }
}
