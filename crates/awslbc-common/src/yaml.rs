//! YAML handling built on yaml-rust2
//!
//! Documents are converted into `serde_json::Value` so they can be deserialized
//! into typed structs (RBAC rules, Kubernetes objects) with serde_json.

use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};
use thiserror::Error;
use yaml_rust2::{Yaml, YamlLoader};

/// YAML parsing failure
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct YamlError(String);

/// Parse the first document of a YAML string.
///
/// Empty input yields `Value::Null`.
pub fn parse_yaml(input: &str) -> Result<Value, YamlError> {
    let docs = YamlLoader::load_from_str(input).map_err(|e| YamlError(e.to_string()))?;
    docs.into_iter()
        .next()
        .map(yaml_to_json)
        .unwrap_or(Ok(Value::Null))
}

/// Parse every document of a multi-document YAML stream.
///
/// Empty documents (a bare `---`) are dropped.
pub fn parse_yaml_multi(input: &str) -> Result<Vec<Value>, YamlError> {
    let docs = YamlLoader::load_from_str(input).map_err(|e| YamlError(e.to_string()))?;
    docs.into_iter()
        .filter(|doc| !doc.is_null())
        .map(yaml_to_json)
        .collect()
}

/// Parse the first document of a YAML string straight into `T`.
pub fn parse_yaml_as<T: DeserializeOwned>(input: &str) -> Result<T, YamlError> {
    let value = parse_yaml(input)?;
    serde_json::from_value(value).map_err(|e| YamlError(e.to_string()))
}

/// Split a multi-document YAML stream into its raw documents.
///
/// Keeps the original text of each document so it can be applied as-is;
/// documents without any content are skipped.
pub fn split_yaml_documents(yaml: &str) -> Vec<String> {
    yaml.split("\n---")
        .map(|doc| doc.trim().trim_start_matches("---").trim().to_string())
        .filter(|doc| doc.lines().any(|l| !l.trim().is_empty() && !l.trim().starts_with('#')))
        .collect()
}

fn yaml_to_json(yaml: Yaml) -> Result<Value, YamlError> {
    match yaml {
        Yaml::Null => Ok(Value::Null),
        Yaml::Boolean(b) => Ok(Value::Bool(b)),
        Yaml::Integer(i) => Ok(Value::Number(i.into())),
        Yaml::Real(raw) => {
            let f: f64 = raw
                .parse()
                .map_err(|e: std::num::ParseFloatError| YamlError(e.to_string()))?;
            Ok(Number::from_f64(f).map_or(Value::Null, Value::Number))
        }
        Yaml::String(s) => Ok(Value::String(s)),
        Yaml::Array(items) => items
            .into_iter()
            .map(yaml_to_json)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Yaml::Hash(entries) => entries
            .into_iter()
            .map(|(k, v)| Ok((yaml_key(k)?, yaml_to_json(v)?)))
            .collect::<Result<Map<String, Value>, YamlError>>()
            .map(Value::Object),
        Yaml::Alias(_) => Err(YamlError("YAML aliases not supported".to_string())),
        Yaml::BadValue => Err(YamlError("bad YAML value".to_string())),
    }
}

fn yaml_key(key: Yaml) -> Result<String, YamlError> {
    match key {
        Yaml::String(s) | Yaml::Real(s) => Ok(s),
        Yaml::Integer(i) => Ok(i.to_string()),
        Yaml::Boolean(b) => Ok(b.to_string()),
        Yaml::Null => Ok("null".to_string()),
        _ => Err(YamlError("unsupported YAML key type".to_string())),
    }
}
