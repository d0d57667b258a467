//! Workflow configuration documents.
//!
//! A configuration is checked against a fixed JSON schema before it is
//! deserialized, so structural mistakes are reported with their JSON path and
//! never reach the dry-run.

use jsonschema::{Draft, JSONSchema};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json, json};
use std::collections::BTreeMap;
use std::path::Path;

use crate::core::error::ConfigSchemaError;

/// Configuration keys that never enter the registry.
pub const NON_REGISTRY_KEYS: [&str; 2] = ["name", "tasks"];

/// One step of the workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    /// Dotted function name resolved through the function library.
    pub function: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub inputs: Map<String, Json>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<String>>,
}

impl TaskSpec {
    pub fn new(name: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            function: function.into(),
            inputs: Map::new(),
            outputs: None,
        }
    }

    pub fn input(mut self, param: impl Into<String>, value: Json) -> Self {
        self.inputs.insert(param.into(), value);
        self
    }

    pub fn outputs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs = Some(names.into_iter().map(Into::into).collect());
        self
    }
}

/// A parsed workflow configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub facility: String,
    pub instrument: String,
    pub ipts: String,
    pub name: String,
    pub workingdir: String,
    pub outputdir: String,
    pub tasks: Vec<TaskSpec>,
    /// Additional top-level keys; they are seeded into the registry.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Json>,
}

impl Config {
    /// Parses and schema-validates a JSON document.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigSchemaError> {
        let document: Json = serde_json::from_str(text)?;
        Self::from_value(document)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigSchemaError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    pub fn from_value(document: Json) -> Result<Self, ConfigSchemaError> {
        validate_schema(&document)?;
        Ok(serde_json::from_value(document)?)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigSchemaError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Top-level metadata that seeds the registry, i.e. every key except
    /// `name` and `tasks`.
    pub fn registry_seed(&self) -> Vec<(String, Json)> {
        let mut seed = vec![
            ("facility".to_string(), Json::String(self.facility.clone())),
            ("instrument".to_string(), Json::String(self.instrument.clone())),
            ("ipts".to_string(), Json::String(self.ipts.clone())),
            ("workingdir".to_string(), Json::String(self.workingdir.clone())),
            ("outputdir".to_string(), Json::String(self.outputdir.clone())),
        ];
        seed.extend(
            self.extra
                .iter()
                .filter(|(k, _)| !NON_REGISTRY_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        seed
    }
}

/// The schema every configuration document must satisfy.
pub fn workflow_schema() -> Json {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "required": ["facility", "instrument", "ipts", "name", "workingdir", "outputdir", "tasks"],
        "properties": {
            "facility": {"type": "string"},
            "instrument": {"type": "string"},
            "ipts": {"type": "string"},
            "name": {"type": "string"},
            "workingdir": {"type": "string"},
            "outputdir": {"type": "string"},
            "tasks": {
                "type": "array",
                "minItems": 1,
                "items": {
                    "type": "object",
                    "required": ["name", "function"],
                    "properties": {
                        "name": {"type": "string"},
                        "function": {"type": "string"},
                        "inputs": {"type": "object"},
                        "outputs": {"type": "array", "items": {"type": "string"}}
                    }
                }
            }
        }
    })
}

fn validate_schema(document: &Json) -> Result<(), ConfigSchemaError> {
    let schema = workflow_schema();
    let compiled = JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&schema)
        .map_err(|e| ConfigSchemaError::InvalidSchema(e.to_string()))?;

    if let Err(errors) = compiled.validate(document) {
        let messages: Vec<String> = errors
            .map(|e| format!("Property '{}': {}", e.instance_path, e.to_string().replace('\n', " ")))
            .collect();
        return Err(ConfigSchemaError::SchemaViolation(messages));
    }
    Ok(())
}
