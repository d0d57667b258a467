use std::collections::HashMap;

use crate::core::error::WorkflowEngineError;
use crate::core::value::Value;

/// Named values produced so far: configuration metadata plus task outputs.
///
/// Only the executor writes to it; tasks receive resolved arguments and hand
/// their results back.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    values: HashMap<String, Value>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if self.values.contains_key(&name) {
            log::debug!("Registry entry '{}' overwritten", name);
        }
        self.values.insert(name, value);
    }

    /// Fails loudly when the key is absent.
    pub fn get(&self, name: &str) -> Result<&Value, WorkflowEngineError> {
        self.values
            .get(name)
            .ok_or_else(|| WorkflowEngineError::MissingRegistryKey(name.to_string()))
    }

    pub fn try_get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Registry keys in sorted order.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.values.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_an_error() {
        let registry = Registry::new();
        match registry.get("ct") {
            Err(WorkflowEngineError::MissingRegistryKey(key)) => assert_eq!(key, "ct"),
            other => panic!("expected missing key error, got {other:?}"),
        }
    }

    #[test]
    fn test_insert_overwrites() {
        let mut registry = Registry::new();
        registry.insert("rot_center", Value::Float(3.0));
        registry.insert("rot_center", Value::Float(4.0));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("rot_center").unwrap().as_f64(), Some(4.0));
        assert_eq!(registry.keys(), vec!["rot_center"]);
    }
}
