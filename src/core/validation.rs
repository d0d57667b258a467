use serde_json::Value as Json;
use std::collections::HashSet;

use crate::core::config::{Config, NON_REGISTRY_KEYS, TaskSpec};
use crate::core::error::WorkflowValidationError;
use crate::core::library::FunctionLibrary;
use crate::core::schema::{Parameter, ParameterSchema};
use crate::core::value::Value;

/// Housekeeping parameters never reported as missing.
pub const EXEMPT_PARAMETERS: [&str; 2] = ["name", "tqdm_class"];

/// Represents an issue found during workflow validation.
#[derive(Debug, Clone)]
pub enum ValidationIssue {
    /// A hard error: the workflow cannot run.
    Error(String),
    /// A warning: part of the workflow could not be verified statically.
    Warning(String),
}

/// The result of a workflow validation pass.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, msg: impl Into<String>) {
        self.issues.push(ValidationIssue::Error(msg.into()));
    }

    pub fn add_warning(&mut self, msg: impl Into<String>) {
        self.issues.push(ValidationIssue::Warning(msg.into()));
    }

    pub fn is_safe(&self) -> bool {
        !self.issues.iter().any(|i| matches!(i, ValidationIssue::Error(_)))
    }

    pub fn has_warnings(&self) -> bool {
        self.issues.iter().any(|i| matches!(i, ValidationIssue::Warning(_)))
    }

    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.issues.iter().filter_map(|i| match i {
            ValidationIssue::Warning(msg) => Some(msg.as_str()),
            ValidationIssue::Error(_) => None,
        })
    }

    pub fn log_summary(&self) {
        if self.is_safe() && !self.has_warnings() {
            log::info!("Workflow validation passed: every task input is resolvable.");
            return;
        }

        for issue in &self.issues {
            match issue {
                ValidationIssue::Error(msg) => log::error!("{}", msg),
                ValidationIssue::Warning(msg) => log::warn!("{}", msg),
            }
        }
    }
}

/// How an explicit task input is bound to a parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum InputBinding<'a> {
    /// Used as-is.
    Literal(&'a Json),
    /// Looked up in the registry under this key.
    Reference(&'a str),
}

/// String values are literals for literal parameters and registry keys otherwise.
pub fn classify_input<'a>(param: &Parameter, value: &'a Json) -> InputBinding<'a> {
    match value {
        Json::String(key) if !param.literal => InputBinding::Reference(key),
        other => InputBinding::Literal(other),
    }
}

/// Statically checks that every task input can be resolved, without running anything.
pub fn dryrun(config: &Config, library: &FunctionLibrary) -> Result<ValidationResult, WorkflowValidationError> {
    let mut result = ValidationResult::new();
    let mut resolved = HashSet::new();
    for (key, json) in config.registry_seed() {
        if let Err(reason) = Value::from_json(&json) {
            return Err(WorkflowValidationError::UnsupportedValue {
                task: config.name.clone(),
                param: key,
                reason,
            });
        }
        resolved.insert(key);
    }
    debug_assert!(NON_REGISTRY_KEYS.iter().all(|k| !resolved.contains(*k)));

    check_bookends(&config.tasks, library)?;

    for task in &config.tasks {
        let function = library
            .get(&task.function)
            .ok_or_else(|| WorkflowValidationError::UnknownFunction {
                task: task.name.clone(),
                function: task.function.clone(),
            })?;
        let schema = function.schema();

        check_declared_inputs(task, &schema)?;
        if schema.context_dependent {
            result.add_warning(format!(
                "Task '{}': inputs of {} depend on context and are not verified.",
                task.name, task.function
            ));
        } else {
            check_inputs(task, &schema, &resolved)?;
        }

        if let Some(outputs) = &task.outputs {
            if let Some(expected) = schema.returns {
                if expected != outputs.len() {
                    return Err(WorkflowValidationError::OutputArity {
                        task: task.name.clone(),
                        function: task.function.clone(),
                        expected: outputs.len(),
                        actual: expected,
                    });
                }
            }
            resolved.extend(outputs.iter().cloned());
        }
        log::debug!("Task '{}' verified", task.name);
    }

    Ok(result)
}

fn check_bookends(tasks: &[TaskSpec], library: &FunctionLibrary) -> Result<(), WorkflowValidationError> {
    match tasks {
        [] => Ok(()),
        [_] => Err(WorkflowValidationError::SingleTask),
        [first, .., last] => {
            if first.function != library.load_function() || last.function != library.save_function() {
                return Err(WorkflowValidationError::Bookends {
                    load: library.load_function().to_string(),
                    save: library.save_function().to_string(),
                    first: first.function.clone(),
                    last: last.function.clone(),
                });
            }
            Ok(())
        }
    }
}

/// Every explicit input names a declared parameter, and every literal can be
/// stored as a [`Value`]. Applies to context-dependent tasks too.
fn check_declared_inputs(task: &TaskSpec, schema: &ParameterSchema) -> Result<(), WorkflowValidationError> {
    let unknown: Vec<String> = task
        .inputs
        .keys()
        .filter(|k| !schema.contains(k))
        .cloned()
        .collect();
    if !unknown.is_empty() {
        return Err(WorkflowValidationError::UnknownParameters {
            task: task.name.clone(),
            function: task.function.clone(),
            params: unknown,
        });
    }

    for param in &schema.params {
        let Some(value) = task.inputs.get(&param.name) else {
            continue;
        };
        if let InputBinding::Literal(json) = classify_input(param, value) {
            Value::from_json(json).map_err(|reason| WorkflowValidationError::UnsupportedValue {
                task: task.name.clone(),
                param: param.name.clone(),
                reason,
            })?;
        }
    }
    Ok(())
}

fn check_inputs(
    task: &TaskSpec,
    schema: &ParameterSchema,
    resolved: &HashSet<String>,
) -> Result<(), WorkflowValidationError> {
    let mut missing = Vec::new();
    for param in &schema.params {
        match task.inputs.get(&param.name) {
            Some(value) => {
                if let InputBinding::Reference(key) = classify_input(param, value) {
                    if !resolved.contains(key) {
                        missing.push(key.to_string());
                    }
                }
            }
            None => {
                if param.has_default() || EXEMPT_PARAMETERS.contains(&param.name.as_str()) {
                    continue;
                }
                if !resolved.contains(&param.name) {
                    missing.push(param.name.clone());
                }
            }
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(WorkflowValidationError::MissingInputs {
            task: task.name.clone(),
            missing,
        })
    }
}
