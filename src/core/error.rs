use thiserror::Error;

use crate::diagnostics::DiagnosticError;
use crate::imaging::ImagingError;

/// The configuration document is not valid JSON or violates the workflow schema.
#[derive(Debug, Error)]
pub enum ConfigSchemaError {
    #[error("Malformed configuration JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Configuration does not match the workflow schema: {}", .0.join("; "))]
    SchemaViolation(Vec<String>),

    #[error("Workflow schema failed to compile: {0}")]
    InvalidSchema(String),

    #[error("Could not read configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Raised by the dry-run: the configuration cannot possibly execute.
#[derive(Debug, Error)]
pub enum WorkflowValidationError {
    #[error("A workflow with a single task cannot load and save data")]
    SingleTask,

    #[error("Workflow must begin with a load ({load}) and end with a save ({save}), found {first} ... {last}")]
    Bookends {
        load: String,
        save: String,
        first: String,
        last: String,
    },

    #[error("Task '{task}' references unknown function '{function}'")]
    UnknownFunction { task: String, function: String },

    #[error("Parameter(s) {} are not input parameters of {function}", .params.join(", "))]
    UnknownParameters {
        task: String,
        function: String,
        params: Vec<String>,
    },

    #[error("Task '{task}' is missing input(s): {}", .missing.join(", "))]
    MissingInputs { task: String, missing: Vec<String> },

    #[error("Task '{task}' declares {expected} output(s) but {function} produces {actual}")]
    OutputArity {
        task: String,
        function: String,
        expected: usize,
        actual: usize,
    },

    #[error("Task '{task}' input '{param}' has an unsupported value: {reason}")]
    UnsupportedValue {
        task: String,
        param: String,
        reason: String,
    },
}

/// Misuse of the engine or structural failures outside validation.
#[derive(Debug, Error)]
pub enum WorkflowEngineError {
    #[error("The workflow engine has no configuration to run")]
    NoConfiguration,

    #[error("Registry has no entry named '{0}'")]
    MissingRegistryKey(String),

    #[error("Workflow worker thread failed: {0}")]
    Join(String),
}

/// Errors raised by task functions. The engine propagates them unchanged.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Missing required argument '{0}'")]
    MissingArgument(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Diagnostic(#[from] DiagnosticError),

    #[error(transparent)]
    Imaging(#[from] ImagingError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Failed(String),
}

/// Umbrella error returned by the workflow engine.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Schema(#[from] ConfigSchemaError),

    #[error(transparent)]
    Validation(#[from] WorkflowValidationError),

    #[error(transparent)]
    Engine(#[from] WorkflowEngineError),

    #[error(transparent)]
    Task(#[from] TaskError),
}

impl WorkflowError {
    /// True for errors caught before any task ran (bad configuration).
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, WorkflowError::Schema(_) | WorkflowError::Validation(_))
    }
}
