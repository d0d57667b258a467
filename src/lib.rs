//! # imars3d
//!
//! Configuration-driven CT reconstruction workflows for neutron imaging, with
//! rotation-center and tilt diagnostics built on 180° projection pairs.
//!
//! ## Features
//!
//! - **Checked before run**: a dry-run validates every task, parameter and output before any data is touched
//! - **Sync & Async Support**: run a workflow directly or from a tokio runtime
//! - **Pluggable tasks**: register your own functions next to the built-in ones
//! - **Explicit parallelism**: every parallel kernel takes its worker count as an argument
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use imars3d::prelude::*;
//!
//! let mut engine = WorkflowEngine::from_path("reconstruction.json", FunctionLibrary::with_defaults())?;
//! engine.dryrun()?;
//! engine.run()?;
//! # Ok::<(), imars3d::WorkflowError>(())
//! ```
//!
//! ## Module Organization
//!
//! - [`diagnostics`]: rotation center, tilt estimation and the numerics behind them
//! - [`imaging`]: corrections, reconstruction and TIFF I/O
//! - [`tasks`]: the built-in task functions the engine can call
//! - [`parallel`]: worker-pool selection
//! - [`prelude`]: commonly used types (import with `use imars3d::prelude::*`)

// ============================================================================
// Core Module
// ============================================================================

mod core;

// ============================================================================
// Domain Modules
// ============================================================================

pub mod diagnostics;
pub mod imaging;
pub mod parallel;
pub mod tasks;

// ============================================================================
// Public Re-exports - Granular Imports
// ============================================================================

// Configuration
pub use crate::core::config::{Config, NON_REGISTRY_KEYS, TaskSpec, workflow_schema};

// Engine
pub use crate::core::async_engine::AsyncWorkflowEngine;
pub use crate::core::engine::WorkflowEngine;
pub use crate::core::registry::Registry;
pub use crate::core::validation::{InputBinding, ValidationIssue, ValidationResult, classify_input, dryrun};

// Task functions
pub use crate::core::library::{DEFAULT_LOAD_FUNCTION, DEFAULT_SAVE_FUNCTION, FunctionLibrary};
pub use crate::core::schema::{Parameter, ParameterSchema};
pub use crate::core::task::{FnTask, TaskArgs, TaskFunction};
pub use crate::core::value::Value;

// Telemetry
pub use crate::core::telemetry::{MemoryTelemetry, Telemetry, TraceEntry};

// Errors
pub use crate::core::error::{ConfigSchemaError, TaskError, WorkflowEngineError, WorkflowError, WorkflowValidationError};
pub use diagnostics::DiagnosticError;
pub use imaging::ImagingError;

pub use parallel::ParallelConfig;

// ============================================================================
// Prelude Module - Convenient Bulk Imports
// ============================================================================

/// The main prelude: everything needed to configure and run a workflow.
///
/// # Example
/// ```rust
/// use imars3d::prelude::*;
/// ```
pub mod prelude {
    pub use super::{
        AsyncWorkflowEngine,
        // Configuration
        Config,
        FnTask,
        // Tasks
        FunctionLibrary,
        ParallelConfig,
        ParameterSchema,
        Registry,
        TaskArgs,
        TaskError,
        TaskFunction,
        TaskSpec,
        ValidationResult,
        Value,
        // Engine
        WorkflowEngine,
        WorkflowError,
    };
}

// ============================================================================
// Re-export commonly used external types for convenience
// ============================================================================

pub use serde_json::Value as JsonValue;

// ============================================================================
// Library Metadata
// ============================================================================

/// The version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of this crate.
pub const NAME: &str = env!("CARGO_PKG_NAME");
